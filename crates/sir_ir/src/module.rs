//! SIR modules, vars, and functions (§3).

use crate::value::ExprId;
use crate::{Name, SourceLoc, TypeId};

/// Stable identity for a `Var`/`Func`. `sir_llvm`'s value-id arena keys its
/// SIR-id → LLM-handle map off this, never off a `Var`'s address (§3
/// invariant: "a mapping (SIR id → LLM handle) is maintained and never
/// re-keyed").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

/// A SIR global: identity, name, source location, type, and a global flag
/// (§3). `Func` is a `Var` with one of the kinds below.
#[derive(Debug, Clone)]
pub struct Var {
    pub id: VarId,
    pub name: Name,
    pub loc: SourceLoc,
    pub ty: TypeId,
    pub global: bool,
    pub func: Option<Func>,
}

impl Var {
    pub fn is_func(&self) -> bool {
        self.func.is_some()
    }
}

/// Attributes affecting L2's linkage/attribute decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FuncAttrs {
    pub export: bool,
    pub inline: bool,
    pub noinline: bool,
}

/// The four function variants named in §3.
#[derive(Debug, Clone)]
pub enum FuncKind {
    /// Has a SIR body to lower.
    Bodied { params: Vec<VarId>, body: ExprId },
    /// Declared only; defined elsewhere (another translation unit, the
    /// runtime library).
    External,
    /// Synthesized by L9's pattern table (§4.9) rather than carrying a SIR
    /// body at all.
    Internal { pattern: InternalPattern },
    /// Carries a textual LLM template to be formatted, parsed, and linked
    /// in by L9 (§4.9's "embedded LLM functions").
    LLMEmbedded { template: String },
    /// Escape hatch delegated to a custom builder, mirroring `Type::DSLCustom`.
    DSLCustom { name: Name },
}

/// The pattern table entries from §4.9, matched on `(parentType, argTypes)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalPattern {
    /// `Pointer<T>.__new__(Int n)`
    PointerNew,
    /// `Int.__new__(IntN<n>)`
    IntFromIntN,
    /// `IntN<n>.__new__(Int)`
    IntNFromInt,
    /// `Ref.__new__()`
    RefNew,
    /// `Generator<T>.__promise__(Generator<T>)`
    GeneratorPromise,
    /// `Record<...>.__new__(...)`
    RecordNew,
}

#[derive(Debug, Clone)]
pub struct Func {
    pub attrs: FuncAttrs,
    pub kind: FuncKind,
    pub ty: TypeId, // Func type: args/ret/variadic
}

/// The `ArgVar` named in §3: a global holding the `{i64 len, {i64,i8*}*
/// data}`-shaped argv array that the canonical `main` populates.
#[derive(Debug, Clone, Copy)]
pub struct ArgVar(pub VarId);

/// A SIR module: an ordered set of `Var`s plus a designated main function
/// and argv holder (§3).
pub struct Module {
    pub name: Name,
    pub source_file: Name,
    vars: Vec<Var>,
    pub main_func: Option<VarId>,
    pub arg_var: Option<ArgVar>,
}

impl Module {
    pub fn new(name: Name, source_file: Name) -> Self {
        Self {
            name,
            source_file,
            vars: Vec::new(),
            main_func: None,
            arg_var: None,
        }
    }

    pub fn push_var(&mut self, var: Var) -> VarId {
        let id = var.id;
        self.vars.push(var);
        id
    }

    pub fn vars(&self) -> &[Var] {
        &self.vars
    }

    pub fn get(&self, id: VarId) -> &Var {
        self.vars
            .iter()
            .find(|v| v.id == id)
            .expect("VarId not present in this module")
    }

    pub fn funcs(&self) -> impl Iterator<Item = &Var> {
        self.vars.iter().filter(|v| v.is_func())
    }
}
