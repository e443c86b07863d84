//! Lexical scope for the lowering visitor.
//!
//! `Scope` uses `im::HashMap` for O(1) structural-sharing clone, making
//! child-scope creation essentially free — every `if`/`while`/`for`/`try`
//! body lowered under L6/L7/L8 pushes a child scope that inherits all
//! parent bindings, and §4.4's control-flow rules create one such child per
//! branch.

use im::HashMap;
use sir_ir::VarId;

use crate::value_id::{LLVMTypeId, ValueId};

/// How a SIR var is stored in LLM IR.
///
/// Immutable bindings use SSA values directly (no memory traffic).
/// Mutable bindings use stack allocations with explicit load/store —
/// §4.4's `StackAlloc` targets and any var reassigned by `Assign` end up
/// here.
#[derive(Clone, Copy, Debug)]
pub enum ScopeBinding {
    Immutable(ValueId),
    Mutable { ptr: ValueId, ty: LLVMTypeId },
}

/// A lexical scope mapping `VarId` to its current `ScopeBinding`.
#[derive(Clone)]
pub struct Scope {
    bindings: HashMap<VarId, ScopeBinding>,
}

impl Scope {
    pub fn new() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// Create a child scope that inherits all parent bindings. O(1) via
    /// `im::HashMap` structural sharing.
    #[must_use]
    pub fn child(&self) -> Self {
        self.clone()
    }

    pub fn bind_immutable(&mut self, var: VarId, val: ValueId) {
        self.bindings.insert(var, ScopeBinding::Immutable(val));
    }

    pub fn bind_mutable(&mut self, var: VarId, ptr: ValueId, ty: LLVMTypeId) {
        self.bindings.insert(var, ScopeBinding::Mutable { ptr, ty });
    }

    pub fn lookup(&self, var: VarId) -> Option<ScopeBinding> {
        self.bindings.get(&var).copied()
    }

    pub fn contains(&self, var: VarId) -> bool {
        self.bindings.contains_key(&var)
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}
