//! L1 — type lowering (§4.1).
//!
//! Maps a SIR `TypeId` to an LLM `LLVMTypeId`, caching the result on
//! `CodegenCx` so a recursive/record type is only built once. Grounded on
//! the teacher's `declare.rs::llvm_type` call sites and `types.rs`'s
//! int-width coercion helpers; the actual mapping table is this project's
//! own, since the teacher's type system has no `Generator`/`DSLCustom`
//! counterpart.
//!
//! | SIR `Type`        | LLM type                                  |
//! |--------------------|--------------------------------------------|
//! | `Int`              | `i64`                                       |
//! | `Float`             | `double`                                    |
//! | `Bool`              | `i1`                                        |
//! | `Byte`              | `i8`                                        |
//! | `Void`              | zero-sized `{}` struct (never a return type) |
//! | `IntN{bits}`        | `iN`                                        |
//! | `Record{fields}`    | named struct, body filled after `reserve`   |
//! | `Ref{contents}`     | `ptr` (opaque; contents type is tracked separately) |
//! | `Func{args,ret}`    | function type (used for pointer-to-function values) |
//! | `Optional{base}`    | `{i1 has_value, <base>}`                    |
//! | `Pointer{base}`     | `ptr`                                       |
//! | `Generator{base}`   | `ptr` (opaque LLVM coroutine frame pointer) |
//! | `DSLCustom{name}`   | opaque named struct, body supplied by the embedded LLM text |
//! | `Placeholder`       | unreachable at lowering time — reserved ids must be `fill`ed first |

use inkwell::types::BasicTypeEnum;
use sir_ir::{Type, TypeId, TypeStore};

use crate::context::CodegenCx;
use crate::value_id::LLVMTypeId;

impl<'ll> CodegenCx<'ll, '_> {
    /// Lowers `ty`, consulting (and populating) the type cache.
    ///
    /// Cycle-safety mirrors `TypeStore::reserve`/`fill`: a `Record` pushes
    /// an opaque named struct into the cache *before* lowering its fields,
    /// so a self-referential field resolves to the same (still-opaque at
    /// that point) `LLVMTypeId` instead of recursing forever.
    pub fn lower_type(&self, ty: TypeId) -> LLVMTypeId {
        if let Some(cached) = self.cached_type(ty) {
            return cached;
        }

        // Records self-reference through their own fields, so the opaque
        // struct (and its cache entry) must exist before we recurse into
        // field types — everything else is non-recursive at the type level
        // and can be cached after the fact.
        if let Type::Record { name, fields } = self.types.get(ty) {
            let name = self.interner.resolve(*name);
            let opaque = self.scx.type_named_struct(name);
            let placeholder_id = self.push_type(opaque.into());
            self.cache_type(ty, placeholder_id);

            let field_types: Vec<BasicTypeEnum<'ll>> =
                fields.iter().map(|f| self.get_type_value(self.lower_type(f.ty))).collect();
            self.scx.set_struct_body(opaque, &field_types, false);
            return placeholder_id;
        }

        let llty = self.lower_type_uncached(ty);
        let id = self.push_type(llty);
        self.cache_type(ty, id);
        id
    }

    fn lower_type_uncached(&self, ty: TypeId) -> BasicTypeEnum<'ll> {
        match self.types.get(ty) {
            Type::Int => self.scx.type_i64().into(),
            Type::Float => self.scx.type_f64().into(),
            Type::Bool => self.scx.type_i1().into(),
            Type::Byte => self.scx.type_i8().into(),
            Type::Void => self.scx.type_struct(&[], false).into(),
            Type::IntN { bits, .. } => self.scx.type_int(*bits).into(),
            // Function values are only ever passed around as opaque pointers
            // (the call site already knows the signature from the SIR
            // `Var`); the `FunctionType` itself is built on demand by L2/L3
            // when declaring the actual LLM function.
            Type::Pointer { .. } | Type::Generator { .. } | Type::Ref { .. } | Type::Func { .. } => {
                self.scx.type_ptr().into()
            }
            Type::Optional { base } => {
                let base_ty = self.lower_type(*base);
                let base_basic = self.get_type_value(base_ty);
                self.scx.type_struct(&[self.scx.type_i1().into(), base_basic], false).into()
            }
            Type::Record { .. } => {
                unreachable!("Record is handled in lower_type before reaching lower_type_uncached")
            }
            Type::DSLCustom { name } => {
                let name = self.interner.resolve(*name);
                self.scx.type_named_struct(name).into()
            }
            Type::Placeholder => {
                unreachable!("Placeholder type reached lowering: TypeStore::reserve was never filled")
            }
        }
    }

    /// Whether `ty` lowers to a zero-sized type — used by L5/L6 to skip
    /// storing/loading a value that carries no information (SIR's unit/void).
    pub fn is_void_type(&self, ty: TypeId) -> bool {
        matches!(self.types.get(ty), Type::Void)
    }

    /// §4.4's `TypeProperty::IsAtomic` — true when a value of `ty` can
    /// never contain a pointer the GC would need to trace. Primitives are
    /// atomic; anything that can reach a `Ref`/`Pointer`/`Generator`/`Func`
    /// through its structure is not.
    pub fn is_atomic_type(&self, ty: TypeId) -> bool {
        match self.types.get(ty) {
            Type::Int | Type::Float | Type::Bool | Type::Byte | Type::Void | Type::IntN { .. } => true,
            Type::Record { fields, .. } => fields.iter().all(|f| self.is_atomic_type(f.ty)),
            Type::Optional { base } => self.is_atomic_type(*base),
            Type::Ref { .. } | Type::Pointer { .. } | Type::Generator { .. } | Type::Func { .. } | Type::DSLCustom { .. } => false,
            Type::Placeholder => unreachable!("Placeholder type reached is_atomic_type"),
        }
    }
}

/// Returns the canonical mangled type name used for §4.8's per-type index
/// constant (`<prefix>.typeidx.<name>`), falling back to the empty string
/// for types with no stable name (matches the catch-all index 0).
#[must_use]
pub fn type_index_name(interner: &sir_ir::StringInterner, types: &TypeStore, ty: TypeId) -> String {
    match types.get(ty).canonical_name() {
        Some(name) => interner.resolve(name).to_string(),
        None => String::new(),
    }
}
