//! §6 — the runtime symbol contract, declared literally under the `seq_`
//! names the interface names them by (not re-namespaced — the symbol names
//! themselves are the ABI).
//!
//! The generator/coroutine machinery (§4.5) is modeled here as calls into a
//! small `seq_coro_*` shim rather than LLVM's raw `llvm.coro.*` intrinsics:
//! `llvm.coro.id` returns a `token`, which has no representation in
//! inkwell's `BasicValueEnum` (and so none in this project's `ValueArena`
//! either). Declaring a custom-signature function under the reserved
//! `llvm.*` namespace would also fail LLVM's verifier. `seq_coro_*` keeps
//! every coroutine step inside the ordinary call/arena machinery at the
//! cost of giving up the optimizer's built-in coroutine-splitting passes —
//! an explicitly accepted simplification, not an oversight.

use inkwell::types::BasicMetadataTypeEnum;

use crate::context::CodegenCx;
use crate::value_id::FunctionId;

/// Every runtime entry point L9/L7/L8 can call, resolved once per module
/// and handed around instead of re-declaring (and re-attribute-ing) symbols
/// on demand.
pub struct RuntimeFunctions {
    pub seq_alloc: FunctionId,
    pub seq_alloc_atomic: FunctionId,
    pub seq_calloc: FunctionId,
    pub seq_calloc_atomic: FunctionId,
    pub seq_realloc: FunctionId,
    pub seq_free: FunctionId,
    pub seq_register_finalizer: FunctionId,

    pub seq_gc_add_roots: FunctionId,
    pub seq_gc_remove_roots: FunctionId,
    pub seq_gc_clear_roots: FunctionId,
    pub seq_gc_exclude_static_roots: FunctionId,

    pub seq_alloc_exc: FunctionId,
    pub seq_throw: FunctionId,
    pub seq_terminate: FunctionId,
    pub seq_personality: FunctionId,
    pub seq_exc_offset: FunctionId,
    pub seq_exc_class: FunctionId,

    pub seq_init: FunctionId,

    pub seq_str_int: FunctionId,
    pub seq_str_uint: FunctionId,
    pub seq_str_float: FunctionId,
    pub seq_str_bool: FunctionId,
    pub seq_str_byte: FunctionId,
    pub seq_str_ptr: FunctionId,
    pub seq_str_tuple: FunctionId,
    pub seq_print: FunctionId,
    pub seq_print_full: FunctionId,

    pub seq_lock_new: FunctionId,
    pub seq_lock_acquire: FunctionId,
    pub seq_lock_release: FunctionId,
    pub seq_rlock_new: FunctionId,
    pub seq_rlock_acquire: FunctionId,
    pub seq_rlock_release: FunctionId,

    pub strlen: FunctionId,
}

/// The simplified coroutine-intrinsic shim (see module doc).
pub struct CoroIntrinsics {
    pub seq_coro_id: FunctionId,
    pub seq_coro_alloc: FunctionId,
    pub seq_coro_size: FunctionId,
    pub seq_coro_begin: FunctionId,
    pub seq_coro_free: FunctionId,
    pub seq_coro_end: FunctionId,
    pub seq_coro_suspend: FunctionId,
    pub seq_coro_resume: FunctionId,
    pub seq_coro_done: FunctionId,
    pub seq_coro_promise: FunctionId,
    pub seq_coro_destroy: FunctionId,
}

impl<'ll> CodegenCx<'ll, '_> {
    /// Declares the full §6 runtime surface in the current module. Called
    /// once per module by the module driver (L10) before any function body
    /// is lowered, so every `seq_*` reference inside a body resolves
    /// against an already-registered declaration.
    pub fn declare_runtime(&self) -> RuntimeFunctions {
        let i8 = self.scx.type_i8();
        let i32 = self.scx.type_i32();
        let i64 = self.scx.type_i64();
        let f64 = self.scx.type_f64();
        let ptr = self.scx.type_ptr();
        let string_ty = self.string_type();
        let void_ret = None;

        let d = |name: &str, params: &[BasicMetadataTypeEnum<'ll>], ret: Option<inkwell::types::BasicTypeEnum<'ll>>, no_return: bool| {
            self.declare_runtime_function(name, params, ret, false, no_return)
        };

        RuntimeFunctions {
            seq_alloc: d("seq_alloc", &[i64.into()], Some(ptr.into()), false),
            seq_alloc_atomic: d("seq_alloc_atomic", &[i64.into()], Some(ptr.into()), false),
            seq_calloc: d("seq_calloc", &[i64.into(), i64.into()], Some(ptr.into()), false),
            seq_calloc_atomic: d("seq_calloc_atomic", &[i64.into(), i64.into()], Some(ptr.into()), false),
            seq_realloc: d("seq_realloc", &[ptr.into(), i64.into(), i64.into()], Some(ptr.into()), false),
            seq_free: d("seq_free", &[ptr.into()], void_ret, false),
            seq_register_finalizer: d("seq_register_finalizer", &[ptr.into(), ptr.into()], void_ret, false),

            seq_gc_add_roots: d("seq_gc_add_roots", &[ptr.into(), ptr.into()], void_ret, false),
            seq_gc_remove_roots: d("seq_gc_remove_roots", &[ptr.into(), ptr.into()], void_ret, false),
            seq_gc_clear_roots: d("seq_gc_clear_roots", &[], void_ret, false),
            seq_gc_exclude_static_roots: d("seq_gc_exclude_static_roots", &[ptr.into(), ptr.into()], void_ret, false),

            seq_alloc_exc: d("seq_alloc_exc", &[i32.into(), ptr.into()], Some(ptr.into()), false),
            seq_throw: d("seq_throw", &[ptr.into()], void_ret, true),
            seq_terminate: d("seq_terminate", &[ptr.into()], void_ret, true),
            seq_personality: d(
                "seq_personality",
                &[i32.into(), i32.into(), i64.into(), ptr.into(), ptr.into()],
                Some(i32.into()),
                false,
            ),
            seq_exc_offset: d("seq_exc_offset", &[], Some(i64.into()), false),
            seq_exc_class: d("seq_exc_class", &[], Some(i64.into()), false),

            seq_init: d("seq_init", &[i32.into()], void_ret, false),

            seq_str_int: d("seq_str_int", &[i64.into()], Some(string_ty.into()), false),
            seq_str_uint: d("seq_str_uint", &[i64.into()], Some(string_ty.into()), false),
            seq_str_float: d("seq_str_float", &[f64.into()], Some(string_ty.into()), false),
            seq_str_bool: d("seq_str_bool", &[self.scx.type_i1().into()], Some(string_ty.into()), false),
            seq_str_byte: d("seq_str_byte", &[i8.into()], Some(string_ty.into()), false),
            seq_str_ptr: d("seq_str_ptr", &[ptr.into()], Some(string_ty.into()), false),
            seq_str_tuple: d("seq_str_tuple", &[ptr.into()], Some(string_ty.into()), false),
            // `seq_print`/`seq_print_full` take a pointer to an already
            // materialized `{i64,ptr}` string rather than passing it
            // byval, sidestepping platform-specific aggregate-by-value
            // ABI rules this backend doesn't otherwise need to reproduce.
            seq_print: d("seq_print", &[ptr.into()], void_ret, false),
            seq_print_full: d("seq_print_full", &[ptr.into(), ptr.into()], void_ret, false),

            seq_lock_new: d("seq_lock_new", &[], Some(ptr.into()), false),
            seq_lock_acquire: d("seq_lock_acquire", &[ptr.into(), self.scx.type_i1().into(), f64.into()], Some(self.scx.type_i1().into()), false),
            seq_lock_release: d("seq_lock_release", &[ptr.into()], void_ret, false),
            seq_rlock_new: d("seq_rlock_new", &[], Some(ptr.into()), false),
            seq_rlock_acquire: d("seq_rlock_acquire", &[ptr.into(), self.scx.type_i1().into(), f64.into()], Some(self.scx.type_i1().into()), false),
            seq_rlock_release: d("seq_rlock_release", &[ptr.into()], void_ret, false),

            strlen: d("strlen", &[ptr.into()], Some(i64.into()), false),
        }
    }

    pub fn declare_coro_intrinsics(&self) -> CoroIntrinsics {
        let i1 = self.scx.type_i1();
        let i8 = self.scx.type_i8();
        let i32 = self.scx.type_i32();
        let i64 = self.scx.type_i64();
        let ptr = self.scx.type_ptr();

        let d = |name: &str, params: &[BasicMetadataTypeEnum<'ll>], ret: Option<inkwell::types::BasicTypeEnum<'ll>>| {
            self.declare_runtime_function(name, params, ret, false, false)
        };

        CoroIntrinsics {
            seq_coro_id: d("seq_coro_id", &[i32.into(), ptr.into(), ptr.into(), ptr.into()], Some(ptr.into())),
            seq_coro_alloc: d("seq_coro_alloc", &[ptr.into()], Some(i1.into())),
            seq_coro_size: d("seq_coro_size", &[], Some(i64.into())),
            seq_coro_begin: d("seq_coro_begin", &[ptr.into(), ptr.into()], Some(ptr.into())),
            seq_coro_free: d("seq_coro_free", &[ptr.into(), ptr.into()], None),
            seq_coro_end: d("seq_coro_end", &[ptr.into(), i1.into()], Some(i1.into())),
            seq_coro_suspend: d("seq_coro_suspend", &[ptr.into(), i1.into()], Some(i8.into())),
            seq_coro_resume: d("seq_coro_resume", &[ptr.into()], None),
            seq_coro_done: d("seq_coro_done", &[ptr.into()], Some(i1.into())),
            seq_coro_promise: d("seq_coro_promise", &[ptr.into(), i32.into(), i1.into()], Some(ptr.into())),
            seq_coro_destroy: d("seq_coro_destroy", &[ptr.into()], None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::context::Context;
    use sir_ir::{StringInterner, TypeStore};

    #[test]
    fn runtime_functions_are_all_distinct_declarations() {
        let context = Context::create();
        let interner = StringInterner::new();
        let types = TypeStore::new();
        use crate::context::{CodegenFlags, OutputMode};
        let cx = CodegenCx::new(&context, &interner, &types, "test", CodegenFlags { mode: OutputMode::Aot, debug_info: false });
        let rt = cx.declare_runtime();
        assert_ne!(rt.seq_alloc, rt.seq_free);
        assert_eq!(cx.get_function_value(rt.seq_throw).get_linkage(), inkwell::module::Linkage::External);
    }

    #[test]
    fn redeclaring_runtime_twice_reuses_the_llvm_function() {
        let context = Context::create();
        let interner = StringInterner::new();
        let types = TypeStore::new();
        use crate::context::{CodegenFlags, OutputMode};
        let cx = CodegenCx::new(&context, &interner, &types, "test", CodegenFlags { mode: OutputMode::Aot, debug_info: false });
        let a = cx.declare_runtime_function("seq_alloc", &[cx.scx.type_i64().into()], Some(cx.scx.type_ptr().into()), false, false);
        let b = cx.declare_runtime_function("seq_alloc", &[cx.scx.type_i64().into()], Some(cx.scx.type_ptr().into()), false, false);
        assert_eq!(cx.get_function_value(a), cx.get_function_value(b));
    }
}
