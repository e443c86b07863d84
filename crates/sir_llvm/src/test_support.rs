//! Shared fixtures for the lowering-pass unit tests scattered across this
//! crate's `#[cfg(test)]` modules. An [`expr_lowerer::ExprLowerer`] needs a
//! full module's worth of supporting state before any of its lowering
//! methods can be called — a [`CodegenCx`], the runtime/coroutine
//! declaration tables, a type-index allocator, a function to lower into —
//! and every one of `try_catch.rs`/`control_flow.rs`/`coroutine.rs`/
//! `calls.rs`/`module.rs`/`internal_functions.rs`/`expr_lowerer.rs`'s own
//! test modules needs the same setup. Grounded on the teacher's
//! `tests::helper` module, which exists for exactly this reason.

#![cfg(test)]

use inkwell::context::Context;
use sir_ir::{StringInterner, TypeId, TypeStore};

use crate::context::{CodegenCx, CodegenFlags, OutputMode};
use crate::expr_lowerer::ExprLowerer;
use crate::ir_builder::IrBuilder;
use crate::mangle::Mangler;
use crate::runtime_decl::{CoroIntrinsics, RuntimeFunctions};
use crate::try_catch::TypeIndexAllocator;
use crate::value_id::{BlockId, FunctionId};

/// Everything an [`ExprLowerer`] borrows apart from the `Module`/`ExprArena`
/// a test builds for its own fixture. Always AOT mode with debug info off —
/// the same defaults `declare.rs`'s `test_cx` uses — since linkage and
/// debug-info policy aren't under test here.
pub(crate) struct Harness<'ll, 'tcx> {
    pub cx: CodegenCx<'ll, 'tcx>,
    pub builder: IrBuilder<'ll>,
    pub mangler: Mangler,
    pub runtime: RuntimeFunctions,
    pub coro_intrinsics: CoroIntrinsics,
    pub type_index: TypeIndexAllocator,
}

pub(crate) fn harness<'ll, 'tcx>(
    context: &'ll Context,
    interner: &'tcx StringInterner,
    types: &'tcx TypeStore,
) -> Harness<'ll, 'tcx> {
    let cx = CodegenCx::new(context, interner, types, "test", CodegenFlags { mode: OutputMode::Aot, debug_info: false });
    let runtime = cx.declare_runtime();
    let coro_intrinsics = cx.declare_coro_intrinsics();
    let type_index = TypeIndexAllocator::new();
    let builder = IrBuilder::new(&cx);
    Harness { cx, builder, mangler: Mangler::new(), runtime, coro_intrinsics, type_index }
}

/// Declares a function of SIR type `fn_ty` (must resolve to `Type::Func` in
/// `types`) and positions the builder at its entry block.
pub(crate) fn declare_function<'ll>(cx: &CodegenCx<'ll, '_>, builder: &IrBuilder<'ll>, name: &str, fn_ty: TypeId) -> (FunctionId, BlockId) {
    let fn_llty = cx.function_llvm_type(fn_ty);
    let fn_val = cx.scx.llmod.add_function(name, fn_llty, None);
    let fn_id = cx.push_function(fn_val);
    let entry = builder.append_block(cx, fn_id, "entry");
    builder.position_at_end(cx, entry);
    (fn_id, entry)
}

/// Assembles an `ExprLowerer` from a [`Harness`] plus the caller's own
/// `Module`/`ExprArena` fixture.
#[allow(clippy::too_many_arguments)]
pub(crate) fn lowerer<'a, 'll, 'tcx>(
    h: &'a Harness<'ll, 'tcx>,
    module: &'a sir_ir::Module,
    arena: &'a sir_ir::ExprArena,
    return_ty: TypeId,
    fn_id: FunctionId,
    entry: BlockId,
) -> ExprLowerer<'a, 'll, 'tcx> {
    ExprLowerer::new(
        &h.cx,
        &h.builder,
        module,
        arena,
        &h.mangler,
        "",
        &h.runtime,
        &h.coro_intrinsics,
        &h.type_index,
        h.runtime.seq_personality,
        return_ty,
        fn_id,
        entry,
    )
}
