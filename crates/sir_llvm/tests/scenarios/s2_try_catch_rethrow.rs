//! S2: a `try` whose catch-all handler rethrows. Faithfully executing this
//! would need a real Itanium-ABI unwind/personality implementation, which
//! this directory doesn't attempt (`support.rs`'s `shim_seq_personality` is
//! a dead-code stub) — so this scenario is asserted structurally, on the
//! IR `lower_module` emits, rather than by running it.

use inkwell::context::Context;

use sir_ir::{CatchClause, ExprArena, Flow, Func, FuncAttrs, FuncKind, Module as SirModule, Name, SourceLoc, StringInterner, Type, TypeStore, Var, VarId};

use sir_llvm::aot::target::TargetConfig;
use sir_llvm::context::{CodegenCx, CodegenFlags, OutputMode};
use sir_llvm::debug::DebugLevel;
use sir_llvm::module::lower_module;

#[test]
fn catch_all_handler_rethrows_through_a_second_landing_pad() {
    let context = Context::create();
    let mut interner = StringInterner::new();
    let mut types = TypeStore::new();
    let void_ty = types.void();
    let int_ty = types.int();
    let main_fn_ty = types.push(Type::Func { args: vec![], ret: void_ty, variadic: false });

    let main_name = interner.intern("main");
    let mut module = SirModule::new(Name::EMPTY, Name::EMPTY);

    let mut arena = ExprArena::new();
    let thrown = arena.push(Flow::IntConst(1), int_ty, SourceLoc::UNKNOWN);
    let try_body = arena.push(Flow::Throw { value: thrown }, void_ty, SourceLoc::UNKNOWN);
    let rethrown = arena.push(Flow::IntConst(1), int_ty, SourceLoc::UNKNOWN);
    let handler = arena.push(Flow::Throw { value: rethrown }, void_ty, SourceLoc::UNKNOWN);
    let catches = vec![CatchClause { catch_type: None, bind_var: None, handler }];
    let main_body = arena.push(Flow::TryCatch { body: try_body, catches, finally: None }, void_ty, SourceLoc::UNKNOWN);

    let main_id = VarId(0);
    module.push_var(Var {
        id: main_id,
        name: main_name,
        loc: SourceLoc::UNKNOWN,
        ty: main_fn_ty,
        global: true,
        func: Some(Func { attrs: FuncAttrs::default(), kind: FuncKind::Bodied { params: vec![], body: main_body }, ty: main_fn_ty }),
    });
    module.main_func = Some(main_id);

    let cx = CodegenCx::new(&context, &interner, &types, "s2_try_catch_rethrow", CodegenFlags { mode: OutputMode::Jit, debug_info: false });
    let target = TargetConfig::native().expect("native target unavailable");
    lower_module(&cx, &module, &arena, "", std::path::Path::new("<scenario>"), &target, DebugLevel::None).expect("lower_module failed");

    let ir = cx.scx.llmod.print_to_string().to_string();
    assert!(ir.contains("landingpad"), "a try with a catch-all must emit a landing pad:\n{ir}");
    assert!(ir.contains("trycatch.pad"), "the landing pad result must be named per try_catch.rs's convention:\n{ir}");
    assert!(ir.contains("trycatch.catch"), "the catch-all's handler block must be present:\n{ir}");
    assert_eq!(ir.matches("@seq_throw(").count(), 2, "both the original throw and the catch's rethrow must call seq_throw:\n{ir}");
}
