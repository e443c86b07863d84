//! S5: an inner `try` with no catch clauses of its own, nested inside an
//! outer `try` whose catch-all handles the exception. Faithfully running
//! this needs the same real unwind protocol S2 does, so it's asserted
//! structurally too: the inner try's default route must delegate to an
//! ancestor rather than handle anything itself, and the outer try's
//! catch-all must be present to receive it.

use inkwell::context::Context;

use sir_ir::{CatchClause, ExprArena, Flow, Func, FuncAttrs, FuncKind, Module as SirModule, Name, SourceLoc, StringInterner, Type, TypeStore, Var, VarId};

use sir_llvm::aot::target::TargetConfig;
use sir_llvm::context::{CodegenCx, CodegenFlags, OutputMode};
use sir_llvm::debug::DebugLevel;
use sir_llvm::module::lower_module;

#[test]
fn inner_try_with_no_catches_delegates_to_the_outer_catch_all() {
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
    let inner_body = arena.push(Flow::Throw { value: thrown }, void_ty, SourceLoc::UNKNOWN);
    let inner_try = arena.push(Flow::TryCatch { body: inner_body, catches: vec![], finally: None }, void_ty, SourceLoc::UNKNOWN);

    let outer_handler = arena.push(Flow::Series(vec![]), void_ty, SourceLoc::UNKNOWN);
    let outer_catches = vec![CatchClause { catch_type: None, bind_var: None, handler: outer_handler }];
    let main_body = arena.push(Flow::TryCatch { body: inner_try, catches: outer_catches, finally: None }, void_ty, SourceLoc::UNKNOWN);

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

    let cx = CodegenCx::new(&context, &interner, &types, "s5_nested_try_outer_catch", CodegenFlags { mode: OutputMode::Jit, debug_info: false });
    let target = TargetConfig::native().expect("native target unavailable");
    lower_module(&cx, &module, &arena, "", std::path::Path::new("<scenario>"), &target, DebugLevel::None).expect("lower_module failed");

    let ir = cx.scx.llmod.print_to_string().to_string();
    assert_eq!(ir.matches("landingpad").count(), 2, "both the inner and outer try build their own landing pad:\n{ir}");
    assert!(ir.contains("trycatch.fdepth_default"), "the inner try has no catch-all, so its default route must delegate outward:\n{ir}");
    assert!(ir.contains("trycatch.catch"), "the outer try's catch-all handler block must be present to receive the delegated exception:\n{ir}");
}
