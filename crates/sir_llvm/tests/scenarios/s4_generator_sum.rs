//! S4: a generator that yields two values. Actually driving this through
//! the JIT would need a real fiber/coroutine runtime underneath
//! `seq_coro_*` (`coroutine.rs`'s prologue calls real suspend/resume
//! semantics this crate doesn't reimplement) — so this scenario is
//! asserted structurally, on the coroutine prologue/suspend shape
//! `lower_module` emits, rather than by resuming the coroutine.

use inkwell::context::Context;

use sir_ir::{ExprArena, Flow, Func, FuncAttrs, FuncKind, Module as SirModule, Name, SourceLoc, StringInterner, Type, TypeStore, Var, VarId};

use sir_llvm::aot::target::TargetConfig;
use sir_llvm::context::{CodegenCx, CodegenFlags, OutputMode};
use sir_llvm::debug::DebugLevel;
use sir_llvm::module::lower_module;

#[test]
fn two_yields_build_a_coroutine_prologue_with_two_suspend_points() {
    let context = Context::create();
    let mut interner = StringInterner::new();
    let mut types = TypeStore::new();
    let int_ty = types.int();
    let gen_ty = types.push(Type::Generator { base: int_ty });
    let main_fn_ty = types.push(Type::Func { args: vec![], ret: gen_ty, variadic: false });

    let main_name = interner.intern("gen_sum");
    let mut module = SirModule::new(Name::EMPTY, Name::EMPTY);

    let mut arena = ExprArena::new();
    let one = arena.push(Flow::IntConst(1), int_ty, SourceLoc::UNKNOWN);
    let yield1 = arena.push(Flow::Yield { value: Some(one), is_final: false }, int_ty, SourceLoc::UNKNOWN);
    let two = arena.push(Flow::IntConst(2), int_ty, SourceLoc::UNKNOWN);
    let yield2 = arena.push(Flow::Yield { value: Some(two), is_final: true }, int_ty, SourceLoc::UNKNOWN);
    let main_body = arena.push(Flow::Series(vec![yield1, yield2]), gen_ty, SourceLoc::UNKNOWN);

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

    let cx = CodegenCx::new(&context, &interner, &types, "s4_generator_sum", CodegenFlags { mode: OutputMode::Jit, debug_info: false });
    let target = TargetConfig::native().expect("native target unavailable");
    lower_module(&cx, &module, &arena, "", std::path::Path::new("<scenario>"), &target, DebugLevel::None).expect("lower_module failed");

    let ir = cx.scx.llmod.print_to_string().to_string();
    assert!(ir.contains("coro.id"), "a generator-returning function must build the coroutine id prologue:\n{ir}");
    assert!(ir.contains("coro.begin"), "the coroutine handle must be established before the body runs:\n{ir}");
    assert!(ir.contains("coro.cleanup"), "the cleanup/suspend/exit blocks are always built:\n{ir}");
    // The initial suspend plus this fixture's own two `Yield`s make three
    // `seq_coro_suspend` call sites.
    assert_eq!(ir.matches("@seq_coro_suspend(").count(), 3, "initial suspend + two yields:\n{ir}");
}
