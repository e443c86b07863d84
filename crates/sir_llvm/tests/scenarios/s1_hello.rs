//! S1: a bare `main` that prints a string literal and returns 0.
//!
//! `main`'s body calls a `FuncKind::LLMEmbedded` helper whose template is
//! hand-written LLM IR building the `{i64, ptr}` string struct `seq_print`
//! expects — SIR has no dedicated print opcode, so this is the same
//! escape hatch `internal_functions::lower_embedded_llm_function` exists
//! for in the first place.

use inkwell::context::Context;

use sir_ir::{ExprArena, Flow, Func, FuncAttrs, FuncKind, Module as SirModule, Name, SourceLoc, StringInterner, Type, TypeStore, Var, VarId};

use sir_llvm::context::{CodegenCx, CodegenFlags, OutputMode};

use crate::support::{build_and_jit, take_output};

/// Builds a zero-arg, void-returning helper whose body is hand-written LLM
/// IR printing `text` via `seq_print`, plus the literal string constant it
/// prints.
fn print_helper_template(symbol: &str, text: &str) -> String {
    let template = "\n\
@@SYM@@ = private unnamed_addr constant [@@SZ@@ x i8] c\"@@TEXT@@\\00\"\n\
declare void @seq_print(ptr)\n\
define {ret} @{name}() {\n\
entry:\n\
  %s = alloca { i64, ptr }\n\
  %lenp = getelementptr { i64, ptr }, ptr %s, i32 0, i32 0\n\
  store i64 @@LEN@@, ptr %lenp\n\
  %datap = getelementptr { i64, ptr }, ptr %s, i32 0, i32 1\n\
  store ptr @@SYM@@, ptr %datap\n\
  call void @seq_print(ptr %s)\n\
  ret void\n\
}\n";
    template
        .replace("@@SYM@@", symbol)
        .replace("@@SZ@@", &(text.len() + 1).to_string())
        .replace("@@TEXT@@", text)
        .replace("@@LEN@@", &text.len().to_string())
}

#[test]
fn prints_hi_and_returns_zero() {
    let context = Context::create();
    let mut interner = StringInterner::new();
    let mut types = TypeStore::new();
    let void_ty = types.void();
    let int_ty = types.int();
    let print_fn_ty = types.push(Type::Func { args: vec![], ret: void_ty, variadic: false });
    let main_fn_ty = types.push(Type::Func { args: vec![], ret: int_ty, variadic: false });

    let say_hi_name = interner.intern("say_hi");
    let main_name = interner.intern("main");

    let mut module = SirModule::new(Name::EMPTY, Name::EMPTY);
    let say_hi_id = VarId(0);
    module.push_var(Var {
        id: say_hi_id,
        name: say_hi_name,
        loc: SourceLoc::UNKNOWN,
        ty: print_fn_ty,
        global: true,
        func: Some(Func {
            attrs: FuncAttrs::default(),
            kind: FuncKind::LLMEmbedded { template: print_helper_template("@.sir.str.hi", "hi") },
            ty: print_fn_ty,
        }),
    });

    let mut arena = ExprArena::new();
    let callee = arena.push(Flow::VarValue(say_hi_id), print_fn_ty, SourceLoc::UNKNOWN);
    let call = arena.push(Flow::Call { callee, args: vec![] }, void_ty, SourceLoc::UNKNOWN);
    let zero = arena.push(Flow::IntConst(0), int_ty, SourceLoc::UNKNOWN);
    let ret = arena.push(Flow::Return { value: Some(zero) }, void_ty, SourceLoc::UNKNOWN);
    let main_body = arena.push(Flow::Series(vec![call, ret]), int_ty, SourceLoc::UNKNOWN);

    let main_id = VarId(1);
    module.push_var(Var {
        id: main_id,
        name: main_name,
        loc: SourceLoc::UNKNOWN,
        ty: main_fn_ty,
        global: true,
        func: Some(Func { attrs: FuncAttrs::default(), kind: FuncKind::Bodied { params: vec![], body: main_body }, ty: main_fn_ty }),
    });
    module.main_func = Some(main_id);

    let cx = CodegenCx::new(&context, &interner, &types, "s1_hello", CodegenFlags { mode: OutputMode::Jit, debug_info: false });
    let (ee, mangled_main) = build_and_jit(&cx, &module, &arena);

    // SAFETY: `main` takes no arguments and returns `i64` (`Type::Int`
    // lowers to LLM's `i64`), matching the SIR function type it was
    // lowered from.
    let main_fn = unsafe { ee.get_function::<unsafe extern "C" fn() -> i64>(&mangled_main).expect("main not found") };
    let exit_code = unsafe { main_fn.call() };

    assert_eq!(exit_code, 0);
    assert_eq!(take_output(), "hi");
}
