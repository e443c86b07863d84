//! S6: `main`'s entire body is a `try` that returns `42`, with a `finally`
//! that prints a marker. The function's own return value must be 42 (the
//! `try`'s finally-exit dispatch must re-perform the pending `Return`
//! rather than swallow it), and the marker must print exactly once.

use inkwell::context::Context;

use sir_ir::{ExprArena, Flow, Func, FuncAttrs, FuncKind, Module as SirModule, Name, SourceLoc, StringInterner, Type, TypeStore, Var, VarId};

use sir_llvm::context::{CodegenCx, CodegenFlags, OutputMode};

use crate::support::{build_and_jit, take_output};

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
fn return_inside_try_runs_finally_once_and_yields_the_returned_value() {
    let context = Context::create();
    let mut interner = StringInterner::new();
    let mut types = TypeStore::new();
    let void_ty = types.void();
    let int_ty = types.int();
    let print_fn_ty = types.push(Type::Func { args: vec![], ret: void_ty, variadic: false });
    let main_fn_ty = types.push(Type::Func { args: vec![], ret: int_ty, variadic: false });

    let print_f_name = interner.intern("print_f");
    let main_name = interner.intern("main");

    let mut module = SirModule::new(Name::EMPTY, Name::EMPTY);
    let print_f_id = VarId(0);
    module.push_var(Var {
        id: print_f_id,
        name: print_f_name,
        loc: SourceLoc::UNKNOWN,
        ty: print_fn_ty,
        global: true,
        func: Some(Func {
            attrs: FuncAttrs::default(),
            kind: FuncKind::LLMEmbedded { template: print_helper_template("@.sir.str.f", "f") },
            ty: print_fn_ty,
        }),
    });

    let mut arena = ExprArena::new();
    let forty_two = arena.push(Flow::IntConst(42), int_ty, SourceLoc::UNKNOWN);
    let return_expr = arena.push(Flow::Return { value: Some(forty_two) }, void_ty, SourceLoc::UNKNOWN);
    let print_f_callee = arena.push(Flow::VarValue(print_f_id), print_fn_ty, SourceLoc::UNKNOWN);
    let print_f_call = arena.push(Flow::Call { callee: print_f_callee, args: vec![] }, void_ty, SourceLoc::UNKNOWN);
    let main_body = arena.push(Flow::TryCatch { body: return_expr, catches: vec![], finally: Some(print_f_call) }, int_ty, SourceLoc::UNKNOWN);

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

    let cx = CodegenCx::new(&context, &interner, &types, "s6_return_inside_try", CodegenFlags { mode: OutputMode::Jit, debug_info: false });
    let (ee, mangled_main) = build_and_jit(&cx, &module, &arena);

    // SAFETY: `main` takes no arguments and returns `i64`.
    let main_fn = unsafe { ee.get_function::<unsafe extern "C" fn() -> i64>(&mangled_main).expect("main not found") };
    let exit_code = unsafe { main_fn.call() };

    assert_eq!(exit_code, 42, "the try's finally-exit dispatch must re-perform the pending Return");
    assert_eq!(take_output(), "f", "finally's marker must print exactly once");
}
