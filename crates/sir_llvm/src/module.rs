//! L10 — the module driver (§4.10): `visit(Module)`'s six steps, wired
//! against every lower-level module this crate defines.
//!
//! Grounded on the teacher's `ModuleCompiler` (`compile_function`/
//! `declare_runtime`/`run_test` orchestration shape), generalized from its
//! single-pass "declare and fill as we go" style to SIR's explicit
//! declare-then-fill two-pass structure (§4.3's `registerGlobal` already
//! requires every global exist before any body is lowered, since a call can
//! reference a function defined later in the same module).

use std::path::Path;

use inkwell::module::Linkage;
use inkwell::targets::TargetTriple;
use sir_ir::{ArgVar, ExprArena, Func, FuncKind, Module as SirModule, Type, TypeId, Var};

use crate::aot::target::TargetConfig;
use crate::context::CodegenCx;
use crate::debug::{DebugInfoBuilder, DebugInfoConfig, DebugLevel};
use crate::error::LowerError;
use crate::expr_lowerer::ExprLowerer;
use crate::internal_functions::{lower_embedded_llm_function, lower_internal_function};
use crate::ir_builder::{IntCmp, IrBuilder};
use crate::mangle::Mangler;
use crate::runtime_decl::{CoroIntrinsics, RuntimeFunctions};
use crate::try_catch::TypeIndexAllocator;
use crate::value_id::{FunctionId, GlobalId};

/// Step 1: triple, data layout, debug unit. DWARF v2 on Darwin (the
/// platform's debugger still expects it), the config's own default
/// everywhere else.
fn configure_module_header<'ll>(
    cx: &CodegenCx<'ll, '_>,
    source_path: &Path,
    target: &TargetConfig,
    debug_level: DebugLevel,
) -> Result<Option<DebugInfoBuilder<'ll>>, LowerError> {
    let triple = TargetTriple::create(target.triple());
    cx.scx.llmod.set_triple(&triple);

    let machine = target.create_target_machine()?;
    let data_layout = machine.get_target_data().get_data_layout();
    cx.scx.llmod.set_data_layout(&data_layout);

    let dwarf_version = if target.components().is_darwin() { 2 } else { 4 };
    let debug_config = DebugInfoConfig { level: debug_level, optimized: false, dwarf_version };
    Ok(DebugInfoBuilder::new(&cx.scx.llmod, cx.scx.llcx, debug_config, source_path))
}

/// Step 2: register `ArgVar` if the module declares one, returning its
/// storage slot and record type for step 6 to populate.
fn register_arg_var(cx: &CodegenCx<'_, '_>, mangler: &Mangler, module_path: &str, module: &SirModule) -> Option<(GlobalId, TypeId)> {
    let ArgVar(var_id) = module.arg_var?;
    let var = module.get(var_id);
    cx.register_global_var(mangler, module_path, var);
    let global = cx.lookup_global(var_id)?;
    Some((global, var.ty))
}

/// Step 3: every `Var` gets a declaration (function) or zero-initialized
/// storage (data global) before any body is processed.
fn register_all_globals(cx: &CodegenCx<'_, '_>, mangler: &Mangler, module_path: &str, module: &SirModule) {
    for var in module.vars() {
        if cx.lookup_function(var.id).is_none() && cx.lookup_global(var.id).is_none() {
            cx.register_global_var(mangler, module_path, var);
        }
    }
}

fn attach_subprogram(cx: &CodegenCx<'_, '_>, debug: Option<&DebugInfoBuilder<'_>>, var: &Var, fn_id: FunctionId) {
    let Some(debug) = debug else { return };
    let fn_val = cx.get_function_value(fn_id);
    let name = cx.interner.resolve(var.name);
    let subroutine_ty = debug.subroutine_type(None, &[]);
    let is_local = fn_val.get_linkage() != Linkage::External;
    let subprogram = debug.create_subprogram(name, name, var.loc.line, subroutine_ty, is_local, true);
    fn_val.set_subprogram(subprogram);
}

fn func_return_type(cx: &CodegenCx<'_, '_>, func: &Func) -> TypeId {
    match cx.types.get(func.ty) {
        Type::Func { ret, .. } => *ret,
        _ => panic!("Func.ty did not resolve to Type::Func"),
    }
}

fn lower_bodied_function(
    cx: &CodegenCx<'_, '_>,
    builder: &IrBuilder<'_>,
    module: &SirModule,
    arena: &ExprArena,
    mangler: &Mangler,
    module_path: &str,
    runtime: &RuntimeFunctions,
    coro_intrinsics: &CoroIntrinsics,
    type_index: &TypeIndexAllocator,
    fn_id: FunctionId,
    func: &Func,
    params: &[sir_ir::VarId],
    body: sir_ir::ExprId,
) {
    let entry = builder.append_block(cx, fn_id, "entry");
    builder.position_at_end(cx, entry);
    let fn_val = cx.get_function_value(fn_id);

    let mut lowerer = ExprLowerer::new(
        cx,
        builder,
        module,
        arena,
        mangler,
        module_path,
        runtime,
        coro_intrinsics,
        type_index,
        runtime.seq_personality,
        func_return_type(cx, func),
        fn_id,
        entry,
    );
    for (i, &param_var) in params.iter().enumerate() {
        let i = u32::try_from(i).expect("parameter index fits u32");
        let param_val = fn_val.get_nth_param(i).unwrap_or_else(|| panic!("function missing parameter {i}"));
        let val_id = cx.push_value(param_val);
        lowerer.scope.bind_immutable(param_var, val_id);
    }

    let generator_promise_ty = match cx.types.get(lowerer.return_ty) {
        Type::Generator { base } => Some(*base),
        _ => None,
    };
    let start_block = match generator_promise_ty {
        Some(promise_ty) => lowerer.enter_generator(entry, promise_ty),
        None => entry,
    };
    let is_generator = generator_promise_ty.is_some();

    let (value, end_block) = lowerer.lower_flow(start_block, body);
    builder.position_at_end(cx, end_block);
    if !builder.current_block_terminated() {
        if is_generator {
            // A generator body that falls off the end without an explicit
            // final yield/return still has to reach the coroutine's exit
            // machinery rather than `ret`.
            let gen = lowerer.generator.expect("generator body always installs GeneratorState");
            builder.br(cx, gen.suspend_block);
        } else if cx.is_void_type(lowerer.return_ty) {
            builder.ret(cx, None);
        } else {
            builder.ret(cx, value);
        }
    }
}

/// Step 4: fills in the body of every `Var` that carries a `Func`,
/// dispatching on `FuncKind`. `External` needs nothing more than its
/// step-3 declaration; `DSLCustom` has no registered extension in this
/// backend.
#[allow(clippy::too_many_arguments)]
fn lower_function_bodies(
    cx: &CodegenCx<'_, '_>,
    builder: &IrBuilder<'_>,
    module: &SirModule,
    arena: &ExprArena,
    mangler: &Mangler,
    module_path: &str,
    runtime: &RuntimeFunctions,
    coro_intrinsics: &CoroIntrinsics,
    type_index: &TypeIndexAllocator,
    debug: Option<&DebugInfoBuilder<'_>>,
) -> Result<(), LowerError> {
    for var in module.funcs() {
        let func = var.func.as_ref().expect("funcs() only yields Vars with a Func");
        match &func.kind {
            FuncKind::Bodied { params, body } => {
                let fn_id = cx.lookup_function(var.id).expect("registered in step 3");
                lower_bodied_function(cx, builder, module, arena, mangler, module_path, runtime, coro_intrinsics, type_index, fn_id, func, params, *body);
                attach_subprogram(cx, debug, var, fn_id);
            }
            FuncKind::Internal { .. } => {
                let fn_id = cx.lookup_function(var.id).expect("registered in step 3");
                lower_internal_function(cx, builder, runtime, coro_intrinsics, fn_id, func);
            }
            FuncKind::LLMEmbedded { template } => {
                lower_embedded_llm_function(cx, mangler, module_path, var, func, template, debug)?;
            }
            FuncKind::External => {}
            FuncKind::DSLCustom { name } => {
                panic!("DSLCustom function `{}` has no registered extension lowerer in this backend", cx.interner.resolve(*name));
            }
        }
    }
    Ok(())
}

/// Step 5: `realMain` is a thin passthrough to the SIR-level main function
/// under a fixed, unmangled name, so `codon.proxy_main` never has to know
/// the mangling scheme.
fn materialize_real_main(cx: &CodegenCx<'_, '_>, builder: &IrBuilder<'_>, main_fn: FunctionId) -> FunctionId {
    let main_val = cx.get_function_value(main_fn);
    let real_main = cx.scx.llmod.add_function("realMain", main_val.get_type(), Some(Linkage::External));
    let real_main_id = cx.push_function(real_main);

    let entry = builder.append_block(cx, real_main_id, "entry");
    builder.position_at_end(cx, entry);
    let result = builder.call(cx, main_fn, &[], "call.main");
    builder.ret(cx, result);
    real_main_id
}

/// The exception-swallowing wrapper step 6 calls: invokes `realMain`, and
/// on unwind routes the exception object to `seq_terminate` instead of
/// letting it reach the process's default unwinder.
fn build_proxy_main(cx: &CodegenCx<'_, '_>, builder: &IrBuilder<'_>, runtime: &RuntimeFunctions, real_main_id: FunctionId) -> FunctionId {
    let fn_type = cx.scx.type_void_func(&[]);
    let proxy = cx.scx.llmod.add_function("codon.proxy_main", fn_type, Some(Linkage::Private));
    let proxy_id = cx.push_function(proxy);
    builder.set_personality(cx, proxy_id, runtime.seq_personality);

    let entry = builder.append_block(cx, proxy_id, "entry");
    let normal = builder.append_block(cx, proxy_id, "normal");
    let unwind = builder.append_block(cx, proxy_id, "unwind");

    builder.position_at_end(cx, entry);
    builder.invoke(cx, real_main_id, &[], normal, unwind, "call.real_main");

    builder.position_at_end(cx, normal);
    builder.ret(cx, None);

    builder.position_at_end(cx, unwind);
    let pad_ty = cx.pad_llvm_type();
    let null_clause = cx.push_value(cx.scx.type_ptr().const_null().into());
    let pad = builder.landingpad(cx, pad_ty, runtime.seq_personality, &[null_clause], true, "lpad");
    let exc_obj = builder.extract_value(cx, pad, 0);
    builder.call(cx, runtime.seq_terminate, &[exc_obj], "terminate");
    builder.unreachable();

    proxy_id
}

/// Fills in `buf[i] = {strlen(argv[i]), argv[i]}` for `i` in `0..argc`,
/// inside `main`'s body. Returns the block lowering continues from.
fn marshal_argv_loop(
    cx: &CodegenCx<'_, '_>,
    builder: &IrBuilder<'_>,
    main_id: FunctionId,
    entry: crate::value_id::BlockId,
    argc64: crate::value_id::ValueId,
    argv: crate::value_id::ValueId,
    buf: crate::value_id::ValueId,
    runtime: &RuntimeFunctions,
) {
    let i64_ty = cx.push_type(cx.scx.type_i64().into());
    let ptr_ty = cx.push_type(cx.scx.type_ptr().into());
    let string_ty = cx.push_type(cx.string_type().into());

    let induction = builder.create_entry_alloca(cx, entry, i64_ty, "argv.i");
    let zero = builder.const_int(cx, i64_ty, 0, true);
    builder.store(cx, induction, zero);

    let cond_bb = builder.append_block(cx, main_id, "argv.cond");
    let body_bb = builder.append_block(cx, main_id, "argv.body");
    let done_bb = builder.append_block(cx, main_id, "argv.done");
    builder.br(cx, cond_bb);

    builder.position_at_end(cx, cond_bb);
    let i_val = builder.load(cx, i64_ty, induction, "argv.i.load");
    let cmp = builder.icmp(cx, IntCmp::Lt, i_val, argc64, true);
    builder.cond_br(cx, cmp, body_bb, done_bb);

    builder.position_at_end(cx, body_bb);
    let argv_i_ptr = builder.gep_index(cx, ptr_ty, argv, i_val, "argv.i.ptr");
    let argv_i = builder.load(cx, ptr_ty, argv_i_ptr, "argv.i.val");
    let len = builder.call(cx, runtime.strlen, &[argv_i], "argv.i.len").expect("strlen returns a value");
    let slot = builder.gep_index(cx, string_ty, buf, i_val, "argv.slot");
    let str_struct = builder.undef_struct(cx, string_ty);
    let str_struct = builder.insert_value(cx, str_struct, len, 0);
    let str_struct = builder.insert_value(cx, str_struct, argv_i, 1);
    builder.store(cx, slot, str_struct);
    let one = builder.const_int(cx, i64_ty, 1, true);
    let next_i = builder.iadd(cx, i_val, one);
    builder.store(cx, induction, next_i);
    builder.br(cx, cond_bb);

    builder.position_at_end(cx, done_bb);
}

/// Step 6: the canonical `main(i32 argc, i8** argv)` entry point.
fn build_canonical_main(
    cx: &CodegenCx<'_, '_>,
    builder: &IrBuilder<'_>,
    runtime: &RuntimeFunctions,
    arg_var: Option<(GlobalId, TypeId)>,
    proxy_main_id: FunctionId,
    init_flags: u32,
) -> FunctionId {
    let i32_ty_ll = cx.scx.type_i32();
    let param_types = [i32_ty_ll.into(), cx.scx.type_ptr().into()];
    let fn_type = i32_ty_ll.fn_type(&param_types, false);
    let main_val = cx.scx.llmod.add_function("main", fn_type, Some(Linkage::External));
    let main_id = cx.push_function(main_val);

    let entry = builder.append_block(cx, main_id, "entry");
    builder.position_at_end(cx, entry);

    let argc = cx.push_value(main_val.get_nth_param(0).expect("main has an argc param"));
    let argv = cx.push_value(main_val.get_nth_param(1).expect("main has an argv param"));

    let i64_ty = cx.push_type(cx.scx.type_i64().into());
    let argc64 = builder.int_cast(cx, argc, i64_ty, true);
    let string_ty = cx.push_type(cx.string_type().into());
    let buf = builder.create_entry_array_alloca(cx, entry, string_ty, argc64, "argv.buf");
    builder.position_at_end(cx, entry);

    marshal_argv_loop(cx, builder, main_id, entry, argc64, argv, buf, runtime);

    if let Some((global, var_ty)) = arg_var {
        let agg_ty = cx.lower_type(var_ty);
        let undef = builder.undef_struct(cx, agg_ty);
        let with_len = builder.insert_value(cx, undef, argc64, 0);
        let full = builder.insert_value(cx, with_len, buf, 1);
        let global_ptr = builder.global_ptr(cx, global);
        builder.store(cx, global_ptr, full);
    }

    let i32_ty = cx.push_type(i32_ty_ll.into());
    let flags = builder.const_int(cx, i32_ty, i64::from(init_flags), false);
    builder.call(cx, runtime.seq_init, &[flags], "init");
    builder.call(cx, proxy_main_id, &[], "run");

    let zero32 = builder.const_int(cx, i32_ty, 0, true);
    builder.ret(cx, Some(zero32));
    main_id
}

/// `visit(Module)` (§4.10): runs all six steps in order, leaving `cx`'s
/// module ready for the output backend (L11) to write out or JIT-execute.
pub fn lower_module(
    cx: &CodegenCx<'_, '_>,
    module: &SirModule,
    arena: &ExprArena,
    module_path: &str,
    source_path: &Path,
    target: &TargetConfig,
    debug_level: DebugLevel,
) -> Result<(), LowerError> {
    let debug = configure_module_header(cx, source_path, target, debug_level)?;
    let mangler = Mangler::new();
    let runtime = cx.declare_runtime();
    let coro_intrinsics = cx.declare_coro_intrinsics();
    let type_index = TypeIndexAllocator::new();
    let builder = IrBuilder::new(cx);

    let arg_var_global = register_arg_var(cx, &mangler, module_path, module);
    register_all_globals(cx, &mangler, module_path, module);

    lower_function_bodies(cx, &builder, module, arena, &mangler, module_path, &runtime, &coro_intrinsics, &type_index, debug.as_ref())?;

    let main_var_id = module.main_func.expect("module has a designated main function");
    let main_fn_id = cx.lookup_function(main_var_id).expect("main function registered in step 3");
    let real_main_id = materialize_real_main(cx, &builder, main_fn_id);

    let proxy_main_id = build_proxy_main(cx, &builder, &runtime, real_main_id);
    build_canonical_main(cx, &builder, &runtime, arg_var_global, proxy_main_id, cx.flags.init_flags());

    if let Some(debug) = &debug {
        debug.finalize();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::context::Context;
    use sir_ir::{ExprArena, Flow, FuncAttrs, Name, SourceLoc, StringInterner, TypeStore, VarId};

    use crate::test_support::harness;

    #[test]
    fn register_all_globals_declares_every_var_exactly_once() {
        let context = Context::create();
        let mut interner = StringInterner::new();
        let mut types = TypeStore::new();
        let int_ty = types.int();
        let fn_ty = types.push(Type::Func { args: vec![], ret: int_ty, variadic: false });
        let h = harness(&context, &interner, &types);
        let mangler = Mangler::new();

        let func_var = VarId(0);
        let data_var = VarId(1);
        let mut module = SirModule::new(Name::EMPTY, Name::EMPTY);
        module.push_var(Var {
            id: func_var,
            name: interner.intern("f"),
            loc: SourceLoc::UNKNOWN,
            ty: fn_ty,
            global: true,
            func: Some(Func { attrs: FuncAttrs::default(), kind: FuncKind::External, ty: fn_ty }),
        });
        module.push_var(Var { id: data_var, name: interner.intern("g"), loc: SourceLoc::UNKNOWN, ty: int_ty, global: true, func: None });

        register_all_globals(&h.cx, &mangler, "mod", &module);
        assert!(h.cx.lookup_function(func_var).is_some());
        assert!(h.cx.lookup_global(data_var).is_some());

        // Re-running must not re-declare anything already registered.
        let fn_id_before = h.cx.lookup_function(func_var);
        register_all_globals(&h.cx, &mangler, "mod", &module);
        assert_eq!(h.cx.lookup_function(func_var), fn_id_before);
    }

    #[test]
    fn lower_bodied_function_falls_off_the_end_into_a_ret() {
        let context = Context::create();
        let mut interner = StringInterner::new();
        let mut types = TypeStore::new();
        let int_ty = types.int();
        let fn_ty = types.push(Type::Func { args: vec![], ret: int_ty, variadic: false });
        let h = harness(&context, &interner, &types);
        let mangler = Mangler::new();

        let func_var = VarId(0);
        let mut module = SirModule::new(Name::EMPTY, Name::EMPTY);
        let mut arena = ExprArena::new();
        let body = arena.push(Flow::IntConst(42), int_ty, SourceLoc::UNKNOWN);
        let func = Func { attrs: FuncAttrs::default(), kind: FuncKind::Bodied { params: vec![], body }, ty: fn_ty };
        module.push_var(Var { id: func_var, name: interner.intern("f"), loc: SourceLoc::UNKNOWN, ty: fn_ty, global: true, func: Some(func.clone()) });

        h.cx.register_global_var(&mangler, "mod", module.get(func_var));
        let fn_id = h.cx.lookup_function(func_var).expect("registered above");

        lower_bodied_function(&h.cx, &h.builder, &module, &arena, &mangler, "mod", &h.runtime, &h.coro_intrinsics, &h.type_index, fn_id, &func, &[], body);

        let ir = h.cx.scx.llmod.print_to_string().to_string();
        assert!(ir.contains("ret i64"), "a body that falls off the end returns its last value:\n{ir}");
    }

    #[test]
    fn lower_bodied_function_for_a_generator_falls_off_into_the_suspend_block() {
        let context = Context::create();
        let mut interner = StringInterner::new();
        let mut types = TypeStore::new();
        let int_ty = types.int();
        let gen_ty = types.push(Type::Generator { base: int_ty });
        let fn_ty = types.push(Type::Func { args: vec![], ret: gen_ty, variadic: false });
        let h = harness(&context, &interner, &types);
        let mangler = Mangler::new();

        let func_var = VarId(0);
        let mut module = SirModule::new(Name::EMPTY, Name::EMPTY);
        let mut arena = ExprArena::new();
        let body = arena.push(Flow::Series(vec![]), gen_ty, SourceLoc::UNKNOWN);
        let func = Func { attrs: FuncAttrs::default(), kind: FuncKind::Bodied { params: vec![], body }, ty: fn_ty };
        module.push_var(Var { id: func_var, name: interner.intern("g"), loc: SourceLoc::UNKNOWN, ty: fn_ty, global: true, func: Some(func.clone()) });

        h.cx.register_global_var(&mangler, "mod", module.get(func_var));
        let fn_id = h.cx.lookup_function(func_var).expect("registered above");

        lower_bodied_function(&h.cx, &h.builder, &module, &arena, &mangler, "mod", &h.runtime, &h.coro_intrinsics, &h.type_index, fn_id, &func, &[], body);

        let ir = h.cx.scx.llmod.print_to_string().to_string();
        assert!(!ir.contains("ret i64"), "a generator body never falls off into a plain ret:\n{ir}");
    }

    #[test]
    fn materialize_real_main_wraps_the_sir_main_function() {
        let context = Context::create();
        let interner = StringInterner::new();
        let mut types = TypeStore::new();
        let int_ty = types.int();
        let fn_ty = types.push(Type::Func { args: vec![], ret: int_ty, variadic: false });
        let h = harness(&context, &interner, &types);
        let fn_llty = h.cx.function_llvm_type(fn_ty);
        let main_val = h.cx.scx.llmod.add_function("sir_main", fn_llty, None);
        let main_fn = h.cx.push_function(main_val);

        let real_main = materialize_real_main(&h.cx, &h.builder, main_fn);
        let ir = h.cx.scx.llmod.print_to_string().to_string();
        assert!(ir.contains("@realMain"), "the wrapper must be named realMain:\n{ir}");
        assert!(ir.contains("@sir_main"), "realMain must call through to the SIR-level main function:\n{ir}");
        let _ = real_main;
    }

    #[test]
    fn build_proxy_main_invokes_real_main_and_terminates_on_unwind() {
        let context = Context::create();
        let interner = StringInterner::new();
        let types = TypeStore::new();
        let h = harness(&context, &interner, &types);
        let void_fn_ty = h.cx.scx.type_void_func(&[]);
        let real_main_val = h.cx.scx.llmod.add_function("realMain", void_fn_ty, None);
        let real_main_id = h.cx.push_function(real_main_val);

        build_proxy_main(&h.cx, &h.builder, &h.runtime, real_main_id);
        let ir = h.cx.scx.llmod.print_to_string().to_string();
        assert!(ir.contains("invoke"), "proxy_main must invoke realMain, not plain-call it:\n{ir}");
        assert!(ir.contains("landingpad"), "proxy_main's unwind path needs a landing pad:\n{ir}");
        assert!(ir.contains("@seq_terminate"), "an uncaught exception reaching proxy_main is routed to seq_terminate:\n{ir}");
    }

    #[test]
    fn marshal_argv_loop_builds_a_counted_loop_calling_strlen() {
        let context = Context::create();
        let interner = StringInterner::new();
        let types = TypeStore::new();
        let h = harness(&context, &interner, &types);
        let fn_type = h.cx.scx.type_void_func(&[h.cx.scx.type_i64().into(), h.cx.scx.type_ptr().into(), h.cx.scx.type_ptr().into()]);
        let main_val = h.cx.scx.llmod.add_function("marshal_test", fn_type, None);
        let main_id = h.cx.push_function(main_val);
        let entry = h.builder.append_block(&h.cx, main_id, "entry");
        h.builder.position_at_end(&h.cx, entry);

        let argc64 = h.cx.push_value(main_val.get_nth_param(0).unwrap());
        let argv = h.cx.push_value(main_val.get_nth_param(1).unwrap());
        let buf = h.cx.push_value(main_val.get_nth_param(2).unwrap());

        marshal_argv_loop(&h.cx, &h.builder, main_id, entry, argc64, argv, buf, &h.runtime);

        let ir = h.cx.scx.llmod.print_to_string().to_string();
        assert!(ir.contains("argv.cond"));
        assert!(ir.contains("argv.body"));
        assert!(ir.contains("argv.done"));
        assert!(ir.contains("@strlen"), "each iteration must measure the argument string with strlen:\n{ir}");
    }

    #[test]
    fn build_canonical_main_initializes_the_runtime_and_calls_the_proxy() {
        let context = Context::create();
        let interner = StringInterner::new();
        let types = TypeStore::new();
        let h = harness(&context, &interner, &types);
        let void_fn_ty = h.cx.scx.type_void_func(&[]);
        let proxy_val = h.cx.scx.llmod.add_function("codon.proxy_main", void_fn_ty, None);
        let proxy_id = h.cx.push_function(proxy_val);

        let main_id = build_canonical_main(&h.cx, &h.builder, &h.runtime, None, proxy_id, 0);
        let main_val = h.cx.get_function_value(main_id);
        assert_eq!(main_val.get_name().to_str().unwrap(), "main");

        let ir = h.cx.scx.llmod.print_to_string().to_string();
        assert!(ir.contains("@seq_init"), "main must initialize the runtime before running anything:\n{ir}");
        assert!(ir.contains("@codon.proxy_main"), "main must run the proxy wrapper, never realMain directly:\n{ir}");
    }
}
