//! L9 — internal/builtin function synthesis + embedded-LLM ingestion (§4.9).
//!
//! `FuncKind::Internal{pattern}` carries no SIR body and no named
//! parameters — just a pattern tag plus the function's own `Func` type
//! (`Var::ty`). Every pattern here reads its operands straight off the LLM
//! function's own parameter list (`get_nth_param`) since there's no
//! `ExprArena` to walk for these. Grounded on the teacher's
//! `declare.rs::declare_runtime_functions` predeclared-table shape, adapted:
//! these bodies are *filled*, not merely declared.
//!
//! `FuncKind::LLMEmbedded{template}` is the textual sibling: a template
//! string rendered against the function's own mangled name and lowered
//! argument/return type syntax, parsed as LLM IR text, and linked into the
//! current module.

use inkwell::module::Linkage;
use sir_ir::{Func, FuncKind, InternalPattern, Type, Var};

use crate::constants::lower_sizeof;
use crate::context::CodegenCx;
use crate::debug::DebugInfoBuilder;
use crate::declare::add_enum_attr;
use crate::error::LowerError;
use crate::ir_builder::IrBuilder;
use crate::mangle::Mangler;
use crate::runtime_decl::{CoroIntrinsics, RuntimeFunctions};
use crate::value_id::{BlockId, FunctionId, ValueId};

fn begin_synthetic_body(
    cx: &CodegenCx<'_, '_>,
    builder: &IrBuilder<'_>,
    fn_id: FunctionId,
    arity: u32,
) -> (BlockId, Vec<ValueId>) {
    let entry = builder.append_block(cx, fn_id, "entry");
    builder.position_at_end(cx, entry);
    let fn_val = cx.get_function_value(fn_id);
    let params = (0..arity)
        .map(|i| {
            let param = fn_val.get_nth_param(i).unwrap_or_else(|| panic!("internal function missing parameter {i}"));
            cx.push_value(param)
        })
        .collect();
    (entry, params)
}

/// `Pointer<T>.__new__(Int n)`: `seq_alloc(n * sizeof(T))`, cast to `T*`.
fn lower_pointer_new(cx: &CodegenCx<'_, '_>, builder: &IrBuilder<'_>, runtime: &RuntimeFunctions, fn_id: FunctionId, func: &Func) {
    let Type::Func { ret, .. } = cx.types.get(func.ty) else {
        panic!("PointerNew Var does not carry a Func type");
    };
    let Type::Pointer { base } = cx.types.get(*ret) else {
        panic!("PointerNew's return type is not Pointer<T>");
    };
    let base = *base;
    let ret_ty = *ret;

    let (_, params) = begin_synthetic_body(cx, builder, fn_id, 1);
    let n = params[0];
    let elem_size = lower_sizeof(cx, base);
    let total = builder.imul(cx, n, elem_size);
    let raw = builder.call(cx, runtime.seq_alloc, &[total], "ptr.new").expect("seq_alloc returns a value");
    let target_ty = cx.lower_type(ret_ty);
    let result = builder.bitcast(cx, raw, target_ty);
    builder.ret(cx, Some(result));
}

/// `Int.__new__(IntN<n>)`: sign/zero extend or truncate to `i64`.
fn lower_int_from_intn(cx: &CodegenCx<'_, '_>, builder: &IrBuilder<'_>, fn_id: FunctionId, func: &Func) {
    let Type::Func { args, .. } = cx.types.get(func.ty) else {
        panic!("IntFromIntN Var does not carry a Func type");
    };
    let Type::IntN { bits, signed } = cx.types.get(args[0]) else {
        panic!("IntFromIntN's parameter is not IntN");
    };
    let (bits, signed) = (*bits, *signed);

    let (_, params) = begin_synthetic_body(cx, builder, fn_id, 1);
    let n = params[0];
    let i64_ty = cx.push_type(cx.scx.type_i64().into());
    let result = if bits > 64 { builder.truncate(cx, n, i64_ty) } else { builder.int_cast(cx, n, i64_ty, signed) };
    builder.ret(cx, Some(result));
}

/// `IntN<n>.__new__(Int)`: sign/zero extend or truncate to the target width.
fn lower_intn_from_int(cx: &CodegenCx<'_, '_>, builder: &IrBuilder<'_>, fn_id: FunctionId, func: &Func) {
    let Type::Func { ret, .. } = cx.types.get(func.ty) else {
        panic!("IntNFromInt Var does not carry a Func type");
    };
    let Type::IntN { bits, signed } = cx.types.get(*ret) else {
        panic!("IntNFromInt's return type is not IntN");
    };
    let (bits, signed) = (*bits, *signed);
    let ret_ty = *ret;

    let (_, params) = begin_synthetic_body(cx, builder, fn_id, 1);
    let n = params[0];
    let target_ty = cx.lower_type(ret_ty);
    let result = if bits < 64 { builder.truncate(cx, n, target_ty) } else { builder.int_cast(cx, n, target_ty, signed) };
    builder.ret(cx, Some(result));
}

/// `Ref.__new__()`: `seq_alloc(sizeof(contents))`.
fn lower_ref_new(cx: &CodegenCx<'_, '_>, builder: &IrBuilder<'_>, runtime: &RuntimeFunctions, fn_id: FunctionId, func: &Func) {
    let Type::Func { ret, .. } = cx.types.get(func.ty) else {
        panic!("RefNew Var does not carry a Func type");
    };
    let Type::Ref { contents } = cx.types.get(*ret) else {
        panic!("RefNew's return type is not Ref<T>");
    };
    let contents = *contents;
    let ret_ty = *ret;

    let (_, _params) = begin_synthetic_body(cx, builder, fn_id, 0);
    let size = lower_sizeof(cx, contents);
    let raw = builder.call(cx, runtime.seq_alloc, &[size], "ref.new").expect("seq_alloc returns a value");
    let target_ty = cx.lower_type(ret_ty);
    let result = builder.bitcast(cx, raw, target_ty);
    builder.ret(cx, Some(result));
}

/// `Generator<T>.__promise__(Generator<T>)`: `coro.promise`, cast to `T*`
/// (a null pointer without a call when `T` is `Void`, since there's nothing
/// for the promise slot to hold).
fn lower_generator_promise(cx: &CodegenCx<'_, '_>, builder: &IrBuilder<'_>, coro_intrinsics: &CoroIntrinsics, fn_id: FunctionId, func: &Func) {
    let Type::Func { ret, .. } = cx.types.get(func.ty) else {
        panic!("GeneratorPromise Var does not carry a Func type");
    };
    let Type::Pointer { base } = cx.types.get(*ret) else {
        panic!("GeneratorPromise's return type is not Pointer<T>");
    };
    let base = *base;
    let ret_ty = *ret;

    let (_, params) = begin_synthetic_body(cx, builder, fn_id, 1);
    let handle = params[0];
    let target_ty = cx.lower_type(ret_ty);

    if cx.is_void_type(base) {
        let null_ptr = cx.push_value(cx.get_type_value(target_ty).into_pointer_type().const_null().into());
        builder.ret(cx, Some(null_ptr));
        return;
    }

    let i32_ty = cx.push_type(cx.scx.type_i32().into());
    let align0 = builder.const_int(cx, i32_ty, 0, true);
    let from_handle = builder.const_bool(cx, false);
    let promise_ptr = builder
        .call(cx, coro_intrinsics.seq_coro_promise, &[handle, align0, from_handle], "promise")
        .expect("seq_coro_promise returns a value");
    let result = builder.bitcast(cx, promise_ptr, target_ty);
    builder.ret(cx, Some(result));
}

/// `Record<...>.__new__(...)`: build the struct by successive insert-value,
/// one field per positional parameter, in declaration order.
fn lower_record_new(cx: &CodegenCx<'_, '_>, builder: &IrBuilder<'_>, fn_id: FunctionId, func: &Func) {
    let Type::Func { args, ret, .. } = cx.types.get(func.ty) else {
        panic!("RecordNew Var does not carry a Func type");
    };
    let arity = u32::try_from(args.len()).expect("record field count fits u32");
    let ret_ty = *ret;

    let (_, params) = begin_synthetic_body(cx, builder, fn_id, arity);
    let struct_ty = cx.lower_type(ret_ty);
    let mut agg = builder.undef_struct(cx, struct_ty);
    for (i, &field_val) in params.iter().enumerate() {
        let index = u32::try_from(i).expect("field index fits u32");
        agg = builder.insert_value(cx, agg, field_val, index);
    }
    builder.ret(cx, Some(agg));
}

/// Fills the body of a `FuncKind::Internal` function. The declaration
/// (parameter/return types) must already exist via
/// `CodegenCx::register_global_var`; this only appends an entry block,
/// emits the pattern's body, and re-applies §4.9's always-inline rule, which
/// supersedes whatever `FuncAttrs` the `Var` itself carries.
pub fn lower_internal_function(
    cx: &CodegenCx<'_, '_>,
    builder: &IrBuilder<'_>,
    runtime: &RuntimeFunctions,
    coro_intrinsics: &CoroIntrinsics,
    fn_id: FunctionId,
    func: &Func,
) {
    let pattern = match &func.kind {
        FuncKind::Internal { pattern } => *pattern,
        _ => panic!("lower_internal_function called on a non-Internal FuncKind"),
    };

    match pattern {
        InternalPattern::PointerNew => lower_pointer_new(cx, builder, runtime, fn_id, func),
        InternalPattern::IntFromIntN => lower_int_from_intn(cx, builder, fn_id, func),
        InternalPattern::IntNFromInt => lower_intn_from_int(cx, builder, fn_id, func),
        InternalPattern::RefNew => lower_ref_new(cx, builder, runtime, fn_id, func),
        InternalPattern::GeneratorPromise => lower_generator_promise(cx, builder, coro_intrinsics, fn_id, func),
        InternalPattern::RecordNew => lower_record_new(cx, builder, fn_id, func),
    }

    let fn_val = cx.get_function_value(fn_id);
    fn_val.set_linkage(cx.flags.default_linkage());
    add_enum_attr(cx.scx.llcx, fn_val, "alwaysinline");
}

/// Textual LLM type syntax for a SIR `TypeId`, used only to render embedded
/// templates — mirrors `types.rs`'s own lowering table but as IR text
/// instead of an inkwell type construction, since the template is parsed
/// fresh rather than built through the arena.
fn llvm_type_syntax(cx: &CodegenCx<'_, '_>, ty: sir_ir::TypeId) -> String {
    match cx.types.get(ty) {
        Type::Int => "i64".to_string(),
        Type::Float => "double".to_string(),
        Type::Bool => "i1".to_string(),
        Type::Byte => "i8".to_string(),
        Type::Void => "{}".to_string(),
        Type::IntN { bits, .. } => format!("i{bits}"),
        Type::Pointer { .. } | Type::Generator { .. } | Type::Ref { .. } | Type::Func { .. } => "ptr".to_string(),
        Type::Optional { base } => format!("{{i1, {}}}", llvm_type_syntax(cx, *base)),
        Type::Record { name, .. } | Type::DSLCustom { name } => format!("%{}", cx.interner.resolve(*name)),
        Type::Placeholder => unreachable!("Placeholder type reached embedded-LLM template rendering"),
    }
}

/// Fills in `{name}`/`{ret}`/`{argN}` placeholders with the function's own
/// mangled name and lowered type syntax. Static int/string literals are
/// expected to already be present as literal IR text in the template — this
/// backend only ever has type/name information to contribute, not values.
fn render_embedded_template(cx: &CodegenCx<'_, '_>, mangled_name: &str, func: &Func, template: &str) -> String {
    let Type::Func { args, ret, .. } = cx.types.get(func.ty) else {
        panic!("LLMEmbedded Var does not carry a Func type");
    };
    let mut rendered = template.replace("{name}", mangled_name);
    let ret_name = if cx.is_void_type(*ret) { "void".to_string() } else { llvm_type_syntax(cx, *ret) };
    rendered = rendered.replace("{ret}", &ret_name);
    for (i, &arg_ty) in args.iter().enumerate() {
        rendered = rendered.replace(&format!("{{arg{i}}}"), &llvm_type_syntax(cx, arg_ty));
    }
    rendered
}

/// Ingests a `FuncKind::LLMEmbedded` function: renders its template, parses
/// it as a standalone LLM IR module, links that module in, then re-fetches
/// the resulting `FunctionValue` by its mangled name — linking may replace
/// the declaration `register_global_var` emitted earlier with a distinct
/// LLM object, so the old `FunctionId`'s handle cannot be trusted past this
/// call. Applies the same linkage/attribute policy as an ordinary function
/// (no forced always-inline, unlike the `Internal` patterns above) and, if
/// debug info is enabled, attaches a synthetic subprogram record so the
/// function carries at least function-level debug info.
#[allow(clippy::too_many_arguments)]
pub fn lower_embedded_llm_function(
    cx: &CodegenCx<'_, '_>,
    mangler: &Mangler,
    module_path: &str,
    var: &Var,
    func: &Func,
    template: &str,
    debug: Option<&DebugInfoBuilder<'_>>,
) -> Result<FunctionId, LowerError> {
    let fn_name = cx.interner.resolve(var.name);
    let mangled = mangler.mangle_function(module_path, fn_name);
    let rendered = render_embedded_template(cx, &mangled, func, template);

    let buf = inkwell::memory_buffer::MemoryBuffer::create_from_memory_range_copy(rendered.as_bytes(), &mangled);
    let temp_module =
        cx.scx.llcx.create_module_from_ir(buf).map_err(|e| LowerError::Compilation { detail: e.to_string() })?;
    cx.scx.llmod.link_in_module(temp_module).map_err(|e| LowerError::Compilation { detail: e.to_string() })?;

    let fn_val = cx
        .scx
        .llmod
        .get_function(&mangled)
        .unwrap_or_else(|| panic!("embedded LLM function `{mangled}` not present after linking"));
    let fn_id = cx.push_function(fn_val);
    cx.register_function(var.id, fn_id);

    fn_val.set_linkage(cx.linkage_for(&func.attrs));
    cx.apply_func_attrs(fn_val, &func.attrs);

    if let Some(debug) = debug {
        let subroutine_ty = debug.subroutine_type(None, &[]);
        let is_local = !func.attrs.export || fn_val.get_linkage() != Linkage::External;
        let subprogram = debug.create_subprogram(fn_name, &mangled, 0, subroutine_ty, is_local, true);
        fn_val.set_subprogram(subprogram);
    }

    Ok(fn_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell::context::Context;
    use sir_ir::{FuncAttrs, StringInterner, TypeStore};

    use crate::test_support::harness;

    fn declare_undeclared(h: &crate::test_support::Harness<'_, '_>, name: &str, fn_ty: sir_ir::TypeId) -> FunctionId {
        let fn_llty = h.cx.function_llvm_type(fn_ty);
        let fn_val = h.cx.scx.llmod.add_function(name, fn_llty, None);
        h.cx.push_function(fn_val)
    }

    #[test]
    fn pointer_new_scales_the_allocation_by_element_size_and_returns_it() {
        let context = Context::create();
        let interner = StringInterner::new();
        let mut types = TypeStore::new();
        let int_ty = types.int();
        let ptr_ty = types.push(Type::Pointer { base: int_ty });
        let fn_ty = types.push(Type::Func { args: vec![int_ty], ret: ptr_ty, variadic: false });
        let h = harness(&context, &interner, &types);
        let fn_id = declare_undeclared(&h, "ptr_new", fn_ty);
        let func = Func { attrs: FuncAttrs::default(), kind: FuncKind::Internal { pattern: InternalPattern::PointerNew }, ty: fn_ty };

        lower_internal_function(&h.cx, &h.builder, &h.runtime, &h.coro_intrinsics, fn_id, &func);

        let ir = h.cx.scx.llmod.print_to_string().to_string();
        assert!(ir.contains("mul"), "the requested count must be scaled by the element size:\n{ir}");
        assert!(ir.contains("call") && ir.contains("@seq_alloc"), "PointerNew must allocate through seq_alloc:\n{ir}");
        assert!(ir.contains("ret ptr"), "PointerNew returns the allocated pointer:\n{ir}");
    }

    #[test]
    fn int_from_intn_truncates_a_source_wider_than_64_bits() {
        let context = Context::create();
        let interner = StringInterner::new();
        let mut types = TypeStore::new();
        let int_ty = types.int();
        let wide_ty = types.push(Type::IntN { bits: 128, signed: true });
        let fn_ty = types.push(Type::Func { args: vec![wide_ty], ret: int_ty, variadic: false });
        let h = harness(&context, &interner, &types);
        let fn_id = declare_undeclared(&h, "int_from_i128", fn_ty);
        let func = Func { attrs: FuncAttrs::default(), kind: FuncKind::Internal { pattern: InternalPattern::IntFromIntN }, ty: fn_ty };

        lower_internal_function(&h.cx, &h.builder, &h.runtime, &h.coro_intrinsics, fn_id, &func);

        let ir = h.cx.scx.llmod.print_to_string().to_string();
        assert!(ir.contains("trunc"), "a source wider than i64 must be truncated down to it:\n{ir}");
    }

    #[test]
    fn int_from_intn_sign_extends_a_narrower_signed_source() {
        let context = Context::create();
        let interner = StringInterner::new();
        let mut types = TypeStore::new();
        let int_ty = types.int();
        let narrow_ty = types.push(Type::IntN { bits: 32, signed: true });
        let fn_ty = types.push(Type::Func { args: vec![narrow_ty], ret: int_ty, variadic: false });
        let h = harness(&context, &interner, &types);
        let fn_id = declare_undeclared(&h, "int_from_i32", fn_ty);
        let func = Func { attrs: FuncAttrs::default(), kind: FuncKind::Internal { pattern: InternalPattern::IntFromIntN }, ty: fn_ty };

        lower_internal_function(&h.cx, &h.builder, &h.runtime, &h.coro_intrinsics, fn_id, &func);

        let ir = h.cx.scx.llmod.print_to_string().to_string();
        assert!(ir.contains("sext"), "a narrower signed source must be sign-extended:\n{ir}");
    }

    #[test]
    fn intn_from_int_truncates_to_a_narrower_width() {
        let context = Context::create();
        let interner = StringInterner::new();
        let mut types = TypeStore::new();
        let int_ty = types.int();
        let narrow_ty = types.push(Type::IntN { bits: 16, signed: false });
        let fn_ty = types.push(Type::Func { args: vec![int_ty], ret: narrow_ty, variadic: false });
        let h = harness(&context, &interner, &types);
        let fn_id = declare_undeclared(&h, "i16_from_int", fn_ty);
        let func = Func { attrs: FuncAttrs::default(), kind: FuncKind::Internal { pattern: InternalPattern::IntNFromInt }, ty: fn_ty };

        lower_internal_function(&h.cx, &h.builder, &h.runtime, &h.coro_intrinsics, fn_id, &func);

        let ir = h.cx.scx.llmod.print_to_string().to_string();
        assert!(ir.contains("trunc"), "a target narrower than i64 must be truncated down to it:\n{ir}");
    }

    #[test]
    fn ref_new_allocates_sizeof_contents() {
        let context = Context::create();
        let interner = StringInterner::new();
        let mut types = TypeStore::new();
        let int_ty = types.int();
        let ref_ty = types.push(Type::Ref { contents: int_ty });
        let fn_ty = types.push(Type::Func { args: vec![], ret: ref_ty, variadic: false });
        let h = harness(&context, &interner, &types);
        let fn_id = declare_undeclared(&h, "ref_new", fn_ty);
        let func = Func { attrs: FuncAttrs::default(), kind: FuncKind::Internal { pattern: InternalPattern::RefNew }, ty: fn_ty };

        lower_internal_function(&h.cx, &h.builder, &h.runtime, &h.coro_intrinsics, fn_id, &func);

        let ir = h.cx.scx.llmod.print_to_string().to_string();
        assert!(ir.contains("@seq_alloc"), "RefNew must allocate through seq_alloc:\n{ir}");
        assert!(ir.contains("ret ptr"), "RefNew returns the allocated pointer:\n{ir}");
    }

    #[test]
    fn generator_promise_with_a_void_base_returns_null_without_calling_the_intrinsic() {
        let context = Context::create();
        let interner = StringInterner::new();
        let mut types = TypeStore::new();
        let void_ty = types.void();
        let gen_ty = types.push(Type::Generator { base: void_ty });
        let ptr_ty = types.push(Type::Pointer { base: void_ty });
        let fn_ty = types.push(Type::Func { args: vec![gen_ty], ret: ptr_ty, variadic: false });
        let h = harness(&context, &interner, &types);
        let fn_id = declare_undeclared(&h, "promise_void", fn_ty);
        let func = Func { attrs: FuncAttrs::default(), kind: FuncKind::Internal { pattern: InternalPattern::GeneratorPromise }, ty: fn_ty };

        lower_internal_function(&h.cx, &h.builder, &h.runtime, &h.coro_intrinsics, fn_id, &func);

        let ir = h.cx.scx.llmod.print_to_string().to_string();
        assert!(!ir.contains("@seq_coro_promise"), "a Void promise slot holds nothing, so the intrinsic is never called:\n{ir}");
        assert!(ir.contains("ret ptr null"), "a Void promise slot lowers to a null pointer:\n{ir}");
    }

    #[test]
    fn generator_promise_with_a_non_void_base_calls_the_promise_intrinsic() {
        let context = Context::create();
        let interner = StringInterner::new();
        let mut types = TypeStore::new();
        let int_ty = types.int();
        let gen_ty = types.push(Type::Generator { base: int_ty });
        let ptr_ty = types.push(Type::Pointer { base: int_ty });
        let fn_ty = types.push(Type::Func { args: vec![gen_ty], ret: ptr_ty, variadic: false });
        let h = harness(&context, &interner, &types);
        let fn_id = declare_undeclared(&h, "promise_int", fn_ty);
        let func = Func { attrs: FuncAttrs::default(), kind: FuncKind::Internal { pattern: InternalPattern::GeneratorPromise }, ty: fn_ty };

        lower_internal_function(&h.cx, &h.builder, &h.runtime, &h.coro_intrinsics, fn_id, &func);

        let ir = h.cx.scx.llmod.print_to_string().to_string();
        assert!(ir.contains("@seq_coro_promise"), "a non-Void promise slot must read the handle's coroutine promise:\n{ir}");
    }

    #[test]
    fn record_new_inserts_each_field_in_declaration_order() {
        let context = Context::create();
        let mut interner = StringInterner::new();
        let mut types = TypeStore::new();
        let int_ty = types.int();
        let record_name = interner.intern("Point");
        let record_id = types.reserve(record_name);
        types.fill(
            record_id,
            Type::Record {
                name: record_name,
                fields: vec![
                    sir_ir::Field { name: interner.intern("x"), ty: int_ty },
                    sir_ir::Field { name: interner.intern("y"), ty: int_ty },
                ],
            },
        );
        let fn_ty = types.push(Type::Func { args: vec![int_ty, int_ty], ret: record_id, variadic: false });
        let h = harness(&context, &interner, &types);
        let fn_id = declare_undeclared(&h, "point_new", fn_ty);
        let func = Func { attrs: FuncAttrs::default(), kind: FuncKind::Internal { pattern: InternalPattern::RecordNew }, ty: fn_ty };

        lower_internal_function(&h.cx, &h.builder, &h.runtime, &h.coro_intrinsics, fn_id, &func);

        let ir = h.cx.scx.llmod.print_to_string().to_string();
        assert_eq!(ir.matches("insertvalue").count(), 2, "one insertvalue per field:\n{ir}");
    }
}
