//! L4 — constant emission (§4.4's `IntConst`/`FloatConst`/`BoolConst`/
//! `StringConst`, plus §4.4's `TypeProperty` queries which are themselves
//! compile-time constants once the operand type is known).
//!
//! Grounded on the teacher's `codegen/ir_builder/memory.rs` string-literal
//! helper and `declare.rs`'s struct-constant builder; SIR's constant set is
//! smaller (no list/dict/set literal forms) so this stays a flat module
//! rather than the teacher's `ConstEmitter` type.

use inkwell::types::BasicType;

use crate::context::CodegenCx;
use crate::ir_builder::IrBuilder;
use crate::value_id::{LLVMTypeId, ValueId};

impl<'ll> CodegenCx<'ll, '_> {
    /// Lazily-created `{i64, ptr}` LLM struct type id, shared by
    /// `StringConst` and every `seq_str_*` runtime return value.
    pub fn string_llvm_type(&self) -> LLVMTypeId {
        if let Some(id) = self.cached_string_type.get() {
            return id;
        }
        let id = self.push_type(self.string_type().into());
        self.cached_string_type.set(Some(id));
        id
    }
}

pub fn lower_int_const(cx: &CodegenCx<'_, '_>, builder: &IrBuilder<'_>, n: i64) -> ValueId {
    let ty = cx.push_type(cx.scx.type_i64().into());
    builder.const_int(cx, ty, n, true)
}

pub fn lower_float_const(cx: &CodegenCx<'_, '_>, builder: &IrBuilder<'_>, v: f64) -> ValueId {
    builder.const_float(cx, v)
}

pub fn lower_bool_const(cx: &CodegenCx<'_, '_>, builder: &IrBuilder<'_>, v: bool) -> ValueId {
    builder.const_bool(cx, v)
}

/// `data` is the address of an internal constant global holding the bytes
/// of `s`, `len` its byte length — both themselves compile-time constants,
/// so the `{i64,ptr}` struct is built with `const_named_struct`, not
/// `insert_value` (§4.4 doesn't distinguish constant-vs-runtime strings,
/// but every `StringConst` SIR node is source-literal text by construction).
pub fn lower_string_const(cx: &CodegenCx<'_, '_>, builder: &IrBuilder<'_>, s: &str) -> ValueId {
    let data = builder.global_string_ptr(cx, s, "str.lit");
    let i64_ty = cx.push_type(cx.scx.type_i64().into());
    let len = builder.const_int(cx, i64_ty, i64::try_from(s.len()).unwrap_or(i64::MAX), false);
    builder.const_struct(cx, cx.string_llvm_type(), &[len, data])
}

/// §4.4 `TypeProperty::Sizeof` — the allocation size of the lowered type,
/// as an `i64` (LLVM's target-independent `sizeof` constant-expression
/// idiom, not a runtime `getelementptr`).
pub fn lower_sizeof(cx: &CodegenCx<'_, '_>, target_type: sir_ir::TypeId) -> ValueId {
    let llty = cx.get_type_value(cx.lower_type(target_type));
    let size = llty.size_of().expect("sized type");
    cx.push_value(size.into())
}

/// §4.4 `TypeProperty::IsAtomic` — a 1-byte boolean.
pub fn lower_is_atomic(cx: &CodegenCx<'_, '_>, builder: &IrBuilder<'_>, target_type: sir_ir::TypeId) -> ValueId {
    let atomic = cx.is_atomic_type(target_type);
    let i8_ty = cx.push_type(cx.scx.type_i8().into());
    builder.const_int(cx, i8_ty, i64::from(atomic), false)
}
