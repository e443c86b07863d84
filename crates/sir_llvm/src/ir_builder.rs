//! ID-based LLVM instruction builder.
//!
//! Wraps inkwell's `Builder` and delegates all value/block storage to the
//! owning [`CodegenCx`]'s arena, so callers only ever see `ValueId`/`BlockId`
//! handles — never a raw inkwell value with its `'ctx` lifetime attached.
//! Grounded on the teacher's `codegen/ir_builder/{mod,arithmetic,comparisons,
//! memory,aggregates,control_flow}.rs`, consolidated into one file since SIR
//! needs a fraction of that module family's surface (no vector ops, no
//! per-ABI struct-passing helpers).

use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder as InkwellBuilder;
use inkwell::types::{BasicMetadataTypeEnum, BasicType};
use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum};
use inkwell::{FloatPredicate, IntPredicate};

use crate::context::CodegenCx;
use crate::value_id::{BlockId, FunctionId, GlobalId, LLVMTypeId, ValueId};

/// Integer comparison kind, SIR-side (sign-agnostic at the `Flow` level —
/// §4.1 tracks signedness on the operand's `Type`, not the opcode).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntCmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl IntCmp {
    fn predicate(self, signed: bool) -> IntPredicate {
        match (self, signed) {
            (Self::Eq, _) => IntPredicate::EQ,
            (Self::Ne, _) => IntPredicate::NE,
            (Self::Lt, true) => IntPredicate::SLT,
            (Self::Lt, false) => IntPredicate::ULT,
            (Self::Le, true) => IntPredicate::SLE,
            (Self::Le, false) => IntPredicate::ULE,
            (Self::Gt, true) => IntPredicate::SGT,
            (Self::Gt, false) => IntPredicate::UGT,
            (Self::Ge, true) => IntPredicate::SGE,
            (Self::Ge, false) => IntPredicate::UGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatCmp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl FloatCmp {
    fn predicate(self) -> FloatPredicate {
        match self {
            Self::Eq => FloatPredicate::OEQ,
            Self::Ne => FloatPredicate::ONE,
            Self::Lt => FloatPredicate::OLT,
            Self::Le => FloatPredicate::OLE,
            Self::Gt => FloatPredicate::OGT,
            Self::Ge => FloatPredicate::OGE,
        }
    }
}

/// Wraps inkwell's `Builder<'ll>`; every method takes the owning `cx` so it
/// can resolve/store IDs without holding its own arena.
pub struct IrBuilder<'ll> {
    raw: InkwellBuilder<'ll>,
}

impl<'ll> IrBuilder<'ll> {
    #[must_use]
    pub fn new(cx: &CodegenCx<'ll, '_>) -> Self {
        Self { raw: cx.scx.llcx.create_builder() }
    }

    pub fn position_at_end(&self, cx: &CodegenCx<'ll, '_>, block: BlockId) {
        self.raw.position_at_end(cx.get_block(block));
    }

    #[must_use]
    pub fn current_block(&self) -> Option<BasicBlock<'ll>> {
        self.raw.get_insert_block()
    }

    // -- constants --

    pub fn const_int(&self, cx: &CodegenCx<'ll, '_>, ty: LLVMTypeId, value: i64, signed: bool) -> ValueId {
        let int_ty = cx.get_type_value(ty).into_int_type();
        cx.push_value(int_ty.const_int(value as u64, signed).into())
    }

    pub fn const_float(&self, cx: &CodegenCx<'ll, '_>, value: f64) -> ValueId {
        cx.push_value(cx.scx.type_f64().const_float(value).into())
    }

    pub fn const_bool(&self, cx: &CodegenCx<'ll, '_>, value: bool) -> ValueId {
        cx.push_value(cx.scx.type_i1().const_int(u64::from(value), false).into())
    }

    // -- memory --

    pub fn alloca(&self, cx: &CodegenCx<'ll, '_>, ty: LLVMTypeId, name: &str) -> ValueId {
        let llty = cx.get_type_value(ty);
        let ptr = self.raw.build_alloca(llty, name).expect("alloca");
        cx.push_value(ptr.into())
    }

    pub fn load(&self, cx: &CodegenCx<'ll, '_>, ty: LLVMTypeId, ptr: ValueId, name: &str) -> ValueId {
        let llty = cx.get_type_value(ty);
        let ptr_val = cx.get_value(ptr).into_pointer_value();
        let loaded = self.raw.build_load(llty, ptr_val, name).expect("load");
        cx.push_value(loaded)
    }

    pub fn store(&self, cx: &CodegenCx<'ll, '_>, ptr: ValueId, value: ValueId) {
        let ptr_val = cx.get_value(ptr).into_pointer_value();
        let val = cx.get_value(value);
        self.raw.build_store(ptr_val, val).expect("store");
    }

    // -- arithmetic (int) --

    pub fn iadd(&self, cx: &CodegenCx<'ll, '_>, a: ValueId, b: ValueId) -> ValueId {
        let (a, b) = (cx.get_value(a).into_int_value(), cx.get_value(b).into_int_value());
        cx.push_value(self.raw.build_int_add(a, b, "iadd").expect("iadd").into())
    }

    pub fn isub(&self, cx: &CodegenCx<'ll, '_>, a: ValueId, b: ValueId) -> ValueId {
        let (a, b) = (cx.get_value(a).into_int_value(), cx.get_value(b).into_int_value());
        cx.push_value(self.raw.build_int_sub(a, b, "isub").expect("isub").into())
    }

    pub fn imul(&self, cx: &CodegenCx<'ll, '_>, a: ValueId, b: ValueId) -> ValueId {
        let (a, b) = (cx.get_value(a).into_int_value(), cx.get_value(b).into_int_value());
        cx.push_value(self.raw.build_int_mul(a, b, "imul").expect("imul").into())
    }

    pub fn idiv(&self, cx: &CodegenCx<'ll, '_>, a: ValueId, b: ValueId, signed: bool) -> ValueId {
        let (a, b) = (cx.get_value(a).into_int_value(), cx.get_value(b).into_int_value());
        let result = if signed {
            self.raw.build_int_signed_div(a, b, "sdiv")
        } else {
            self.raw.build_int_unsigned_div(a, b, "udiv")
        };
        cx.push_value(result.expect("idiv").into())
    }

    pub fn irem(&self, cx: &CodegenCx<'ll, '_>, a: ValueId, b: ValueId, signed: bool) -> ValueId {
        let (a, b) = (cx.get_value(a).into_int_value(), cx.get_value(b).into_int_value());
        let result = if signed {
            self.raw.build_int_signed_rem(a, b, "srem")
        } else {
            self.raw.build_int_unsigned_rem(a, b, "urem")
        };
        cx.push_value(result.expect("irem").into())
    }

    pub fn icmp(&self, cx: &CodegenCx<'ll, '_>, op: IntCmp, a: ValueId, b: ValueId, signed: bool) -> ValueId {
        let (a, b) = (cx.get_value(a).into_int_value(), cx.get_value(b).into_int_value());
        let cmp = self.raw.build_int_compare(op.predicate(signed), a, b, "icmp").expect("icmp");
        cx.push_value(cmp.into())
    }

    // -- arithmetic (float) --

    pub fn fadd(&self, cx: &CodegenCx<'ll, '_>, a: ValueId, b: ValueId) -> ValueId {
        let (a, b) = (cx.get_value(a).into_float_value(), cx.get_value(b).into_float_value());
        cx.push_value(self.raw.build_float_add(a, b, "fadd").expect("fadd").into())
    }

    pub fn fsub(&self, cx: &CodegenCx<'ll, '_>, a: ValueId, b: ValueId) -> ValueId {
        let (a, b) = (cx.get_value(a).into_float_value(), cx.get_value(b).into_float_value());
        cx.push_value(self.raw.build_float_sub(a, b, "fsub").expect("fsub").into())
    }

    pub fn fmul(&self, cx: &CodegenCx<'ll, '_>, a: ValueId, b: ValueId) -> ValueId {
        let (a, b) = (cx.get_value(a).into_float_value(), cx.get_value(b).into_float_value());
        cx.push_value(self.raw.build_float_mul(a, b, "fmul").expect("fmul").into())
    }

    pub fn fdiv(&self, cx: &CodegenCx<'ll, '_>, a: ValueId, b: ValueId) -> ValueId {
        let (a, b) = (cx.get_value(a).into_float_value(), cx.get_value(b).into_float_value());
        cx.push_value(self.raw.build_float_div(a, b, "fdiv").expect("fdiv").into())
    }

    pub fn fcmp(&self, cx: &CodegenCx<'ll, '_>, op: FloatCmp, a: ValueId, b: ValueId) -> ValueId {
        let (a, b) = (cx.get_value(a).into_float_value(), cx.get_value(b).into_float_value());
        let cmp = self.raw.build_float_compare(op.predicate(), a, b, "fcmp").expect("fcmp");
        cx.push_value(cmp.into())
    }

    // -- conversions --

    pub fn bitcast(&self, cx: &CodegenCx<'ll, '_>, value: ValueId, ty: LLVMTypeId) -> ValueId {
        let v = cx.get_value(value);
        let llty = cx.get_type_value(ty);
        cx.push_value(self.raw.build_bit_cast(v, llty, "bitcast").expect("bitcast"))
    }

    pub fn int_cast(&self, cx: &CodegenCx<'ll, '_>, value: ValueId, ty: LLVMTypeId, signed: bool) -> ValueId {
        let v = cx.get_value(value).into_int_value();
        let llty = cx.get_type_value(ty).into_int_type();
        let out = if signed {
            self.raw.build_int_s_extend_or_bit_cast(v, llty, "sext")
        } else {
            self.raw.build_int_z_extend_or_bit_cast(v, llty, "zext")
        };
        cx.push_value(out.expect("int_cast").into())
    }

    pub fn truncate(&self, cx: &CodegenCx<'ll, '_>, value: ValueId, ty: LLVMTypeId) -> ValueId {
        let v = cx.get_value(value).into_int_value();
        let llty = cx.get_type_value(ty).into_int_type();
        cx.push_value(self.raw.build_int_truncate(v, llty, "trunc").expect("truncate").into())
    }

    // -- aggregates --

    pub fn extract_value(&self, cx: &CodegenCx<'ll, '_>, agg: ValueId, index: u32) -> ValueId {
        let v = cx.get_value(agg).into_struct_value();
        cx.push_value(self.raw.build_extract_value(v, index, "extract").expect("extract_value"))
    }

    pub fn insert_value(&self, cx: &CodegenCx<'ll, '_>, agg: ValueId, elem: ValueId, index: u32) -> ValueId {
        let v = cx.get_value(agg).into_struct_value();
        let e = cx.get_value(elem);
        let result = self.raw.build_insert_value(v, e, index, "insert").expect("insert_value");
        cx.push_value(BasicValueEnum::StructValue(result.into_struct_value()))
    }

    // -- control flow --

    pub fn br(&self, cx: &CodegenCx<'ll, '_>, target: BlockId) {
        self.raw.build_unconditional_branch(cx.get_block(target)).expect("br");
    }

    pub fn cond_br(&self, cx: &CodegenCx<'ll, '_>, cond: ValueId, then_bb: BlockId, else_bb: BlockId) {
        let cond_val = cx.get_value(cond).into_int_value();
        self.raw
            .build_conditional_branch(cond_val, cx.get_block(then_bb), cx.get_block(else_bb))
            .expect("cond_br");
    }

    pub fn ret(&self, cx: &CodegenCx<'ll, '_>, value: Option<ValueId>) {
        match value {
            Some(v) => {
                let val = cx.get_value(v);
                self.raw.build_return(Some(&val)).expect("ret");
            }
            None => {
                self.raw.build_return(None).expect("ret void");
            }
        }
    }

    pub fn unreachable(&self) {
        self.raw.build_unreachable().expect("unreachable");
    }

    /// Builds a PHI node with no incoming edges yet; callers add them via
    /// `add_incoming` once every predecessor block is known, matching
    /// §4.4's block-shape rules where both arms of an `If` are emitted
    /// before the join's PHI is wired up.
    pub fn phi(&self, cx: &CodegenCx<'ll, '_>, ty: LLVMTypeId, name: &str) -> ValueId {
        let llty = cx.get_type_value(ty);
        let phi = self.raw.build_phi(llty, name).expect("phi");
        cx.push_value(phi.as_basic_value())
    }

    pub fn add_incoming(&self, cx: &CodegenCx<'ll, '_>, phi: ValueId, incoming: &[(ValueId, BlockId)]) {
        let phi_val = inkwell::values::PhiValue::try_from(cx.get_value(phi)).expect("phi value");
        let resolved: Vec<(BasicValueEnum<'ll>, BasicBlock<'ll>)> =
            incoming.iter().map(|(v, b)| (cx.get_value(*v), cx.get_block(*b))).collect();
        let refs: Vec<(&dyn inkwell::values::BasicValue<'ll>, BasicBlock<'ll>)> =
            resolved.iter().map(|(v, b)| (v as &dyn inkwell::values::BasicValue<'ll>, *b)).collect();
        phi_val.add_incoming(&refs);
    }

    // -- calls --

    pub fn call(&self, cx: &CodegenCx<'ll, '_>, func: FunctionId, args: &[ValueId], name: &str) -> Option<ValueId> {
        let func_val = cx.get_function_value(func);
        let resolved: Vec<inkwell::values::BasicMetadataValueEnum<'ll>> =
            args.iter().map(|a| cx.get_value(*a).into()).collect();
        let site = self.raw.build_call(func_val, &resolved, name).expect("call");
        site.try_as_basic_value().left().map(|v| cx.push_value(v))
    }

    #[must_use]
    pub fn raw(&self) -> &InkwellBuilder<'ll> {
        &self.raw
    }

    /// Repositions at a block obtained from [`Self::current_block`] — used
    /// by entry-block allocas (§4.4's `StackAlloc`) that must detour to the
    /// function's first block and then restore whatever block lowering was
    /// actually in the middle of emitting.
    pub fn position_at_end_raw(&self, block: BasicBlock<'ll>) {
        self.raw.position_at_end(block);
    }

    #[must_use]
    pub fn current_block_terminated(&self) -> bool {
        self.raw.get_insert_block().is_some_and(|bb| bb.get_terminator().is_some())
    }

    pub fn append_block(&self, cx: &CodegenCx<'ll, '_>, func: FunctionId, name: &str) -> BlockId {
        let f = cx.get_function_value(func);
        let bb = cx.scx.llcx.append_basic_block(f, name);
        cx.push_block(bb)
    }

    // -- aggregates (constants) --

    /// Builds a compile-time-constant struct value from already-constant
    /// field values (e.g. `StringConst`'s `{i64 len, i8* data}`, where
    /// `data` is the address of a global). Do not call this with an operand
    /// that isn't itself a constant — use `insert_value` on an
    /// [`Self::undef_struct`] for runtime-computed fields instead.
    pub fn const_struct(&self, cx: &CodegenCx<'ll, '_>, ty: LLVMTypeId, fields: &[ValueId]) -> ValueId {
        let st = cx.get_type_value(ty).into_struct_type();
        let vals: Vec<BasicValueEnum<'ll>> = fields.iter().map(|&id| cx.get_value(id)).collect();
        cx.push_value(st.const_named_struct(&vals).into())
    }

    /// An undefined struct value, built up field-by-field via `insert_value`
    /// when at least one field is a runtime SSA value (§4.4's `StackAlloc`).
    pub fn undef_struct(&self, cx: &CodegenCx<'ll, '_>, ty: LLVMTypeId) -> ValueId {
        let st = cx.get_type_value(ty).into_struct_type();
        cx.push_value(st.get_undef().into())
    }

    pub fn global_string_ptr(&self, cx: &CodegenCx<'ll, '_>, s: &str, name: &str) -> ValueId {
        let g = self.raw.build_global_string_ptr(s, name).expect("global_string_ptr");
        cx.push_value(g.as_pointer_value().into())
    }

    pub fn function_ptr(&self, cx: &CodegenCx<'ll, '_>, func: FunctionId) -> ValueId {
        let f = cx.get_function_value(func);
        cx.push_value(f.as_global_value().as_pointer_value().into())
    }

    pub fn global_ptr(&self, cx: &CodegenCx<'ll, '_>, global: GlobalId) -> ValueId {
        let g = cx.get_global_value(global);
        cx.push_value(g.as_pointer_value().into())
    }

    // -- entry-block allocas (mem2reg-friendly per §4.4) --

    pub fn create_entry_alloca(&self, cx: &CodegenCx<'ll, '_>, entry: BlockId, ty: LLVMTypeId, name: &str) -> ValueId {
        let entry_bb = cx.get_block(entry);
        let saved = self.raw.get_insert_block();
        match entry_bb.get_first_instruction() {
            Some(first) => self.raw.position_before(&first),
            None => self.raw.position_at_end(entry_bb),
        }
        let llty = cx.get_type_value(ty);
        let ptr = self.raw.build_alloca(llty, name).expect("entry_alloca");
        if let Some(bb) = saved {
            self.raw.position_at_end(bb);
        }
        cx.push_value(ptr.into())
    }

    pub fn create_entry_array_alloca(
        &self,
        cx: &CodegenCx<'ll, '_>,
        entry: BlockId,
        ty: LLVMTypeId,
        count: ValueId,
        name: &str,
    ) -> ValueId {
        let entry_bb = cx.get_block(entry);
        let saved = self.raw.get_insert_block();
        match entry_bb.get_first_instruction() {
            Some(first) => self.raw.position_before(&first),
            None => self.raw.position_at_end(entry_bb),
        }
        let llty = cx.get_type_value(ty);
        let count_val = cx.get_value(count).into_int_value();
        let ptr = self.raw.build_array_alloca(llty, count_val, name).expect("entry_array_alloca");
        if let Some(bb) = saved {
            self.raw.position_at_end(bb);
        }
        cx.push_value(ptr.into())
    }

    // -- GEP --

    pub fn struct_gep(&self, cx: &CodegenCx<'ll, '_>, struct_ty: LLVMTypeId, ptr: ValueId, index: u32, name: &str) -> ValueId {
        let st = cx.get_type_value(struct_ty).into_struct_type();
        let ptr_val = cx.get_value(ptr).into_pointer_value();
        let gep = self.raw.build_struct_gep(st, ptr_val, index, name).expect("struct_gep");
        cx.push_value(gep.into())
    }

    pub fn gep_index(&self, cx: &CodegenCx<'ll, '_>, elem_ty: LLVMTypeId, ptr: ValueId, index: ValueId, name: &str) -> ValueId {
        let elem = cx.get_type_value(elem_ty);
        let ptr_val = cx.get_value(ptr).into_pointer_value();
        let idx_val = cx.get_value(index).into_int_value();
        // SAFETY: callers only index within a buffer they themselves sized
        // (`StackAlloc`'s array alloca, or a runtime-allocated block whose
        // length accompanies every handle per §3) — never a raw user offset.
        let gep = unsafe { self.raw.build_in_bounds_gep(elem, ptr_val, &[idx_val], name).expect("gep_index") };
        cx.push_value(gep.into())
    }

    // -- switch --

    pub fn switch(&self, cx: &CodegenCx<'ll, '_>, value: ValueId, default: BlockId, cases: &[(i64, BlockId)]) {
        let val = cx.get_value(value).into_int_value();
        let int_ty = val.get_type();
        let resolved: Vec<(inkwell::values::IntValue<'ll>, BasicBlock<'ll>)> =
            cases.iter().map(|(c, b)| (int_ty.const_int(*c as u64, true), cx.get_block(*b))).collect();
        self.raw.build_switch(val, cx.get_block(default), &resolved).expect("switch");
    }

    // -- exceptions (§4.6/§4.7) --

    /// Plain function call inside an active try-frame: the normal-return
    /// edge becomes `normal`, and any unwind lands at `unwind` instead of
    /// propagating to the caller's caller.
    pub fn invoke(
        &self,
        cx: &CodegenCx<'ll, '_>,
        func: FunctionId,
        args: &[ValueId],
        normal: BlockId,
        unwind: BlockId,
        name: &str,
    ) -> Option<ValueId> {
        let func_val = cx.get_function_value(func);
        let resolved: Vec<BasicMetadataValueEnum<'ll>> = args.iter().map(|a| cx.get_value(*a).into()).collect();
        let site = self
            .raw
            .build_invoke(func_val, &resolved, cx.get_block(normal), cx.get_block(unwind), name)
            .expect("invoke");
        site.try_as_basic_value().left().map(|v| cx.push_value(v))
    }

    /// Invoke through a function pointer value — §4.4's `Call` on a
    /// non-static callee (a captured closure/function reference rather than
    /// a named SIR function).
    pub fn invoke_indirect(
        &self,
        cx: &CodegenCx<'ll, '_>,
        ret_ty: Option<LLVMTypeId>,
        param_tys: &[LLVMTypeId],
        fn_ptr: ValueId,
        args: &[ValueId],
        normal: BlockId,
        unwind: BlockId,
        name: &str,
    ) -> Option<ValueId> {
        let fn_type = self.indirect_fn_type(cx, ret_ty, param_tys);
        let ptr_val = cx.get_value(fn_ptr).into_pointer_value();
        let resolved: Vec<BasicMetadataValueEnum<'ll>> = args.iter().map(|a| cx.get_value(*a).into()).collect();
        let site = self
            .raw
            .build_indirect_invoke(fn_type, ptr_val, &resolved, cx.get_block(normal), cx.get_block(unwind), name)
            .expect("invoke_indirect");
        site.try_as_basic_value().left().map(|v| cx.push_value(v))
    }

    /// Plain (non-try-frame) call through a function pointer value.
    pub fn call_indirect(
        &self,
        cx: &CodegenCx<'ll, '_>,
        ret_ty: Option<LLVMTypeId>,
        param_tys: &[LLVMTypeId],
        fn_ptr: ValueId,
        args: &[ValueId],
        name: &str,
    ) -> Option<ValueId> {
        let fn_type = self.indirect_fn_type(cx, ret_ty, param_tys);
        let ptr_val = cx.get_value(fn_ptr).into_pointer_value();
        let resolved: Vec<BasicMetadataValueEnum<'ll>> = args.iter().map(|a| cx.get_value(*a).into()).collect();
        let site = self.raw.build_indirect_call(fn_type, ptr_val, &resolved, name).expect("call_indirect");
        site.try_as_basic_value().left().map(|v| cx.push_value(v))
    }

    fn indirect_fn_type(
        &self,
        cx: &CodegenCx<'ll, '_>,
        ret_ty: Option<LLVMTypeId>,
        param_tys: &[LLVMTypeId],
    ) -> inkwell::types::FunctionType<'ll> {
        let params: Vec<BasicMetadataTypeEnum<'ll>> = param_tys.iter().map(|&t| cx.get_type_value(t).into()).collect();
        match ret_ty {
            Some(t) => cx.get_type_value(t).fn_type(&params, false),
            None => cx.scx.type_void().fn_type(&params, false),
        }
    }

    /// A landing pad with the given ordered clauses — each either a typed
    /// catch clause (a constant `typeidx` global pointer, §4.8) or the
    /// catch-all `null` clause. `cleanup` must always be `true` per §3's
    /// invariant that every landing pad carries a cleanup clause.
    pub fn landingpad(
        &self,
        cx: &CodegenCx<'ll, '_>,
        pad_ty: LLVMTypeId,
        personality: FunctionId,
        clauses: &[ValueId],
        cleanup: bool,
        name: &str,
    ) -> ValueId {
        let st = cx.get_type_value(pad_ty).into_struct_type();
        let personality_fn = cx.get_function_value(personality);
        let clause_vals: Vec<BasicValueEnum<'ll>> = clauses.iter().map(|&c| cx.get_value(c)).collect();
        let pad = self
            .raw
            .build_landing_pad(st, personality_fn, &clause_vals, cleanup, name)
            .expect("landingpad");
        cx.push_value(pad)
    }

    pub fn resume(&self, cx: &CodegenCx<'ll, '_>, value: ValueId) {
        let val = cx.get_value(value);
        self.raw.build_resume(val).expect("resume");
    }

    pub fn set_personality(&self, cx: &CodegenCx<'ll, '_>, func: FunctionId, personality: FunctionId) {
        let f = cx.get_function_value(func);
        let p = cx.get_function_value(personality);
        f.set_personality_function(p);
    }
}
