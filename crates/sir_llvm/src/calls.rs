//! L8a — call-or-invoke (§4.6).
//!
//! `Call` always resolves its callee to a function-pointer value first (even
//! for a statically-known SIR function — `VarValue` on a function `Var`
//! already lowers to its address via `ExprLowerer::lower_var_value`), then
//! emits a plain `call` or an `invoke` against the innermost try-frame's
//! landing pad, depending on whether one is active. Collapsing the
//! direct/indirect split into a single indirect-call code path costs one
//! pointer-typed operand inkwell doesn't strictly need for a static callee,
//! but keeps `Call`, pipeline stages, and internal-pattern call sites behind
//! one helper instead of three.

use sir_ir::{ExprId, Type, TypeId};

use crate::expr_lowerer::ExprLowerer;
use crate::value_id::{BlockId, FunctionId, ValueId};

impl<'a, 'll, 'tcx> ExprLowerer<'a, 'll, 'tcx> {
    /// §4.4 `Call`: lower the callee, then the args in order, then dispatch.
    pub(crate) fn lower_call(&mut self, block: BlockId, callee: ExprId, args: &[ExprId]) -> (Option<ValueId>, BlockId) {
        let callee_ty = self.arena.get(callee).ty;
        let (callee_val, block) = self.lower_flow(block, callee);
        let callee_val = callee_val.expect("Call callee must produce a function pointer value");

        let mut arg_vals = Vec::with_capacity(args.len());
        let mut block = block;
        for &arg in args {
            let (val, next) = self.lower_flow(block, arg);
            block = next;
            arg_vals.push(val.expect("Call argument must produce a value"));
        }
        self.call_value(block, callee_ty, callee_val, &arg_vals)
    }

    /// Same as [`Self::lower_call`] but for a pipeline stage whose argument
    /// values have already been materialized (the hole value came from the
    /// previous stage, not from lowering an `ExprId` here).
    pub(crate) fn lower_call_with_args(&mut self, block: BlockId, callee: ExprId, args: Vec<ValueId>) -> (Option<ValueId>, BlockId) {
        let callee_ty = self.arena.get(callee).ty;
        let (callee_val, block) = self.lower_flow(block, callee);
        let callee_val = callee_val.expect("pipeline callee must produce a function pointer value");
        self.call_value(block, callee_ty, callee_val, &args)
    }

    /// The actual call-or-invoke decision point: plain call with no active
    /// try-frame, `invoke` against the innermost frame's landing pad
    /// otherwise. The invoke's normal-return edge becomes a fresh block that
    /// lowering continues from.
    pub(crate) fn call_value(&mut self, block: BlockId, callee_ty: TypeId, callee_val: ValueId, args: &[ValueId]) -> (Option<ValueId>, BlockId) {
        let Type::Func { args: param_sir_tys, ret, variadic } = self.cx.types.get(callee_ty) else {
            panic!("Call callee does not carry a Func type");
        };
        debug_assert!(!variadic || args.len() >= param_sir_tys.len(), "variadic call missing fixed args");
        let ret_ty = if self.cx.is_void_type(*ret) { None } else { Some(self.cx.lower_type(*ret)) };
        let param_tys: Vec<_> = param_sir_tys.iter().map(|&t| self.cx.lower_type(t)).collect();

        match self.try_stack.last() {
            Some(frame) => {
                let normal = self.builder.append_block(self.cx, self.current_function, "call.normal");
                self.builder.position_at_end(self.cx, block);
                let val = self
                    .builder
                    .invoke_indirect(self.cx, ret_ty, &param_tys, callee_val, args, normal, frame.exception_block, "call");
                (val, normal)
            }
            None => {
                self.builder.position_at_end(self.cx, block);
                let val = self.builder.call_indirect(self.cx, ret_ty, &param_tys, callee_val, args, "call");
                (val, block)
            }
        }
    }

    /// Call-or-invoke against a statically-known runtime/internal function
    /// (never a SIR-level indirect pointer) — used by `Throw`'s `seq_throw`
    /// and by L9's internal-pattern allocators, which may themselves run
    /// inside an active try (an allocator failure path can unwind).
    pub(crate) fn call_or_invoke_direct(
        &mut self,
        block: BlockId,
        func: FunctionId,
        args: &[ValueId],
        label: &str,
    ) -> (Option<ValueId>, BlockId) {
        match self.try_stack.last() {
            Some(frame) => {
                let normal = self.builder.append_block(self.cx, self.current_function, "call.normal");
                self.builder.position_at_end(self.cx, block);
                let val = self.builder.invoke(self.cx, func, args, normal, frame.exception_block, label);
                (val, normal)
            }
            None => {
                self.builder.position_at_end(self.cx, block);
                let val = self.builder.call(self.cx, func, args, label);
                (val, block)
            }
        }
    }
}
