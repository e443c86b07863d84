//! L6 — control-flow lowering (§4.4): `If`, `While`, `ImperativeFor`.
//! Generator-driven `For` lives in `coroutine.rs` since it has to drive the
//! coroutine-resume protocol; `Break`/`Continue`/`Return` live in
//! `try_catch.rs` since §4.4 routes them through the active try-frame's
//! state machine whenever one is live.
//!
//! Every method here follows the block-threading discipline §9 recommends
//! in place of a mutable "current block" cursor: each lowering routine is
//! handed the block to start emitting into and returns the block where
//! control now resides, so a caller never has to trust stale builder state
//! across a nested lowering call.
//!
//! Grounded on the teacher's `lower_for_loop.rs` block layout
//! (cond/body/step/exit), generalized to SIR's three loop-shaped `Flow`
//! variants.

use sir_ir::{ExprId, TypeId, VarId};

use crate::expr_lowerer::ExprLowerer;
use crate::ir_builder::IntCmp;
use crate::value_id::{BlockId, ValueId};

/// Live loop context, pushed/popped around a `While`/`ImperativeFor`/`For`
/// body. `sequence` is this loop's position in the monotonic per-function
/// ordering (§3's "loop/try stacks carry monotonic sequence numbers") —
/// `Break`/`Continue` in `try_catch.rs` compares it against the innermost
/// try-frame's scope to decide between a direct branch and a
/// finally-routed one.
#[derive(Debug, Clone, Copy)]
pub struct LoopFrame {
    pub break_block: BlockId,
    pub continue_block: BlockId,
    pub loop_id: u32,
    pub sequence: i64,
}

impl<'a, 'll, 'tcx> ExprLowerer<'a, 'll, 'tcx> {
    pub(crate) fn next_sequence(&mut self) -> i64 {
        self.seq_counter += 1;
        i64::from(self.seq_counter)
    }

    /// §4.4 `If`: both arms always get a real block (an absent branch is an
    /// empty block that falls straight to the exit), so the exit block's
    /// predecessor set is fixed before its PHI is wired up.
    pub(crate) fn lower_if(
        &mut self,
        block: BlockId,
        cond: ExprId,
        then_branch: Option<ExprId>,
        else_branch: Option<ExprId>,
        result_ty: TypeId,
    ) -> (Option<ValueId>, BlockId) {
        let (cond_val, block) = self.lower_flow(block, cond);
        let cond_val = cond_val.expect("If condition must produce a value");

        let then_bb = self.builder.append_block(self.cx, self.current_function, "if.then");
        let else_bb = self.builder.append_block(self.cx, self.current_function, "if.else");
        let exit_bb = self.builder.append_block(self.cx, self.current_function, "if.exit");

        self.builder.position_at_end(self.cx, block);
        self.builder.cond_br(self.cx, cond_val, then_bb, else_bb);

        let (then_val, then_end) = match then_branch {
            Some(e) => self.lower_flow(then_bb, e),
            None => (None, then_bb),
        };
        self.builder.position_at_end(self.cx, then_end);
        if !self.builder.current_block_terminated() {
            self.builder.br(self.cx, exit_bb);
        }

        let (else_val, else_end) = match else_branch {
            Some(e) => self.lower_flow(else_bb, e),
            None => (None, else_bb),
        };
        self.builder.position_at_end(self.cx, else_end);
        if !self.builder.current_block_terminated() {
            self.builder.br(self.cx, exit_bb);
        }

        self.builder.position_at_end(self.cx, exit_bb);
        if self.cx.is_void_type(result_ty) {
            return (None, exit_bb);
        }
        match (then_val, else_val) {
            (Some(tv), Some(ev)) => {
                let llty = self.cx.lower_type(result_ty);
                let phi = self.builder.phi(self.cx, llty, "if.phi");
                self.builder.add_incoming(self.cx, phi, &[(tv, then_end), (ev, else_end)]);
                (Some(phi), exit_bb)
            }
            _ => (None, exit_bb),
        }
    }

    /// §4.4 `While`: `{condBlock, bodyBlock, exitBlock}`, loop frame
    /// `{break=exit, continue=cond}`.
    pub(crate) fn lower_while(&mut self, block: BlockId, cond: ExprId, body: ExprId, loop_id: u32) -> (Option<ValueId>, BlockId) {
        let cond_bb = self.builder.append_block(self.cx, self.current_function, "while.cond");
        let body_bb = self.builder.append_block(self.cx, self.current_function, "while.body");
        let exit_bb = self.builder.append_block(self.cx, self.current_function, "while.exit");

        self.builder.position_at_end(self.cx, block);
        self.builder.br(self.cx, cond_bb);

        let (cond_val, cond_end) = self.lower_flow(cond_bb, cond);
        let cond_val = cond_val.expect("While condition must produce a value");
        self.builder.position_at_end(self.cx, cond_end);
        self.builder.cond_br(self.cx, cond_val, body_bb, exit_bb);

        let sequence = self.next_sequence();
        self.loop_stack.push(LoopFrame { break_block: exit_bb, continue_block: cond_bb, loop_id, sequence });
        let (_, body_end) = self.lower_flow(body_bb, body);
        self.loop_stack.pop();
        self.builder.position_at_end(self.cx, body_end);
        if !self.builder.current_block_terminated() {
            self.builder.br(self.cx, cond_bb);
        }

        (None, exit_bb)
    }

    /// §4.4 `ImperativeFor`: `start`/`end`/non-zero `step`, a 64-bit
    /// comparison (`>=` for a positive step, `<=` for a negative one)
    /// deciding when the induction variable has passed `end`.
    pub(crate) fn lower_imperative_for(
        &mut self,
        block: BlockId,
        start: ExprId,
        end: ExprId,
        step: i64,
        loop_var: VarId,
        body: ExprId,
        loop_id: u32,
    ) -> (Option<ValueId>, BlockId) {
        debug_assert_ne!(step, 0, "ImperativeFor step must be non-zero");
        let (start_val, block) = self.lower_flow(block, start);
        let start_val = start_val.expect("ImperativeFor start must produce a value");
        let (end_val, block) = self.lower_flow(block, end);
        let end_val = end_val.expect("ImperativeFor end must produce a value");

        let i64_ty = self.cx.push_type(self.cx.scx.type_i64().into());
        let slot = self.builder.create_entry_alloca(self.cx, self.entry_block, i64_ty, "for.iv");
        self.builder.position_at_end(self.cx, block);
        self.builder.store(self.cx, slot, start_val);

        let cond_bb = self.builder.append_block(self.cx, self.current_function, "for.cond");
        let body_bb = self.builder.append_block(self.cx, self.current_function, "for.body");
        let step_bb = self.builder.append_block(self.cx, self.current_function, "for.step");
        let exit_bb = self.builder.append_block(self.cx, self.current_function, "for.exit");
        self.builder.br(self.cx, cond_bb);

        self.builder.position_at_end(self.cx, cond_bb);
        let current = self.builder.load(self.cx, i64_ty, slot, "for.iv.load");
        let past_end_cmp = if step > 0 { IntCmp::Ge } else { IntCmp::Le };
        let past_end = self.builder.icmp(self.cx, past_end_cmp, current, end_val, true);
        self.builder.cond_br(self.cx, past_end, exit_bb, body_bb);

        let sequence = self.next_sequence();
        self.loop_stack.push(LoopFrame { break_block: exit_bb, continue_block: step_bb, loop_id, sequence });

        let child = self.scope.child();
        let saved = std::mem::replace(&mut self.scope, child);
        let var_llty = self.cx.lower_type(self.module.get(loop_var).ty);
        self.scope.bind_mutable(loop_var, slot, var_llty);
        let (_, body_end) = self.lower_flow(body_bb, body);
        self.scope = saved;
        self.loop_stack.pop();

        self.builder.position_at_end(self.cx, body_end);
        if !self.builder.current_block_terminated() {
            self.builder.br(self.cx, step_bb);
        }

        self.builder.position_at_end(self.cx, step_bb);
        let reloaded = self.builder.load(self.cx, i64_ty, slot, "for.iv.reload");
        let step_val = self.builder.const_int(self.cx, i64_ty, step, true);
        let next = self.builder.iadd(self.cx, reloaded, step_val);
        self.builder.store(self.cx, slot, next);
        self.builder.br(self.cx, cond_bb);

        (None, exit_bb)
    }
}
