//! L7 — coroutine lowering (§4.5): generator prologue/cleanup/suspend/exit,
//! `Yield`/`YieldIn`, and the generator-driven `For` loop.
//!
//! Every coroutine step goes through the `seq_coro_*` shim declared in
//! `runtime_decl.rs` rather than LLM's native `llvm.coro.*` intrinsics — see
//! that module's doc comment for why. The prologue/suspend/cleanup/exit
//! block shape below still follows the real coroutine-lowering protocol
//! those intrinsics implement, just spelled as ordinary calls.

use sir_ir::{ExprId, Type, TypeId, VarId};

use crate::expr_lowerer::ExprLowerer;
use crate::value_id::{BlockId, ValueId};

/// Per-function coroutine context, live for the whole body once a function
/// is recognized as a generator (its SIR return type is `Generator(T)`).
#[derive(Debug, Clone, Copy)]
pub struct GeneratorState {
    /// `None` when the generator yields `Void` (a pure "signal" generator).
    pub promise: Option<ValueId>,
    pub promise_ty: TypeId,
    pub handle: ValueId,
    pub cleanup_block: BlockId,
    pub suspend_block: BlockId,
}

impl<'a, 'll, 'tcx> ExprLowerer<'a, 'll, 'tcx> {
    /// Builds the coroutine prologue (§4.5 steps 1-4), the cleanup/suspend/
    /// exit blocks (steps 5-7), the initial suspend (step 8), and installs
    /// `self.generator`. Returns the block the function body should be
    /// lowered into — the initial suspend's resume point, not the entry
    /// block itself.
    pub(crate) fn enter_generator(&mut self, entry_block: BlockId, promise_ty: TypeId) -> BlockId {
        let is_void = self.cx.is_void_type(promise_ty);
        let promise = if is_void {
            None
        } else {
            let llty = self.cx.lower_type(promise_ty);
            Some(self.builder.create_entry_alloca(self.cx, entry_block, llty, "coro.promise"))
        };

        self.builder.position_at_end(self.cx, entry_block);
        let ptr_ty = self.cx.push_type(self.cx.scx.type_ptr().into());
        let null_ptr = self.cx.push_value(self.cx.scx.type_ptr().const_null().into());
        let i32_ty = self.cx.push_type(self.cx.scx.type_i32().into());
        let align0 = self.builder.const_int(self.cx, i32_ty, 0, true);
        let promise_arg = promise.unwrap_or(null_ptr);
        let id = self
            .builder
            .call(self.cx, self.coro_intrinsics.seq_coro_id, &[align0, promise_arg, null_ptr, null_ptr], "coro.id")
            .expect("seq_coro_id returns a value");
        let need_alloc = self
            .builder
            .call(self.cx, self.coro_intrinsics.seq_coro_alloc, &[id], "coro.need_alloc")
            .expect("seq_coro_alloc returns a value");

        let alloc_bb = self.builder.append_block(self.cx, self.current_function, "coro.alloc");
        let no_alloc_bb = self.builder.append_block(self.cx, self.current_function, "coro.noalloc");
        let begin_bb = self.builder.append_block(self.cx, self.current_function, "coro.begin");
        self.builder.cond_br(self.cx, need_alloc, alloc_bb, no_alloc_bb);

        self.builder.position_at_end(self.cx, alloc_bb);
        let size = self
            .builder
            .call(self.cx, self.coro_intrinsics.seq_coro_size, &[], "coro.size")
            .expect("seq_coro_size returns a value");
        let mem = self
            .builder
            .call(self.cx, self.runtime.seq_alloc, &[size], "coro.mem")
            .expect("seq_alloc returns a value");
        let handle_alloc = self
            .builder
            .call(self.cx, self.coro_intrinsics.seq_coro_begin, &[id, mem], "coro.begin.alloc")
            .expect("seq_coro_begin returns a value");
        self.builder.br(self.cx, begin_bb);

        self.builder.position_at_end(self.cx, no_alloc_bb);
        let handle_noalloc = self
            .builder
            .call(self.cx, self.coro_intrinsics.seq_coro_begin, &[id, null_ptr], "coro.begin.noalloc")
            .expect("seq_coro_begin returns a value");
        self.builder.br(self.cx, begin_bb);

        self.builder.position_at_end(self.cx, begin_bb);
        let handle = self.builder.phi(self.cx, ptr_ty, "coro.handle");
        self.builder.add_incoming(self.cx, handle, &[(handle_alloc, alloc_bb), (handle_noalloc, no_alloc_bb)]);

        let cleanup_bb = self.builder.append_block(self.cx, self.current_function, "coro.cleanup");
        let suspend_bb = self.builder.append_block(self.cx, self.current_function, "coro.suspend");
        let exit_bb = self.builder.append_block(self.cx, self.current_function, "coro.exit");

        self.builder.position_at_end(self.cx, cleanup_bb);
        self.builder.call(self.cx, self.coro_intrinsics.seq_coro_free, &[id, handle], "coro.free");
        self.builder.br(self.cx, suspend_bb);

        self.builder.position_at_end(self.cx, suspend_bb);
        let false_i1 = self.builder.const_bool(self.cx, false);
        self.builder.call(self.cx, self.coro_intrinsics.seq_coro_end, &[handle, false_i1], "coro.end");
        self.builder.ret(self.cx, Some(handle));

        self.builder.position_at_end(self.cx, exit_bb);
        let true_i1 = self.builder.const_bool(self.cx, true);
        self.builder.call(self.cx, self.coro_intrinsics.seq_coro_suspend, &[handle, true_i1], "coro.suspend.final");
        self.builder.unreachable();

        let generator = GeneratorState { promise, promise_ty, handle, cleanup_block: cleanup_bb, suspend_block: suspend_bb };
        self.generator = Some(generator);

        // Step 8: the initial (non-final) suspend, so the coroutine starts
        // suspended and only runs user code once first resumed.
        self.emit_suspend_and_switch(generator, false)
    }

    /// Emits `seq_coro_suspend(handle, final)` then the three-way switch
    /// §4.5 describes (`0 → fresh continue block, 1 → cleanup, default →
    /// suspend`), returning the continue block. Shared by the initial
    /// suspend and every `Yield`/`YieldIn`.
    fn emit_suspend_and_switch(&mut self, gen: GeneratorState, is_final: bool) -> BlockId {
        let final_val = self.builder.const_bool(self.cx, is_final);
        let result = self
            .builder
            .call(self.cx, self.coro_intrinsics.seq_coro_suspend, &[gen.handle, final_val], "coro.suspend")
            .expect("seq_coro_suspend returns a value");
        let continue_bb = self.builder.append_block(self.cx, self.current_function, "coro.resume_point");
        self.builder.switch(self.cx, result, gen.suspend_block, &[(0, continue_bb), (1, gen.cleanup_block)]);
        continue_bb
    }

    /// §4.5 `yield value`: stores into the promise (if any), suspends, and
    /// resumes lowering from the switch's `0`-arm.
    pub(crate) fn lower_yield(&mut self, block: BlockId, value: Option<ExprId>, is_final: bool) -> (Option<ValueId>, BlockId) {
        let (val, block) = match value {
            Some(v) => self.lower_flow(block, v),
            None => (None, block),
        };
        let gen = self.generator.expect("Yield used outside a generator function");
        self.builder.position_at_end(self.cx, block);
        if let (Some(v), Some(promise)) = (val, gen.promise) {
            self.builder.store(self.cx, promise, v);
        }
        let continue_bb = self.emit_suspend_and_switch(gen, is_final);
        (None, continue_bb)
    }

    /// §4.5 `yield-in`: `suspending` selects whether this use-site actually
    /// drives a suspend (the generic "await a value that might not be
    /// ready yet" case) or just re-reads an already-current promise without
    /// stopping the coroutine.
    pub(crate) fn lower_yield_in(&mut self, block: BlockId, suspending: bool) -> (Option<ValueId>, BlockId) {
        let gen = self.generator.expect("YieldIn used outside a generator function");
        self.builder.position_at_end(self.cx, block);
        let block = if suspending { self.emit_suspend_and_switch(gen, false) } else { block };
        self.builder.position_at_end(self.cx, block);
        let value = gen.promise.map(|promise| {
            let llty = self.cx.lower_type(gen.promise_ty);
            self.builder.load(self.cx, llty, promise, "yieldin.promise")
        });
        (value, block)
    }

    /// §4.4 generator-driven `For`: the iterable is itself a `Generator(T)`
    /// handle, driven by `coro.resume`/`coro.done`/`coro.promise` rather
    /// than SSA induction like `ImperativeFor`.
    pub(crate) fn lower_for_generator(
        &mut self,
        block: BlockId,
        iterable: ExprId,
        loop_var: VarId,
        body: ExprId,
        loop_id: u32,
    ) -> (Option<ValueId>, BlockId) {
        let iterable_ty = self.arena.get(iterable).ty;
        let elem_ty = match self.cx.types.get(iterable_ty) {
            Type::Generator { base } => *base,
            _ => panic!("generator-driven For's iterable is not Generator-typed"),
        };
        let (handle, block) = self.lower_flow(block, iterable);
        let handle = handle.expect("For iterable must produce a coroutine handle");

        let cond_bb = self.builder.append_block(self.cx, self.current_function, "for_gen.cond");
        let body_bb = self.builder.append_block(self.cx, self.current_function, "for_gen.body");
        let cleanup_bb = self.builder.append_block(self.cx, self.current_function, "for_gen.cleanup");
        let exit_bb = self.builder.append_block(self.cx, self.current_function, "for_gen.exit");

        self.builder.position_at_end(self.cx, block);
        self.builder.br(self.cx, cond_bb);

        self.builder.position_at_end(self.cx, cond_bb);
        self.builder.call(self.cx, self.coro_intrinsics.seq_coro_resume, &[handle], "coro.resume");
        let done = self
            .builder
            .call(self.cx, self.coro_intrinsics.seq_coro_done, &[handle], "coro.done")
            .expect("seq_coro_done returns a value");
        self.builder.cond_br(self.cx, done, cleanup_bb, body_bb);

        let sequence = self.next_sequence();
        self.loop_stack.push(crate::control_flow::LoopFrame { break_block: exit_bb, continue_block: cond_bb, loop_id, sequence });

        self.builder.position_at_end(self.cx, body_bb);
        let i32_ty = self.cx.push_type(self.cx.scx.type_i32().into());
        let align0 = self.builder.const_int(self.cx, i32_ty, 0, true);
        let from_handle = self.builder.const_bool(self.cx, false);
        let promise_ptr = self
            .builder
            .call(self.cx, self.coro_intrinsics.seq_coro_promise, &[handle, align0, from_handle], "coro.promise")
            .expect("seq_coro_promise returns a value");
        let elem_llty = self.cx.lower_type(elem_ty);
        let current_val = self.builder.load(self.cx, elem_llty, promise_ptr, "for_gen.current");

        let child = self.scope.child();
        let saved = std::mem::replace(&mut self.scope, child);
        self.scope.bind_immutable(loop_var, current_val);
        let (_, body_end) = self.lower_flow(body_bb, body);
        self.scope = saved;
        self.loop_stack.pop();

        self.builder.position_at_end(self.cx, body_end);
        if !self.builder.current_block_terminated() {
            self.builder.br(self.cx, cond_bb);
        }

        self.builder.position_at_end(self.cx, cleanup_bb);
        self.builder.call(self.cx, self.coro_intrinsics.seq_coro_destroy, &[handle], "coro.destroy");
        self.builder.br(self.cx, exit_bb);

        (None, exit_bb)
    }
}
