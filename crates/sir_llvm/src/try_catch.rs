//! L8b — try/catch/finally and the `Break`/`Continue`/`Return`/`Throw` flows
//! that route through it (§4.7/§4.8).
//!
//! A function's enclosing try-frames share one set of state cells (the
//! "root" frame's `excFlag`/`catchStore`/`delegateDepth`/`retStore`/
//! `loopSequence` allocas) rather than each nesting level getting its own —
//! a nested frame only contributes its own landing pad, handler blocks, and
//! `finallyBlock`; the state it reads and writes is the outermost frame's.
//! This is the load-bearing invariant the whole module leans on, grounded on
//! the `TryCatchData`/`trycatch` stack in the teacher's lowering
//! counterpart: every method below either *is* the root (allocates the
//! cells) or *aliases* them from `self.try_stack[0]`.
//!
//! Landing-pad construction additionally adopts any catch clause from an
//! enclosing frame that isn't already covered locally, so an exception this
//! frame doesn't handle can be routed to its ancestor's handler without a
//! second LLM `landingpad` back at that ancestor's own call sites.

use rustc_hash::FxHashMap;
use sir_ir::{ExprId, TypeId};

use crate::expr_lowerer::ExprLowerer;
use crate::ir_builder::IntCmp;
use crate::value_id::{BlockId, ValueId};

const EXC_NOT_THROWN: u8 = 0;
const EXC_THROWN: u8 = 1;
const EXC_CAUGHT: u8 = 2;
const EXC_RETURN: u8 = 3;
const EXC_BREAK: u8 = 4;
const EXC_CONTINUE: u8 = 5;

/// Process-wide name→index table for §4.8's per-type index constants.
/// Starts at 1000 (catch-all and "no stable name" both map to 0); threaded
/// explicitly rather than kept as a `static` so two independent modules
/// built in the same process (the JIT's per-statement modules) don't fight
/// over global mutable state.
pub struct TypeIndexAllocator {
    next: std::cell::Cell<i32>,
    by_name: std::cell::RefCell<FxHashMap<String, i32>>,
}

impl TypeIndexAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: std::cell::Cell::new(1000),
            by_name: std::cell::RefCell::new(FxHashMap::default()),
        }
    }

    /// Looks up (or assigns) the stable index for `name`. The empty string
    /// (catch-all, or a type with no `canonical_name`) always maps to 0.
    pub fn index_for(&self, name: &str) -> i32 {
        if name.is_empty() {
            return 0;
        }
        if let Some(&idx) = self.by_name.borrow().get(name) {
            return idx;
        }
        let idx = self.next.get();
        self.next.set(idx + 1);
        self.by_name.borrow_mut().insert(name.to_string(), idx);
        idx
    }
}

impl Default for TypeIndexAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// The state cells shared by every try-frame in a function, aliased (not
/// re-allocated) by every nested frame. `ret_store` is `None` exactly when
/// the function is `void`-returning or itself a coroutine (§4.5's exit path
/// is used instead).
#[derive(Debug, Clone, Copy)]
pub struct RootTryCells {
    pub exc_flag: ValueId,
    pub catch_store: ValueId,
    pub delegate_depth: ValueId,
    pub ret_store: Option<ValueId>,
    pub loop_sequence: ValueId,
}

/// One active try-frame. `catch_types`/`handlers` are this frame's *local*
/// clauses only (in declared order) — adopted outer clauses are resolved
/// fresh each time a nested frame builds its own landing pad, not stored
/// here.
#[derive(Debug, Clone)]
pub struct TryFrame {
    pub exception_block: BlockId,
    pub exception_route_block: BlockId,
    pub finally_block: BlockId,
    pub catch_types: Vec<Option<TypeId>>,
    pub handlers: Vec<BlockId>,
    pub sequence: i64,
    pub root: RootTryCells,
}

impl<'a, 'll, 'tcx> ExprLowerer<'a, 'll, 'tcx> {
    fn const_i8(&self, v: u8) -> ValueId {
        let ty = self.cx.push_type(self.cx.scx.type_i8().into());
        self.builder.const_int(self.cx, ty, i64::from(v), false)
    }

    fn const_i64(&self, v: i64) -> ValueId {
        let ty = self.cx.push_type(self.cx.scx.type_i64().into());
        self.builder.const_int(self.cx, ty, v, true)
    }

    fn i64_llty(&self) -> crate::value_id::LLVMTypeId {
        self.cx.push_type(self.cx.scx.type_i64().into())
    }

    fn store_delegate_depth(&self, root: RootTryCells, depth: i32) {
        let v = self.const_i64(i64::from(depth));
        self.builder.store(self.cx, root.delegate_depth, v);
    }

    fn catch_type_name(&self, catch_type: Option<TypeId>) -> String {
        match catch_type {
            Some(ty) => crate::types::type_index_name(self.cx.interner, self.cx.types, ty),
            None => String::new(),
        }
    }

    /// The numeric index used in the exception-route switch's case list.
    fn typeidx_index(&self, catch_type: Option<TypeId>) -> i32 {
        let name = self.catch_type_name(catch_type);
        self.type_index.index_for(&name)
    }

    /// The pointer-typed landing-pad clause value: a `null` constant for a
    /// local catch-all, or the per-type `sir.typeidx.<name>` global
    /// otherwise (§4.8's naming — the teacher's source spells this
    /// `codon.typeidx.<name>`, renamed here since this isn't Codon's IR).
    fn catch_clause_value(&self, catch_type: Option<TypeId>) -> ValueId {
        match catch_type {
            None => self.cx.push_value(self.cx.scx.type_ptr().const_null().into()),
            Some(_) => {
                let name = self.catch_type_name(catch_type);
                let index = self.type_index.index_for(&name);
                self.typeidx_global_ptr(&name, index)
            }
        }
    }

    fn typeidx_global_ptr(&self, name: &str, index: i32) -> ValueId {
        if let Some(&v) = self.typeidx_globals.borrow().get(&index) {
            return v;
        }
        let label = if name.is_empty() { "<all>" } else { name };
        let global_name = format!("sir.typeidx.{label}");
        let i32_ty = self.cx.scx.type_i32();
        let global = self.cx.scx.llmod.add_global(i32_ty, None, &global_name);
        global.set_linkage(inkwell::module::Linkage::Private);
        global.set_constant(true);
        global.set_initializer(&i32_ty.const_int(u64::try_from(index).unwrap_or(0), true));
        let gid = self.cx.push_global(global);
        let ptr = self.builder.global_ptr(self.cx, gid);
        self.typeidx_globals.borrow_mut().insert(index, ptr);
        ptr
    }

    fn allocate_root_try_cells(&mut self) -> RootTryCells {
        let i8_ty = self.cx.push_type(self.cx.scx.type_i8().into());
        let i64_ty = self.i64_llty();
        let pad_ty = self.cx.pad_llvm_type();

        let exc_flag = self.builder.create_entry_alloca(self.cx, self.entry_block, i8_ty, "exc.flag");
        let catch_store = self.builder.create_entry_alloca(self.cx, self.entry_block, pad_ty, "exc.catch_store");
        let delegate_depth = self.builder.create_entry_alloca(self.cx, self.entry_block, i64_ty, "exc.delegate_depth");
        let loop_sequence = self.builder.create_entry_alloca(self.cx, self.entry_block, i64_ty, "exc.loop_sequence");
        let ret_store = if self.generator.is_some() || self.cx.is_void_type(self.return_ty) {
            None
        } else {
            let ret_llty = self.cx.lower_type(self.return_ty);
            Some(self.builder.create_entry_alloca(self.cx, self.entry_block, ret_llty, "exc.ret_store"))
        };

        self.builder.position_at_end(self.cx, self.entry_block);
        let not_thrown = self.const_i8(EXC_NOT_THROWN);
        self.builder.store(self.cx, exc_flag, not_thrown);
        let zero64 = self.const_i64(0);
        self.builder.store(self.cx, delegate_depth, zero64);
        let neg_one = self.const_i64(-1);
        self.builder.store(self.cx, loop_sequence, neg_one);
        let pad_zero = self.builder.undef_struct(self.cx, pad_ty);
        self.builder.store(self.cx, catch_store, pad_zero);

        RootTryCells { exc_flag, catch_store, delegate_depth, ret_store, loop_sequence }
    }

    /// §4.7 `TryCatch`: builds the landing pad, the exception-routing
    /// switch (with clause adoption from enclosing frames), every local
    /// catch handler, and the finally block's state-machine dispatch.
    pub(crate) fn lower_try_catch(
        &mut self,
        block: BlockId,
        body: ExprId,
        catches: &[sir_ir::CatchClause],
        finally: Option<ExprId>,
    ) -> (Option<ValueId>, BlockId) {
        let is_root = self.try_stack.is_empty();
        let root = if is_root {
            self.allocate_root_try_cells()
        } else {
            self.try_stack[0].root
        };
        let enclosing_loops = self.loop_stack.clone();
        let prev_seq = if is_root { -1 } else { self.try_stack.last().expect("checked non-root above").sequence };

        let exception_bb = self.builder.append_block(self.cx, self.current_function, "trycatch.exception");
        let exception_route_bb = self.builder.append_block(self.cx, self.current_function, "trycatch.exception_route");
        let external_exc_bb = self.builder.append_block(self.cx, self.current_function, "trycatch.external_exc");
        let unwind_resume_bb = self.builder.append_block(self.cx, self.current_function, "trycatch.unwind_resume");
        let finally_bb = self.builder.append_block(self.cx, self.current_function, "trycatch.finally");
        let end_bb = self.builder.append_block(self.cx, self.current_function, "trycatch.end");

        let sequence = self.next_sequence();

        let mut catch_types: Vec<Option<TypeId>> = Vec::with_capacity(catches.len());
        let mut handlers: Vec<BlockId> = Vec::with_capacity(catches.len());
        let mut catch_all_block: Option<BlockId> = None;
        for clause in catches {
            let handler_bb = self.builder.append_block(self.cx, self.current_function, "trycatch.catch");
            if clause.catch_type.is_none() {
                catch_all_block = Some(handler_bb);
            }
            catch_types.push(clause.catch_type);
            handlers.push(handler_bb);
        }

        // Adopt clauses from enclosing frames not already covered locally,
        // so this frame's own landing pad can route straight to an
        // ancestor's handler without a second unwind step.
        let mut full_types = catch_types.clone();
        let mut full_handlers = handlers.clone();
        let mut depths: Vec<i32> = vec![0; catch_types.len()];
        let mut catch_all_depth = 0i32;
        {
            let mut depth = 1i32;
            'outer: for outer in self.try_stack.iter().rev() {
                if catch_all_block.is_some() {
                    break;
                }
                for (i, &ty) in outer.catch_types.iter().enumerate() {
                    if full_types.contains(&ty) {
                        continue;
                    }
                    full_types.push(ty);
                    depths.push(depth);
                    if ty.is_none() {
                        let fdepth_catchall = self.builder.append_block(self.cx, self.current_function, "trycatch.fdepth_catchall");
                        self.builder.position_at_end(self.cx, fdepth_catchall);
                        self.store_delegate_depth(root, depth);
                        self.builder.br(self.cx, outer.handlers[i]);
                        full_handlers.push(fdepth_catchall);
                        catch_all_block = Some(fdepth_catchall);
                        catch_all_depth = depth;
                        break 'outer;
                    }
                    full_handlers.push(outer.handlers[i]);
                }
                depth += 1;
            }
        }

        // -- landing pad --
        self.builder.position_at_end(self.cx, exception_bb);
        let pad_ty = self.cx.pad_llvm_type();
        let clause_vals: Vec<ValueId> = full_types.iter().map(|&ty| self.catch_clause_value(ty)).collect();
        let pad = self.builder.landingpad(self.cx, pad_ty, self.personality, &clause_vals, true, "trycatch.pad");
        self.builder.store(self.cx, root.catch_store, pad);
        let thrown = self.const_i8(EXC_THROWN);
        self.builder.store(self.cx, root.exc_flag, thrown);
        let depth_max = self.const_i64(i64::try_from(self.try_stack.len()).unwrap_or(i64::MAX));
        self.builder.store(self.cx, root.delegate_depth, depth_max);

        let unwind_exc_ptr = self.builder.extract_value(self.cx, pad, 0);
        let i64_ty = self.i64_llty();
        let exc_class = self.builder.load(self.cx, i64_ty, unwind_exc_ptr, "exc.class");
        let expected_class = self
            .builder
            .call(self.cx, self.runtime.seq_exc_class, &[], "exc.class.expected")
            .expect("seq_exc_class returns a value");
        let matches_class = self.builder.icmp(self.cx, IntCmp::Eq, exc_class, expected_class, false);
        self.builder.cond_br(self.cx, matches_class, exception_route_bb, external_exc_bb);

        self.builder.position_at_end(self.cx, external_exc_bb);
        self.builder.unreachable();

        // -- exception routing: extract the language exception object --
        self.builder.position_at_end(self.cx, exception_route_bb);
        let reloaded_pad = self.builder.load(self.cx, pad_ty, root.catch_store, "pad.reload");
        let unwind_exc_ptr2 = self.builder.extract_value(self.cx, reloaded_pad, 0);
        let offset = self
            .builder
            .call(self.cx, self.runtime.seq_exc_offset, &[], "exc.offset")
            .expect("seq_exc_offset returns a value");
        let byte_ty = self.cx.push_type(self.cx.scx.type_i8().into());
        let exc_obj_ptr = self.builder.gep_index(self.cx, byte_ty, unwind_exc_ptr2, offset, "exc.obj_ptr");
        let record_ty = self.cx.push_type(self.cx.scx.type_struct(&[self.cx.scx.type_i32().into(), self.cx.scx.type_ptr().into()], false).into());
        let loaded_exc = self.builder.load(self.cx, record_ty, exc_obj_ptr, "exc.record");
        let obj_type_val = self.builder.extract_value(self.cx, loaded_exc, 0);
        let obj_ptr_val = self.builder.extract_value(self.cx, loaded_exc, 1);

        let default_route_bb = self.builder.append_block(self.cx, self.current_function, "trycatch.fdepth_default");
        self.builder.position_at_end(self.cx, default_route_bb);
        self.store_delegate_depth(root, catch_all_depth);
        let default_target = match catch_all_block {
            Some(_) if catch_all_depth > 0 => finally_bb,
            Some(ca) => ca,
            None => finally_bb,
        };
        self.builder.br(self.cx, default_target);

        let mut switch_cases: Vec<(i64, BlockId)> = Vec::new();
        for (i, &ty) in full_types.iter().enumerate() {
            if ty.is_none() {
                continue;
            }
            let index = self.typeidx_index(ty);
            let depth_set_bb = self.builder.append_block(self.cx, self.current_function, "trycatch.fdepth");
            self.builder.position_at_end(self.cx, depth_set_bb);
            self.store_delegate_depth(root, depths[i]);
            // A local clause (`i < handlers.len()`) jumps straight to its own
            // handler. An adopted clause runs this frame's own finally first;
            // the finally's delegate dispatch (`delegate_depth`) carries
            // control up to the ancestor that actually owns the handler.
            let target = if i < handlers.len() { full_handlers[i] } else { finally_bb };
            self.builder.br(self.cx, target);
            switch_cases.push((i64::from(index), depth_set_bb));
        }
        self.builder.position_at_end(self.cx, exception_route_bb);
        self.builder.switch(self.cx, obj_type_val, default_route_bb, &switch_cases);

        // -- local catch handler bodies --
        for (i, clause) in catches.iter().enumerate() {
            let handler_bb = handlers[i];
            self.builder.position_at_end(self.cx, handler_bb);
            if let Some(bind_var) = clause.bind_var {
                self.scope.bind_immutable(bind_var, obj_ptr_val);
            }
            let caught = self.const_i8(EXC_CAUGHT);
            self.builder.store(self.cx, root.exc_flag, caught);
            let (_, handler_end) = self.lower_flow(handler_bb, clause.handler);
            self.builder.position_at_end(self.cx, handler_end);
            if !self.builder.current_block_terminated() {
                self.builder.br(self.cx, finally_bb);
            }
        }

        // -- unwind-resume path (genuinely uncaught, propagate out) --
        self.builder.position_at_end(self.cx, unwind_resume_bb);
        let resume_val = self.builder.load(self.cx, pad_ty, root.catch_store, "pad.resume");
        self.builder.resume(self.cx, resume_val);

        // -- try body --
        let frame = TryFrame {
            exception_block: exception_bb,
            exception_route_block: exception_route_bb,
            finally_block: finally_bb,
            catch_types,
            handlers,
            sequence,
            root,
        };
        self.try_stack.push(frame);
        let (_, body_end) = self.lower_flow(block, body);
        self.try_stack.pop();
        self.builder.position_at_end(self.cx, body_end);
        if !self.builder.current_block_terminated() {
            self.builder.br(self.cx, finally_bb);
        }

        // -- finally: run the user's finally body first, then dispatch --
        self.builder.position_at_end(self.cx, finally_bb);
        let finally_tail = match finally {
            Some(finally_body) => self.lower_flow(finally_bb, finally_body).1,
            None => finally_bb,
        };

        let switch_entry_bb = if is_root {
            finally_tail
        } else {
            let finally_normal_bb = self.builder.append_block(self.cx, self.current_function, "trycatch.finally.normal");
            let finally_delegate_bb = self.builder.append_block(self.cx, self.current_function, "trycatch.finally.delegate");
            self.builder.position_at_end(self.cx, finally_tail);
            let depth_read = self.builder.load(self.cx, i64_ty, root.delegate_depth, "depth.read");
            let zero = self.const_i64(0);
            let should_delegate = self.builder.icmp(self.cx, IntCmp::Gt, depth_read, zero, true);
            self.builder.cond_br(self.cx, should_delegate, finally_delegate_bb, finally_normal_bb);

            self.builder.position_at_end(self.cx, finally_delegate_bb);
            let one = self.const_i64(1);
            let depth_new = self.builder.isub(self.cx, depth_read, one);
            self.builder.store(self.cx, root.delegate_depth, depth_new);
            let still_delegating = self.builder.icmp(self.cx, IntCmp::Gt, depth_new, zero, true);
            let parent = self.try_stack.last().expect("nested try-frame always has a parent on the stack");
            self.builder.cond_br(self.cx, still_delegating, parent.finally_block, parent.exception_route_block);

            finally_normal_bb
        };

        // break/continue routing, built against the loops that enclosed
        // this try *before* its own body added any of its own.
        let finally_break_bb = self.builder.append_block(self.cx, self.current_function, "trycatch.finally.break");
        let finally_break_done_bb = self.builder.append_block(self.cx, self.current_function, "trycatch.finally.break.done");
        let finally_continue_bb = self.builder.append_block(self.cx, self.current_function, "trycatch.finally.continue");
        let finally_continue_done_bb = self.builder.append_block(self.cx, self.current_function, "trycatch.finally.continue.done");

        let mut break_cases = Vec::new();
        let mut break_done_cases = Vec::new();
        let mut continue_cases = Vec::new();
        let mut continue_done_cases = Vec::new();
        for l in &enclosing_loops {
            if !is_root && l.sequence < prev_seq {
                let parent_finally = self.try_stack.last().expect("nested frame has a parent").finally_block;
                break_cases.push((l.sequence, parent_finally));
                continue_cases.push((l.sequence, parent_finally));
            } else {
                break_cases.push((l.sequence, finally_break_done_bb));
                break_done_cases.push((l.sequence, l.break_block));
                continue_cases.push((l.sequence, finally_continue_done_bb));
                continue_done_cases.push((l.sequence, l.continue_block));
            }
        }

        self.builder.position_at_end(self.cx, finally_break_bb);
        let loop_seq_val = self.builder.load(self.cx, i64_ty, root.loop_sequence, "loop.seq");
        self.builder.switch(self.cx, loop_seq_val, end_bb, &break_cases);

        self.builder.position_at_end(self.cx, finally_break_done_bb);
        let not_thrown_b = self.const_i8(EXC_NOT_THROWN);
        self.builder.store(self.cx, root.exc_flag, not_thrown_b);
        let loop_seq_val2 = self.builder.load(self.cx, i64_ty, root.loop_sequence, "loop.seq");
        self.builder.switch(self.cx, loop_seq_val2, end_bb, &break_done_cases);

        self.builder.position_at_end(self.cx, finally_continue_bb);
        let loop_seq_val3 = self.builder.load(self.cx, i64_ty, root.loop_sequence, "loop.seq");
        self.builder.switch(self.cx, loop_seq_val3, end_bb, &continue_cases);

        self.builder.position_at_end(self.cx, finally_continue_done_bb);
        let not_thrown_c = self.const_i8(EXC_NOT_THROWN);
        self.builder.store(self.cx, root.exc_flag, not_thrown_c);
        let loop_seq_val4 = self.builder.load(self.cx, i64_ty, root.loop_sequence, "loop.seq");
        self.builder.switch(self.cx, loop_seq_val4, end_bb, &continue_done_cases);

        // RETURN target: at the root, actually returns (or exits the
        // coroutine); nested frames delegate to the parent's finally.
        let return_target = if is_root {
            let finally_return_bb = self.builder.append_block(self.cx, self.current_function, "trycatch.finally.return");
            self.builder.position_at_end(self.cx, finally_return_bb);
            match self.generator {
                Some(gen) => self.builder.br(self.cx, gen.suspend_block),
                None => match root.ret_store {
                    Some(rs) => {
                        let ret_llty = self.cx.lower_type(self.return_ty);
                        let v = self.builder.load(self.cx, ret_llty, rs, "ret.reload");
                        self.builder.ret(self.cx, Some(v));
                    }
                    None => self.builder.ret(self.cx, None),
                },
            }
            finally_return_bb
        } else {
            self.try_stack.last().expect("nested frame has a parent").finally_block
        };

        let main_cases = vec![
            (i64::from(EXC_CAUGHT), end_bb),
            (i64::from(EXC_THROWN), unwind_resume_bb),
            (i64::from(EXC_BREAK), finally_break_bb),
            (i64::from(EXC_CONTINUE), finally_continue_bb),
            (i64::from(EXC_RETURN), return_target),
        ];
        self.builder.position_at_end(self.cx, switch_entry_bb);
        let i8_ty2 = self.cx.push_type(self.cx.scx.type_i8().into());
        let exc_flag_val = self.builder.load(self.cx, i8_ty2, root.exc_flag, "exc.flag");
        self.builder.switch(self.cx, exc_flag_val, end_bb, &main_cases);

        (None, end_bb)
    }

    fn find_loop_frame(&self, loop_id: Option<u32>) -> crate::control_flow::LoopFrame {
        match loop_id {
            Some(id) => *self
                .loop_stack
                .iter()
                .rev()
                .find(|f| f.loop_id == id)
                .expect("break/continue loop_id not found on the live loop stack"),
            None => *self.loop_stack.last().expect("break/continue used outside any loop"),
        }
    }

    /// §4.4 `Break`/`Continue` direct-branch condition: a direct branch
    /// fires when there's no active try, or the innermost one's sequence
    /// number is *less* than the target loop's (the try was entered before,
    /// and encloses, the loop — breaking out of the loop never crosses a
    /// try boundary). Otherwise the try was entered after the loop (nested
    /// inside it), and the jump must be routed through that try's finally.
    pub(crate) fn lower_break(&mut self, block: BlockId, loop_id: Option<u32>) -> (Option<ValueId>, BlockId) {
        let target = self.find_loop_frame(loop_id);
        self.builder.position_at_end(self.cx, block);
        match self.try_stack.last() {
            Some(frame) if frame.sequence >= target.sequence => {
                let root = frame.root;
                let finally_block = frame.finally_block;
                let flag = self.const_i8(EXC_BREAK);
                let seq = self.const_i64(target.sequence);
                self.builder.store(self.cx, root.exc_flag, flag);
                self.builder.store(self.cx, root.loop_sequence, seq);
                self.builder.br(self.cx, finally_block);
            }
            _ => self.builder.br(self.cx, target.break_block),
        }
        (None, block)
    }

    pub(crate) fn lower_continue(&mut self, block: BlockId, loop_id: Option<u32>) -> (Option<ValueId>, BlockId) {
        let target = self.find_loop_frame(loop_id);
        self.builder.position_at_end(self.cx, block);
        match self.try_stack.last() {
            Some(frame) if frame.sequence >= target.sequence => {
                let root = frame.root;
                let finally_block = frame.finally_block;
                let flag = self.const_i8(EXC_CONTINUE);
                let seq = self.const_i64(target.sequence);
                self.builder.store(self.cx, root.exc_flag, flag);
                self.builder.store(self.cx, root.loop_sequence, seq);
                self.builder.br(self.cx, finally_block);
            }
            _ => self.builder.br(self.cx, target.continue_block),
        }
        (None, block)
    }

    pub(crate) fn lower_return(&mut self, block: BlockId, value: Option<ExprId>) -> (Option<ValueId>, BlockId) {
        let (val, block) = match value {
            Some(v) => self.lower_flow(block, v),
            None => (None, block),
        };
        self.builder.position_at_end(self.cx, block);
        match self.try_stack.last() {
            Some(frame) => {
                let root = frame.root;
                let finally_block = frame.finally_block;
                let flag = self.const_i8(EXC_RETURN);
                self.builder.store(self.cx, root.exc_flag, flag);
                if let (Some(v), Some(ret_store)) = (val, root.ret_store) {
                    self.builder.store(self.cx, ret_store, v);
                }
                self.builder.br(self.cx, finally_block);
            }
            None => match self.generator {
                Some(gen) => self.builder.br(self.cx, gen.suspend_block),
                None => self.builder.ret(self.cx, val),
            },
        }
        (None, block)
    }

    /// §4.7 `Throw`: packages the thrown value behind `seq_alloc_exc` (typed
    /// by its §4.8 index) and hands it to `seq_throw`, which never returns.
    pub(crate) fn lower_throw(&mut self, block: BlockId, value: ExprId) -> (Option<ValueId>, BlockId) {
        let value_ty = self.arena.get(value).ty;
        let (obj_val, block) = self.lower_flow(block, value);
        let obj_val = obj_val.expect("Throw value must produce a value");
        let name = self.catch_type_name(Some(value_ty));
        let index = self.type_index.index_for(&name);

        self.builder.position_at_end(self.cx, block);
        let i32_ty = self.cx.push_type(self.cx.scx.type_i32().into());
        let index_val = self.builder.const_int(self.cx, i32_ty, i64::from(index), true);
        let header = self
            .builder
            .call(self.cx, self.runtime.seq_alloc_exc, &[index_val, obj_val], "exc.header")
            .expect("seq_alloc_exc returns a pointer");
        let (_, block) = self.call_or_invoke_direct(block, self.runtime.seq_throw, &[header], "throw");
        self.builder.position_at_end(self.cx, block);
        self.builder.unreachable();
        (None, block)
    }
}
