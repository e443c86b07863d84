//! L5 — the expression/flow coordinator (§4.4). Owns the per-function
//! lowering state (`current_function`, the lexical `scope`, the `loop_stack`
//! and `try_stack`) and dispatches every `sir_ir::Flow` variant to the
//! module that actually lowers it — constants to `constants`, control flow
//! to `control_flow`, coroutines to `coroutine`, calls to `calls`, and
//! try/catch/break/continue/return to `try_catch`.
//!
//! Grounded on the teacher's `ExprLowerer` struct shape (a per-function
//! cursor handed the function's IR and threaded through every sub-lowerer),
//! trimmed down: SIR's `Flow` enum is far smaller than the teacher's node
//! set, so there is exactly one dispatcher instead of one visitor per node
//! family.
//!
//! Every sub-lowering method takes the `BlockId` to position at and returns
//! `(Option<ValueId>, BlockId)` — the produced value (if any) and the block
//! lowering now resides in — rather than querying or trusting an implicit
//! "current block" cursor (§9's explicit recommendation over the
//! mutable-cursor visitor idiom).

use sir_ir::{ExprArena, ExprId, Flow, Module as SirModule, TypeId, VarId};

use crate::context::CodegenCx;
use crate::control_flow::LoopFrame;
use crate::coroutine::GeneratorState;
use crate::ir_builder::IrBuilder;
use crate::mangle::Mangler;
use crate::runtime_decl::{CoroIntrinsics, RuntimeFunctions};
use crate::scope::{Scope, ScopeBinding};
use crate::try_catch::{TryFrame, TypeIndexAllocator};
use crate::value_id::{BlockId, FunctionId, ValueId};

pub struct ExprLowerer<'a, 'll, 'tcx> {
    pub cx: &'a CodegenCx<'ll, 'tcx>,
    pub builder: &'a IrBuilder<'ll>,
    pub module: &'a SirModule,
    pub arena: &'a ExprArena,
    pub mangler: &'a Mangler,
    pub module_path: &'a str,
    pub runtime: &'a RuntimeFunctions,
    pub coro_intrinsics: &'a CoroIntrinsics,
    pub type_index: &'a TypeIndexAllocator,
    pub personality: FunctionId,
    /// The enclosing function's SIR return type — needed to allocate the
    /// root try-frame's `retStore` cell (§4.7) and to reload it on `Return`.
    pub return_ty: TypeId,

    pub(crate) current_function: FunctionId,
    pub(crate) entry_block: BlockId,
    pub(crate) scope: Scope,
    pub(crate) loop_stack: Vec<LoopFrame>,
    pub(crate) try_stack: Vec<TryFrame>,
    pub(crate) seq_counter: u32,
    pub(crate) generator: Option<GeneratorState>,
    /// Module-local cache of the `sir.typeidx.<name>` constants §4.8
    /// materializes — distinct from `type_index`'s process-wide name→index
    /// map, since each module needs its own copy of the global.
    pub(crate) typeidx_globals: std::cell::RefCell<rustc_hash::FxHashMap<i32, ValueId>>,
}

impl<'a, 'll, 'tcx> ExprLowerer<'a, 'll, 'tcx> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cx: &'a CodegenCx<'ll, 'tcx>,
        builder: &'a IrBuilder<'ll>,
        module: &'a SirModule,
        arena: &'a ExprArena,
        mangler: &'a Mangler,
        module_path: &'a str,
        runtime: &'a RuntimeFunctions,
        coro_intrinsics: &'a CoroIntrinsics,
        type_index: &'a TypeIndexAllocator,
        personality: FunctionId,
        return_ty: TypeId,
        current_function: FunctionId,
        entry_block: BlockId,
    ) -> Self {
        Self {
            cx,
            builder,
            module,
            arena,
            mangler,
            module_path,
            runtime,
            coro_intrinsics,
            type_index,
            personality,
            return_ty,
            current_function,
            entry_block,
            scope: Scope::new(),
            loop_stack: Vec::new(),
            try_stack: Vec::new(),
            seq_counter: 0,
            generator: None,
            typeidx_globals: std::cell::RefCell::new(rustc_hash::FxHashMap::default()),
        }
    }

    /// The single entry point every lowering routine (including itself,
    /// recursively) calls: re-establishes the insertion point at `block`
    /// before emitting anything, per §3's invariant that no emission
    /// routine trusts leftover builder state.
    pub fn lower_flow(&mut self, block: BlockId, id: ExprId) -> (Option<ValueId>, BlockId) {
        self.builder.position_at_end(self.cx, block);
        let expr = self.arena.get(id);
        let result_ty = expr.ty;
        match &expr.flow {
            Flow::IntConst(n) => (Some(crate::constants::lower_int_const(self.cx, self.builder, *n)), block),
            Flow::FloatConst(v) => (Some(crate::constants::lower_float_const(self.cx, self.builder, *v)), block),
            Flow::BoolConst(b) => (Some(crate::constants::lower_bool_const(self.cx, self.builder, *b)), block),
            Flow::StringConst(s) => (Some(crate::constants::lower_string_const(self.cx, self.builder, s)), block),

            Flow::VarValue(var_id) => (self.lower_var_value(*var_id), block),
            Flow::PointerValue(inner) => self.lower_flow(block, *inner),

            Flow::Series(items) => {
                let mut last = None;
                let mut current = block;
                for &item in items {
                    let (val, next) = self.lower_flow(current, item);
                    last = val;
                    current = next;
                }
                (last, current)
            }
            Flow::FlowInstr { flow, value } => {
                let (_, after_flow) = self.lower_flow(block, *flow);
                self.lower_flow(after_flow, *value)
            }

            Flow::If { cond, then_branch, else_branch } => self.lower_if(block, *cond, *then_branch, *else_branch, result_ty),
            Flow::While { cond, body, loop_id } => self.lower_while(block, *cond, *body, *loop_id),
            Flow::ImperativeFor { start, end, step, loop_var, body, loop_id } => {
                self.lower_imperative_for(block, *start, *end, *step, *loop_var, *body, *loop_id)
            }
            Flow::For { iterable, loop_var, body, loop_id } => self.lower_for_generator(block, *iterable, *loop_var, *body, *loop_id),

            Flow::TryCatch { body, catches, finally } => self.lower_try_catch(block, *body, catches, *finally),
            // `loop_id: None` means "innermost enclosing loop".
            Flow::Break { loop_id } => self.lower_break(block, *loop_id),
            Flow::Continue { loop_id } => self.lower_continue(block, *loop_id),
            Flow::Return { value } => self.lower_return(block, *value),
            Flow::Throw { value } => self.lower_throw(block, *value),

            Flow::Assign { target, value } => self.lower_assign(block, *target, *value),
            Flow::Extract { container, field_index } => self.lower_extract(block, *container, *field_index),
            Flow::Insert { container, field_index, value } => self.lower_insert(block, *container, *field_index, *value),
            Flow::Call { callee, args } => self.lower_call(block, *callee, args),
            Flow::Pipeline { stages } => self.lower_pipeline(block, stages),

            Flow::TypeProperty { query, target_type } => self.lower_type_property(block, *query, *target_type),
            Flow::StackAlloc { count, elem_type } => self.lower_stack_alloc(block, *count, *elem_type),
            Flow::Ternary { cond, if_true, if_false } => self.lower_ternary(block, *cond, *if_true, *if_false, result_ty),

            Flow::Yield { value, is_final } => self.lower_yield(block, *value, *is_final),
            Flow::YieldIn { suspending } => self.lower_yield_in(block, *suspending),

            Flow::DSLCustom { name, operands } => {
                let _ = operands;
                panic!(
                    "DSLCustom expression `{}` has no registered extension lowerer in this backend",
                    self.cx.interner.resolve(*name)
                );
            }
        }
    }

    fn lower_var_value(&mut self, var_id: VarId) -> Option<ValueId> {
        if let Some(binding) = self.scope.lookup(var_id) {
            return Some(match binding {
                ScopeBinding::Immutable(v) => v,
                ScopeBinding::Mutable { ptr, ty } => self.builder.load(self.cx, ty, ptr, "var.load"),
            });
        }
        let var = self.module.get(var_id);
        if var.is_func() {
            let fid = self.cx.get_func(self.mangler, self.module_path, var);
            Some(self.builder.function_ptr(self.cx, fid))
        } else {
            let gid = self.cx.get_global(self.mangler, self.module_path, var);
            let llty = self.cx.lower_type(var.ty);
            let ptr = self.builder.global_ptr(self.cx, gid);
            Some(self.builder.load(self.cx, llty, ptr, "global.load"))
        }
    }

    fn lower_assign(&mut self, block: BlockId, target: VarId, value: ExprId) -> (Option<ValueId>, BlockId) {
        let (val, block) = self.lower_flow(block, value);
        let Some(val) = val else {
            return (None, block);
        };
        match self.scope.lookup(target) {
            Some(ScopeBinding::Mutable { ptr, .. }) => {
                self.builder.store(self.cx, ptr, val);
            }
            _ => {
                let llty = self.cx.lower_type(self.module.get(target).ty);
                let ptr = self.builder.create_entry_alloca(self.cx, self.entry_block, llty, "assign.slot");
                self.builder.position_at_end(self.cx, block);
                self.builder.store(self.cx, ptr, val);
                self.scope.bind_mutable(target, ptr, llty);
            }
        }
        (None, block)
    }

    fn lower_extract(&mut self, block: BlockId, container: ExprId, field_index: u32) -> (Option<ValueId>, BlockId) {
        let container_ty = self.arena.get(container).ty;
        let (container_val, block) = self.lower_flow(block, container);
        let container_val = container_val.expect("Extract container must produce a value");
        let value = match self.cx.types.get(container_ty) {
            sir_ir::Type::Ref { contents } => {
                let struct_llty = self.cx.lower_type(*contents);
                let loaded = self.builder.load(self.cx, struct_llty, container_val, "ref.load");
                self.builder.extract_value(self.cx, loaded, field_index)
            }
            _ => self.builder.extract_value(self.cx, container_val, field_index),
        };
        (Some(value), block)
    }

    fn lower_insert(&mut self, block: BlockId, container: ExprId, field_index: u32, value: ExprId) -> (Option<ValueId>, BlockId) {
        let container_ty = self.arena.get(container).ty;
        let (container_val, block) = self.lower_flow(block, container);
        let container_val = container_val.expect("Insert container must produce a value");
        let (val, block) = self.lower_flow(block, value);
        let val = val.expect("Insert value must produce a value");
        match self.cx.types.get(container_ty) {
            sir_ir::Type::Ref { contents } => {
                let struct_llty = self.cx.lower_type(*contents);
                let loaded = self.builder.load(self.cx, struct_llty, container_val, "ref.load");
                let updated = self.builder.insert_value(self.cx, loaded, val, field_index);
                self.builder.store(self.cx, container_val, updated);
                (Some(container_val), block)
            }
            _ => (Some(self.builder.insert_value(self.cx, container_val, val, field_index)), block),
        }
    }

    fn lower_stack_alloc(&mut self, block: BlockId, count: ExprId, elem_type: sir_ir::TypeId) -> (Option<ValueId>, BlockId) {
        let (count_val, block) = self.lower_flow(block, count);
        let count_val = count_val.expect("StackAlloc count must produce a value");
        let elem_llty = self.cx.lower_type(elem_type);
        let data_ptr = self.builder.create_entry_array_alloca(self.cx, self.entry_block, elem_llty, count_val, "stackalloc.data");
        self.builder.position_at_end(self.cx, block);

        let i64_ty = self.cx.push_type(self.cx.scx.type_i64().into());
        let ptr_ty = self.cx.push_type(self.cx.scx.type_ptr().into());
        let struct_ty = self.cx.push_type(self.cx.scx.type_struct(&[self.cx.scx.type_i64().into(), self.cx.scx.type_ptr().into()], false).into());
        let _ = (i64_ty, ptr_ty);
        let undef = self.builder.undef_struct(self.cx, struct_ty);
        let with_len = self.builder.insert_value(self.cx, undef, count_val, 0);
        let full = self.builder.insert_value(self.cx, with_len, data_ptr, 1);
        (Some(full), block)
    }

    fn lower_ternary(&mut self, block: BlockId, cond: ExprId, if_true: ExprId, if_false: ExprId, result_ty: sir_ir::TypeId) -> (Option<ValueId>, BlockId) {
        let (cond_val, block) = self.lower_flow(block, cond);
        let cond_val = cond_val.expect("Ternary condition must produce a value");

        let then_bb = self.builder.append_block(self.cx, self.current_function, "ternary.then");
        let else_bb = self.builder.append_block(self.cx, self.current_function, "ternary.else");
        let exit_bb = self.builder.append_block(self.cx, self.current_function, "ternary.exit");
        self.builder.position_at_end(self.cx, block);
        self.builder.cond_br(self.cx, cond_val, then_bb, else_bb);

        // The incoming block for each PHI edge is wherever lowering the
        // branch actually ended up, not the block we dispatched it to —
        // a branch that itself contains nested control flow moves the
        // cursor before producing its value (§4.4's explicit caveat).
        let (then_val, then_end) = self.lower_flow(then_bb, if_true);
        self.builder.position_at_end(self.cx, then_end);
        self.builder.br(self.cx, exit_bb);

        let (else_val, else_end) = self.lower_flow(else_bb, if_false);
        self.builder.position_at_end(self.cx, else_end);
        self.builder.br(self.cx, exit_bb);

        self.builder.position_at_end(self.cx, exit_bb);
        let then_val = then_val.expect("Ternary then-branch must produce a value");
        let else_val = else_val.expect("Ternary else-branch must produce a value");
        let llty = self.cx.lower_type(result_ty);
        let phi = self.builder.phi(self.cx, llty, "ternary.phi");
        self.builder.add_incoming(self.cx, phi, &[(then_val, then_end), (else_val, else_end)]);
        (Some(phi), exit_bb)
    }

    fn lower_type_property(&mut self, block: BlockId, query: sir_ir::TypeProperty, target_type: sir_ir::TypeId) -> (Option<ValueId>, BlockId) {
        let value = match query {
            sir_ir::TypeProperty::Sizeof => crate::constants::lower_sizeof(self.cx, target_type),
            sir_ir::TypeProperty::IsAtomic => crate::constants::lower_is_atomic(self.cx, self.builder, target_type),
        };
        (Some(value), block)
    }

    /// A pipeline stage chains calls, threading a single "hole" value
    /// through each stage's argument list at `hole_index`. Generator
    /// stages (`generator: true`) are invoked like any other call rather
    /// than fused into a lazily-driven iterator chain — full pipeline
    /// fusion across generator stages is a documented simplification, not
    /// a supported feature of this lowerer.
    fn lower_pipeline(&mut self, block: BlockId, stages: &[sir_ir::PipelineStage]) -> (Option<ValueId>, BlockId) {
        let mut hole: Option<ValueId> = None;
        let mut current = block;
        for stage in stages {
            let mut arg_vals = Vec::with_capacity(stage.args.len());
            for (i, &arg) in stage.args.iter().enumerate() {
                if i == stage.hole_index {
                    if let Some(h) = hole {
                        arg_vals.push(h);
                        continue;
                    }
                }
                let (val, next) = self.lower_flow(current, arg);
                current = next;
                arg_vals.push(val.expect("pipeline stage argument must produce a value"));
            }
            let (result, next) = self.lower_call_with_args(current, stage.callee, arg_vals);
            current = next;
            hole = result;
        }
        (hole, current)
    }
}
