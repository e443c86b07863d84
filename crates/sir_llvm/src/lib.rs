//! SIR-to-LLM lowering backend.
//!
//! Turns a [`sir_ir::Module`] into an in-memory LLVM module (`module::lower_module`),
//! then either runs it in-process (`jit::run_jit`) or hands it to the AOT
//! pipeline (`aot::object`, `aot::linker`) to produce an object file and a
//! linked executable.
//!
//! Layout, by tier:
//!
//! - [`context`] / [`value_id`] — the arena-backed [`context::CodegenCx`]
//!   every other module borrows, and the opaque ids it hands out.
//! - [`types`] — SIR type → LLVM type lowering, cached per [`context::CodegenCx`].
//! - [`declare`] / [`mangle`] — name mangling and the linkage policy used to
//!   register every global and function before any body is lowered.
//! - [`ir_builder`] — the instruction-building façade every lowering pass
//!   below this line goes through instead of touching `inkwell` directly.
//! - [`constants`], [`control_flow`], [`scope`], [`coroutine`], [`try_catch`],
//!   [`calls`], [`expr_lowerer`] — per-construct lowering, composed by
//!   [`expr_lowerer::ExprLowerer`]'s flow dispatch.
//! - [`internal_functions`] — built-in `FuncKind::Internal`/`LLMEmbedded` bodies.
//! - [`runtime_decl`] — declarations for the `seq_*`/coroutine runtime ABI.
//! - [`debug`] — DWARF emission, threaded through the lowering passes above.
//! - [`module`] — the six-step module driver tying all of the above together.
//! - [`jit`] / [`aot`] — the two ways to execute or emit a lowered module.
//! - [`error`] — the error types every fallible path in this crate returns.
//!
//! Set `RUST_LOG` and call [`init_tracing`] once at process start for
//! structured span/event output from the lowering passes.

pub mod aot;
pub mod calls;
pub mod constants;
pub mod context;
pub mod control_flow;
pub mod coroutine;
pub mod debug;
pub mod declare;
pub mod error;
pub mod expr_lowerer;
pub mod internal_functions;
pub mod ir_builder;
pub mod jit;
pub mod mangle;
pub mod module;
pub mod runtime_decl;
pub mod scope;
#[cfg(test)]
mod test_support;
pub mod try_catch;
pub mod types;
pub mod value_id;

pub use aot::{
    select_output_kind, EmitError, LinkInput, LinkLibrary, LinkOutput, LinkerDriver, LinkerError,
    ObjectEmitter, OutputKind, TargetConfig, TargetError, TargetTripleComponents,
};
pub use context::{CodegenCx, CodegenFlags, OutputMode, SimpleCx};
pub use debug::{DebugInfoBuilder, DebugInfoConfig, DebugLevel};
pub use error::{JitError, LowerError};
pub use ir_builder::{IntCmp, IrBuilder};
pub use jit::{load_runtime_libraries, run_jit};
pub use mangle::{demangle, Mangler};
pub use module::lower_module;
pub use value_id::{BlockId, FunctionId, GlobalId, LLVMTypeId, ValueId};

use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Installs a `tracing-subscriber` formatting layer driven by `RUST_LOG`,
/// exactly once per process. A no-op if `RUST_LOG` isn't set, so embedding
/// this crate doesn't force a subscriber on a host that configures its own.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry().with(fmt::layer().with_target(true).with_level(true)).with(filter).init();
        }
    });
}
