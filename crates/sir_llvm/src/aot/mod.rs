//! Ahead-of-time output: target selection, object/IR emission, linking
//! (§4.11). Symbol mangling lives one level up at `crate::mangle` since the
//! JIT path needs it too.
//!
//! ```text
//! LLM module ──▶ ObjectEmitter ──▶ .o ──▶ LinkerDriver ──▶ executable
//!             └─▶ .ll / .bc text, for inspection or caching
//! ```

pub mod linker;
pub mod object;
pub mod target;

pub use linker::{LinkInput, LinkLibrary, LinkOutput, LinkerDriver, LinkerError};
pub use object::{select_output_kind, EmitError, ObjectEmitter, OutputKind};
pub use target::{TargetConfig, TargetError, TargetTripleComponents};
