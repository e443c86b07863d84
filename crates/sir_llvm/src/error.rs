//! Error taxonomy (§7).
//!
//! No `thiserror`/`anyhow`: hand-rolled enums with manual `Display` +
//! `std::error::Error`, matching `aot/target.rs::TargetError` and
//! `aot/object.rs::EmitError`'s own style. `LowerError` is the umbrella
//! that every public entry point in this crate returns; the AOT-specific
//! `TargetError`/`EmitError` and the linker's `LinkError` convert into it.

use std::fmt;

use sir_ir::SourceLoc;

use crate::aot::object::EmitError;
use crate::aot::target::TargetError;

/// §7's four-way error taxonomy.
#[derive(Debug, Clone)]
pub enum LowerError {
    /// Malformed embedded LLM, link failure, output-file write failure,
    /// target-machine unavailability.
    Compilation { detail: String },
    /// A bug in the lowerer itself: missing variable handle, mismatched
    /// argument counts, a landing pad with no clauses, etc.
    InvariantViolation { detail: String, loc: SourceLoc },
    /// The linker exited nonzero, or the subprocess wait itself failed.
    Subprocess { command: String, status: Option<i32> },
    /// A runtime exception escaped the JIT entry point, captured
    /// structurally per §7.
    Jit(JitError),
}

impl fmt::Display for LowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compilation { detail } => write!(f, "compilation error: {detail}"),
            Self::InvariantViolation { detail, loc } => {
                write!(f, "internal invariant violated at {}:{}: {detail}", loc.line, loc.col)
            }
            Self::Subprocess { command, status } => match status {
                Some(code) => write!(f, "`{command}` exited with status {code}"),
                None => write!(f, "`{command}` failed to run (wait failed)"),
            },
            Self::Jit(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LowerError {}

impl From<TargetError> for LowerError {
    fn from(e: TargetError) -> Self {
        LowerError::Compilation { detail: e.to_string() }
    }
}

impl From<EmitError> for LowerError {
    fn from(e: EmitError) -> Self {
        LowerError::Compilation { detail: e.to_string() }
    }
}

/// Structured JIT runtime exception, captured per §7 (`JITError{output,
/// what, type, file, line, col, backtrace[]}`), printed to stderr with a
/// pretty backtrace in debug builds then the process aborts — local
/// recovery is only attempted here (§7 policy: "catch, print, abort").
#[derive(Debug, Clone, Default)]
pub struct JitError {
    pub output: String,
    pub what: String,
    pub exc_type: String,
    pub file: String,
    pub line: u32,
    pub col: u32,
    pub backtrace: Vec<String>,
}

impl fmt::Display for JitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "uncaught {} at {}:{}:{}: {}",
            self.exc_type, self.file, self.line, self.col, self.what
        )
    }
}

impl std::error::Error for JitError {}

impl JitError {
    /// Prints the captured output, the exception message, and (if
    /// `debug`) a resolved backtrace — mirrors the behavior §4.11
    /// describes for a caught `JITError`.
    pub fn report(&self, debug: bool) {
        if !self.output.is_empty() {
            eprint!("{}", self.output);
        }
        eprintln!("{self}");
        if debug {
            for (i, frame) in self.backtrace.iter().enumerate() {
                eprintln!("  #{i} {frame}");
            }
        }
    }
}
