//! Object file emission for AOT compilation (L11, §4.11).
//!
//! Output selected by filename suffix: `.ll` → text IR, `.bc` → bitcode,
//! `.o`/`.obj` → object, else an executable (built by emitting an object
//! then invoking the linker — see `super::linker`).

use std::fmt;
use std::path::Path;

use inkwell::module::Module;
use inkwell::targets::{FileType, TargetMachine};

use super::target::TargetError;

#[derive(Debug, Clone)]
pub enum EmitError {
    TargetMachine(TargetError),
    ObjectEmission { path: String, message: String },
    AssemblyEmission { path: String, message: String },
    BitcodeEmission { path: String, message: String },
    LlvmIrEmission { path: String, message: String },
    InvalidPath { path: String, reason: String },
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetMachine(err) => write!(f, "failed to create target machine: {err}"),
            Self::ObjectEmission { path, message } => {
                write!(f, "failed to emit object file '{path}': {message}")
            }
            Self::AssemblyEmission { path, message } => {
                write!(f, "failed to emit assembly file '{path}': {message}")
            }
            Self::BitcodeEmission { path, message } => {
                write!(f, "failed to emit bitcode file '{path}': {message}")
            }
            Self::LlvmIrEmission { path, message } => {
                write!(f, "failed to emit LLVM IR file '{path}': {message}")
            }
            Self::InvalidPath { path, reason } => write!(f, "invalid output path '{path}': {reason}"),
        }
    }
}

impl std::error::Error for EmitError {}

/// The file kind chosen by `select_output_kind` from an output path's
/// suffix (§4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    LlvmIrText,
    Bitcode,
    Object,
    Executable,
}

#[must_use]
pub fn select_output_kind(path: &Path) -> OutputKind {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ll") => OutputKind::LlvmIrText,
        Some("bc") => OutputKind::Bitcode,
        Some("o") | Some("obj") => OutputKind::Object,
        _ => OutputKind::Executable,
    }
}

/// Wraps a `TargetMachine` for writing an `inkwell::module::Module` to disk
/// in one of the above formats.
pub struct ObjectEmitter {
    machine: TargetMachine,
}

impl ObjectEmitter {
    pub fn new(machine: TargetMachine) -> Self {
        Self { machine }
    }

    pub fn emit_object(&self, module: &Module<'_>, path: &Path) -> Result<(), EmitError> {
        self.emit_to_file(module, path, FileType::Object, OutputKind::Object)
    }

    pub fn emit_assembly(&self, module: &Module<'_>, path: &Path) -> Result<(), EmitError> {
        self.emit_to_file(module, path, FileType::Assembly, OutputKind::LlvmIrText)
    }

    pub fn emit_bitcode(&self, module: &Module<'_>, path: &Path) -> Result<(), EmitError> {
        if !module.write_bitcode_to_path(path) {
            return Err(EmitError::BitcodeEmission {
                path: path.to_string_lossy().to_string(),
                message: "LLVM bitcode writer returned failure".to_string(),
            });
        }
        Ok(())
    }

    pub fn emit_ir_text(&self, module: &Module<'_>, path: &Path) -> Result<(), EmitError> {
        module.print_to_file(path).map_err(|e| EmitError::LlvmIrEmission {
            path: path.to_string_lossy().to_string(),
            message: e.to_string(),
        })
    }

    fn emit_to_file(
        &self,
        module: &Module<'_>,
        path: &Path,
        file_type: FileType,
        kind: OutputKind,
    ) -> Result<(), EmitError> {
        let path_str = path.to_string_lossy().to_string();
        self.machine
            .write_to_file(module, file_type, path)
            .map_err(|e| match kind {
                OutputKind::LlvmIrText => EmitError::AssemblyEmission { path: path_str, message: e.to_string() },
                _ => EmitError::ObjectEmission { path: path_str, message: e.to_string() },
            })
    }
}
