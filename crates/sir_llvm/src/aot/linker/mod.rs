//! Linker driver for AOT compilation (§4.11).
//!
//! SIR only targets Unix-style cc/clang linking plus MinGW's `cc` on
//! `windows-gnu` — MSVC's `link.exe` and a WASM linker have no SIR runtime
//! counterpart to link against, so unlike the teacher's `LinkerImpl` this
//! driver dispatches to a single [`GccLinker`] rather than an enum of three.
//! That's noted as a deliberate drop in the project's own design notes, not
//! an oversight.

mod gcc;

pub use gcc::GccLinker;

use std::env;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use crate::aot::target::TargetConfig;

#[derive(Debug, Clone)]
pub enum LinkerError {
    LinkerNotFound { linker: String, message: String },
    LinkFailed { linker: String, exit_code: Option<i32>, stderr: String, command: String },
    InvalidConfig { message: String },
    Io { message: String },
}

impl fmt::Display for LinkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinkerNotFound { linker, message } => write!(f, "linker '{linker}' not found: {message}"),
            Self::LinkFailed { linker, exit_code, stderr, command } => {
                write!(f, "linking with '{linker}' failed")?;
                if let Some(code) = exit_code {
                    write!(f, " (exit code {code})")?;
                }
                if !stderr.is_empty() {
                    write!(f, "\n\nlinker stderr:\n{stderr}")?;
                }
                write!(f, "\n\ncommand: {command}")
            }
            Self::InvalidConfig { message } => write!(f, "invalid linker configuration: {message}"),
            Self::Io { message } => write!(f, "I/O error during linking: {message}"),
        }
    }
}

impl std::error::Error for LinkerError {}

/// Output artifact kind, distinct from `aot::object::OutputKind` (that one
/// also covers non-linked outputs like bare `.o`/`.ll`/`.bc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkOutput {
    #[default]
    Executable,
    SharedLibrary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LibraryKind {
    #[default]
    Unspecified,
    Static,
    Dynamic,
}

#[derive(Debug, Clone)]
pub struct LinkLibrary {
    pub name: String,
    pub kind: LibraryKind,
}

impl LinkLibrary {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), kind: LibraryKind::Unspecified }
    }
}

/// Search-path environment variables consulted in order, mirroring the
/// platform's native dynamic-loader variable alongside a project-specific
/// one (§6: `SIR_LIBRARY_PATH`).
const SEARCH_PATH_VARS: &[&str] = &["SIR_LIBRARY_PATH", "LIBRARY_PATH", "LD_LIBRARY_PATH", "DYLD_LIBRARY_PATH"];

fn env_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for var in SEARCH_PATH_VARS {
        if let Ok(value) = env::var(var) {
            paths.extend(env::split_paths(&value));
        }
    }
    paths
}

#[derive(Debug, Clone, Default)]
pub struct LinkInput {
    pub objects: Vec<PathBuf>,
    pub output: PathBuf,
    pub output_kind: LinkOutput,
    pub libraries: Vec<LinkLibrary>,
    pub extra_library_paths: Vec<PathBuf>,
    pub strip: bool,
    pub gc_sections: bool,
}

pub struct LinkerDriver {
    target: TargetConfig,
}

impl LinkerDriver {
    pub fn new(target: &TargetConfig) -> Self {
        Self { target: target.clone() }
    }

    /// Runs the cc/clang-wrapped link per §4.11: `-L` search paths first
    /// (project env var, then the OS-native one), then `-l<user-libs>`,
    /// then the SIR runtime and libc/libm, finally `-o <out> <objects>`.
    /// On Darwin with debug symbols retained, runs `dsymutil` afterward.
    pub fn link(&self, input: &LinkInput, debug_info: bool) -> Result<(), LinkerError> {
        if input.objects.is_empty() {
            return Err(LinkerError::InvalidConfig { message: "no object files to link".to_string() });
        }

        let mut linker = GccLinker::new(&self.target);
        linker.set_output_kind(input.output_kind);

        for obj in &input.objects {
            linker.add_object(obj);
        }
        for path in env_search_paths().iter().chain(&input.extra_library_paths) {
            linker.add_library_path(path);
        }
        for lib in &input.libraries {
            linker.link_library(&lib.name, lib.kind);
        }
        linker.link_library("sir_runtime", LibraryKind::Unspecified);
        if !self.target.components().is_windows() {
            linker.link_library("m", LibraryKind::Unspecified);
            linker.link_library("pthread", LibraryKind::Unspecified);
        }
        if input.gc_sections {
            linker.gc_sections(true);
        }
        if input.strip {
            linker.strip_symbols(true);
        }
        linker.set_output(&input.output);

        let cmd = linker.finalize();
        run_and_check(cmd)?;

        if self.target.components().is_darwin() && debug_info && !input.strip {
            run_and_check(Self::dsymutil_command(&input.output))?;
        }
        Ok(())
    }

    fn dsymutil_command(output: &std::path::Path) -> Command {
        let mut cmd = Command::new("dsymutil");
        cmd.arg(output);
        cmd
    }
}

fn run_and_check(cmd: Command) -> Result<(), LinkerError> {
    let program = cmd.get_program().to_owned();
    let args: Vec<OsString> = cmd.get_args().map(ToOwned::to_owned).collect();
    let mut exec = Command::new(&program);
    exec.args(&args);

    let output = exec.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            LinkerError::LinkerNotFound { linker: program.to_string_lossy().into_owned(), message: e.to_string() }
        } else {
            LinkerError::Io { message: e.to_string() }
        }
    })?;

    if output.status.success() {
        return Ok(());
    }
    Err(LinkerError::LinkFailed {
        linker: program.to_string_lossy().into_owned(),
        exit_code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        command: format!("{program:?} {args:?}"),
    })
}
