//! Target configuration for AOT compilation (§4.11, the object-emission
//! prerequisite the distilled spec assumes exists).
//!
//! Target triples follow `<arch>-<vendor>-<os>[-<env>]`.

use std::fmt;
use std::sync::Once;

use inkwell::targets::{
    CodeModel, InitializationConfig, RelocMode, Target, TargetMachine, TargetTriple,
};
use inkwell::OptimizationLevel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    UnsupportedTarget { triple: String, supported: Vec<&'static str> },
    InitializationFailed(String),
    TargetMachineCreationFailed(String),
    InvalidTripleFormat { triple: String, reason: String },
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedTarget { triple, supported } => write!(
                f,
                "unsupported target '{triple}'. supported targets: {}",
                supported.join(", ")
            ),
            Self::InitializationFailed(msg) => write!(f, "failed to initialize LLVM target: {msg}"),
            Self::TargetMachineCreationFailed(msg) => {
                write!(f, "failed to create target machine: {msg}")
            }
            Self::InvalidTripleFormat { triple, reason } => {
                write!(f, "invalid target triple '{triple}': {reason}")
            }
        }
    }
}

impl std::error::Error for TargetError {}

pub const SUPPORTED_TARGETS: &[&str] = &[
    "x86_64-unknown-linux-gnu",
    "x86_64-unknown-linux-musl",
    "aarch64-unknown-linux-gnu",
    "aarch64-unknown-linux-musl",
    "x86_64-apple-darwin",
    "aarch64-apple-darwin",
    "x86_64-pc-windows-msvc",
    "x86_64-pc-windows-gnu",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTripleComponents {
    pub arch: String,
    pub vendor: String,
    pub os: String,
    pub env: Option<String>,
}

impl TargetTripleComponents {
    pub fn parse(triple: &str) -> Result<Self, TargetError> {
        let parts: Vec<&str> = triple.split('-').collect();
        if parts.len() < 3 {
            return Err(TargetError::InvalidTripleFormat {
                triple: triple.to_string(),
                reason: "expected at least 3 components: <arch>-<vendor>-<os>".to_string(),
            });
        }
        Ok(Self {
            arch: parts[0].to_string(),
            vendor: parts[1].to_string(),
            os: parts[2].to_string(),
            env: parts.get(3).map(|s| (*s).to_string()),
        })
    }

    #[must_use]
    pub fn is_darwin(&self) -> bool {
        self.os == "darwin"
    }
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }
}

impl fmt::Display for TargetTripleComponents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.arch, self.vendor, self.os)?;
        if let Some(env) = &self.env {
            write!(f, "-{env}")?;
        }
        Ok(())
    }
}

/// Target-specific settings needed to emit an object file for §4.11.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    triple: String,
    components: TargetTripleComponents,
    cpu: String,
    features: String,
    opt_level: OptimizationLevel,
    reloc_mode: RelocMode,
    code_model: CodeModel,
}

static NATIVE_TARGET_INIT: Once = Once::new();
static X86_TARGET_INIT: Once = Once::new();
static AARCH64_TARGET_INIT: Once = Once::new();

impl TargetConfig {
    /// Auto-detect the current machine's target.
    pub fn native() -> Result<Self, TargetError> {
        initialize_native_target()?;
        let triple = TargetMachine::get_default_triple();
        let triple_str = triple.as_str().to_string_lossy().to_string();
        let components = TargetTripleComponents::parse(&triple_str)?;
        Ok(Self {
            triple: triple_str,
            components,
            cpu: "generic".to_string(),
            features: String::new(),
            opt_level: OptimizationLevel::None,
            reloc_mode: RelocMode::Default,
            code_model: CodeModel::Default,
        })
    }

    pub fn from_triple(triple: &str) -> Result<Self, TargetError> {
        if !SUPPORTED_TARGETS.contains(&triple) {
            return Err(TargetError::UnsupportedTarget {
                triple: triple.to_string(),
                supported: SUPPORTED_TARGETS.to_vec(),
            });
        }
        let components = TargetTripleComponents::parse(triple)?;
        initialize_target_for_triple(&components)?;
        Ok(Self {
            triple: triple.to_string(),
            components,
            cpu: "generic".to_string(),
            features: String::new(),
            opt_level: OptimizationLevel::None,
            reloc_mode: RelocMode::Default,
            code_model: CodeModel::Default,
        })
    }

    #[must_use]
    pub fn with_cpu(mut self, cpu: &str) -> Self {
        self.cpu = cpu.to_string();
        self
    }

    #[must_use]
    pub fn with_features(mut self, features: &str) -> Self {
        self.features = features.to_string();
        self
    }

    #[must_use]
    pub fn with_opt_level(mut self, level: OptimizationLevel) -> Self {
        self.opt_level = level;
        self
    }

    #[must_use]
    pub fn triple(&self) -> &str {
        &self.triple
    }

    #[must_use]
    pub fn components(&self) -> &TargetTripleComponents {
        &self.components
    }

    pub fn create_target_machine(&self) -> Result<TargetMachine, TargetError> {
        let target_triple = TargetTriple::create(&self.triple);
        let target = Target::from_triple(&target_triple)
            .map_err(|e| TargetError::TargetMachineCreationFailed(format!("failed to get target: {e}")))?;
        target
            .create_target_machine(
                &target_triple,
                &self.cpu,
                &self.features,
                self.opt_level,
                self.reloc_mode,
                self.code_model,
            )
            .ok_or_else(|| {
                TargetError::TargetMachineCreationFailed(format!(
                    "LLVM returned None for target '{}' with CPU '{}' and features '{}'",
                    self.triple, self.cpu, self.features
                ))
            })
    }
}

fn initialize_native_target() -> Result<(), TargetError> {
    let mut result = Ok(());
    NATIVE_TARGET_INIT.call_once(|| {
        if let Err(e) = Target::initialize_native(&InitializationConfig::default()) {
            result = Err(TargetError::InitializationFailed(e));
        }
    });
    result
}

fn initialize_target_for_triple(components: &TargetTripleComponents) -> Result<(), TargetError> {
    match components.arch.as_str() {
        "x86_64" | "i686" | "i386" => {
            X86_TARGET_INIT.call_once(|| {
                Target::initialize_x86(&InitializationConfig::default());
            });
        }
        "aarch64" | "arm64" => {
            AARCH64_TARGET_INIT.call_once(|| {
                Target::initialize_aarch64(&InitializationConfig::default());
            });
        }
        arch => {
            return Err(TargetError::InitializationFailed(format!(
                "unsupported architecture: {arch}"
            )));
        }
    }
    Ok(())
}
