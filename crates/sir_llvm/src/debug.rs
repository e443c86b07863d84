//! DWARF debug info generation (§4.11's debug-info prerequisite — the
//! distilled spec assumes a `DebugLevel` exists without defining one).
//!
//! Grounded on the teacher's `aot/debug/{config,builder,context}.rs`, folded
//! into one module here since SIR only needs compile-unit/file/subprogram/
//! basic-type records, not the teacher's full struct/member/lexical-block
//! machinery — `windows-msvc`'s CodeView format is likewise out of scope;
//! SIR only emits DWARF.

use std::cell::RefCell;
use std::path::Path;

use inkwell::context::Context;
use inkwell::debug_info::{
    AsDIScope, DICompileUnit, DIFile, DIFlagsConstants, DIScope, DISubprogram, DIType,
    DWARFEmissionKind, DWARFSourceLanguage, DebugInfoBuilder as InkwellDIBuilder,
};
use inkwell::module::{FlagBehavior, Module};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugLevel {
    #[default]
    None,
    LineTablesOnly,
    Full,
}

impl DebugLevel {
    fn to_emission_kind(self) -> DWARFEmissionKind {
        match self {
            Self::None => DWARFEmissionKind::None,
            Self::LineTablesOnly => DWARFEmissionKind::LineTablesOnly,
            Self::Full => DWARFEmissionKind::Full,
        }
    }

    #[must_use]
    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::None)
    }
}

#[derive(Debug, Clone)]
pub struct DebugInfoConfig {
    pub level: DebugLevel,
    pub optimized: bool,
    pub dwarf_version: u32,
}

impl Default for DebugInfoConfig {
    fn default() -> Self {
        Self { level: DebugLevel::None, optimized: false, dwarf_version: 4 }
    }
}

impl DebugInfoConfig {
    #[must_use]
    pub fn new(level: DebugLevel) -> Self {
        Self { level, ..Default::default() }
    }
}

struct TypeCache<'ctx> {
    primitives: FxHashMap<&'static str, DIType<'ctx>>,
}

/// Wraps LLVM's `DIBuilder`, created once per module and finalized before
/// object emission.
pub struct DebugInfoBuilder<'ctx> {
    inner: InkwellDIBuilder<'ctx>,
    compile_unit: DICompileUnit<'ctx>,
    context: &'ctx Context,
    file: DIFile<'ctx>,
    config: DebugInfoConfig,
    type_cache: RefCell<TypeCache<'ctx>>,
}

impl<'ctx> DebugInfoBuilder<'ctx> {
    const PRODUCER: &'static str = "sir-backend";

    /// Returns `None` if `config.level` is `DebugLevel::None` — callers
    /// should treat an absent builder as "skip all debug-info calls".
    #[must_use]
    pub fn new(module: &Module<'ctx>, context: &'ctx Context, config: DebugInfoConfig, source_path: &Path) -> Option<Self> {
        if !config.level.is_enabled() {
            return None;
        }
        let dir = source_path.parent().and_then(|p| p.to_str()).unwrap_or(".");
        let file_name = source_path.file_name().and_then(|f| f.to_str()).unwrap_or("<unknown>");

        let (inner, compile_unit) = module.create_debug_info_builder(
            true,
            DWARFSourceLanguage::C,
            file_name,
            dir,
            Self::PRODUCER,
            config.optimized,
            "",
            0,
            "",
            config.level.to_emission_kind(),
            0,
            false,
            false,
            "",
            "",
        );

        module.add_basic_value_flag(
            "Dwarf Version",
            FlagBehavior::Warning,
            context.i32_type().const_int(u64::from(config.dwarf_version), false),
        );
        module.add_basic_value_flag(
            "Debug Info Version",
            FlagBehavior::Warning,
            context.i32_type().const_int(3, false),
        );

        let file = inner.create_file(file_name, dir);
        Some(Self {
            inner,
            compile_unit,
            context,
            file,
            config,
            type_cache: RefCell::new(TypeCache { primitives: FxHashMap::default() }),
        })
    }

    #[must_use]
    pub fn compile_unit_scope(&self) -> DIScope<'ctx> {
        self.compile_unit.as_debug_info_scope()
    }

    #[must_use]
    pub fn file(&self) -> DIFile<'ctx> {
        self.file
    }

    /// Creates (or returns a cached) DWARF basic type record for one of
    /// SIR's primitive `Type` variants (§4.1).
    pub fn basic_type(&self, name: &'static str, size_bits: u64, encoding: u32) -> DIType<'ctx> {
        if let Some(ty) = self.type_cache.borrow().primitives.get(name) {
            return *ty;
        }
        let ty = self
            .inner
            .create_basic_type(name, size_bits, encoding, DIFlagsConstants::PUBLIC)
            .expect("DWARF basic type creation failed")
            .as_type();
        self.type_cache.borrow_mut().primitives.insert(name, ty);
        ty
    }

    /// Builds the `DISubroutineType` a subprogram record needs (§4.10):
    /// `ret` first (`None` for a void return), then each parameter type in
    /// order.
    pub fn subroutine_type(&self, ret: Option<DIType<'ctx>>, params: &[DIType<'ctx>]) -> inkwell::debug_info::DISubroutineType<'ctx> {
        self.inner.create_subroutine_type(self.file, ret, params, DIFlagsConstants::PUBLIC)
    }

    /// Registers a subprogram (§4.10's per-function debug record) and
    /// returns its scope, used as the `scope` argument to subsequent
    /// `set_location` calls inside that function's body.
    pub fn create_subprogram(
        &self,
        name: &str,
        linkage_name: &str,
        line: u32,
        subroutine_ty: inkwell::debug_info::DISubroutineType<'ctx>,
        is_local: bool,
        is_definition: bool,
    ) -> DISubprogram<'ctx> {
        self.inner.create_function(
            self.compile_unit.as_debug_info_scope(),
            name,
            Some(linkage_name),
            self.file,
            line,
            subroutine_ty,
            is_local,
            is_definition,
            line,
            DIFlagsConstants::PUBLIC,
            self.config.optimized,
        )
    }

    pub fn set_location(&self, builder: &inkwell::builder::Builder<'ctx>, line: u32, col: u32, scope: DIScope<'ctx>) {
        let loc = self.context.create_debug_location(line, col, scope, None);
        builder.set_current_debug_location(loc);
    }

    pub fn finalize(&self) {
        self.inner.finalize();
    }
}
