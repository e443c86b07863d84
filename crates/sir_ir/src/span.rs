//! Source locations carried through SIR for debug-metadata attachment.

/// A single source position: file-interned name, 1-based line/column.
///
/// `sir_llvm`'s type/function/var lowering attaches these to DWARF debug
/// records; everything else treats them as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLoc {
    pub file: crate::Name,
    pub line: u32,
    pub col: u32,
}

impl SourceLoc {
    pub const fn new(file: crate::Name, line: u32, col: u32) -> Self {
        Self { file, line, col }
    }

    /// Unknown/synthesized location (used for compiler-internal functions).
    pub const UNKNOWN: SourceLoc = SourceLoc {
        file: crate::Name::EMPTY,
        line: 0,
        col: 0,
    };
}
