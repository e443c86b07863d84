//! Typed intermediate representation consumed by the `sir_llvm` lowering
//! backend.
//!
//! This crate owns only the data model (§3 of the design document at the
//! workspace root): modules, vars/funcs, types, and the value/instruction/
//! flow tagged sum that a SIR module is built from. It has no notion of
//! LLVM, codegen, or lowering — those live in `sir_llvm`, which borrows a
//! `&Module` and walks it.

pub mod module;
pub mod name;
pub mod span;
pub mod types;
pub mod value;

pub use module::{ArgVar, Func, FuncAttrs, FuncKind, InternalPattern, Module, Var, VarId};
pub use name::{Name, StringInterner};
pub use span::SourceLoc;
pub use types::{Field, Type, TypeId, TypeStore};
pub use value::{
    CatchClause, Expr, ExprArena, ExprId, Flow, PipelineStage, TypeProperty, Value,
};
