//! Cells and the dependency graph between them.
//!
//! This module provides:
//! - Cell splitting from script source
//! - Static analysis of defined and used names
//! - Dependency graph construction, chains and unused definitions

mod analyzer;
mod engine;
mod notebook;
mod splitter;
mod types;

pub use analyzer::{Analysis, analyze};
pub use engine::DependencyGraph;
pub use notebook::Notebook;
pub use splitter::{CellSplitter, SplitError, split};
pub use types::{
    AnalysisNote, Cell, CellKind, ContentHash, DependencyEdge, SourceSpan, UnusedDefinition,
};
