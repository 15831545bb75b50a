//! Cell source parsing.
//!
//! This module provides:
//! - Parsing with `rustpython-parser`, lowered into the tree in [`ast`]
//! - Nesting limits that turn pathological input into parse errors
//! - Comment discovery for cell markers
//! - A read-only [`Visit`] traversal of the lowered tree

pub mod ast;
mod lower;
pub mod visit;

pub use lower::{Comment, MAX_BRACKET_DEPTH, MAX_TREE_DEPTH, Module, comments, parse};
pub use visit::Visit;
