//! Execution state for plaque notebooks.
//!
//! This module provides:
//! - Per-cell execution records (hash, counter, output, status)
//! - The record store indexed by cell position
//! - The shared environment every cell runs against

mod environment;
mod output;
mod record;
mod store;

pub use environment::{Environment, Variable};
pub use output::{CellError, CellOutput};
pub use record::{ExecutionRecord, ExecutionStatus};
pub use store::ExecutionStore;
