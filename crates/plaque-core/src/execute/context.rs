//! Callbacks for execution progress reporting.

use crate::graph::Cell;
use crate::state::{CellError, CellOutput};

/// Callback trait for execution progress reporting.
pub trait ExecutionCallback {
    /// Called when a cell starts executing.
    fn on_cell_started(&self, cell: &Cell);

    /// Called when a cell completes without raising.
    fn on_cell_completed(&self, cell: &Cell, output: &CellOutput);

    /// Called when a cell execution raises.
    fn on_cell_error(&self, cell: &Cell, error: &CellError);

    /// Called when a stale cell is skipped because `provider` failed.
    fn on_cell_blocked(&self, _cell: &Cell, _provider: usize) {}
}
