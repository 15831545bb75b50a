//! Run command implementation for plaque CLI.
//!
//! Executes a notebook once, headlessly, and prints every cell output.

use std::path::Path;
use std::time::Instant;

use plaque_core::{Error, FileSource, NotebookSession, SessionConfig};

use crate::colors::Style;
use crate::output::{ProgressCallback, print_cell_output, print_header, print_summary};

/// Execute a notebook.
pub fn execute(notebook_path: &str, cell_filter: Option<usize>, config: SessionConfig) -> anyhow::Result<()> {
    let path = Path::new(notebook_path);
    if !path.exists() {
        anyhow::bail!("Notebook not found: {}", notebook_path);
    }

    let start = Instant::now();
    print_header("Running", path);

    let mut session = NotebookSession::new(config).with_source(Box::new(FileSource::new(path)));
    session.set_callback(Box::new(ProgressCallback));
    let report = session.reload()?;

    if session.notebook().is_empty() {
        println!("\n{}", Style::Yellow.paint("No cells found in notebook."));
        println!("Cells are separated by `# %%` marker lines");
        return Ok(());
    }

    if let Some(index) = cell_filter
        && index >= session.notebook().len()
    {
        return Err(Error::CellNotFound(index).into());
    }

    println!("\n{}", Style::Bold.paint("Outputs:"));
    println!("{}", "─".repeat(50));
    for (cell, record) in session.cells() {
        if !cell.is_code() || cell_filter.is_some_and(|index| index != cell.index) {
            continue;
        }
        if let Some(record) = record {
            print_cell_output(cell, record);
        }
    }

    print_summary(&report, start.elapsed());

    if !report.failed.is_empty() {
        anyhow::bail!("{} cell(s) raised an error", report.failed.len());
    }
    Ok(())
}
