//! Terminal output for plaque commands.
//!
//! This module provides:
//! - `ProgressCallback`, which reports cell execution as it happens
//! - Printers for headers, cell outputs and run summaries

use std::path::Path;
use std::time::Duration;

use plaque_core::{Cell, CellError, CellOutput, ExecutionCallback, ExecutionRecord, RunReport};

use crate::colors::{self, Style};

/// Short label for a cell: its index, plus its title when it has one.
pub fn cell_label(cell: &Cell) -> String {
    match cell.title() {
        Some(title) => format!("[{}] {}", cell.index, title),
        None => format!("[{}]", cell.index),
    }
}

/// Progress callback that prints execution status to the terminal.
pub struct ProgressCallback;

impl ExecutionCallback for ProgressCallback {
    fn on_cell_started(&self, cell: &Cell) {
        print!(
            "{} {} {} ... ",
            Style::Cyan.paint("  ▶ Running"),
            Style::Bold.paint(cell_label(cell)),
            Style::Dim.paint(format!("(line {})", cell.span.start_line))
        );
        colors::flush_stdout();
    }

    fn on_cell_completed(&self, _cell: &Cell, _output: &CellOutput) {
        println!("{}", Style::Green.paint("✓"));
    }

    fn on_cell_error(&self, _cell: &Cell, error: &CellError) {
        println!("{}", Style::Red.paint("✗"));
        eprintln!("{} {}", Style::Red.paint("    Error:"), error);
    }

    fn on_cell_blocked(&self, cell: &Cell, provider: usize) {
        println!(
            "{} {} {}",
            Style::Yellow.paint("  ⊘ Skipped"),
            cell_label(cell),
            Style::Dim.paint(format!("(cell {provider} failed)"))
        );
    }
}

/// Print the header for a command.
pub fn print_header(action: &str, path: &Path) {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    println!("\n{} - {} {}", Style::Bold.paint("Plaque"), action, Style::Cyan.paint(name));
    println!("{}", "─".repeat(50));
}

/// Print the stored output of one cell.
pub fn print_cell_output(cell: &Cell, record: &ExecutionRecord) {
    println!(
        "\n{} {}",
        Style::Cyan.paint(cell_label(cell)),
        Style::Dim.paint(format!("[{}]", record.execution_counter))
    );

    let output = &record.output;
    if output.is_empty() {
        println!("  {}", Style::Dim.paint("(no output)"));
        return;
    }
    for line in output.stdout.lines() {
        println!("  {}", line);
    }
    if let Some(result) = &output.result {
        println!("  {} {}", Style::Dim.paint("=>"), result);
    }
    if let Some(error) = &output.error {
        println!("  {}", Style::Red.paint(error));
    }
}

/// Print the one-line summary of a run.
pub fn print_summary(report: &RunReport, elapsed: Duration) {
    println!("\n{}", "─".repeat(50));
    let (color, verb) = if report.is_clean() {
        (Style::Green, "Completed")
    } else {
        (Style::Yellow, "Finished")
    };
    println!(
        "{} {} cells in {:.2}s ({} reused, {} blocked, {} failed)",
        color.paint(verb),
        report.executed.len(),
        elapsed.as_secs_f64(),
        report.reused.len(),
        report.blocked.len(),
        report.failed.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaque_core::Notebook;

    #[test]
    fn test_cell_label_uses_title() {
        let notebook = Notebook::parse("# %% Setup\nx = 1\n# %%\ny = 2\n").unwrap();
        assert_eq!(cell_label(&notebook.cells()[0]), "[0] Setup");
        assert_eq!(cell_label(&notebook.cells()[1]), "[1]");
    }
}
