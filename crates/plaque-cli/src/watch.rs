//! Watch command implementation for plaque CLI.
//!
//! Keeps one session alive and re-runs the stale cells of a notebook every
//! time the file is saved.

use std::path::Path;
use std::time::Instant;

use plaque_core::{FileSource, NotebookSession, SessionConfig};

use crate::colors::{self, Style};
use crate::output::{ProgressCallback, print_cell_output, print_header, print_summary};
use crate::watcher::{FileEvent, FileWatcher};

/// Execute the watch command.
pub async fn execute(notebook_path: &str, config: SessionConfig, clear_screen: bool) -> anyhow::Result<()> {
    let path = Path::new(notebook_path);
    if !path.exists() {
        anyhow::bail!("Notebook not found: {}", notebook_path);
    }
    let abs_path = path.canonicalize()?;

    let mut session = NotebookSession::new(config).with_source(Box::new(FileSource::new(&abs_path)));
    session.set_callback(Box::new(ProgressCallback));

    if clear_screen {
        colors::clear_terminal();
    }
    print_header("Watching", &abs_path);
    run_once(&mut session);

    let mut watcher = FileWatcher::new(&abs_path)
        .map_err(|e| anyhow::anyhow!("Failed to create file watcher: {}", e))?;
    print_waiting();

    // Events are handled one at a time; a run always finishes before the next event is read.
    loop {
        tokio::select! {
            event = watcher.recv() => match event {
                Some(FileEvent::Modified(_)) => {
                    if clear_screen {
                        colors::clear_terminal();
                        print_header("Watching", &abs_path);
                    } else {
                        println!("\n{}", Style::Yellow.paint("File changed, re-running..."));
                    }
                    run_once(&mut session);
                    print_waiting();
                }
                Some(FileEvent::Removed(path)) => {
                    eprintln!("\n{} Notebook file removed: {}", Style::Yellow.paint("Warning:"), path.display());
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                let stopped = format!("Stopped after {} revisions.", session.revision());
                println!("\n{}", Style::Dim.paint(stopped));
                break;
            }
        }
    }

    Ok(())
}

/// Reload the notebook and print the cells that ran.
///
/// Errors are printed rather than returned so the watch loop keeps going.
fn run_once(session: &mut NotebookSession) {
    let start = Instant::now();
    let report = match session.reload() {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} {}", Style::Red.paint("Error:"), e.with_hint());
            return;
        }
    };

    if !report.executed.is_empty() {
        println!("\n{}", Style::Bold.paint("Outputs:"));
        println!("{}", "─".repeat(50));
        for &index in &report.executed {
            if let (Some(cell), Some(record)) = (session.notebook().cell(index), session.record(index)) {
                print_cell_output(cell, record);
            }
        }
    }

    let drifted = session.drifted_names();
    if !drifted.is_empty() {
        println!(
            "\n{} names still bound from removed code: {}",
            Style::Dim.paint("Note:"),
            drifted.join(", ")
        );
    }

    print_summary(&report, start.elapsed());
}

fn print_waiting() {
    println!("\n{}", Style::Dim.paint("Watching for changes... (Ctrl+C to stop)"));
}
