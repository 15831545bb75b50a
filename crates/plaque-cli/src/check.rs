//! Check command implementation for plaque CLI.
//!
//! Splits and analyzes a notebook without running it: cells, dependencies,
//! analysis notes, names that no cell provides and definitions nothing reads.

use std::collections::BTreeSet;
use std::path::Path;

use plaque_core::execute::builtin_names;
use plaque_core::{Error, FileSource, Notebook, SourceProvider};
use serde_json::json;

use crate::colors::Style;
use crate::output::{cell_label, print_header};

/// A name read by a cell that neither an earlier cell nor the builtins provide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub cell: usize,
    pub name: String,
}

/// Names that would raise `NameError` on a fresh session.
pub fn unresolved_names(notebook: &Notebook) -> Vec<Unresolved> {
    let builtins: BTreeSet<&str> = builtin_names().collect();
    let builtins = &builtins;
    let graph = notebook.graph();
    notebook
        .cells()
        .iter()
        .filter(|cell| cell.is_code())
        .flat_map(move |cell| {
            cell.uses
                .iter()
                .filter(move |name| !builtins.contains(name.as_str()))
                .filter(move |name| graph.provider_of(cell.index, name).is_none())
                .map(move |name| Unresolved {
                    cell: cell.index,
                    name: name.clone(),
                })
        })
        .collect()
}

/// Execute the check command.
pub fn execute(notebook_path: &str, strict: bool, as_json: bool) -> anyhow::Result<()> {
    let path = Path::new(notebook_path);
    if !path.exists() {
        anyhow::bail!("Notebook not found: {}", notebook_path);
    }

    let source = FileSource::new(path).current_source()?;
    let notebook = match Notebook::parse(&source) {
        Ok(notebook) => notebook,
        Err(split) => {
            eprintln!(
                "{} in cell {} ({} cells before it parsed)",
                Style::Red.paint("Parse error"),
                split.failed_index,
                split.partial.len()
            );
            return Err(Error::Parse(split.error).into());
        }
    };
    let unresolved = unresolved_names(&notebook);

    if as_json {
        let unresolved_json: Vec<_> = unresolved
            .iter()
            .map(|u| json!({ "cell_index": u.cell, "name": u.name }))
            .collect();
        let graph = notebook.graph();
        let report = json!({
            "cells": notebook.cells(),
            "edges": graph.edges(),
            "chains": graph.chains(),
            "unresolved": unresolved_json,
            "unused": graph.unused_definitions(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(path, &notebook, &unresolved);
    }

    if strict && !unresolved.is_empty() {
        anyhow::bail!("{} unresolved name(s)", unresolved.len());
    }
    Ok(())
}

fn print_report(path: &Path, notebook: &Notebook, unresolved: &[Unresolved]) {
    print_header("Checking", path);

    let code_cells = notebook.cells().iter().filter(|c| c.is_code()).count();
    println!(
        "{} cells ({} code, {} markdown), {} dependencies",
        notebook.len(),
        code_cells,
        notebook.len() - code_cells,
        notebook.graph().edges().len()
    );

    for cell in notebook.cells() {
        println!(
            "\n{} {}",
            Style::Cyan.paint(cell_label(cell)),
            Style::Dim.paint(format!(
                "{} lines {}-{}",
                cell.kind, cell.span.start_line, cell.span.end_line
            ))
        );
        if !cell.is_code() {
            continue;
        }
        if !cell.defines.is_empty() {
            println!("  defines: {}", join(&cell.defines));
        }
        if !cell.uses.is_empty() {
            println!("  uses: {}", join(&cell.uses));
        }
        let providers = notebook.graph().providers(cell.index);
        if !providers.is_empty() {
            let providers: Vec<String> = providers.iter().map(ToString::to_string).collect();
            println!("  depends on: {}", providers.join(", "));
        }
        for note in &cell.notes {
            println!("  {} {}", Style::Yellow.paint("note:"), note);
        }
    }

    let chains = notebook.graph().chains();
    if !chains.is_empty() {
        println!("\n{}", Style::Bold.paint("Chains:"));
        for (name, links) in &chains {
            let links: Vec<String> = links.iter().map(|[from, to]| format!("{from} → {to}")).collect();
            println!("  {}: {}", name, links.join(", "));
        }
    }

    let unused = notebook.graph().unused_definitions();
    if !unused.is_empty() {
        println!("\n{}", Style::Bold.paint("Unused definitions:"));
        for u in unused {
            println!("  {} cell {} defines '{}', which no later cell reads", Style::Dim.paint("·"), u.cell, u.name);
        }
    }

    if unresolved.is_empty() {
        println!("\n{} every name resolves", Style::Green.paint("✓"));
    } else {
        println!();
        for u in unresolved {
            println!(
                "{} cell {} reads '{}', which no earlier cell defines",
                Style::Yellow.paint("warning:"),
                u.cell,
                u.name
            );
        }
    }
}

fn join(names: &BTreeSet<String>) -> String {
    names.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_names_skip_builtins_and_providers() {
        let notebook = Notebook::parse("x = 1\n# %%\nprint(len([x, y]))\n").unwrap();
        let unresolved = unresolved_names(&notebook);
        assert_eq!(
            unresolved,
            vec![Unresolved {
                cell: 1,
                name: "y".to_string()
            }]
        );
    }

    #[test]
    fn test_later_definition_does_not_resolve() {
        let notebook = Notebook::parse("print(z)\n# %%\nz = 3\n").unwrap();
        assert_eq!(unresolved_names(&notebook).len(), 1);
    }
}
