//! A fully analyzed document: cells plus their dependency graph.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use super::analyzer::analyze;
use super::engine::DependencyGraph;
use super::splitter::{SplitError, split};
use super::types::Cell;

/// The result of splitting, analyzing and linking one source revision.
#[derive(Debug, Clone, Default)]
pub struct Notebook {
    cells: Vec<Cell>,
    graph: DependencyGraph,
}

impl Notebook {
    /// Split the source into cells, analyze every code cell and build the graph.
    pub fn parse(source: &str) -> Result<Self, SplitError> {
        let mut cells = split(source)?;

        for position in 0..cells.len() {
            if !cells[position].is_code() {
                continue;
            }
            match analyze(&cells[position].source) {
                Ok(analysis) => {
                    let cell = &mut cells[position];
                    cell.defines = analysis.defines;
                    cell.uses = analysis.uses;
                    cell.notes = analysis.notes;
                }
                Err(error) => {
                    let offset = cells[position].span.start_line - 1;
                    return Err(SplitError {
                        error: error.offset_lines(offset),
                        partial: cells[..position].to_vec(),
                        failed_index: position,
                    });
                }
            }
        }

        let graph = DependencyGraph::build(&cells);
        Ok(Self { cells, graph })
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Digest of the providers a cell's inputs currently resolve to: each
    /// used name with its provider index and the provider's content hash.
    pub fn inputs_fingerprint(&self, index: usize) -> u64 {
        let mut hasher = FxHasher::default();
        for edge in self.graph.edges_into(index) {
            edge.name.hash(&mut hasher);
            edge.provider.hash(&mut hasher);
            if let Some(provider) = self.cells.get(edge.provider) {
                provider.content_hash.hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::CellKind;

    #[test]
    fn test_parse_links_cells() {
        let notebook = Notebook::parse("x = 1\n# %%\ny = x + 1\n# %%\nprint(y)\n").unwrap();
        assert_eq!(notebook.len(), 3);
        assert_eq!(notebook.graph().providers(2).into_iter().collect::<Vec<_>>(), vec![1]);
        assert!(notebook.cells()[2].uses.contains("print"));
    }

    #[test]
    fn test_markdown_cells_have_empty_sets() {
        let notebook = Notebook::parse("'''Intro x = 1'''\nx = 1\n").unwrap();
        assert_eq!(notebook.cells()[0].kind, CellKind::Markdown);
        assert!(notebook.cells()[0].defines.is_empty());
        assert!(notebook.cells()[0].uses.is_empty());
    }

    #[test]
    fn test_fingerprint_tracks_provider_content() {
        let a = Notebook::parse("x = 1\n# %%\ny = x\n").unwrap();
        let b = Notebook::parse("x = 2\n# %%\ny = x\n").unwrap();
        let c = Notebook::parse("z = 0\n# %%\nx = 1\n# %%\ny = x\n").unwrap();
        assert_ne!(a.inputs_fingerprint(1), b.inputs_fingerprint(1));
        assert_eq!(a.inputs_fingerprint(0), b.inputs_fingerprint(0));
        // same provider content at a different position
        assert_ne!(a.inputs_fingerprint(1), c.inputs_fingerprint(2));
    }
}
