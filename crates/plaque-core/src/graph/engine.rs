//! The dependency graph between cells.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};

use super::types::{Cell, DependencyEdge, UnusedDefinition};

/// Directed graph of cells; edges go from provider to consumer.
///
/// Cell B depends on cell A when B uses a name whose nearest preceding
/// definer is A. Later definitions shadow earlier ones, so every edge points
/// forward in document order and the graph is acyclic by construction.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<usize, String>,
    /// Cell index to node index mapping
    node_indices: Vec<NodeIndex>,
    providers: BTreeMap<usize, BTreeSet<usize>>,
    edges: Vec<DependencyEdge>,
    unused: Vec<UnusedDefinition>,
}

impl DependencyGraph {
    /// Build the graph for an ordered list of analyzed cells.
    pub fn build(cells: &[Cell]) -> Self {
        let mut graph = DiGraph::new();
        let node_indices: Vec<NodeIndex> = cells.iter().map(|c| graph.add_node(c.index)).collect();
        let mut providers: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        let mut edges = Vec::new();

        // Name to latest defining cell, updated as we walk forward
        let mut latest: FxHashMap<&str, usize> = FxHashMap::default();

        for (position, cell) in cells.iter().enumerate() {
            let consumer_providers = providers.entry(position).or_default();
            for name in &cell.uses {
                if let Some(&provider) = latest.get(name.as_str()) {
                    consumer_providers.insert(provider);
                    graph.add_edge(node_indices[provider], node_indices[position], name.clone());
                    edges.push(DependencyEdge {
                        consumer: position,
                        provider,
                        name: name.clone(),
                    });
                }
            }
            for name in &cell.defines {
                latest.insert(name.as_str(), position);
            }
        }

        let consumed: FxHashSet<(usize, &str)> =
            edges.iter().map(|e| (e.provider, e.name.as_str())).collect();
        let unused: Vec<UnusedDefinition> = cells
            .iter()
            .enumerate()
            .flat_map(|(position, cell)| cell.defines.iter().map(move |name| (position, name)))
            .filter(|(_, name)| !name.starts_with('_'))
            .filter(|&(position, name)| !consumed.contains(&(position, name.as_str())))
            .map(|(cell, name)| UnusedDefinition {
                cell,
                name: name.clone(),
            })
            .collect();

        tracing::debug!(
            cells = cells.len(),
            edges = edges.len(),
            unused = unused.len(),
            "built dependency graph"
        );

        Self {
            graph,
            node_indices,
            providers,
            edges,
            unused,
        }
    }

    /// Cells that provide a name used by `index`.
    pub fn providers(&self, index: usize) -> BTreeSet<usize> {
        self.providers.get(&index).cloned().unwrap_or_default()
    }

    /// The full cell index to provider set mapping.
    pub fn provider_map(&self) -> &BTreeMap<usize, BTreeSet<usize>> {
        &self.providers
    }

    /// All edges, ordered by consumer then name.
    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Edges whose consumer is `index`.
    pub fn edges_into(&self, index: usize) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter().filter(move |e| e.consumer == index)
    }

    /// The cell that provides `name` to `consumer`, if any.
    pub fn provider_of(&self, consumer: usize, name: &str) -> Option<usize> {
        self.edges_into(consumer)
            .find(|e| e.name == name)
            .map(|e| e.provider)
    }

    /// Direct dependents of a cell (cells that read one of its names).
    pub fn dependents(&self, index: usize) -> BTreeSet<usize> {
        self.node_indices
            .get(index)
            .map(|&node| {
                self.graph
                    .neighbors(node)
                    .map(|neighbor| self.graph[neighbor])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every cell reachable from `index` along dependency edges, excluding
    /// `index` itself.
    pub fn transitive_dependents(&self, index: usize) -> BTreeSet<usize> {
        let mut reached = BTreeSet::new();
        let mut queue = VecDeque::from([index]);

        while let Some(current) = queue.pop_front() {
            for dependent in self.dependents(current) {
                if reached.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }
        reached
    }

    /// Definitions that no later cell reads, in document order.
    ///
    /// Names starting with `_` are conventionally private and left out.
    pub fn unused_definitions(&self) -> &[UnusedDefinition] {
        &self.unused
    }

    /// For each name, the `[provider, consumer]` cell pairs it flows along.
    pub fn chains(&self) -> BTreeMap<&str, Vec<[usize; 2]>> {
        let mut chains: BTreeMap<&str, Vec<[usize; 2]>> = BTreeMap::new();
        for edge in &self.edges {
            chains
                .entry(edge.name.as_str())
                .or_default()
                .push([edge.provider, edge.consumer]);
        }
        chains
    }

    /// Number of cells in the graph.
    pub fn len(&self) -> usize {
        self.node_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{CellKind, SourceSpan};

    fn cell(index: usize, defines: &[&str], uses: &[&str]) -> Cell {
        let mut cell = Cell::new(
            index,
            CellKind::Code,
            format!("cell {index}"),
            SourceSpan {
                start_line: index + 1,
                end_line: index + 1,
            },
        );
        cell.defines = defines.iter().map(|s| s.to_string()).collect();
        cell.uses = uses.iter().map(|s| s.to_string()).collect();
        cell
    }

    fn set(items: &[usize]) -> BTreeSet<usize> {
        items.iter().copied().collect()
    }

    #[test]
    fn test_linear_chain() {
        let cells = vec![cell(0, &["x"], &[]), cell(1, &["y"], &["x"]), cell(2, &[], &["y", "print"])];
        let graph = DependencyGraph::build(&cells);

        assert_eq!(graph.providers(0), set(&[]));
        assert_eq!(graph.providers(1), set(&[0]));
        assert_eq!(graph.providers(2), set(&[1]));
        assert_eq!(graph.dependents(0), set(&[1]));
        assert_eq!(graph.transitive_dependents(0), set(&[1, 2]));
        assert_eq!(graph.edges().len(), 2);
    }

    #[test]
    fn test_nearest_definer_shadows_earlier() {
        let cells = vec![cell(0, &["x"], &[]), cell(1, &["x"], &[]), cell(2, &[], &["x"])];
        let graph = DependencyGraph::build(&cells);
        assert_eq!(graph.providers(2), set(&[1]));
        assert_eq!(graph.provider_of(2, "x"), Some(1));
        assert!(graph.dependents(0).is_empty());
    }

    #[test]
    fn test_later_definer_is_not_a_provider() {
        let cells = vec![cell(0, &[], &["x"]), cell(1, &["x"], &[])];
        let graph = DependencyGraph::build(&cells);
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn test_self_redefinition_uses_previous_cell() {
        let cells = vec![cell(0, &["total"], &[]), cell(1, &["total"], &["total"])];
        let graph = DependencyGraph::build(&cells);
        assert_eq!(graph.provider_of(1, "total"), Some(0));
    }

    #[test]
    fn test_edges_point_forward() {
        let cells = vec![
            cell(0, &["a", "b"], &[]),
            cell(1, &["c"], &["a"]),
            cell(2, &["d"], &["b", "c"]),
            cell(3, &[], &["d", "a"]),
        ];
        let graph = DependencyGraph::build(&cells);
        for edge in graph.edges() {
            assert!(edge.provider < edge.consumer);
        }
        assert_eq!(graph.dependents(0), set(&[1, 2, 3]));
    }

    #[test]
    fn test_unused_definitions() {
        let cells = vec![
            cell(0, &["x", "_scratch", "helper"], &[]),
            cell(1, &["x"], &[]),
            cell(2, &["y"], &["x", "helper"]),
        ];
        let graph = DependencyGraph::build(&cells);
        let unused: Vec<(usize, &str)> = graph
            .unused_definitions()
            .iter()
            .map(|u| (u.cell, u.name.as_str()))
            .collect();
        assert_eq!(unused, vec![(0, "x"), (2, "y")]);
    }

    #[test]
    fn test_chains_group_edges_by_name() {
        let cells = vec![
            cell(0, &["a"], &[]),
            cell(1, &["b"], &["a"]),
            cell(2, &[], &["a", "b"]),
        ];
        let graph = DependencyGraph::build(&cells);
        let chains = graph.chains();
        assert_eq!(chains["a"], vec![[0, 1], [0, 2]]);
        assert_eq!(chains["b"], vec![[1, 2]]);
        assert_eq!(chains.len(), 2);
    }
}
