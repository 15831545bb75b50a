//! Types for cells and dependency edges.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use serde::{Serialize, Serializer};

/// Type of cell in the notebook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Executable code.
    Code,
    /// Narrative text (marker cells tagged `[markdown]` and top-level string literals).
    Markdown,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellKind::Code => write!(f, "code"),
            CellKind::Markdown => write!(f, "markdown"),
        }
    }
}

/// Digest of a cell's normalized source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(u64);

impl ContentHash {
    pub fn of(source: &str) -> Self {
        let mut hasher = FxHasher::default();
        source.hash(&mut hasher);
        Self(hasher.finish())
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Source span of a cell in the document (1-based, inclusive lines).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceSpan {
    pub start_line: usize,
    pub end_line: usize,
}

/// A limitation of static analysis found in a cell.
///
/// Notes never fail a parse; they explain where the dependency graph may
/// under-approximate what a cell really reads or writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisNote {
    /// `from module import *` binds names that cannot be known statically.
    WildcardImport { module: String },
    /// A call that can read or bind names dynamically (`exec`, `eval`, ...).
    DynamicNames { function: String },
    /// Attribute or item assignment to an object defined in another cell.
    ExternalMutation { name: String },
}

impl fmt::Display for AnalysisNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisNote::WildcardImport { module } => {
                write!(f, "wildcard import from '{module}' is not tracked")
            }
            AnalysisNote::DynamicNames { function } => {
                write!(f, "call to '{function}' may access names dynamically")
            }
            AnalysisNote::ExternalMutation { name } => {
                write!(f, "'{name}' is mutated but defined in another cell")
            }
        }
    }
}

/// One cell of a parsed document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    /// Position in document order.
    pub index: usize,
    pub kind: CellKind,
    /// Source text with leading blank lines and trailing whitespace removed.
    pub source: String,
    pub content_hash: ContentHash,
    /// Names bound at top level.
    pub defines: BTreeSet<String>,
    /// Names read before any binding in the cell.
    pub uses: BTreeSet<String>,
    pub span: SourceSpan,
    /// Marker metadata (`title`, `key=value` pairs) and `string_prefix`.
    pub metadata: BTreeMap<String, String>,
    pub notes: Vec<AnalysisNote>,
}

impl Cell {
    pub fn new(index: usize, kind: CellKind, source: String, span: SourceSpan) -> Self {
        let content_hash = ContentHash::of(&source);
        Self {
            index,
            kind,
            source,
            content_hash,
            defines: BTreeSet::new(),
            uses: BTreeSet::new(),
            span,
            metadata: BTreeMap::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_code(&self) -> bool {
        self.kind == CellKind::Code
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").map(String::as_str)
    }
}

/// `consumer` reads `name`, which `provider` is the nearest preceding cell to define.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct DependencyEdge {
    pub consumer: usize,
    pub provider: usize,
    pub name: String,
}

/// A top-level name that no later cell reads.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct UnusedDefinition {
    pub cell: usize,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable_and_hex() {
        let a = ContentHash::of("x = 1");
        let b = ContentHash::of("x = 1");
        assert_eq!(a, b);
        assert_ne!(a, ContentHash::of("x = 2"));
        assert_eq!(a.to_string().len(), 16);
    }

    #[test]
    fn test_note_serializes_with_kind_tag() {
        let note = AnalysisNote::WildcardImport {
            module: "math".into(),
        };
        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["kind"], "wildcard_import");
        assert_eq!(json["module"], "math");
    }
}
