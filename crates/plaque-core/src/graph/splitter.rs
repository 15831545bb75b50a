//! Cell splitter: turns a script into an ordered list of cells.
//!
//! Boundaries are `# %%` marker comments at column 0 (jupytext format,
//! `# %% Optional title [markdown] key1="val1" key2=val2`) and bare
//! top-level string literal statements, which become markdown cells.

use std::collections::BTreeMap;

use thiserror::Error;

use super::types::{Cell, CellKind, SourceSpan};
use crate::error::ParseError;
use crate::syntax::ast::{Constant, ExprKind, StmtKind};
use crate::syntax::{comments, parse};

const MARKER: &str = "# %%";

/// Failure to split a document: one region did not parse.
#[derive(Debug, Clone, Error)]
#[error("cell {failed_index}: {error}")]
pub struct SplitError {
    pub error: ParseError,
    /// Cells preceding the broken region.
    pub partial: Vec<Cell>,
    /// Index the broken cell would have had.
    pub failed_index: usize,
}

/// A parsed `# %%` marker line.
#[derive(Debug, Clone, PartialEq)]
struct Marker {
    line: usize,
    kind: CellKind,
    metadata: BTreeMap<String, String>,
}

impl Marker {
    fn parse(line: usize, text: &str) -> Self {
        let mut content = text[MARKER.len()..].trim().to_string();
        let mut kind = CellKind::Code;

        if let Some(open) = content.find('[')
            && let Some(close) = content[open..].find(']').map(|c| c + open)
        {
            let tag = content[open + 1..close].trim().to_ascii_lowercase();
            if tag == "markdown" || tag == "md" {
                kind = CellKind::Markdown;
            }
            content = format!("{} {}", content[..open].trim(), content[close + 1..].trim())
                .trim()
                .to_string();
        }

        let meta_start = metadata_start(&content).unwrap_or(content.len());
        let title = content[..meta_start].trim();
        let mut metadata = parse_metadata(&content[meta_start..]);
        if !title.is_empty() {
            metadata.insert("title".to_string(), title.to_string());
        }

        Self {
            line,
            kind,
            metadata,
        }
    }
}

/// Byte offset of the first `key=` word in a marker line.
fn metadata_start(content: &str) -> Option<usize> {
    content.char_indices().find_map(|(i, _)| {
        let at_word_start = i == 0 || content[..i].ends_with(char::is_whitespace);
        if !at_word_start {
            return None;
        }
        let rest = &content[i..];
        let key_len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        (key_len > 0 && rest[key_len..].starts_with('=')).then_some(i)
    })
}

fn parse_metadata(text: &str) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    let mut chars = text.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }
        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| c.is_alphanumeric() || *c == '_') {
            key.push(c);
        }
        if key.is_empty() || chars.next_if_eq(&'=').is_none() {
            // not a pair; skip the word
            while chars.next_if(|c| !c.is_whitespace()).is_some() {}
            continue;
        }
        let mut value = String::new();
        match chars.next_if(|c| *c == '"' || *c == '\'') {
            Some(quote) => {
                for c in chars.by_ref() {
                    if c == quote {
                        break;
                    }
                    value.push(c);
                }
            }
            None => {
                while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                    value.push(c);
                }
            }
        }
        metadata.insert(key, value);
    }
    metadata
}

/// Remove leading blank lines and trailing whitespace. Returns the
/// normalized text and the number of leading lines removed.
pub(crate) fn normalize(text: &str) -> (String, usize) {
    let mut skipped = 0;
    let mut rest = text;
    while let Some(newline) = rest.find('\n') {
        if rest[..newline].trim().is_empty() {
            rest = &rest[newline + 1..];
            skipped += 1;
        } else {
            break;
        }
    }
    (rest.trim_end().to_string(), skipped)
}

/// Splitter for turning source text into cells.
pub struct CellSplitter {
    cells: Vec<Cell>,
    lines: Vec<String>,
}

impl CellSplitter {
    /// Create a new splitter.
    pub fn new() -> Self {
        Self {
            cells: Vec::new(),
            lines: Vec::new(),
        }
    }

    /// Split a source text into cells.
    pub fn split(&mut self, source: &str) -> Result<Vec<Cell>, SplitError> {
        self.cells.clear();
        self.lines = source.lines().map(str::to_string).collect();

        let mut start = 1;
        let mut pending: Option<Marker> = None;
        for marker in find_markers(source) {
            self.split_region(start, marker.line - 1, pending.take())?;
            start = marker.line + 1;
            pending = Some(marker);
        }
        self.split_region(start, self.lines.len(), pending)?;

        Ok(std::mem::take(&mut self.cells))
    }

    fn fail(&self, error: ParseError) -> SplitError {
        SplitError {
            error,
            partial: self.cells.clone(),
            failed_index: self.cells.len(),
        }
    }

    fn text(&self, first: usize, last: usize) -> String {
        if first > last || first == 0 {
            return String::new();
        }
        self.lines[first - 1..last.min(self.lines.len())].join("\n")
    }

    /// Split the lines `first..=last` following an optional marker.
    fn split_region(
        &mut self,
        first: usize,
        last: usize,
        marker: Option<Marker>,
    ) -> Result<(), SplitError> {
        let mut metadata = marker
            .as_ref()
            .map(|m| m.metadata.clone())
            .unwrap_or_default();
        let mut code_start = first;

        if let Some(Marker {
            kind: CellKind::Markdown,
            ..
        }) = marker
        {
            let mut text = Vec::new();
            while code_start <= last {
                let line = self.lines[code_start - 1].trim();
                if line.is_empty() {
                    text.push("");
                } else if let Some(rest) = line.strip_prefix('#') {
                    text.push(rest.strip_prefix(' ').unwrap_or(rest));
                } else {
                    break;
                }
                code_start += 1;
            }
            let text = text.join("\n");
            self.push_markdown(&text, first, std::mem::take(&mut metadata));
        }

        self.split_code(code_start, last, metadata)
    }

    /// Split a code region at top-level string literal statements.
    fn split_code(
        &mut self,
        first: usize,
        last: usize,
        metadata: BTreeMap<String, String>,
    ) -> Result<(), SplitError> {
        if first > last {
            return Ok(());
        }
        let offset = first - 1;
        let module = parse(&self.text(first, last)).map_err(|e| self.fail(e.offset_lines(offset)))?;

        let mut metadata = Some(metadata);
        let mut chunk_start = first;
        for (i, stmt) in module.body.iter().enumerate() {
            let StmtKind::Expr(expr) = &stmt.kind else {
                continue;
            };
            let ExprKind::Constant(Constant::Str { value, prefix }) = &expr.kind else {
                continue;
            };
            let shares_line = (i > 0 && module.body[i - 1].end_line >= stmt.line)
                || module
                    .body
                    .get(i + 1)
                    .is_some_and(|next| next.line <= stmt.end_line);
            if shares_line {
                continue;
            }

            let (start, end) = (stmt.line + offset, stmt.end_line + offset);
            self.push_code(chunk_start, start - 1, &mut metadata);

            let mut string_metadata = metadata.take().unwrap_or_default();
            if !prefix.is_empty() {
                string_metadata.insert("string_prefix".to_string(), prefix.clone());
            }
            let before = self.cells.len();
            self.push_markdown(value, start, string_metadata);
            if let Some(cell) = self.cells.get_mut(before) {
                cell.span.end_line = end;
            }
            chunk_start = end + 1;
        }
        self.push_code(chunk_start, last, &mut metadata);
        Ok(())
    }

    fn push_code(
        &mut self,
        first: usize,
        last: usize,
        metadata: &mut Option<BTreeMap<String, String>>,
    ) {
        let (source, skipped) = normalize(&self.text(first, last));
        if source.is_empty() {
            return;
        }
        let start_line = first + skipped;
        let span = SourceSpan {
            start_line,
            end_line: start_line + source.lines().count() - 1,
        };
        let cell = Cell::new(self.cells.len(), CellKind::Code, source, span)
            .with_metadata(metadata.take().unwrap_or_default());
        self.cells.push(cell);
    }

    fn push_markdown(&mut self, text: &str, start_line: usize, metadata: BTreeMap<String, String>) {
        let (content, _) = normalize(text);
        if content.is_empty() {
            return;
        }
        let span = SourceSpan {
            start_line,
            end_line: start_line + content.lines().count().saturating_sub(1),
        };
        let cell = Cell::new(self.cells.len(), CellKind::Markdown, content, span)
            .with_metadata(metadata);
        self.cells.push(cell);
    }
}

impl Default for CellSplitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Locate marker lines. Markers inside multi-line strings are ignored; if
/// the document does not tokenize, fall back to a line scan so the regions
/// before the broken one can still be reported.
fn find_markers(source: &str) -> Vec<Marker> {
    match comments(source) {
        Ok(comments) => comments
            .iter()
            .filter(|c| c.column == 1 && c.text.starts_with(MARKER))
            .map(|c| Marker::parse(c.line, &c.text))
            .collect(),
        Err(_) => source
            .lines()
            .enumerate()
            .filter(|(_, line)| line.starts_with(MARKER))
            .map(|(i, line)| Marker::parse(i + 1, line.trim_end()))
            .collect(),
    }
}

/// Split a source text into cells.
pub fn split(source: &str) -> Result<Vec<Cell>, SplitError> {
    CellSplitter::new().split(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources(cells: &[Cell]) -> Vec<(&str, CellKind)> {
        cells.iter().map(|c| (c.source.as_str(), c.kind)).collect()
    }

    #[test]
    fn test_split_on_markers() {
        let cells = split("x = 1\n# %%\ny = 2\n\n# %%\n\nz = 3\n").unwrap();
        assert_eq!(
            sources(&cells),
            vec![
                ("x = 1", CellKind::Code),
                ("y = 2", CellKind::Code),
                ("z = 3", CellKind::Code),
            ]
        );
        assert_eq!(cells[0].span, SourceSpan { start_line: 1, end_line: 1 });
        assert_eq!(cells[2].span, SourceSpan { start_line: 7, end_line: 7 });
        assert_eq!(cells.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_cells_are_dropped() {
        let cells = split("# %%\n\n# %%\n   \n# %%\nx = 1\n").unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].index, 0);
    }

    #[test]
    fn test_markdown_marker_region() {
        let source = "# %% [markdown]\n# # Title\n#\n# Some text\nx = 1\n";
        let cells = split(source).unwrap();
        assert_eq!(
            sources(&cells),
            vec![
                ("# Title\n\nSome text", CellKind::Markdown),
                ("x = 1", CellKind::Code),
            ]
        );
    }

    #[test]
    fn test_marker_title_and_metadata() {
        let cells = split("# %% Load data [md] author=\"Ann Lee\" tags=io\n# hello\n").unwrap();
        let cell = &cells[0];
        assert_eq!(cell.kind, CellKind::Markdown);
        assert_eq!(cell.title(), Some("Load data"));
        assert_eq!(cell.metadata["author"], "Ann Lee");
        assert_eq!(cell.metadata["tags"], "io");
    }

    #[test]
    fn test_metadata_without_title() {
        let cells = split("# %% key=value\nx = 1\n").unwrap();
        assert_eq!(cells[0].title(), None);
        assert_eq!(cells[0].metadata["key"], "value");
    }

    #[test]
    fn test_string_literal_cells() {
        let source = "x = 1\n\"\"\"\n# Heading\n\nBody\n\"\"\"\ny = x\n";
        let cells = split(source).unwrap();
        assert_eq!(
            sources(&cells),
            vec![
                ("x = 1", CellKind::Code),
                ("# Heading\n\nBody", CellKind::Markdown),
                ("y = x", CellKind::Code),
            ]
        );
        assert_eq!(cells[1].span, SourceSpan { start_line: 2, end_line: 6 });
        assert_eq!(cells[2].span.start_line, 7);
    }

    #[test]
    fn test_string_prefix_recorded() {
        let cells = split("r'''raw \\d text'''\n").unwrap();
        assert_eq!(cells[0].kind, CellKind::Markdown);
        assert_eq!(cells[0].source, "raw \\d text");
        assert_eq!(cells[0].metadata["string_prefix"], "r");
    }

    #[test]
    fn test_fstring_and_docstrings_stay_code() {
        let source = "name = 'x'\nf\"hello {name}\"\ndef f():\n    \"\"\"Doc.\"\"\"\n    return 1\n";
        let cells = split(source).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].kind, CellKind::Code);
    }

    #[test]
    fn test_marker_inside_string_is_ignored() {
        let source = "text = \"\"\"\n# %% not a marker\n\"\"\"\n# %%\ny = 2\n";
        let cells = split(source).unwrap();
        assert_eq!(cells.len(), 2);
        assert!(cells[0].source.contains("not a marker"));
    }

    #[test]
    fn test_parse_error_reports_partial_cells() {
        let source = "x = 1\n# %%\ny = (\n# %%\nz = 3\n";
        let err = split(source).unwrap_err();
        assert_eq!(err.failed_index, 1);
        assert_eq!(err.partial.len(), 1);
        assert_eq!(err.partial[0].source, "x = 1");
        assert_eq!(err.error.line, 3);
    }

    #[test]
    fn test_leading_blank_lines_shift_span() {
        let cells = split("\n\n\nx = 1   \n").unwrap();
        assert_eq!(cells[0].source, "x = 1");
        assert_eq!(cells[0].span.start_line, 4);
    }
}
