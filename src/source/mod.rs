//! Source units: raw text plus language identity and a line index.

pub mod language;
pub mod loader;

pub use language::{Inference, Language};
pub use loader::{collect_inputs, collect_sources, load_buffer, load_path, resolve_language, UnitInput};

use serde::Serialize;

/// Byte range with 1-based line/column bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Span {
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl Span {
    pub fn contains(&self, other: &Span) -> bool {
        self.start_byte <= other.start_byte && other.end_byte <= self.end_byte
    }

    pub fn contains_byte(&self, byte: usize) -> bool {
        self.start_byte <= byte && byte < self.end_byte
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start_byte < other.end_byte && other.start_byte < self.end_byte
    }

    pub fn len(&self) -> usize {
        self.end_byte.saturating_sub(self.start_byte)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// 1-based (line, column) of a byte offset; columns count characters.
    pub fn position(&self, text: &str, byte: usize) -> (usize, usize) {
        let byte = byte.min(text.len());
        let line = self.line_starts.partition_point(|&start| start <= byte);
        let line_start = self.line_starts[line.saturating_sub(1)];
        let column = text
            .get(line_start..byte)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(byte - line_start);
        (line, column + 1)
    }
}

/// One loaded file. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    name: String,
    language: Language,
    text: String,
    lines: LineIndex,
}

impl SourceUnit {
    pub fn new(name: impl Into<String>, language: Language, text: impl Into<String>) -> Self {
        let text = text.into();
        let lines = LineIndex::new(&text);
        Self {
            name: name.into(),
            language,
            text,
            lines,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    pub fn line_count(&self) -> usize {
        self.lines.line_count()
    }

    pub fn position(&self, byte: usize) -> (usize, usize) {
        self.lines.position(&self.text, byte)
    }

    pub fn span(&self, start_byte: usize, end_byte: usize) -> Span {
        let (start_line, start_column) = self.position(start_byte);
        let (end_line, end_column) = self.position(end_byte);
        Span {
            start_byte,
            end_byte,
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    pub fn slice(&self, span: &Span) -> &str {
        self.text.get(span.start_byte..span.end_byte).unwrap_or("")
    }
}
