//! Error types for YAML parsing and composition.

use std::fmt;
use thiserror::Error;

/// Result type for operations that fail on the first error.
pub type Result<T> = std::result::Result<T, YamlError>;

/// Classification of a parse or compose problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    AliasProps,
    BadAlias,
    BadCollectionType,
    BadDirective,
    BadDqEscape,
    BadIndent,
    BadMergeSource,
    BadPropOrder,
    BadScalarStart,
    BlockAsImplicitKey,
    BlockInFlow,
    DuplicateKey,
    Impossible,
    KeyOver1024Chars,
    MissingChar,
    MultilineImplicitKey,
    MultipleAnchors,
    MultipleDocs,
    MultipleTags,
    NestingTooDeep,
    TabAsIndent,
    TagResolveFailed,
    UnexpectedToken,
    /// Raised outside of parsing, while converting a document to plain data.
    AliasCycle,
}

impl ErrorCode {
    /// The stable upper-case identifier of this code.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::AliasProps => "ALIAS_PROPS",
            ErrorCode::BadAlias => "BAD_ALIAS",
            ErrorCode::BadCollectionType => "BAD_COLLECTION_TYPE",
            ErrorCode::BadDirective => "BAD_DIRECTIVE",
            ErrorCode::BadDqEscape => "BAD_DQ_ESCAPE",
            ErrorCode::BadIndent => "BAD_INDENT",
            ErrorCode::BadMergeSource => "BAD_MERGE_SOURCE",
            ErrorCode::BadPropOrder => "BAD_PROP_ORDER",
            ErrorCode::BadScalarStart => "BAD_SCALAR_START",
            ErrorCode::BlockAsImplicitKey => "BLOCK_AS_IMPLICIT_KEY",
            ErrorCode::BlockInFlow => "BLOCK_IN_FLOW",
            ErrorCode::DuplicateKey => "DUPLICATE_KEY",
            ErrorCode::Impossible => "IMPOSSIBLE",
            ErrorCode::KeyOver1024Chars => "KEY_OVER_1024_CHARS",
            ErrorCode::MissingChar => "MISSING_CHAR",
            ErrorCode::MultilineImplicitKey => "MULTILINE_IMPLICIT_KEY",
            ErrorCode::MultipleAnchors => "MULTIPLE_ANCHORS",
            ErrorCode::MultipleDocs => "MULTIPLE_DOCS",
            ErrorCode::MultipleTags => "MULTIPLE_TAGS",
            ErrorCode::NestingTooDeep => "NESTING_TOO_DEEP",
            ErrorCode::TabAsIndent => "TAB_AS_INDENT",
            ErrorCode::TagResolveFailed => "TAG_RESOLVE_FAILED",
            ErrorCode::UnexpectedToken => "UNEXPECTED_TOKEN",
            ErrorCode::AliasCycle => "ALIAS_CYCLE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-based line and column of a source offset. Columns count characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinePos {
    pub line: usize,
    pub col: usize,
}

/// An error or warning found while parsing, composing or converting a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}{}", loc_suffix(.line_pos, .filename))]
pub struct YamlError {
    pub code: ErrorCode,
    pub message: String,
    /// Byte offsets `start..end` in the whole input stream.
    pub start: usize,
    pub end: usize,
    pub line_pos: Option<LinePos>,
    pub filename: Option<String>,
}

impl YamlError {
    pub fn new(code: ErrorCode, start: usize, end: usize, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            start,
            end,
            line_pos: None,
            filename: None,
        }
    }

    /// Attach line/column information and the source name.
    pub fn with_location(mut self, lines: &LineCounter, filename: Option<&str>) -> Self {
        self.line_pos = Some(lines.line_pos(self.start));
        self.filename = filename.map(String::from);
        self
    }
}

/// Format a location suffix for error messages.
fn loc_suffix(line_pos: &Option<LinePos>, filename: &Option<String>) -> String {
    match (line_pos, filename) {
        (Some(lp), Some(name)) => format!(" at {}:{} of <{}>", lp.line, lp.col, name),
        (Some(lp), None) => format!(" at line {}, column {}", lp.line, lp.col),
        (None, _) => String::new(),
    }
}

/// Tracks the offsets of line starts as input arrives, so that byte offsets can
/// be turned into line/column pairs after the fact.
#[derive(Debug, Clone)]
pub struct LineCounter {
    line_starts: Vec<usize>,
    /// Offsets of UTF-8 continuation bytes, which take no column.
    continuations: Vec<usize>,
    consumed: usize,
}

impl Default for LineCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCounter {
    pub fn new() -> Self {
        Self {
            line_starts: vec![0],
            continuations: Vec::new(),
            consumed: 0,
        }
    }

    /// Record the newlines of the next chunk of input.
    pub fn add_chunk(&mut self, chunk: &str) {
        for (i, b) in chunk.bytes().enumerate() {
            if b == b'\n' {
                self.line_starts.push(self.consumed + i + 1);
            } else if b & 0xc0 == 0x80 {
                self.continuations.push(self.consumed + i);
            }
        }
        self.consumed += chunk.len();
    }

    /// Line and column (both one-based) of a byte offset. The column counts
    /// characters, not bytes.
    pub fn line_pos(&self, offset: usize) -> LinePos {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let start = self.line_starts[line.saturating_sub(1)].min(offset);
        let wide = self.continuations.partition_point(|&i| i < offset)
            - self.continuations.partition_point(|&i| i < start);
        LinePos {
            line: line.max(1),
            col: offset - start - wide + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_counter_across_chunks() {
        let mut lc = LineCounter::new();
        lc.add_chunk("ab\nc");
        lc.add_chunk("d\n\nef");
        assert_eq!(lc.line_pos(0), LinePos { line: 1, col: 1 });
        assert_eq!(lc.line_pos(3), LinePos { line: 2, col: 1 });
        assert_eq!(lc.line_pos(4), LinePos { line: 2, col: 2 });
        assert_eq!(lc.line_pos(7), LinePos { line: 4, col: 1 });
    }

    #[test]
    fn test_columns_count_characters() {
        let mut lc = LineCounter::new();
        lc.add_chunk("x\nkéy: ");
        lc.add_chunk("*日本\n");
        assert_eq!(lc.line_pos(2), LinePos { line: 2, col: 1 });
        // "kéy: " is six bytes and five characters
        assert_eq!(lc.line_pos(8), LinePos { line: 2, col: 6 });
        assert_eq!(lc.line_pos(12), LinePos { line: 2, col: 8 });
    }

    #[test]
    fn test_display_with_location() {
        let mut lc = LineCounter::new();
        lc.add_chunk("a: 1\nb: *x\n");
        let err = YamlError::new(ErrorCode::BadAlias, 8, 10, "Aliased anchor not found: x")
            .with_location(&lc, None);
        assert_eq!(
            err.to_string(),
            "Aliased anchor not found: x at line 2, column 4"
        );
        let named = err.clone().with_location(&lc, Some("doc.yaml"));
        assert_eq!(
            named.to_string(),
            "Aliased anchor not found: x at 2:4 of <doc.yaml>"
        );
    }
}
