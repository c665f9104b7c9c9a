//! A streaming YAML 1.1/1.2 parser.
//!
//! Source text goes through four stages, each usable on its own:
//!
//! 1. **Lexer**: splits the character stream into lexemes, with control
//!    sentinels marking the start of documents, flow collections and scalars.
//!
//! 2. **Parser**: builds a lossless concrete syntax tree from the lexemes.
//!    Every source character belongs to exactly one token, so
//!    [`cst::stringify`] gives back the input unchanged.
//!
//! 3. **Composer**: turns top-level CST nodes into [`Document`]s, resolving
//!    properties, tags, aliases and structural errors.
//!
//! 4. **Stringifier**: writes documents back out as YAML text.
//!
//! Input may arrive in chunks through [`StreamParser`]; documents are handed
//! out as soon as they are complete.

pub mod compose;
pub mod cst;
pub mod directives;
pub mod document;
mod error;
pub mod lexer;
mod options;
pub mod parser;
pub mod schema;
mod stringify;
mod value;

pub use compose::Composer;
pub use directives::Directives;
pub use document::{
    Alias, Document, KeyId, Mapping, Node, NodeId, NodeKind, Pair, Scalar, ScalarStyle, Sequence, MAX_DEPTH,
};
pub use error::{ErrorCode, LineCounter, LinePos, Result, YamlError};
pub use lexer::Lexer;
pub use options::{DuplicateKeys, ParseOptions, SchemaName, StringifyOptions, Version};
pub use parser::Parser;
pub use schema::Schema;
pub use stringify::{stringify, stringify_all, stringify_value};
pub use value::Value;

use cst::CstNode;

/// Parses YAML that arrives in pieces.
///
/// Each call to [`feed`](StreamParser::feed) returns the documents the new
/// input completed; [`finish`](StreamParser::finish) flushes the rest. Errors
/// on the returned documents carry line and column positions.
///
/// ```
/// use libyamp::{ParseOptions, StreamParser};
///
/// let mut stream = StreamParser::new(ParseOptions::default());
/// let mut docs = stream.feed("a: 1\n---\nb:");
/// docs.extend(stream.finish());
/// assert_eq!(docs.len(), 2);
/// ```
#[derive(Debug)]
pub struct StreamParser {
    parser: Parser,
    composer: Composer,
    lines: LineCounter,
    filename: Option<String>,
    consumed: usize,
}

impl StreamParser {
    pub fn new(options: ParseOptions) -> Self {
        let filename = options.filename.clone();
        Self {
            parser: Parser::new(),
            composer: Composer::new(options),
            lines: LineCounter::new(),
            filename,
            consumed: 0,
        }
    }

    /// Take the next chunk of input.
    pub fn feed(&mut self, chunk: &str) -> Vec<Document> {
        self.lines.add_chunk(chunk);
        self.consumed += chunk.len();
        let nodes = self.parser.parse(chunk, true);
        let docs = self.compose(&nodes);
        self.locate(docs)
    }

    /// End of input: flush whatever is still open.
    pub fn finish(&mut self) -> Vec<Document> {
        self.finish_with(false)
    }

    fn finish_with(&mut self, force_doc: bool) -> Vec<Document> {
        let nodes = self.parser.parse("", false);
        let mut docs = self.compose(&nodes);
        docs.extend(self.composer.end(force_doc, self.consumed));
        self.locate(docs)
    }

    fn compose(&mut self, nodes: &[CstNode]) -> Vec<Document> {
        nodes.iter().flat_map(|node| self.composer.compose(node)).collect()
    }

    fn locate(&self, mut docs: Vec<Document>) -> Vec<Document> {
        let filename = self.filename.as_deref();
        for doc in &mut docs {
            for err in doc.errors.iter_mut().chain(doc.warnings.iter_mut()) {
                *err = err.clone().with_location(&self.lines, filename);
            }
        }
        docs
    }
}

/// Parse every document in `source`.
pub fn parse_all_documents(source: &str, options: ParseOptions) -> Vec<Document> {
    let mut stream = StreamParser::new(options);
    let mut docs = stream.feed(source);
    docs.extend(stream.finish());
    docs
}

/// Parse a source holding a single document. An empty source gives an empty
/// document; extra documents are dropped with a `MULTIPLE_DOCS` error on the
/// first.
pub fn parse_document(source: &str, options: ParseOptions) -> Document {
    let version = options.version;
    let schema = options.schema_for(version);
    let mut stream = StreamParser::new(options);
    let mut docs = stream.feed(source);
    docs.extend(stream.finish_with(true));
    let extra = docs.len().saturating_sub(1);
    let mut docs = docs.into_iter();
    let mut doc = docs
        .next()
        .unwrap_or_else(|| Document::new(Directives::new(version), schema, false));
    if let Some(second) = docs.next() {
        tracing::debug!(extra, "dropping extra documents");
        let start = second.range[0];
        doc.errors.push(
            YamlError::new(
                ErrorCode::MultipleDocs,
                start,
                start + 1,
                "Source contains multiple documents; please use parse_all_documents()",
            )
            .with_location(&stream.lines, stream.filename.as_deref()),
        );
    }
    doc
}

/// Parse a single document into plain data. The first error, if any, is
/// returned instead.
pub fn parse_value(source: &str, options: ParseOptions) -> Result<Value> {
    let mut doc = parse_document(source, options);
    if !doc.errors.is_empty() {
        return Err(doc.errors.swap_remove(0));
    }
    doc.to_value()
}

/// The concrete syntax tree of `source`.
pub fn parse_cst(source: &str) -> Vec<CstNode> {
    Parser::new().parse(source, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        let value = parse_value("a: [1, two]\nb: ~\n", ParseOptions::default()).unwrap();
        assert_eq!(
            value,
            Value::Mapping(vec![
                ("a".into(), Value::Sequence(vec![1i64.into(), "two".into()])),
                ("b".into(), Value::Null),
            ])
        );
    }

    #[test]
    fn test_parse_value_error_has_location() {
        let err = parse_value("a: 1\na: 2\n", ParseOptions::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateKey);
        assert_eq!(err.line_pos, Some(LinePos { line: 2, col: 1 }));
    }

    #[test]
    fn test_parse_document_multiple() {
        let doc = parse_document("a\n---\nb\n", ParseOptions::default());
        assert_eq!(doc.to_value().unwrap(), Value::from("a"));
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.errors[0].code, ErrorCode::MultipleDocs);
    }

    #[test]
    fn test_parse_document_empty() {
        let doc = parse_document("", ParseOptions::default());
        assert!(doc.errors.is_empty());
        assert_eq!(doc.to_value().unwrap(), Value::Null);
        assert!(parse_all_documents("", ParseOptions::default()).is_empty());
    }

    #[test]
    fn test_filename_in_message() {
        let options = ParseOptions::default().with_filename("conf.yaml");
        let err = parse_value("x: *nope\n", options).unwrap_err();
        assert_eq!(err.to_string(), "Aliased anchor not found: nope at 1:4 of <conf.yaml>");
    }

    #[test]
    fn test_cst_round_trip() {
        let source = "# c\nkey: [a, {b: c}] # t\n---\n- |\n  x\n...\n";
        assert_eq!(cst::stringify(&parse_cst(source)), source);
    }
}
