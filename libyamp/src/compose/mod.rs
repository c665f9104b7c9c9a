//! Composes documents from the concrete syntax tree.
//!
//! The [`Composer`] takes top-level CST nodes one at a time. Directives and
//! comments between documents are held until the next document arrives; a
//! document is handed out as soon as it is known to be complete, either at a
//! `...` marker, at the start of the next document, or at [`Composer::end`].

mod collections;
mod node;
mod props;
mod scalars;

use crate::cst::{CstDocument, CstNode, SourceToken, TokenType};
use crate::directives::Directives;
use crate::document::{Document, NodeKind};
use crate::error::{ErrorCode, YamlError};
use crate::options::ParseOptions;
use crate::schema::Schema;
use props::{resolve_end, resolve_props, Next, PropsOptions};
use std::mem;

/// Byte range of a diagnostic.
pub(crate) type Span = (usize, usize);

pub(crate) fn token_span(token: &SourceToken) -> Span {
    (token.offset, token.offset + token.source.len())
}

pub(crate) fn node_span(node: &CstNode) -> Span {
    (node.offset(), node.offset() + node.source_text().len())
}

pub(crate) fn at(offset: usize) -> Span {
    (offset, offset + 1)
}

/// State shared while composing one document.
pub(crate) struct Ctx<'a> {
    pub doc: &'a mut Document,
    pub options: &'a ParseOptions,
    pub schema: &'static Schema,
    pub at_key: bool,
    pub at_root: bool,
    /// Collections currently open around the node being composed.
    pub depth: usize,
}

impl Ctx<'_> {
    pub fn error(&mut self, span: Span, code: ErrorCode, message: impl Into<String>) {
        self.report(span, code, message, false);
    }

    pub fn warn(&mut self, span: Span, code: ErrorCode, message: impl Into<String>) {
        self.report(span, code, message, true);
    }

    pub fn report(&mut self, span: Span, code: ErrorCode, message: impl Into<String>, warning: bool) {
        let err = YamlError::new(code, span.0, span.1, message);
        if warning {
            self.doc.warnings.push(err);
        } else {
            self.doc.errors.push(err);
        }
    }
}

/// Builds [`Document`]s from top-level CST nodes.
#[derive(Debug)]
pub struct Composer {
    options: ParseOptions,
    directives: Directives,
    doc: Option<Document>,
    at_directives: bool,
    prelude: Vec<String>,
    errors: Vec<YamlError>,
    warnings: Vec<YamlError>,
}

impl Composer {
    pub fn new(options: ParseOptions) -> Self {
        let directives = Directives::new(options.version);
        Self {
            options,
            directives,
            doc: None,
            at_directives: false,
            prelude: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Take the next top-level CST node; returns any documents it completed.
    pub fn compose(&mut self, token: &CstNode) -> Vec<Document> {
        let mut done = Vec::new();
        match token {
            CstNode::Directive(directive) => {
                let offset = directive.offset;
                let mut problems = Vec::new();
                self.directives
                    .add(&directive.source, &mut |rel, message, warning| {
                        problems.push((rel, message, warning))
                    });
                for (rel, message, warning) in problems {
                    self.report(at(offset + rel), ErrorCode::BadDirective, message, warning);
                }
                self.prelude.push(directive.source.clone());
                self.at_directives = true;
            }
            CstNode::Document(cst) => {
                let directives = mem::replace(&mut self.directives, Directives::new(self.options.version));
                let mut doc = compose_doc(&self.options, directives, cst);
                if self.at_directives && !doc.directives.doc_start {
                    doc.errors.push(YamlError::new(
                        ErrorCode::MissingChar,
                        cst.offset,
                        cst.offset + 1,
                        "Missing directives-end/doc-start indicator line",
                    ));
                }
                self.decorate(&mut doc, false);
                done.extend(self.doc.take());
                self.doc = Some(doc);
                self.at_directives = false;
            }
            CstNode::Source(t) if t.kind == TokenType::Comment || t.kind == TokenType::Newline => {
                self.prelude.push(t.source.clone());
            }
            CstNode::Source(t) if t.kind == TokenType::ByteOrderMark || t.kind == TokenType::Space => {}
            CstNode::Error(err) => {
                let message = if err.source.is_empty() {
                    err.message.clone()
                } else {
                    format!("{}: {:?}", err.message, err.source)
                };
                let err = YamlError::new(
                    ErrorCode::UnexpectedToken,
                    err.offset,
                    err.offset + err.source.len().max(1),
                    message,
                );
                match &mut self.doc {
                    Some(doc) if !self.at_directives => doc.errors.push(err),
                    _ => self.errors.push(err),
                }
            }
            CstNode::DocEnd(end) => match self.doc.take() {
                Some(mut doc) => {
                    doc.directives.doc_end = true;
                    let mut ctx = Ctx {
                        doc: &mut doc,
                        options: &self.options,
                        schema: Schema::get(self.options.schema_for(self.options.version)),
                        at_key: false,
                        at_root: true,
                        depth: 0,
                    };
                    let (comment, offset) = resolve_end(
                        &mut ctx,
                        &end.end,
                        end.offset + end.source.len(),
                        self.options.strict,
                    );
                    self.decorate(&mut doc, true);
                    if let Some(comment) = comment {
                        doc.comment = Some(join_comment(doc.comment.take(), &comment));
                    }
                    doc.range[2] = offset;
                    done.push(doc);
                }
                None => self.errors.push(YamlError::new(
                    ErrorCode::UnexpectedToken,
                    end.offset,
                    end.offset + end.source.len(),
                    "Unexpected doc-end without preceding document",
                )),
            },
            other => self.errors.push(YamlError::new(
                ErrorCode::UnexpectedToken,
                other.offset(),
                other.offset() + 1,
                format!("Unsupported token {}", other.type_name()),
            )),
        }
        for doc in &done {
            tracing::debug!(
                errors = doc.errors.len(),
                warnings = doc.warnings.len(),
                version = %doc.version(),
                "composed document"
            );
        }
        done
    }

    /// Flush the open document. With `force_doc`, or when problems are
    /// pending, an empty document is made so that nothing is lost.
    pub fn end(&mut self, force_doc: bool, end_offset: usize) -> Vec<Document> {
        if let Some(mut doc) = self.doc.take() {
            self.decorate(&mut doc, true);
            tracing::debug!(
                errors = doc.errors.len(),
                warnings = doc.warnings.len(),
                version = %doc.version(),
                "composed document"
            );
            return vec![doc];
        }
        if !force_doc && self.errors.is_empty() && self.warnings.is_empty() {
            return Vec::new();
        }
        let directives = mem::replace(&mut self.directives, Directives::new(self.options.version));
        let schema = self.options.schema_for(directives.version);
        let merge = self.options.merge_keys.unwrap_or(Schema::get(schema).merge);
        let mut doc = Document::new(directives, schema, merge);
        if self.at_directives {
            doc.errors.push(YamlError::new(
                ErrorCode::MissingChar,
                end_offset,
                end_offset,
                "Missing directives-end indicator line",
            ));
        }
        doc.range = [end_offset; 3];
        self.decorate(&mut doc, false);
        self.at_directives = false;
        tracing::debug!(errors = doc.errors.len(), "composed empty document");
        vec![doc]
    }

    fn report(&mut self, span: Span, code: ErrorCode, message: String, warning: bool) {
        let err = YamlError::new(code, span.0, span.1, message);
        if warning {
            self.warnings.push(err);
        } else {
            self.errors.push(err);
        }
    }

    /// Attach the held comments and problems to a document.
    fn decorate(&mut self, doc: &mut Document, after_doc: bool) {
        let (comment, after_empty_line) = parse_prelude(&self.prelude);
        if let Some(comment) = comment {
            if after_doc {
                doc.comment = Some(join_comment(doc.comment.take(), &comment));
            } else if after_empty_line || doc.directives.doc_start || doc.contents.is_none() {
                doc.comment_before = Some(comment);
            } else if let Some(first) = first_commentable(doc) {
                let node = doc.node_mut(first);
                node.comment_before = Some(match node.comment_before.take() {
                    Some(cb) => format!("{}\n{}", comment, cb),
                    None => comment,
                });
            }
        }
        if after_doc {
            doc.errors.append(&mut self.errors);
            doc.warnings.append(&mut self.warnings);
        } else {
            let mut errors = mem::take(&mut self.errors);
            errors.append(&mut doc.errors);
            doc.errors = errors;
            let mut warnings = mem::take(&mut self.warnings);
            warnings.append(&mut doc.warnings);
            doc.warnings = warnings;
        }
        self.prelude.clear();
    }
}

/// The node a leading comment belongs to: the first key or item of a block
/// collection, else the contents themselves.
fn first_commentable(doc: &Document) -> Option<crate::document::NodeId> {
    let contents = doc.contents?;
    let first = match &doc.node(contents).kind {
        NodeKind::Mapping(m) if !m.flow => m.pairs.first().map(|pair| pair.key),
        NodeKind::Sequence(s) if !s.flow => s.items.first().copied(),
        _ => None,
    };
    Some(first.unwrap_or(contents))
}

pub(crate) fn join_comment(existing: Option<String>, comment: &str) -> String {
    match existing {
        Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, comment),
        _ => comment.to_string(),
    }
}

/// Comments before a document, and whether a blank line separates them from
/// its contents.
fn parse_prelude(prelude: &[String]) -> (Option<String>, bool) {
    let mut comment = String::new();
    let mut at_comment = false;
    let mut after_empty_line = false;
    let mut i = 0;
    while i < prelude.len() {
        let source = &prelude[i];
        match source.as_bytes().first() {
            Some(b'#') => {
                if !comment.is_empty() {
                    comment.push_str(if after_empty_line { "\n\n" } else { "\n" });
                }
                let text = &source[1..];
                comment.push_str(if text.is_empty() { " " } else { text });
                at_comment = true;
                after_empty_line = false;
            }
            Some(b'%') => {
                if !prelude.get(i + 1).is_some_and(|next| next.starts_with('#')) {
                    i += 1;
                }
                at_comment = false;
            }
            _ => {
                if !at_comment {
                    after_empty_line = true;
                }
                at_comment = false;
            }
        }
        i += 1;
    }
    ((!comment.is_empty()).then_some(comment), after_empty_line)
}

/// Compose one document node.
fn compose_doc(options: &ParseOptions, mut directives: Directives, cst: &CstDocument) -> Document {
    let schema_name = options.schema_for(directives.version);
    let schema = Schema::get(schema_name);
    let merge = options.merge_keys.unwrap_or(schema.merge);
    directives.doc_start = cst.start.iter().any(|t| t.kind == TokenType::DocStart);
    let mut doc = Document::new(directives, schema_name, merge);
    let mut ctx = Ctx {
        doc: &mut doc,
        options,
        schema,
        at_key: false,
        at_root: true,
        depth: 0,
    };
    let value = cst.value.as_deref();
    let next = match value {
        Some(node) => Next::Node(node),
        None => Next::from_token(cst.end.first()),
    };
    let mut props = resolve_props(
        &mut ctx,
        &cst.start,
        PropsOptions {
            flow: None,
            indicator: TokenType::DocStart,
            next,
            offset: cst.offset,
            parent_indent: 0,
            start_on_newline: true,
        },
    );
    if props.found.is_some() {
        if value.is_some_and(CstNode::is_block_collection) && !props.has_newline {
            ctx.error(
                at(props.end),
                ErrorCode::MissingChar,
                "Block collection cannot start on same line with directives-end marker",
            );
        }
    }
    // A comment set off from the contents by a blank line is the document's.
    if props.comment.ends_with('\n') {
        ctx.doc.comment_before = Some(props.comment.trim_end_matches('\n').to_string());
        props.comment.clear();
    }
    let contents = match value {
        Some(node) => node::compose_node(&mut ctx, node, &props),
        None => node::compose_empty_node(&mut ctx, props.end, Some(cst.start.as_slice()), None, &props),
    };
    let content_end = ctx.doc.node(contents).range[2];
    let (comment, end) = resolve_end(&mut ctx, &cst.end, content_end, false);
    doc.contents = Some(contents);
    doc.comment = comment;
    doc.range = [cst.offset, content_end, end];
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cst::DocEnd;
    use crate::parser::Parser;
    use crate::value::Value;

    fn compose_all(source: &str) -> Vec<Document> {
        let mut composer = Composer::new(ParseOptions::default());
        let mut docs = Vec::new();
        for token in Parser::new().parse(source, false) {
            docs.extend(composer.compose(&token));
        }
        docs.extend(composer.end(false, source.len()));
        docs
    }

    fn debug(doc: &Document) -> String {
        format!("{:?}", doc.to_value().unwrap())
    }

    #[test]
    fn test_documents_and_directives() {
        let docs = compose_all("%YAML 1.1\n---\na: yes\n...\n---\nb: yes\n");
        assert_eq!(docs.len(), 2);
        assert_eq!(debug(&docs[0]), r#"{"a": true}"#);
        assert!(docs[0].directives.explicit_version);
        assert!(docs[0].directives.doc_end);
        // Directives do not carry over to the next document.
        assert_eq!(debug(&docs[1]), r#"{"b": "yes"}"#);
        assert!(!docs[1].directives.explicit_version);
    }

    #[test]
    fn test_missing_doc_start_after_directive() {
        let docs = compose_all("%YAML 1.2\nfoo\n");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].errors[0].code, ErrorCode::MissingChar);
    }

    #[test]
    fn test_comments_are_kept() {
        let docs = compose_all("# head\n\nkey: value # tail\n");
        let doc = &docs[0];
        assert_eq!(doc.comment_before.as_deref(), Some(" head"));
        let root = doc.contents.unwrap();
        let value = doc.get(root, "key").unwrap();
        assert_eq!(doc.node(value).comment.as_deref(), Some(" tail"));
    }

    #[test]
    fn test_errors_stay_with_their_document() {
        let docs = compose_all("a: *nope\n---\nb: 1\n");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].errors.len(), 1);
        assert_eq!(docs[0].errors[0].message, "Aliased anchor not found: nope");
        assert!(docs[1].errors.is_empty());
        assert_eq!(debug(&docs[1]), r#"{"b": 1}"#);
        assert_eq!(docs[0].to_value().unwrap(), Value::Mapping(vec![("a".into(), Value::Null)]));
    }

    #[test]
    fn test_stray_doc_end_makes_a_document() {
        let mut composer = Composer::new(ParseOptions::default());
        let stray = CstNode::DocEnd(DocEnd {
            offset: 0,
            source: "...".to_string(),
            end: Vec::new(),
        });
        assert!(composer.compose(&stray).is_empty());
        let docs = composer.end(false, 3);
        assert_eq!(docs.len(), 1);
        assert_eq!(
            docs[0].errors[0].message,
            "Unexpected doc-end without preceding document"
        );
    }
}
