//! Write documents back out as YAML text.
//!
//! Block style is the default. Collections that were parsed in flow style
//! stay in flow style, and so does everything inside them. A scalar is
//! written plain when its text resolves back to the same value under the
//! schema, otherwise quoted; strings with line breaks become literal or
//! folded block scalars.

use crate::document::{Document, Node, NodeId, NodeKind, Scalar, ScalarStyle, MAX_DEPTH};
use crate::options::{SchemaName, StringifyOptions};
use crate::schema::{stringify_bool, stringify_float, stringify_null, Schema, BINARY_TAG};
use crate::value::Value;
use base64::Engine;
use std::cell::Cell;

/// Width of the `- `, `? ` and `: ` indicators.
const MARKER_WIDTH: usize = 2;
/// Largest block scalar indentation indicator.
const MAX_INDENT_INDICATOR: usize = 9;
const MAX_IMPLICIT_KEY: usize = 1024;

/// Stringify one document.
pub fn stringify(doc: &Document, opts: &StringifyOptions) -> String {
    Writer::new(doc, opts).document(false)
}

/// Stringify a stream of documents, adding `---` and `...` markers where
/// they are needed to keep the documents apart.
pub fn stringify_all(docs: &[Document], opts: &StringifyOptions) -> String {
    let mut out = String::new();
    for (i, doc) in docs.iter().enumerate() {
        let has_directives = !doc.directives.to_lines().is_empty();
        if i > 0 && has_directives && !out.ends_with("...\n") {
            out.push_str("...\n");
        }
        out.push_str(&Writer::new(doc, opts).document(i > 0));
    }
    out
}

/// Stringify plain data, using the options' schema (`core` by default).
pub fn stringify_value(value: &Value, opts: &StringifyOptions) -> String {
    let schema = Schema::get(opts.schema.unwrap_or(SchemaName::Core));
    stringify(&Document::from_value(value, schema), opts)
}

// ============================================================================
// Writer
// ============================================================================

/// Where a scalar is written.
#[derive(Debug, Clone, Copy)]
struct Place {
    in_flow: bool,
    key: bool,
}

impl Place {
    const BLOCK: Place = Place {
        in_flow: false,
        key: false,
    };
    const KEY: Place = Place {
        in_flow: false,
        key: true,
    };
    const FLOW: Place = Place {
        in_flow: true,
        key: false,
    };
    const FLOW_KEY: Place = Place {
        in_flow: true,
        key: true,
    };
}

enum Text {
    Inline(String),
    Block { header: String, body: Vec<String> },
}

struct Writer<'a> {
    doc: &'a Document,
    opts: &'a StringifyOptions,
    schema: &'static Schema,
    depth: Cell<usize>,
}

impl<'a> Writer<'a> {
    fn new(doc: &'a Document, opts: &'a StringifyOptions) -> Self {
        Self {
            doc,
            opts,
            schema: Schema::get(opts.schema.unwrap_or(doc.schema)),
            depth: Cell::new(0),
        }
    }

    /// Run `write` one collection level deeper, or return `None` past
    /// [`MAX_DEPTH`].
    fn nested<T>(&self, write: impl FnOnce() -> T) -> Option<T> {
        let depth = self.depth.get();
        if depth >= MAX_DEPTH {
            tracing::warn!(depth, "collection nested too deep, writing null");
            return None;
        }
        self.depth.set(depth + 1);
        let out = write();
        self.depth.set(depth);
        Some(out)
    }

    fn step(&self) -> usize {
        self.opts.indent.max(1)
    }

    fn document(&self, force_start: bool) -> String {
        let doc = self.doc;
        let mut lines = Vec::new();
        if let Some(comment) = &doc.comment_before {
            lines.extend(comment_lines(comment, 0));
            lines.push(String::new());
        }
        let directives = doc.directives.to_lines();
        let marker = if force_start || doc.directives.doc_start || !directives.is_empty() {
            "---"
        } else {
            ""
        };
        lines.extend(directives);
        match doc.contents {
            Some(root) => {
                let indent = if self.is_block_collection(doc.node(root)) {
                    0
                } else {
                    self.step()
                };
                lines.extend(self.entry(marker, root, indent, 0, false, true));
            }
            None if !marker.is_empty() => lines.push(marker.to_string()),
            None => {}
        }
        if let Some(comment) = &doc.comment {
            lines.extend(comment_lines(comment, 0));
        }
        if doc.directives.doc_end {
            lines.push("...".to_string());
        }
        let mut out = lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    fn is_block_collection(&self, node: &Node) -> bool {
        match &node.kind {
            NodeKind::Mapping(map) => !map.flow && !map.pairs.is_empty(),
            NodeKind::Sequence(seq) => !seq.flow && !seq.items.is_empty(),
            _ => false,
        }
    }

    /// Anchor and tag, as written before a node.
    fn props(&self, node: &Node) -> String {
        let mut props = String::new();
        if let Some(anchor) = &node.anchor {
            props.push('&');
            props.push_str(anchor);
        }
        let tag = match (&node.tag, &node.kind) {
            (Some(tag), _) => Some(tag.as_str()),
            (None, NodeKind::Scalar(s)) if matches!(s.value, Value::Bytes(_)) => Some(BINARY_TAG),
            _ => None,
        };
        if let Some(tag) = tag {
            if !props.is_empty() {
                props.push(' ');
            }
            props.push_str(&self.doc.directives.tag_string(tag));
        }
        props
    }

    /// Lines for `marker` (`-`, `?`, `:`, `key:`, `---` or nothing) followed
    /// by the node. `indent` is the column of the node's own content and
    /// `parent` that of the marker.
    fn entry(
        &self,
        marker: &str,
        id: NodeId,
        indent: usize,
        parent: usize,
        inline_first: bool,
        own_comment: bool,
    ) -> Vec<String> {
        let node = self.doc.node(id);
        let prefix = format!("{}{}", " ".repeat(parent), marker);
        let props = self.props(node);
        let comment_before = node.comment_before.as_deref().filter(|_| own_comment);
        let mut lines = Vec::new();

        if self.is_block_collection(node) {
            let Some(body) = self.nested(|| self.collection_lines(id, indent)) else {
                lines.push(join_words(&prefix, "null"));
                return lines;
            };
            if inline_first && props.is_empty() && comment_before.is_none() && !marker.is_empty() {
                if let Some((first, rest)) = body.split_first() {
                    lines.push(format!("{} {}", prefix, first.trim_start()));
                    lines.extend(rest.iter().cloned());
                    return lines;
                }
            }
            let head = join_words(&prefix, &props);
            if !head.is_empty() {
                lines.push(head);
            }
            if let Some(comment) = comment_before {
                lines.extend(comment_lines(comment, indent));
            }
            lines.extend(body);
            return lines;
        }

        let text = match &node.kind {
            NodeKind::Scalar(scalar) => self.scalar_text(node, scalar, indent, parent),
            _ => Text::Inline(self.flow_body(id)),
        };
        let mut head = prefix;
        if let Some(comment) = comment_before {
            let pad = if marker.is_empty() { parent } else { indent };
            if !head.is_empty() {
                lines.push(head);
            }
            lines.extend(comment_lines(comment, pad));
            head = " ".repeat(pad);
        }
        let trailing = node.comment.as_deref().map(|c| format!(" #{}", c.replace('\n', " ")));
        match text {
            Text::Inline(text) => {
                let mut line = join_words(&head, &join_words(&props, &text));
                line.push_str(trailing.as_deref().unwrap_or_default());
                lines.push(line);
            }
            Text::Block { mut header, body } => {
                header.push_str(trailing.as_deref().unwrap_or_default());
                lines.push(join_words(&head, &join_words(&props, &header)));
                lines.extend(body);
            }
        }
        lines
    }

    fn collection_lines(&self, id: NodeId, indent: usize) -> Vec<String> {
        let node = self.doc.node(id);
        let mut lines = Vec::new();
        match &node.kind {
            NodeKind::Mapping(map) => {
                for (i, pair) in map.pairs.iter().enumerate() {
                    let key = self.doc.node(pair.key);
                    before(&mut lines, key, i, indent);
                    match self.implicit_key(pair.key) {
                        Some(text) => {
                            let sep = if matches!(key.kind, NodeKind::Alias(_)) { " :" } else { ":" };
                            let marker = format!("{}{}", text, sep);
                            lines.extend(self.entry(&marker, pair.value, indent + self.step(), indent, false, true));
                        }
                        None => {
                            let child = indent + MARKER_WIDTH;
                            lines.extend(self.entry("?", pair.key, child, indent, true, false));
                            lines.extend(self.entry(":", pair.value, child, indent, true, true));
                        }
                    }
                }
            }
            NodeKind::Sequence(seq) => {
                for (i, &item) in seq.items.iter().enumerate() {
                    before(&mut lines, self.doc.node(item), i, indent);
                    lines.extend(self.entry("-", item, indent + MARKER_WIDTH, indent, true, false));
                }
            }
            _ => {}
        }
        if let Some(comment) = &node.comment {
            lines.extend(comment_lines(comment, indent));
        }
        lines
    }

    /// Single-line text for a key, or `None` if it needs `? `.
    fn implicit_key(&self, id: NodeId) -> Option<String> {
        let node = self.doc.node(id);
        if self.is_block_collection(node) {
            return None;
        }
        let text = match &node.kind {
            NodeKind::Scalar(scalar) => {
                if self.string_of(node, scalar).is_some_and(wants_block) {
                    return None;
                }
                self.inline_scalar(node, scalar, Place::KEY)
            }
            _ => self.flow_body(id),
        };
        let text = join_words(&self.props(node), &text);
        (text.len() <= MAX_IMPLICIT_KEY && !text.contains('\n')).then_some(text)
    }

    fn flow_text(&self, id: NodeId, key: bool) -> String {
        let node = self.doc.node(id);
        let body = match &node.kind {
            NodeKind::Scalar(scalar) => {
                let place = if key { Place::FLOW_KEY } else { Place::FLOW };
                self.inline_scalar(node, scalar, place)
            }
            _ => self.flow_body(id),
        };
        join_words(&self.props(node), &body)
    }

    /// A node in flow style, without its props.
    fn flow_body(&self, id: NodeId) -> String {
        let node = self.doc.node(id);
        match &node.kind {
            NodeKind::Alias(alias) => format!("*{}", alias.source),
            NodeKind::Scalar(scalar) => self.inline_scalar(node, scalar, Place::FLOW),
            NodeKind::Mapping(map) => self
                .nested(|| {
                    let pairs: Vec<String> = map
                        .pairs
                        .iter()
                        .map(|pair| {
                            let key = self.flow_text(pair.key, true);
                            let sep = match self.doc.node(pair.key).kind {
                                NodeKind::Alias(_) => " : ",
                                _ => ": ",
                            };
                            format!("{}{}{}", key, sep, self.flow_text(pair.value, false))
                        })
                        .collect();
                    format!("{{{}}}", pairs.join(", "))
                })
                .unwrap_or_else(|| "null".to_string()),
            NodeKind::Sequence(seq) => self
                .nested(|| {
                    let items: Vec<String> = seq.items.iter().map(|&item| self.flow_text(item, false)).collect();
                    format!("[{}]", items.join(", "))
                })
                .unwrap_or_else(|| "null".to_string()),
        }
    }

    /// The text a scalar is written from, if it is written as a string:
    /// string values, and the source of tagged values.
    fn string_of<'n>(&self, node: &'n Node, scalar: &'n Scalar) -> Option<&'n str> {
        match &scalar.value {
            Value::String(s) => Some(s.as_str()),
            _ if node.tag.is_some() => scalar.source.as_deref(),
            _ => None,
        }
    }

    fn scalar_text(&self, node: &Node, scalar: &Scalar, indent: usize, parent: usize) -> Text {
        match self.string_of(node, scalar) {
            Some(s) if scalar.style != ScalarStyle::DoubleQuoted && wants_block(s) => {
                self.block_text(s, scalar.style == ScalarStyle::Folded, indent, parent)
            }
            _ => Text::Inline(self.inline_scalar(node, scalar, Place::BLOCK)),
        }
    }

    fn inline_scalar(&self, node: &Node, scalar: &Scalar, place: Place) -> String {
        match self.string_of(node, scalar) {
            Some(s) => self.inline_string(s, scalar.style, place, node.tag.is_none()),
            None => self.value_text(scalar, place),
        }
    }

    fn inline_string(&self, s: &str, style: ScalarStyle, place: Place, check_plain: bool) -> String {
        if style == ScalarStyle::DoubleQuoted || s.contains('\n') || s.chars().any(needs_escape) {
            return double_quoted(s);
        }
        if style != ScalarStyle::SingleQuoted
            && plain_ok(s, place.in_flow)
            && (!check_plain || self.resolves_to(s, &Value::String(s.to_string()), place.key))
        {
            return s.to_string();
        }
        single_quoted(s)
    }

    /// Text for a non-string value: its source if that still reads back as
    /// the same value, else the schema's canonical form.
    fn value_text(&self, scalar: &Scalar, place: Place) -> String {
        if let Some(source) = scalar.source.as_deref() {
            if scalar.style == ScalarStyle::Plain
                && plain_ok(source, place.in_flow)
                && self.resolves_to(source, &scalar.value, place.key)
            {
                return source.to_string();
            }
        }
        let value = &scalar.value;
        if let Value::Bytes(bytes) = value {
            let text = base64::engine::general_purpose::STANDARD.encode(bytes);
            return if plain_ok(&text, place.in_flow) { text } else { double_quoted(&text) };
        }
        let tag = self.schema.identify(value);
        let format = scalar.format.or(tag.format);
        match (tag.stringify, value) {
            (Some(stringify), _) => stringify(value, format),
            (None, Value::Null) => stringify_null(value, format),
            (None, Value::Bool(_)) => stringify_bool(value, format),
            (None, Value::Integer(n)) => n.to_string(),
            (None, Value::Float(_)) => stringify_float(value, format),
            (None, value) => format!("{:?}", value),
        }
    }

    /// Does plain `text` resolve to `value` under the schema?
    fn resolves_to(&self, text: &str, value: &Value, at_key: bool) -> bool {
        let tag = self.schema.resolve_plain(text, at_key);
        let mut failed = false;
        let resolved = (tag.resolve)(text, &mut |_| failed = true);
        !failed && resolved.same_as(value)
    }

    fn block_text(&self, s: &str, folded: bool, indent: usize, parent: usize) -> Text {
        let content = s.trim_end_matches('\n');
        let trailing = s.len() - content.len();
        let step = indent.saturating_sub(parent).clamp(1, MAX_INDENT_INDICATOR);
        let pad = " ".repeat(parent + step);
        let lines: Vec<&str> = content.split('\n').collect();
        let indicator = lines
            .iter()
            .find(|line| !line.is_empty())
            .is_some_and(|line| line.starts_with(' '));
        let folded = folded && !lines.iter().any(|line| line.starts_with([' ', '\t']));

        let mut header = String::from(if folded { ">" } else { "|" });
        if indicator {
            header.push_str(&step.to_string());
        }
        header.push_str(match trailing {
            0 => "-",
            1 => "",
            _ => "+",
        });

        let mut body = Vec::new();
        if folded {
            let width = match self.opts.line_width {
                0 => usize::MAX,
                width => width.saturating_sub(parent + step).max(1),
            };
            for (i, line) in lines.iter().enumerate() {
                // Each kept line break is one extra empty line.
                if i > 0 {
                    body.push(String::new());
                }
                if !line.is_empty() {
                    body.extend(wrap_line(line, width).into_iter().map(|part| format!("{}{}", pad, part)));
                }
            }
        } else {
            body.extend(lines.iter().map(|line| {
                if line.is_empty() {
                    String::new()
                } else {
                    format!("{}{}", pad, line)
                }
            }));
        }
        for _ in 1..trailing.max(1) {
            body.push(String::new());
        }
        Text::Block { header, body }
    }
}

// ============================================================================
// Line and scalar helpers
// ============================================================================

fn before(lines: &mut Vec<String>, node: &Node, index: usize, indent: usize) {
    if index > 0 && node.space_before {
        lines.push(String::new());
    }
    if let Some(comment) = &node.comment_before {
        lines.extend(comment_lines(comment, indent));
    }
}

fn comment_lines(comment: &str, indent: usize) -> Vec<String> {
    let pad = " ".repeat(indent);
    comment
        .split('\n')
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{}#{}", pad, line)
            }
        })
        .collect()
}

fn join_words(a: &str, b: &str) -> String {
    if b.is_empty() {
        a.to_string()
    } else if a.trim().is_empty() {
        format!("{}{}", a, b)
    } else {
        format!("{} {}", a, b)
    }
}

/// Characters only a double-quoted scalar can hold.
fn needs_escape(ch: char) -> bool {
    (ch.is_control() && ch != '\n' && ch != '\t')
        || matches!(ch, '\u{feff}' | '\u{2028}' | '\u{2029}')
}

/// Block scalars cannot carry blank-only text or a last line of only
/// spaces and tabs; those stay quoted.
fn wants_block(s: &str) -> bool {
    let blank_last_line = s
        .trim_end_matches('\n')
        .rsplit_once('\n')
        .is_some_and(|(_, last)| !last.is_empty() && last.chars().all(|c| c == ' ' || c == '\t'));
    s.contains('\n') && !s.chars().any(needs_escape) && !s.trim().is_empty() && !blank_last_line
}

fn plain_ok(s: &str, in_flow: bool) -> bool {
    const FLOW_CHARS: &str = ",[]{}";
    let first = match s.chars().next() {
        Some(first) => first,
        None => return false,
    };
    if first.is_whitespace() || s.ends_with(char::is_whitespace) || s.ends_with(':') {
        return false;
    }
    if "[]{},#&*!|>'\"%@`".contains(first) || s.starts_with("---") || s.starts_with("...") {
        return false;
    }
    if matches!(first, '-' | '?' | ':') {
        match s[1..].chars().next() {
            None | Some(' ' | '\t') => return false,
            Some(next) if in_flow && FLOW_CHARS.contains(next) => return false,
            _ => {}
        }
    }
    if in_flow && (s.contains(':') || s.contains(|c: char| FLOW_CHARS.contains(c))) {
        return false;
    }
    let mut prev = first;
    for ch in s.chars().skip(1) {
        if (ch == '#' && matches!(prev, ' ' | '\t')) || (prev == ':' && matches!(ch, ' ' | '\t')) {
            return false;
        }
        prev = ch;
    }
    !s.contains('\n') && !s.chars().any(needs_escape)
}

fn single_quoted(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn double_quoted(s: &str) -> String {
    let mut result = String::from("\"");
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            '\0' => result.push_str("\\0"),
            '\x07' => result.push_str("\\a"),
            '\x08' => result.push_str("\\b"),
            '\x0b' => result.push_str("\\v"),
            '\x0c' => result.push_str("\\f"),
            '\x1b' => result.push_str("\\e"),
            '\u{85}' => result.push_str("\\N"),
            '\u{2028}' => result.push_str("\\L"),
            '\u{2029}' => result.push_str("\\P"),
            c if needs_escape(c) && (c as u32) <= 0xff => {
                result.push_str(&format!("\\x{:02X}", c as u32));
            }
            c if needs_escape(c) => result.push_str(&format!("\\u{:04X}", c as u32)),
            c => result.push(c),
        }
    }
    result.push('"');
    result
}

/// Break a line at single spaces so each part fits in `width` where possible.
fn wrap_line(line: &str, width: usize) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut parts = Vec::new();
    let mut start = 0;
    let mut split: Option<usize> = None;
    for i in 0..bytes.len() {
        let breakable = bytes[i] == b' '
            && i > start
            && bytes[i - 1] != b' '
            && bytes.get(i + 1).is_some_and(|&b| b != b' ');
        if !breakable {
            continue;
        }
        if i - start > width {
            if let Some(at) = split.take() {
                parts.push(&line[start..at]);
                start = at + 1;
            }
        }
        split = Some(i);
    }
    if bytes.len() - start > width {
        if let Some(at) = split.filter(|&at| at > start) {
            parts.push(&line[start..at]);
            start = at + 1;
        }
    }
    parts.push(&line[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Composer;
    use crate::options::ParseOptions;
    use crate::parser::Parser;

    fn parse(source: &str) -> Vec<Document> {
        let mut composer = Composer::new(ParseOptions::default());
        let mut docs = Vec::new();
        for token in Parser::new().parse(source, false) {
            docs.extend(composer.compose(&token));
        }
        docs.extend(composer.end(false, source.len()));
        docs
    }

    fn s(text: &str) -> Value {
        Value::String(text.to_string())
    }

    #[test]
    fn test_block_style_values() {
        let value = Value::Mapping(vec![
            (s("a"), Value::from(1i64)),
            (s("b"), Value::Sequence(vec![Value::Bool(true), Value::Null])),
            (s("c"), s("x y")),
            (s("d"), Value::Sequence(vec![])),
        ]);
        let text = stringify_value(&value, &StringifyOptions::default());
        assert_eq!(text, "a: 1\nb:\n  - true\n  - null\nc: x y\nd: []\n");
    }

    #[test]
    fn test_strings_are_quoted_when_needed() {
        let value = Value::Sequence(vec![s("true"), s(""), s("a: b"), s("bell\u{7}"), s("#x"), s("it's")]);
        let text = stringify_value(&value, &StringifyOptions::default());
        assert_eq!(text, "- 'true'\n- ''\n- 'a: b'\n- \"bell\\a\"\n- '#x'\n- it's\n");
    }

    #[test]
    fn test_literal_block_scalars() {
        let opts = StringifyOptions::default();
        let text = stringify_value(&Value::Mapping(vec![(s("s"), s("one\ntwo\n"))]), &opts);
        assert_eq!(text, "s: |\n  one\n  two\n");
        let text = stringify_value(&Value::Mapping(vec![(s("s"), s("keep\n\n"))]), &opts);
        assert_eq!(text, "s: |+\n  keep\n\n");
        let text = stringify_value(&Value::Sequence(vec![s("a\nb")]), &opts);
        assert_eq!(text, "- |-\n  a\n  b\n");
        let text = stringify_value(&Value::Mapping(vec![(s("s"), s(" x\ny\n"))]), &opts);
        assert_eq!(text, "s: |2\n   x\n  y\n");
    }

    #[test]
    fn test_blank_lines_stay_quoted() {
        let opts = StringifyOptions::default();
        let text = stringify_value(&Value::Mapping(vec![(s("k"), s("  \n  "))]), &opts);
        assert_eq!(text, "k: \"  \\n  \"\n");
        let text = stringify_value(&Value::Sequence(vec![s("a\n\t")]), &opts);
        assert_eq!(text, "- \"a\\n\\t\"\n");
        let text = stringify_value(&Value::Sequence(vec![s("\n\n")]), &opts);
        assert_eq!(text, "- \"\\n\\n\"\n");
    }

    #[test]
    fn test_nested_sequences_and_maps() {
        let value = Value::Sequence(vec![
            Value::Mapping(vec![(s("a"), Value::from(1i64)), (s("b"), Value::from(2i64))]),
            Value::Sequence(vec![s("x"), s("y")]),
        ]);
        let text = stringify_value(&value, &StringifyOptions::default());
        assert_eq!(text, "- a: 1\n  b: 2\n- - x\n  - y\n");
    }

    #[test]
    fn test_bytes_get_binary_tag() {
        let text = stringify_value(&Value::Bytes(b"hi".to_vec()), &StringifyOptions::default());
        assert_eq!(text, "!!binary aGk=\n");
    }

    #[test]
    fn test_source_forms_are_kept() {
        let source = "base: &b {a: 1}\nref: *b\nlist: [x, 'y', \"z\"]\nhex: 0x1F\n";
        let docs = parse(source);
        assert!(docs[0].errors.is_empty(), "{:?}", docs[0].errors);
        assert_eq!(stringify(&docs[0], &StringifyOptions::default()), source);
    }

    #[test]
    fn test_directives_and_streams() {
        let docs = parse("%YAML 1.1\n---\na: yes\n");
        assert_eq!(
            stringify(&docs[0], &StringifyOptions::default()),
            "%YAML 1.1\n---\na: yes\n"
        );
        let docs = parse("a: 1\n---\nb: 2\n");
        assert_eq!(stringify_all(&docs, &StringifyOptions::default()), "a: 1\n---\nb: 2\n");
    }

    #[test]
    fn test_wrap_line() {
        assert_eq!(
            wrap_line("aaa bbb ccc ddd eee fff ggg", 18),
            vec!["aaa bbb ccc ddd", "eee fff ggg"]
        );
        assert_eq!(wrap_line("a  b", 1), vec!["a  b"]);
        assert_eq!(wrap_line("short", 80), vec!["short"]);
    }

    #[test]
    fn test_plain_ok() {
        assert!(plain_ok("hello world", false));
        assert!(plain_ok("-1", false));
        assert!(!plain_ok("- x", false));
        assert!(!plain_ok("a #b", false));
        assert!(!plain_ok("a, b", true));
        assert!(plain_ok("a, b", false));
        assert!(!plain_ok("key:", false));
    }
}
