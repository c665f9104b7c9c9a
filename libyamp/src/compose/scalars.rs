//! Scalar values: plain, quoted and block styles, and their tags.

use super::node::{tag_name, unresolved_tag};
use super::props::resolve_end;
use super::{at, node_span, token_span, Ctx, Span};
use crate::cst::{BlockScalar, CstNode, FlowScalar, SourceToken, TokenType};
use crate::document::{Node, NodeId, NodeKind, Scalar, ScalarStyle};
use crate::error::ErrorCode;

struct Resolved {
    value: String,
    style: ScalarStyle,
    comment: Option<String>,
    range: [usize; 3],
}

/// Problems found in scalar text, at offsets relative to the scalar.
type Problems = Vec<(usize, ErrorCode, String)>;

pub(crate) fn compose_scalar(
    ctx: &mut Ctx<'_>,
    token: &CstNode,
    tag: Option<&SourceToken>,
) -> NodeId {
    let resolved = match token {
        CstNode::BlockScalar(bs) => resolve_block_scalar(ctx, bs),
        CstNode::FlowScalar(fs) => resolve_flow_scalar(ctx, fs),
        other => {
            let offset = other.offset();
            ctx.error(
                node_span(other),
                ErrorCode::UnexpectedToken,
                format!("Expected a scalar value, but found: {}", other.type_name()),
            );
            Resolved {
                value: String::new(),
                style: ScalarStyle::Plain,
                comment: None,
                range: [offset; 3],
            }
        }
    };

    let name = tag.and_then(|tag| tag_name(ctx, tag));
    let schema = ctx.schema;
    let descriptor = match (name.as_deref(), tag) {
        (Some("!"), _) => schema.str_tag(),
        (Some(name), Some(tag)) => match schema.scalar_tag(name, &resolved.value) {
            Some(descriptor) => descriptor,
            None => {
                unresolved_tag(ctx, tag, name);
                schema.str_tag()
            }
        },
        _ if matches!(token, CstNode::FlowScalar(s) if s.kind == TokenType::Scalar) => {
            schema.resolve_plain(&resolved.value, ctx.at_key)
        }
        _ => schema.str_tag(),
    };

    let mut problems = Vec::new();
    let value = (descriptor.resolve)(&resolved.value, &mut |msg| problems.push(msg));
    if !problems.is_empty() {
        let span: Span = tag.map_or_else(|| node_span(token), token_span);
        for msg in problems {
            ctx.error(span, ErrorCode::TagResolveFailed, msg);
        }
    }

    let mut scalar = Scalar::new(value);
    scalar.style = resolved.style;
    scalar.format = descriptor.format;
    scalar.source = Some(resolved.value);
    let mut node = Node::new(NodeKind::Scalar(scalar));
    node.range = resolved.range;
    node.comment = resolved.comment;
    node.tag = name.filter(|name| name != "!");
    ctx.doc.add_node(node)
}

fn report(ctx: &mut Ctx<'_>, offset: usize, problems: Problems) {
    for (rel, code, msg) in problems {
        ctx.error(at(offset + rel), code, msg);
    }
}

fn resolve_flow_scalar(ctx: &mut Ctx<'_>, scalar: &FlowScalar) -> Resolved {
    let FlowScalar {
        kind,
        offset,
        source,
        end,
        ..
    } = scalar;
    let value_end = offset + source.len();
    let mut problems = Problems::new();
    let (value, style) = match kind {
        TokenType::Scalar => (plain_value(source, &mut problems), ScalarStyle::Plain),
        TokenType::SingleQuotedScalar => (
            single_quoted_value(source, &mut problems),
            ScalarStyle::SingleQuoted,
        ),
        TokenType::DoubleQuotedScalar => (
            double_quoted_value(source, &mut problems),
            ScalarStyle::DoubleQuoted,
        ),
        other => {
            ctx.error(
                (*offset, value_end),
                ErrorCode::UnexpectedToken,
                format!("Expected a flow scalar value, but found: {}", other.as_str()),
            );
            return Resolved {
                value: String::new(),
                style: ScalarStyle::Plain,
                comment: None,
                range: [*offset, value_end, value_end],
            };
        }
    };
    report(ctx, *offset, problems);
    let strict = ctx.options.strict;
    let (comment, end) = resolve_end(ctx, end, value_end, strict);
    Resolved {
        value,
        style,
        comment,
        range: [*offset, value_end, end],
    }
}

fn plain_value(source: &str, problems: &mut Problems) -> String {
    let bad_char = match source.chars().next() {
        Some('\t') => Some("a tab character".to_string()),
        Some(',') => Some("flow indicator character ,".to_string()),
        Some('%') => Some("directive indicator character %".to_string()),
        Some(ch @ ('|' | '>')) => Some(format!("block scalar indicator {}", ch)),
        Some(ch @ ('@' | '`')) => Some(format!("reserved character {}", ch)),
        _ => None,
    };
    if let Some(bad_char) = bad_char {
        problems.push((
            0,
            ErrorCode::BadScalarStart,
            format!("Plain value cannot start with {}", bad_char),
        ));
    }
    fold_lines(source)
}

fn single_quoted_value(source: &str, problems: &mut Problems) -> String {
    if !source.ends_with('\'') || source.len() == 1 {
        problems.push((
            source.len(),
            ErrorCode::MissingChar,
            "Missing closing 'quote".to_string(),
        ));
    }
    fold_lines(strip_quotes(source)).replace("''", "'")
}

/// Drop the first and last characters.
fn strip_quotes(source: &str) -> &str {
    let inner = source.get(1..).unwrap_or_default();
    match inner.char_indices().last() {
        Some((i, _)) => &inner[..i],
        None => "",
    }
}

fn trim_ws(s: &str) -> &str {
    s.trim_matches([' ', '\t'])
}

/// Fold line breaks in flow scalar text: a single break becomes a space,
/// and each blank line a newline.
fn fold_lines(source: &str) -> String {
    let (first, rest) = match source.split_once('\n') {
        Some(split) => split,
        None => return source.to_string(),
    };
    let first = first.strip_suffix('\r').unwrap_or(first);
    let mut res = first.trim_end_matches([' ', '\t']).to_string();
    let lines: Vec<&str> = rest.split('\n').collect();
    let (last, middle) = match lines.split_last() {
        Some(split) => split,
        None => return res,
    };
    let mut sep = " ";
    for line in middle {
        let line = trim_ws(line.strip_suffix('\r').unwrap_or(line));
        if line.is_empty() {
            if sep == "\n" {
                res.push('\n');
            } else {
                sep = "\n";
            }
        } else {
            res.push_str(sep);
            res.push_str(line);
            sep = " ";
        }
    }
    res.push_str(sep);
    res.push_str(last.trim_start_matches([' ', '\t']));
    res
}

fn escape_code(ch: char) -> Option<char> {
    Some(match ch {
        '0' => '\0',
        'a' => '\x07',
        'b' => '\x08',
        'e' => '\x1b',
        'f' => '\x0c',
        'n' => '\n',
        'r' => '\r',
        't' | '\t' => '\t',
        'v' => '\x0b',
        'N' => '\u{85}',
        '_' => '\u{a0}',
        'L' => '\u{2028}',
        'P' => '\u{2029}',
        ' ' => ' ',
        '"' => '"',
        '/' => '/',
        '\\' => '\\',
        _ => return None,
    })
}

fn double_quoted_value(source: &str, problems: &mut Problems) -> String {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let ch_at = |i: usize| chars.get(i).map(|&(_, ch)| ch);
    let collect = |from: usize, to: usize| -> String {
        chars[from.min(chars.len())..to.min(chars.len())]
            .iter()
            .map(|&(_, ch)| ch)
            .collect()
    };
    let is_blank = |ch: Option<char>| matches!(ch, Some(' ' | '\t'));

    let mut res = String::new();
    let mut i = 1;
    while i + 1 < chars.len() {
        let ch = chars[i].1;
        if ch == '\r' && ch_at(i + 1) == Some('\n') {
            i += 1;
            continue;
        }
        if ch == '\n' {
            let (fold, offset) = fold_newline(&chars, i);
            res.push_str(&fold);
            i = offset;
        } else if ch == '\\' {
            i += 1;
            let next = ch_at(i);
            let code_len = match next {
                Some('x') => Some(2),
                Some('u') => Some(4),
                Some('U') => Some(8),
                _ => None,
            };
            if let Some(code) = next.and_then(escape_code) {
                res.push(code);
            } else if next == Some('\n') {
                // An escaped line break joins lines without a space, but
                // the next line is still trimmed.
                while is_blank(ch_at(i + 1)) {
                    i += 1;
                }
            } else if next == Some('\r') && ch_at(i + 1) == Some('\n') {
                i += 1;
                while is_blank(ch_at(i + 1)) {
                    i += 1;
                }
            } else if let Some(len) = code_len {
                let hex = collect(i + 1, i + 1 + len);
                let code = (hex.len() == len && hex.chars().all(|c| c.is_ascii_hexdigit()))
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32);
                match code {
                    Some(code) => res.push(code),
                    None => {
                        let raw = collect(i - 1, i + 1 + len);
                        problems.push((
                            chars[i - 1].0,
                            ErrorCode::BadDqEscape,
                            format!("Invalid escape sequence {}", raw),
                        ));
                        res.push_str(&raw);
                    }
                }
                i += len;
            } else {
                let raw = collect(i - 1, i + 1);
                problems.push((
                    chars[i - 1].0,
                    ErrorCode::BadDqEscape,
                    format!("Invalid escape sequence {}", raw),
                ));
                res.push_str(&raw);
            }
        } else if ch == ' ' || ch == '\t' {
            // Whitespace before a line break is dropped.
            let ws_start = i;
            while is_blank(ch_at(i + 1)) {
                i += 1;
            }
            let next = ch_at(i + 1);
            if next != Some('\n') && !(next == Some('\r') && ch_at(i + 2) == Some('\n')) {
                res.push_str(&collect(ws_start, i + 1));
            }
        } else {
            res.push(ch);
        }
        i += 1;
    }
    if !source.ends_with('"') || source.len() == 1 {
        problems.push((
            source.len(),
            ErrorCode::MissingChar,
            "Missing closing \"quote".to_string(),
        ));
    }
    res
}

/// A line break in a double-quoted scalar and the whitespace after it.
fn fold_newline(chars: &[(usize, char)], offset: usize) -> (String, usize) {
    let ch_at = |i: usize| chars.get(i).map(|&(_, ch)| ch);
    let mut fold = String::new();
    let mut offset = offset;
    while let Some(ch @ (' ' | '\t' | '\n' | '\r')) = ch_at(offset + 1) {
        if ch == '\r' && ch_at(offset + 2) != Some('\n') {
            break;
        }
        if ch == '\n' {
            fold.push('\n');
        }
        offset += 1;
    }
    if fold.is_empty() {
        fold.push(' ');
    }
    (fold, offset)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chomp {
    Clip,
    Strip,
    Keep,
}

struct BlockHeader {
    folded: bool,
    /// Explicit indentation indicator, or 0.
    indent: usize,
    chomp: Chomp,
    comment: Option<String>,
    /// Length of the header line, including its line break.
    length: usize,
}

fn parse_block_header(ctx: &mut Ctx<'_>, scalar: &BlockScalar) -> Option<BlockHeader> {
    let header = match scalar.props.first() {
        Some(CstNode::Source(token)) if token.kind == TokenType::BlockScalarHeader => token,
        first => {
            let span = first.map_or(at(scalar.offset), node_span);
            ctx.error(span, ErrorCode::Impossible, "Block scalar header not found");
            return None;
        }
    };
    let source = &header.source;
    let mut indent = 0;
    let mut chomp = None;
    let mut error = None;
    for (i, ch) in source.char_indices().skip(1) {
        match ch {
            '-' if chomp.is_none() => chomp = Some(Chomp::Strip),
            '+' if chomp.is_none() => chomp = Some(Chomp::Keep),
            '1'..='9' if indent == 0 => indent = ch as usize - '0' as usize,
            _ => {
                error.get_or_insert(scalar.offset + i);
            }
        }
    }
    if let Some(error) = error {
        ctx.error(
            at(error),
            ErrorCode::UnexpectedToken,
            format!("Block scalar header includes extra characters: {}", source),
        );
    }

    let strict = ctx.options.strict;
    let mut has_space = false;
    let mut comment = None;
    let mut length = source.len();
    for prop in &scalar.props[1..] {
        match prop {
            CstNode::Source(token) => {
                match token.kind {
                    TokenType::Space => has_space = true,
                    TokenType::Newline => {}
                    TokenType::Comment => {
                        if strict && !has_space {
                            ctx.error(
                                token_span(token),
                                ErrorCode::MissingChar,
                                "Comments must be separated from other tokens by white space characters",
                            );
                        }
                        comment = Some(token.source[1..].to_string());
                    }
                    kind => ctx.error(
                        token_span(token),
                        ErrorCode::UnexpectedToken,
                        format!("Unexpected token in block scalar header: {}", kind.as_str()),
                    ),
                }
                length += token.source.len();
            }
            CstNode::Error(err) => {
                ctx.error(
                    (err.offset, err.offset + err.source.len()),
                    ErrorCode::UnexpectedToken,
                    err.message.clone(),
                );
                length += err.source.len();
            }
            other => ctx.error(
                node_span(other),
                ErrorCode::UnexpectedToken,
                format!("Unexpected token in block scalar header: {}", other.type_name()),
            ),
        }
    }
    Some(BlockHeader {
        folded: source.starts_with('>'),
        indent,
        chomp: chomp.unwrap_or(Chomp::Clip),
        comment: comment.filter(|c| !c.is_empty()),
        length,
    })
}

/// Split block scalar text into (indentation, content) lines.
fn split_lines(source: &str) -> Vec<(&str, &str)> {
    source
        .split('\n')
        .map(|line| {
            let content = line.trim_start_matches(' ');
            (&line[..line.len() - content.len()], content)
        })
        .collect()
}

fn resolve_block_scalar(ctx: &mut Ctx<'_>, scalar: &BlockScalar) -> Resolved {
    let start = scalar.offset;
    let header = match parse_block_header(ctx, scalar) {
        Some(header) => header,
        None => {
            return Resolved {
                value: String::new(),
                style: ScalarStyle::Literal,
                comment: None,
                range: [start; 3],
            }
        }
    };
    let style = if header.folded {
        ScalarStyle::Folded
    } else {
        ScalarStyle::Literal
    };
    let end = start + header.length + scalar.source.len();
    let lines = if scalar.source.is_empty() {
        Vec::new()
    } else {
        split_lines(&scalar.source)
    };
    let is_blank = |content: &str| content.is_empty() || content == "\r";

    // Trailing blank lines are subject to chomping.
    let mut chomp_start = lines.len();
    for (i, &(_, content)) in lines.iter().enumerate().rev() {
        if !is_blank(content) {
            break;
        }
        chomp_start = i;
    }

    if chomp_start == 0 {
        let value = if header.chomp == Chomp::Keep && !lines.is_empty() {
            "\n".repeat(lines.len().saturating_sub(1).max(1))
        } else {
            String::new()
        };
        return Resolved {
            value,
            style,
            comment: header.comment,
            range: [start, end, end],
        };
    }

    let mut trim_indent = scalar.indent + header.indent;
    let mut offset = scalar.offset + header.length;
    let mut content_start = 0;
    let mut problems = Problems::new();
    for (i, &(indent, content)) in lines[..chomp_start].iter().enumerate() {
        if is_blank(content) {
            if header.indent == 0 && indent.len() > trim_indent {
                trim_indent = indent.len();
            }
        } else {
            if indent.len() < trim_indent {
                problems.push((
                    offset + indent.len(),
                    ErrorCode::MissingChar,
                    "Block scalars with more-indented leading empty lines must use an explicit indentation indicator".to_string(),
                ));
            }
            if header.indent == 0 {
                trim_indent = indent.len();
            }
            content_start = i;
            if trim_indent == 0 && !ctx.at_root {
                problems.push((
                    offset,
                    ErrorCode::BadIndent,
                    "Block scalar values in collections must be indented".to_string(),
                ));
            }
            break;
        }
        offset += indent.len() + content.len() + 1;
    }

    // More-indented trailing blank lines are content.
    let mut i = lines.len();
    while i > chomp_start {
        i -= 1;
        if lines[i].0.len() > trim_indent {
            chomp_start = i + 1;
        }
    }

    let strip_indent = |indent: &str| indent.get(trim_indent..).unwrap_or_default().to_string();
    let mut value = String::new();
    for &(indent, _) in &lines[..content_start] {
        value.push_str(&strip_indent(indent));
        value.push('\n');
    }

    let mut sep = "";
    let mut prev_more_indented = false;
    for &(indent, content) in &lines[content_start..chomp_start] {
        offset += indent.len() + content.len() + 1;
        let crlf = content.ends_with('\r');
        let content = content.strip_suffix('\r').unwrap_or(content);
        let mut indent = indent;
        if !content.is_empty() && indent.len() < trim_indent {
            let src = if header.indent > 0 {
                "explicit indentation indicator"
            } else {
                "first line"
            };
            problems.push((
                offset.saturating_sub(content.len() + if crlf { 2 } else { 1 }),
                ErrorCode::BadIndent,
                format!("Block scalar lines must not be less indented than their {}", src),
            ));
            indent = "";
        }

        if !header.folded {
            value.push_str(sep);
            value.push_str(&strip_indent(indent));
            value.push_str(content);
            sep = "\n";
        } else if indent.len() > trim_indent || content.starts_with('\t') {
            if sep == " " {
                sep = "\n";
            } else if !prev_more_indented && sep == "\n" {
                sep = "\n\n";
            }
            value.push_str(sep);
            value.push_str(&strip_indent(indent));
            value.push_str(content);
            sep = "\n";
            prev_more_indented = true;
        } else if content.is_empty() {
            if sep == "\n" {
                value.push('\n');
            } else {
                sep = "\n";
            }
        } else {
            value.push_str(sep);
            value.push_str(content);
            sep = " ";
            prev_more_indented = false;
        }
    }

    match header.chomp {
        Chomp::Strip => {}
        Chomp::Keep => {
            for &(indent, _) in &lines[chomp_start..] {
                value.push('\n');
                value.push_str(&strip_indent(indent));
            }
            if !value.ends_with('\n') {
                value.push('\n');
            }
        }
        Chomp::Clip => value.push('\n'),
    }

    // Offsets are already absolute.
    report(ctx, 0, problems);
    Resolved {
        value,
        style,
        comment: header.comment,
        range: [start, end, end],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Composer;
    use crate::document::Document;
    use crate::options::ParseOptions;
    use crate::parser::Parser;
    use crate::value::Value;

    fn compose_with(source: &str, options: ParseOptions) -> Document {
        let mut composer = Composer::new(options);
        let mut docs = Vec::new();
        for token in Parser::new().parse(source, false) {
            docs.extend(composer.compose(&token));
        }
        docs.extend(composer.end(false, source.len()));
        docs.remove(0)
    }

    fn compose(source: &str) -> Document {
        compose_with(source, ParseOptions::default())
    }

    fn string(s: &str) -> Value {
        Value::String(s.to_string())
    }

    #[test]
    fn test_fold_lines() {
        assert_eq!(fold_lines("one"), "one");
        assert_eq!(fold_lines("a\n  b\n\n  c"), "a b\nc");
        assert_eq!(fold_lines("a  \r\nb"), "a b");
    }

    #[test]
    fn test_double_quoted_escapes() {
        let mut problems = Problems::new();
        let value = double_quoted_value(r#""x\ty\x41é""#, &mut problems);
        assert_eq!(value, "x\tyAé");
        assert!(problems.is_empty());

        let value = double_quoted_value("\"a  \n  b\"", &mut problems);
        assert_eq!(value, "a b");
        let value = double_quoted_value("\"a\\\n   b\"", &mut problems);
        assert_eq!(value, "ab");
        assert!(problems.is_empty());
    }

    #[test]
    fn test_double_quoted_errors() {
        let mut problems = Problems::new();
        assert_eq!(double_quoted_value(r#""\q""#, &mut problems), r"\q");
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].0, 1);
        assert_eq!(problems[0].1, ErrorCode::BadDqEscape);
        assert_eq!(problems[0].2, r"Invalid escape sequence \q");

        let mut problems = Problems::new();
        double_quoted_value("\"abc", &mut problems);
        assert_eq!(problems[0].1, ErrorCode::MissingChar);
        assert_eq!(problems[0].2, "Missing closing \"quote");
    }

    #[test]
    fn test_single_quoted() {
        let mut problems = Problems::new();
        assert_eq!(single_quoted_value("'it''s'", &mut problems), "it's");
        assert!(problems.is_empty());
        single_quoted_value("'", &mut problems);
        assert_eq!(problems.len(), 1);
    }

    #[test]
    fn test_block_scalars() {
        let doc = compose("a: |\n  one\n  two\n\nb: >\n  folded\n  text\n\n  next\nc: |-\n  stripped\n");
        assert!(doc.errors.is_empty(), "{:?}", doc.errors);
        assert_eq!(
            doc.to_value().unwrap(),
            Value::Mapping(vec![
                (string("a"), string("one\ntwo\n")),
                (string("b"), string("folded text\nnext\n")),
                (string("c"), string("stripped")),
            ])
        );
        let root = doc.contents.unwrap();
        let a = doc.get(root, "a").unwrap();
        assert_eq!(doc.node(a).scalar().unwrap().style, ScalarStyle::Literal);
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines("  a\n\n b"), vec![("  ", "a"), ("", ""), (" ", "b")]);
    }

    #[test]
    fn test_tags() {
        let doc = compose("[!!str 123, ! 12, !!int 42, 0x1F]");
        assert!(doc.errors.is_empty(), "{:?}", doc.errors);
        assert_eq!(
            doc.to_value().unwrap(),
            Value::Sequence(vec![string("123"), string("12"), Value::from(42i64), Value::from(31i64)])
        );
        let root = doc.contents.unwrap();
        let items = match &doc.node(root).kind {
            NodeKind::Sequence(seq) => seq.items.clone(),
            _ => panic!("not a sequence"),
        };
        assert_eq!(doc.node(items[0]).tag.as_deref(), Some("tag:yaml.org,2002:str"));
        assert_eq!(doc.node(items[1]).tag, None);
    }

    #[test]
    fn test_unknown_tag() {
        let doc = compose("!foo bar\n");
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.errors[0].code, ErrorCode::TagResolveFailed);

        let doc = compose_with("!foo bar\n", ParseOptions::default().with_strict(false));
        assert!(doc.errors.is_empty());
        assert_eq!(doc.warnings[0].message, "Unresolved tag: !foo");
        assert_eq!(doc.to_value().unwrap(), string("bar"));
    }

    #[test]
    fn test_quoted_keys_stay_strings() {
        let doc = compose("'1': \"true\"\n");
        assert_eq!(
            doc.to_value().unwrap(),
            Value::Mapping(vec![(string("1"), string("true"))])
        );
    }
}
