//! Concrete syntax tree.
//!
//! The lexer emits plain strings; [`token_type`] classifies them. The parser
//! assembles the classified tokens into [`CstNode`]s, which keep every byte of
//! the input: concatenating the raw text of a node's tokens in order gives
//! back exactly the source it was built from.

/// Start of a document without a `---` marker.
pub const DOCUMENT: &str = "\u{2}";
/// A flow collection was terminated by an unexpected dedent.
pub const FLOW_END: &str = "\u{18}";
/// The next lexeme is a plain scalar or block scalar body.
pub const SCALAR: &str = "\u{1f}";
/// Unicode byte order mark.
pub const BOM: &str = "\u{feff}";

/// Lexical class of a lexeme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    ByteOrderMark,
    DocMode,
    DocStart,
    DocEnd,
    FlowErrorEnd,
    Space,
    Comment,
    Newline,
    DirectiveLine,
    Anchor,
    Tag,
    SeqItemInd,
    ExplicitKeyInd,
    MapValueInd,
    FlowMapStart,
    FlowMapEnd,
    FlowSeqStart,
    FlowSeqEnd,
    Comma,
    Alias,
    Scalar,
    SingleQuotedScalar,
    DoubleQuotedScalar,
    BlockScalarHeader,
}

impl TokenType {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenType::ByteOrderMark => "byte-order-mark",
            TokenType::DocMode => "doc-mode",
            TokenType::DocStart => "doc-start",
            TokenType::DocEnd => "doc-end",
            TokenType::FlowErrorEnd => "flow-error-end",
            TokenType::Space => "space",
            TokenType::Comment => "comment",
            TokenType::Newline => "newline",
            TokenType::DirectiveLine => "directive-line",
            TokenType::Anchor => "anchor",
            TokenType::Tag => "tag",
            TokenType::SeqItemInd => "seq-item-ind",
            TokenType::ExplicitKeyInd => "explicit-key-ind",
            TokenType::MapValueInd => "map-value-ind",
            TokenType::FlowMapStart => "flow-map-start",
            TokenType::FlowMapEnd => "flow-map-end",
            TokenType::FlowSeqStart => "flow-seq-start",
            TokenType::FlowSeqEnd => "flow-seq-end",
            TokenType::Comma => "comma",
            TokenType::Alias => "alias",
            TokenType::Scalar => "scalar",
            TokenType::SingleQuotedScalar => "single-quoted-scalar",
            TokenType::DoubleQuotedScalar => "double-quoted-scalar",
            TokenType::BlockScalarHeader => "block-scalar-header",
        }
    }

    /// Alias and the three flow scalar styles.
    pub fn is_flow_scalar(self) -> bool {
        matches!(
            self,
            TokenType::Alias
                | TokenType::Scalar
                | TokenType::SingleQuotedScalar
                | TokenType::DoubleQuotedScalar
        )
    }
}

/// Identify the type of a lexical token. Returns `None` for lexemes that are
/// not YAML tokens (a plain scalar's text is only typed by the preceding
/// [`SCALAR`] marker).
pub fn token_type(source: &str) -> Option<TokenType> {
    match source {
        BOM => return Some(TokenType::ByteOrderMark),
        DOCUMENT => return Some(TokenType::DocMode),
        FLOW_END => return Some(TokenType::FlowErrorEnd),
        SCALAR => return Some(TokenType::Scalar),
        "---" => return Some(TokenType::DocStart),
        "..." => return Some(TokenType::DocEnd),
        "" | "\n" | "\r\n" => return Some(TokenType::Newline),
        "-" => return Some(TokenType::SeqItemInd),
        "?" => return Some(TokenType::ExplicitKeyInd),
        ":" => return Some(TokenType::MapValueInd),
        "{" => return Some(TokenType::FlowMapStart),
        "}" => return Some(TokenType::FlowMapEnd),
        "[" => return Some(TokenType::FlowSeqStart),
        "]" => return Some(TokenType::FlowSeqEnd),
        "," => return Some(TokenType::Comma),
        _ => {}
    }
    match source.as_bytes()[0] {
        b' ' | b'\t' => Some(TokenType::Space),
        b'#' => Some(TokenType::Comment),
        b'%' => Some(TokenType::DirectiveLine),
        b'*' => Some(TokenType::Alias),
        b'&' => Some(TokenType::Anchor),
        b'!' => Some(TokenType::Tag),
        b'\'' => Some(TokenType::SingleQuotedScalar),
        b'"' => Some(TokenType::DoubleQuotedScalar),
        b'|' | b'>' => Some(TokenType::BlockScalarHeader),
        _ => None,
    }
}

/// A single lexeme with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceToken {
    pub kind: TokenType,
    pub offset: usize,
    pub indent: usize,
    pub source: String,
}

/// A token the parser could not place, or a parser-detected problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorToken {
    pub offset: usize,
    pub source: String,
    pub message: String,
}

/// A `%` directive line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub offset: usize,
    pub source: String,
}

/// A document: prefix tokens (`---`, properties, comments), the value, and
/// whatever trails the value on its last line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CstDocument {
    pub offset: usize,
    pub start: Vec<SourceToken>,
    pub value: Option<Box<CstNode>>,
    pub end: Vec<SourceToken>,
}

/// A `...` marker and the rest of its line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocEnd {
    pub offset: usize,
    pub source: String,
    pub end: Vec<SourceToken>,
}

/// An alias or a plain, single-quoted or double-quoted scalar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowScalar {
    pub kind: TokenType,
    pub offset: usize,
    pub indent: usize,
    pub source: String,
    pub end: Vec<SourceToken>,
}

/// A `|` or `>` scalar: header tokens, then the raw body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockScalar {
    pub offset: usize,
    pub indent: usize,
    pub props: Vec<CstNode>,
    pub source: String,
}

/// One entry of a block or flow collection. Sequence items only use `start`
/// and `value`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionItem {
    pub start: Vec<SourceToken>,
    pub explicit_key: bool,
    pub key: Option<Box<CstNode>>,
    pub sep: Option<Vec<SourceToken>>,
    pub value: Option<Box<CstNode>>,
}

impl CollectionItem {
    pub fn with_start(start: Vec<SourceToken>) -> Self {
        Self {
            start,
            ..Self::default()
        }
    }

    pub fn with_key(start: Vec<SourceToken>, key: Option<CstNode>, sep: Vec<SourceToken>) -> Self {
        Self {
            start,
            key: key.map(Box::new),
            sep: Some(sep),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMap {
    pub offset: usize,
    pub indent: usize,
    pub items: Vec<CollectionItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSeq {
    pub offset: usize,
    pub indent: usize,
    pub items: Vec<CollectionItem>,
}

/// A `{...}` or `[...]` collection. `end` holds the closing bracket and any
/// tokens after it on the same line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowCollection {
    pub offset: usize,
    pub indent: usize,
    pub start: SourceToken,
    pub items: Vec<CollectionItem>,
    pub end: Vec<SourceToken>,
}

impl FlowCollection {
    pub fn is_map(&self) -> bool {
        self.start.kind == TokenType::FlowMapStart
    }
}

/// A node of the concrete syntax tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CstNode {
    Source(SourceToken),
    Error(ErrorToken),
    Directive(Directive),
    Document(CstDocument),
    DocEnd(DocEnd),
    FlowScalar(FlowScalar),
    BlockScalar(BlockScalar),
    BlockMap(BlockMap),
    BlockSeq(BlockSeq),
    FlowCollection(FlowCollection),
}

impl CstNode {
    pub fn offset(&self) -> usize {
        match self {
            CstNode::Source(t) => t.offset,
            CstNode::Error(t) => t.offset,
            CstNode::Directive(t) => t.offset,
            CstNode::Document(t) => t.offset,
            CstNode::DocEnd(t) => t.offset,
            CstNode::FlowScalar(t) => t.offset,
            CstNode::BlockScalar(t) => t.offset,
            CstNode::BlockMap(t) => t.offset,
            CstNode::BlockSeq(t) => t.offset,
            CstNode::FlowCollection(t) => t.offset,
        }
    }

    /// Indentation column for nodes that record one.
    pub fn indent(&self) -> Option<usize> {
        match self {
            CstNode::Source(t) => Some(t.indent),
            CstNode::FlowScalar(t) => Some(t.indent),
            CstNode::BlockScalar(t) => Some(t.indent),
            CstNode::BlockMap(t) => Some(t.indent),
            CstNode::BlockSeq(t) => Some(t.indent),
            CstNode::FlowCollection(t) => Some(t.indent),
            _ => None,
        }
    }

    /// Short type name, matching the lexeme names where one applies.
    pub fn type_name(&self) -> &'static str {
        match self {
            CstNode::Source(t) => t.kind.as_str(),
            CstNode::Error(_) => "error",
            CstNode::Directive(_) => "directive",
            CstNode::Document(_) => "document",
            CstNode::DocEnd(_) => "doc-end",
            CstNode::FlowScalar(t) => t.kind.as_str(),
            CstNode::BlockScalar(_) => "block-scalar",
            CstNode::BlockMap(_) => "block-map",
            CstNode::BlockSeq(_) => "block-seq",
            CstNode::FlowCollection(_) => "flow-collection",
        }
    }

    /// Alias, flow scalar or flow collection.
    pub fn is_flow_node(&self) -> bool {
        matches!(self, CstNode::FlowScalar(_) | CstNode::FlowCollection(_))
    }

    pub fn is_block_collection(&self) -> bool {
        matches!(self, CstNode::BlockMap(_) | CstNode::BlockSeq(_))
    }

    /// Trailing tokens of nodes that can carry them.
    pub fn end_mut(&mut self) -> Option<&mut Vec<SourceToken>> {
        match self {
            CstNode::Document(t) => Some(&mut t.end),
            CstNode::DocEnd(t) => Some(&mut t.end),
            CstNode::FlowScalar(t) => Some(&mut t.end),
            CstNode::FlowCollection(t) => Some(&mut t.end),
            _ => None,
        }
    }

    pub fn end(&self) -> Option<&[SourceToken]> {
        match self {
            CstNode::Document(t) => Some(&t.end),
            CstNode::DocEnd(t) => Some(&t.end),
            CstNode::FlowScalar(t) => Some(&t.end),
            CstNode::FlowCollection(t) => Some(&t.end),
            _ => None,
        }
    }

    /// The raw source text of the whole node.
    pub fn source_text(&self) -> String {
        let mut out = String::new();
        write_node(self, &mut out);
        out
    }
}

/// Concatenate the raw text of all the given nodes.
pub fn stringify(nodes: &[CstNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

fn write_tokens(tokens: &[SourceToken], out: &mut String) {
    for t in tokens {
        out.push_str(&t.source);
    }
}

fn write_item(item: &CollectionItem, out: &mut String) {
    write_tokens(&item.start, out);
    if let Some(key) = &item.key {
        write_node(key, out);
    }
    if let Some(sep) = &item.sep {
        write_tokens(sep, out);
    }
    if let Some(value) = &item.value {
        write_node(value, out);
    }
}

fn write_node(node: &CstNode, out: &mut String) {
    match node {
        CstNode::Source(t) => out.push_str(&t.source),
        CstNode::Error(t) => out.push_str(&t.source),
        CstNode::Directive(t) => out.push_str(&t.source),
        CstNode::Document(doc) => {
            write_tokens(&doc.start, out);
            if let Some(value) = &doc.value {
                write_node(value, out);
            }
            write_tokens(&doc.end, out);
        }
        CstNode::DocEnd(t) => {
            out.push_str(&t.source);
            write_tokens(&t.end, out);
        }
        CstNode::FlowScalar(t) => {
            out.push_str(&t.source);
            write_tokens(&t.end, out);
        }
        CstNode::BlockScalar(t) => {
            for prop in &t.props {
                write_node(prop, out);
            }
            out.push_str(&t.source);
        }
        CstNode::BlockMap(t) => t.items.iter().for_each(|it| write_item(it, out)),
        CstNode::BlockSeq(t) => t.items.iter().for_each(|it| write_item(it, out)),
        CstNode::FlowCollection(t) => {
            out.push_str(&t.start.source);
            t.items.iter().for_each(|it| write_item(it, out));
            write_tokens(&t.end, out);
        }
    }
}

/// Walk every collection item under `node`, depth first. The callback gets
/// the path of item indices leading to the item.
pub fn visit<F>(node: &CstNode, f: &mut F)
where
    F: FnMut(&[usize], &CollectionItem),
{
    let mut path = Vec::new();
    visit_node(node, &mut path, f);
}

fn visit_node<F>(node: &CstNode, path: &mut Vec<usize>, f: &mut F)
where
    F: FnMut(&[usize], &CollectionItem),
{
    let items = match node {
        CstNode::Document(doc) => {
            if let Some(value) = &doc.value {
                visit_node(value, path, f);
            }
            return;
        }
        CstNode::BlockMap(t) => &t.items,
        CstNode::BlockSeq(t) => &t.items,
        CstNode::FlowCollection(t) => &t.items,
        _ => return,
    };
    for (i, item) in items.iter().enumerate() {
        path.push(i);
        f(path, item);
        if let Some(key) = &item.key {
            visit_node(key, path, f);
        }
        if let Some(value) = &item.value {
            visit_node(value, path, f);
        }
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_type() {
        assert_eq!(token_type("---"), Some(TokenType::DocStart));
        assert_eq!(token_type(""), Some(TokenType::Newline));
        assert_eq!(token_type("\r\n"), Some(TokenType::Newline));
        assert_eq!(token_type("  \t"), Some(TokenType::Space));
        assert_eq!(token_type("# hi"), Some(TokenType::Comment));
        assert_eq!(token_type("!!str"), Some(TokenType::Tag));
        assert_eq!(token_type("&a"), Some(TokenType::Anchor));
        assert_eq!(token_type("|+2"), Some(TokenType::BlockScalarHeader));
        assert_eq!(token_type(SCALAR), Some(TokenType::Scalar));
        assert_eq!(token_type("plain"), None);
    }

    #[test]
    fn test_visit_paths() {
        let nodes = crate::parser::Parser::new().parse("a:\n  - x\n  - [y, z]\nb: c\n", false);
        let mut paths = Vec::new();
        let mut keys = Vec::new();
        for node in &nodes {
            visit(node, &mut |path, item| {
                paths.push(path.to_vec());
                if let Some(CstNode::FlowScalar(key)) = item.key.as_deref() {
                    keys.push(key.source.clone());
                }
            });
        }
        assert_eq!(
            paths,
            vec![vec![0], vec![0, 0], vec![0, 1], vec![0, 1, 0], vec![0, 1, 1], vec![1]]
        );
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_flow_scalar_kinds() {
        assert!(TokenType::Alias.is_flow_scalar());
        assert!(TokenType::DoubleQuotedScalar.is_flow_scalar());
        assert!(!TokenType::BlockScalarHeader.is_flow_scalar());
    }
}
