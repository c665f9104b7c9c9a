//! Node properties (anchor, tag, indicator) and the comments and blank lines
//! around them.

use super::{at, token_span, Ctx};
use crate::cst::{CstNode, SourceToken, TokenType};
use crate::error::ErrorCode;

/// Whatever follows a run of property tokens.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Next<'t> {
    None,
    Token(&'t SourceToken),
    Node(&'t CstNode),
}

impl<'t> Next<'t> {
    pub fn from_token(token: Option<&'t SourceToken>) -> Self {
        token.map_or(Next::None, Next::Token)
    }

    pub fn from_node(node: Option<&'t CstNode>) -> Self {
        node.map_or(Next::None, Next::Node)
    }

    /// Key if present, else the first separator token.
    pub fn key_or_sep(key: Option<&'t CstNode>, sep: Option<&'t Vec<SourceToken>>) -> Self {
        match key {
            Some(key) => Next::Node(key),
            None => Next::from_token(sep.and_then(|sep| sep.first())),
        }
    }

    fn offset(self) -> Option<usize> {
        match self {
            Next::None => None,
            Next::Token(t) => Some(t.offset),
            Next::Node(n) => Some(n.offset()),
        }
    }

    fn kind(self) -> Option<TokenType> {
        match self {
            Next::Token(t) | Next::Node(CstNode::Source(t)) => Some(t.kind),
            Next::Node(CstNode::FlowScalar(s)) => Some(s.kind),
            _ => None,
        }
    }

    fn is_separator(self) -> bool {
        matches!(
            self.kind(),
            Some(TokenType::Space | TokenType::Newline | TokenType::Comma)
        )
    }

    fn is_empty_scalar(self) -> bool {
        matches!(self, Next::Node(CstNode::FlowScalar(s)) if s.kind == TokenType::Scalar && s.source.is_empty())
    }

    fn is_flow_collection(self) -> bool {
        matches!(self, Next::Node(CstNode::FlowCollection(_)))
    }

    fn is_block_collection(self) -> bool {
        matches!(self, Next::Node(node) if node.is_block_collection())
    }
}

pub(crate) struct PropsOptions<'t> {
    /// `"flow map"` or `"flow sequence"` inside flow collections.
    pub flow: Option<&'static str>,
    pub indicator: TokenType,
    pub next: Next<'t>,
    pub offset: usize,
    pub parent_indent: usize,
    pub start_on_newline: bool,
}

#[derive(Debug, Default)]
pub(crate) struct Props<'t> {
    pub comma: Option<&'t SourceToken>,
    pub found: Option<&'t SourceToken>,
    pub space_before: bool,
    pub comment: String,
    pub has_newline: bool,
    pub anchor: Option<&'t SourceToken>,
    pub tag: Option<&'t SourceToken>,
    pub newline_after_prop: Option<&'t SourceToken>,
    /// End offset of the last token.
    pub end: usize,
    /// Offset of the first property, else `end`.
    pub start: usize,
}

const TAB_MSG: &str = "Tabs are not allowed as indentation";
const PROP_SPACE_MSG: &str = "Tags and anchors must be separated from the next token by white space";
const COMMENT_SPACE_MSG: &str = "Comments must be separated from other tokens by white space characters";

pub(crate) fn resolve_props<'t>(
    ctx: &mut Ctx<'_>,
    tokens: &'t [SourceToken],
    opts: PropsOptions<'_>,
) -> Props<'t> {
    let mut props = Props::default();
    let mut at_newline = opts.start_on_newline;
    let mut has_space = opts.start_on_newline;
    let mut comment_sep = String::new();
    let mut req_space = false;
    let mut tab: Option<&SourceToken> = None;
    let mut start = None;

    for token in tokens {
        if req_space {
            if !matches!(
                token.kind,
                TokenType::Space | TokenType::Newline | TokenType::Comma
            ) {
                ctx.error(at(token.offset), ErrorCode::MissingChar, PROP_SPACE_MSG);
            }
            req_space = false;
        }
        if let Some(t) = tab.take() {
            if at_newline && token.kind != TokenType::Comment && token.kind != TokenType::Newline {
                ctx.error(token_span(t), ErrorCode::TabAsIndent, TAB_MSG);
            }
        }
        match token.kind {
            TokenType::Space => {
                if opts.flow.is_none()
                    && (opts.indicator != TokenType::DocStart || !opts.next.is_flow_collection())
                    && token.source.contains('\t')
                {
                    tab = Some(token);
                }
                has_space = true;
            }
            TokenType::Comment => {
                if !has_space {
                    ctx.error(token_span(token), ErrorCode::MissingChar, COMMENT_SPACE_MSG);
                }
                let text = &token.source[1..];
                let text = if text.is_empty() { " " } else { text };
                if props.comment.is_empty() {
                    props.comment = text.to_string();
                } else {
                    props.comment.push_str(&comment_sep);
                    props.comment.push_str(text);
                }
                comment_sep.clear();
                at_newline = false;
            }
            TokenType::Newline => {
                if at_newline {
                    if !props.comment.is_empty() {
                        props.comment.push_str(&token.source);
                    } else if props.found.is_none() || opts.indicator != TokenType::SeqItemInd {
                        props.space_before = true;
                    }
                } else {
                    comment_sep.push_str(&token.source);
                }
                at_newline = true;
                props.has_newline = true;
                if props.anchor.is_some() || props.tag.is_some() {
                    props.newline_after_prop = Some(token);
                }
                has_space = true;
            }
            TokenType::Anchor => {
                if props.anchor.is_some() {
                    ctx.error(
                        token_span(token),
                        ErrorCode::MultipleAnchors,
                        "A node can have at most one anchor",
                    );
                } else {
                    props.anchor = Some(token);
                }
                if token.source.ends_with(':') {
                    ctx.warn(
                        at(token.offset + token.source.len() - 1),
                        ErrorCode::BadAlias,
                        "Anchor ending in : is ambiguous",
                    );
                }
                start.get_or_insert(token.offset);
                at_newline = false;
                has_space = false;
                req_space = true;
            }
            TokenType::Tag => {
                if props.tag.is_some() {
                    ctx.error(
                        token_span(token),
                        ErrorCode::MultipleTags,
                        "A node can have at most one tag",
                    );
                } else {
                    props.tag = Some(token);
                }
                start.get_or_insert(token.offset);
                at_newline = false;
                has_space = false;
                req_space = true;
            }
            kind if kind == opts.indicator => {
                if props.anchor.is_some() || props.tag.is_some() {
                    ctx.error(
                        token_span(token),
                        ErrorCode::BadPropOrder,
                        format!("Anchors and tags must be after the {} indicator", token.source),
                    );
                }
                if props.found.is_some() {
                    ctx.error(
                        token_span(token),
                        ErrorCode::UnexpectedToken,
                        format!(
                            "Unexpected {} in {}",
                            token.source,
                            opts.flow.unwrap_or("collection")
                        ),
                    );
                }
                props.found = Some(token);
                at_newline = matches!(
                    opts.indicator,
                    TokenType::SeqItemInd | TokenType::ExplicitKeyInd
                );
                has_space = false;
            }
            TokenType::Comma if opts.flow.is_some() => {
                if props.comma.is_some() {
                    ctx.error(
                        token_span(token),
                        ErrorCode::UnexpectedToken,
                        format!("Unexpected , in {}", opts.flow.unwrap_or_default()),
                    );
                }
                props.comma = Some(token);
                at_newline = false;
                has_space = false;
            }
            kind => {
                ctx.error(
                    token_span(token),
                    ErrorCode::UnexpectedToken,
                    format!("Unexpected {} token", kind.as_str()),
                );
                at_newline = false;
                has_space = false;
            }
        }
    }

    props.end = tokens
        .last()
        .map_or(opts.offset, |t| t.offset + t.source.len());
    if req_space && !matches!(opts.next, Next::None) && !opts.next.is_separator() && !opts.next.is_empty_scalar() {
        let offset = opts.next.offset().unwrap_or(props.end);
        ctx.error(at(offset), ErrorCode::MissingChar, PROP_SPACE_MSG);
    }
    if let Some(t) = tab {
        if (at_newline && t.indent <= opts.parent_indent) || opts.next.is_block_collection() {
            ctx.error(token_span(t), ErrorCode::TabAsIndent, TAB_MSG);
        }
    }
    props.start = start.unwrap_or(props.end);
    props
}

/// Trailing comment and end offset of a node's `end` tokens.
pub(crate) fn resolve_end(
    ctx: &mut Ctx<'_>,
    end: &[SourceToken],
    offset: usize,
    req_space: bool,
) -> (Option<String>, usize) {
    let mut comment = String::new();
    let mut offset = offset;
    let mut has_space = false;
    let mut sep = String::new();
    for token in end {
        match token.kind {
            TokenType::Space => has_space = true,
            TokenType::Comment => {
                if req_space && !has_space {
                    ctx.error(token_span(token), ErrorCode::MissingChar, COMMENT_SPACE_MSG);
                }
                let text = &token.source[1..];
                let text = if text.is_empty() { " " } else { text };
                if comment.is_empty() {
                    comment = text.to_string();
                } else {
                    comment.push_str(&sep);
                    comment.push_str(text);
                }
                sep.clear();
            }
            TokenType::Newline => {
                if !comment.is_empty() {
                    sep.push_str(&token.source);
                }
                has_space = true;
            }
            kind => ctx.error(
                token_span(token),
                ErrorCode::UnexpectedToken,
                format!("Unexpected {} at node end", kind.as_str()),
            ),
        }
        offset += token.source.len();
    }
    ((!comment.is_empty()).then_some(comment), offset)
}
