use super::collections::{resolve_block_map, resolve_block_seq, resolve_flow_collection};
use super::props::{resolve_end, Props};
use super::scalars::compose_scalar;
use super::{at, node_span, token_span, Ctx};
use crate::cst::{CstNode, FlowScalar, SourceToken, TokenType};
use crate::document::{Alias, Mapping, Node, NodeId, NodeKind, Scalar, Sequence, MAX_DEPTH};
use crate::error::ErrorCode;
use crate::schema::{short_tag, TagKind, MAP_TAG, OMAP_TAG, PAIRS_TAG, SEQ_TAG, SET_TAG};
use crate::value::Value;
use std::collections::HashSet;

pub(crate) fn compose_node(ctx: &mut Ctx<'_>, token: &CstNode, props: &Props<'_>) -> NodeId {
    let id = match token {
        CstNode::FlowScalar(alias) if alias.kind == TokenType::Alias => {
            if props.anchor.is_some() || props.tag.is_some() {
                ctx.error(
                    node_span(token),
                    ErrorCode::AliasProps,
                    "An alias node must not specify any properties",
                );
            }
            compose_alias(ctx, alias)
        }
        CstNode::FlowScalar(_) | CstNode::BlockScalar(_) => {
            let id = compose_scalar(ctx, token, props.tag);
            bind_anchor(ctx, props.anchor, id);
            id
        }
        CstNode::BlockMap(_) | CstNode::BlockSeq(_) | CstNode::FlowCollection(_) => {
            if ctx.depth >= MAX_DEPTH {
                ctx.error(
                    at(token.offset()),
                    ErrorCode::NestingTooDeep,
                    format!("Collections are nested more than {} levels deep", MAX_DEPTH),
                );
                return compose_empty_node(ctx, token.offset(), None, None, props);
            }
            ctx.depth += 1;
            let id = compose_collection(ctx, token, props);
            ctx.depth -= 1;
            id
        }
        other => {
            let message = match other {
                CstNode::Error(err) => err.message.clone(),
                _ => format!("Unsupported token (type: {})", other.type_name()),
            };
            ctx.error(node_span(other), ErrorCode::UnexpectedToken, message);
            return compose_empty_node(ctx, other.offset(), None, None, props);
        }
    };
    let is_empty_plain = matches!(token, CstNode::FlowScalar(s) if s.kind == TokenType::Scalar && s.source.is_empty());
    let node = ctx.doc.node_mut(id);
    if props.space_before {
        node.space_before = true;
    }
    if !props.comment.is_empty() {
        if is_empty_plain {
            node.comment = Some(props.comment.clone());
        } else {
            node.comment_before = Some(props.comment.trim_end_matches('\n').to_string());
        }
    }
    id
}

/// A null scalar standing in for a missing node.
pub(crate) fn compose_empty_node(
    ctx: &mut Ctx<'_>,
    offset: usize,
    before: Option<&[SourceToken]>,
    pos: Option<usize>,
    props: &Props<'_>,
) -> NodeId {
    let offset = empty_scalar_position(offset, before, pos);
    let token = CstNode::FlowScalar(FlowScalar {
        kind: TokenType::Scalar,
        offset,
        indent: 0,
        source: String::new(),
        end: Vec::new(),
    });
    let id = compose_scalar(ctx, &token, props.tag);
    bind_anchor(ctx, props.anchor, id);
    let node = ctx.doc.node_mut(id);
    if props.space_before {
        node.space_before = true;
    }
    if !props.comment.is_empty() {
        node.comment = Some(props.comment.clone());
        node.range[2] = props.end;
    }
    id
}

/// Back up over trailing space, comments and newlines in `before`, so that
/// an empty node sits right after the last real token.
fn empty_scalar_position(offset: usize, before: Option<&[SourceToken]>, pos: Option<usize>) -> usize {
    let before = match before {
        Some(before) => before,
        None => return offset,
    };
    let pos = pos.unwrap_or(before.len()).min(before.len());
    let mut offset = offset;
    let mut i = pos;
    while i > 0 {
        let st = &before[i - 1];
        match st.kind {
            TokenType::Space | TokenType::Comment | TokenType::Newline => {
                offset = offset.saturating_sub(st.source.len());
                i -= 1;
            }
            _ => {
                while let Some(st) = before.get(i).filter(|st| st.kind == TokenType::Space) {
                    offset += st.source.len();
                    i += 1;
                }
                break;
            }
        }
    }
    offset
}

fn bind_anchor(ctx: &mut Ctx<'_>, anchor: Option<&SourceToken>, id: NodeId) {
    let anchor = match anchor {
        Some(anchor) => anchor,
        None => return,
    };
    let name = &anchor.source[1..];
    if name.is_empty() {
        ctx.error(token_span(anchor), ErrorCode::BadAlias, "Anchor cannot be an empty string");
        return;
    }
    ctx.doc.node_mut(id).anchor = Some(name.to_string());
    ctx.doc.bind_anchor(name, id);
}

fn compose_alias(ctx: &mut Ctx<'_>, token: &FlowScalar) -> NodeId {
    let name = &token.source[1..];
    if name.is_empty() {
        ctx.error(at(token.offset), ErrorCode::BadAlias, "Alias cannot be an empty string");
    }
    if name.ends_with(':') {
        ctx.warn(
            at(token.offset + token.source.len() - 1),
            ErrorCode::BadAlias,
            "Alias ending in : is ambiguous",
        );
    }
    let value_end = token.offset + token.source.len();
    let strict = ctx.options.strict;
    let (comment, end) = resolve_end(ctx, &token.end, value_end, strict);
    let kind = match ctx.doc.anchor(name) {
        Some(target) => NodeKind::Alias(Alias {
            source: name.to_string(),
            target,
        }),
        None => {
            ctx.error(
                (token.offset, value_end),
                ErrorCode::BadAlias,
                format!("Aliased anchor not found: {}", name),
            );
            NodeKind::Scalar(Scalar::new(Value::Null))
        }
    };
    let mut node = Node::new(kind);
    node.range = [token.offset, value_end, end];
    node.comment = comment;
    ctx.doc.add_node(node)
}

fn compose_collection(ctx: &mut Ctx<'_>, token: &CstNode, props: &Props<'_>) -> NodeId {
    let tag_name = props.tag.and_then(|tag| tag_name(ctx, tag));

    if matches!(token, CstNode::BlockSeq(_)) {
        let last_prop = match (props.anchor, props.tag) {
            (Some(a), Some(t)) => Some(if a.offset > t.offset { a } else { t }),
            (a, t) => a.or(t),
        };
        if let Some(last) = last_prop {
            let newline_after = props.newline_after_prop.is_some_and(|nl| nl.offset > last.offset);
            if !newline_after {
                ctx.error(
                    token_span(last),
                    ErrorCode::MissingChar,
                    "Missing newline after block sequence props",
                );
            }
        }
    }

    let is_map = match token {
        CstNode::BlockMap(_) => true,
        CstNode::FlowCollection(fc) => fc.is_map(),
        _ => false,
    };
    let kind = if is_map {
        NodeKind::Mapping(Mapping::default())
    } else {
        NodeKind::Sequence(Sequence::default())
    };
    let id = ctx.doc.add_node(Node::new(kind));
    // Bound before the children, which may refer back to it.
    bind_anchor(ctx, props.anchor, id);

    if let (Some(tag), Some(name)) = (props.tag, tag_name.as_deref()) {
        check_collection_tag(ctx, tag, name, is_map);
        if name != "!" {
            ctx.doc.node_mut(id).tag = Some(name.to_string());
        }
    }

    match token {
        CstNode::BlockMap(bm) => resolve_block_map(ctx, id, bm),
        CstNode::BlockSeq(bs) => resolve_block_seq(ctx, id, bs),
        CstNode::FlowCollection(fc) => resolve_flow_collection(ctx, id, fc),
        _ => {}
    }

    if let (Some(tag), Some(name)) = (props.tag, tag_name.as_deref()) {
        validate_typed_collection(ctx, tag, name, id);
    }
    id
}

/// Resolve a tag token, reporting failures.
pub(crate) fn tag_name(ctx: &mut Ctx<'_>, tag: &SourceToken) -> Option<String> {
    let mut problems = Vec::new();
    let name = ctx
        .doc
        .directives
        .tag_name(&tag.source, &mut |msg| problems.push(msg));
    for msg in problems {
        ctx.error(token_span(tag), ErrorCode::TagResolveFailed, msg);
    }
    name
}

/// Report an explicit tag the schema can't use. Strict mode makes it an
/// error, else a warning.
pub(crate) fn unresolved_tag(ctx: &mut Ctx<'_>, tag: &SourceToken, name: &str) {
    let strict = ctx.options.strict;
    ctx.report(
        token_span(tag),
        ErrorCode::TagResolveFailed,
        format!("Unresolved tag: {}", name),
        !strict,
    );
}

fn check_collection_tag(ctx: &mut Ctx<'_>, tag: &SourceToken, name: &str, is_map: bool) {
    let expected = if is_map { TagKind::Mapping } else { TagKind::Sequence };
    if name == "!" || (name == MAP_TAG && is_map) || (name == SEQ_TAG && !is_map) {
        return;
    }
    let kind_name = |kind: TagKind| match kind {
        TagKind::Mapping => "map",
        TagKind::Sequence => "seq",
        TagKind::Scalar => "scalar",
    };
    let found = ctx
        .schema
        .collection_tag(name)
        .map(|t| t.kind)
        .or_else(|| ctx.schema.knows(name).then_some(TagKind::Scalar));
    match found {
        Some(kind) if kind == expected => {}
        Some(kind) => ctx.warn(
            token_span(tag),
            ErrorCode::BadCollectionType,
            format!(
                "{} used for {} collection, but expects {}",
                short_tag(name),
                kind_name(expected),
                kind_name(kind)
            ),
        ),
        None => unresolved_tag(ctx, tag, name),
    }
}

/// `!!set`, `!!omap` and `!!pairs` put extra rules on their contents.
fn validate_typed_collection(ctx: &mut Ctx<'_>, tag: &SourceToken, name: &str, id: NodeId) {
    if !ctx.schema.knows(name) {
        return;
    }
    let doc = &*ctx.doc;
    let problem = match (name, &doc.node(id).kind) {
        (SET_TAG, NodeKind::Mapping(map)) => map
            .pairs
            .iter()
            .any(|pair| {
                let value = doc.resolve(pair.value);
                !matches!(doc.node(value).scalar(), Some(s) if s.value.is_null())
            })
            .then_some("Set items must all have null values"),
        (OMAP_TAG | PAIRS_TAG, NodeKind::Sequence(seq)) => {
            let single_pairs = seq.items.iter().all(|&item| {
                matches!(&doc.node(doc.resolve(item)).kind, NodeKind::Mapping(m) if m.pairs.len() == 1)
            });
            if !single_pairs {
                Some("Each pair must have its own sequence indicator")
            } else if name == OMAP_TAG {
                let mut seen = HashSet::new();
                let repeated = seq
                    .items
                    .iter()
                    .filter_map(|&item| match &doc.node(doc.resolve(item)).kind {
                        NodeKind::Mapping(m) => m.pairs.first().map(|p| p.key),
                        _ => None,
                    })
                    .any(|key| !seen.insert(doc.key_id(key)));
                repeated.then_some("Ordered maps must not include duplicate keys")
            } else {
                None
            }
        }
        _ => None,
    };
    if let Some(message) = problem {
        ctx.error(token_span(tag), ErrorCode::TagResolveFailed, message);
    }
}
