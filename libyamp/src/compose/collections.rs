use super::node::{compose_empty_node, compose_node};
use super::props::{resolve_end, resolve_props, Next, Props, PropsOptions};
use super::{at, join_comment, node_span, token_span, Ctx, Span};
use crate::cst::{BlockMap, BlockSeq, CollectionItem, CstNode, FlowCollection, SourceToken, TokenType};
use crate::document::{KeyId, Mapping, Node, NodeId, NodeKind, Pair, Scalar};
use crate::error::ErrorCode;
use crate::options::DuplicateKeys;
use crate::value::Value;
use std::collections::HashSet;
use std::ptr;

const START_COL_MSG: &str = "All mapping items must start at the same column";
const BLOCK_MSG: &str = "Block collections are not allowed within flow collections";

fn node_range(ctx: &Ctx<'_>, id: NodeId) -> [usize; 3] {
    ctx.doc.node(id).range
}

fn value_span(ctx: &Ctx<'_>, id: NodeId) -> Span {
    let [start, end, _] = node_range(ctx, id);
    (start, end.max(start + 1))
}

/// A null value for a key that has none.
fn null_node(ctx: &mut Ctx<'_>, offset: usize) -> NodeId {
    let mut node = Node::new(NodeKind::Scalar(Scalar::new(Value::Null)));
    node.range = [offset; 3];
    ctx.doc.add_node(node)
}

fn is_block(node: Option<&CstNode>) -> bool {
    node.is_some_and(CstNode::is_block_collection)
}

fn has_newline(tokens: &[SourceToken]) -> bool {
    tokens.iter().any(|t| t.kind == TokenType::Newline)
}

/// Could this key span more than one line?
fn contains_newline(key: Option<&CstNode>) -> bool {
    match key {
        None => false,
        Some(CstNode::FlowScalar(s)) => s.source.contains('\n') || has_newline(&s.end),
        Some(CstNode::FlowCollection(fc)) => fc.items.iter().any(|it| {
            has_newline(&it.start)
                || it.sep.as_deref().is_some_and(has_newline)
                || contains_newline(it.key.as_deref())
                || contains_newline(it.value.as_deref())
        }),
        Some(_) => true,
    }
}

fn check_duplicate(ctx: &mut Ctx<'_>, seen: &mut HashSet<KeyId>, key: NodeId, key_start: usize) {
    let duplicate_keys = ctx.options.duplicate_keys;
    if duplicate_keys == DuplicateKeys::Allow || ctx.doc.is_merge_key(key) {
        return;
    }
    if !seen.insert(ctx.doc.key_id(key)) {
        ctx.report(
            at(key_start),
            ErrorCode::DuplicateKey,
            "Map keys must be unique",
            duplicate_keys == DuplicateKeys::Warning,
        );
    }
}

fn check_merge(ctx: &mut Ctx<'_>, key: NodeId, value: NodeId) {
    if ctx.doc.is_merge_key(key) && ctx.doc.checked_merge_sources(value).is_none() {
        let span = value_span(ctx, value);
        ctx.error(
            span,
            ErrorCode::BadMergeSource,
            "Merge sources must be maps or map aliases",
        );
    }
}

fn set_comment(ctx: &mut Ctx<'_>, id: NodeId, comment: Option<String>) {
    if let Some(comment) = comment {
        let node = ctx.doc.node_mut(id);
        node.comment = Some(join_comment(node.comment.take(), &comment));
    }
}

pub(crate) fn resolve_block_map(ctx: &mut Ctx<'_>, id: NodeId, bm: &BlockMap) {
    ctx.at_root = false;
    let mut pairs: Vec<Pair> = Vec::new();
    let mut seen = HashSet::new();
    let mut comment: Option<String> = None;
    let mut offset = bm.offset;
    let mut comment_end: Option<usize> = None;

    for item in &bm.items {
        let CollectionItem { start, key, sep, value, .. } = item;
        let (key, value) = (key.as_deref(), value.as_deref());
        let key_props = resolve_props(
            ctx,
            start,
            PropsOptions {
                flow: None,
                indicator: TokenType::ExplicitKeyInd,
                next: Next::key_or_sep(key, sep.as_ref()),
                offset,
                parent_indent: bm.indent,
                start_on_newline: true,
            },
        );
        let implicit_key = key_props.found.is_none();
        if implicit_key {
            if let Some(key) = key {
                if matches!(key, CstNode::BlockSeq(_)) {
                    ctx.error(
                        at(offset),
                        ErrorCode::BlockAsImplicitKey,
                        "A block sequence may not be used as an implicit map key",
                    );
                } else if key.indent().is_some_and(|indent| indent != bm.indent) {
                    ctx.error(at(offset), ErrorCode::BadIndent, START_COL_MSG);
                }
            }
            if key_props.anchor.is_none() && key_props.tag.is_none() && sep.is_none() {
                comment_end = Some(key_props.end);
                if !key_props.comment.is_empty() {
                    comment = Some(join_comment(comment, &key_props.comment));
                }
                continue;
            }
            if key_props.newline_after_prop.is_some() || contains_newline(key) {
                let span = match (key, start.last()) {
                    (Some(key), _) => node_span(key),
                    (None, Some(last)) => token_span(last),
                    (None, None) => at(offset),
                };
                ctx.error(
                    span,
                    ErrorCode::MultilineImplicitKey,
                    "Implicit keys need to be on a single line",
                );
            }
        } else if key_props.found.map(|found| found.indent) != Some(bm.indent) {
            ctx.error(at(offset), ErrorCode::BadIndent, START_COL_MSG);
        }

        ctx.at_key = true;
        let key_start = key_props.end;
        let key_node = match key {
            Some(key) => compose_node(ctx, key, &key_props),
            None => compose_empty_node(ctx, key_start, Some(start.as_slice()), None, &key_props),
        };
        ctx.at_key = false;
        check_duplicate(ctx, &mut seen, key_node, key_start);

        let key_end = node_range(ctx, key_node)[2];
        let value_props = resolve_props(
            ctx,
            sep.as_deref().unwrap_or_default(),
            PropsOptions {
                flow: None,
                indicator: TokenType::MapValueInd,
                next: Next::from_node(value),
                offset: key_end,
                parent_indent: bm.indent,
                start_on_newline: key.is_none() || matches!(key, Some(CstNode::BlockScalar(_))),
            },
        );
        offset = value_props.end;

        if let Some(found) = value_props.found {
            if implicit_key {
                if matches!(value, Some(CstNode::BlockMap(_))) && !value_props.has_newline {
                    ctx.error(
                        at(offset),
                        ErrorCode::BlockAsImplicitKey,
                        "Nested mappings are not allowed in compact mappings",
                    );
                }
                if ctx.options.strict && key_props.start + 1024 < found.offset {
                    let span = value_span(ctx, key_node);
                    ctx.error(
                        span,
                        ErrorCode::KeyOver1024Chars,
                        "The : indicator must be at most 1024 chars after the start of an implicit block mapping key",
                    );
                }
            }
            let value_node = match value {
                Some(value) => compose_node(ctx, value, &value_props),
                None => compose_empty_node(ctx, offset, sep.as_deref(), None, &value_props),
            };
            offset = node_range(ctx, value_node)[2];
            check_merge(ctx, key_node, value_node);
            pairs.push(Pair {
                key: key_node,
                value: value_node,
            });
        } else {
            if implicit_key {
                let span = value_span(ctx, key_node);
                ctx.error(
                    span,
                    ErrorCode::MissingChar,
                    "Implicit map keys need to be followed by map values",
                );
            }
            if !value_props.comment.is_empty() {
                set_comment(ctx, key_node, Some(value_props.comment.clone()));
            }
            let value_node = null_node(ctx, offset);
            pairs.push(Pair {
                key: key_node,
                value: value_node,
            });
        }
    }

    if let Some(end) = comment_end.filter(|&end| end < offset) {
        ctx.error(at(end), ErrorCode::Impossible, "Map comment with trailing content");
    }
    let node = ctx.doc.node_mut(id);
    if let NodeKind::Mapping(map) = &mut node.kind {
        map.pairs = pairs;
    }
    node.range = [bm.offset, offset, comment_end.unwrap_or(offset)];
    set_comment(ctx, id, comment);
}

pub(crate) fn resolve_block_seq(ctx: &mut Ctx<'_>, id: NodeId, bs: &BlockSeq) {
    ctx.at_root = false;
    ctx.at_key = false;
    let mut items = Vec::new();
    let mut comment: Option<String> = None;
    let mut offset = bs.offset;
    let mut comment_end: Option<usize> = None;

    for item in &bs.items {
        let value = item.value.as_deref();
        let props = resolve_props(
            ctx,
            &item.start,
            PropsOptions {
                flow: None,
                indicator: TokenType::SeqItemInd,
                next: Next::from_node(value),
                offset,
                parent_indent: bs.indent,
                start_on_newline: true,
            },
        );
        if props.found.is_none() {
            if props.anchor.is_some() || props.tag.is_some() || value.is_some() {
                if matches!(value, Some(CstNode::BlockSeq(_))) {
                    ctx.error(
                        at(props.end),
                        ErrorCode::BadIndent,
                        "All sequence items must start at the same column",
                    );
                } else {
                    ctx.error(
                        at(offset),
                        ErrorCode::MissingChar,
                        "Sequence item without - indicator",
                    );
                }
            } else {
                comment_end = Some(props.end);
                if !props.comment.is_empty() {
                    comment = Some(props.comment);
                }
                continue;
            }
        }
        let node = match value {
            Some(value) => compose_node(ctx, value, &props),
            None => compose_empty_node(ctx, props.end, Some(item.start.as_slice()), None, &props),
        };
        offset = node_range(ctx, node)[2];
        items.push(node);
    }

    let node = ctx.doc.node_mut(id);
    if let NodeKind::Sequence(seq) = &mut node.kind {
        seq.items = items;
    }
    node.range = [bs.offset, offset, comment_end.unwrap_or(offset)];
    set_comment(ctx, id, comment);
}

pub(crate) fn resolve_flow_collection(ctx: &mut Ctx<'_>, id: NodeId, fc: &FlowCollection) {
    let is_map = fc.is_map();
    let fc_name = if is_map { "flow map" } else { "flow sequence" };
    let at_root = ctx.at_root;
    ctx.at_root = false;
    ctx.at_key = false;
    let strict = ctx.options.strict;

    let mut pairs: Vec<Pair> = Vec::new();
    let mut seen = HashSet::new();
    let mut items: Vec<NodeId> = Vec::new();
    let mut comment: Option<String> = None;
    let mut offset = fc.offset + fc.start.source.len();

    for (i, item) in fc.items.iter().enumerate() {
        let CollectionItem { start, key, sep, value, .. } = item;
        let (key, value) = (key.as_deref(), value.as_deref());
        let mut props = resolve_props(
            ctx,
            start,
            PropsOptions {
                flow: Some(fc_name),
                indicator: TokenType::ExplicitKeyInd,
                next: Next::key_or_sep(key, sep.as_ref()),
                offset,
                parent_indent: fc.indent,
                start_on_newline: false,
            },
        );
        if props.found.is_none() {
            if props.anchor.is_none() && props.tag.is_none() && sep.is_none() && value.is_none() {
                if let (0, Some(comma)) = (i, props.comma) {
                    ctx.error(
                        token_span(comma),
                        ErrorCode::UnexpectedToken,
                        format!("Unexpected , in {}", fc_name),
                    );
                } else if i + 1 < fc.items.len() {
                    ctx.error(
                        at(props.start),
                        ErrorCode::UnexpectedToken,
                        format!("Unexpected empty item in {}", fc_name),
                    );
                }
                if !props.comment.is_empty() {
                    comment = Some(join_comment(comment, &props.comment));
                }
                offset = props.end;
                continue;
            }
            if !is_map && strict && contains_newline(key) {
                let span = key.map_or(at(props.start), node_span);
                ctx.error(
                    span,
                    ErrorCode::MultilineImplicitKey,
                    "Implicit keys of flow sequence pairs need to be on a single line",
                );
            }
        }

        if i == 0 {
            if let Some(comma) = props.comma {
                ctx.error(
                    token_span(comma),
                    ErrorCode::UnexpectedToken,
                    format!("Unexpected , in {}", fc_name),
                );
            }
        } else {
            if props.comma.is_none() {
                ctx.error(
                    at(props.start),
                    ErrorCode::MissingChar,
                    format!("Missing , between {} items", fc_name),
                );
            }
            if !props.comment.is_empty() {
                take_previous_item_comment(ctx, start, &mut props, &pairs, &items, is_map);
            }
        }

        if !is_map && sep.is_none() && props.found.is_none() {
            // A plain sequence item.
            let value_node = match value {
                Some(value) => compose_node(ctx, value, &props),
                None => compose_empty_node(ctx, props.end, None, None, &props),
            };
            items.push(value_node);
            offset = node_range(ctx, value_node)[2];
            if is_block(value) {
                let span = value_span(ctx, value_node);
                ctx.error(span, ErrorCode::BlockInFlow, BLOCK_MSG);
            }
            continue;
        }

        ctx.at_key = true;
        let key_start = props.end;
        let key_node = match key {
            Some(key) => compose_node(ctx, key, &props),
            None => compose_empty_node(ctx, key_start, Some(start.as_slice()), None, &props),
        };
        if is_block(key) {
            let span = value_span(ctx, key_node);
            ctx.error(span, ErrorCode::BlockInFlow, BLOCK_MSG);
        }
        ctx.at_key = false;

        let key_end = node_range(ctx, key_node)[2];
        let value_props = resolve_props(
            ctx,
            sep.as_deref().unwrap_or_default(),
            PropsOptions {
                flow: Some(fc_name),
                indicator: TokenType::MapValueInd,
                next: Next::from_node(value),
                offset: key_end,
                parent_indent: fc.indent,
                start_on_newline: false,
            },
        );
        if let Some(found) = value_props.found {
            if !is_map && props.found.is_none() && strict {
                for st in sep.iter().flatten() {
                    if ptr::eq(st, found) {
                        break;
                    }
                    if st.kind == TokenType::Newline {
                        ctx.error(
                            token_span(st),
                            ErrorCode::MultilineImplicitKey,
                            "Implicit keys of flow sequence pairs need to be on a single line",
                        );
                        break;
                    }
                }
                if props.start + 1024 < found.offset {
                    ctx.error(
                        token_span(found),
                        ErrorCode::KeyOver1024Chars,
                        "The : indicator must be at most 1024 chars after the start of an implicit flow sequence key",
                    );
                }
            }
        } else if let Some(value) = value {
            if matches!(value, CstNode::FlowScalar(s) if s.source.starts_with(':')) {
                ctx.error(
                    node_span(value),
                    ErrorCode::MissingChar,
                    format!("Missing space after : in {}", fc_name),
                );
            } else {
                ctx.error(
                    at(value_props.start),
                    ErrorCode::MissingChar,
                    format!("Missing , or : between {} items", fc_name),
                );
            }
        }

        let value_node = match value {
            Some(value) => Some(compose_node(ctx, value, &value_props)),
            None if value_props.found.is_some() => Some(compose_empty_node(
                ctx,
                value_props.end,
                sep.as_deref(),
                None,
                &value_props,
            )),
            None => None,
        };
        match value_node {
            Some(value_node) if is_block(value) => {
                let span = value_span(ctx, value_node);
                ctx.error(span, ErrorCode::BlockInFlow, BLOCK_MSG);
            }
            None if !value_props.comment.is_empty() => {
                set_comment(ctx, key_node, Some(value_props.comment.clone()));
            }
            _ => {}
        }
        offset = match value_node {
            Some(value_node) => node_range(ctx, value_node)[2],
            None => value_props.end,
        };
        let value_node = match value_node {
            Some(value_node) => value_node,
            None => null_node(ctx, value_props.end),
        };

        if is_map {
            check_duplicate(ctx, &mut seen, key_node, key_start);
            check_merge(ctx, key_node, value_node);
            pairs.push(Pair {
                key: key_node,
                value: value_node,
            });
        } else {
            // A single pair in a flow sequence becomes a one-entry mapping.
            let [key_offset, _, _] = node_range(ctx, key_node);
            let [_, value_end, end] = node_range(ctx, value_node);
            let mut map = Node::new(NodeKind::Mapping(Mapping {
                pairs: vec![Pair {
                    key: key_node,
                    value: value_node,
                }],
                flow: true,
            }));
            map.range = [key_offset, value_end.max(key_offset), end.max(key_offset)];
            let map = ctx.doc.add_node(map);
            check_merge(ctx, key_node, value_node);
            items.push(map);
        }
    }

    let expected_end = if is_map { "}" } else { "]" };
    let mut close_end = offset;
    let rest: &[SourceToken] = match fc.end.first() {
        Some(close) if close.source == expected_end => {
            close_end = close.offset + close.source.len();
            &fc.end[1..]
        }
        close => {
            let name = if is_map { "Flow map" } else { "Flow sequence" };
            if at_root {
                ctx.error(
                    at(offset),
                    ErrorCode::MissingChar,
                    format!("{} must end with a {}", name, expected_end),
                );
            } else {
                ctx.error(
                    at(offset),
                    ErrorCode::BadIndent,
                    format!(
                        "{} in block collection must be sufficiently indented and end with a {}",
                        name, expected_end
                    ),
                );
            }
            match close {
                Some(close) if close.source.len() != 1 => &fc.end[..],
                Some(_) => &fc.end[1..],
                None => &[],
            }
        }
    };
    let mut range = [fc.offset, close_end, close_end];
    if !rest.is_empty() {
        let (end_comment, end) = resolve_end(ctx, rest, close_end, strict);
        if let Some(end_comment) = end_comment {
            comment = Some(join_comment(comment, &end_comment));
        }
        range[2] = end;
    }

    let node = ctx.doc.node_mut(id);
    match &mut node.kind {
        NodeKind::Mapping(map) => {
            map.pairs = pairs;
            map.flow = true;
        }
        NodeKind::Sequence(seq) => {
            seq.items = items;
            seq.flow = true;
        }
        _ => {}
    }
    node.range = range;
    set_comment(ctx, id, comment);
}

/// In `[a, # note\n b]` the comment after the comma belongs to `a`.
fn take_previous_item_comment(
    ctx: &mut Ctx<'_>,
    start: &[SourceToken],
    props: &mut Props<'_>,
    pairs: &[Pair],
    items: &[NodeId],
    is_map: bool,
) {
    let mut previous_comment = None;
    for st in start {
        match st.kind {
            TokenType::Comma | TokenType::Space => {}
            TokenType::Comment => {
                previous_comment = Some(&st.source[1..]);
                break;
            }
            _ => break,
        }
    }
    let previous_comment = match previous_comment {
        Some(text) if !text.is_empty() => text,
        _ => return,
    };
    let previous = if is_map {
        pairs.last().map(|pair| pair.value)
    } else {
        items.last().copied()
    };
    if let Some(previous) = previous {
        set_comment(ctx, previous, Some(previous_comment.to_string()));
        props.comment = props
            .comment
            .get(previous_comment.len() + 1..)
            .unwrap_or_default()
            .to_string();
    }
}
