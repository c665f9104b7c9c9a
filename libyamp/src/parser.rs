//! Stage 2: Parser
//!
//! Turns lexemes into concrete syntax tree nodes. The parser keeps an
//! explicit stack of open nodes; every lexeme is routed to the handler for
//! the node on top of the stack, which either absorbs it, opens a child node,
//! or closes itself and hands the lexeme on to its parent.
//!
//! Finished top-level nodes (documents, directives, stray comments, errors)
//! are queued and returned from [`Parser::parse`] in input order.

use crate::cst::{
    token_type, BlockMap, BlockScalar, BlockSeq, CollectionItem, CstDocument, CstNode, Directive,
    DocEnd, ErrorToken, FlowCollection, FlowScalar, SourceToken, TokenType,
};
use crate::lexer::Lexer;
use tracing::trace;

fn includes_token(list: &[SourceToken], kind: TokenType) -> bool {
    list.iter().any(|t| t.kind == kind)
}

fn find_non_empty_index(list: &[SourceToken]) -> Option<usize> {
    list.iter().position(|t| {
        !matches!(
            t.kind,
            TokenType::Space | TokenType::Comment | TokenType::Newline
        )
    })
}

fn is_flow_token(node: &Option<Box<CstNode>>) -> bool {
    node.as_deref().is_some_and(CstNode::is_flow_node)
}

fn ends_in_comment(node: &Option<Box<CstNode>>) -> bool {
    node.as_deref()
        .and_then(CstNode::end)
        .and_then(|end| end.last())
        .is_some_and(|t| t.kind == TokenType::Comment)
}

fn value_end(node: &mut Option<Box<CstNode>>) -> Option<&mut Vec<SourceToken>> {
    node.as_deref_mut().and_then(CstNode::end_mut)
}

/// The last item of a collection, created empty if there is none.
fn last_item(items: &mut Vec<CollectionItem>) -> &mut CollectionItem {
    if items.is_empty() {
        items.push(CollectionItem::default());
    }
    let n = items.len() - 1;
    &mut items[n]
}

/// The property tokens that precede the next value inside `parent`.
fn prev_props(parent: &mut CstNode) -> Option<&mut Vec<SourceToken>> {
    match parent {
        CstNode::Document(doc) => Some(&mut doc.start),
        CstNode::BlockMap(map) => {
            let CollectionItem { start, sep, .. } = map.items.last_mut()?;
            Some(match sep {
                Some(sep) => sep,
                None => start,
            })
        }
        CstNode::BlockSeq(seq) => seq.items.last_mut().map(|it| &mut it.start),
        _ => None,
    }
}

/// Split off the tokens at the end of `prev` that belong to a key starting
/// on the current line (anchor, tag, and the spaces between them).
fn first_key_start_props(prev: Option<&mut Vec<SourceToken>>) -> Vec<SourceToken> {
    let Some(prev) = prev else {
        return Vec::new();
    };
    let mut i = prev
        .iter()
        .rposition(|t| {
            matches!(
                t.kind,
                TokenType::DocStart
                    | TokenType::ExplicitKeyInd
                    | TokenType::MapValueInd
                    | TokenType::SeqItemInd
                    | TokenType::Newline
            )
        })
        .map_or(0, |i| i + 1);
    while prev.get(i).is_some_and(|t| t.kind == TokenType::Space) {
        i += 1;
    }
    prev.split_off(i)
}

/// In a flow sequence, a `key` with no `:` is really a value.
fn fix_flow_seq_items(fc: &mut FlowCollection) {
    if fc.start.kind != TokenType::FlowSeqStart {
        return;
    }
    for it in &mut fc.items {
        let Some(sep) = it.sep.as_ref() else {
            continue;
        };
        if it.value.is_none()
            && !includes_token(&it.start, TokenType::ExplicitKeyInd)
            && !includes_token(sep, TokenType::MapValueInd)
        {
            let sep = it.sep.take().unwrap_or_default();
            it.value = it.key.take();
            match value_end(&mut it.value) {
                Some(end) => end.extend(sep),
                None => it.start.extend(sep),
            }
        }
    }
}

/// Remove the last item of a block collection if it holds nothing but blank
/// lines and comments that are not indented into the collection; those
/// belong to whatever follows.
fn take_trailing_blank(token: &mut CstNode) -> Option<Vec<SourceToken>> {
    let (indent, items) = match token {
        CstNode::BlockMap(map) => (map.indent, &mut map.items),
        CstNode::BlockSeq(seq) => (seq.indent, &mut seq.items),
        _ => return None,
    };
    let last = items.last()?;
    if last.sep.is_none()
        && last.value.is_none()
        && !last.start.is_empty()
        && find_non_empty_index(&last.start).is_none()
        && (indent == 0
            || last
                .start
                .iter()
                .all(|st| st.kind != TokenType::Comment || st.indent < indent))
    {
        return items.pop().map(|it| it.start);
    }
    None
}

/// Move the blank start of the last item and `tok` onto the end of the
/// previous item's value. Gives `tok` back if that value has no end.
fn merge_indented_comment(
    items: &mut Vec<CollectionItem>,
    tok: SourceToken,
) -> Option<SourceToken> {
    let n = items.len();
    if n < 2 || items[n - 2].value.as_deref().and_then(CstNode::end).is_none() {
        return Some(tok);
    }
    let start = items.pop().map(|it| it.start).unwrap_or_default();
    if let Some(end) = value_end(&mut items[n - 2].value) {
        end.extend(start);
        end.push(tok);
    }
    None
}

/// Builds CST nodes from a YAML source, one chunk at a time.
#[derive(Debug)]
pub struct Parser {
    lexer: Lexer,
    at_new_line: bool,
    at_scalar: bool,
    indent: usize,
    /// Byte offset of the current lexeme in the whole input.
    pub offset: usize,
    on_key_line: bool,
    stack: Vec<CstNode>,
    source: String,
    kind: TokenType,
    out: Vec<CstNode>,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            lexer: Lexer::new(),
            at_new_line: true,
            at_scalar: false,
            indent: 0,
            offset: 0,
            on_key_line: false,
            stack: Vec::new(),
            source: String::new(),
            kind: TokenType::DocMode,
            out: Vec::new(),
        }
    }

    /// Parse `source` as a YAML stream, returning the nodes completed so far.
    ///
    /// With `incomplete`, the parser state is kept for the next call and
    /// nodes still open are not returned.
    pub fn parse(&mut self, source: &str, incomplete: bool) -> Vec<CstNode> {
        let mut nodes = Vec::new();
        self.parse_with(source, incomplete, |node| nodes.push(node));
        nodes
    }

    /// Like [`Parser::parse`], handing each completed node to `sink` as soon
    /// as it is done.
    pub fn parse_with<F>(&mut self, source: &str, incomplete: bool, mut sink: F)
    where
        F: FnMut(CstNode),
    {
        let lexemes: Vec<String> = self.lexer.lex(source, incomplete).collect();
        for lexeme in &lexemes {
            self.next_lexeme(lexeme);
            self.out.drain(..).for_each(&mut sink);
        }
        if !incomplete {
            self.end();
            self.out.drain(..).for_each(&mut sink);
        }
    }

    /// Advance the parser by one lexeme.
    pub fn next_lexeme(&mut self, source: &str) {
        self.source.clear();
        self.source.push_str(source);
        if self.at_scalar {
            self.at_scalar = false;
            self.step();
            self.offset += source.len();
            return;
        }
        match token_type(source) {
            None => {
                let message = format!("Not a YAML token: {}", source);
                let error = self.error(message);
                self.pop(Some(error));
                self.offset += source.len();
            }
            Some(TokenType::Scalar) => {
                self.at_new_line = false;
                self.at_scalar = true;
                self.kind = TokenType::Scalar;
            }
            Some(kind) => {
                self.kind = kind;
                self.step();
                match kind {
                    TokenType::Newline => {
                        self.at_new_line = true;
                        self.indent = 0;
                    }
                    TokenType::Space => {
                        if self.at_new_line && source.starts_with(' ') {
                            self.indent += source.len();
                        }
                    }
                    TokenType::ExplicitKeyInd | TokenType::MapValueInd | TokenType::SeqItemInd => {
                        if self.at_new_line {
                            self.indent += source.len();
                        }
                    }
                    // sentinels take no room in the source
                    TokenType::DocMode | TokenType::FlowErrorEnd => return,
                    _ => self.at_new_line = false,
                }
                self.offset += source.len();
            }
        }
    }

    /// Close every open node.
    pub fn end(&mut self) {
        while !self.stack.is_empty() {
            self.pop(None);
        }
    }

    fn source_token(&self) -> SourceToken {
        SourceToken {
            kind: self.kind,
            offset: self.offset,
            indent: self.indent,
            source: self.source.clone(),
        }
    }

    fn error(&self, message: String) -> CstNode {
        CstNode::Error(ErrorToken {
            offset: self.offset,
            source: self.source.clone(),
            message,
        })
    }

    fn emit(&mut self, node: CstNode) {
        trace!(kind = node.type_name(), offset = node.offset(), "cst node");
        self.out.push(node);
    }

    fn step(&mut self) {
        if self.kind == TokenType::DocEnd && !matches!(self.stack.last(), Some(CstNode::DocEnd(_)))
        {
            while !self.stack.is_empty() {
                self.pop(None);
            }
            self.stack.push(CstNode::DocEnd(DocEnd {
                offset: self.offset,
                source: self.source.clone(),
                end: Vec::new(),
            }));
            return;
        }
        let Some(top) = self.stack.pop() else {
            return self.stream();
        };
        match top {
            CstNode::Document(doc) => self.document(doc),
            CstNode::FlowScalar(scalar) => self.scalar(scalar),
            CstNode::BlockScalar(scalar) => self.block_scalar(scalar),
            CstNode::BlockMap(map) => self.block_map(map),
            CstNode::BlockSeq(seq) => self.block_sequence(seq),
            CstNode::FlowCollection(fc) => self.flow_collection(fc),
            CstNode::DocEnd(doc_end) => self.document_end(doc_end),
            other => {
                self.stack.push(other);
                self.pop(None);
            }
        }
    }

    /// Close the top node (or attach `error`) into its parent.
    fn pop(&mut self, error: Option<CstNode>) {
        let token = match error {
            Some(error) => Some(error),
            None => self.stack.pop(),
        };
        let Some(mut token) = token else {
            let error = self.error("Tried to pop an empty stack".to_string());
            self.emit(error);
            return;
        };
        let Some(top) = self.stack.last_mut() else {
            self.emit(token);
            return;
        };

        match &mut token {
            // block scalars use their parent's indent rather than the header's
            CstNode::BlockScalar(scalar) => scalar.indent = top.indent().unwrap_or(0),
            CstNode::FlowCollection(fc) => {
                if matches!(top, CstNode::Document(_)) {
                    fc.indent = 0;
                }
                fix_flow_seq_items(fc);
            }
            _ => {}
        }

        let leftover = match top {
            CstNode::Document(doc) => {
                let moved = take_trailing_blank(&mut token);
                doc.value = Some(Box::new(token));
                if let Some(start) = moved {
                    doc.end = start;
                }
                None
            }
            CstNode::BlockScalar(scalar) => {
                scalar.props.push(token);
                None
            }
            CstNode::BlockMap(map) => {
                let it = last_item(&mut map.items);
                if it.value.is_some() {
                    map.items
                        .push(CollectionItem::with_key(Vec::new(), Some(token), Vec::new()));
                    self.on_key_line = true;
                } else if it.sep.is_some() {
                    let moved = take_trailing_blank(&mut token);
                    it.value = Some(Box::new(token));
                    if let Some(start) = moved {
                        map.items.push(CollectionItem::with_start(start));
                    }
                } else {
                    it.key = Some(Box::new(token));
                    it.sep = Some(Vec::new());
                    self.on_key_line = !it.explicit_key;
                }
                None
            }
            CstNode::BlockSeq(seq) => {
                let moved = take_trailing_blank(&mut token);
                let it = last_item(&mut seq.items);
                if it.value.is_some() {
                    seq.items.push(CollectionItem {
                        value: Some(Box::new(token)),
                        ..CollectionItem::default()
                    });
                } else {
                    it.value = Some(Box::new(token));
                }
                if let Some(start) = moved {
                    seq.items.push(CollectionItem::with_start(start));
                }
                None
            }
            CstNode::FlowCollection(fc) => {
                match fc.items.last_mut() {
                    Some(it) if it.value.is_none() => {
                        if it.sep.is_some() {
                            it.value = Some(Box::new(token));
                        } else {
                            it.key = Some(Box::new(token));
                            it.sep = Some(Vec::new());
                        }
                    }
                    _ => fc
                        .items
                        .push(CollectionItem::with_key(Vec::new(), Some(token), Vec::new())),
                }
                None
            }
            _ => Some(token),
        };
        if let Some(token) = leftover {
            self.pop(None);
            self.pop(Some(token));
        }
    }

    fn stream(&mut self) {
        match self.kind {
            TokenType::DirectiveLine => {
                let directive = CstNode::Directive(Directive {
                    offset: self.offset,
                    source: self.source.clone(),
                });
                self.emit(directive);
            }
            TokenType::ByteOrderMark
            | TokenType::Space
            | TokenType::Comment
            | TokenType::Newline => {
                let tok = self.source_token();
                self.emit(CstNode::Source(tok));
            }
            TokenType::DocMode | TokenType::DocStart => {
                let mut doc = CstDocument {
                    offset: self.offset,
                    start: Vec::new(),
                    value: None,
                    end: Vec::new(),
                };
                if self.kind == TokenType::DocStart {
                    doc.start.push(self.source_token());
                }
                self.stack.push(CstNode::Document(doc));
            }
            kind => {
                let error = self.error(format!("Unexpected {} token in YAML stream", kind.as_str()));
                self.emit(error);
            }
        }
    }

    fn document(&mut self, mut doc: CstDocument) {
        if doc.value.is_some() {
            return self.line_end(CstNode::Document(doc));
        }
        match self.kind {
            TokenType::DocStart => {
                if find_non_empty_index(&doc.start).is_some() {
                    self.stack.push(CstNode::Document(doc));
                    self.pop(None);
                    self.step();
                } else {
                    doc.start.push(self.source_token());
                    self.stack.push(CstNode::Document(doc));
                }
                return;
            }
            TokenType::Anchor
            | TokenType::Tag
            | TokenType::Space
            | TokenType::Comment
            | TokenType::Newline => {
                doc.start.push(self.source_token());
                self.stack.push(CstNode::Document(doc));
                return;
            }
            _ => {}
        }
        let mut parent = CstNode::Document(doc);
        match self.start_block_value(&mut parent) {
            Some(bv) => {
                self.stack.push(parent);
                self.stack.push(bv);
            }
            None => {
                // The error stands in for the value so that the document's
                // start tokens stay ahead of it.
                let message = format!("Unexpected {} token in YAML document", self.kind.as_str());
                let error = self.error(message);
                if let CstNode::Document(doc) = &mut parent {
                    doc.value = Some(Box::new(error));
                }
                self.stack.push(parent);
            }
        }
    }

    fn scalar(&mut self, mut scalar: FlowScalar) {
        if self.kind != TokenType::MapValueInd {
            return self.line_end(CstNode::FlowScalar(scalar));
        }
        let start = first_key_start_props(self.stack.last_mut().and_then(prev_props));
        let mut sep = std::mem::take(&mut scalar.end);
        sep.push(self.source_token());
        let map = BlockMap {
            offset: scalar.offset,
            indent: scalar.indent,
            items: vec![CollectionItem::with_key(
                start,
                Some(CstNode::FlowScalar(scalar)),
                sep,
            )],
        };
        self.on_key_line = true;
        self.stack.push(CstNode::BlockMap(map));
    }

    fn block_scalar(&mut self, mut scalar: BlockScalar) {
        match self.kind {
            TokenType::Space | TokenType::Comment | TokenType::Newline => {
                scalar.props.push(CstNode::Source(self.source_token()));
                self.stack.push(CstNode::BlockScalar(scalar));
            }
            TokenType::Scalar => {
                scalar.source = self.source.clone();
                // the body includes its trailing newline
                self.at_new_line = true;
                self.indent = 0;
                self.stack.push(CstNode::BlockScalar(scalar));
                self.pop(None);
            }
            _ => {
                self.stack.push(CstNode::BlockScalar(scalar));
                self.pop(None);
                self.step();
            }
        }
    }

    fn block_map(&mut self, mut map: BlockMap) {
        let tok = self.source_token();
        match self.kind {
            TokenType::Newline => {
                self.on_key_line = false;
                let it = last_item(&mut map.items);
                if it.value.is_some() {
                    if ends_in_comment(&it.value) {
                        if let Some(end) = value_end(&mut it.value) {
                            end.push(tok);
                        }
                    } else {
                        map.items.push(CollectionItem::with_start(vec![tok]));
                    }
                } else if let Some(sep) = it.sep.as_mut() {
                    sep.push(tok);
                } else {
                    it.start.push(tok);
                }
                self.stack.push(CstNode::BlockMap(map));
                return;
            }
            TokenType::Space | TokenType::Comment => {
                let it = last_item(&mut map.items);
                if it.value.is_some() {
                    map.items.push(CollectionItem::with_start(vec![tok]));
                } else if let Some(sep) = it.sep.as_mut() {
                    sep.push(tok);
                } else if self.at_indented_comment(&it.start, map.indent) {
                    if let Some(tok) = merge_indented_comment(&mut map.items, tok) {
                        last_item(&mut map.items).start.push(tok);
                    }
                } else {
                    it.start.push(tok);
                }
                self.stack.push(CstNode::BlockMap(map));
                return;
            }
            _ => {}
        }

        if self.indent >= map.indent {
            let at_map_indent = !self.on_key_line && self.indent == map.indent;
            let it = last_item(&mut map.items);
            let at_next_item = at_map_indent
                && (it.sep.is_some() || it.explicit_key)
                && self.kind != TokenType::SeqItemInd;

            // Blank lines before an empty value's next item belong to that item.
            let mut start = Vec::new();
            if at_next_item && it.value.is_none() {
                if let Some(sep) = it.sep.as_mut() {
                    let mut nl = Vec::new();
                    for (i, st) in sep.iter().enumerate() {
                        match st.kind {
                            TokenType::Newline => nl.push(i),
                            TokenType::Space => {}
                            TokenType::Comment => {
                                if st.indent > map.indent {
                                    nl.clear();
                                }
                            }
                            _ => nl.clear(),
                        }
                    }
                    if nl.len() >= 2 {
                        start = sep.split_off(nl[1]);
                    }
                }
            }

            let mut child = None;
            match self.kind {
                TokenType::Anchor | TokenType::Tag => {
                    if at_next_item || it.value.is_some() {
                        start.push(tok);
                        map.items.push(CollectionItem::with_start(start));
                        self.on_key_line = true;
                    } else if let Some(sep) = it.sep.as_mut() {
                        sep.push(tok);
                    } else {
                        it.start.push(tok);
                    }
                }

                TokenType::ExplicitKeyInd => {
                    if it.sep.is_none() && !it.explicit_key {
                        it.start.push(tok);
                        it.explicit_key = true;
                    } else if at_next_item || it.value.is_some() {
                        start.push(tok);
                        map.items.push(CollectionItem {
                            start,
                            explicit_key: true,
                            ..CollectionItem::default()
                        });
                    } else {
                        child = Some(CstNode::BlockMap(BlockMap {
                            offset: self.offset,
                            indent: self.indent,
                            items: vec![CollectionItem {
                                start: vec![tok],
                                explicit_key: true,
                                ..CollectionItem::default()
                            }],
                        }));
                    }
                    self.on_key_line = true;
                }

                TokenType::MapValueInd => {
                    let nested = |start: Vec<SourceToken>, key: Option<CstNode>, sep| {
                        CstNode::BlockMap(BlockMap {
                            offset: self.offset,
                            indent: self.indent,
                            items: vec![CollectionItem::with_key(start, key, sep)],
                        })
                    };
                    if it.explicit_key {
                        match it.sep.as_mut() {
                            None => {
                                if includes_token(&it.start, TokenType::Newline) {
                                    it.key = None;
                                    it.sep = Some(vec![tok]);
                                } else {
                                    let start = first_key_start_props(Some(&mut it.start));
                                    child = Some(nested(start, None, vec![tok]));
                                }
                            }
                            Some(_) if it.value.is_some() => {
                                map.items
                                    .push(CollectionItem::with_key(Vec::new(), None, vec![tok]));
                            }
                            Some(sep) if includes_token(sep, TokenType::MapValueInd) => {
                                child = Some(nested(start, None, vec![tok]));
                            }
                            Some(sep)
                                if is_flow_token(&it.key)
                                    && !includes_token(sep, TokenType::Newline) =>
                            {
                                let mut sep = std::mem::take(sep);
                                sep.push(tok);
                                it.sep = None;
                                let key = it.key.take().map(|key| *key);
                                let start = first_key_start_props(Some(&mut it.start));
                                child = Some(nested(start, key, sep));
                            }
                            Some(sep) => {
                                // not actually at the next item
                                sep.append(&mut start);
                                sep.push(tok);
                            }
                        }
                    } else {
                        match it.sep.as_mut() {
                            None => {
                                it.key = None;
                                it.sep = Some(vec![tok]);
                            }
                            Some(_) if it.value.is_some() || at_next_item => {
                                map.items.push(CollectionItem::with_key(start, None, vec![tok]));
                            }
                            Some(sep) if includes_token(sep, TokenType::MapValueInd) => {
                                child = Some(nested(Vec::new(), None, vec![tok]));
                            }
                            Some(sep) => sep.push(tok),
                        }
                    }
                    self.on_key_line = true;
                }

                TokenType::Alias
                | TokenType::Scalar
                | TokenType::SingleQuotedScalar
                | TokenType::DoubleQuotedScalar => {
                    let fs = self.flow_scalar();
                    if at_next_item || it.value.is_some() {
                        map.items.push(CollectionItem::with_key(start, Some(fs), Vec::new()));
                        self.on_key_line = true;
                    } else if it.sep.is_some() {
                        child = Some(fs);
                    } else {
                        it.key = Some(Box::new(fs));
                        it.sep = Some(Vec::new());
                        self.on_key_line = true;
                    }
                }

                _ => {
                    let explicit_key = it.explicit_key;
                    let key_line_sep = it
                        .sep
                        .as_ref()
                        .is_some_and(|sep| !includes_token(sep, TokenType::Newline));
                    let mut parent = CstNode::BlockMap(map);
                    let bv = self.start_block_value(&mut parent);
                    let CstNode::BlockMap(map) = &mut parent else {
                        return;
                    };
                    if let Some(bv) = bv {
                        if matches!(bv, CstNode::BlockSeq(_)) {
                            if !explicit_key && key_line_sep {
                                self.stack.push(parent);
                                let error = self
                                    .error("Unexpected block-seq-ind on same line with key".into());
                                self.pop(Some(error));
                                return;
                            }
                        } else if at_map_indent {
                            map.items.push(CollectionItem::with_start(start));
                        }
                        self.stack.push(parent);
                        self.stack.push(bv);
                        return;
                    }
                    if let Some(sep) = map.items.last_mut().and_then(|it| it.sep.as_mut()) {
                        sep.append(&mut start);
                    }
                    self.stack.push(parent);
                    self.pop(None);
                    self.step();
                    return;
                }
            }
            self.stack.push(CstNode::BlockMap(map));
            if let Some(child) = child {
                self.stack.push(child);
            }
            return;
        }

        self.stack.push(CstNode::BlockMap(map));
        self.pop(None);
        self.step();
    }

    fn block_sequence(&mut self, mut seq: BlockSeq) {
        let tok = self.source_token();
        let it = last_item(&mut seq.items);
        match self.kind {
            TokenType::Newline => {
                if it.value.is_some() {
                    if ends_in_comment(&it.value) {
                        if let Some(end) = value_end(&mut it.value) {
                            end.push(tok);
                        }
                    } else {
                        seq.items.push(CollectionItem::with_start(vec![tok]));
                    }
                } else {
                    it.start.push(tok);
                }
                self.stack.push(CstNode::BlockSeq(seq));
                return;
            }
            TokenType::Space | TokenType::Comment => {
                if it.value.is_some() {
                    seq.items.push(CollectionItem::with_start(vec![tok]));
                } else if self.at_indented_comment(&it.start, seq.indent) {
                    if let Some(tok) = merge_indented_comment(&mut seq.items, tok) {
                        last_item(&mut seq.items).start.push(tok);
                    }
                } else {
                    it.start.push(tok);
                }
                self.stack.push(CstNode::BlockSeq(seq));
                return;
            }
            TokenType::Anchor | TokenType::Tag => {
                if it.value.is_none() && self.indent > seq.indent {
                    it.start.push(tok);
                    self.stack.push(CstNode::BlockSeq(seq));
                    return;
                }
            }
            TokenType::SeqItemInd => {
                if self.indent == seq.indent {
                    if it.value.is_some() || includes_token(&it.start, TokenType::SeqItemInd) {
                        seq.items.push(CollectionItem::with_start(vec![tok]));
                    } else {
                        it.start.push(tok);
                    }
                    self.stack.push(CstNode::BlockSeq(seq));
                    return;
                }
            }
            _ => {}
        }
        let indent = seq.indent;
        let mut parent = CstNode::BlockSeq(seq);
        if self.indent > indent {
            if let Some(bv) = self.start_block_value(&mut parent) {
                self.stack.push(parent);
                self.stack.push(bv);
                return;
            }
        }
        self.stack.push(parent);
        self.pop(None);
        self.step();
    }

    fn flow_collection(&mut self, mut fc: FlowCollection) {
        let tok = self.source_token();
        if self.kind == TokenType::FlowErrorEnd {
            self.stack.push(CstNode::FlowCollection(fc));
            loop {
                self.pop(None);
                if !matches!(self.stack.last(), Some(CstNode::FlowCollection(_))) {
                    break;
                }
            }
            return;
        }

        if fc.end.is_empty() {
            let mut child = None;
            match self.kind {
                TokenType::Comma | TokenType::ExplicitKeyInd => match fc.items.last_mut() {
                    Some(it) if it.sep.is_none() => it.start.push(tok),
                    _ => fc.items.push(CollectionItem::with_start(vec![tok])),
                },
                TokenType::MapValueInd => match fc.items.last_mut() {
                    Some(it) if it.value.is_none() => match it.sep.as_mut() {
                        Some(sep) => sep.push(tok),
                        None => {
                            it.key = None;
                            it.sep = Some(vec![tok]);
                        }
                    },
                    _ => fc
                        .items
                        .push(CollectionItem::with_key(Vec::new(), None, vec![tok])),
                },
                TokenType::Space
                | TokenType::Comment
                | TokenType::Newline
                | TokenType::Anchor
                | TokenType::Tag => match fc.items.last_mut() {
                    Some(it) if it.value.is_none() => match it.sep.as_mut() {
                        Some(sep) => sep.push(tok),
                        None => it.start.push(tok),
                    },
                    _ => fc.items.push(CollectionItem::with_start(vec![tok])),
                },
                TokenType::Alias
                | TokenType::Scalar
                | TokenType::SingleQuotedScalar
                | TokenType::DoubleQuotedScalar => {
                    let fs = self.flow_scalar();
                    match fc.items.last_mut() {
                        Some(it) if it.value.is_none() => {
                            if it.sep.is_some() {
                                child = Some(fs);
                            } else {
                                it.key = Some(Box::new(fs));
                                it.sep = Some(Vec::new());
                            }
                        }
                        _ => fc
                            .items
                            .push(CollectionItem::with_key(Vec::new(), Some(fs), Vec::new())),
                    }
                }
                TokenType::FlowMapEnd | TokenType::FlowSeqEnd => fc.end.push(tok),
                _ => {
                    let mut parent = CstNode::FlowCollection(fc);
                    let bv = self.start_block_value(&mut parent);
                    self.stack.push(parent);
                    match bv {
                        Some(bv) => self.stack.push(bv),
                        None => {
                            self.pop(None);
                            self.step();
                        }
                    }
                    return;
                }
            }
            self.stack.push(CstNode::FlowCollection(fc));
            if let Some(child) = child {
                self.stack.push(child);
            }
            return;
        }

        let (parent_block_map, parent_flow) = match self.stack.last() {
            Some(CstNode::BlockMap(map)) => {
                let last_has_sep = map.items.last().is_some_and(|it| it.sep.is_some());
                (Some((map.indent, last_has_sep)), false)
            }
            Some(CstNode::FlowCollection(_)) => (None, true),
            _ => (None, false),
        };
        let closes = parent_block_map.is_some_and(|(indent, last_has_sep)| {
            (self.kind == TokenType::MapValueInd && indent == fc.indent)
                || (self.kind == TokenType::Newline && !last_has_sep)
        });
        if closes {
            self.stack.push(CstNode::FlowCollection(fc));
            self.pop(None);
            self.step();
        } else if self.kind == TokenType::MapValueInd && !parent_flow {
            // the collection is an implicit key
            let start = first_key_start_props(self.stack.last_mut().and_then(prev_props));
            fix_flow_seq_items(&mut fc);
            let mut sep = fc.end.split_off(fc.end.len().min(1));
            sep.push(tok);
            let map = BlockMap {
                offset: fc.offset,
                indent: fc.indent,
                items: vec![CollectionItem::with_key(
                    start,
                    Some(CstNode::FlowCollection(fc)),
                    sep,
                )],
            };
            self.on_key_line = true;
            self.stack.push(CstNode::BlockMap(map));
        } else {
            self.line_end(CstNode::FlowCollection(fc));
        }
    }

    fn flow_scalar(&self) -> CstNode {
        CstNode::FlowScalar(FlowScalar {
            kind: self.kind,
            offset: self.offset,
            indent: self.indent,
            source: self.source.clone(),
            end: Vec::new(),
        })
    }

    fn start_block_value(&mut self, parent: &mut CstNode) -> Option<CstNode> {
        match self.kind {
            TokenType::Alias
            | TokenType::Scalar
            | TokenType::SingleQuotedScalar
            | TokenType::DoubleQuotedScalar => Some(self.flow_scalar()),
            TokenType::BlockScalarHeader => Some(CstNode::BlockScalar(BlockScalar {
                offset: self.offset,
                indent: self.indent,
                props: vec![CstNode::Source(self.source_token())],
                source: String::new(),
            })),
            TokenType::FlowMapStart | TokenType::FlowSeqStart => {
                Some(CstNode::FlowCollection(FlowCollection {
                    offset: self.offset,
                    indent: self.indent,
                    start: self.source_token(),
                    items: Vec::new(),
                    end: Vec::new(),
                }))
            }
            TokenType::SeqItemInd => Some(CstNode::BlockSeq(BlockSeq {
                offset: self.offset,
                indent: self.indent,
                items: vec![CollectionItem::with_start(vec![self.source_token()])],
            })),
            TokenType::ExplicitKeyInd => {
                self.on_key_line = true;
                let mut start = first_key_start_props(prev_props(parent));
                start.push(self.source_token());
                Some(CstNode::BlockMap(BlockMap {
                    offset: self.offset,
                    indent: self.indent,
                    items: vec![CollectionItem {
                        start,
                        explicit_key: true,
                        ..CollectionItem::default()
                    }],
                }))
            }
            TokenType::MapValueInd => {
                self.on_key_line = true;
                let start = first_key_start_props(prev_props(parent));
                Some(CstNode::BlockMap(BlockMap {
                    offset: self.offset,
                    indent: self.indent,
                    items: vec![CollectionItem::with_key(
                        start,
                        None,
                        vec![self.source_token()],
                    )],
                }))
            }
            _ => None,
        }
    }

    fn at_indented_comment(&self, start: &[SourceToken], indent: usize) -> bool {
        self.kind == TokenType::Comment
            && self.indent > indent
            && start
                .iter()
                .all(|st| matches!(st.kind, TokenType::Newline | TokenType::Space))
    }

    fn document_end(&mut self, mut doc_end: DocEnd) {
        if self.kind != TokenType::DocMode {
            doc_end.end.push(self.source_token());
            if self.kind == TokenType::Newline {
                self.stack.push(CstNode::DocEnd(doc_end));
                self.pop(None);
                return;
            }
        }
        self.stack.push(CstNode::DocEnd(doc_end));
    }

    fn line_end(&mut self, mut token: CstNode) {
        match self.kind {
            TokenType::Comma
            | TokenType::DocStart
            | TokenType::DocEnd
            | TokenType::FlowSeqEnd
            | TokenType::FlowMapEnd
            | TokenType::MapValueInd => {
                self.stack.push(token);
                self.pop(None);
                self.step();
            }
            _ => {
                if self.kind == TokenType::Newline {
                    self.on_key_line = false;
                }
                // anything else on the line is an error for the composer
                if let Some(end) = token.end_mut() {
                    end.push(self.source_token());
                }
                self.stack.push(token);
                if self.kind == TokenType::Newline {
                    self.pop(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cst;

    fn parse(src: &str) -> Vec<CstNode> {
        Parser::new().parse(src, false)
    }

    fn only_document(nodes: &[CstNode]) -> &CstDocument {
        let docs: Vec<&CstDocument> = nodes
            .iter()
            .filter_map(|n| match n {
                CstNode::Document(doc) => Some(doc),
                _ => None,
            })
            .collect();
        assert_eq!(docs.len(), 1, "{:#?}", nodes);
        docs[0]
    }

    fn scalar_source(node: &Option<Box<CstNode>>) -> &str {
        match node.as_deref() {
            Some(CstNode::FlowScalar(fs)) => &fs.source,
            other => panic!("not a flow scalar: {:?}", other),
        }
    }

    #[test]
    fn test_block_map_pair() {
        let nodes = parse("a: 1\n");
        let doc = only_document(&nodes);
        let Some(CstNode::BlockMap(map)) = doc.value.as_deref() else {
            panic!("expected block map: {:#?}", doc);
        };
        assert_eq!(map.items.len(), 1);
        let item = &map.items[0];
        assert_eq!(scalar_source(&item.key), "a");
        assert_eq!(scalar_source(&item.value), "1");
        let sep: Vec<&str> = item.sep.iter().flatten().map(|t| t.source.as_str()).collect();
        assert_eq!(sep, vec![":", " "]);
    }

    #[test]
    fn test_flow_seq_implicit_pair_and_value() {
        let nodes = parse("[a: 1, b]\n");
        let doc = only_document(&nodes);
        let Some(CstNode::FlowCollection(fc)) = doc.value.as_deref() else {
            panic!("expected flow collection: {:#?}", doc);
        };
        assert!(!fc.is_map());
        assert_eq!(fc.items.len(), 2);
        assert_eq!(scalar_source(&fc.items[0].key), "a");
        assert_eq!(scalar_source(&fc.items[0].value), "1");
        assert!(fc.items[1].key.is_none());
        assert!(fc.items[1].sep.is_none());
        assert_eq!(scalar_source(&fc.items[1].value), "b");
    }

    #[test]
    fn test_seq_on_key_line_is_error() {
        let nodes = parse("a: - b\n");
        let doc = only_document(&nodes);
        let Some(CstNode::BlockMap(map)) = doc.value.as_deref() else {
            panic!("expected block map: {:#?}", doc);
        };
        match map.items[0].value.as_deref() {
            Some(CstNode::Error(err)) => {
                assert_eq!(err.message, "Unexpected block-seq-ind on same line with key")
            }
            other => panic!("expected error value, got {:?}", other),
        }
    }

    #[test]
    fn test_stray_flow_end_stays_in_document() {
        for src in [" ]", "!}", "\t}\n", "]\n}"] {
            let nodes = parse(src);
            assert_eq!(cst::stringify(&nodes), src);
            let CstNode::Document(doc) = &nodes[0] else {
                panic!("expected a document first: {:#?}", nodes);
            };
            match doc.value.as_deref() {
                Some(CstNode::Error(err)) => assert!(err.message.ends_with("token in YAML document")),
                other => panic!("expected error value, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_directive_and_documents() {
        let nodes = parse("%YAML 1.2\n---\nfoo\n...\n---\nbar\n");
        let kinds: Vec<&str> = nodes.iter().map(CstNode::type_name).collect();
        assert_eq!(
            kinds,
            vec!["directive", "newline", "document", "doc-end", "document"]
        );
    }

    #[test]
    fn test_lossless_round_trip() {
        let sources = [
            "a: 1\n",
            "%YAML 1.2\n---\n# c\n- [a, b]\n- k: &x v\n  j: *x\n- |\n  lit\n...\n",
            "? complex\n: value\nseq:\n- 1\n-   2 # two\n\n\nflow: {x: y, z}\n",
            "\u{feff}--- !!str \"quoted\n  text\"\n--- >-\n  folded\n   more\n\n",
            "key: [unterminated\nnext: 1\n",
        ];
        for src in sources {
            let nodes = parse(src);
            assert_eq!(cst::stringify(&nodes), src);
        }
    }

    #[test]
    fn test_chunked_parse_matches_whole() {
        let src = "a: 1\nb:\n  - [x, y]\n  - 'q'\nc: |\n  body\n";
        let whole = parse(src);
        for split in 1..src.len() {
            let mut parser = Parser::new();
            let mut nodes = parser.parse(&src[..split], true);
            nodes.extend(parser.parse(&src[split..], false));
            assert_eq!(nodes, whole, "split at {}", split);
        }
    }
}
