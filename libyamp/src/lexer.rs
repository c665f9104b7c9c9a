//! Stage 1: Lexer
//!
//! Splits a YAML character stream into lexemes. A lexeme is either a raw
//! slice of the source (white space, comment, indicator, scalar text) or one
//! of the sentinel strings defined in [`crate::cst`]. Nothing else is
//! interpreted here: the lexer knows just enough about indentation and flow
//! context to find token boundaries.
//!
//! The lexer is restartable. When called with `incomplete = true`, any tail
//! of the buffer that cannot be tokenized yet is kept, and the next call
//! continues as if both inputs had been passed at once.

use std::collections::VecDeque;

use crate::cst::{BOM, DOCUMENT, FLOW_END, SCALAR};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Stream,
    LineStart,
    BlockStart,
    Doc,
    Flow,
    QuotedScalar,
    BlockScalar,
    PlainScalar,
}

fn is_empty(ch: Option<u8>) -> bool {
    matches!(ch, None | Some(b' ' | b'\n' | b'\r' | b'\t'))
}

fn is_flow_indicator(ch: Option<u8>) -> bool {
    matches!(ch, Some(b',' | b'[' | b']' | b'{' | b'}'))
}

fn is_not_anchor_char(ch: Option<u8>) -> bool {
    matches!(
        ch,
        None | Some(b' ' | b',' | b'[' | b']' | b'{' | b'}' | b'\n' | b'\r' | b'\t')
    )
}

fn is_hex(ch: Option<u8>) -> bool {
    ch.is_some_and(|c| c.is_ascii_hexdigit())
}

fn is_tag_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || b"-#;/?:@&=+$_.!~*'()".contains(&c)
}

/// Splits YAML source into lexemes.
#[derive(Debug, Default)]
pub struct Lexer {
    at_end: bool,
    /// Explicit block scalar indentation indicator, minus one.
    block_scalar_indent: Option<usize>,
    block_scalar_keep: bool,
    /// `indent_next` as it was before the current block scalar's body.
    block_scalar_base: Option<usize>,
    buffer: String,
    /// Inside flow context, whether the last value may be followed by an
    /// adjacent `:` that acts as a value indicator.
    flow_key: bool,
    flow_level: usize,
    /// Minimum indentation required for the next line's content.
    indent_next: usize,
    /// Column of the current content.
    indent_value: usize,
    next: Option<State>,
    /// Input after the last newline, held back until its line is complete.
    pending: String,
    pos: usize,
    queue: VecDeque<String>,
}

/// Lazy sequence of lexemes produced by [`Lexer::lex`].
pub struct Lexemes<'a> {
    lexer: &'a mut Lexer,
    next: Option<State>,
    incomplete: bool,
}

impl Iterator for Lexemes<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some(lexeme) = self.lexer.queue.pop_front() {
                return Some(lexeme);
            }
            let state = self.next?;
            if !self.incomplete && !self.lexer.has_chars(1) {
                self.next = None;
                return None;
            }
            self.next = self.lexer.parse_next(state);
        }
    }
}

impl Lexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate YAML lexemes from `source`.
    ///
    /// If `incomplete`, a part of the last line may be left as a buffer for
    /// the next call; otherwise the whole input is consumed.
    pub fn lex(&mut self, source: &str, incomplete: bool) -> Lexemes<'_> {
        self.pending.push_str(source);
        if incomplete {
            if let Some(i) = self.pending.rfind('\n') {
                let lines: String = self.pending.drain(..=i).collect();
                self.buffer.push_str(&lines);
            }
        } else {
            let rest = std::mem::take(&mut self.pending);
            self.buffer.push_str(&rest);
        }
        self.at_end = !incomplete;
        let next = Some(self.next.unwrap_or(State::Stream));
        Lexemes {
            lexer: self,
            next,
            incomplete,
        }
    }

    /// Lex a complete source into a vector.
    pub fn lex_all(source: &str) -> Vec<String> {
        Lexer::new().lex(source, false).collect()
    }

    fn ch(&self, i: usize) -> Option<u8> {
        self.buffer.as_bytes().get(i).copied()
    }

    fn chi(&self, i: isize) -> Option<u8> {
        if i < 0 {
            None
        } else {
            self.ch(i as usize)
        }
    }

    fn char_at(&self, n: usize) -> Option<u8> {
        self.ch(self.pos + n)
    }

    fn find(&self, b: u8, from: usize) -> Option<usize> {
        let bytes = self.buffer.as_bytes();
        if from >= bytes.len() {
            return None;
        }
        bytes[from..].iter().position(|&c| c == b).map(|i| i + from)
    }

    fn find_before(&self, b: u8, from: usize, until: usize) -> Option<usize> {
        self.find(b, from).filter(|&i| i < until)
    }

    fn has_chars(&self, n: usize) -> bool {
        self.pos + n <= self.buffer.len()
    }

    fn peek(&self, n: usize) -> &str {
        self.buffer.get(self.pos..self.pos + n).unwrap_or("")
    }

    fn emit(&mut self, lexeme: &str) {
        self.queue.push_back(lexeme.to_string());
    }

    fn at_line_end(&self) -> bool {
        let mut i = self.pos;
        let mut ch = self.ch(i);
        while matches!(ch, Some(b' ' | b'\t')) {
            i += 1;
            ch = self.ch(i);
        }
        match ch {
            None | Some(b'#' | b'\n') => true,
            Some(b'\r') => self.ch(i + 1) == Some(b'\n'),
            _ => false,
        }
    }

    /// Where a scalar may continue on the line starting at `offset`, or
    /// `None` if that line ends it.
    fn continue_scalar(&self, offset: usize) -> Option<usize> {
        let mut ch = self.ch(offset);
        if self.indent_next > 0 {
            let mut indent = 0;
            while ch == Some(b' ') {
                indent += 1;
                ch = self.ch(indent + offset);
            }
            if ch == Some(b'\r') {
                let next = self.ch(indent + offset + 1);
                if next == Some(b'\n') || (next.is_none() && !self.at_end) {
                    return Some(offset + indent + 1);
                }
            }
            return if ch == Some(b'\n')
                || indent >= self.indent_next
                || (ch.is_none() && !self.at_end)
            {
                Some(offset + indent)
            } else {
                None
            };
        }
        if ch == Some(b'-') || ch == Some(b'.') {
            let dt = self.buffer.get(offset..offset + 3);
            if matches!(dt, Some("---" | "...")) && is_empty(self.ch(offset + 3)) {
                return None;
            }
        }
        Some(offset)
    }

    /// End of the current line (before any `\r\n`), or `None` if the line
    /// may still continue in a later chunk.
    fn line_end(&self) -> Option<usize> {
        match self.find(b'\n', self.pos) {
            None => {
                if self.at_end {
                    Some(self.buffer.len())
                } else {
                    None
                }
            }
            Some(mut end) => {
                if end > self.pos && self.ch(end - 1) == Some(b'\r') {
                    end -= 1;
                }
                Some(end)
            }
        }
    }

    fn current_line(&self) -> Option<String> {
        self.line_end().map(|end| self.buffer[self.pos..end].to_string())
    }

    fn set_next(&mut self, state: State) -> Option<State> {
        self.buffer.drain(..self.pos);
        self.pos = 0;
        self.next = Some(state);
        None
    }

    fn parse_next(&mut self, next: State) -> Option<State> {
        match next {
            State::Stream => self.parse_stream(),
            State::LineStart => self.parse_line_start(),
            State::BlockStart => self.parse_block_start(),
            State::Doc => self.parse_document(),
            State::Flow => self.parse_flow_collection(),
            State::QuotedScalar => self.parse_quoted_scalar(),
            State::BlockScalar => self.parse_block_scalar(),
            State::PlainScalar => self.parse_plain_scalar(),
        }
    }

    fn parse_stream(&mut self) -> Option<State> {
        let Some(mut line) = self.current_line() else {
            return self.set_next(State::Stream);
        };
        if line.starts_with(BOM) {
            self.push_count(BOM.len());
            line.drain(..BOM.len());
        }
        if line.starts_with('%') {
            let lb = line.as_bytes();
            let mut dir_end = lb.len();
            let mut cs = line.find('#');
            while let Some(c) = cs {
                if c > 0 && (lb[c - 1] == b' ' || lb[c - 1] == b'\t') {
                    dir_end = c - 1;
                    break;
                }
                cs = line[c + 1..].find('#').map(|j| j + c + 1);
            }
            while dir_end > 0 && (lb[dir_end - 1] == b' ' || lb[dir_end - 1] == b'\t') {
                dir_end -= 1;
            }
            let n = self.push_count(dir_end) + self.push_spaces(true);
            self.push_count(lb.len() - n);
            self.push_newline();
            return Some(State::Stream);
        }
        if self.at_line_end() {
            let sp = self.push_spaces(true);
            self.push_count(line.len() - sp);
            self.push_newline();
            return Some(State::Stream);
        }
        self.emit(DOCUMENT);
        self.parse_line_start()
    }

    fn parse_line_start(&mut self) -> Option<State> {
        let ch = self.char_at(0);
        if ch.is_none() && !self.at_end {
            return self.set_next(State::LineStart);
        }
        if ch == Some(b'-') || ch == Some(b'.') {
            if !self.at_end && !self.has_chars(4) {
                return self.set_next(State::LineStart);
            }
            let s = self.peek(3).to_string();
            if (s == "---" || s == "...") && is_empty(self.char_at(3)) {
                self.push_count(3);
                self.indent_value = 0;
                self.indent_next = 0;
                return Some(if s == "---" { State::Doc } else { State::Stream });
            }
        }
        self.indent_value = self.push_spaces(false);
        if self.indent_next > self.indent_value && !is_empty(self.char_at(1)) {
            self.indent_next = self.indent_value;
        }
        self.parse_block_start()
    }

    fn parse_block_start(&mut self) -> Option<State> {
        let ch0 = self.char_at(0);
        let ch1 = self.char_at(1);
        if ch1.is_none() && !self.at_end {
            return self.set_next(State::BlockStart);
        }
        if matches!(ch0, Some(b'-' | b'?' | b':')) && is_empty(ch1) {
            let n = self.push_count(1) + self.push_spaces(true);
            self.indent_next = self.indent_value + 1;
            self.indent_value += n;
            return self.parse_block_start();
        }
        Some(State::Doc)
    }

    fn parse_document(&mut self) -> Option<State> {
        self.push_spaces(true);
        let Some(line) = self.current_line() else {
            return self.set_next(State::Doc);
        };
        let mut n = self.push_indicators();
        match line.as_bytes().get(n).copied() {
            Some(b'#') => {
                self.push_count(line.len() - n);
                self.push_newline();
                self.parse_line_start()
            }
            None => {
                self.push_newline();
                self.parse_line_start()
            }
            Some(b'{' | b'[') => {
                self.push_count(1);
                self.flow_key = false;
                self.flow_level = 1;
                Some(State::Flow)
            }
            Some(b'}' | b']') => {
                // unmatched closing bracket; the parser reports it
                self.push_count(1);
                Some(State::Doc)
            }
            Some(b'*') => {
                self.push_until(is_not_anchor_char);
                Some(State::Doc)
            }
            Some(b'"' | b'\'') => self.parse_quoted_scalar(),
            Some(b'|' | b'>') => {
                n += self.parse_block_scalar_header();
                n += self.push_spaces(true);
                self.push_count(line.len().saturating_sub(n));
                self.push_newline();
                self.parse_block_scalar()
            }
            _ => self.parse_plain_scalar(),
        }
    }

    fn parse_flow_collection(&mut self) -> Option<State> {
        let mut indent: isize = -1;
        loop {
            if !self.at_end {
                // the indentation of the next line must be known in full
                let nl_len = match (self.char_at(0), self.char_at(1)) {
                    (Some(b'\n'), _) => 1,
                    (Some(b'\r'), Some(b'\n')) => 2,
                    _ => 0,
                };
                if nl_len > 0 && self.find(b'\n', self.pos + nl_len).is_none() {
                    return self.set_next(State::Flow);
                }
            }
            let nl = self.push_newline();
            let mut sp = 0;
            if nl > 0 {
                sp = self.push_spaces(false);
                self.indent_value = sp;
                indent = sp as isize;
            }
            sp += self.push_spaces(true);
            if nl + sp == 0 {
                break;
            }
        }
        let Some(line) = self.current_line() else {
            return self.set_next(State::Flow);
        };
        let lb = line.as_bytes();
        let first = lb.first().copied();
        if (indent != -1 && indent < self.indent_next as isize && first != Some(b'#'))
            || (indent == 0
                && (line.starts_with("---") || line.starts_with("..."))
                && is_empty(lb.get(3).copied()))
        {
            // A closing bracket at the same indent as the opening line is
            // tolerated.
            let at_flow_end_marker = indent == self.indent_next as isize - 1
                && self.flow_level == 1
                && (first == Some(b']') || first == Some(b'}'));
            if !at_flow_end_marker {
                self.flow_level = 0;
                self.emit(FLOW_END);
                return self.parse_line_start();
            }
        }
        let mut n = 0;
        while lb.get(n) == Some(&b',') {
            n += self.push_count(1);
            n += self.push_spaces(true);
            self.flow_key = false;
        }
        n += self.push_indicators();
        match lb.get(n).copied() {
            None => Some(State::Flow),
            Some(b'#') => {
                self.push_count(line.len() - n);
                Some(State::Flow)
            }
            Some(b'{' | b'[') => {
                self.push_count(1);
                self.flow_key = false;
                self.flow_level += 1;
                Some(State::Flow)
            }
            Some(b'}' | b']') => {
                self.push_count(1);
                self.flow_key = true;
                self.flow_level = self.flow_level.saturating_sub(1);
                Some(if self.flow_level > 0 {
                    State::Flow
                } else {
                    State::Doc
                })
            }
            Some(b'*') => {
                self.push_until(is_not_anchor_char);
                Some(State::Flow)
            }
            Some(b'"' | b'\'') => {
                self.flow_key = true;
                self.parse_quoted_scalar()
            }
            Some(b':') => {
                let next = self.char_at(1);
                if self.flow_key || is_empty(next) || next == Some(b',') {
                    self.flow_key = false;
                    self.push_count(1);
                    self.push_spaces(true);
                    return Some(State::Flow);
                }
                self.flow_key = false;
                self.parse_plain_scalar()
            }
            _ => {
                self.flow_key = false;
                self.parse_plain_scalar()
            }
        }
    }

    fn parse_quoted_scalar(&mut self) -> Option<State> {
        let quote = self.char_at(0).unwrap_or(b'"');
        let mut end = self.find(quote, self.pos + 1);
        if quote == b'\'' {
            while let Some(e) = end {
                if self.ch(e + 1) != Some(b'\'') {
                    break;
                }
                end = self.find(b'\'', e + 2);
            }
        } else {
            while let Some(e) = end {
                let mut n = 0;
                while e > n && self.ch(e - 1 - n) == Some(b'\\') {
                    n += 1;
                }
                if n % 2 == 0 {
                    break;
                }
                end = self.find(b'"', e + 1);
            }
        }
        // Only newlines within the quotes matter here.
        if let Some(e) = end {
            let mut nl = self.find_before(b'\n', self.pos, e);
            while let Some(n) = nl {
                match self.continue_scalar(n + 1) {
                    None => break,
                    Some(cs) => nl = self.find_before(b'\n', cs, e),
                }
            }
            if let Some(n) = nl {
                // unexpected dedent; the scalar ends before this line
                let back = if self.ch(n - 1) == Some(b'\r') { 2 } else { 1 };
                end = Some(n - back);
            }
        }
        let end = match end {
            Some(e) => e,
            None => {
                if !self.at_end {
                    return self.set_next(State::QuotedScalar);
                }
                self.buffer.len()
            }
        };
        self.push_to_index(end + 1, false);
        Some(if self.flow_level > 0 {
            State::Flow
        } else {
            State::Doc
        })
    }

    fn parse_block_scalar_header(&mut self) -> usize {
        self.block_scalar_indent = None;
        self.block_scalar_keep = false;
        self.block_scalar_base = None;
        let mut i = self.pos;
        loop {
            i += 1;
            match self.ch(i) {
                Some(b'+') => self.block_scalar_keep = true,
                Some(c @ b'1'..=b'9') => self.block_scalar_indent = Some((c - b'1') as usize),
                Some(b'-') => {}
                _ => break,
            }
        }
        self.push_until(|ch| is_empty(ch) || ch == Some(b'#'))
    }

    fn parse_block_scalar(&mut self) -> Option<State> {
        let mut nl: isize = self.pos as isize - 1;
        let mut indent = 0;
        let mut i = self.pos;
        let mut ch;
        loop {
            ch = self.ch(i);
            match ch {
                Some(b' ') => indent += 1,
                Some(b'\n') => {
                    nl = i as isize;
                    indent = 0;
                }
                Some(b'\r') => {
                    let next = self.ch(i + 1);
                    if next.is_none() && !self.at_end {
                        return self.set_next(State::BlockScalar);
                    }
                    if next != Some(b'\n') {
                        break;
                    }
                }
                _ => break,
            }
            i += 1;
        }
        if ch.is_none() && !self.at_end {
            return self.set_next(State::BlockScalar);
        }
        let base = *self.block_scalar_base.get_or_insert(self.indent_next);
        if indent >= base {
            self.indent_next = match self.block_scalar_indent {
                None => indent,
                Some(explicit) => explicit + if base == 0 { 1 } else { base },
            };
            loop {
                let Some(cs) = self.continue_scalar((nl + 1) as usize) else {
                    break;
                };
                match self.find(b'\n', cs) {
                    Some(n) => nl = n as isize,
                    None => {
                        nl = -1;
                        break;
                    }
                }
            }
            if nl == -1 {
                if !self.at_end {
                    return self.set_next(State::BlockScalar);
                }
                nl = self.buffer.len() as isize;
            }
        }

        // A tab right after the body's indentation is taken into the body,
        // where the composer reports it.
        let mut i = (nl + 1) as usize;
        let mut ch = self.ch(i);
        while ch == Some(b' ') {
            i += 1;
            ch = self.ch(i);
        }
        if ch == Some(b'\t') {
            while matches!(ch, Some(b'\t' | b' ' | b'\r' | b'\n')) {
                i += 1;
                ch = self.ch(i);
            }
            nl = i as isize - 1;
        } else if !self.block_scalar_keep {
            // Drop trailing lines that are not more indented than the body.
            loop {
                let mut i = nl - 1;
                let mut ch = self.chi(i);
                if ch == Some(b'\r') {
                    i -= 1;
                    ch = self.chi(i);
                }
                let last_char = i;
                while ch == Some(b' ') {
                    i -= 1;
                    ch = self.chi(i);
                }
                if ch == Some(b'\n') && i >= self.pos as isize && i + 1 + indent as isize > last_char
                {
                    nl = i;
                } else {
                    break;
                }
            }
        }
        self.emit(SCALAR);
        self.push_to_index((nl + 1) as usize, true);
        self.parse_line_start()
    }

    fn parse_plain_scalar(&mut self) -> Option<State> {
        let in_flow = self.flow_level > 0;
        let mut end: isize = self.pos as isize - 1;
        let mut i: isize = self.pos as isize - 1;
        let mut ch;
        loop {
            i += 1;
            ch = self.chi(i);
            let Some(c) = ch else { break };
            if c == b':' {
                let next = self.chi(i + 1);
                if is_empty(next) || (in_flow && is_flow_indicator(next)) {
                    break;
                }
                end = i;
            } else if is_empty(Some(c)) {
                let mut c = c;
                let mut next = self.chi(i + 1);
                if c == b'\r' {
                    if next == Some(b'\n') {
                        i += 1;
                        c = b'\n';
                        next = self.chi(i + 1);
                    } else {
                        end = i;
                    }
                }
                if next == Some(b'#') || (in_flow && is_flow_indicator(next)) {
                    break;
                }
                if c == b'\n' {
                    match self.continue_scalar((i + 1) as usize) {
                        None => break,
                        // still account for a following ' #'
                        Some(cs) => i = i.max(cs as isize - 2),
                    }
                }
            } else {
                if in_flow && is_flow_indicator(Some(c)) {
                    break;
                }
                end = i;
            }
        }
        if ch.is_none() && !self.at_end {
            return self.set_next(State::PlainScalar);
        }
        self.emit(SCALAR);
        self.push_to_index((end + 1) as usize, true);
        Some(if in_flow { State::Flow } else { State::Doc })
    }

    fn push_count(&mut self, n: usize) -> usize {
        if n > 0 {
            let end = (self.pos + n).min(self.buffer.len());
            let s = self.buffer[self.pos..end].to_string();
            self.queue.push_back(s);
            self.pos = end;
            return n;
        }
        0
    }

    fn push_to_index(&mut self, i: usize, allow_empty: bool) -> usize {
        let i = i.min(self.buffer.len());
        if i > self.pos {
            let s = self.buffer[self.pos..i].to_string();
            let len = s.len();
            self.queue.push_back(s);
            self.pos += len;
            return len;
        }
        if allow_empty {
            self.queue.push_back(String::new());
        }
        0
    }

    fn push_indicators(&mut self) -> usize {
        match self.char_at(0) {
            Some(b'!') => self.push_tag() + self.push_spaces(true) + self.push_indicators(),
            Some(b'&') => {
                self.push_until(is_not_anchor_char) + self.push_spaces(true) + self.push_indicators()
            }
            // '-' is an error here, '?' is one outside flow collections
            Some(b'-' | b'?' | b':') => {
                let in_flow = self.flow_level > 0;
                let ch1 = self.char_at(1);
                if is_empty(ch1) || (in_flow && is_flow_indicator(ch1)) {
                    if !in_flow {
                        self.indent_next = self.indent_value + 1;
                    } else if self.flow_key {
                        self.flow_key = false;
                    }
                    self.push_count(1) + self.push_spaces(true) + self.push_indicators()
                } else {
                    0
                }
            }
            _ => 0,
        }
    }

    fn push_tag(&mut self) -> usize {
        if self.char_at(1) == Some(b'<') {
            let mut i = self.pos + 2;
            let mut ch = self.ch(i);
            while !is_empty(ch) && ch != Some(b'>') {
                i += 1;
                ch = self.ch(i);
            }
            let end = if ch == Some(b'>') { i + 1 } else { i };
            self.push_to_index(end, false)
        } else {
            let mut i = self.pos + 1;
            let mut ch = self.ch(i);
            while let Some(c) = ch {
                if is_tag_char(c) {
                    i += 1;
                } else if c == b'%' && is_hex(self.ch(i + 1)) && is_hex(self.ch(i + 2)) {
                    i += 3;
                } else {
                    break;
                }
                ch = self.ch(i);
            }
            self.push_to_index(i, false)
        }
    }

    fn push_newline(&mut self) -> usize {
        match self.char_at(0) {
            Some(b'\n') => self.push_count(1),
            Some(b'\r') if self.char_at(1) == Some(b'\n') => self.push_count(2),
            _ => 0,
        }
    }

    fn push_spaces(&mut self, allow_tabs: bool) -> usize {
        let mut i = self.pos;
        while let Some(c) = self.ch(i) {
            if c == b' ' || (allow_tabs && c == b'\t') {
                i += 1;
            } else {
                break;
            }
        }
        let n = i - self.pos;
        if n > 0 {
            let s = self.buffer[self.pos..i].to_string();
            self.queue.push_back(s);
            self.pos = i;
        }
        n
    }

    fn push_until(&mut self, test: fn(Option<u8>) -> bool) -> usize {
        let mut i = self.pos;
        while !test(self.ch(i)) {
            i += 1;
        }
        self.push_to_index(i, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<String> {
        Lexer::lex_all(src)
    }

    #[test]
    fn test_simple_mapping() {
        assert_eq!(
            lex("a: 1\n"),
            vec![DOCUMENT, SCALAR, "a", ":", " ", SCALAR, "1", "\n"]
        );
    }

    #[test]
    fn test_sequence_indicators() {
        assert_eq!(
            lex("- one\n- two\n"),
            vec![DOCUMENT, "-", " ", SCALAR, "one", "\n", "-", " ", SCALAR, "two", "\n"]
        );
    }

    #[test]
    fn test_directive_and_doc_markers() {
        assert_eq!(
            lex("%YAML 1.2 # v\n---\nfoo\n...\n"),
            vec![
                "%YAML 1.2", " ", "# v", "\n", DOCUMENT, "---", "\n", SCALAR, "foo", "\n", "...",
                "\n"
            ]
        );
    }

    #[test]
    fn test_flow_collection() {
        assert_eq!(
            lex("[a, {b: c}]\n"),
            vec![
                DOCUMENT, "[", SCALAR, "a", ",", " ", "{", SCALAR, "b", ":", " ", SCALAR, "c",
                "}", "]", "\n"
            ]
        );
    }

    #[test]
    fn test_quoted_scalars() {
        assert_eq!(
            lex("\"a\\\"b\": 'it''s'\n"),
            vec![DOCUMENT, "\"a\\\"b\"", ":", " ", "'it''s'", "\n"]
        );
    }

    #[test]
    fn test_unterminated_quote_runs_to_end() {
        assert_eq!(lex("\"abc"), vec![DOCUMENT, "\"abc"]);
    }

    #[test]
    fn test_block_scalar_chomping_bodies() {
        assert_eq!(
            lex("|+\nblock\n\n"),
            vec![DOCUMENT, "|+", "\n", SCALAR, "block\n\n"]
        );
        assert_eq!(lex("|-\nblock\n\n"), vec![DOCUMENT, "|-", "\n", SCALAR, "block\n", "\n"]);
        assert_eq!(lex("|\nblock\n\n"), vec![DOCUMENT, "|", "\n", SCALAR, "block\n", "\n"]);
    }

    #[test]
    fn test_block_scalar_tab_quirk() {
        // the tab leading the dedented line is captured into the body
        assert_eq!(
            lex("a: |\n  x\n\tz\n"),
            vec![
                DOCUMENT, SCALAR, "a", ":", " ", "|", "\n", SCALAR, "  x\n\t", SCALAR, "z", "\n"
            ]
        );
    }

    #[test]
    fn test_plain_scalar_stops_at_comment() {
        assert_eq!(
            lex("a b # c\n"),
            vec![DOCUMENT, SCALAR, "a b", " ", "# c", "\n"]
        );
    }

    #[test]
    fn test_multiline_plain_scalar() {
        assert_eq!(
            lex("a: b\n  c\nd: e\n"),
            vec![
                DOCUMENT, SCALAR, "a", ":", " ", SCALAR, "b\n  c", "\n", SCALAR, "d", ":", " ",
                SCALAR, "e", "\n"
            ]
        );
    }

    #[test]
    fn test_tags_and_anchors() {
        assert_eq!(
            lex("!!str &x foo\n"),
            vec![DOCUMENT, "!!str", " ", "&x", " ", SCALAR, "foo", "\n"]
        );
    }

    #[test]
    fn test_explicit_indent_across_calls() {
        for src in ["|2\n    \n  x\n", ">2\n   a\n  b\n", "k: |1\n  x\n"] {
            let whole = lex(src);
            let mut lexer = Lexer::new();
            let mut tokens: Vec<String> = lexer.lex(src, true).collect();
            tokens.extend(lexer.lex("", false));
            assert_eq!(tokens, whole, "source {:?}", src);
        }
        assert_eq!(
            lex("|2\n    \n  x\n"),
            vec![DOCUMENT, "|2", "\n", SCALAR, "    \n  x\n"]
        );
    }

    #[test]
    fn test_chunked_input_matches_whole() {
        let src = "a: 1\nb:\n  - \"two\n  three\"\n  - |\n    four\n";
        let whole = lex(src);
        for split in 1..src.len() {
            let mut lexer = Lexer::new();
            let mut tokens: Vec<String> = lexer.lex(&src[..split], true).collect();
            tokens.extend(lexer.lex(&src[split..], false));
            assert_eq!(tokens, whole, "split at {}", split);
        }
    }
}
