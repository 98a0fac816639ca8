//! Phase 2: Scanner
//!
//! The scanner converts the reader's character stream into tokens. It performs:
//! - Indentation tracking with an explicit stack, emitting block start/end
//!   tokens when the column rises above or falls below the open levels
//! - Simple key detection (a key without `?` is only known to be a key once
//!   its `:` is seen, so a `Key` token is inserted back into the queue)
//! - Flow nesting, where indentation is not significant
//! - Scalar scanning in all five styles, including escapes and line folding
//! - Directive, anchor, alias and tag scanning
//!
//! Tokens are produced lazily. The queue only grows past the next token while
//! a pending simple key may still need a `Key` inserted before it.

use crate::error::{Error, Result};
use crate::event::ScalarStyle;
use crate::reader::{Mark, Reader};
use crate::token::{Token, TokenKind};
use std::collections::VecDeque;
use std::io::Read;
use tracing::trace;

/// Longest simple key, in characters.
const MAX_SIMPLE_KEY_LENGTH: usize = 1024;

/// A position where a simple key could start.
#[derive(Clone, Copy, Debug, Default)]
struct SimpleKey {
    possible: bool,
    required: bool,
    token_number: usize,
    mark: Mark,
}

fn is_blank(ch: char) -> bool {
    ch == ' ' || ch == '\t'
}

fn is_break(ch: char) -> bool {
    ch == '\n'
}

fn is_flow_indicator(ch: char) -> bool {
    matches!(ch, ',' | '[' | ']' | '{' | '}')
}

fn is_anchor_char(ch: char) -> bool {
    !is_blank(ch) && !is_break(ch) && !is_flow_indicator(ch) && ch != '\0'
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

fn is_uri_char(ch: char, flow_chars: bool) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '-' | '_' | ';' | '/' | '?' | ':' | '@' | '&' | '=' | '+' | '$' | '.' | '%' | '!'
                | '~' | '*' | '\'' | '(' | ')' | '#'
        )
        || (flow_chars && is_flow_indicator(ch))
}

/// Pull-based tokenizer over a [`Reader`].
pub(crate) struct Scanner<R> {
    reader: Reader<R>,
    tokens: VecDeque<Token>,
    tokens_parsed: usize,
    token_available: bool,
    stream_start_produced: bool,
    stream_end_produced: bool,
    /// Current block indentation column; -1 before the first block node.
    indent: isize,
    indents: Vec<isize>,
    flow_level: usize,
    simple_key_allowed: bool,
    /// One entry per flow level, plus one for block context.
    simple_keys: Vec<SimpleKey>,
    /// Byte offset right after a JSON-like node, where `:` may follow
    /// without a space inside flow collections.
    adjacent_value_at: Option<usize>,
    failure: Option<Error>,
}

impl<R: Read> Scanner<R> {
    pub fn new(reader: Reader<R>) -> Self {
        Self {
            reader,
            tokens: VecDeque::new(),
            tokens_parsed: 0,
            token_available: false,
            stream_start_produced: false,
            stream_end_produced: false,
            indent: -1,
            indents: Vec::new(),
            flow_level: 0,
            simple_key_allowed: false,
            simple_keys: Vec::new(),
            adjacent_value_at: None,
            failure: None,
        }
    }

    /// Position of the next unread character.
    pub fn mark(&self) -> Mark {
        self.reader.mark()
    }

    pub fn reader(&self) -> &Reader<R> {
        &self.reader
    }

    /// Look at the next token without consuming it.
    pub fn peek_token(&mut self) -> Result<&Token> {
        self.ensure_token()?;
        match self.tokens.front() {
            Some(token) => Ok(token),
            None => Err(self.error(self.mark(), "no more tokens after the stream end")),
        }
    }

    /// Consume the token returned by the last `peek_token`.
    pub fn skip_token(&mut self) {
        if let Some(token) = self.tokens.pop_front() {
            trace!("Token {} at {}", token.kind.describe(), token.start);
            self.token_available = false;
            self.tokens_parsed += 1;
            if token.kind == TokenKind::StreamEnd {
                self.stream_end_produced = true;
            }
        }
    }

    /// Take the next token, or `None` once the stream end has been taken.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        if self.stream_end_produced {
            return Ok(None);
        }
        self.ensure_token()?;
        let token = self.tokens.pop_front();
        if let Some(token) = &token {
            trace!("Token {} at {}", token.kind.describe(), token.start);
            self.token_available = false;
            self.tokens_parsed += 1;
            if token.kind == TokenKind::StreamEnd {
                self.stream_end_produced = true;
            }
        }
        Ok(token)
    }

    fn ensure_token(&mut self) -> Result<()> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if !self.token_available {
            if let Err(err) = self.fetch_more_tokens() {
                self.failure = Some(err.clone());
                return Err(err);
            }
        }
        Ok(())
    }

    // ========================================================================
    // Character access
    // ========================================================================

    fn cache(&mut self, n: usize) -> Result<()> {
        self.reader.fill(n)
    }

    fn ch(&self) -> char {
        self.reader.peek(0)
    }

    fn look(&self, i: usize) -> char {
        self.reader.peek(i)
    }

    fn is_end(&self) -> bool {
        self.reader.is_end(0)
    }

    fn is_breakz_at(&self, i: usize) -> bool {
        is_break(self.look(i)) || self.reader.is_end(i)
    }

    fn is_blankz_at(&self, i: usize) -> bool {
        is_blank(self.look(i)) || self.is_breakz_at(i)
    }

    fn column(&self) -> usize {
        self.reader.mark().column
    }

    fn skip(&mut self) {
        self.reader.skip();
    }

    fn skip_line(&mut self) {
        if is_break(self.ch()) {
            self.reader.skip();
        }
    }

    fn error(&self, mark: Mark, message: impl Into<String>) -> Error {
        Error::scan(self.reader.ctx(), mark, message)
    }

    fn context_error(&self, mark: Mark, context: &str, problem: &str) -> Error {
        self.error(mark, format!("{}, {}", context, problem))
    }

    // ========================================================================
    // Token queue
    // ========================================================================

    fn fetch_more_tokens(&mut self) -> Result<()> {
        loop {
            let mut need_more = self.tokens.is_empty();
            if !need_more {
                self.stale_simple_keys()?;
                need_more = self
                    .simple_keys
                    .iter()
                    .any(|key| key.possible && key.token_number == self.tokens_parsed);
            }
            if !need_more {
                break;
            }
            self.fetch_next_token()?;
        }
        self.token_available = true;
        Ok(())
    }

    fn fetch_next_token(&mut self) -> Result<()> {
        self.cache(1)?;
        if !self.stream_start_produced {
            return self.fetch_stream_start();
        }

        self.scan_to_next_token()?;
        self.stale_simple_keys()?;
        self.unroll_indent(self.column() as isize);

        self.cache(4)?;
        if self.is_end() {
            return self.fetch_stream_end();
        }

        let ch = self.ch();
        if self.column() == 0 {
            if ch == '%' {
                return self.fetch_directive();
            }
            if self.is_document_indicator('-') {
                return self.fetch_document_indicator(TokenKind::DocumentStart);
            }
            if self.is_document_indicator('.') {
                return self.fetch_document_indicator(TokenKind::DocumentEnd);
            }
        }

        let next = self.look(1);
        let in_flow = self.flow_level > 0;
        match ch {
            '[' => self.fetch_flow_collection_start(TokenKind::FlowSequenceStart),
            '{' => self.fetch_flow_collection_start(TokenKind::FlowMappingStart),
            ']' => self.fetch_flow_collection_end(TokenKind::FlowSequenceEnd),
            '}' => self.fetch_flow_collection_end(TokenKind::FlowMappingEnd),
            ',' => self.fetch_flow_entry(),
            '-' if self.is_blankz_at(1) => self.fetch_block_entry(),
            '?' if in_flow || self.is_blankz_at(1) => self.fetch_key(),
            ':' if self.is_blankz_at(1)
                || (in_flow
                    && (is_flow_indicator(next)
                        || self.adjacent_value_at == Some(self.mark().index))) =>
            {
                self.fetch_value()
            }
            '*' => self.fetch_anchor(true),
            '&' => self.fetch_anchor(false),
            '!' => self.fetch_tag(),
            '|' if !in_flow => self.fetch_block_scalar(ScalarStyle::Literal),
            '>' if !in_flow => self.fetch_block_scalar(ScalarStyle::Folded),
            '\'' => self.fetch_flow_scalar(ScalarStyle::SingleQuoted),
            '"' => self.fetch_flow_scalar(ScalarStyle::DoubleQuoted),
            _ if self.can_start_plain() => self.fetch_plain_scalar(),
            _ => Err(self.context_error(
                self.mark(),
                "while scanning for the next token",
                "found character that cannot start any token",
            )),
        }
    }

    fn can_start_plain(&self) -> bool {
        let ch = self.ch();
        let next = self.look(1);
        let indicator = matches!(
            ch,
            '-' | '?' | ':' | ',' | '[' | ']' | '{' | '}' | '#' | '&' | '*' | '!' | '|' | '>'
                | '\'' | '"' | '%' | '@' | '`'
        );
        if !self.is_blankz_at(0) && !indicator {
            return true;
        }
        match ch {
            '-' => !self.is_blankz_at(1),
            '?' | ':' => {
                !self.is_blankz_at(1) && (self.flow_level == 0 || !is_flow_indicator(next))
            }
            _ => false,
        }
    }

    fn is_document_indicator(&self, ch: char) -> bool {
        self.column() == 0
            && self.look(0) == ch
            && self.look(1) == ch
            && self.look(2) == ch
            && self.is_blankz_at(3)
    }

    fn push_token(&mut self, kind: TokenKind, start: Mark, end: Mark) {
        self.tokens.push_back(Token::new(kind, start, end));
    }

    /// Skip whitespace, comments and line breaks up to the next token.
    fn scan_to_next_token(&mut self) -> Result<()> {
        loop {
            self.cache(1)?;
            let leading = self.column() == 0;
            let mut indent_tab = None;
            loop {
                match self.ch() {
                    ' ' => {}
                    '\t' => {
                        if leading && self.flow_level == 0 && indent_tab.is_none() {
                            indent_tab = Some(self.mark());
                        }
                    }
                    _ => break,
                }
                self.skip();
                self.cache(1)?;
            }
            if self.ch() == '#' {
                while !self.is_breakz_at(0) {
                    self.skip();
                    self.cache(1)?;
                }
            }
            if is_break(self.ch()) {
                self.cache(2)?;
                self.skip_line();
                if self.flow_level == 0 {
                    self.simple_key_allowed = true;
                }
                continue;
            }
            if let Some(mark) = indent_tab {
                if !self.is_end() {
                    return Err(self.context_error(
                        mark,
                        "while scanning for the next token",
                        "found a tab character where an indentation space is expected",
                    ));
                }
            }
            return Ok(());
        }
    }

    // ========================================================================
    // Simple keys and indentation
    // ========================================================================

    fn stale_simple_keys(&mut self) -> Result<()> {
        let mark = self.mark();
        for i in 0..self.simple_keys.len() {
            let key = self.simple_keys[i];
            if key.possible
                && (key.mark.line < mark.line
                    || key.mark.column + MAX_SIMPLE_KEY_LENGTH < mark.column)
            {
                if key.required {
                    return Err(self.context_error(
                        key.mark,
                        "while scanning a simple key",
                        "could not find expected ':'",
                    ));
                }
                self.simple_keys[i].possible = false;
            }
        }
        Ok(())
    }

    fn save_simple_key(&mut self) -> Result<()> {
        let required = self.flow_level == 0 && self.indent == self.column() as isize;
        if self.simple_key_allowed {
            self.remove_simple_key()?;
            let key = SimpleKey {
                possible: true,
                required,
                token_number: self.tokens_parsed + self.tokens.len(),
                mark: self.mark(),
            };
            if let Some(last) = self.simple_keys.last_mut() {
                *last = key;
            }
        }
        Ok(())
    }

    fn remove_simple_key(&mut self) -> Result<()> {
        if let Some(key) = self.simple_keys.last().copied() {
            if key.possible && key.required {
                return Err(self.context_error(
                    key.mark,
                    "while scanning a simple key",
                    "could not find expected ':'",
                ));
            }
        }
        if let Some(last) = self.simple_keys.last_mut() {
            last.possible = false;
        }
        Ok(())
    }

    fn increase_flow_level(&mut self) {
        self.simple_keys.push(SimpleKey::default());
        self.flow_level += 1;
    }

    fn decrease_flow_level(&mut self) {
        if self.flow_level > 0 {
            self.flow_level -= 1;
            self.simple_keys.pop();
        }
    }

    /// Open a block collection if `column` is deeper than the current level.
    /// With `number`, the start token is inserted before that queued token.
    fn roll_indent(&mut self, column: usize, number: Option<usize>, kind: TokenKind, mark: Mark) {
        if self.flow_level > 0 {
            return;
        }
        let column = column as isize;
        if self.indent < column {
            self.indents.push(self.indent);
            self.indent = column;
            let token = Token::new(kind, mark, mark);
            match number {
                Some(n) => self.tokens.insert(n - self.tokens_parsed, token),
                None => self.tokens.push_back(token),
            }
        }
    }

    /// Close every block collection deeper than `column`.
    fn unroll_indent(&mut self, column: isize) {
        if self.flow_level > 0 {
            return;
        }
        let mark = self.mark();
        while self.indent > column {
            self.push_token(TokenKind::BlockEnd, mark, mark);
            self.indent = self.indents.pop().unwrap_or(-1);
        }
    }

    // ========================================================================
    // Indicators
    // ========================================================================

    fn fetch_stream_start(&mut self) -> Result<()> {
        let encoding = self.reader.encoding()?;
        let mark = self.mark();
        self.indent = -1;
        self.simple_key_allowed = true;
        self.simple_keys.push(SimpleKey::default());
        self.stream_start_produced = true;
        self.push_token(TokenKind::StreamStart(encoding), mark, mark);
        Ok(())
    }

    fn fetch_stream_end(&mut self) -> Result<()> {
        self.unroll_indent(-1);
        // No key at any flow level can get its ':' anymore.
        for i in 0..self.simple_keys.len() {
            let key = self.simple_keys[i];
            if key.possible && key.required {
                return Err(self.context_error(
                    key.mark,
                    "while scanning a simple key",
                    "could not find expected ':'",
                ));
            }
            self.simple_keys[i].possible = false;
        }
        self.simple_key_allowed = false;
        let mark = self.mark();
        self.push_token(TokenKind::StreamEnd, mark, mark);
        Ok(())
    }

    fn fetch_directive(&mut self) -> Result<()> {
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        if let Some(token) = self.scan_directive()? {
            self.tokens.push_back(token);
        }
        Ok(())
    }

    fn fetch_document_indicator(&mut self, kind: TokenKind) -> Result<()> {
        self.unroll_indent(-1);
        self.remove_simple_key()?;
        self.simple_key_allowed = false;
        let start = self.mark();
        self.skip();
        self.skip();
        self.skip();
        self.push_token(kind, start, self.mark());
        Ok(())
    }

    fn fetch_flow_collection_start(&mut self, kind: TokenKind) -> Result<()> {
        self.save_simple_key()?;
        self.increase_flow_level();
        self.simple_key_allowed = true;
        let start = self.mark();
        self.skip();
        self.push_token(kind, start, self.mark());
        Ok(())
    }

    fn fetch_flow_collection_end(&mut self, kind: TokenKind) -> Result<()> {
        self.remove_simple_key()?;
        self.decrease_flow_level();
        self.simple_key_allowed = false;
        let start = self.mark();
        self.skip();
        let end = self.mark();
        self.adjacent_value_at = Some(end.index);
        self.push_token(kind, start, end);
        Ok(())
    }

    fn fetch_flow_entry(&mut self) -> Result<()> {
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let start = self.mark();
        self.skip();
        self.push_token(TokenKind::FlowEntry, start, self.mark());
        Ok(())
    }

    fn fetch_block_entry(&mut self) -> Result<()> {
        if self.flow_level == 0 {
            if !self.simple_key_allowed {
                return Err(self.error(
                    self.mark(),
                    "block sequence entries are not allowed in this context",
                ));
            }
            let mark = self.mark();
            self.roll_indent(mark.column, None, TokenKind::BlockSequenceStart, mark);
        }
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let start = self.mark();
        self.skip();
        self.push_token(TokenKind::BlockEntry, start, self.mark());
        Ok(())
    }

    fn fetch_key(&mut self) -> Result<()> {
        if self.flow_level == 0 {
            if !self.simple_key_allowed {
                return Err(self.error(self.mark(), "mapping keys are not allowed in this context"));
            }
            let mark = self.mark();
            self.roll_indent(mark.column, None, TokenKind::BlockMappingStart, mark);
        }
        self.remove_simple_key()?;
        self.simple_key_allowed = self.flow_level == 0;
        let start = self.mark();
        self.skip();
        self.push_token(TokenKind::Key, start, self.mark());
        Ok(())
    }

    fn fetch_value(&mut self) -> Result<()> {
        let key = self.simple_keys.last().copied().unwrap_or_default();
        if key.possible {
            let token = Token::new(TokenKind::Key, key.mark, key.mark);
            self.tokens.insert(key.token_number - self.tokens_parsed, token);
            self.roll_indent(
                key.mark.column,
                Some(key.token_number),
                TokenKind::BlockMappingStart,
                key.mark,
            );
            if let Some(last) = self.simple_keys.last_mut() {
                last.possible = false;
            }
            self.simple_key_allowed = false;
        } else {
            if self.flow_level == 0 {
                if !self.simple_key_allowed {
                    return Err(
                        self.error(self.mark(), "mapping values are not allowed in this context")
                    );
                }
                let mark = self.mark();
                self.roll_indent(mark.column, None, TokenKind::BlockMappingStart, mark);
            }
            self.simple_key_allowed = self.flow_level == 0;
        }
        let start = self.mark();
        self.skip();
        self.push_token(TokenKind::Value, start, self.mark());
        Ok(())
    }

    fn fetch_anchor(&mut self, alias: bool) -> Result<()> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_anchor(alias)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_tag(&mut self) -> Result<()> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_tag()?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_block_scalar(&mut self, style: ScalarStyle) -> Result<()> {
        self.remove_simple_key()?;
        self.simple_key_allowed = true;
        let token = self.scan_block_scalar(style)?;
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_flow_scalar(&mut self, style: ScalarStyle) -> Result<()> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let token = self.scan_flow_scalar(style)?;
        if self.flow_level > 0 {
            self.adjacent_value_at = Some(token.end.index);
        }
        self.tokens.push_back(token);
        Ok(())
    }

    fn fetch_plain_scalar(&mut self) -> Result<()> {
        self.save_simple_key()?;
        self.simple_key_allowed = false;
        let (token, leading_blanks) = self.scan_plain_scalar()?;
        if leading_blanks {
            self.simple_key_allowed = true;
        }
        self.tokens.push_back(token);
        Ok(())
    }

    // ========================================================================
    // Directives
    // ========================================================================

    fn scan_directive(&mut self) -> Result<Option<Token>> {
        let start = self.mark();
        self.skip();
        let name = self.scan_directive_name(start)?;
        let token = match name.as_str() {
            "YAML" => {
                let (major, minor) = self.scan_version_directive_value()?;
                Some(Token::new(TokenKind::VersionDirective(major, minor), start, self.mark()))
            }
            "TAG" => {
                let (handle, prefix) = self.scan_tag_directive_value(start)?;
                Some(Token::new(TokenKind::TagDirective { handle, prefix }, start, self.mark()))
            }
            _ => {
                trace!("Skipping unknown directive %{} at {}", name, start);
                self.cache(1)?;
                while !self.is_breakz_at(0) {
                    self.skip();
                    self.cache(1)?;
                }
                None
            }
        };

        self.cache(1)?;
        while is_blank(self.ch()) {
            self.skip();
            self.cache(1)?;
        }
        if self.ch() == '#' {
            while !self.is_breakz_at(0) {
                self.skip();
                self.cache(1)?;
            }
        }
        if !self.is_breakz_at(0) {
            return Err(self.context_error(
                self.mark(),
                "while scanning a directive",
                "did not find expected comment or line break",
            ));
        }
        self.skip_line();
        Ok(token)
    }

    fn scan_directive_name(&mut self, start: Mark) -> Result<String> {
        let mut name = String::new();
        self.cache(1)?;
        while is_word_char(self.ch()) {
            name.push(self.ch());
            self.skip();
            self.cache(1)?;
        }
        if name.is_empty() {
            return Err(self.context_error(
                start,
                "while scanning a directive",
                "could not find expected directive name",
            ));
        }
        if !self.is_blankz_at(0) {
            return Err(self.context_error(
                self.mark(),
                "while scanning a directive",
                "found unexpected non-alphabetical character",
            ));
        }
        Ok(name)
    }

    fn skip_blanks(&mut self) -> Result<()> {
        self.cache(1)?;
        while is_blank(self.ch()) {
            self.skip();
            self.cache(1)?;
        }
        Ok(())
    }

    fn scan_version_directive_value(&mut self) -> Result<(u32, u32)> {
        self.skip_blanks()?;
        let major = self.scan_version_number()?;
        if self.ch() != '.' {
            return Err(self.context_error(
                self.mark(),
                "while scanning a %YAML directive",
                "did not find expected digit or '.' character",
            ));
        }
        self.skip();
        let minor = self.scan_version_number()?;
        Ok((major, minor))
    }

    fn scan_version_number(&mut self) -> Result<u32> {
        let mut value: u32 = 0;
        let mut length = 0;
        self.cache(1)?;
        while let Some(digit) = self.ch().to_digit(10) {
            length += 1;
            if length > 9 {
                return Err(self.context_error(
                    self.mark(),
                    "while scanning a %YAML directive",
                    "found extremely long version number",
                ));
            }
            value = value * 10 + digit;
            self.skip();
            self.cache(1)?;
        }
        if length == 0 {
            return Err(self.context_error(
                self.mark(),
                "while scanning a %YAML directive",
                "did not find expected version number",
            ));
        }
        Ok(value)
    }

    fn scan_tag_directive_value(&mut self, start: Mark) -> Result<(String, String)> {
        self.skip_blanks()?;
        let handle = self.scan_tag_handle(true, start)?;
        self.cache(1)?;
        if !is_blank(self.ch()) {
            return Err(self.context_error(
                self.mark(),
                "while scanning a %TAG directive",
                "did not find expected whitespace",
            ));
        }
        self.skip_blanks()?;
        let prefix = self.scan_tag_uri(true, None, start)?;
        self.cache(1)?;
        if !self.is_blankz_at(0) {
            return Err(self.context_error(
                self.mark(),
                "while scanning a %TAG directive",
                "did not find expected whitespace or line break",
            ));
        }
        Ok((handle, prefix))
    }

    // ========================================================================
    // Anchors and tags
    // ========================================================================

    fn scan_anchor(&mut self, alias: bool) -> Result<Token> {
        let start = self.mark();
        self.skip();
        let mut name = String::new();
        self.cache(1)?;
        while is_anchor_char(self.ch()) && !self.is_end() {
            name.push(self.ch());
            self.skip();
            self.cache(1)?;
        }
        if name.is_empty() {
            let context = if alias {
                "while scanning an alias"
            } else {
                "while scanning an anchor"
            };
            return Err(self.context_error(
                start,
                context,
                "did not find expected alphabetic or numeric character",
            ));
        }
        let kind = if alias {
            TokenKind::Alias(name)
        } else {
            TokenKind::Anchor(name)
        };
        Ok(Token::new(kind, start, self.mark()))
    }

    fn scan_tag(&mut self) -> Result<Token> {
        let start = self.mark();
        self.cache(2)?;
        let (handle, suffix) = if self.look(1) == '<' {
            self.skip();
            self.skip();
            let suffix = self.scan_tag_uri(true, None, start)?;
            if self.ch() != '>' {
                return Err(self.context_error(
                    self.mark(),
                    "while scanning a tag",
                    "did not find the expected '>'",
                ));
            }
            self.skip();
            (String::new(), suffix)
        } else {
            let handle = self.scan_tag_handle(false, start)?;
            if handle.len() > 1 && handle.ends_with('!') {
                let suffix = self.scan_tag_uri(false, None, start)?;
                (handle, suffix)
            } else {
                let suffix = self.scan_tag_uri(false, Some(&handle), start)?;
                if suffix.is_empty() {
                    (String::new(), "!".to_string())
                } else {
                    ("!".to_string(), suffix)
                }
            }
        };

        self.cache(1)?;
        if !self.is_blankz_at(0) && !(self.flow_level > 0 && is_flow_indicator(self.ch())) {
            return Err(self.context_error(
                self.mark(),
                "while scanning a tag",
                "did not find expected whitespace or line break",
            ));
        }
        Ok(Token::new(TokenKind::Tag { handle, suffix }, start, self.mark()))
    }

    fn scan_tag_handle(&mut self, directive: bool, start: Mark) -> Result<String> {
        let context = if directive {
            "while scanning a tag directive"
        } else {
            "while scanning a tag"
        };
        self.cache(1)?;
        if self.ch() != '!' {
            return Err(self.context_error(start, context, "did not find expected '!'"));
        }
        let mut handle = String::from("!");
        self.skip();
        self.cache(1)?;
        while is_word_char(self.ch()) {
            handle.push(self.ch());
            self.skip();
            self.cache(1)?;
        }
        if self.ch() == '!' {
            handle.push('!');
            self.skip();
        } else if directive && handle != "!" {
            return Err(self.context_error(start, context, "did not find expected '!'"));
        }
        Ok(handle)
    }

    /// Scan a tag URI, decoding `%XX` escapes. `head` is the part of a
    /// shorthand tag already consumed by `scan_tag_handle`.
    fn scan_tag_uri(&mut self, uri: bool, head: Option<&str>, start: Mark) -> Result<String> {
        let mut bytes: Vec<u8> = Vec::new();
        if let Some(head) = head {
            bytes.extend_from_slice(head.get(1..).unwrap_or("").as_bytes());
        }
        self.cache(1)?;
        while is_uri_char(self.ch(), uri) && !self.is_end() {
            if self.ch() == '%' {
                bytes.push(self.scan_uri_escape(start)?);
            } else {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(self.ch().encode_utf8(&mut buf).as_bytes());
                self.skip();
            }
            self.cache(1)?;
        }
        if bytes.is_empty() && head.is_none() {
            return Err(self.context_error(
                start,
                "while parsing a tag",
                "did not find expected tag URI",
            ));
        }
        String::from_utf8(bytes).map_err(|_| {
            self.context_error(start, "while parsing a tag", "found invalid UTF-8 in a URI escape")
        })
    }

    fn scan_uri_escape(&mut self, start: Mark) -> Result<u8> {
        self.cache(3)?;
        let high = self.look(1).to_digit(16);
        let low = self.look(2).to_digit(16);
        match (high, low) {
            (Some(high), Some(low)) => {
                self.skip();
                self.skip();
                self.skip();
                Ok((high * 16 + low) as u8)
            }
            _ => Err(self.context_error(
                start,
                "while parsing a tag",
                "did not find URI escaped octet",
            )),
        }
    }

    // ========================================================================
    // Block scalars
    // ========================================================================

    fn scan_block_scalar(&mut self, style: ScalarStyle) -> Result<Token> {
        let context = "while scanning a block scalar";
        let start = self.mark();
        self.skip();
        self.cache(1)?;

        // Chomping: -1 strip, 0 clip, 1 keep.
        let mut chomping = 0i8;
        let mut increment = 0usize;
        let read_chomping = |ch: char| match ch {
            '+' => Some(1i8),
            '-' => Some(-1i8),
            _ => None,
        };
        if let Some(c) = read_chomping(self.ch()) {
            chomping = c;
            self.skip();
            self.cache(1)?;
            if let Some(d) = self.ch().to_digit(10) {
                if d == 0 {
                    return Err(self.context_error(
                        self.mark(),
                        context,
                        "found an indentation indicator equal to 0",
                    ));
                }
                increment = d as usize;
                self.skip();
            }
        } else if let Some(d) = self.ch().to_digit(10) {
            if d == 0 {
                return Err(self.context_error(
                    self.mark(),
                    context,
                    "found an indentation indicator equal to 0",
                ));
            }
            increment = d as usize;
            self.skip();
            self.cache(1)?;
            if let Some(c) = read_chomping(self.ch()) {
                chomping = c;
                self.skip();
            }
        }

        self.skip_blanks()?;
        if self.ch() == '#' {
            while !self.is_breakz_at(0) {
                self.skip();
                self.cache(1)?;
            }
        }
        if !self.is_breakz_at(0) {
            return Err(self.context_error(
                self.mark(),
                context,
                "did not find expected comment or line break",
            ));
        }
        self.skip_line();

        let mut end = self.mark();
        let mut indent = 0usize;
        if increment > 0 {
            indent = if self.indent >= 0 {
                self.indent as usize + increment
            } else {
                increment
            };
        }

        let mut value = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        self.block_scalar_breaks(&mut indent, &mut trailing_breaks, &mut end)?;

        let mut leading_blank = false;
        self.cache(1)?;
        while self.column() == indent && !self.is_end() {
            let trailing_blank = is_blank(self.ch());
            if style == ScalarStyle::Folded
                && leading_break.starts_with('\n')
                && !leading_blank
                && !trailing_blank
            {
                if trailing_breaks.is_empty() {
                    value.push(' ');
                }
                leading_break.clear();
            } else {
                value.push_str(&leading_break);
                leading_break.clear();
            }
            value.push_str(&trailing_breaks);
            trailing_breaks.clear();
            leading_blank = is_blank(self.ch());

            while !self.is_breakz_at(0) {
                value.push(self.ch());
                self.skip();
                self.cache(1)?;
            }
            end = self.mark();
            if self.is_end() {
                break;
            }
            self.skip_line();
            leading_break.push('\n');
            self.block_scalar_breaks(&mut indent, &mut trailing_breaks, &mut end)?;
            self.cache(1)?;
        }

        if chomping != -1 {
            value.push_str(&leading_break);
        }
        if chomping == 1 {
            value.push_str(&trailing_breaks);
        }
        Ok(Token::new(TokenKind::Scalar { value, style }, start, end))
    }

    /// Consume indentation and empty lines inside a block scalar. Detects the
    /// content indentation when `indent` is still 0.
    fn block_scalar_breaks(
        &mut self,
        indent: &mut usize,
        breaks: &mut String,
        end: &mut Mark,
    ) -> Result<()> {
        let min_indent = (self.indent + 1).max(1) as usize;
        let mut max_indent = 0usize;
        loop {
            self.cache(1)?;
            while (*indent == 0 || self.column() < *indent) && self.ch() == ' ' {
                self.skip();
                self.cache(1)?;
            }
            if self.column() > max_indent {
                max_indent = self.column();
            }
            let required = if *indent == 0 { min_indent } else { *indent };
            if self.ch() == '\t' && self.column() < required {
                return Err(self.context_error(
                    self.mark(),
                    "while scanning a block scalar",
                    "found a tab character where an indentation space is expected",
                ));
            }
            if !is_break(self.ch()) {
                break;
            }
            breaks.push('\n');
            self.skip_line();
            *end = self.mark();
        }

        if *indent == 0 {
            let column = self.column();
            if !self.is_end() && column >= min_indent && max_indent > column {
                return Err(self.context_error(
                    self.mark(),
                    "while scanning a block scalar",
                    "found a leading empty line with more spaces than the first content line",
                ));
            }
            *indent = max_indent.max(min_indent);
        }
        Ok(())
    }

    // ========================================================================
    // Quoted scalars
    // ========================================================================

    fn scan_flow_scalar(&mut self, style: ScalarStyle) -> Result<Token> {
        let context = "while scanning a quoted scalar";
        let single = style == ScalarStyle::SingleQuoted;
        let quote = if single { '\'' } else { '"' };
        let start = self.mark();
        self.skip();

        let mut value = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();

        loop {
            self.cache(4)?;
            if self.is_document_indicator('-') || self.is_document_indicator('.') {
                return Err(self.context_error(
                    self.mark(),
                    context,
                    "found unexpected document indicator",
                ));
            }
            if self.is_end() {
                return Err(self.context_error(
                    self.mark(),
                    context,
                    "found unexpected end of stream",
                ));
            }

            let mut leading_blanks = false;
            while !self.is_blankz_at(0) {
                let ch = self.ch();
                if single && ch == '\'' && self.look(1) == '\'' {
                    value.push('\'');
                    self.skip();
                    self.skip();
                } else if ch == quote {
                    break;
                } else if !single && ch == '\\' && is_break(self.look(1)) {
                    self.skip();
                    self.skip_line();
                    leading_blanks = true;
                    break;
                } else if !single && ch == '\\' {
                    self.scan_escape(&mut value)?;
                } else {
                    value.push(ch);
                    self.skip();
                }
                self.cache(2)?;
            }

            self.cache(1)?;
            if self.ch() == quote {
                break;
            }

            while is_blank(self.ch()) || is_break(self.ch()) {
                if is_blank(self.ch()) {
                    if !leading_blanks {
                        whitespaces.push(self.ch());
                    }
                    self.skip();
                } else {
                    if !leading_blanks {
                        whitespaces.clear();
                        leading_break.push('\n');
                        leading_blanks = true;
                    } else {
                        trailing_breaks.push('\n');
                    }
                    self.skip_line();
                }
                self.cache(1)?;
            }

            if leading_blanks {
                if leading_break.starts_with('\n') {
                    if trailing_breaks.is_empty() {
                        value.push(' ');
                    } else {
                        value.push_str(&trailing_breaks);
                    }
                } else {
                    value.push_str(&leading_break);
                    value.push_str(&trailing_breaks);
                }
                leading_break.clear();
                trailing_breaks.clear();
            } else {
                value.push_str(&whitespaces);
                whitespaces.clear();
            }
        }

        self.skip();
        Ok(Token::new(TokenKind::Scalar { value, style }, start, self.mark()))
    }

    fn scan_escape(&mut self, value: &mut String) -> Result<()> {
        let context = "while parsing a quoted scalar";
        let mark = self.mark();
        let code_length = match self.look(1) {
            '0' => {
                value.push('\0');
                0
            }
            'a' => {
                value.push('\x07');
                0
            }
            'b' => {
                value.push('\x08');
                0
            }
            't' | '\t' => {
                value.push('\t');
                0
            }
            'n' => {
                value.push('\n');
                0
            }
            'v' => {
                value.push('\x0B');
                0
            }
            'f' => {
                value.push('\x0C');
                0
            }
            'r' => {
                value.push('\r');
                0
            }
            'e' => {
                value.push('\x1B');
                0
            }
            ' ' => {
                value.push(' ');
                0
            }
            '"' => {
                value.push('"');
                0
            }
            '/' => {
                value.push('/');
                0
            }
            '\\' => {
                value.push('\\');
                0
            }
            'N' => {
                value.push('\u{85}');
                0
            }
            '_' => {
                value.push('\u{A0}');
                0
            }
            'L' => {
                value.push('\u{2028}');
                0
            }
            'P' => {
                value.push('\u{2029}');
                0
            }
            'x' => 2,
            'u' => 4,
            'U' => 8,
            _ => {
                return Err(self.context_error(mark, context, "found unknown escape character"));
            }
        };
        self.skip();
        self.skip();
        if code_length == 0 {
            return Ok(());
        }

        self.cache(code_length)?;
        let mut code: u32 = 0;
        for i in 0..code_length {
            match self.look(i).to_digit(16) {
                Some(digit) if !self.reader.is_end(i) => code = (code << 4) | digit,
                _ => {
                    return Err(self.context_error(
                        self.mark(),
                        context,
                        "did not find expected hexadecimal number",
                    ));
                }
            }
        }
        let ch = char::from_u32(code).ok_or_else(|| {
            self.context_error(mark, context, "found invalid Unicode character escape code")
        })?;
        value.push(ch);
        for _ in 0..code_length {
            self.skip();
        }
        Ok(())
    }

    // ========================================================================
    // Plain scalars
    // ========================================================================

    /// Returns the token and whether the scalar ended after a line break.
    fn scan_plain_scalar(&mut self) -> Result<(Token, bool)> {
        let start = self.mark();
        let mut end = start;
        let indent = self.indent + 1;

        let mut value = String::new();
        let mut leading_break = String::new();
        let mut trailing_breaks = String::new();
        let mut whitespaces = String::new();
        let mut leading_blanks = false;

        loop {
            self.cache(4)?;
            if self.is_document_indicator('-') || self.is_document_indicator('.') {
                break;
            }
            if self.ch() == '#' {
                break;
            }

            while !self.is_blankz_at(0) {
                let ch = self.ch();
                let next = self.look(1);
                if ch == ':'
                    && (self.is_blankz_at(1) || (self.flow_level > 0 && is_flow_indicator(next)))
                {
                    break;
                }
                if self.flow_level > 0 && is_flow_indicator(ch) {
                    break;
                }

                if leading_blanks || !whitespaces.is_empty() {
                    if leading_blanks {
                        if leading_break.starts_with('\n') {
                            if trailing_breaks.is_empty() {
                                value.push(' ');
                            } else {
                                value.push_str(&trailing_breaks);
                            }
                        } else {
                            value.push_str(&leading_break);
                            value.push_str(&trailing_breaks);
                        }
                        leading_break.clear();
                        trailing_breaks.clear();
                        leading_blanks = false;
                    } else {
                        value.push_str(&whitespaces);
                        whitespaces.clear();
                    }
                }

                value.push(ch);
                self.skip();
                end = self.mark();
                self.cache(2)?;
            }

            if !(is_blank(self.ch()) || is_break(self.ch())) {
                break;
            }

            self.cache(1)?;
            while is_blank(self.ch()) || is_break(self.ch()) {
                if is_blank(self.ch()) {
                    if leading_blanks && (self.column() as isize) < indent && self.ch() == '\t' {
                        return Err(self.context_error(
                            self.mark(),
                            "while scanning a plain scalar",
                            "found a tab character that violates indentation",
                        ));
                    }
                    if !leading_blanks {
                        whitespaces.push(self.ch());
                    }
                    self.skip();
                } else {
                    if !leading_blanks {
                        whitespaces.clear();
                        leading_break.push('\n');
                        leading_blanks = true;
                    } else {
                        trailing_breaks.push('\n');
                    }
                    self.skip_line();
                }
                self.cache(1)?;
            }

            if self.flow_level == 0 && (self.column() as isize) < indent {
                break;
            }
        }

        let style = ScalarStyle::Plain;
        Ok((Token::new(TokenKind::Scalar { value, style }, start, end), leading_blanks))
    }
}

impl<R: Read> Iterator for Scanner<R> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => None,
            Err(err) => {
                // Errors are terminal: report once, then stop.
                self.stream_end_produced = true;
                Some(Err(err))
            }
        }
    }
}
