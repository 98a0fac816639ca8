//! Phase 3: Event Parser
//!
//! The parser pulls tokens from the scanner and produces events. It is an
//! explicit state machine: nested collections push the state to return to
//! onto a stack instead of recursing, so input nesting never grows the call
//! stack. It also:
//! - Validates the grammar and reports what was expected and what was found
//! - Resolves tag handles against the document's `%TAG` directives
//! - Binds anchors and checks that every alias refers to a known anchor
//! - Enforces the configured nesting limit

use crate::anchors::AnchorTable;
use crate::config::ParserConfig;
use crate::error::{Error, ParseContext, Result};
use crate::event::{Event, EventData, ScalarStyle, TagDirective, VersionDirective};
use crate::reader::{Mark, Reader};
use crate::scanner::Scanner;
use crate::token::{Token, TokenKind};
use std::io::Read;
use tracing::{debug, trace};

const CORE_TAG_PREFIX: &str = "tag:yaml.org,2002:";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    StreamStart,
    /// A document that may start without `---`.
    ImplicitDocumentStart,
    /// A document that must start with `---`.
    DocumentStart,
    DocumentContent,
    DocumentEnd,
    BlockNode,
    BlockSequenceFirstEntry,
    BlockSequenceEntry,
    IndentlessSequenceEntry,
    BlockMappingFirstKey,
    BlockMappingKey,
    BlockMappingValue,
    FlowSequenceFirstEntry,
    FlowSequenceEntry,
    FlowSequenceEntryMappingKey,
    FlowSequenceEntryMappingValue,
    FlowSequenceEntryMappingEnd,
    FlowMappingFirstKey,
    FlowMappingKey,
    FlowMappingValue,
    FlowMappingEmptyValue,
    End,
}

/// A decode session: bytes in, events out.
///
/// Events are pulled one at a time with [`Parser::next_event`] or through the
/// `Iterator` implementation. The first error ends the session.
pub struct Parser<R> {
    scanner: Scanner<R>,
    state: State,
    states: Vec<State>,
    tag_directives: Vec<TagDirective>,
    anchors: AnchorTable,
    depth: usize,
    max_depth: usize,
    done: bool,
}

impl<'a> Parser<&'a [u8]> {
    /// Decode an in-memory string.
    pub fn from_text(input: &'a str) -> Self {
        Self::new(input.as_bytes())
    }
}

impl<R: Read> Parser<R> {
    pub fn new(reader: R) -> Self {
        Self::with_config(reader, ParserConfig::default())
    }

    pub fn with_config(reader: R, config: ParserConfig) -> Self {
        let ctx = ParseContext::new(config.filename.as_deref());
        debug!(
            "Starting decode session (max depth {}, source {})",
            config.max_depth,
            config.filename.as_deref().unwrap_or("<input>")
        );
        Self {
            scanner: Scanner::new(Reader::new(reader, ctx)),
            state: State::StreamStart,
            states: Vec::new(),
            tag_directives: Vec::new(),
            anchors: AnchorTable::new(),
            depth: 0,
            max_depth: config.max_depth,
            done: false,
        }
    }

    /// Produce the next event, or `None` once the stream has ended.
    pub fn next_event(&mut self) -> Result<Option<Event>> {
        if self.done {
            return Ok(None);
        }
        match self.state_machine() {
            Ok(event) => {
                trace!("Event {} at {}", event.kind_name(), event.start);
                if event.data == EventData::StreamEnd {
                    debug!("Decode session finished at {}", event.end);
                    self.done = true;
                }
                Ok(Some(event))
            }
            Err(err) => {
                debug!("Decode session failed: {}", err);
                self.done = true;
                Err(err)
            }
        }
    }

    fn state_machine(&mut self) -> Result<Event> {
        match self.state {
            State::StreamStart => self.parse_stream_start(),
            State::ImplicitDocumentStart => self.parse_document_start(true),
            State::DocumentStart => self.parse_document_start(false),
            State::DocumentContent => self.parse_document_content(),
            State::DocumentEnd => self.parse_document_end(),
            State::BlockNode => self.parse_node(true, false),
            State::BlockSequenceFirstEntry => self.parse_block_sequence_entry(true),
            State::BlockSequenceEntry => self.parse_block_sequence_entry(false),
            State::IndentlessSequenceEntry => self.parse_indentless_sequence_entry(),
            State::BlockMappingFirstKey => self.parse_block_mapping_key(true),
            State::BlockMappingKey => self.parse_block_mapping_key(false),
            State::BlockMappingValue => self.parse_block_mapping_value(),
            State::FlowSequenceFirstEntry => self.parse_flow_sequence_entry(true),
            State::FlowSequenceEntry => self.parse_flow_sequence_entry(false),
            State::FlowSequenceEntryMappingKey => self.parse_flow_sequence_entry_mapping_key(),
            State::FlowSequenceEntryMappingValue => self.parse_flow_sequence_entry_mapping_value(),
            State::FlowSequenceEntryMappingEnd => self.parse_flow_sequence_entry_mapping_end(),
            State::FlowMappingFirstKey => self.parse_flow_mapping_key(true),
            State::FlowMappingKey => self.parse_flow_mapping_key(false),
            State::FlowMappingValue => self.parse_flow_mapping_value(false),
            State::FlowMappingEmptyValue => self.parse_flow_mapping_value(true),
            State::End => Err(self.error(
                self.scanner.mark(),
                "no more events after the stream end",
                &[],
                "",
            )),
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn ctx(&self) -> &ParseContext {
        self.scanner.reader().ctx()
    }

    fn error(
        &self,
        mark: Mark,
        context: &str,
        expected: &[&'static str],
        found: &str,
    ) -> Error {
        Error::parse(self.ctx(), mark, context, expected, found)
    }

    fn unexpected(&self, token: &Token, context: &str, expected: &[&'static str]) -> Error {
        self.error(token.start, context, expected, token.kind.describe())
    }

    fn peek(&mut self) -> Result<&Token> {
        self.scanner.peek_token()
    }

    fn skip(&mut self) {
        self.scanner.skip_token();
    }

    fn pop_state(&mut self) -> State {
        self.states.pop().unwrap_or(State::End)
    }

    fn empty_scalar(mark: Mark) -> Event {
        Event::new(
            EventData::Scalar {
                anchor: None,
                tag: None,
                value: String::new(),
                style: ScalarStyle::Plain,
            },
            mark,
            mark,
        )
    }

    fn enter_collection(&mut self, mark: Mark) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(Error::depth_exceeded(self.ctx(), mark, self.max_depth));
        }
        self.depth += 1;
        Ok(())
    }

    fn leave_collection(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    fn sequence_end(&mut self, start: Mark, end: Mark) -> Event {
        self.leave_collection();
        Event::new(EventData::SequenceEnd, start, end)
    }

    fn mapping_end(&mut self, start: Mark, end: Mark) -> Event {
        self.leave_collection();
        Event::new(EventData::MappingEnd, start, end)
    }

    // ========================================================================
    // Stream and documents
    // ========================================================================

    fn parse_stream_start(&mut self) -> Result<Event> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::StreamStart(encoding) => {
                let (start, end) = (token.start, token.end);
                self.skip();
                self.state = State::ImplicitDocumentStart;
                Ok(Event::new(EventData::StreamStart { encoding }, start, end))
            }
            _ => {
                let token = token.clone();
                Err(self.unexpected(&token, "while parsing a stream", &["stream start"]))
            }
        }
    }

    fn parse_document_start(&mut self, implicit: bool) -> Result<Event> {
        while self.peek()?.kind == TokenKind::DocumentEnd {
            self.skip();
        }
        let token = self.peek()?;
        let start = token.start;
        let is_directive = matches!(
            token.kind,
            TokenKind::VersionDirective(..) | TokenKind::TagDirective { .. }
        );

        if token.kind == TokenKind::StreamEnd {
            let end = token.end;
            self.skip();
            self.state = State::End;
            return Ok(Event::new(EventData::StreamEnd, start, end));
        }

        if implicit && !is_directive && token.kind != TokenKind::DocumentStart {
            self.tag_directives.clear();
            self.states.push(State::DocumentEnd);
            self.state = State::BlockNode;
            return Ok(Event::new(
                EventData::DocumentStart {
                    implicit: true,
                    version: None,
                    tags: Vec::new(),
                },
                start,
                start,
            ));
        }

        if !implicit && is_directive {
            return Err(self.error(
                start,
                "directives after a document require an explicit document end",
                &["'...'"],
                "%YAML or %TAG directive",
            ));
        }

        let (version, tags) = self.process_directives()?;
        let token = self.peek()?;
        if token.kind != TokenKind::DocumentStart {
            let token = token.clone();
            return Err(self.unexpected(&token, "while parsing a document start", &["'---'"]));
        }
        let end = token.end;
        self.skip();
        self.states.push(State::DocumentEnd);
        self.state = State::DocumentContent;
        Ok(Event::new(
            EventData::DocumentStart {
                implicit: false,
                version,
                tags,
            },
            start,
            end,
        ))
    }

    fn process_directives(&mut self) -> Result<(Option<VersionDirective>, Vec<TagDirective>)> {
        let mut version: Option<VersionDirective> = None;
        let mut tags: Vec<TagDirective> = Vec::new();
        loop {
            let token = self.peek()?;
            let mark = token.start;
            match &token.kind {
                TokenKind::VersionDirective(major, minor) => {
                    let (major, minor) = (*major, *minor);
                    if version.is_some() {
                        return Err(self.error(mark, "found duplicate %YAML directive", &[], ""));
                    }
                    if major != 1 {
                        return Err(self.error(
                            mark,
                            &format!("found incompatible YAML document version {}.{}", major, minor),
                            &[],
                            "",
                        ));
                    }
                    version = Some(VersionDirective { major, minor });
                }
                TokenKind::TagDirective { handle, prefix } => {
                    if tags.iter().any(|t| &t.handle == handle) {
                        let context = format!("found duplicate %TAG directive {}", handle);
                        return Err(self.error(mark, &context, &[], ""));
                    }
                    tags.push(TagDirective::new(handle.clone(), prefix.clone()));
                }
                _ => break,
            }
            self.skip();
        }
        self.tag_directives = tags.clone();
        Ok((version, tags))
    }

    fn parse_document_content(&mut self) -> Result<Event> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::VersionDirective(..)
            | TokenKind::TagDirective { .. }
            | TokenKind::DocumentStart
            | TokenKind::DocumentEnd
            | TokenKind::StreamEnd => {
                let mark = token.start;
                self.state = self.pop_state();
                Ok(Self::empty_scalar(mark))
            }
            _ => self.parse_node(true, false),
        }
    }

    fn parse_document_end(&mut self) -> Result<Event> {
        let token = self.peek()?;
        let start = token.start;
        let mut end = token.start;
        let mut implicit = true;
        if token.kind == TokenKind::DocumentEnd {
            end = token.end;
            implicit = false;
            self.skip();
        }
        self.tag_directives.clear();
        self.anchors.clear();
        self.depth = 0;
        self.state = if implicit {
            State::DocumentStart
        } else {
            State::ImplicitDocumentStart
        };
        Ok(Event::new(EventData::DocumentEnd { implicit }, start, end))
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    fn resolve_tag(&self, handle: &str, suffix: &str, mark: Mark) -> Result<String> {
        if handle.is_empty() {
            return Ok(suffix.to_string());
        }
        if let Some(directive) = self.tag_directives.iter().find(|d| d.handle == handle) {
            return Ok(format!("{}{}", directive.prefix, suffix));
        }
        match handle {
            "!" => Ok(format!("!{}", suffix)),
            "!!" => Ok(format!("{}{}", CORE_TAG_PREFIX, suffix)),
            _ => Err(self.error(
                mark,
                &format!("while parsing a node, found undefined tag handle {}", handle),
                &[],
                "",
            )),
        }
    }

    fn parse_node(&mut self, block: bool, indentless_sequence: bool) -> Result<Event> {
        let token = self.peek()?.clone();

        if let TokenKind::Alias(name) = &token.kind {
            self.skip();
            self.state = self.pop_state();
            if self.anchors.resolve(name).is_none() {
                return Err(Error::undefined_alias(self.ctx(), token.start, name));
            }
            return Ok(Event::new(
                EventData::Alias {
                    anchor: name.clone(),
                },
                token.start,
                token.end,
            ));
        }

        let start = token.start;
        let mut end = token.start;
        let mut anchor: Option<(String, Mark)> = None;
        let mut tag: Option<(String, String, Mark)> = None;
        let mut token = token;
        for _ in 0..2 {
            match &token.kind {
                TokenKind::Anchor(name) if anchor.is_none() => {
                    anchor = Some((name.clone(), token.start));
                }
                TokenKind::Tag { handle, suffix } if tag.is_none() => {
                    tag = Some((handle.clone(), suffix.clone(), token.start));
                }
                _ => break,
            }
            end = token.end;
            self.skip();
            token = self.peek()?.clone();
        }

        let tag = match tag {
            Some((handle, suffix, mark)) => Some(self.resolve_tag(&handle, &suffix, mark)?),
            None => None,
        };
        let node = self.anchors.next_node();
        if let Some((name, mark)) = &anchor {
            if let Some(previous) = self.anchors.define(name, node, *mark) {
                trace!("Anchor &{} shadows the one at {}", name, previous.mark);
            }
        }
        let anchor = anchor.map(|(name, _)| name);

        if indentless_sequence && token.kind == TokenKind::BlockEntry {
            self.enter_collection(token.start)?;
            self.state = State::IndentlessSequenceEntry;
            return Ok(Event::new(
                EventData::SequenceStart {
                    anchor,
                    tag,
                    flow: false,
                },
                start,
                token.end,
            ));
        }

        match token.kind {
            TokenKind::Scalar { value, style } => {
                self.skip();
                self.state = self.pop_state();
                Ok(Event::new(
                    EventData::Scalar {
                        anchor,
                        tag,
                        value,
                        style,
                    },
                    start,
                    token.end,
                ))
            }
            TokenKind::FlowSequenceStart => {
                self.enter_collection(token.start)?;
                self.state = State::FlowSequenceFirstEntry;
                Ok(Event::new(
                    EventData::SequenceStart {
                        anchor,
                        tag,
                        flow: true,
                    },
                    start,
                    token.end,
                ))
            }
            TokenKind::FlowMappingStart => {
                self.enter_collection(token.start)?;
                self.state = State::FlowMappingFirstKey;
                Ok(Event::new(
                    EventData::MappingStart {
                        anchor,
                        tag,
                        flow: true,
                    },
                    start,
                    token.end,
                ))
            }
            TokenKind::BlockSequenceStart if block => {
                self.enter_collection(token.start)?;
                self.state = State::BlockSequenceFirstEntry;
                Ok(Event::new(
                    EventData::SequenceStart {
                        anchor,
                        tag,
                        flow: false,
                    },
                    start,
                    token.end,
                ))
            }
            TokenKind::BlockMappingStart if block => {
                self.enter_collection(token.start)?;
                self.state = State::BlockMappingFirstKey;
                Ok(Event::new(
                    EventData::MappingStart {
                        anchor,
                        tag,
                        flow: false,
                    },
                    start,
                    token.end,
                ))
            }
            _ if anchor.is_some() || tag.is_some() => {
                self.state = self.pop_state();
                Ok(Event::new(
                    EventData::Scalar {
                        anchor,
                        tag,
                        value: String::new(),
                        style: ScalarStyle::Plain,
                    },
                    start,
                    end,
                ))
            }
            _ => {
                let context = if block {
                    "while parsing a block node"
                } else {
                    "while parsing a flow node"
                };
                Err(self.unexpected(&token, context, &["node content"]))
            }
        }
    }

    // ========================================================================
    // Block collections
    // ========================================================================

    fn parse_block_sequence_entry(&mut self, first: bool) -> Result<Event> {
        if first {
            self.skip();
        }
        let token = self.peek()?;
        match token.kind {
            TokenKind::BlockEntry => {
                let mark = token.end;
                self.skip();
                let next = &self.peek()?.kind;
                if matches!(next, TokenKind::BlockEntry | TokenKind::BlockEnd) {
                    self.state = State::BlockSequenceEntry;
                    Ok(Self::empty_scalar(mark))
                } else {
                    self.states.push(State::BlockSequenceEntry);
                    self.parse_node(true, false)
                }
            }
            TokenKind::BlockEnd => {
                let (start, end) = (token.start, token.end);
                self.skip();
                self.state = self.pop_state();
                Ok(self.sequence_end(start, end))
            }
            _ => {
                let token = token.clone();
                Err(self.unexpected(&token, "while parsing a block collection", &["'-'"]))
            }
        }
    }

    fn parse_indentless_sequence_entry(&mut self) -> Result<Event> {
        let token = self.peek()?;
        if token.kind != TokenKind::BlockEntry {
            let mark = token.start;
            self.state = self.pop_state();
            return Ok(self.sequence_end(mark, mark));
        }
        let mark = token.end;
        self.skip();
        let next = &self.peek()?.kind;
        if matches!(
            next,
            TokenKind::BlockEntry | TokenKind::Key | TokenKind::Value | TokenKind::BlockEnd
        ) {
            self.state = State::IndentlessSequenceEntry;
            Ok(Self::empty_scalar(mark))
        } else {
            self.states.push(State::IndentlessSequenceEntry);
            self.parse_node(true, false)
        }
    }

    fn parse_block_mapping_key(&mut self, first: bool) -> Result<Event> {
        if first {
            self.skip();
        }
        let token = self.peek()?;
        match token.kind {
            TokenKind::Key => {
                let mark = token.end;
                self.skip();
                let next = &self.peek()?.kind;
                if matches!(next, TokenKind::Key | TokenKind::Value | TokenKind::BlockEnd) {
                    self.state = State::BlockMappingValue;
                    Ok(Self::empty_scalar(mark))
                } else {
                    self.states.push(State::BlockMappingValue);
                    self.parse_node(true, true)
                }
            }
            // A value with no key: the key is empty.
            TokenKind::Value => {
                let mark = token.start;
                self.state = State::BlockMappingValue;
                Ok(Self::empty_scalar(mark))
            }
            TokenKind::BlockEnd => {
                let (start, end) = (token.start, token.end);
                self.skip();
                self.state = self.pop_state();
                Ok(self.mapping_end(start, end))
            }
            _ => {
                let token = token.clone();
                Err(self.unexpected(&token, "while parsing a block mapping", &["key"]))
            }
        }
    }

    fn parse_block_mapping_value(&mut self) -> Result<Event> {
        let token = self.peek()?;
        if token.kind != TokenKind::Value {
            let mark = token.start;
            self.state = State::BlockMappingKey;
            return Ok(Self::empty_scalar(mark));
        }
        let mark = token.end;
        self.skip();
        let next = &self.peek()?.kind;
        if matches!(next, TokenKind::Key | TokenKind::Value | TokenKind::BlockEnd) {
            self.state = State::BlockMappingKey;
            Ok(Self::empty_scalar(mark))
        } else {
            self.states.push(State::BlockMappingKey);
            self.parse_node(true, true)
        }
    }

    // ========================================================================
    // Flow collections
    // ========================================================================

    fn parse_flow_sequence_entry(&mut self, first: bool) -> Result<Event> {
        if first {
            self.skip();
        }
        let mut token = self.peek()?;
        if token.kind != TokenKind::FlowSequenceEnd {
            if !first {
                if token.kind != TokenKind::FlowEntry {
                    let token = token.clone();
                    return Err(self.unexpected(
                        &token,
                        "while parsing a flow sequence",
                        &["','", "']'"],
                    ));
                }
                self.skip();
                token = self.peek()?;
            }
            match token.kind {
                TokenKind::Key => {
                    let (start, end) = (token.start, token.end);
                    self.skip();
                    self.enter_collection(start)?;
                    self.state = State::FlowSequenceEntryMappingKey;
                    return Ok(Event::new(
                        EventData::MappingStart {
                            anchor: None,
                            tag: None,
                            flow: true,
                        },
                        start,
                        end,
                    ));
                }
                TokenKind::FlowSequenceEnd => {}
                _ => {
                    self.states.push(State::FlowSequenceEntry);
                    return self.parse_node(false, false);
                }
            }
        }
        let (start, end) = (token.start, token.end);
        self.skip();
        self.state = self.pop_state();
        Ok(self.sequence_end(start, end))
    }

    fn parse_flow_sequence_entry_mapping_key(&mut self) -> Result<Event> {
        let token = self.peek()?;
        if matches!(
            token.kind,
            TokenKind::Value | TokenKind::FlowEntry | TokenKind::FlowSequenceEnd
        ) {
            let mark = token.start;
            self.state = State::FlowSequenceEntryMappingValue;
            return Ok(Self::empty_scalar(mark));
        }
        self.states.push(State::FlowSequenceEntryMappingValue);
        self.parse_node(false, false)
    }

    fn parse_flow_sequence_entry_mapping_value(&mut self) -> Result<Event> {
        let token = self.peek()?;
        if token.kind == TokenKind::Value {
            self.skip();
            let token = self.peek()?;
            if !matches!(token.kind, TokenKind::FlowEntry | TokenKind::FlowSequenceEnd) {
                self.states.push(State::FlowSequenceEntryMappingEnd);
                return self.parse_node(false, false);
            }
        }
        let mark = self.peek()?.start;
        self.state = State::FlowSequenceEntryMappingEnd;
        Ok(Self::empty_scalar(mark))
    }

    fn parse_flow_sequence_entry_mapping_end(&mut self) -> Result<Event> {
        let mark = self.peek()?.start;
        self.state = State::FlowSequenceEntry;
        Ok(self.mapping_end(mark, mark))
    }

    fn parse_flow_mapping_key(&mut self, first: bool) -> Result<Event> {
        if first {
            self.skip();
        }
        let mut token = self.peek()?;
        if token.kind != TokenKind::FlowMappingEnd {
            if !first {
                if token.kind != TokenKind::FlowEntry {
                    let token = token.clone();
                    return Err(self.unexpected(
                        &token,
                        "while parsing a flow mapping",
                        &["','", "'}'"],
                    ));
                }
                self.skip();
                token = self.peek()?;
            }
            match token.kind {
                TokenKind::Key => {
                    self.skip();
                    let token = self.peek()?;
                    if matches!(
                        token.kind,
                        TokenKind::Value | TokenKind::FlowEntry | TokenKind::FlowMappingEnd
                    ) {
                        let mark = token.start;
                        self.state = State::FlowMappingValue;
                        return Ok(Self::empty_scalar(mark));
                    }
                    self.states.push(State::FlowMappingValue);
                    return self.parse_node(false, false);
                }
                TokenKind::FlowMappingEnd => {}
                _ => {
                    self.states.push(State::FlowMappingEmptyValue);
                    return self.parse_node(false, false);
                }
            }
        }
        let (start, end) = (token.start, token.end);
        self.skip();
        self.state = self.pop_state();
        Ok(self.mapping_end(start, end))
    }

    fn parse_flow_mapping_value(&mut self, empty: bool) -> Result<Event> {
        let token = self.peek()?;
        if empty {
            let mark = token.start;
            self.state = State::FlowMappingKey;
            return Ok(Self::empty_scalar(mark));
        }
        if token.kind == TokenKind::Value {
            self.skip();
            let token = self.peek()?;
            if !matches!(token.kind, TokenKind::FlowEntry | TokenKind::FlowMappingEnd) {
                self.states.push(State::FlowMappingKey);
                return self.parse_node(false, false);
            }
        }
        let mark = self.peek()?.start;
        self.state = State::FlowMappingKey;
        Ok(Self::empty_scalar(mark))
    }
}

impl<R: Read> Iterator for Parser<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::format_events;

    fn events(input: &str) -> Result<Vec<Event>> {
        Parser::from_text(input).collect()
    }

    fn tree(input: &str) -> String {
        format_events(&events(input).unwrap())
    }

    #[test]
    fn test_parse_empty_stream() {
        assert_eq!(tree(""), "+STR\n-STR\n");
        assert_eq!(tree("# only a comment\n"), "+STR\n-STR\n");
    }

    #[test]
    fn test_parse_block_mapping() {
        assert_eq!(
            tree("a: 1\nb: 2\n"),
            "+STR\n+DOC\n+MAP\n=VAL :a\n=VAL :1\n=VAL :b\n=VAL :2\n-MAP\n-DOC\n-STR\n"
        );
    }

    #[test]
    fn test_parse_indentless_sequence() {
        assert_eq!(
            tree("a:\n- x\n- y\n"),
            "+STR\n+DOC\n+MAP\n=VAL :a\n+SEQ\n=VAL :x\n=VAL :y\n-SEQ\n-MAP\n-DOC\n-STR\n"
        );
    }

    #[test]
    fn test_parse_explicit_keys_and_empty_values() {
        assert_eq!(
            tree("? a\n? b\n: c\n:\n"),
            "+STR\n+DOC\n+MAP\n=VAL :a\n=VAL :\n=VAL :b\n=VAL :c\n=VAL :\n=VAL :\n-MAP\n-DOC\n-STR\n"
        );
    }

    #[test]
    fn test_parse_flow_pair_in_sequence() {
        assert_eq!(
            tree("[a: b, c]"),
            "+STR\n+DOC\n+SEQ []\n+MAP {}\n=VAL :a\n=VAL :b\n-MAP\n=VAL :c\n-SEQ\n-DOC\n-STR\n"
        );
    }

    #[test]
    fn test_parse_flow_mapping_without_values() {
        assert_eq!(
            tree("{a, b: }"),
            "+STR\n+DOC\n+MAP {}\n=VAL :a\n=VAL :\n=VAL :b\n=VAL :\n-MAP\n-DOC\n-STR\n"
        );
    }

    #[test]
    fn test_parse_multiple_documents() {
        assert_eq!(
            tree("a\n--- b\n...\nc\n"),
            "+STR\n+DOC\n=VAL :a\n-DOC\n+DOC ---\n=VAL :b\n-DOC ...\n+DOC\n=VAL :c\n-DOC\n-STR\n"
        );
    }

    #[test]
    fn test_parse_empty_explicit_documents() {
        assert_eq!(
            tree("---\n---\n"),
            "+STR\n+DOC ---\n=VAL :\n-DOC\n+DOC ---\n=VAL :\n-DOC\n-STR\n"
        );
    }

    #[test]
    fn test_parse_tags_resolved() {
        assert_eq!(
            tree("%TAG !e! tag:e.com,2000:\n--- !e!foo [!!str a, !local b, ! c]\n"),
            "+STR\n+DOC ---\n+SEQ [] <tag:e.com,2000:foo>\n=VAL <tag:yaml.org,2002:str> :a\n\
             =VAL <!local> :b\n=VAL <!> :c\n-SEQ\n-DOC\n-STR\n"
        );
    }

    #[test]
    fn test_parse_document_start_carries_directives() {
        let events = events("%YAML 1.1\n%TAG ! tag:x,1:\n--- a\n").unwrap();
        match &events[1].data {
            EventData::DocumentStart {
                implicit,
                version,
                tags,
            } => {
                assert!(!implicit);
                assert_eq!(*version, Some(VersionDirective { major: 1, minor: 1 }));
                assert_eq!(tags, &vec![TagDirective::new("!", "tag:x,1:")]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(events[2].tag(), None);
    }

    #[test]
    fn test_parse_anchor_then_tag_either_order() {
        assert_eq!(
            tree("- &a !!int 1\n- !!int &b 2\n- &c\n"),
            "+STR\n+DOC\n+SEQ\n=VAL &a <tag:yaml.org,2002:int> :1\n\
             =VAL &b <tag:yaml.org,2002:int> :2\n=VAL &c :\n-SEQ\n-DOC\n-STR\n"
        );
    }

    #[test]
    fn test_parse_self_referencing_alias() {
        assert_eq!(
            tree("tree: &parent\n  node: null\n  parent: *parent\n"),
            "+STR\n+DOC\n+MAP\n=VAL :tree\n+MAP &parent\n=VAL :node\n=VAL :null\n\
             =VAL :parent\n=ALI *parent\n-MAP\n-MAP\n-DOC\n-STR\n"
        );
    }

    #[test]
    fn test_error_undefined_alias() {
        let err = events("a: *x\n").unwrap_err();
        assert_eq!(err.kind_name(), "undefined-alias");
        assert_eq!(err.mark().column, 3);
    }

    #[test]
    fn test_error_alias_across_documents() {
        let err = events("--- &a x\n--- *a\n").unwrap_err();
        assert_eq!(err.kind_name(), "undefined-alias");
    }

    #[test]
    fn test_error_undefined_tag_handle() {
        let err = events("!x!y z\n").unwrap_err();
        assert_eq!(err.kind_name(), "parse");
        assert!(err.to_string().contains("undefined tag handle !x!"));
    }

    #[test]
    fn test_error_duplicate_yaml_directive() {
        let err = events("%YAML 1.2\n%YAML 1.2\n---\n").unwrap_err();
        assert!(err.to_string().starts_with("found duplicate %YAML directive"));
    }

    #[test]
    fn test_error_incompatible_version() {
        assert!(events("%YAML 2.0\n---\n").is_err());
    }

    #[test]
    fn test_error_directive_without_document_end() {
        let err = events("- a\n%YAML 1.2\n---\n").unwrap_err();
        assert_eq!(err.kind_name(), "parse");
    }

    #[test]
    fn test_error_unterminated_flow_sequence() {
        let err = events("a: [1, 2\n").unwrap_err();
        assert_eq!(err.kind_name(), "parse");
        assert_eq!(
            err.to_string(),
            "while parsing a flow sequence: expected ',' or ']', found stream end at line 2 column 1"
        );
    }

    #[test]
    fn test_error_inconsistent_dedent() {
        let err = events("a:\n  b: 1\n c: 2\n").unwrap_err();
        assert_eq!(err.kind_name(), "parse");
        assert!(err.to_string().contains("expected key"));
    }

    #[test]
    fn test_error_trailing_content() {
        let err = events("[a] b\n").unwrap_err();
        assert_eq!(err.kind_name(), "parse");
        // A plain line followed by a key at the same indent is a lexical error.
        let err = events("foo\nfoo: bar\n").unwrap_err();
        assert_eq!(err.kind_name(), "scan");
    }

    #[test]
    fn test_error_unclosed_collection_without_final_newline() {
        for input in ["[a", "{a: 1", "- [a, b", "k: {a: [1"] {
            let err = events(input).unwrap_err();
            assert_eq!(err.kind_name(), "parse", "{:?}", input);
            assert!(err.to_string().contains("found stream end"), "{:?}: {}", input, err);
            assert_eq!(err.mark().index, input.len(), "{:?}", input);
        }
    }

    #[test]
    fn test_depth_limit() {
        let config = ParserConfig {
            max_depth: 2,
            ..ParserConfig::default()
        };
        let mut parser = Parser::with_config("[[[x]]]".as_bytes(), config);
        let mut seen = Vec::new();
        let err = loop {
            match parser.next_event() {
                Ok(Some(event)) => seen.push(event),
                Ok(None) => panic!("stream ended without an error"),
                Err(err) => break err,
            }
        };
        assert_eq!(err.kind_name(), "depth");
        assert_eq!(err.mark().column, 2);
        // the two permitted collections were started, the third was not
        let starts = seen.iter().filter(|e| e.kind_name() == "sequence start").count();
        assert_eq!(starts, 2);
        assert!(parser.next_event().unwrap().is_none());
    }

    #[test]
    fn test_depth_resets_between_siblings() {
        let config = ParserConfig {
            max_depth: 1,
            ..ParserConfig::default()
        };
        let parser = Parser::with_config("- [a]\n".as_bytes(), config.clone());
        assert!(parser.collect::<Result<Vec<_>>>().is_err());
        let parser = Parser::with_config("[a]\n--- [b]\n".as_bytes(), config);
        assert!(parser.collect::<Result<Vec<_>>>().is_ok());
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let mut parser = Parser::from_text("[a");
        let mut results = Vec::new();
        for item in parser.by_ref() {
            results.push(item.is_ok());
        }
        assert_eq!(results.last(), Some(&false));
        assert!(parser.next().is_none());
    }

    #[test]
    fn test_event_marks() {
        let events = events("key: value\n").unwrap();
        let value = &events[4];
        assert_eq!(value.scalar_value(), Some("value"));
        assert_eq!(value.start.column, 5);
        assert_eq!(value.end.column, 10);
        assert_eq!(value.start.index, 5);
    }
}
