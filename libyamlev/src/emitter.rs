//! Event emitter.
//!
//! The emitter is the mirror of the parser: the caller pushes events one at
//! a time and the emitter writes YAML text. Collections are written in block
//! style unless the event asks for flow style, the collection is empty, or
//! it is nested inside a flow collection.
//!
//! A few events of lookahead are kept before acting on a document or
//! collection start, so the emitter can tell whether a collection is empty
//! and whether a document's root is an empty scalar.
//!
//! Output is buffered and handed to the writer at every document end and at
//! stream end.

use crate::config::EmitterConfig;
use crate::error::{Error, Result};
use crate::event::{Event, EventData, ScalarStyle, TagDirective, VersionDirective};
use crate::reader::{is_printable, Mark};
use crate::resolve::resolves_to_non_string;
use std::collections::{HashSet, VecDeque};
use std::io;
use tracing::{debug, trace};

/// Longest scalar or alias written as an implicit key.
const MAX_SIMPLE_KEY_LENGTH: usize = 128;

/// Handles every document can use without declaring them.
const DEFAULT_TAG_DIRECTIVES: [(&str, &str); 2] = [("!", "!"), ("!!", "tag:yaml.org,2002:")];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    StreamStart,
    FirstDocumentStart,
    DocumentStart,
    DocumentContent,
    DocumentEnd,
    FlowSequenceFirstItem,
    FlowSequenceItem,
    FlowMappingFirstKey,
    FlowMappingKey,
    FlowMappingSimpleValue,
    FlowMappingValue,
    BlockSequenceFirstItem,
    BlockSequenceItem,
    BlockMappingFirstKey,
    BlockMappingKey,
    BlockMappingSimpleValue,
    BlockMappingValue,
    End,
}

/// Which styles can represent a scalar value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ScalarAnalysis {
    multiline: bool,
    flow_plain_allowed: bool,
    block_plain_allowed: bool,
    single_quoted_allowed: bool,
    block_allowed: bool,
}

/// How a tag is written: `handle` + `suffix` shorthand, or `!<uri>`.
#[derive(Clone, Debug, PartialEq, Eq)]
enum TagForm {
    Shorthand { handle: String, suffix: String },
    Verbatim(String),
}

/// Push-based YAML writer.
///
/// ```
/// use libyamlev::{Emitter, Event};
///
/// let mut emitter = Emitter::new(Vec::new());
/// for event in [
///     Event::stream_start(),
///     Event::document_start(true),
///     Event::plain_scalar("hello"),
///     Event::document_end(true),
///     Event::stream_end(),
/// ] {
///     emitter.emit(event).unwrap();
/// }
/// assert_eq!(emitter.into_inner(), b"hello\n");
/// ```
pub struct Emitter<W: io::Write> {
    writer: W,
    config: EmitterConfig,
    best_indent: usize,
    buffer: String,
    failure: Option<Error>,

    state: State,
    states: Vec<State>,
    events: VecDeque<Event>,

    indent: Option<usize>,
    indents: Vec<Option<usize>>,
    flow_level: usize,
    depth: usize,
    mapping_context: bool,
    simple_key_context: bool,

    column: usize,
    whitespace: bool,
    indention: bool,
    open_ended: bool,

    tag_directives: Vec<TagDirective>,
    anchors: HashSet<String>,
}

impl<W: io::Write> Emitter<W> {
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, EmitterConfig::default())
    }

    pub fn with_config(writer: W, config: EmitterConfig) -> Self {
        let best_indent = config.best_indent();
        Self {
            writer,
            config,
            best_indent,
            buffer: String::new(),
            failure: None,
            state: State::StreamStart,
            states: Vec::new(),
            events: VecDeque::new(),
            indent: None,
            indents: Vec::new(),
            flow_level: 0,
            depth: 0,
            mapping_context: false,
            simple_key_context: false,
            column: 0,
            whitespace: true,
            indention: true,
            open_ended: false,
            tag_directives: Vec::new(),
            anchors: HashSet::new(),
        }
    }

    /// Give back the writer. Output not yet flushed by a document end or
    /// stream end is discarded.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Push the next event. Once an error is returned every later call
    /// returns the same error.
    pub fn emit(&mut self, event: Event) -> Result<()> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        self.events.push_back(event);
        while !self.need_more_events() {
            let Some(event) = self.events.pop_front() else {
                break;
            };
            if let Err(err) = self.state_machine(&event) {
                debug!("Emitter stopped: {}", err);
                self.failure = Some(err.clone());
                return Err(err);
            }
        }
        Ok(())
    }

    /// Document and collection starts wait for enough following events to
    /// decide on `---` and on empty collections.
    fn need_more_events(&self) -> bool {
        let Some(head) = self.events.front() else {
            return true;
        };
        let accumulate = match head.data {
            EventData::DocumentStart { .. } => 1,
            EventData::SequenceStart { .. } => 2,
            EventData::MappingStart { .. } => 3,
            _ => return false,
        };
        if self.events.len() - 1 > accumulate {
            return false;
        }
        let mut level = 0isize;
        for event in &self.events {
            match event.data {
                EventData::StreamStart { .. }
                | EventData::DocumentStart { .. }
                | EventData::SequenceStart { .. }
                | EventData::MappingStart { .. } => level += 1,
                EventData::StreamEnd
                | EventData::DocumentEnd { .. }
                | EventData::SequenceEnd
                | EventData::MappingEnd => level -= 1,
                _ => {}
            }
            if level == 0 {
                return false;
            }
        }
        true
    }

    fn state_machine(&mut self, event: &Event) -> Result<()> {
        trace!("Emitter {:?} on {}", self.state, event.kind_name());
        match self.state {
            State::StreamStart => self.emit_stream_start(event),
            State::FirstDocumentStart => self.emit_document_start(event, true),
            State::DocumentStart => self.emit_document_start(event, false),
            State::DocumentContent => self.emit_document_content(event),
            State::DocumentEnd => self.emit_document_end(event),
            State::FlowSequenceFirstItem => self.emit_flow_sequence_item(event, true),
            State::FlowSequenceItem => self.emit_flow_sequence_item(event, false),
            State::FlowMappingFirstKey => self.emit_flow_mapping_key(event, true),
            State::FlowMappingKey => self.emit_flow_mapping_key(event, false),
            State::FlowMappingSimpleValue => self.emit_flow_mapping_value(event, true),
            State::FlowMappingValue => self.emit_flow_mapping_value(event, false),
            State::BlockSequenceFirstItem => self.emit_block_sequence_item(event, true),
            State::BlockSequenceItem => self.emit_block_sequence_item(event, false),
            State::BlockMappingFirstKey => self.emit_block_mapping_key(event, true),
            State::BlockMappingKey => self.emit_block_mapping_key(event, false),
            State::BlockMappingSimpleValue => self.emit_block_mapping_value(event, true),
            State::BlockMappingValue => self.emit_block_mapping_value(event, false),
            State::End => Err(Error::emit(
                event.start,
                format!("expected nothing after stream end, found {}", event.kind_name()),
            )),
        }
    }

    // ========================================================================
    // Stream and documents
    // ========================================================================

    fn emit_stream_start(&mut self, event: &Event) -> Result<()> {
        match event.data {
            EventData::StreamStart { .. } => {
                debug!("Emitter stream start");
                self.indent = None;
                self.column = 0;
                self.whitespace = true;
                self.indention = true;
                self.state = State::FirstDocumentStart;
                Ok(())
            }
            _ => Err(unexpected(event, "stream start")),
        }
    }

    fn emit_document_start(&mut self, event: &Event, first: bool) -> Result<()> {
        match &event.data {
            EventData::DocumentStart {
                implicit,
                version,
                tags,
            } => {
                self.set_tag_directives(version.as_ref(), tags, event.start)?;

                let implicit = *implicit
                    && first
                    && version.is_none()
                    && tags.is_empty()
                    && !self.empty_root_follows();

                if (version.is_some() || !tags.is_empty()) && self.open_ended {
                    self.write_indicator("...", true, false, false);
                    self.write_indent();
                }
                self.open_ended = false;

                if let Some(version) = version {
                    self.write_indicator("%YAML", true, false, false);
                    self.write_indicator(
                        &format!("{}.{}", version.major, version.minor),
                        true,
                        false,
                        false,
                    );
                    self.write_indent();
                }
                for directive in tags {
                    self.write_indicator("%TAG", true, false, false);
                    self.write_tag_handle(&directive.handle);
                    self.write_tag_content(&directive.prefix, true, true);
                    self.write_indent();
                }

                if !implicit {
                    self.write_indent();
                    self.write_indicator("---", true, false, false);
                }
                self.state = State::DocumentContent;
                Ok(())
            }
            EventData::StreamEnd => {
                self.flush(event.start)?;
                self.writer
                    .flush()
                    .map_err(|e| Error::emit(event.start, format!("write failed: {}", e)))?;
                debug!("Emitter stream end");
                self.state = State::End;
                Ok(())
            }
            _ => Err(unexpected(event, "document start or stream end")),
        }
    }

    fn set_tag_directives(
        &mut self,
        version: Option<&VersionDirective>,
        tags: &[TagDirective],
        mark: Mark,
    ) -> Result<()> {
        if let Some(version) = version {
            if version.major != 1 {
                return Err(Error::emit(
                    mark,
                    format!(
                        "incompatible %YAML directive {}.{}",
                        version.major, version.minor
                    ),
                ));
            }
        }
        for directive in tags {
            check_tag_directive(directive, mark)?;
            if self
                .tag_directives
                .iter()
                .any(|d| d.handle == directive.handle)
            {
                return Err(Error::emit(
                    mark,
                    format!("duplicate %TAG directive for {}", directive.handle),
                ));
            }
            self.tag_directives.push(directive.clone());
        }
        for (handle, prefix) in DEFAULT_TAG_DIRECTIVES {
            if !self.tag_directives.iter().any(|d| d.handle == handle) {
                self.tag_directives.push(TagDirective::new(handle, prefix));
            }
        }
        Ok(())
    }

    /// An untagged, unanchored empty plain root writes nothing, so its
    /// document needs a `---` to exist at all.
    fn empty_root_follows(&self) -> bool {
        matches!(
            self.events.front().map(|e| &e.data),
            Some(EventData::Scalar {
                anchor: None,
                tag: None,
                value,
                style: ScalarStyle::Plain,
            }) if value.is_empty()
        )
    }

    fn emit_document_content(&mut self, event: &Event) -> Result<()> {
        self.states.push(State::DocumentEnd);
        self.emit_node(event, false, false)
    }

    fn emit_document_end(&mut self, event: &Event) -> Result<()> {
        match event.data {
            EventData::DocumentEnd { implicit } => {
                self.write_indent();
                if implicit {
                    self.open_ended = true;
                } else {
                    self.write_indicator("...", true, false, false);
                    self.open_ended = false;
                    self.write_indent();
                }
                self.flush(event.start)?;
                self.state = State::DocumentStart;
                self.tag_directives.clear();
                self.anchors.clear();
                Ok(())
            }
            _ => Err(unexpected(event, "document end")),
        }
    }

    fn flush(&mut self, mark: Mark) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.writer
            .write_all(self.buffer.as_bytes())
            .map_err(|e| Error::emit(mark, format!("write failed: {}", e)))?;
        self.buffer.clear();
        Ok(())
    }

    // ========================================================================
    // Collections
    // ========================================================================

    fn emit_flow_sequence_item(&mut self, event: &Event, first: bool) -> Result<()> {
        if first {
            self.write_indicator("[", true, true, false);
            self.increase_indent(true, false);
            self.flow_level += 1;
        }
        if let EventData::SequenceEnd = event.data {
            self.flow_level -= 1;
            self.leave_collection();
            self.write_indicator("]", false, false, false);
            self.state = self.pop_state();
            return Ok(());
        }
        if !first {
            self.write_indicator(",", false, false, false);
        }
        self.states.push(State::FlowSequenceItem);
        self.emit_node(event, false, false)
    }

    fn emit_flow_mapping_key(&mut self, event: &Event, first: bool) -> Result<()> {
        if first {
            self.write_indicator("{", true, true, false);
            self.increase_indent(true, false);
            self.flow_level += 1;
        }
        if let EventData::MappingEnd = event.data {
            self.flow_level -= 1;
            self.leave_collection();
            self.write_indicator("}", false, false, false);
            self.state = self.pop_state();
            return Ok(());
        }
        if !first {
            self.write_indicator(",", false, false, false);
        }
        if self.check_simple_key(event) {
            self.states.push(State::FlowMappingSimpleValue);
            self.emit_node(event, true, true)
        } else {
            self.write_indicator("?", true, false, false);
            self.states.push(State::FlowMappingValue);
            self.emit_node(event, true, false)
        }
    }

    fn emit_flow_mapping_value(&mut self, event: &Event, simple: bool) -> Result<()> {
        if simple {
            self.write_indicator(":", false, false, false);
        } else {
            self.write_indicator(":", true, false, false);
        }
        self.states.push(State::FlowMappingKey);
        self.emit_node(event, true, false)
    }

    fn emit_block_sequence_item(&mut self, event: &Event, first: bool) -> Result<()> {
        if first {
            // A sequence that is a mapping value sits at the key's column.
            let indentless = self.mapping_context && !self.indention;
            self.increase_indent(false, indentless);
        }
        if let EventData::SequenceEnd = event.data {
            self.leave_collection();
            self.state = self.pop_state();
            return Ok(());
        }
        self.write_indent();
        self.write_indicator("-", true, false, true);
        self.states.push(State::BlockSequenceItem);
        self.emit_node(event, false, false)
    }

    fn emit_block_mapping_key(&mut self, event: &Event, first: bool) -> Result<()> {
        if first {
            self.increase_indent(false, false);
        }
        if let EventData::MappingEnd = event.data {
            self.leave_collection();
            self.state = self.pop_state();
            return Ok(());
        }
        self.write_indent();
        if self.check_simple_key(event) {
            self.states.push(State::BlockMappingSimpleValue);
            self.emit_node(event, true, true)
        } else {
            self.write_indicator("?", true, false, true);
            self.states.push(State::BlockMappingValue);
            self.emit_node(event, true, false)
        }
    }

    fn emit_block_mapping_value(&mut self, event: &Event, simple: bool) -> Result<()> {
        if simple {
            self.write_indicator(":", false, false, false);
        } else {
            self.write_indent();
            self.write_indicator(":", true, false, true);
        }
        self.states.push(State::BlockMappingKey);
        self.emit_node(event, true, false)
    }

    fn pop_state(&mut self) -> State {
        self.states.pop().unwrap_or(State::End)
    }

    fn increase_indent(&mut self, flow: bool, indentless: bool) {
        self.indents.push(self.indent);
        self.indent = Some(match self.indent {
            None if flow => self.best_indent,
            None => 0,
            Some(indent) if indentless => indent,
            Some(indent) => indent + self.best_indent,
        });
    }

    fn pop_indent(&mut self) {
        self.indent = self.indents.pop().flatten();
    }

    fn enter_collection(&mut self, mark: Mark) -> Result<()> {
        self.depth += 1;
        if self.depth > self.config.max_depth {
            return Err(Error::emit(
                mark,
                format!("nesting depth exceeds the limit of {}", self.config.max_depth),
            ));
        }
        Ok(())
    }

    fn leave_collection(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        self.pop_indent();
    }

    // ========================================================================
    // Nodes
    // ========================================================================

    fn emit_node(&mut self, event: &Event, mapping: bool, simple_key: bool) -> Result<()> {
        self.mapping_context = mapping;
        self.simple_key_context = simple_key;

        match &event.data {
            EventData::Alias { anchor } => self.emit_alias(event, anchor),
            EventData::Scalar {
                anchor,
                tag,
                value,
                style,
            } => self.emit_scalar(event, anchor.as_deref(), tag.as_deref(), value, *style),
            EventData::SequenceStart { anchor, tag, flow } => {
                self.enter_collection(event.start)?;
                self.process_anchor(anchor.as_deref(), event.start)?;
                self.process_tag(tag.as_deref(), event.start)?;
                let empty = matches!(
                    self.events.front().map(|e| &e.data),
                    Some(EventData::SequenceEnd)
                );
                self.state = if self.flow_level > 0 || *flow || empty {
                    State::FlowSequenceFirstItem
                } else {
                    State::BlockSequenceFirstItem
                };
                Ok(())
            }
            EventData::MappingStart { anchor, tag, flow } => {
                self.enter_collection(event.start)?;
                self.process_anchor(anchor.as_deref(), event.start)?;
                self.process_tag(tag.as_deref(), event.start)?;
                let empty = matches!(
                    self.events.front().map(|e| &e.data),
                    Some(EventData::MappingEnd)
                );
                self.state = if self.flow_level > 0 || *flow || empty {
                    State::FlowMappingFirstKey
                } else {
                    State::BlockMappingFirstKey
                };
                Ok(())
            }
            _ => Err(unexpected(event, "a scalar, sequence, mapping or alias")),
        }
    }

    fn emit_alias(&mut self, event: &Event, name: &str) -> Result<()> {
        check_anchor(name, event.start)?;
        if !self.anchors.contains(name) {
            return Err(Error::emit(
                event.start,
                format!("alias *{} refers to an anchor not defined earlier in the document", name),
            ));
        }
        self.write_anchor("*", name);
        if self.simple_key_context {
            self.put(' ');
        }
        self.state = self.pop_state();
        Ok(())
    }

    fn emit_scalar(
        &mut self,
        event: &Event,
        anchor: Option<&str>,
        tag: Option<&str>,
        value: &str,
        requested: ScalarStyle,
    ) -> Result<()> {
        let analysis = analyze_scalar(value);
        let style = self.select_scalar_style(tag, value, requested, &analysis);
        self.process_anchor(anchor, event.start)?;
        self.process_tag(tag, event.start)?;
        self.increase_indent(true, false);
        match style {
            ScalarStyle::Plain => self.write_plain(value),
            ScalarStyle::SingleQuoted => self.write_single_quoted(value),
            ScalarStyle::DoubleQuoted => self.write_double_quoted(value),
            ScalarStyle::Literal => self.write_literal(value),
            ScalarStyle::Folded => self.write_folded(value),
        }
        self.pop_indent();
        self.state = self.pop_state();
        Ok(())
    }

    fn select_scalar_style(
        &self,
        tag: Option<&str>,
        value: &str,
        requested: ScalarStyle,
        analysis: &ScalarAnalysis,
    ) -> ScalarStyle {
        let flow = self.flow_level > 0;
        let mut style = if self.config.preserve_style {
            requested
        } else {
            ScalarStyle::Plain
        };

        if self.simple_key_context && analysis.multiline {
            style = ScalarStyle::DoubleQuoted;
        }

        if style == ScalarStyle::Plain {
            let plain_allowed = if flow {
                analysis.flow_plain_allowed
            } else {
                analysis.block_plain_allowed
            };
            // A quoted string that reads back as null, bool or a number
            // must stay quoted.
            let changes_meaning = tag.is_none()
                && requested != ScalarStyle::Plain
                && resolves_to_non_string(value);
            if !plain_allowed
                || (value.is_empty() && (flow || self.simple_key_context))
                || changes_meaning
            {
                style = ScalarStyle::SingleQuoted;
            }
        }

        if style == ScalarStyle::SingleQuoted && !analysis.single_quoted_allowed {
            style = ScalarStyle::DoubleQuoted;
        }

        if matches!(style, ScalarStyle::Literal | ScalarStyle::Folded)
            && (!analysis.block_allowed || flow || self.simple_key_context)
        {
            style = ScalarStyle::DoubleQuoted;
        }

        style
    }

    /// Check if the node in `event` can be written as an implicit key.
    fn check_simple_key(&self, event: &Event) -> bool {
        let length = match &event.data {
            EventData::Alias { anchor } => anchor.len(),
            EventData::Scalar {
                anchor, tag, value, ..
            } => {
                if analyze_scalar(value).multiline {
                    return false;
                }
                property_length(anchor, tag) + value.len()
            }
            EventData::SequenceStart { anchor, tag, .. } => {
                if !matches!(
                    self.events.front().map(|e| &e.data),
                    Some(EventData::SequenceEnd)
                ) {
                    return false;
                }
                property_length(anchor, tag)
            }
            EventData::MappingStart { anchor, tag, .. } => {
                if !matches!(
                    self.events.front().map(|e| &e.data),
                    Some(EventData::MappingEnd)
                ) {
                    return false;
                }
                property_length(anchor, tag)
            }
            _ => return false,
        };
        length <= MAX_SIMPLE_KEY_LENGTH
    }

    fn process_anchor(&mut self, anchor: Option<&str>, mark: Mark) -> Result<()> {
        let Some(name) = anchor else {
            return Ok(());
        };
        check_anchor(name, mark)?;
        self.anchors.insert(name.to_string());
        self.write_anchor("&", name);
        Ok(())
    }

    fn process_tag(&mut self, tag: Option<&str>, mark: Mark) -> Result<()> {
        let Some(tag) = tag else {
            return Ok(());
        };
        match self.analyze_tag(tag, mark)? {
            TagForm::Shorthand { handle, suffix } => {
                self.write_tag_handle(&handle);
                if !suffix.is_empty() {
                    self.write_tag_content(&suffix, false, false);
                }
            }
            TagForm::Verbatim(uri) => {
                self.write_indicator("!<", true, false, false);
                self.write_tag_content(&uri, true, false);
                self.write_indicator(">", false, false, false);
            }
        }
        Ok(())
    }

    /// Shorten a resolved tag with the first directive whose prefix it
    /// extends.
    fn analyze_tag(&self, tag: &str, mark: Mark) -> Result<TagForm> {
        if tag.is_empty() {
            return Err(Error::emit(mark, "tag value must not be empty"));
        }
        if tag == "!" {
            return Ok(TagForm::Shorthand {
                handle: "!".to_string(),
                suffix: String::new(),
            });
        }
        for directive in &self.tag_directives {
            if directive.prefix.len() < tag.len() && tag.starts_with(&directive.prefix) {
                return Ok(TagForm::Shorthand {
                    handle: directive.handle.clone(),
                    suffix: tag[directive.prefix.len()..].to_string(),
                });
            }
        }
        Ok(TagForm::Verbatim(tag.to_string()))
    }

    // ========================================================================
    // Writers
    // ========================================================================

    fn put(&mut self, ch: char) {
        self.buffer.push(ch);
        self.column += 1;
    }

    fn put_break(&mut self) {
        self.buffer.push('\n');
        self.column = 0;
    }

    fn put_str(&mut self, s: &str) {
        for ch in s.chars() {
            self.put(ch);
        }
    }

    fn write_indent(&mut self) {
        let indent = self.indent.unwrap_or(0);
        if !self.indention || self.column > indent || (self.column == indent && !self.whitespace) {
            self.put_break();
        }
        while self.column < indent {
            self.put(' ');
        }
        self.whitespace = true;
        self.indention = true;
    }

    fn write_indicator(
        &mut self,
        indicator: &str,
        need_whitespace: bool,
        is_whitespace: bool,
        is_indention: bool,
    ) {
        if need_whitespace && !self.whitespace {
            self.put(' ');
        }
        self.put_str(indicator);
        self.whitespace = is_whitespace;
        self.indention = self.indention && is_indention;
    }

    fn write_anchor(&mut self, indicator: &str, name: &str) {
        self.write_indicator(indicator, true, false, false);
        self.put_str(name);
        self.whitespace = false;
        self.indention = false;
    }

    fn write_tag_handle(&mut self, handle: &str) {
        if !self.whitespace {
            self.put(' ');
        }
        self.put_str(handle);
        self.whitespace = false;
        self.indention = false;
    }

    fn write_tag_content(&mut self, content: &str, verbatim: bool, need_whitespace: bool) {
        if need_whitespace && !self.whitespace {
            self.put(' ');
        }
        for ch in content.chars() {
            if is_tag_char(ch, verbatim) {
                self.put(ch);
            } else {
                let mut buf = [0u8; 4];
                for byte in ch.encode_utf8(&mut buf).bytes() {
                    self.put_str(&format!("%{:02X}", byte));
                }
            }
        }
        self.whitespace = false;
        self.indention = false;
    }

    fn write_plain(&mut self, value: &str) {
        if !self.whitespace && !value.is_empty() {
            self.put(' ');
        }
        self.put_str(value);
        self.whitespace = false;
        self.indention = false;
    }

    fn write_single_quoted(&mut self, value: &str) {
        self.write_indicator("'", true, false, false);
        let mut breaks = false;
        for ch in value.chars() {
            if ch == '\n' {
                // One break folds to a space, so the first one is doubled.
                if !breaks {
                    self.put_break();
                }
                self.put_break();
                self.indention = true;
                breaks = true;
            } else {
                if breaks {
                    self.write_indent();
                }
                if ch == '\'' {
                    self.put('\'');
                }
                self.put(ch);
                self.indention = false;
                breaks = false;
            }
        }
        if breaks {
            self.write_indent();
        }
        self.write_indicator("'", false, false, false);
        self.whitespace = false;
        self.indention = false;
    }

    fn write_double_quoted(&mut self, value: &str) {
        self.write_indicator("\"", true, false, false);
        for ch in value.chars() {
            if !needs_escape(ch) {
                self.put(ch);
                continue;
            }
            self.put('\\');
            match ch {
                '\0' => self.put('0'),
                '\x07' => self.put('a'),
                '\x08' => self.put('b'),
                '\t' => self.put('t'),
                '\n' => self.put('n'),
                '\x0b' => self.put('v'),
                '\x0c' => self.put('f'),
                '\r' => self.put('r'),
                '\x1b' => self.put('e'),
                '"' => self.put('"'),
                '\\' => self.put('\\'),
                '\u{85}' => self.put('N'),
                '\u{a0}' => self.put('_'),
                '\u{2028}' => self.put('L'),
                '\u{2029}' => self.put('P'),
                c if (c as u32) <= 0xff => self.put_str(&format!("x{:02X}", c as u32)),
                c if (c as u32) <= 0xffff => self.put_str(&format!("u{:04X}", c as u32)),
                c => self.put_str(&format!("U{:08X}", c as u32)),
            }
        }
        self.write_indicator("\"", false, false, false);
        self.whitespace = false;
        self.indention = false;
    }

    /// Indentation and chomping indicators for a block scalar.
    fn write_block_hints(&mut self, value: &str) {
        let mut hints = String::new();
        if value.starts_with([' ', '\n']) {
            hints.push_str(&self.best_indent.to_string());
        }
        if !value.ends_with('\n') {
            hints.push('-');
        } else if value == "\n" || value.ends_with("\n\n") {
            hints.push('+');
        }
        if !hints.is_empty() {
            self.write_indicator(&hints, false, false, false);
        }
    }

    fn write_literal(&mut self, value: &str) {
        self.write_indicator("|", true, false, false);
        self.write_block_hints(value);
        self.put_break();
        self.indention = true;
        self.whitespace = true;
        let mut breaks = true;
        for ch in value.chars() {
            if ch == '\n' {
                self.put_break();
                self.indention = true;
                breaks = true;
            } else {
                if breaks {
                    self.write_indent();
                }
                self.put(ch);
                self.indention = false;
                breaks = false;
            }
        }
    }

    fn write_folded(&mut self, value: &str) {
        self.write_indicator(">", true, false, false);
        self.write_block_hints(value);
        self.put_break();
        self.indention = true;
        self.whitespace = true;
        let chars: Vec<char> = value.chars().collect();
        let mut breaks = true;
        let mut leading_spaces = true;
        for (i, &ch) in chars.iter().enumerate() {
            if ch == '\n' {
                // A break between two unindented lines folds to a space on
                // reading, so it needs an extra empty line.
                if !breaks && !leading_spaces {
                    let next = chars[i..].iter().find(|&&c| c != '\n');
                    if matches!(next, Some(&c) if c != ' ' && c != '\t') {
                        self.put_break();
                    }
                }
                self.put_break();
                self.indention = true;
                breaks = true;
            } else {
                if breaks {
                    self.write_indent();
                    leading_spaces = ch == ' ' || ch == '\t';
                }
                self.put(ch);
                self.indention = false;
                breaks = false;
            }
        }
    }
}

fn unexpected(event: &Event, expected: &str) -> Error {
    Error::emit(
        event.start,
        format!("expected {}, found {}", expected, event.kind_name()),
    )
}

fn property_length(anchor: &Option<String>, tag: &Option<String>) -> usize {
    anchor.as_ref().map_or(0, String::len) + tag.as_ref().map_or(0, String::len)
}

fn is_blank(ch: char) -> bool {
    ch == ' ' || ch == '\t'
}

fn is_flow_indicator(ch: char) -> bool {
    matches!(ch, ',' | '[' | ']' | '{' | '}')
}

/// Characters that cannot appear raw in any scalar but a double-quoted one.
fn is_special(ch: char) -> bool {
    !is_printable(ch) || matches!(ch, '\r' | '\u{85}' | '\u{feff}' | '\u{2028}' | '\u{2029}')
}

fn needs_escape(ch: char) -> bool {
    is_special(ch) || matches!(ch, '\n' | '"' | '\\')
}

fn is_tag_char(ch: char, verbatim: bool) -> bool {
    ch.is_ascii_alphanumeric()
        || matches!(
            ch,
            '-' | '_' | ';' | '/' | '?' | ':' | '@' | '&' | '=' | '+' | '$' | '.' | '~' | '*'
                | '\'' | '(' | ')' | '#'
        )
        || (verbatim && (ch == '!' || is_flow_indicator(ch)))
}

fn check_anchor(name: &str, mark: Mark) -> Result<()> {
    if name.is_empty() {
        return Err(Error::emit(mark, "anchor name must not be empty"));
    }
    if let Some(ch) = name
        .chars()
        .find(|&ch| is_blank(ch) || is_flow_indicator(ch) || ch == '\n' || is_special(ch))
    {
        return Err(Error::emit(
            mark,
            format!("anchor name {:?} contains {:?}", name, ch),
        ));
    }
    Ok(())
}

fn check_tag_directive(directive: &TagDirective, mark: Mark) -> Result<()> {
    let handle = directive.handle.as_str();
    if !handle.starts_with('!') || !handle.ends_with('!') {
        return Err(Error::emit(
            mark,
            format!("tag handle {:?} must start and end with '!'", handle),
        ));
    }
    let inner = handle.get(1..handle.len().saturating_sub(1)).unwrap_or("");
    if !inner
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::emit(
            mark,
            format!("tag handle {:?} must contain word characters only", handle),
        ));
    }
    if directive.prefix.is_empty() {
        return Err(Error::emit(mark, "tag prefix must not be empty"));
    }
    Ok(())
}

/// Work out which styles can carry `value` without changing it on reading.
fn analyze_scalar(value: &str) -> ScalarAnalysis {
    if value.is_empty() {
        return ScalarAnalysis {
            multiline: false,
            flow_plain_allowed: false,
            block_plain_allowed: true,
            single_quoted_allowed: true,
            block_allowed: false,
        };
    }

    let mut flow_indicators = false;
    let mut block_indicators = false;
    if value.starts_with("---") || value.starts_with("...") {
        flow_indicators = true;
        block_indicators = true;
    }

    let mut line_breaks = false;
    let mut special_characters = false;
    let mut leading_space = false;
    let mut leading_break = false;
    let mut trailing_space = false;
    let mut trailing_break = false;
    let mut break_space = false;
    let mut space_break = false;
    let mut previous_space = false;
    let mut previous_break = false;
    let mut preceded_by_whitespace = true;

    let chars: Vec<char> = value.chars().collect();
    for (i, &ch) in chars.iter().enumerate() {
        let first = i == 0;
        let last = i + 1 == chars.len();
        let followed_by_whitespace = chars
            .get(i + 1)
            .map_or(true, |&next| is_blank(next) || next == '\n');

        if first {
            match ch {
                '#' | ',' | '[' | ']' | '{' | '}' | '&' | '*' | '!' | '|' | '>' | '\'' | '"'
                | '%' | '@' | '`' => {
                    flow_indicators = true;
                    block_indicators = true;
                }
                '?' | ':' => {
                    flow_indicators = true;
                    block_indicators |= followed_by_whitespace;
                }
                '-' if followed_by_whitespace => {
                    flow_indicators = true;
                    block_indicators = true;
                }
                _ => {}
            }
        } else {
            match ch {
                ',' | '?' | '[' | ']' | '{' | '}' => flow_indicators = true,
                ':' => {
                    flow_indicators = true;
                    block_indicators |= followed_by_whitespace;
                }
                '#' if preceded_by_whitespace => {
                    flow_indicators = true;
                    block_indicators = true;
                }
                _ => {}
            }
        }

        if is_special(ch) {
            special_characters = true;
        }

        if is_blank(ch) {
            leading_space |= first;
            trailing_space |= last;
            break_space |= previous_break;
            previous_space = true;
            previous_break = false;
        } else if ch == '\n' {
            line_breaks = true;
            leading_break |= first;
            trailing_break |= last;
            space_break |= previous_space;
            previous_break = true;
            previous_space = false;
        } else {
            previous_space = false;
            previous_break = false;
        }

        preceded_by_whitespace = is_blank(ch) || ch == '\n';
    }

    let mut analysis = ScalarAnalysis {
        multiline: line_breaks,
        flow_plain_allowed: true,
        block_plain_allowed: true,
        single_quoted_allowed: true,
        block_allowed: true,
    };
    if leading_space || leading_break || trailing_space || trailing_break {
        analysis.flow_plain_allowed = false;
        analysis.block_plain_allowed = false;
    }
    if trailing_space {
        analysis.block_allowed = false;
    }
    if break_space {
        analysis.flow_plain_allowed = false;
        analysis.block_plain_allowed = false;
        analysis.single_quoted_allowed = false;
    }
    if space_break || special_characters {
        analysis.flow_plain_allowed = false;
        analysis.block_plain_allowed = false;
        analysis.single_quoted_allowed = false;
        analysis.block_allowed = false;
    }
    if line_breaks {
        analysis.flow_plain_allowed = false;
        analysis.block_plain_allowed = false;
    }
    if flow_indicators {
        analysis.flow_plain_allowed = false;
    }
    if block_indicators {
        analysis.block_plain_allowed = false;
    }
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit_with(config: EmitterConfig, body: Vec<Event>) -> Result<String> {
        let mut emitter = Emitter::with_config(Vec::new(), config);
        emitter.emit(Event::stream_start())?;
        for event in body {
            emitter.emit(event)?;
        }
        emitter.emit(Event::stream_end())?;
        Ok(String::from_utf8(emitter.into_inner()).expect("emitter writes UTF-8"))
    }

    /// Emit one implicit document holding `body`.
    fn emit_doc(body: Vec<Event>) -> String {
        let mut events = vec![Event::document_start(true)];
        events.extend(body);
        events.push(Event::document_end(true));
        emit_with(EmitterConfig::default(), events).expect("emit")
    }

    fn scalar(value: &str, style: ScalarStyle) -> Event {
        Event::scalar(None, None, value, style)
    }

    fn plain(value: &str) -> Event {
        Event::plain_scalar(value)
    }

    #[test]
    fn test_emit_block_mapping() {
        let out = emit_doc(vec![
            Event::mapping_start(None, None, false),
            plain("key"),
            plain("value"),
            Event::mapping_end(),
        ]);
        assert_eq!(out, "key: value\n");
    }

    #[test]
    fn test_emit_nested_block_collections() {
        let out = emit_doc(vec![
            Event::mapping_start(None, None, false),
            plain("a"),
            Event::mapping_start(None, None, false),
            plain("b"),
            plain("c"),
            Event::mapping_end(),
            plain("list"),
            Event::sequence_start(None, None, false),
            plain("x"),
            Event::mapping_start(None, None, false),
            plain("k"),
            plain("v"),
            plain("m"),
            plain("n"),
            Event::mapping_end(),
            Event::sequence_end(),
            Event::mapping_end(),
        ]);
        assert_eq!(out, "a:\n  b: c\nlist:\n- x\n- k: v\n  m: n\n");
    }

    #[test]
    fn test_emit_unclosed_sequence_fails() {
        let events = vec![
            Event::document_start(true),
            Event::mapping_start(None, None, false),
            plain("list"),
            Event::sequence_start(None, None, false),
            plain("x"),
            Event::mapping_end(),
        ];
        let err = emit_with(EmitterConfig::default(), events).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Emit error: expected a scalar, sequence, mapping or alias, found mapping end"
        );
    }

    #[test]
    fn test_emit_nested_sequences() {
        let out = emit_doc(vec![
            Event::sequence_start(None, None, false),
            Event::sequence_start(None, None, false),
            plain("a"),
            plain("b"),
            Event::sequence_end(),
            plain("c"),
            Event::sequence_end(),
        ]);
        assert_eq!(out, "- - a\n  - b\n- c\n");
    }

    #[test]
    fn test_emit_flow_collections() {
        let out = emit_doc(vec![
            Event::mapping_start(None, None, false),
            plain("seq"),
            Event::sequence_start(None, None, true),
            plain("a"),
            plain("b"),
            Event::sequence_end(),
            plain("map"),
            Event::mapping_start(None, None, true),
            plain("k"),
            plain("v"),
            Event::mapping_end(),
            plain("empty"),
            Event::sequence_start(None, None, false),
            Event::sequence_end(),
            Event::mapping_end(),
        ]);
        assert_eq!(out, "seq: [a, b]\nmap: {k: v}\nempty: []\n");
    }

    #[test]
    fn test_emit_complex_keys() {
        let out = emit_doc(vec![
            Event::mapping_start(None, None, false),
            Event::sequence_start(None, None, false),
            plain("a"),
            Event::sequence_end(),
            plain("v"),
            Event::mapping_end(),
        ]);
        assert_eq!(out, "? - a\n: v\n");

        let out = emit_doc(vec![
            Event::mapping_start(None, None, true),
            Event::sequence_start(None, None, true),
            plain("a"),
            Event::sequence_end(),
            plain("v"),
            Event::mapping_end(),
        ]);
        assert_eq!(out, "{? [a] : v}\n");
    }

    #[test]
    fn test_emit_anchor_and_alias() {
        let out = emit_doc(vec![
            Event::mapping_start(None, None, false),
            plain("a"),
            Event::scalar(Some("x"), None, "1", ScalarStyle::Plain),
            plain("b"),
            Event::alias("x"),
            Event::alias("x"),
            plain("c"),
            Event::mapping_end(),
        ]);
        assert_eq!(out, "a: &x 1\nb: *x\n*x : c\n");
    }

    #[test]
    fn test_emit_tags() {
        let out = emit_doc(vec![
            Event::sequence_start(None, None, false),
            Event::scalar(None, Some("tag:yaml.org,2002:str"), "1", ScalarStyle::Plain),
            Event::scalar(None, Some("!local"), "x", ScalarStyle::Plain),
            Event::scalar(None, Some("!"), "y", ScalarStyle::Plain),
            Event::scalar(None, Some("tag:example.com,2000:a b"), "z", ScalarStyle::Plain),
            Event::sequence_end(),
        ]);
        assert_eq!(
            out,
            "- !!str 1\n- !local x\n- ! y\n- !<tag:example.com,2000:a%20b> z\n"
        );
    }

    #[test]
    fn test_emit_tag_directives() {
        let events = vec![
            Event::from(EventData::DocumentStart {
                implicit: false,
                version: Some(VersionDirective { major: 1, minor: 2 }),
                tags: vec![TagDirective::new("!e!", "tag:example.com,2000:")],
            }),
            Event::scalar(None, Some("tag:example.com,2000:foo"), "x", ScalarStyle::Plain),
            Event::document_end(true),
        ];
        let out = emit_with(EmitterConfig::default(), events).unwrap();
        assert_eq!(out, "%YAML 1.2\n%TAG !e! tag:example.com,2000:\n--- !e!foo x\n");
    }

    #[test]
    fn test_emit_quotes_when_plain_would_misread() {
        let out = emit_doc(vec![
            Event::sequence_start(None, None, false),
            scalar("true", ScalarStyle::SingleQuoted),
            scalar("true", ScalarStyle::Plain),
            plain("a: b"),
            plain("- x"),
            plain(" lead"),
            plain("#hash"),
            plain("it's"),
            plain("tab\x01"),
            Event::sequence_end(),
        ]);
        assert_eq!(
            out,
            "- 'true'\n- true\n- 'a: b'\n- '- x'\n- ' lead'\n- '#hash'\n- it's\n- \"tab\\x01\"\n"
        );
    }

    #[test]
    fn test_emit_restyle_picks_plain() {
        let config = EmitterConfig {
            preserve_style: false,
            ..EmitterConfig::default()
        };
        let events = vec![
            Event::document_start(true),
            Event::sequence_start(None, None, false),
            scalar("hello", ScalarStyle::DoubleQuoted),
            scalar("12", ScalarStyle::DoubleQuoted),
            scalar("", ScalarStyle::SingleQuoted),
            scalar("a\nb", ScalarStyle::Literal),
            Event::sequence_end(),
            Event::document_end(true),
        ];
        let out = emit_with(config, events).unwrap();
        assert_eq!(out, "- hello\n- '12'\n- ''\n- 'a\n\n  b'\n");
    }

    #[test]
    fn test_emit_single_quoted_escapes() {
        let out = emit_doc(vec![scalar("it's\nhere", ScalarStyle::SingleQuoted)]);
        assert_eq!(out, "'it''s\n\n  here'\n");
    }

    #[test]
    fn test_emit_double_quoted_escapes() {
        let out = emit_doc(vec![scalar(
            "a\"b\\c\n\t\u{85}\u{2028}\u{1F600}\u{7F}",
            ScalarStyle::DoubleQuoted,
        )]);
        assert_eq!(out, "\"a\\\"b\\\\c\\n\t\\N\\L\u{1F600}\\x7F\"\n");
    }

    #[test]
    fn test_emit_literal_block() {
        let out = emit_doc(vec![
            Event::mapping_start(None, None, false),
            plain("clip"),
            scalar("a\nb\n", ScalarStyle::Literal),
            plain("strip"),
            scalar("a", ScalarStyle::Literal),
            plain("keep"),
            scalar("a\n\n", ScalarStyle::Literal),
            plain("indented"),
            scalar(" a\n", ScalarStyle::Literal),
            Event::mapping_end(),
        ]);
        assert_eq!(
            out,
            "clip: |\n  a\n  b\nstrip: |-\n  a\nkeep: |+\n  a\n\nindented: |2\n   a\n"
        );
    }

    #[test]
    fn test_emit_folded_block() {
        let out = emit_doc(vec![scalar("a b\nc\n\n d\n", ScalarStyle::Folded)]);
        assert_eq!(out, ">\n  a b\n\n  c\n\n   d\n");
    }

    #[test]
    fn test_emit_block_style_falls_back_in_flow() {
        let out = emit_doc(vec![
            Event::sequence_start(None, None, true),
            scalar("a\nb", ScalarStyle::Literal),
            Event::sequence_end(),
        ]);
        assert_eq!(out, "[\"a\\nb\"]\n");
    }

    #[test]
    fn test_emit_empty_values() {
        let out = emit_doc(vec![
            Event::mapping_start(None, None, false),
            plain("a"),
            plain(""),
            plain("b"),
            Event::sequence_start(None, None, true),
            plain(""),
            Event::sequence_end(),
            Event::mapping_end(),
        ]);
        assert_eq!(out, "a:\nb: ['']\n");
    }

    #[test]
    fn test_emit_empty_root_gets_marker() {
        let out = emit_doc(vec![plain("")]);
        assert_eq!(out, "---\n");
    }

    #[test]
    fn test_emit_multiple_documents() {
        let events = vec![
            Event::document_start(true),
            plain("a"),
            Event::document_end(true),
            Event::document_start(true),
            plain("b"),
            Event::document_end(false),
            Event::from(EventData::DocumentStart {
                implicit: true,
                version: Some(VersionDirective { major: 1, minor: 2 }),
                tags: Vec::new(),
            }),
            plain("c"),
            Event::document_end(true),
            Event::from(EventData::DocumentStart {
                implicit: true,
                version: Some(VersionDirective { major: 1, minor: 1 }),
                tags: Vec::new(),
            }),
            plain("d"),
            Event::document_end(true),
        ];
        let out = emit_with(EmitterConfig::default(), events).unwrap();
        assert_eq!(
            out,
            "a\n--- b\n...\n%YAML 1.2\n--- c\n...\n%YAML 1.1\n--- d\n"
        );
    }

    #[test]
    fn test_emit_indent_config() {
        let config = EmitterConfig {
            indent: 4,
            ..EmitterConfig::default()
        };
        let events = vec![
            Event::document_start(true),
            Event::mapping_start(None, None, false),
            plain("a"),
            Event::mapping_start(None, None, false),
            plain("b"),
            plain("c"),
            Event::mapping_end(),
            Event::mapping_end(),
            Event::document_end(true),
        ];
        assert_eq!(emit_with(config, events).unwrap(), "a:\n    b: c\n");
    }

    #[test]
    fn test_emit_undefined_alias_fails() {
        let err = emit_with(
            EmitterConfig::default(),
            vec![
                Event::document_start(true),
                Event::alias("nope"),
                Event::document_end(true),
            ],
        )
        .unwrap_err();
        assert_eq!(err.kind_name(), "emit");
        assert!(err.to_string().contains("*nope"), "{}", err);
    }

    #[test]
    fn test_emit_anchor_does_not_cross_documents() {
        let err = emit_with(
            EmitterConfig::default(),
            vec![
                Event::document_start(true),
                Event::scalar(Some("a"), None, "1", ScalarStyle::Plain),
                Event::document_end(true),
                Event::document_start(true),
                Event::alias("a"),
                Event::document_end(true),
            ],
        )
        .unwrap_err();
        assert_eq!(err.kind_name(), "emit");
    }

    #[test]
    fn test_emit_rejects_bad_order() {
        let mut emitter = Emitter::new(Vec::new());
        emitter.emit(Event::stream_start()).unwrap();
        let err = emitter.emit(plain("x")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Emit error: expected document start or stream end, found scalar"
        );
        let again = emitter.emit(Event::stream_end()).unwrap_err();
        assert_eq!(again, err);
    }

    #[test]
    fn test_emit_depth_limit() {
        let config = EmitterConfig {
            max_depth: 1,
            ..EmitterConfig::default()
        };
        let err = emit_with(
            config,
            vec![
                Event::document_start(true),
                Event::sequence_start(None, None, false),
                Event::sequence_start(None, None, false),
                plain("a"),
                Event::sequence_end(),
                Event::sequence_end(),
                Event::document_end(true),
            ],
        )
        .unwrap_err();
        assert_eq!(err.kind_name(), "emit");
    }

    #[test]
    fn test_emit_rejects_empty_anchor_and_tag() {
        let empty_anchor = emit_with(
            EmitterConfig::default(),
            vec![
                Event::document_start(true),
                Event::scalar(Some(""), None, "x", ScalarStyle::Plain),
                Event::document_end(true),
            ],
        );
        assert!(empty_anchor.is_err());
        let empty_tag = emit_with(
            EmitterConfig::default(),
            vec![
                Event::document_start(true),
                Event::scalar(None, Some(""), "x", ScalarStyle::Plain),
                Event::document_end(true),
            ],
        );
        assert!(empty_tag.is_err());
    }

    #[test]
    fn test_analyze_scalar() {
        let a = analyze_scalar("plain words");
        assert!(a.flow_plain_allowed && a.block_plain_allowed && !a.multiline);
        let a = analyze_scalar("a, b");
        assert!(!a.flow_plain_allowed && a.block_plain_allowed);
        let a = analyze_scalar("x: y");
        assert!(!a.block_plain_allowed);
        let a = analyze_scalar("x:y");
        assert!(a.block_plain_allowed && !a.flow_plain_allowed);
        let a = analyze_scalar("a \nb");
        assert!(!a.single_quoted_allowed && !a.block_allowed);
        let a = analyze_scalar("a\n b");
        assert!(!a.single_quoted_allowed && a.block_allowed && a.multiline);
        let a = analyze_scalar("trailing ");
        assert!(!a.block_allowed && a.single_quoted_allowed);
        let a = analyze_scalar("--- x");
        assert!(!a.block_plain_allowed);
    }
}
