//! Streaming YAML event decoder and emitter.
//!
//! Bytes go in, a flat sequence of structural events comes out: stream and
//! document boundaries, scalars, collection boundaries, and aliases. The
//! emitter runs the other way and writes YAML text for an event sequence.
//! No native values are built; consumers that want trees or typed data
//! layer them on top of the events.
//!
//! # Decoding Pipeline
//!
//! A [`Parser`] session pulls work through three stages:
//!
//! 1. **Reader**: Detects the encoding from the byte order mark, decodes
//!    UTF-8/16/32 into characters, normalizes line breaks and rejects
//!    forbidden code points.
//!
//! 2. **Scanner**: Turns characters into tokens, tracking indentation,
//!    flow nesting and possible simple keys.
//!
//! 3. **Parser**: Checks the token stream against the grammar and produces
//!    events, resolving tags and validating aliases.
//!
//! Each stage runs only as far as the next event requires.

mod anchors;
mod config;
mod dump;
mod emitter;
mod error;
mod event;
mod parser;
mod reader;
mod resolve;
mod scanner;
mod token;

pub use config::{EmitterConfig, ParserConfig, DEFAULT_MAX_DEPTH};
pub use dump::{format_event, format_events};
pub use emitter::Emitter;
pub use error::{Error, ParseContext, Result};
pub use event::{Event, EventData, ScalarStyle, TagDirective, VersionDirective};
pub use parser::Parser;
pub use reader::{Encoding, Mark};

/// Decode a whole YAML stream into events.
///
/// # Example
///
/// ```
/// use libyamlev::{format_events, parse};
///
/// let events = parse("key: value\n").unwrap();
/// assert_eq!(
///     format_events(&events),
///     "+STR\n+DOC\n+MAP\n=VAL :key\n=VAL :value\n-MAP\n-DOC\n-STR\n"
/// );
/// ```
pub fn parse(input: &str) -> Result<Vec<Event>> {
    parse_with_filename(input, None)
}

/// Decode a whole YAML stream with a filename for error messages.
pub fn parse_with_filename(input: &str, filename: Option<&str>) -> Result<Vec<Event>> {
    let config = ParserConfig {
        filename: filename.map(String::from),
        ..ParserConfig::default()
    };
    Parser::with_config(input.as_bytes(), config).collect()
}

/// Decode a whole YAML stream from raw bytes in any supported encoding.
pub fn parse_bytes(input: &[u8]) -> Result<Vec<Event>> {
    Parser::new(input).collect()
}

/// Write an event sequence as YAML text.
///
/// # Example
///
/// ```
/// use libyamlev::{emit, parse};
///
/// let events = parse("- a\n- b\n").unwrap();
/// assert_eq!(emit(&events).unwrap(), "- a\n- b\n");
/// ```
pub fn emit(events: &[Event]) -> Result<String> {
    emit_with_config(events, EmitterConfig::default())
}

/// Write an event sequence as YAML text with explicit emitter settings.
pub fn emit_with_config(events: &[Event], config: EmitterConfig) -> Result<String> {
    let mut emitter = Emitter::with_config(Vec::new(), config);
    for event in events {
        emitter.emit(event.clone())?;
    }
    String::from_utf8(emitter.into_inner())
        .map_err(|e| Error::emit(Mark::default(), format!("output is not UTF-8: {}", e)))
}
