//! Tokens passed from the scanner to the parser.
//!
//! Block structure that YAML expresses through indentation is made explicit
//! here: the scanner emits `BlockSequenceStart`/`BlockMappingStart` when a
//! collection opens at a deeper column and `BlockEnd` for every level it
//! closes, so the parser never looks at columns.

use crate::event::ScalarStyle;
use crate::reader::{Encoding, Mark};

/// Token kind with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
    StreamStart(Encoding),
    StreamEnd,
    /// `%YAML major.minor`
    VersionDirective(u32, u32),
    /// `%TAG handle prefix`
    TagDirective { handle: String, prefix: String },
    /// `---`
    DocumentStart,
    /// `...`
    DocumentEnd,
    BlockSequenceStart,
    BlockMappingStart,
    BlockEnd,
    FlowSequenceStart,
    FlowSequenceEnd,
    FlowMappingStart,
    FlowMappingEnd,
    /// `-` in block context.
    BlockEntry,
    /// `,` in flow context.
    FlowEntry,
    /// Explicit `?` or the inserted marker before a simple key.
    Key,
    /// `:`
    Value,
    Alias(String),
    Anchor(String),
    /// Unresolved tag; an empty handle with suffix `!` is the lone `!`.
    Tag { handle: String, suffix: String },
    Scalar { value: String, style: ScalarStyle },
}

impl TokenKind {
    /// Human-readable name used in parse error messages.
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::StreamStart(_) => "stream start",
            TokenKind::StreamEnd => "stream end",
            TokenKind::VersionDirective(..) => "%YAML directive",
            TokenKind::TagDirective { .. } => "%TAG directive",
            TokenKind::DocumentStart => "'---'",
            TokenKind::DocumentEnd => "'...'",
            TokenKind::BlockSequenceStart => "block sequence start",
            TokenKind::BlockMappingStart => "block mapping start",
            TokenKind::BlockEnd => "block end",
            TokenKind::FlowSequenceStart => "'['",
            TokenKind::FlowSequenceEnd => "']'",
            TokenKind::FlowMappingStart => "'{'",
            TokenKind::FlowMappingEnd => "'}'",
            TokenKind::BlockEntry => "'-'",
            TokenKind::FlowEntry => "','",
            TokenKind::Key => "key",
            TokenKind::Value => "':'",
            TokenKind::Alias(_) => "alias",
            TokenKind::Anchor(_) => "anchor",
            TokenKind::Tag { .. } => "tag",
            TokenKind::Scalar { .. } => "scalar",
        }
    }
}

/// A single token with its source span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub start: Mark,
    pub end: Mark,
}

impl Token {
    pub fn new(kind: TokenKind, start: Mark, end: Mark) -> Self {
        Self { kind, start, end }
    }
}
