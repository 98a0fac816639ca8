//! YAML event representation.

use crate::reader::{Encoding, Mark};

/// Presentation style of a scalar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ScalarStyle {
    /// Unquoted.
    #[default]
    Plain,
    /// `'...'`
    SingleQuoted,
    /// `"..."`
    DoubleQuoted,
    /// `|` block.
    Literal,
    /// `>` block.
    Folded,
}

/// `%YAML major.minor`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VersionDirective {
    pub major: u32,
    pub minor: u32,
}

/// `%TAG handle prefix`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TagDirective {
    pub handle: String,
    pub prefix: String,
}

impl TagDirective {
    pub fn new(handle: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            prefix: prefix.into(),
        }
    }
}

/// Payload of an event. Each variant carries only its own fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventData {
    StreamStart {
        encoding: Encoding,
    },
    StreamEnd,
    DocumentStart {
        /// No `---` marker in the source.
        implicit: bool,
        version: Option<VersionDirective>,
        tags: Vec<TagDirective>,
    },
    DocumentEnd {
        /// No `...` marker in the source.
        implicit: bool,
    },
    Alias {
        anchor: String,
    },
    Scalar {
        anchor: Option<String>,
        /// Resolved tag, e.g. `tag:yaml.org,2002:str`, or `!` for the
        /// non-specific tag.
        tag: Option<String>,
        value: String,
        style: ScalarStyle,
    },
    SequenceStart {
        anchor: Option<String>,
        tag: Option<String>,
        flow: bool,
    },
    SequenceEnd,
    MappingStart {
        anchor: Option<String>,
        tag: Option<String>,
        flow: bool,
    },
    MappingEnd,
}

/// A structural event with its source span.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub data: EventData,
    pub start: Mark,
    pub end: Mark,
}

impl Event {
    pub fn new(data: EventData, start: Mark, end: Mark) -> Self {
        Self { data, start, end }
    }

    pub fn stream_start() -> Self {
        EventData::StreamStart {
            encoding: Encoding::Utf8,
        }
        .into()
    }

    pub fn stream_end() -> Self {
        EventData::StreamEnd.into()
    }

    pub fn document_start(implicit: bool) -> Self {
        EventData::DocumentStart {
            implicit,
            version: None,
            tags: Vec::new(),
        }
        .into()
    }

    pub fn document_end(implicit: bool) -> Self {
        EventData::DocumentEnd { implicit }.into()
    }

    pub fn alias(anchor: impl Into<String>) -> Self {
        EventData::Alias {
            anchor: anchor.into(),
        }
        .into()
    }

    /// An untagged, unanchored plain scalar.
    pub fn plain_scalar(value: impl Into<String>) -> Self {
        Self::scalar(None, None, value, ScalarStyle::Plain)
    }

    pub fn scalar(
        anchor: Option<&str>,
        tag: Option<&str>,
        value: impl Into<String>,
        style: ScalarStyle,
    ) -> Self {
        EventData::Scalar {
            anchor: anchor.map(String::from),
            tag: tag.map(String::from),
            value: value.into(),
            style,
        }
        .into()
    }

    pub fn sequence_start(anchor: Option<&str>, tag: Option<&str>, flow: bool) -> Self {
        EventData::SequenceStart {
            anchor: anchor.map(String::from),
            tag: tag.map(String::from),
            flow,
        }
        .into()
    }

    pub fn sequence_end() -> Self {
        EventData::SequenceEnd.into()
    }

    pub fn mapping_start(anchor: Option<&str>, tag: Option<&str>, flow: bool) -> Self {
        EventData::MappingStart {
            anchor: anchor.map(String::from),
            tag: tag.map(String::from),
            flow,
        }
        .into()
    }

    pub fn mapping_end() -> Self {
        EventData::MappingEnd.into()
    }

    /// Returns the anchor defined by a scalar or collection start, or the
    /// anchor referenced by an alias.
    pub fn anchor(&self) -> Option<&str> {
        match &self.data {
            EventData::Alias { anchor } => Some(anchor),
            EventData::Scalar { anchor, .. }
            | EventData::SequenceStart { anchor, .. }
            | EventData::MappingStart { anchor, .. } => anchor.as_deref(),
            _ => None,
        }
    }

    /// Returns the resolved tag of a scalar or collection start.
    pub fn tag(&self) -> Option<&str> {
        match &self.data {
            EventData::Scalar { tag, .. }
            | EventData::SequenceStart { tag, .. }
            | EventData::MappingStart { tag, .. } => tag.as_deref(),
            _ => None,
        }
    }

    /// Returns the value if this is a `Scalar`.
    pub fn scalar_value(&self) -> Option<&str> {
        match &self.data {
            EventData::Scalar { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Returns the style if this is a `Scalar`.
    pub fn scalar_style(&self) -> Option<ScalarStyle> {
        match &self.data {
            EventData::Scalar { style, .. } => Some(*style),
            _ => None,
        }
    }

    /// Returns the flow flag if this is a collection start.
    pub fn is_flow(&self) -> Option<bool> {
        match &self.data {
            EventData::SequenceStart { flow, .. } | EventData::MappingStart { flow, .. } => {
                Some(*flow)
            }
            _ => None,
        }
    }

    /// Short name of the event kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.data {
            EventData::StreamStart { .. } => "stream start",
            EventData::StreamEnd => "stream end",
            EventData::DocumentStart { .. } => "document start",
            EventData::DocumentEnd { .. } => "document end",
            EventData::Alias { .. } => "alias",
            EventData::Scalar { .. } => "scalar",
            EventData::SequenceStart { .. } => "sequence start",
            EventData::SequenceEnd => "sequence end",
            EventData::MappingStart { .. } => "mapping start",
            EventData::MappingEnd => "mapping end",
        }
    }
}

impl From<EventData> for Event {
    fn from(data: EventData) -> Self {
        Event::new(data, Mark::default(), Mark::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors_match_variant() {
        let event = Event::scalar(Some("a"), Some("!x"), "v", ScalarStyle::Folded);
        assert_eq!(event.anchor(), Some("a"));
        assert_eq!(event.tag(), Some("!x"));
        assert_eq!(event.scalar_value(), Some("v"));
        assert_eq!(event.scalar_style(), Some(ScalarStyle::Folded));
        assert_eq!(event.is_flow(), None);
    }

    #[test]
    fn test_accessors_on_other_variants() {
        let alias = Event::alias("x");
        assert_eq!(alias.anchor(), Some("x"));
        assert_eq!(alias.tag(), None);
        assert_eq!(alias.scalar_value(), None);

        let seq = Event::sequence_start(None, Some("!s"), true);
        assert_eq!(seq.anchor(), None);
        assert_eq!(seq.tag(), Some("!s"));
        assert_eq!(seq.is_flow(), Some(true));

        assert_eq!(Event::stream_end().anchor(), None);
        assert_eq!(Event::mapping_end().kind_name(), "mapping end");
    }
}
