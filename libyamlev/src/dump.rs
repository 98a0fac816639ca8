//! Line-per-event text notation.
//!
//! Each event becomes one line such as `+MAP {} &a <tag>` or `=VAL :text`,
//! the form used by the YAML test suite. Fixtures and the command line tool
//! compare and print events in this form.

use crate::event::{Event, EventData, ScalarStyle};

/// Format a whole event sequence, one line per event.
pub fn format_events(events: &[Event]) -> String {
    let mut out = String::new();
    for event in events {
        out.push_str(&format_event(event));
        out.push('\n');
    }
    out
}

/// Format a single event without a trailing newline.
pub fn format_event(event: &Event) -> String {
    match &event.data {
        EventData::StreamStart { .. } => "+STR".to_string(),
        EventData::StreamEnd => "-STR".to_string(),
        EventData::DocumentStart { implicit, .. } => {
            if *implicit {
                "+DOC".to_string()
            } else {
                "+DOC ---".to_string()
            }
        }
        EventData::DocumentEnd { implicit } => {
            if *implicit {
                "-DOC".to_string()
            } else {
                "-DOC ...".to_string()
            }
        }
        EventData::Alias { anchor } => format!("=ALI *{}", anchor),
        EventData::Scalar {
            anchor,
            tag,
            value,
            style,
        } => {
            let mut line = String::from("=VAL");
            push_properties(&mut line, anchor.as_deref(), tag.as_deref());
            line.push(' ');
            line.push(match style {
                ScalarStyle::Plain => ':',
                ScalarStyle::SingleQuoted => '\'',
                ScalarStyle::DoubleQuoted => '"',
                ScalarStyle::Literal => '|',
                ScalarStyle::Folded => '>',
            });
            escape_into(&mut line, value);
            line
        }
        EventData::SequenceStart { anchor, tag, flow } => {
            let mut line = String::from(if *flow { "+SEQ []" } else { "+SEQ" });
            push_properties(&mut line, anchor.as_deref(), tag.as_deref());
            line
        }
        EventData::SequenceEnd => "-SEQ".to_string(),
        EventData::MappingStart { anchor, tag, flow } => {
            let mut line = String::from(if *flow { "+MAP {}" } else { "+MAP" });
            push_properties(&mut line, anchor.as_deref(), tag.as_deref());
            line
        }
        EventData::MappingEnd => "-MAP".to_string(),
    }
}

fn push_properties(line: &mut String, anchor: Option<&str>, tag: Option<&str>) {
    if let Some(anchor) = anchor {
        line.push_str(" &");
        line.push_str(anchor);
    }
    if let Some(tag) = tag {
        line.push_str(" <");
        line.push_str(tag);
        line.push('>');
    }
}

fn escape_into(line: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '\\' => line.push_str("\\\\"),
            '\0' => line.push_str("\\0"),
            '\x08' => line.push_str("\\b"),
            '\t' => line.push_str("\\t"),
            '\n' => line.push_str("\\n"),
            '\r' => line.push_str("\\r"),
            _ => line.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_scalar_styles() {
        let cases = [
            (ScalarStyle::Plain, "=VAL :x"),
            (ScalarStyle::SingleQuoted, "=VAL 'x"),
            (ScalarStyle::DoubleQuoted, "=VAL \"x"),
            (ScalarStyle::Literal, "=VAL |x"),
            (ScalarStyle::Folded, "=VAL >x"),
        ];
        for (style, expected) in cases {
            assert_eq!(format_event(&Event::scalar(None, None, "x", style)), expected);
        }
    }

    #[test]
    fn test_format_properties() {
        let event = Event::mapping_start(Some("a"), Some("tag:yaml.org,2002:map"), true);
        assert_eq!(format_event(&event), "+MAP {} &a <tag:yaml.org,2002:map>");
        let event = Event::scalar(Some("k"), Some("!"), "", ScalarStyle::Plain);
        assert_eq!(format_event(&event), "=VAL &k <!> :");
    }

    #[test]
    fn test_format_escapes() {
        let event = Event::scalar(None, None, "a\\b\n\tc\r\0\x08", ScalarStyle::DoubleQuoted);
        assert_eq!(format_event(&event), "=VAL \"a\\\\b\\n\\tc\\r\\0\\b");
    }

    #[test]
    fn test_format_events_lines() {
        let events = vec![
            Event::stream_start(),
            Event::document_start(false),
            Event::alias("x"),
            Event::document_end(true),
            Event::stream_end(),
        ];
        assert_eq!(format_events(&events), "+STR\n+DOC ---\n=ALI *x\n-DOC\n-STR\n");
    }
}
