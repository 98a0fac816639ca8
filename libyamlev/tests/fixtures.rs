//! Test harness for the event decoder against fixture files.
//!
//! Every `test/events/NAME.yaml` is decoded and compared line by line with
//! `test/events/NAME.events`. Every `test/errors/NAME.yaml` must fail with the
//! error kind named in `test/errors/NAME.error`. The events fixtures are also
//! pushed through the emitter and decoded again to check that content
//! survives the trip.

use std::fs;
use std::path::{Path, PathBuf};

use libyamlev::{
    emit, format_events, parse_bytes, Event, EventData, Mark, Parser, ParserConfig, ScalarStyle,
};

/// Root test directory.
fn test_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("test")
}

/// Get all .yaml inputs from a subdirectory of test/.
fn get_yaml_files(subdir: &str) -> Vec<PathBuf> {
    let pattern = test_root().join(subdir).join("*.yaml");
    let mut files: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())
        .unwrap()
        .flatten()
        .collect();
    files.sort();
    files
}

/// Read the sibling file with the same stem and another extension.
fn read_sibling(path: &Path, ext: &str) -> Option<String> {
    fs::read_to_string(path.with_extension(ext)).ok()
}

fn display_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}

/// Drop everything the emitter may legitimately change: marks, scalar
/// styles and document marker flags.
fn content_of(events: &[Event]) -> Vec<EventData> {
    events
        .iter()
        .map(|event| match event.data.clone() {
            EventData::Scalar {
                anchor, tag, value, ..
            } => EventData::Scalar {
                anchor,
                tag,
                value,
                style: ScalarStyle::Plain,
            },
            EventData::DocumentStart { version, tags, .. } => EventData::DocumentStart {
                implicit: true,
                version,
                tags,
            },
            EventData::DocumentEnd { .. } => EventData::DocumentEnd { implicit: true },
            other => other,
        })
        .collect()
}

/// Run a single events fixture (expected to decode).
fn run_events_test(path: &Path) -> Result<(), String> {
    let filename = display_name(path);
    let bytes = fs::read(path).map_err(|e| format!("Failed to read {}: {}", filename, e))?;
    let expected = read_sibling(path, "events")
        .ok_or_else(|| format!("{}: missing .events file", filename))?;

    let events =
        parse_bytes(&bytes).map_err(|e| format!("{}: Unexpected error: {}", filename, e))?;
    let actual = format_events(&events);

    if actual != expected {
        return Err(format!(
            "{}: Event mismatch\n    expected:\n{}\n    actual:\n{}",
            filename, expected, actual
        ));
    }
    println!("  {} => {} events", filename, events.len());
    Ok(())
}

/// Run a single error fixture (expected to fail with a given kind).
fn run_error_test(path: &Path) -> Result<(), String> {
    let filename = display_name(path);
    let bytes = fs::read(path).map_err(|e| format!("Failed to read {}: {}", filename, e))?;
    let config = ParserConfig {
        filename: Some(filename.clone()),
        ..ParserConfig::default()
    };

    let result: Result<Vec<Event>, _> = Parser::with_config(bytes.as_slice(), config).collect();
    match result {
        Ok(events) => Err(format!(
            "{}: Expected an error, but got:\n{}",
            filename,
            format_events(&events)
        )),
        Err(e) => {
            let message = e.to_string();
            if !message.contains(&filename) {
                return Err(format!(
                    "{}: Error message lacks the filename: {}",
                    filename, message
                ));
            }
            match read_sibling(path, "error") {
                Some(expected) if expected.trim() != e.kind_name() => Err(format!(
                    "{}: Error kind mismatch\n    expected: {}\n    actual:   {} ({})",
                    filename,
                    expected.trim(),
                    e.kind_name(),
                    message
                )),
                _ => {
                    println!("  {} => {}", filename, message);
                    Ok(())
                }
            }
        }
    }
}

/// Emit a decoded fixture and decode the output again.
fn run_emit_test(path: &Path) -> Result<(), String> {
    let filename = display_name(path);
    let bytes = fs::read(path).map_err(|e| format!("Failed to read {}: {}", filename, e))?;
    let events =
        parse_bytes(&bytes).map_err(|e| format!("{}: Unexpected error: {}", filename, e))?;

    let text = emit(&events).map_err(|e| format!("{}: Emit failed: {}", filename, e))?;
    let reparsed = parse_bytes(text.as_bytes())
        .map_err(|e| format!("{}: Emitted text does not decode: {}\n{}", filename, e, text))?;

    if content_of(&events) != content_of(&reparsed) {
        return Err(format!(
            "{}: Content changed through the emitter\n    emitted:\n{}\n    decoded:\n{}",
            filename,
            text,
            format_events(&reparsed)
        ));
    }
    Ok(())
}

fn run_all(files: &[PathBuf], run: fn(&Path) -> Result<(), String>) -> usize {
    let mut passed = 0;
    let mut failed = 0;
    let mut errors: Vec<String> = Vec::new();

    for file in files {
        match run(file) {
            Ok(()) => passed += 1,
            Err(e) => {
                failed += 1;
                errors.push(e);
            }
        }
    }

    println!("\nResults: {} passed, {} failed", passed, failed);

    if !errors.is_empty() {
        println!("\nErrors:");
        for error in &errors {
            println!("  - {}", error);
        }
    }
    failed
}

#[test]
fn test_all_event_fixtures() {
    let files = get_yaml_files("events");
    assert!(!files.is_empty(), "no fixtures under test/events");

    println!("\nRunning {} events fixtures:", files.len());
    let failed = run_all(&files, run_events_test);
    assert!(failed == 0, "{} events fixtures failed", failed);
}

#[test]
fn test_all_error_fixtures() {
    let files = get_yaml_files("errors");
    assert!(!files.is_empty(), "no fixtures under test/errors");

    println!("\nRunning {} error fixtures:", files.len());
    let failed = run_all(&files, run_error_test);
    assert!(failed == 0, "{} error fixtures failed", failed);
}

#[test]
fn test_all_fixtures_survive_emitter() {
    let files = get_yaml_files("events");

    println!("\nEmitting {} events fixtures:", files.len());
    let failed = run_all(&files, run_emit_test);
    assert!(failed == 0, "{} fixtures changed through the emitter", failed);
}

#[test]
fn test_fixture_marks_are_monotonic() {
    for file in get_yaml_files("events") {
        let bytes = fs::read(&file).unwrap();
        let events = parse_bytes(&bytes).unwrap();
        let mut last = Mark::default();
        for event in &events {
            assert!(
                event.start.index >= last.index && event.end.index >= event.start.index,
                "{}: marks go backwards at {:?}",
                display_name(&file),
                event
            );
            last = event.start;
        }
    }
}
