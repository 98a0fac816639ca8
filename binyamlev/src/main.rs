//! yamlev: command-line tool for validating YAML, dumping its event stream,
//! and re-emitting it.
//!
//! Usage: yamlev [OPTIONS] [FILE|DIR]
//!
//! Options:
//!   -t, --to <FORMAT>      Output format (events, yaml) [default: events]
//!   -o, --output <FILE>    Write output to specified file
//!   --check                Check if input is valid (exit 0 if valid, 1 if invalid)
//!                          With a directory, checks every .yaml and .yml file in it
//!   --max-depth <N>        Maximum collection nesting depth
//!   --restyle              Let the emitter choose scalar styles
//!   --indent <N>           Spaces per indentation level when emitting
//!   -v, --verbose          Diagnostics on stderr (-v debug, -vv trace)
//!   -h, --help             Print help
//!   -V, --version          Print version

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser as CliParser, ValueEnum};
use libyamlev::{
    emit_with_config, format_event, EmitterConfig, Error, Parser, ParserConfig, DEFAULT_MAX_DEPTH,
};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Output {
    /// One line per event
    Events,
    /// YAML text written by the emitter
    Yaml,
}

/// Validate YAML, dump its event stream, or re-emit it
#[derive(CliParser, Debug)]
#[command(name = "yamlev", version)]
#[command(about = "Validate YAML, dump its event stream, or re-emit it", long_about = None)]
struct Cli {
    /// Input file or directory; stdin when absent or `-`
    #[arg(value_name = "FILE|DIR")]
    input: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Output::Events)]
    to: Output,

    /// Write output to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Only check that the input decodes
    #[arg(long)]
    check: bool,

    /// Maximum collection nesting depth
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// Let the emitter choose scalar styles instead of keeping the source's
    #[arg(long)]
    restyle: bool,

    /// Spaces per indentation level when emitting (2-9)
    #[arg(long, value_name = "N", default_value_t = 2)]
    indent: usize,

    /// Diagnostics on stderr (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn run(cli: &Cli) -> Result<i32> {
    let input_path = cli.input.as_deref().filter(|p| *p != Path::new("-"));

    if let Some(path) = input_path {
        if path.is_dir() {
            if !cli.check {
                bail!("directory input requires --check");
            }
            if cli.output.is_some() {
                bail!("--output cannot be used with directory input");
            }
            return process_directory(cli, path);
        }
    }

    // Raw bytes, so the decoder sees any byte order mark.
    let bytes = match input_path {
        Some(path) => {
            fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?
        }
        None => {
            let mut buffer = Vec::new();
            io::stdin()
                .read_to_end(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };

    process_input(cli, &bytes, input_path)
}

fn process_directory(cli: &Cli, dir: &Path) -> Result<i32> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|e| e == "yaml" || e == "yml")
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    let mut had_errors = false;
    for path in &paths {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                had_errors = true;
                continue;
            }
        };
        if process_input(cli, &bytes, Some(path))? != 0 {
            had_errors = true;
        }
    }

    debug!("Checked {} files in {}", paths.len(), dir.display());
    Ok(if had_errors { 1 } else { 0 })
}

/// Decode one input and act on it. Returns the exit code.
fn process_input(cli: &Cli, bytes: &[u8], input_path: Option<&Path>) -> Result<i32> {
    let filename = input_path
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string());
    let config = ParserConfig {
        max_depth: cli.max_depth,
        filename,
    };

    let mut events = Vec::new();
    let mut failure = None;
    for item in Parser::with_config(bytes, config) {
        match item {
            Ok(event) => events.push(event),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    debug!("Decoded {} events", events.len());

    if cli.check {
        return Ok(match failure {
            None => {
                match input_path {
                    Some(path) => println!("{}: ok", path.display()),
                    None => println!("ok"),
                }
                0
            }
            Some(e) => {
                report_error(&e, input_path);
                1
            }
        });
    }

    match cli.to {
        Output::Events => {
            // Events decoded before an error are still valid and still shown.
            let mut output = String::new();
            for event in &events {
                output.push_str(&format_event(event));
                output.push('\n');
            }
            write_text_output(&output, cli.output.as_deref())?;
        }
        Output::Yaml => {
            if failure.is_none() {
                let config = EmitterConfig {
                    indent: cli.indent,
                    preserve_style: !cli.restyle,
                    max_depth: cli.max_depth,
                };
                match emit_with_config(&events, config) {
                    Ok(output) => write_text_output(&output, cli.output.as_deref())?,
                    Err(e) => {
                        report_error(&e, input_path);
                        return Ok(1);
                    }
                }
            }
        }
    }

    match failure {
        Some(e) => {
            report_error(&e, input_path);
            Ok(1)
        }
        None => Ok(0),
    }
}

fn report_error(error: &Error, input_path: Option<&Path>) {
    match input_path {
        Some(path) => eprintln!("{}: {}", path.display(), error),
        None => eprintln!("Error: {}", error),
    }
}

fn write_text_output(output: &str, output_file: Option<&Path>) -> Result<()> {
    match output_file {
        Some(path) => fs::write(path, output)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(output.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}
