//! Error types for YAML decoding and emission.

use crate::reader::Mark;
use thiserror::Error;

/// Result type for decoding and emitting operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Parse context carrying filename for error reporting.
#[derive(Clone, Debug, Default)]
pub struct ParseContext {
    pub filename: Option<String>,
}

impl ParseContext {
    /// Create a new parse context.
    pub fn new(filename: Option<&str>) -> Self {
        Self {
            filename: filename.map(String::from),
        }
    }

    /// Format a location suffix for error messages.
    pub fn loc_suffix(&self, mark: Mark) -> String {
        match &self.filename {
            Some(name) => format!(" at {}:{} of <{}>", mark.line + 1, mark.column + 1, name),
            None => format!(" at line {} column {}", mark.line + 1, mark.column + 1),
        }
    }
}

/// Error type for YAML decoding and emission.
///
/// Every variant carries the [`Mark`] where the problem was detected. Errors
/// are terminal for the session that produced them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed byte sequence or forbidden code point.
    #[error("{message}{suffix}")]
    Encoding {
        message: String,
        mark: Mark,
        suffix: String,
    },

    /// The byte source failed.
    #[error("I/O error: {message}{suffix}")]
    Io {
        message: String,
        mark: Mark,
        suffix: String,
    },

    /// Lexical violation.
    #[error("{message}{suffix}")]
    Scan {
        message: String,
        mark: Mark,
        suffix: String,
    },

    /// Grammar violation.
    #[error("{context}{}{suffix}", expectation(.expected, .found))]
    Parse {
        context: String,
        expected: Vec<&'static str>,
        found: String,
        mark: Mark,
        suffix: String,
    },

    /// Alias to an anchor not defined earlier in the same document.
    #[error("Undefined alias *{name}{suffix}")]
    UndefinedAlias {
        name: String,
        mark: Mark,
        suffix: String,
    },

    /// Collection nesting went past the configured limit.
    #[error("Nesting depth exceeds the limit of {limit}{suffix}")]
    DepthExceeded {
        limit: usize,
        mark: Mark,
        suffix: String,
    },

    /// Serialization-side violation.
    #[error("Emit error: {message}")]
    Emit { message: String, mark: Mark },
}

fn expectation(expected: &[&'static str], found: &str) -> String {
    match expected {
        [] => String::new(),
        [only] => format!(": expected {}, found {}", only, found),
        [init @ .., last] => format!(": expected {} or {}, found {}", init.join(", "), last, found),
    }
}

impl Error {
    pub(crate) fn encoding(ctx: &ParseContext, mark: Mark, message: impl Into<String>) -> Self {
        Error::Encoding {
            message: message.into(),
            mark,
            suffix: ctx.loc_suffix(mark),
        }
    }

    pub(crate) fn io(ctx: &ParseContext, mark: Mark, message: impl Into<String>) -> Self {
        Error::Io {
            message: message.into(),
            mark,
            suffix: ctx.loc_suffix(mark),
        }
    }

    pub(crate) fn scan(ctx: &ParseContext, mark: Mark, message: impl Into<String>) -> Self {
        Error::Scan {
            message: message.into(),
            mark,
            suffix: ctx.loc_suffix(mark),
        }
    }

    pub(crate) fn parse(
        ctx: &ParseContext,
        mark: Mark,
        context: impl Into<String>,
        expected: &[&'static str],
        found: impl Into<String>,
    ) -> Self {
        Error::Parse {
            context: context.into(),
            expected: expected.to_vec(),
            found: found.into(),
            mark,
            suffix: ctx.loc_suffix(mark),
        }
    }

    pub(crate) fn undefined_alias(ctx: &ParseContext, mark: Mark, name: &str) -> Self {
        Error::UndefinedAlias {
            name: name.to_string(),
            mark,
            suffix: ctx.loc_suffix(mark),
        }
    }

    pub(crate) fn depth_exceeded(ctx: &ParseContext, mark: Mark, limit: usize) -> Self {
        Error::DepthExceeded {
            limit,
            mark,
            suffix: ctx.loc_suffix(mark),
        }
    }

    pub(crate) fn emit(mark: Mark, message: impl Into<String>) -> Self {
        Error::Emit {
            message: message.into(),
            mark,
        }
    }

    /// Source position where the error was detected.
    pub fn mark(&self) -> Mark {
        match self {
            Error::Encoding { mark, .. }
            | Error::Io { mark, .. }
            | Error::Scan { mark, .. }
            | Error::Parse { mark, .. }
            | Error::UndefinedAlias { mark, .. }
            | Error::DepthExceeded { mark, .. }
            | Error::Emit { mark, .. } => *mark,
        }
    }

    /// Short, stable name of the error kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Error::Encoding { .. } => "encoding",
            Error::Io { .. } => "io",
            Error::Scan { .. } => "scan",
            Error::Parse { .. } => "parse",
            Error::UndefinedAlias { .. } => "undefined-alias",
            Error::DepthExceeded { .. } => "depth",
            Error::Emit { .. } => "emit",
        }
    }
}
