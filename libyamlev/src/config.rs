//! Parser and emitter configuration.
//!
//! Both configurations are plain structs with defaults suitable for
//! untrusted input; construct with struct update syntax to override a field.

/// Default nesting limit for collections.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Configuration for a decode session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParserConfig {
    /// Maximum number of simultaneously open sequences and mappings.
    pub max_depth: usize,
    /// Source name used in error messages.
    pub filename: Option<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            filename: None,
        }
    }
}

/// Configuration for an emitter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmitterConfig {
    /// Spaces per block level. Values outside 2..=9 fall back to 2.
    pub indent: usize,
    /// Keep the scalar style recorded in each event when it can represent
    /// the value. When `false` the emitter picks the simplest safe style.
    pub preserve_style: bool,
    /// Maximum number of simultaneously open sequences and mappings.
    pub max_depth: usize,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            indent: 2,
            preserve_style: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EmitterConfig {
    /// Indentation actually used.
    pub(crate) fn best_indent(&self) -> usize {
        if (2..=9).contains(&self.indent) {
            self.indent
        } else {
            2
        }
    }
}
