//! Error types for sap-core and its consumers.
//!
//! The crate accumulates most diagnostics as data (see `sap::result::Diagnostic`)
//! rather than as `Result::Err`, because the coercion walk must continue past
//! individual field failures to collect a complete report. `SapError` is
//! reserved for the small set of failures that make it meaningless to keep
//! going at all: the extractor recovering nothing and string fallback being
//! disabled, a recursion limit, or a schema whose `pattern` does not compile.

use thiserror::Error;

/// Errors that can occur while extracting or coercing a value.
#[derive(Error, Debug)]
pub enum SapError {
    /// Every extractor strategy rejected the input and string fallback was
    /// disabled (`allow_as_string = false`).
    #[error("could not recover a JSON value from the response: {0}")]
    Extraction(String),

    /// The extractor or coercer recursed past its configured limit.
    #[error("recursion limit of {limit} exceeded while {phase}")]
    DepthExceeded {
        /// The configured limit that was exceeded.
        limit: usize,
        /// Which stage hit the limit (`"extracting"` or `"coercing"`).
        phase: &'static str,
    },

    /// A `String` schema node's `pattern` field failed to compile as a regex.
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The offending pattern text.
        pattern: String,
        /// The underlying regex compilation error.
        #[source]
        source: regex::Error,
    },
}

/// Result alias used throughout the schema-aligned parsing crates.
pub type Result<T> = std::result::Result<T, SapError>;
