//! The orchestrator's output types: [`ParseResult`], its per-field
//! diagnostics, and the metadata describing how the value was recovered
//! (SPEC_FULL §6).

use sap_core::DynamicValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of problem a [`Diagnostic`] reports, mirroring the error
/// taxonomy in SPEC_FULL §7. Unlike [`sap_core::SapError`], these are data
/// pushed into a result's `errors` list, not `Result::Err` — the coercion
/// walk never stops on the first one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// No extraction strategy recovered a value and string fallback was
    /// disabled.
    ExtractionFailure,
    /// A recursion limit was hit.
    DepthExceeded,
    /// The input's shape is incompatible with the target and no coercion
    /// rule applies.
    TypeMismatch,
    /// A scalar constraint (range, length, pattern, format, `multiple_of`,
    /// literal/enum membership) rejected the value.
    ConstraintViolation,
    /// An object's required field was absent with no default and no
    /// `allow_partials` coverage.
    MissingRequired,
}

/// A single coercion failure, attached to the dotted/bracketed path of the
/// position that produced it (e.g. `items[2].price`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Path to the offending position, root is the empty string.
    pub path: String,
    /// Human-readable explanation.
    pub message: String,
    /// The taxonomy bucket this diagnostic falls into.
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    /// Build a diagnostic at the given path.
    pub fn new(path: impl Into<String>, message: impl Into<String>, kind: DiagnosticKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// A non-failing conversion the coercer applied, e.g. "parsed string to
/// number" at `count`. Populated only when `ParseOptions::track_coercions`
/// is set; independent `tracing::trace!` events are always emitted
/// regardless of this flag (SPEC_FULL §11).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoercionNote {
    /// Path to the coerced position.
    pub path: String,
    /// Human-readable description of the conversion applied.
    pub message: String,
}

impl CoercionNote {
    /// Build a coercion note at the given path.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A fix tag the extractor applied while recovering a value, reported in
/// `meta.fixes` in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixTag {
    /// The four typographic quote code points were replaced by their ASCII
    /// counterparts before recognition.
    NormalizedUnicodeQuotes,
    /// One of the three deterministic repair rewrites (§4.2 strategy 4)
    /// made the text parseable.
    AppliedAutoFixes,
    /// The partial-completion strategy (§4.2 strategy 5) closed unmatched
    /// brackets to recover a value.
    ExtractedPartial,
}

impl fmt::Display for FixTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FixTag::NormalizedUnicodeQuotes => "normalized_unicode_quotes",
            FixTag::AppliedAutoFixes => "applied_auto_fixes",
            FixTag::ExtractedPartial => "extracted_partial",
        };
        f.write_str(s)
    }
}

/// Metadata describing how [`ParseResult::value`] was recovered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseMeta {
    /// The exact original response text, before any filtering or
    /// normalization.
    pub raw: String,
    /// `true` when the extractor took a fenced-code-block branch.
    pub from_markdown: bool,
    /// `true` when the chain-of-thought filter actually trimmed the input.
    pub chain_of_thought_filtered: bool,
    /// Fix tags applied by the extractor, in application order.
    pub fixes: Vec<FixTag>,
    /// The coercion trace, present only when `track_coercions` is set.
    pub coercions: Option<Vec<CoercionNote>>,
}

/// The outcome of a [`crate::parse`] call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseResult {
    /// `true` when `errors` is empty after coercion.
    pub success: bool,
    /// The coerced value, shaped according to the schema.
    pub value: DynamicValue,
    /// Ordered list of coercion diagnostics.
    pub errors: Vec<Diagnostic>,
    /// `true` when coercion flagged incompleteness (SPEC_FULL §4.3
    /// "Completeness").
    pub is_partial: bool,
    /// Provenance and recovery metadata.
    pub meta: ParseMeta,
}
