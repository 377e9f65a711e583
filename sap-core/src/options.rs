//! Configuration surface shared by every entry point in the `sap` crate.
//!
//! `ParseOptions` is the crate's entire configuration surface (see SPEC_FULL
//! §12): there is no file- or environment-based configuration, because a
//! parse is a pure function of the response text, the schema, and this
//! struct. It follows this workspace's builder idiom (consuming `with_*`
//! setters returning `Self`, e.g. `siumai_core::types::OutputSchema`):
//! `ParseOptions::default().with_allow_partials(true)`.

use serde::{Deserialize, Serialize};

/// Behavioral knobs for [`crate::schema`]-driven parsing.
///
/// All fields default to the lenient behavior described in SPEC_FULL §6;
/// [`ParseOptions::strict`] flips the subset of defaults that make sense for
/// callers who would rather fail loudly than accept a lossy conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseOptions {
    /// Enable fenced code-block extraction (extractor strategy 2).
    pub allow_markdown_json: bool,
    /// Enable the repair rewrites (extractor strategy 4).
    pub allow_fixes: bool,
    /// Enable the string fallback (extractor strategy 6).
    pub allow_as_string: bool,
    /// Enable the multi-object scan (extractor strategy 3).
    pub find_all_json_objects: bool,
    /// Replace typographic quote characters with their ASCII counterparts
    /// before recognition is attempted.
    pub normalize_unicode_quotes: bool,
    /// Recursion limit for the extractor's fenced-block descent.
    pub max_depth: usize,
    /// Recursion limit for the coercer's schema walk.
    pub max_coercion_depth: usize,
    /// Accept and propagate partiality instead of erroring on missing
    /// required data.
    pub allow_partials: bool,
    /// Apply a schema node's `default` value for fields missing from the
    /// input.
    pub use_defaults: bool,
    /// Suppress the lossy scalar coercions in SPEC_FULL §4.3 (string<->number,
    /// string<->boolean, boolean<->number, object<->string, float->int
    /// truncation). Reserved in the source this crate is ported from; this
    /// implementation honors it (SPEC_FULL §9, §10).
    pub strict: bool,
    /// Populate `meta.coercions` with a full trace of every coercion
    /// applied during the walk.
    pub track_coercions: bool,
    /// Run the chain-of-thought filter before extraction.
    pub filter_chain_of_thought: bool,
    /// Expose every candidate the extractor recovered, not just the first
    /// that succeeds end to end.
    pub return_all_candidates: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            allow_markdown_json: true,
            allow_fixes: true,
            allow_as_string: true,
            find_all_json_objects: true,
            normalize_unicode_quotes: true,
            max_depth: 100,
            max_coercion_depth: 50,
            allow_partials: false,
            use_defaults: true,
            strict: false,
            track_coercions: false,
            filter_chain_of_thought: true,
            return_all_candidates: false,
        }
    }
}

impl ParseOptions {
    /// The default, lenient configuration. Equivalent to
    /// `ParseOptions::default()`; provided as a named preset for symmetry
    /// with [`ParseOptions::strict`].
    pub fn lenient() -> Self {
        Self::default()
    }

    /// A stricter preset: disables lossy scalar coercion and repair
    /// rewrites, so a response that needs either to satisfy the schema is
    /// reported as a failure rather than silently patched.
    pub fn strict() -> Self {
        Self {
            strict: true,
            allow_fixes: false,
            ..Self::default()
        }
    }

    /// Force on the options `parse_partial` requires: accepting partiality
    /// and falling back to a raw string when every extraction strategy
    /// fails.
    pub fn for_partial(mut self) -> Self {
        self.allow_partials = true;
        self.allow_as_string = true;
        self
    }

    /// Builder: set [`Self::allow_markdown_json`].
    pub fn with_allow_markdown_json(mut self, v: bool) -> Self {
        self.allow_markdown_json = v;
        self
    }

    /// Builder: set [`Self::allow_fixes`].
    pub fn with_allow_fixes(mut self, v: bool) -> Self {
        self.allow_fixes = v;
        self
    }

    /// Builder: set [`Self::allow_as_string`].
    pub fn with_allow_as_string(mut self, v: bool) -> Self {
        self.allow_as_string = v;
        self
    }

    /// Builder: set [`Self::find_all_json_objects`].
    pub fn with_find_all_json_objects(mut self, v: bool) -> Self {
        self.find_all_json_objects = v;
        self
    }

    /// Builder: set [`Self::normalize_unicode_quotes`].
    pub fn with_normalize_unicode_quotes(mut self, v: bool) -> Self {
        self.normalize_unicode_quotes = v;
        self
    }

    /// Builder: set [`Self::max_depth`].
    pub fn with_max_depth(mut self, v: usize) -> Self {
        self.max_depth = v;
        self
    }

    /// Builder: set [`Self::max_coercion_depth`].
    pub fn with_max_coercion_depth(mut self, v: usize) -> Self {
        self.max_coercion_depth = v;
        self
    }

    /// Builder: set [`Self::allow_partials`].
    pub fn with_allow_partials(mut self, v: bool) -> Self {
        self.allow_partials = v;
        self
    }

    /// Builder: set [`Self::use_defaults`].
    pub fn with_use_defaults(mut self, v: bool) -> Self {
        self.use_defaults = v;
        self
    }

    /// Builder: set [`Self::strict`].
    pub fn with_strict(mut self, v: bool) -> Self {
        self.strict = v;
        self
    }

    /// Builder: set [`Self::track_coercions`].
    pub fn with_track_coercions(mut self, v: bool) -> Self {
        self.track_coercions = v;
        self
    }

    /// Builder: set [`Self::filter_chain_of_thought`].
    pub fn with_filter_chain_of_thought(mut self, v: bool) -> Self {
        self.filter_chain_of_thought = v;
        self
    }

    /// Builder: set [`Self::return_all_candidates`].
    pub fn with_return_all_candidates(mut self, v: bool) -> Self {
        self.return_all_candidates = v;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_lenient() {
        let o = ParseOptions::default();
        assert!(o.allow_markdown_json);
        assert!(o.allow_fixes);
        assert!(!o.strict);
        assert!(!o.allow_partials);
    }

    #[test]
    fn strict_disables_fixes_and_sets_strict() {
        let o = ParseOptions::strict();
        assert!(o.strict);
        assert!(!o.allow_fixes);
        // Strict does not otherwise touch the extraction ladder.
        assert!(o.allow_markdown_json);
    }

    #[test]
    fn for_partial_forces_the_two_flags() {
        let o = ParseOptions::default()
            .with_allow_as_string(false)
            .for_partial();
        assert!(o.allow_partials);
        assert!(o.allow_as_string);
    }

    #[test]
    fn builders_are_chainable() {
        let o = ParseOptions::default()
            .with_max_depth(10)
            .with_track_coercions(true)
            .with_use_defaults(false);
        assert_eq!(o.max_depth, 10);
        assert!(o.track_coercions);
        assert!(!o.use_defaults);
    }
}
