//! Chain-of-thought filter (SPEC_FULL §4.1).
//!
//! Strips reasoning prose so the extractor sees the smallest reasonable
//! payload window. The filter is a pure function of its input: it never
//! allocates persistent state, and it is cheap enough that the orchestrator
//! runs it unconditionally when `filter_chain_of_thought` is set.

use once_cell::sync::Lazy;
use regex::Regex;

/// Case-insensitive substrings whose presence marks a response as
/// containing reasoning preamble.
const REASONING_MARKERS: &[&str] = &[
    "let me think",
    "step by step",
    "reasoning:",
    "thinking:",
    "analysis:",
    "therefore",
    "in conclusion",
];

static HERE_IS_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)here is the json[^\n:]*:").unwrap());
static OUTPUT_JSON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(therefore the output json is|output json)[^\n:]*:").unwrap()
});
static FINAL_ANSWER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(final answer|answer)\s*:").unwrap());
static LEADING_FIRST: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*first,").unwrap());

/// The result of running the filter over a response.
pub struct FilterOutcome {
    /// The text to hand to the extractor: either the original input
    /// unchanged, or the suffix starting at the detected payload marker.
    pub text: String,
    /// `true` when the filter actually trimmed the input.
    pub trimmed: bool,
}

/// `true` if any reasoning marker occurs in `text`.
fn has_reasoning_preamble(text: &str) -> bool {
    let lower = text.to_lowercase();
    REASONING_MARKERS.iter().any(|m| lower.contains(m)) || LEADING_FIRST.is_match(text)
}

/// Locate the earliest payload marker, trying each priority class in turn
/// and stopping at the first class with any match (SPEC_FULL §4.1 "priority
/// order"). Text markers (`here is the json:`, `answer:`, ...) resume the
/// suffix *after* the marker; the fence and `{` markers resume *at* the
/// marker, since they are themselves part of the payload.
fn find_payload_start(text: &str) -> Option<usize> {
    if let Some(m) = HERE_IS_JSON.find(text) {
        return Some(m.end());
    }
    if let Some(m) = OUTPUT_JSON.find(text) {
        return Some(m.end());
    }
    if let Some(m) = FINAL_ANSWER.find(text) {
        return Some(m.end());
    }
    if let Some(idx) = text.find("```") {
        return Some(idx);
    }
    if let Some(idx) = text.find('{') {
        return Some(idx);
    }
    None
}

/// Run the chain-of-thought filter over a response.
pub fn filter(text: &str) -> FilterOutcome {
    if !has_reasoning_preamble(text) {
        return FilterOutcome {
            text: text.to_string(),
            trimmed: false,
        };
    }

    match find_payload_start(text) {
        Some(idx) => {
            tracing::debug!(at = idx, "chain-of-thought filter trimmed response");
            FilterOutcome {
                text: text[idx..].to_string(),
                trimmed: true,
            }
        }
        None => FilterOutcome {
            text: text.to_string(),
            trimmed: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_plain_json_unchanged() {
        let out = filter(r#"{"a":1}"#);
        assert!(!out.trimmed);
        assert_eq!(out.text, r#"{"a":1}"#);
    }

    #[test]
    fn trims_at_therefore_output_json_marker() {
        let input =
            "Let me think... Therefore the output JSON is:\n```json\n{\"answer\":\"hi\"}\n```";
        let out = filter(input);
        assert!(out.trimmed);
        assert_eq!(out.text.trim(), "```json\n{\"answer\":\"hi\"}\n```");
    }

    #[test]
    fn trims_at_final_answer_marker() {
        let input = "Step by step, I reasoned about it. Final answer: {\"ok\":true}";
        let out = filter(input);
        assert!(out.trimmed);
        assert_eq!(out.text.trim(), "{\"ok\":true}");
    }

    #[test]
    fn falls_back_to_first_brace_when_no_marker_present() {
        let input = "Therefore here is some prose with a brace { \"x\": 1 }";
        let out = filter(input);
        assert!(out.trimmed);
        assert!(out.text.starts_with('{'));
    }

    #[test]
    fn leading_first_clause_is_detected_as_reasoning() {
        let input = "First, I'll note the answer: {\"x\":1}";
        assert!(has_reasoning_preamble(input));
    }
}
