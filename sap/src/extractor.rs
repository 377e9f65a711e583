//! The JSON extractor (SPEC_FULL §4.2): recovers a [`DynamicValue`] from
//! noisy text via a layered strategy ladder, falling through to the next
//! strategy on failure and aborting at the first success.
//!
//! Grounded in `siumai_extras::structured_output`'s `default_repair_text` /
//! `extract_balanced_json_slice` / `strip_trailing_commas` (quote- and
//! escape-aware scanning) and `siumai_core::streaming::json_repair`'s
//! "try strict parse first, repair is a fallback" shape.

use once_cell::sync::Lazy;
use regex::Regex;
use sap_core::{DynamicValue, ParseOptions, SapError};

use crate::result::FixTag;

/// What the extractor recovered, plus provenance for `meta`.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    /// The recovered value (or values, wrapped in `DynamicValue::Array`,
    /// when the extractor found several candidates).
    pub value: DynamicValue,
    /// `true` when the value came from inside a fenced code block.
    pub from_markdown: bool,
    /// Fix tags applied, in application order.
    pub fixes: Vec<FixTag>,
    /// `true` when the value is known to be incomplete (partial-completion
    /// strategy, or the caller declared the input incomplete and string
    /// fallback was used).
    pub is_partial: bool,
    /// The individual candidates found, in the order recovered. Has more
    /// than one element only when the fenced-block or multi-object-scan
    /// strategy recovered several distinct JSON values from the same
    /// response, as opposed to `value` legitimately being a JSON array.
    /// `parse_all_candidates`/`parse_best_candidate` (§6) coerce each of
    /// these independently against the schema. Otherwise holds exactly
    /// `value` itself.
    pub candidates: Vec<DynamicValue>,
}

struct RecognizeOutcome {
    value: DynamicValue,
    from_markdown: bool,
    fixes: Vec<FixTag>,
    is_partial: bool,
    /// The individual values recovered, flat (never itself wrapped in the
    /// `multiple`-candidates `Array`). Has one element except when the
    /// fenced-block or multi-object-scan strategy found several distinct
    /// JSON values, in which case `value` is `DynamicValue::Array(candidates)`.
    candidates: Vec<DynamicValue>,
}

/// Recover a dynamic value from `text`.
///
/// `input_is_complete` feeds the string-fallback strategy's `is_partial`
/// flag (SPEC_FULL §4.2 strategy 6): when the caller knows the stream has
/// not finished (e.g. `parse_partial`), a fallback to raw string is always
/// partial.
pub fn extract(
    text: &str,
    options: &ParseOptions,
    input_is_complete: bool,
) -> Result<ExtractionOutcome, SapError> {
    // Fast path: if the original text is already valid, use it untouched.
    // Running quote normalization before this check would corrupt
    // typographic quotes that are legitimate *content* inside an
    // already-valid JSON string (SPEC_FULL §8 scenario 5).
    let original_trim = text.trim();
    if looks_like_json(original_trim) {
        if let Ok(value) = strict_parse(original_trim) {
            return Ok(ExtractionOutcome {
                candidates: vec![value.clone()],
                value,
                from_markdown: false,
                fixes: Vec::new(),
                is_partial: false,
            });
        }
    }

    let mut fixes = Vec::new();
    let working_text = if options.normalize_unicode_quotes {
        let (normalized, changed) = normalize_quotes(text);
        if changed {
            fixes.push(FixTag::NormalizedUnicodeQuotes);
        }
        normalized
    } else {
        text.to_string()
    };

    let mut depth = 0usize;
    match recognize(&working_text, options, &mut depth)? {
        Some(outcome) => {
            fixes.extend(outcome.fixes);
            Ok(ExtractionOutcome {
                value: outcome.value,
                from_markdown: outcome.from_markdown,
                fixes,
                is_partial: outcome.is_partial,
                candidates: outcome.candidates,
            })
        }
        None if options.allow_as_string => {
            tracing::warn!("extractor fell through to string fallback");
            // MUST be the original text, not the normalized copy: a
            // response the extractor cannot recognize as JSON is returned
            // verbatim, smart quotes and all.
            let value = DynamicValue::String(text.to_string());
            Ok(ExtractionOutcome {
                candidates: vec![value.clone()],
                value,
                from_markdown: false,
                fixes: Vec::new(),
                is_partial: !input_is_complete,
            })
        }
        None => Err(SapError::Extraction(
            "no recognizable JSON value found in response".to_string(),
        )),
    }
}

/// Attempt every recognition strategy (direct parse through partial
/// completion) on already quote-normalized text. Returns `None` when none
/// apply; string fallback is handled by the caller.
fn recognize(
    text: &str,
    options: &ParseOptions,
    depth: &mut usize,
) -> Result<Option<RecognizeOutcome>, SapError> {
    if *depth > options.max_depth {
        return Err(SapError::DepthExceeded {
            limit: options.max_depth,
            phase: "extracting",
        });
    }

    let trimmed = text.trim();

    // Strategy 1: direct parse.
    if looks_like_json(trimmed) {
        if let Ok(value) = strict_parse(trimmed) {
            return Ok(Some(RecognizeOutcome {
                candidates: vec![value.clone()],
                value,
                from_markdown: false,
                fixes: Vec::new(),
                is_partial: false,
            }));
        }
    }

    // Strategy 2: fenced-block extraction.
    if options.allow_markdown_json {
        if let Some(outcome) = try_fenced_blocks(text, options, depth)? {
            return Ok(Some(outcome));
        }
    }

    // Strategy 3: multi-object scan.
    if options.find_all_json_objects {
        if let Some(outcome) = try_multi_object_scan(text, options) {
            return Ok(Some(outcome));
        }
    }

    // Strategy 4: repair parse.
    if options.allow_fixes {
        if let Some(repaired) = repair_text(trimmed) {
            if let Ok(value) = strict_parse(&repaired) {
                return Ok(Some(RecognizeOutcome {
                    candidates: vec![value.clone()],
                    value,
                    from_markdown: false,
                    fixes: vec![FixTag::AppliedAutoFixes],
                    is_partial: false,
                }));
            }
        }

        // Strategy 5: partial completion, only reached from repair failure.
        if let Some(completed) = complete_unmatched_brackets(trimmed) {
            if let Ok(value) = strict_parse(&completed) {
                return Ok(Some(RecognizeOutcome {
                    candidates: vec![value.clone()],
                    value,
                    from_markdown: false,
                    fixes: vec![FixTag::ExtractedPartial],
                    is_partial: true,
                }));
            }
        }
    }

    Ok(None)
}

/// The cheap shape check gating strategy 1: a matched `{}`/`[]`/`""` pair,
/// or a bare numeric/`true`/`false`/`null` literal.
fn looks_like_json(trimmed: &str) -> bool {
    if trimmed.is_empty() {
        return false;
    }
    let bytes = trimmed.as_bytes();
    let first = bytes[0];
    let last = bytes[bytes.len() - 1];
    match (first, last) {
        (b'{', b'}') | (b'[', b']') | (b'"', b'"') => return true,
        _ => {}
    }
    matches!(trimmed, "true" | "false" | "null") || trimmed.parse::<f64>().is_ok()
}

fn strict_parse(text: &str) -> Result<DynamicValue, ()> {
    serde_json::from_str::<DynamicValue>(text).map_err(|_| ())
}

/// Replace the four typographic quote code points with their ASCII
/// counterparts. Returns the rewritten text and whether anything changed.
fn normalize_quotes(text: &str) -> (String, bool) {
    let mut changed = false;
    let out: String = text
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => {
                changed = true;
                '"'
            }
            '\u{2018}' | '\u{2019}' => {
                changed = true;
                '\''
            }
            other => other,
        })
        .collect();
    (out, changed)
}

static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```([A-Za-z0-9_+-]*)[ \t]*\r?\n?(.*?)```").unwrap());

const FENCE_TAGS: &[&str] = &["json", "javascript", "js", ""];

fn try_fenced_blocks(
    text: &str,
    options: &ParseOptions,
    depth: &mut usize,
) -> Result<Option<RecognizeOutcome>, SapError> {
    let qualifying: Vec<&str> = FENCE
        .captures_iter(text)
        .filter_map(|cap| {
            let tag = cap.get(1).map(|m| m.as_str()).unwrap_or("");
            let body = cap.get(2).map(|m| m.as_str()).unwrap_or("");
            let tag_lower = tag.to_lowercase();
            if FENCE_TAGS.contains(&tag_lower.as_str()) || looks_like_json(body.trim()) {
                Some(body)
            } else {
                None
            }
        })
        .collect();

    if qualifying.is_empty() {
        return Ok(None);
    }

    if qualifying.len() == 1 {
        *depth += 1;
        let inner = recognize(qualifying[0], options, depth)?;
        return Ok(inner.map(|mut o| {
            o.from_markdown = true;
            o
        }));
    }

    // Multiple qualifying blocks: strict-parse every block first. Only if
    // *none* parses do we fall back to repairing each (SPEC_FULL §4.2
    // strategy 2) — a block that is already valid JSON is never touched just
    // because a sibling block needed repair.
    let mut parsed: Vec<DynamicValue> = qualifying
        .iter()
        .filter_map(|body| strict_parse(body.trim()).ok())
        .collect();
    let mut any_repaired = false;

    if parsed.is_empty() && options.allow_fixes {
        parsed = qualifying
            .iter()
            .filter_map(|body| {
                let trimmed = body.trim();
                let repaired = repair_text(trimmed)?;
                strict_parse(&repaired).ok()
            })
            .collect();
        any_repaired = !parsed.is_empty();
    }

    if parsed.is_empty() {
        return Ok(None);
    }

    let candidates = parsed.clone();
    let value = if parsed.len() == 1 {
        parsed.into_iter().next().unwrap()
    } else {
        DynamicValue::Array(parsed)
    };

    Ok(Some(RecognizeOutcome {
        value,
        from_markdown: true,
        fixes: if any_repaired {
            vec![FixTag::AppliedAutoFixes]
        } else {
            Vec::new()
        },
        is_partial: false,
        candidates,
    }))
}

/// Scan `text` for top-level balanced `{...}` / `[...]` substrings, quote-
/// and escape-aware. A REDESIGN (SPEC_FULL §9, REDESIGN FLAGS) over the
/// source's non-nesting regex: this scanner handles nested braces/brackets
/// correctly by tracking depth rather than matching `\{[\s\S]*?\}` non-
/// greedily.
fn balanced_candidates(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut candidates = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i];
        if c == b'{' || c == b'[' {
            if let Some(end) = scan_balanced(bytes, i) {
                if let Some(slice) = text.get(i..=end) {
                    candidates.push(slice);
                }
                i = end + 1;
                continue;
            }
        }
        i += 1;
    }
    candidates
}

/// From an opening brace/bracket at `start`, find the index of its matching
/// close, treating `"`-quoted spans (with `\`-escapes) as opaque.
fn scan_balanced(bytes: &[u8], start: usize) -> Option<usize> {
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };
    let mut depth_curly = 0i32;
    let mut depth_square = 0i32;
    let mut in_string = false;
    let mut escape = false;
    let mut i = start;
    while i < bytes.len() {
        let c = bytes[i];
        if in_string {
            if escape {
                escape = false;
            } else if c == b'\\' {
                escape = true;
            } else if c == b'"' {
                in_string = false;
            }
        } else {
            match c {
                b'"' => in_string = true,
                b'{' => depth_curly += 1,
                b'}' => depth_curly -= 1,
                b'[' => depth_square += 1,
                b']' => depth_square -= 1,
                _ => {}
            }
            if depth_curly == 0 && depth_square == 0 && c == close {
                return Some(i);
            }
            if depth_curly < 0 || depth_square < 0 {
                return None;
            }
        }
        i += 1;
    }
    None
}

fn try_multi_object_scan(text: &str, options: &ParseOptions) -> Option<RecognizeOutcome> {
    let raw_candidates = balanced_candidates(text);
    if raw_candidates.is_empty() {
        return None;
    }

    let mut parsed = Vec::new();
    let mut any_repaired = false;
    for candidate in &raw_candidates {
        if let Ok(value) = strict_parse(candidate) {
            parsed.push(value);
            continue;
        }
        if options.allow_fixes {
            if let Some(repaired) = repair_text(candidate) {
                if let Ok(value) = strict_parse(&repaired) {
                    parsed.push(value);
                    any_repaired = true;
                    continue;
                }
            }
        }
    }

    if parsed.is_empty() {
        return None;
    }

    let candidates = parsed.clone();
    let value = if parsed.len() == 1 {
        parsed.into_iter().next().unwrap()
    } else {
        DynamicValue::Array(parsed)
    };

    Some(RecognizeOutcome {
        value,
        from_markdown: false,
        fixes: if any_repaired {
            vec![FixTag::AppliedAutoFixes]
        } else {
            Vec::new()
        },
        is_partial: false,
        candidates,
    })
}

static SINGLE_QUOTED_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"'([^'\\]*)'(\s*):").unwrap());
static BARE_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([{,]\s*)([A-Za-z_$][A-Za-z0-9_$]*)(\s*):").unwrap());

/// The three deterministic repair rewrites of SPEC_FULL §4.2 strategy 4, in
/// order. Other rewrites the source disables (linebreak-in-string,
/// unquoted string values) are deliberately not implemented (SPEC_FULL §9).
fn repair_text(text: &str) -> Option<String> {
    let without_trailing_commas = strip_trailing_commas(text);
    let quoted_keys = SINGLE_QUOTED_KEY.replace_all(&without_trailing_commas, "\"$1\"$2:");
    let bare_keys_quoted = BARE_KEY.replace_all(&quoted_keys, "$1\"$2\"$3:");
    if bare_keys_quoted == text {
        None
    } else {
        Some(bare_keys_quoted.into_owned())
    }
}

/// Drop commas immediately before `}` or `]`, skipping over string content.
/// Grounded in `siumai_extras::structured_output::strip_trailing_commas`.
fn strip_trailing_commas(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    let mut in_string = false;
    let mut escape = false;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if in_string {
            out.push(c);
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push(c);
            i += 1;
            continue;
        }
        if c == ',' {
            let mut j = i + 1;
            while j < bytes.len() && (bytes[j] as char).is_whitespace() {
                j += 1;
            }
            if j < bytes.len() {
                let nc = bytes[j] as char;
                if nc == '}' || nc == ']' {
                    i += 1;
                    continue;
                }
            }
            out.push(',');
            i += 1;
            continue;
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Close unmatched `{`/`[` by appending closers in the reverse of their
/// opening order (proper nesting), tracking a stack rather than appending
/// all `}` before all `]`: for `{"items":["a","b"` the naive "all `}` then
/// all `]`" reading of SPEC_FULL §4.2 strategy 5 would produce
/// `{"items":["a","b"}]`, which is not valid JSON. Closing in LIFO order of
/// the unmatched openers is the only reading that recovers a parseable
/// value on that input.
fn complete_unmatched_brackets(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escape = false;
    for &b in bytes {
        let c = b as char;
        if in_string {
            if escape {
                escape = false;
            } else if c == '\\' {
                escape = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }
    if stack.is_empty() {
        return None;
    }
    let mut out = text.to_string();
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> ParseOptions {
        ParseOptions::default()
    }

    #[test]
    fn direct_parse_of_plain_object() {
        let out = extract(r#"{"name":"test","count":5}"#, &opts(), true).unwrap();
        assert!(!out.from_markdown);
        assert!(out.fixes.is_empty());
        assert_eq!(
            out.value.as_object().unwrap().get("name").unwrap().as_str(),
            Some("test")
        );
    }

    #[test]
    fn fenced_block_is_unwrapped() {
        let out = extract("```json\n{\"value\": true}\n```", &opts(), true).unwrap();
        assert!(out.from_markdown);
        assert!(out.fixes.is_empty());
    }

    #[test]
    fn trailing_comma_is_repaired() {
        let out = extract(r#"{"a":1,"b":2,}"#, &opts(), true).unwrap();
        assert!(out.fixes.contains(&FixTag::AppliedAutoFixes));
        let obj = out.value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
    }

    #[test]
    fn smart_quotes_as_delimiters_are_normalized() {
        let input = "{\u{201C}action\u{201D}:\u{201C}diagnostics\u{201D}}";
        let out = extract(input, &opts(), true).unwrap();
        assert!(out.fixes.contains(&FixTag::NormalizedUnicodeQuotes));
        assert_eq!(
            out.value
                .as_object()
                .unwrap()
                .get("action")
                .unwrap()
                .as_str(),
            Some("diagnostics")
        );
    }

    #[test]
    fn smart_quotes_inside_a_valid_string_value_are_preserved() {
        let input = "{\"command\":\"echo {\u{201C}action\u{201D}: \u{201C}diagnostics\u{201D}}\"}";
        let out = extract(input, &opts(), true).unwrap();
        assert!(!out.fixes.contains(&FixTag::NormalizedUnicodeQuotes));
        assert_eq!(
            out.value
                .as_object()
                .unwrap()
                .get("command")
                .unwrap()
                .as_str(),
            Some("echo {\u{201C}action\u{201D}: \u{201C}diagnostics\u{201D}}")
        );
    }

    #[test]
    fn unterminated_array_completes_via_partial_strategy() {
        let out = extract(r#"{"items":["a","b""#, &opts(), false).unwrap();
        assert!(out.fixes.contains(&FixTag::ExtractedPartial));
        assert!(out.is_partial);
        let items = out
            .value
            .as_object()
            .unwrap()
            .get("items")
            .unwrap()
            .as_array()
            .unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn string_fallback_preserves_original_text_verbatim() {
        let malformed = "not json at all, no braces, no markers here";
        let out = extract(malformed, &opts(), true).unwrap();
        assert_eq!(out.value, DynamicValue::String(malformed.to_string()));
        assert!(out.fixes.is_empty());
    }

    #[test]
    fn nested_objects_are_handled_by_the_balanced_scanner() {
        let text = "noise {\"a\":{\"b\":1}} more noise {\"c\":2}";
        let out = extract(text, &opts(), true).unwrap();
        assert_eq!(out.value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn fenced_blocks_are_not_repaired_when_another_block_already_parsed_strictly() {
        let text = "```json\n{\"a\":1}\n```\nand also\n```json\n{\"b\":2,}\n```";
        let out = extract(text, &opts(), true).unwrap();
        // Only the strictly-valid block is returned; the malformed sibling
        // is left untouched rather than repaired and folded in.
        assert_eq!(out.value, DynamicValue::Object(
            [("a".to_string(), DynamicValue::Number(1.0))].into_iter().collect(),
        ));
        assert!(!out.fixes.contains(&FixTag::AppliedAutoFixes));
    }

    #[test]
    fn extraction_failure_without_string_fallback() {
        let o = opts().with_allow_as_string(false);
        let err = extract("no json here", &o, true).unwrap_err();
        assert!(matches!(err, SapError::Extraction(_)));
    }
}
