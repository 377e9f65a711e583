//! Composes the filter, extractor and coercer into the crate's public call
//! surface (SPEC_FULL §4.4, §6).
//!
//! This module contains no parsing or coercion logic of its own: it only
//! sequences the three stages and packages the `ParseResult` metadata. Each
//! entry point wraps the whole call in one outer `tracing` span, in the
//! manner of `siumai::orchestrator::generate`'s single-span-per-call shape,
//! letting the inner stages (cot_filter, extractor, coercer) add their own
//! `debug!`/`warn!`/`trace!` events to it.

use sap_core::{DynamicValue, ParseOptions, SapError, Schema};

use crate::coercer;
use crate::cot_filter;
use crate::extractor;
use crate::result::{ParseMeta, ParseResult};

/// Recover a value from `response` conforming to `schema`, per `options`.
///
/// This is the crate's primary entry point: chain-of-thought filter, then
/// extraction, then coercion, packaged with provenance metadata.
pub fn parse(
    response: &str,
    schema: &Schema,
    options: &ParseOptions,
) -> Result<ParseResult, SapError> {
    let span = tracing::info_span!("sap_parse", schema_kind = schema_kind_name(schema));
    let _enter = span.enter();
    run(response, schema, options, true)
}

/// Identical to [`parse`], with `allow_partials` and `allow_as_string`
/// forced on (SPEC_FULL §6): the intended entry point for mid-stream model
/// output that may be truncated.
pub fn parse_partial(
    response: &str,
    schema: &Schema,
    options: &ParseOptions,
) -> Result<ParseResult, SapError> {
    let span = tracing::info_span!("sap_parse_partial", schema_kind = schema_kind_name(schema));
    let _enter = span.enter();
    let partial_options = options.clone().for_partial();
    run(response, schema, &partial_options, false)
}

/// Coerce every distinct JSON value the extractor recovered from `response`
/// against `schema`, independently, returning one [`ParseResult`] per
/// candidate in recovery order.
///
/// Most responses yield a single candidate; several arise only when the
/// fenced-block or multi-object-scan strategy found more than one
/// plausible JSON value in the same text (SPEC_FULL §4.2 strategies 2-3).
pub fn parse_all_candidates(
    response: &str,
    schema: &Schema,
    options: &ParseOptions,
) -> Result<Vec<ParseResult>, SapError> {
    let span = tracing::info_span!(
        "sap_parse_all_candidates",
        schema_kind = schema_kind_name(schema)
    );
    let _enter = span.enter();

    let filtered = filter_input(response, options);
    let extraction = extractor::extract(&filtered.text, options, true)?;

    let candidates = if extraction.candidates.is_empty() {
        vec![extraction.value.clone()]
    } else {
        extraction.candidates.clone()
    };

    candidates
        .into_iter()
        .map(|candidate| finish(response, &filtered, &extraction, candidate, schema, options))
        .collect()
}

/// [`parse_all_candidates`], returning only the candidate with the fewest
/// coercion errors. Ties are broken in favor of the earlier candidate, the
/// same rule union-variant selection uses (SPEC_FULL §4.3).
pub fn parse_best_candidate(
    response: &str,
    schema: &Schema,
    options: &ParseOptions,
) -> Result<ParseResult, SapError> {
    let mut results = parse_all_candidates(response, schema, options)?;
    let best_index = results
        .iter()
        .enumerate()
        .min_by_key(|(_, r)| r.errors.len())
        .map(|(i, _)| i)
        .expect("parse_all_candidates always returns at least one result");
    Ok(results.swap_remove(best_index))
}

struct FilteredInput {
    text: String,
    trimmed: bool,
}

fn filter_input(response: &str, options: &ParseOptions) -> FilteredInput {
    if !options.filter_chain_of_thought {
        return FilteredInput {
            text: response.to_string(),
            trimmed: false,
        };
    }
    let outcome = cot_filter::filter(response);
    FilteredInput {
        text: outcome.text,
        trimmed: outcome.trimmed,
    }
}

fn run(
    response: &str,
    schema: &Schema,
    options: &ParseOptions,
    input_is_complete: bool,
) -> Result<ParseResult, SapError> {
    let filtered = filter_input(response, options);
    let extraction = extractor::extract(&filtered.text, options, input_is_complete)?;

    let selected = if options.return_all_candidates && extraction.candidates.len() > 1 {
        tracing::debug!(
            count = extraction.candidates.len(),
            "return_all_candidates set: selecting best-fit candidate rather than the merged value"
        );
        select_best(&extraction.candidates, schema, options)
    } else {
        extraction.value.clone()
    };

    finish(response, &filtered, &extraction, selected, schema, options)
}

/// Coerce every candidate and keep the one with the fewest errors, tie-break
/// to the earliest (used by `parse`'s `return_all_candidates` option; the
/// dedicated `parse_all_candidates`/`parse_best_candidate` entry points go
/// through [`finish`] themselves so callers see every candidate's full
/// `ParseResult`, not just the winning value).
fn select_best(candidates: &[DynamicValue], schema: &Schema, options: &ParseOptions) -> DynamicValue {
    let mut best: Option<(DynamicValue, usize)> = None;
    for candidate in candidates {
        let Ok(outcome) = coercer::coerce(candidate.clone(), schema, options) else {
            continue;
        };
        let errors = outcome.errors.len();
        let is_better = match &best {
            None => true,
            Some((_, best_errors)) => errors < *best_errors,
        };
        if is_better {
            best = Some((candidate.clone(), errors));
        }
    }
    best.map(|(value, _)| value)
        .unwrap_or_else(|| candidates[0].clone())
}

fn finish(
    raw: &str,
    filtered: &FilteredInput,
    extraction: &extractor::ExtractionOutcome,
    value: DynamicValue,
    schema: &Schema,
    options: &ParseOptions,
) -> Result<ParseResult, SapError> {
    let coerced = coercer::coerce(value, schema, options)?;

    let meta = ParseMeta {
        raw: raw.to_string(),
        from_markdown: extraction.from_markdown,
        chain_of_thought_filtered: filtered.trimmed,
        fixes: extraction.fixes.clone(),
        coercions: if options.track_coercions {
            Some(coerced.coercions)
        } else {
            None
        },
    };

    Ok(ParseResult {
        success: coerced.errors.is_empty(),
        value: coerced.value,
        errors: coerced.errors,
        is_partial: extraction.is_partial || coerced.is_partial,
        meta,
    })
}

/// A short label for the schema's top-level tag, attached to the outer
/// tracing span so a caller can filter logs by target shape without parsing
/// the message text.
fn schema_kind_name(schema: &Schema) -> &'static str {
    use sap_core::SchemaNode::*;
    match &schema.node {
        String(_) => "string",
        Integer(_) => "integer",
        Number(_) => "number",
        Boolean => "boolean",
        Null => "null",
        Any => "any",
        Literal(_) => "literal",
        Enum(_) => "enum",
        Array { .. } => "array",
        Tuple { .. } => "tuple",
        Object { .. } => "object",
        Record { .. } => "record",
        Union(_) => "union",
        Intersect(_) => "intersect",
        Optional(_) => "optional",
        Ref(_) => "ref",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sap_core::schema::NumericConstraints;

    fn obj_schema() -> Schema {
        let mut props = indexmap::IndexMap::new();
        props.insert("name".to_string(), Schema::string());
        props.insert("count".to_string(), Schema::integer());
        let mut required = indexmap::IndexSet::new();
        required.insert("name".to_string());
        required.insert("count".to_string());
        Schema::object(props, required)
    }

    #[test]
    fn plain_json_parses_successfully() {
        let result = parse(
            r#"{"name":"test","count":5}"#,
            &obj_schema(),
            &ParseOptions::default(),
        )
        .unwrap();
        assert!(result.success);
        assert!(result.meta.fixes.is_empty());
        assert_eq!(
            result.value.as_object().unwrap().get("count"),
            Some(&DynamicValue::Number(5.0))
        );
    }

    #[test]
    fn fenced_block_sets_from_markdown() {
        let mut props = indexmap::IndexMap::new();
        props.insert("value".to_string(), Schema::boolean());
        let mut required = indexmap::IndexSet::new();
        required.insert("value".to_string());
        let schema = Schema::object(props, required);

        let result = parse(
            "```json\n{\"value\": true}\n```",
            &schema,
            &ParseOptions::default(),
        )
        .unwrap();
        assert!(result.success);
        assert!(result.meta.from_markdown);
    }

    #[test]
    fn chain_of_thought_wrap_is_filtered_and_parsed() {
        let mut props = indexmap::IndexMap::new();
        props.insert("answer".to_string(), Schema::string());
        let mut required = indexmap::IndexSet::new();
        required.insert("answer".to_string());
        let schema = Schema::object(props, required);

        let input = "Let me think... Therefore the output JSON is:\n```json\n{\"answer\":\"hi\"}\n```";
        let result = parse(input, &schema, &ParseOptions::default()).unwrap();
        assert!(result.success);
        assert!(result.meta.chain_of_thought_filtered);
        assert_eq!(
            result.value.as_object().unwrap().get("answer").unwrap(),
            &DynamicValue::String("hi".into())
        );
    }

    #[test]
    fn partial_stream_reports_is_partial_with_prefix() {
        let mut props = indexmap::IndexMap::new();
        props.insert("items".to_string(), Schema::array(Schema::string()));
        let mut required = indexmap::IndexSet::new();
        required.insert("items".to_string());
        let schema = Schema::object(props, required);

        let result = parse_partial(r#"{"items":["a","b""#, &schema, &ParseOptions::default()).unwrap();
        assert!(result.is_partial);
        let items = result.value.as_object().unwrap().get("items").unwrap();
        assert_eq!(items.as_array().unwrap().len(), 2);
    }

    #[test]
    fn out_of_range_number_fails_with_minimum_violation() {
        let schema = Schema::number_with(NumericConstraints {
            minimum: Some(0.0),
            ..Default::default()
        });
        let result = parse(r#"{"age":-5}"#, &wrap_age(schema), &ParseOptions::default()).unwrap();
        assert!(!result.success);
        assert!(result.errors.iter().any(|e| e.path == "age"));
    }

    fn wrap_age(age_schema: Schema) -> Schema {
        let mut props = indexmap::IndexMap::new();
        props.insert("age".to_string(), age_schema);
        let mut required = indexmap::IndexSet::new();
        required.insert("age".to_string());
        Schema::object(props, required)
    }

    #[test]
    fn multiple_candidates_are_each_coerced_independently() {
        let schema = Schema::object(indexmap::IndexMap::new(), indexmap::IndexSet::new());
        let input = "noise {\"a\":1} more noise {\"b\":2}";
        let results = parse_all_candidates(input, &schema, &ParseOptions::default()).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
    }

    #[test]
    fn best_candidate_picks_fewest_errors_with_earlier_tie_break() {
        let mut props = indexmap::IndexMap::new();
        props.insert("a".to_string(), Schema::string());
        let mut required = indexmap::IndexSet::new();
        required.insert("a".to_string());
        let schema = Schema::object(props, required);

        let input = "noise {\"a\":\"x\"} more noise {\"b\":1}";
        let result = parse_best_candidate(input, &schema, &ParseOptions::default()).unwrap();
        assert!(result.success);
        assert_eq!(
            result.value.as_object().unwrap().get("a"),
            Some(&DynamicValue::String("x".into()))
        );
    }
}
