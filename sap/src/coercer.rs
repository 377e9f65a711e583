//! The type coercer (SPEC_FULL §4.3): walks a [`DynamicValue`] against a
//! [`Schema`], producing a best-effort value, an accumulated error list, and
//! (when enabled) a coercion trace. This is the algorithmic heart of the
//! crate, most of all in union-variant selection.
//!
//! Grounded in `siumai_core::types::schema::SchemaValidator`'s
//! accept/reject shape and `siumai_extras::structured_output`'s
//! "lossy repair, never hard-fail on a single field" philosophy, generalized
//! from JSON Schema validation to full value coercion.

use sap_core::schema::{AdditionalItems, AdditionalProperties};
use sap_core::{DynamicValue, ParseOptions, SapError, Schema, SchemaNode};

use crate::result::{CoercionNote, Diagnostic, DiagnosticKind};

struct Ctx<'a> {
    options: &'a ParseOptions,
    depth: usize,
}

/// Accumulates diagnostics and coercion notes during a walk. Union
/// selection runs trial alternatives through a private `Sink` so a failed
/// trial's errors never leak into the caller's result.
#[derive(Default)]
struct Sink {
    errors: Vec<Diagnostic>,
    coercions: Vec<CoercionNote>,
    partial: bool,
}

impl Sink {
    fn error(&mut self, path: &str, message: impl Into<String>, kind: DiagnosticKind) {
        self.errors.push(Diagnostic::new(path, message, kind));
    }

    fn note(&mut self, path: &str, message: impl Into<String>) {
        let note = CoercionNote::new(path, message);
        tracing::trace!(path = %note.path, message = %note.message, "coercion");
        self.coercions.push(note);
    }
}

/// The result of coercing a value against a schema.
pub struct CoerceOutput {
    /// The coerced, best-effort value.
    pub value: DynamicValue,
    /// Every diagnostic accumulated during the walk, in encounter order.
    pub errors: Vec<Diagnostic>,
    /// The coercion trace (always collected internally; the caller decides
    /// whether to surface it based on `track_coercions`).
    pub coercions: Vec<CoercionNote>,
    /// `true` when `allow_partials` is set and the walk observed an
    /// incomplete position (SPEC_FULL §4.3 "Completeness").
    pub is_partial: bool,
}

/// Coerce `value` against `schema`, the crate's only public coercer entry
/// point.
pub fn coerce(
    value: DynamicValue,
    schema: &Schema,
    options: &ParseOptions,
) -> Result<CoerceOutput, SapError> {
    let mut ctx = Ctx { options, depth: 0 };
    let mut sink = Sink::default();
    let result = walk(Some(&value), schema, "", &mut ctx, &mut sink)?;
    Ok(CoerceOutput {
        value: result,
        errors: sink.errors,
        coercions: sink.coercions,
        is_partial: sink.partial,
    })
}

fn join_field(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

fn join_index(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

fn is_absent(value: Option<&DynamicValue>) -> bool {
    matches!(value, None | Some(DynamicValue::Null))
}

fn walk(
    value: Option<&DynamicValue>,
    schema: &Schema,
    path: &str,
    ctx: &mut Ctx,
    sink: &mut Sink,
) -> Result<DynamicValue, SapError> {
    ctx.depth += 1;
    if ctx.depth > ctx.options.max_coercion_depth {
        return Err(SapError::DepthExceeded {
            limit: ctx.options.max_coercion_depth,
            phase: "coercing",
        });
    }
    let result = walk_inner(value, schema, path, ctx, sink);
    ctx.depth -= 1;
    result
}

fn walk_inner(
    value: Option<&DynamicValue>,
    schema: &Schema,
    path: &str,
    ctx: &mut Ctx,
    sink: &mut Sink,
) -> Result<DynamicValue, SapError> {
    // `Ref` is always treated as `Any` and recorded, regardless of nullness.
    if let SchemaNode::Ref(pointer) = &schema.node {
        sink.note(path, format!("unresolved reference `{pointer}` treated as Any"));
        return Ok(value.cloned().unwrap_or(DynamicValue::Null));
    }

    if is_absent(value) {
        if schema.accepts_null() {
            return Ok(DynamicValue::Null);
        }
        if ctx.options.allow_partials {
            sink.partial = true;
            return Ok(DynamicValue::Null);
        }
        sink.error(path, "required value is missing", DiagnosticKind::MissingRequired);
        return Ok(DynamicValue::Null);
    }
    let dv = value.expect("checked non-absent above");

    match &schema.node {
        SchemaNode::Any => Ok(dv.clone()),
        SchemaNode::Null => Ok(DynamicValue::Null),
        SchemaNode::Optional(inner) => walk(Some(dv), inner, path, ctx, sink),
        SchemaNode::String(constraints) => coerce_string(dv, constraints, path, ctx, sink),
        SchemaNode::Integer(constraints) => coerce_number(dv, constraints, true, path, ctx, sink),
        SchemaNode::Number(constraints) => coerce_number(dv, constraints, false, path, ctx, sink),
        SchemaNode::Boolean => coerce_boolean(dv, path, ctx, sink),
        SchemaNode::Literal(literal) => coerce_literal(dv, literal, path, sink),
        SchemaNode::Enum(values) => coerce_enum(dv, values, path, sink),
        SchemaNode::Array { items } => coerce_array(dv, items, path, ctx, sink),
        SchemaNode::Tuple {
            items,
            additional_items,
        } => coerce_tuple(dv, items, additional_items, path, ctx, sink),
        SchemaNode::Object {
            properties,
            required,
            additional_properties,
        } => coerce_object(dv, properties, required, additional_properties, path, ctx, sink),
        SchemaNode::Record { value: value_schema } => {
            coerce_record(dv, value_schema, path, ctx, sink)
        }
        SchemaNode::Union(alternatives) => coerce_union(dv, alternatives, path, ctx, sink),
        SchemaNode::Intersect(alternatives) => coerce_intersect(dv, alternatives, path, ctx, sink),
        SchemaNode::Ref(_) => unreachable!("handled above"),
    }
}

fn coerce_string(
    dv: &DynamicValue,
    constraints: &sap_core::schema::StringConstraints,
    path: &str,
    ctx: &mut Ctx,
    sink: &mut Sink,
) -> Result<DynamicValue, SapError> {
    let strict = ctx.options.strict;
    let s = match dv {
        DynamicValue::String(s) => s.clone(),
        DynamicValue::Number(_) | DynamicValue::Bool(_) if strict => {
            sink.error(
                path,
                format!("expected string, got {}", dv.type_name()),
                DiagnosticKind::TypeMismatch,
            );
            dv.stringify()
        }
        DynamicValue::Number(_) => {
            sink.note(path, "stringified number");
            dv.stringify()
        }
        DynamicValue::Bool(_) => {
            sink.note(path, "stringified boolean");
            dv.stringify()
        }
        DynamicValue::Array(_) | DynamicValue::Object(_) => {
            if strict {
                sink.error(
                    path,
                    format!("expected string, got {}", dv.type_name()),
                    DiagnosticKind::TypeMismatch,
                );
            } else {
                sink.note(path, "JSON-encoded container as string");
            }
            dv.stringify()
        }
        DynamicValue::Null => unreachable!("null handled by caller"),
    };

    validate_string_constraints(&s, constraints, path, sink)?;
    Ok(DynamicValue::String(s))
}

fn validate_string_constraints(
    s: &str,
    constraints: &sap_core::schema::StringConstraints,
    path: &str,
    sink: &mut Sink,
) -> Result<(), SapError> {
    let len = s.chars().count();
    if let Some(min) = constraints.min_length {
        if len < min {
            sink.error(
                path,
                format!("length {len} is less than minimum {min}"),
                DiagnosticKind::ConstraintViolation,
            );
        }
    }
    if let Some(max) = constraints.max_length {
        if len > max {
            sink.error(
                path,
                format!("length {len} exceeds maximum {max}"),
                DiagnosticKind::ConstraintViolation,
            );
        }
    }
    if let Some(pattern) = &constraints.pattern {
        let re = regex::Regex::new(pattern).map_err(|source| SapError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        if !re.is_match(s) {
            sink.error(
                path,
                format!("value does not match pattern {pattern:?}"),
                DiagnosticKind::ConstraintViolation,
            );
        }
    }
    if let Some(format) = &constraints.format {
        if !matches_known_format(format, s) {
            sink.error(
                path,
                format!("value does not satisfy format {format:?}"),
                DiagnosticKind::ConstraintViolation,
            );
        }
    }
    Ok(())
}

/// Only a handful of formats are recognized well enough to validate at
/// runtime; unrecognized format names are accepted unconditionally (the
/// prompt-side renderer is the primary consumer of `format`, per SPEC_FULL
/// §3).
fn matches_known_format(format: &str, s: &str) -> bool {
    match format {
        "email" => s.contains('@') && !s.starts_with('@') && !s.ends_with('@'),
        "uuid" => {
            s.len() == 36
                && s.as_bytes()[8] == b'-'
                && s.as_bytes()[13] == b'-'
                && s.as_bytes()[18] == b'-'
                && s.as_bytes()[23] == b'-'
        }
        "date" => s.len() == 10 && s.as_bytes().get(4) == Some(&b'-') && s.as_bytes().get(7) == Some(&b'-'),
        _ => true,
    }
}

fn coerce_number(
    dv: &DynamicValue,
    constraints: &sap_core::schema::NumericConstraints,
    integer: bool,
    path: &str,
    ctx: &mut Ctx,
    sink: &mut Sink,
) -> Result<DynamicValue, SapError> {
    let strict = ctx.options.strict;
    let mut n = match dv {
        DynamicValue::Number(n) => *n,
        DynamicValue::String(s) => {
            if strict {
                sink.error(
                    path,
                    "expected number, got string",
                    DiagnosticKind::TypeMismatch,
                );
                0.0
            } else {
                match s.trim().parse::<f64>() {
                    Ok(v) => {
                        sink.note(path, "parsed string to number");
                        v
                    }
                    Err(_) => {
                        sink.error(
                            path,
                            format!("could not parse {s:?} as a number"),
                            DiagnosticKind::TypeMismatch,
                        );
                        0.0
                    }
                }
            }
        }
        DynamicValue::Bool(b) => {
            if strict {
                sink.error(
                    path,
                    "expected number, got boolean",
                    DiagnosticKind::TypeMismatch,
                );
                0.0
            } else {
                sink.note(path, "parsed boolean to number");
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
        }
        other => {
            sink.error(
                path,
                format!("expected number, got {}", other.type_name()),
                DiagnosticKind::TypeMismatch,
            );
            0.0
        }
    };

    if integer && n.fract() != 0.0 {
        let truncated = n.trunc();
        sink.note(path, format!("truncated {n} to {truncated}"));
        n = truncated;
    }

    if let Some(min) = constraints.minimum {
        if n < min {
            sink.error(
                path,
                format!("{n} is less than minimum {min}"),
                DiagnosticKind::ConstraintViolation,
            );
        }
    }
    if let Some(max) = constraints.maximum {
        if n > max {
            sink.error(
                path,
                format!("{n} exceeds maximum {max}"),
                DiagnosticKind::ConstraintViolation,
            );
        }
    }
    if let Some(ex_min) = constraints.exclusive_minimum {
        if n <= ex_min {
            sink.error(
                path,
                format!("{n} does not exceed exclusive minimum {ex_min}"),
                DiagnosticKind::ConstraintViolation,
            );
        }
    }
    if let Some(ex_max) = constraints.exclusive_maximum {
        if n >= ex_max {
            sink.error(
                path,
                format!("{n} does not fall below exclusive maximum {ex_max}"),
                DiagnosticKind::ConstraintViolation,
            );
        }
    }
    if let Some(multiple) = constraints.multiple_of {
        if multiple != 0.0 && (n / multiple).round() * multiple != n {
            sink.error(
                path,
                format!("{n} is not a multiple of {multiple}"),
                DiagnosticKind::ConstraintViolation,
            );
        }
    }

    Ok(DynamicValue::Number(n))
}

fn coerce_boolean(
    dv: &DynamicValue,
    path: &str,
    ctx: &mut Ctx,
    sink: &mut Sink,
) -> Result<DynamicValue, SapError> {
    let strict = ctx.options.strict;
    match dv {
        DynamicValue::Bool(b) => Ok(DynamicValue::Bool(*b)),
        DynamicValue::String(s) if !strict => {
            let lower = s.to_lowercase();
            match lower.as_str() {
                "true" | "1" | "yes" => {
                    sink.note(path, "parsed string to boolean");
                    Ok(DynamicValue::Bool(true))
                }
                "false" | "0" | "no" | "" => {
                    sink.note(path, "parsed string to boolean");
                    Ok(DynamicValue::Bool(false))
                }
                _ => {
                    sink.error(
                        path,
                        format!("{s:?} is not a recognized boolean"),
                        DiagnosticKind::TypeMismatch,
                    );
                    Ok(DynamicValue::Bool(false))
                }
            }
        }
        DynamicValue::Number(n) if !strict => {
            sink.note(path, "parsed number to boolean");
            Ok(DynamicValue::Bool(*n != 0.0))
        }
        other => {
            sink.error(
                path,
                format!("expected boolean, got {}", other.type_name()),
                DiagnosticKind::TypeMismatch,
            );
            Ok(DynamicValue::Bool(false))
        }
    }
}

fn coerce_literal(
    dv: &DynamicValue,
    literal: &DynamicValue,
    path: &str,
    sink: &mut Sink,
) -> Result<DynamicValue, SapError> {
    if dv == literal {
        return Ok(literal.clone());
    }
    if dv.stringify() == literal.stringify() {
        sink.note(path, "matched literal by string equivalence");
        return Ok(literal.clone());
    }
    sink.error(
        path,
        format!("expected literal {literal:?}, got {dv:?}"),
        DiagnosticKind::ConstraintViolation,
    );
    Ok(dv.clone())
}

fn coerce_enum(
    dv: &DynamicValue,
    values: &[DynamicValue],
    path: &str,
    sink: &mut Sink,
) -> Result<DynamicValue, SapError> {
    if values.contains(dv) {
        return Ok(dv.clone());
    }
    if let DynamicValue::String(s) = dv {
        for candidate in values {
            if let DynamicValue::String(cs) = candidate {
                if cs.eq_ignore_ascii_case(s) {
                    sink.note(path, "matched enum member case-insensitively");
                    return Ok(candidate.clone());
                }
            }
        }
    }
    sink.error(
        path,
        format!("{dv:?} is not a member of the enum"),
        DiagnosticKind::ConstraintViolation,
    );
    Ok(dv.clone())
}

fn coerce_array(
    dv: &DynamicValue,
    items_schema: &Schema,
    path: &str,
    ctx: &mut Ctx,
    sink: &mut Sink,
) -> Result<DynamicValue, SapError> {
    let items: Vec<DynamicValue> = match dv {
        DynamicValue::Array(items) => items.clone(),
        other => {
            sink.note(path, "wrapped scalar in single-element array");
            vec![other.clone()]
        }
    };

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let child_path = join_index(path, i);
        out.push(walk(Some(item), items_schema, &child_path, ctx, sink)?);
    }

    if ctx.options.allow_partials && out.is_empty() {
        sink.partial = true;
    }

    Ok(DynamicValue::Array(out))
}

fn coerce_tuple(
    dv: &DynamicValue,
    items_schema: &[Schema],
    additional_items: &AdditionalItems,
    path: &str,
    ctx: &mut Ctx,
    sink: &mut Sink,
) -> Result<DynamicValue, SapError> {
    let items: Vec<DynamicValue> = match dv {
        DynamicValue::Array(items) => items.clone(),
        other => {
            sink.note(path, "wrapped scalar in single-element array");
            vec![other.clone()]
        }
    };

    let mut out = Vec::with_capacity(items_schema.len());
    for (i, schema) in items_schema.iter().enumerate() {
        let child_path = join_index(path, i);
        if let Some(item) = items.get(i) {
            out.push(walk(Some(item), schema, &child_path, ctx, sink)?);
        } else if ctx.options.use_defaults && schema.meta.default.is_some() {
            let default = schema.meta.default.clone().unwrap();
            out.push(walk(Some(&default), schema, &child_path, ctx, sink)?);
        } else if ctx.options.allow_partials {
            sink.partial = true;
            out.push(DynamicValue::Null);
        } else {
            sink.error(
                &child_path,
                "required tuple element is missing",
                DiagnosticKind::MissingRequired,
            );
            out.push(DynamicValue::Null);
        }
    }

    if items.len() > items_schema.len() {
        match additional_items {
            AdditionalItems::Allow => {
                out.extend(items[items_schema.len()..].iter().cloned());
            }
            AdditionalItems::Deny => {}
            AdditionalItems::Schema(schema) => {
                for (offset, item) in items[items_schema.len()..].iter().enumerate() {
                    let child_path = join_index(path, items_schema.len() + offset);
                    out.push(walk(Some(item), schema, &child_path, ctx, sink)?);
                }
            }
        }
    }

    Ok(DynamicValue::Array(out))
}

fn coerce_object(
    dv: &DynamicValue,
    properties: &indexmap::IndexMap<String, Schema>,
    required: &indexmap::IndexSet<String>,
    additional_properties: &AdditionalProperties,
    path: &str,
    ctx: &mut Ctx,
    sink: &mut Sink,
) -> Result<DynamicValue, SapError> {
    let object = match dv {
        DynamicValue::Object(map) => map.clone(),
        DynamicValue::Array(items) => {
            sink.note(path, "wrapped array as object by decimal index");
            items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect()
        }
        DynamicValue::String(s) => {
            match crate::extractor::extract(s, ctx.options, true) {
                Ok(outcome) => match outcome.value {
                    DynamicValue::Object(map) => {
                        sink.note(path, "extracted nested object from string");
                        map
                    }
                    _ => {
                        sink.error(
                            path,
                            "expected object, got a string that is not itself an object",
                            DiagnosticKind::TypeMismatch,
                        );
                        return Ok(DynamicValue::Object(Default::default()));
                    }
                },
                Err(_) => {
                    sink.error(
                        path,
                        "expected object, could not extract one from string",
                        DiagnosticKind::TypeMismatch,
                    );
                    return Ok(DynamicValue::Object(Default::default()));
                }
            }
        }
        other => {
            sink.error(
                path,
                format!("expected object, got {}", other.type_name()),
                DiagnosticKind::TypeMismatch,
            );
            return Ok(DynamicValue::Object(Default::default()));
        }
    };

    let mut out = indexmap::IndexMap::new();
    for (name, field_schema) in properties {
        let child_path = join_field(path, name);
        if let Some(field_value) = object.get(name) {
            out.insert(
                name.clone(),
                walk(Some(field_value), field_schema, &child_path, ctx, sink)?,
            );
        } else if ctx.options.use_defaults && field_schema.meta.default.is_some() {
            let default = field_schema.meta.default.clone().unwrap();
            sink.note(&child_path, "applied schema default for missing field");
            out.insert(
                name.clone(),
                walk(Some(&default), field_schema, &child_path, ctx, sink)?,
            );
        } else if required.contains(name) {
            if ctx.options.allow_partials {
                sink.partial = true;
            } else {
                sink.error(
                    &child_path,
                    "required field is missing",
                    DiagnosticKind::MissingRequired,
                );
            }
        }
        // Optional and absent, no default: leave out of the output map.
    }

    for (name, field_value) in object.iter() {
        if properties.contains_key(name) {
            continue;
        }
        match additional_properties {
            AdditionalProperties::Allow => {
                out.insert(name.clone(), field_value.clone());
            }
            AdditionalProperties::Deny => {}
            AdditionalProperties::Schema(schema) => {
                let child_path = join_field(path, name);
                out.insert(
                    name.clone(),
                    walk(Some(field_value), schema, &child_path, ctx, sink)?,
                );
            }
        }
    }

    Ok(DynamicValue::Object(out))
}

fn coerce_record(
    dv: &DynamicValue,
    value_schema: &Schema,
    path: &str,
    ctx: &mut Ctx,
    sink: &mut Sink,
) -> Result<DynamicValue, SapError> {
    let object = match dv {
        DynamicValue::Object(map) => map,
        other => {
            sink.error(
                path,
                format!("expected object for record, got {}", other.type_name()),
                DiagnosticKind::TypeMismatch,
            );
            return Ok(DynamicValue::Object(Default::default()));
        }
    };

    let mut out = indexmap::IndexMap::new();
    for (key, value) in object {
        let child_path = join_field(path, key);
        out.insert(key.clone(), walk(Some(value), value_schema, &child_path, ctx, sink)?);
    }
    Ok(DynamicValue::Object(out))
}

fn coerce_intersect(
    dv: &DynamicValue,
    alternatives: &[Schema],
    path: &str,
    ctx: &mut Ctx,
    sink: &mut Sink,
) -> Result<DynamicValue, SapError> {
    let mut merged_properties = indexmap::IndexMap::new();
    let mut merged_required = indexmap::IndexSet::new();
    for alt in alternatives {
        if let SchemaNode::Object {
            properties,
            required,
            ..
        } = &alt.node
        {
            for (name, schema) in properties {
                merged_properties.insert(name.clone(), schema.clone());
            }
            for name in required {
                merged_required.insert(name.clone());
            }
        }
    }

    coerce_object(
        dv,
        &merged_properties,
        &merged_required,
        &AdditionalProperties::Allow,
        path,
        ctx,
        sink,
    )
}

/// The cheap admissibility prefilter for union selection (SPEC_FULL §4.3
/// step 1): whether `alt`'s tag admits `value`'s dynamic shape at all,
/// before spending a full coercion trial on it.
fn can_handle(alt: &Schema, value: Option<&DynamicValue>) -> bool {
    match &alt.node {
        SchemaNode::Any | SchemaNode::Ref(_) => true,
        SchemaNode::Null => is_absent(value),
        SchemaNode::Optional(inner) => is_absent(value) || can_handle(inner, value),
        SchemaNode::String(_) => matches!(value, Some(DynamicValue::String(_))),
        SchemaNode::Integer(_) | SchemaNode::Number(_) => {
            matches!(value, Some(DynamicValue::Number(_)))
        }
        SchemaNode::Boolean => matches!(value, Some(DynamicValue::Bool(_))),
        SchemaNode::Literal(lit) => value.map(|v| v == lit).unwrap_or(false),
        SchemaNode::Enum(values) => value
            .map(|v| {
                values.contains(v)
                    || matches!(v, DynamicValue::String(s) if values.iter().any(|c| matches!(c, DynamicValue::String(cs) if cs.eq_ignore_ascii_case(s))))
            })
            .unwrap_or(false),
        SchemaNode::Array { .. } | SchemaNode::Tuple { .. } => {
            matches!(value, Some(DynamicValue::Array(_)))
        }
        SchemaNode::Object { .. } | SchemaNode::Record { .. } | SchemaNode::Intersect(_) => {
            matches!(value, Some(DynamicValue::Object(_)))
        }
        SchemaNode::Union(alts) => alts.iter().any(|a| can_handle(a, value)),
    }
}

fn coerce_union(
    dv: &DynamicValue,
    alternatives: &[Schema],
    path: &str,
    ctx: &mut Ctx,
    sink: &mut Sink,
) -> Result<DynamicValue, SapError> {
    let admissible: Vec<&Schema> = alternatives
        .iter()
        .filter(|alt| can_handle(alt, Some(dv)))
        .collect();

    let mut best: Option<(DynamicValue, Sink)> = None;

    for alt in &admissible {
        let mut trial = Sink::default();
        let value = walk(Some(dv), alt, path, ctx, &mut trial)?;
        if trial.errors.is_empty() {
            sink.coercions.extend(trial.coercions);
            sink.partial = sink.partial || trial.partial;
            return Ok(value);
        }
        let is_better = match &best {
            None => true,
            Some((_, best_sink)) => trial.errors.len() < best_sink.errors.len(),
        };
        if is_better {
            best = Some((value, trial));
        }
    }

    if let Some((value, trial)) = best {
        tracing::warn!(
            path,
            error_count = trial.errors.len(),
            "union selection had no zero-error alternative, falling back to best effort"
        );
        sink.note(
            path,
            format!("selected union alternative with {} error(s)", trial.errors.len()),
        );
        sink.errors.extend(trial.errors);
        sink.coercions.extend(trial.coercions);
        sink.partial = sink.partial || trial.partial;
        return Ok(value);
    }

    // No alternative was admissible: fall back to each in turn, writing
    // straight into the caller's buffers, and keep the first that doesn't
    // raise a genuine `SapError`.
    let mut last_err = None;
    for alt in alternatives {
        match walk(Some(dv), alt, path, ctx, sink) {
            Ok(value) => return Ok(value),
            Err(e) => last_err = Some(e),
        }
    }
    match last_err {
        Some(e) => Err(e),
        None => {
            sink.error(path, "no union alternative could accept the value", DiagnosticKind::TypeMismatch);
            Ok(dv.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sap_core::schema::NumericConstraints;

    fn opts() -> ParseOptions {
        ParseOptions::default()
    }

    #[test]
    fn plain_object_coerces_successfully() {
        let mut props = indexmap::IndexMap::new();
        props.insert("name".to_string(), Schema::string());
        props.insert("count".to_string(), Schema::integer());
        let mut required = indexmap::IndexSet::new();
        required.insert("name".to_string());
        required.insert("count".to_string());
        let schema = Schema::object(props, required);

        let mut input = indexmap::IndexMap::new();
        input.insert("name".to_string(), DynamicValue::String("test".into()));
        input.insert("count".to_string(), DynamicValue::Number(5.0));
        let out = coerce(DynamicValue::Object(input), &schema, &opts()).unwrap();
        assert!(out.errors.is_empty());
        assert_eq!(
            out.value.as_object().unwrap().get("count"),
            Some(&DynamicValue::Number(5.0))
        );
    }

    #[test]
    fn string_to_integer_is_coerced_and_traced() {
        let schema = Schema::integer();
        let out = coerce(DynamicValue::String("42".into()), &schema, &opts()).unwrap();
        assert_eq!(out.value, DynamicValue::Number(42.0));
        assert!(out.coercions.iter().any(|c| c.message.contains("parsed string to number")));
    }

    #[test]
    fn out_of_range_number_is_reported_but_value_kept() {
        let schema = Schema::number_with(NumericConstraints {
            minimum: Some(0.0),
            ..Default::default()
        });
        let out = coerce(DynamicValue::Number(-5.0), &schema, &opts()).unwrap();
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].path, "");
        assert_eq!(out.errors[0].kind, DiagnosticKind::ConstraintViolation);
    }

    #[test]
    fn missing_required_field_without_partials_errors() {
        let mut props = indexmap::IndexMap::new();
        props.insert("name".to_string(), Schema::string());
        let mut required = indexmap::IndexSet::new();
        required.insert("name".to_string());
        let schema = Schema::object(props, required);

        let out = coerce(
            DynamicValue::Object(Default::default()),
            &schema,
            &opts(),
        )
        .unwrap();
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].kind, DiagnosticKind::MissingRequired);
        assert_eq!(out.errors[0].path, "name");
    }

    #[test]
    fn union_picks_zero_error_alternative_with_tie_break_to_earlier() {
        let schema = Schema::union(vec![Schema::string(), Schema::integer()]);
        let out = coerce(DynamicValue::String("hello".into()), &schema, &opts()).unwrap();
        assert_eq!(out.value, DynamicValue::String("hello".into()));
        assert!(out.errors.is_empty());
    }

    #[test]
    fn union_falls_back_to_best_effort_when_no_alternative_is_clean() {
        let schema = Schema::union(vec![
            Schema::object(
                {
                    let mut p = indexmap::IndexMap::new();
                    p.insert("a".to_string(), Schema::string());
                    p
                },
                {
                    let mut r = indexmap::IndexSet::new();
                    r.insert("a".to_string());
                    r
                },
            ),
            Schema::object(
                {
                    let mut p = indexmap::IndexMap::new();
                    p.insert("b".to_string(), Schema::string());
                    p
                },
                {
                    let mut r = indexmap::IndexSet::new();
                    r.insert("b".to_string());
                    r
                },
            ),
        ]);
        let mut input = indexmap::IndexMap::new();
        input.insert("c".to_string(), DynamicValue::String("x".into()));
        let out = coerce(DynamicValue::Object(input), &schema, &opts()).unwrap();
        assert_eq!(out.errors.len(), 1);
        assert!(out
            .coercions
            .iter()
            .any(|c| c.message.contains("selected union alternative")));
    }

    #[test]
    fn ref_node_passes_through_with_a_note() {
        let schema = Schema::reference("#/definitions/Thing");
        let out = coerce(DynamicValue::Number(3.0), &schema, &opts()).unwrap();
        assert_eq!(out.value, DynamicValue::Number(3.0));
        assert!(out.coercions.iter().any(|c| c.message.contains("unresolved reference")));
    }

    #[test]
    fn allow_partials_accepts_missing_required_field() {
        let mut props = indexmap::IndexMap::new();
        props.insert("name".to_string(), Schema::string());
        let mut required = indexmap::IndexSet::new();
        required.insert("name".to_string());
        let schema = Schema::object(props, required);

        let o = opts().with_allow_partials(true);
        let out = coerce(DynamicValue::Object(Default::default()), &schema, &o).unwrap();
        assert!(out.errors.is_empty());
        assert!(out.is_partial);
    }

    #[test]
    fn tuple_with_additional_items_deny_drops_extras_without_error() {
        let schema = Schema::tuple(vec![Schema::string(), Schema::integer()])
            .with_additional_items(AdditionalItems::Deny);

        let input = DynamicValue::Array(vec![
            DynamicValue::String("a".into()),
            DynamicValue::Number(1.0),
            DynamicValue::String("extra".into()),
        ]);
        let out = coerce(input, &schema, &opts()).unwrap();
        assert!(out.errors.is_empty());
        assert_eq!(
            out.value,
            DynamicValue::Array(vec![
                DynamicValue::String("a".into()),
                DynamicValue::Number(1.0),
            ])
        );
    }
}
