//! The dynamic value tree produced by the extractor, before the coercer maps
//! it onto a [`crate::schema::SchemaNode`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An untyped value recovered from model output.
///
/// This is deliberately a separate type from `serde_json::Value`: object keys
/// must preserve declaration order (several coercion rules, and all of the
/// fix/trace reporting, depend on it), and the extractor needs a home for
/// partiality bookkeeping that a bare JSON value has no room for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DynamicValue {
    /// JSON `null`, or an absent field.
    Null,
    /// JSON `true` / `false`.
    Bool(bool),
    /// Any JSON number, represented as an `f64` per §3's data model.
    Number(f64),
    /// A JSON string.
    String(String),
    /// A JSON array.
    Array(Vec<DynamicValue>),
    /// A JSON object, in declaration order.
    Object(IndexMap<String, DynamicValue>),
}

impl DynamicValue {
    /// The JSON type name of this value, used in diagnostics and union
    /// admissibility checks.
    pub fn type_name(&self) -> &'static str {
        match self {
            DynamicValue::Null => "null",
            DynamicValue::Bool(_) => "boolean",
            DynamicValue::Number(_) => "number",
            DynamicValue::String(_) => "string",
            DynamicValue::Array(_) => "array",
            DynamicValue::Object(_) => "object",
        }
    }

    /// `true` for `DynamicValue::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, DynamicValue::Null)
    }

    /// Borrow the inner string, if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DynamicValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the inner array, if this value is an array.
    pub fn as_array(&self) -> Option<&[DynamicValue]> {
        match self {
            DynamicValue::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Borrow the inner object, if this value is an object.
    pub fn as_object(&self) -> Option<&IndexMap<String, DynamicValue>> {
        match self {
            DynamicValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Stringify this value the way the String-target coercion rule does:
    /// strings pass through, scalars are textualized, and arrays/objects are
    /// JSON-encoded.
    pub fn stringify(&self) -> String {
        match self {
            DynamicValue::String(s) => s.clone(),
            DynamicValue::Null => "null".to_string(),
            DynamicValue::Bool(b) => b.to_string(),
            DynamicValue::Number(n) => format_number(*n),
            DynamicValue::Array(_) | DynamicValue::Object(_) => self.to_json(),
        }
    }

    /// Encode this value as JSON text, rendering every `Number` leaf through
    /// [`format_number`] regardless of nesting depth. `serde_json`'s default
    /// `f64` serialization would print integral numbers with a trailing
    /// `.0` (`5.0`) wherever they appear inside an array or object, while a
    /// top-level number renders through `format_number` as `5` — the same
    /// value would stringify differently depending on where it sits in the
    /// tree. This keeps numeric rendering uniform everywhere.
    fn to_json(&self) -> String {
        match self {
            DynamicValue::Null => "null".to_string(),
            DynamicValue::Bool(b) => b.to_string(),
            DynamicValue::Number(n) => format_number(*n),
            DynamicValue::String(s) => serde_json::to_string(s).unwrap_or_default(),
            DynamicValue::Array(items) => {
                let body: Vec<String> = items.iter().map(DynamicValue::to_json).collect();
                format!("[{}]", body.join(","))
            }
            DynamicValue::Object(map) => {
                let body: Vec<String> = map
                    .iter()
                    .map(|(k, v)| {
                        format!("{}:{}", serde_json::to_string(k).unwrap_or_default(), v.to_json())
                    })
                    .collect();
                format!("{{{}}}", body.join(","))
            }
        }
    }
}

impl fmt::Display for DynamicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stringify())
    }
}

/// Format a number the way `JSON.stringify` would: integral values print
/// without a trailing `.0`.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
