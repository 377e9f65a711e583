//! sap
//!
//! Schema-aligned parsing: recover a typed value from free-form text
//! produced by a large language model, given a declarative [`Schema`]
//! describing the expected shape. Handles prose-wrapped JSON, fenced code
//! blocks, trailing commas, unquoted keys, smart quotes, and mid-stream
//! truncation (SPEC_FULL §1).
//!
//! ```
//! use indexmap::{IndexMap, IndexSet};
//! use sap::{parse, ParseOptions, Schema};
//!
//! let mut properties = IndexMap::new();
//! properties.insert("name".to_string(), Schema::string());
//! properties.insert("count".to_string(), Schema::integer());
//! let mut required = IndexSet::new();
//! required.insert("name".to_string());
//! let schema = Schema::object(properties, required);
//!
//! let result = parse(
//!     "Sure, here is the json:\n```json\n{\"name\": \"widget\", \"count\": \"3\"}\n```",
//!     &schema,
//!     &ParseOptions::default(),
//! )
//! .unwrap();
//! assert!(result.success);
//! assert!(result.meta.from_markdown);
//! ```
//!
//! The crate is a pure, synchronous library (SPEC_FULL §5, §9): every entry
//! point is a function of its response text, schema, and [`ParseOptions`];
//! there is no global state, background task, or I/O. It emits `tracing`
//! events at strategy boundaries but never installs a subscriber itself.
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod coercer;
mod cot_filter;
mod extractor;
mod orchestrator;
pub mod result;

pub use orchestrator::{parse, parse_all_candidates, parse_best_candidate, parse_partial};
pub use result::{CoercionNote, Diagnostic, DiagnosticKind, FixTag, ParseMeta, ParseResult};
pub use sap_core::{
    AdditionalItems, AdditionalProperties, NumericConstraints, ParseOptions, Result, SapError,
    Schema, SchemaMeta, SchemaNode, StringConstraints,
};
pub use sap_core::DynamicValue;
