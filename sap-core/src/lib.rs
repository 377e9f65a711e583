//! sap-core
//!
//! Foundational, provider-agnostic types for schema-aligned parsing: the
//! schema model (`SchemaNode`), the dynamic value tree produced by the
//! extractor (`DynamicValue`), the crate's error hierarchy, and the
//! configuration surface (`ParseOptions`) shared by every entry point in the
//! `sap` crate.
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod options;
pub mod schema;
pub mod value;

pub use error::{Result, SapError};
pub use options::ParseOptions;
pub use schema::{
    AdditionalItems, AdditionalProperties, NumericConstraints, Schema, SchemaMeta, SchemaNode,
    StringConstraints,
};
pub use value::DynamicValue;
