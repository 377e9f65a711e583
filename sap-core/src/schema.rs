//! The schema model: an in-memory tree of permitted type constructors and
//! their metadata (SPEC_FULL §3).
//!
//! A schema is built once by the caller and walked many times by the coercer
//! (once per union alternative tried, recursively). Recursive fields are
//! `Box`ed for ownership, following this workspace's convention for
//! recursive/shared data (`siumai_core::types::OutputSchema` and friends);
//! callers who retain one schema across many parses are expected to wrap the
//! whole tree in `Arc<Schema>` rather than clone it per call (SPEC_FULL §9).
//!
//! Every node — not just the root — carries its own [`SchemaMeta`] (default
//! value, description): an object field's `default` lives on that field's
//! own node, not on the parent `Object`. So the recursive containers below
//! (`Array`'s element schema, `Object`'s field schemas, `Union`'s
//! alternatives, ...) hold `Schema`, the node-plus-metadata pair, rather
//! than a bare `SchemaNode`.

use crate::value::DynamicValue;
use indexmap::IndexMap;
use indexmap::IndexSet;

/// Per-node metadata common to every schema kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaMeta {
    /// Value substituted when the field is absent and `use_defaults` is set.
    pub default: Option<DynamicValue>,
    /// Human-readable description, consumed only by the prompt-side renderer.
    pub description: Option<String>,
}

/// Numeric constraints shared by `Integer` and `Number`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumericConstraints {
    /// Inclusive lower bound.
    pub minimum: Option<f64>,
    /// Inclusive upper bound.
    pub maximum: Option<f64>,
    /// Exclusive lower bound.
    pub exclusive_minimum: Option<f64>,
    /// Exclusive upper bound.
    pub exclusive_maximum: Option<f64>,
    /// The value must be an integer multiple of this number.
    pub multiple_of: Option<f64>,
}

/// `String` constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringConstraints {
    /// Minimum length in characters.
    pub min_length: Option<usize>,
    /// Maximum length in characters.
    pub max_length: Option<usize>,
    /// A regular expression the value must match.
    pub pattern: Option<String>,
    /// A named format hint (consumed only by the prompt-side renderer; the
    /// coercer does not interpret it beyond passing it through).
    pub format: Option<String>,
}

/// What to do with object fields not declared in `properties`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AdditionalProperties {
    /// Pass undeclared fields through unchanged (the default).
    #[default]
    Allow,
    /// Drop undeclared fields.
    Deny,
    /// Coerce undeclared fields against this schema.
    Schema(Box<Schema>),
}

/// What to do with tuple elements beyond the declared arity.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AdditionalItems {
    /// Keep extra elements unchanged (the default).
    #[default]
    Allow,
    /// Silently drop extra elements beyond the declared arity; no
    /// diagnostic is raised (SPEC_FULL §4.3: "kept unless `additional_items`
    /// is explicitly false").
    Deny,
    /// Coerce extra elements against this schema.
    Schema(Box<Schema>),
}

/// A node in the schema tree: a tagged variant drawn from the closed set in
/// SPEC_FULL §3.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// A JSON string, with optional constraints.
    String(StringConstraints),
    /// A JSON integer; fractional input is truncated toward zero.
    Integer(NumericConstraints),
    /// A JSON number (integer or float).
    Number(NumericConstraints),
    /// A JSON boolean.
    Boolean,
    /// JSON `null`.
    Null,
    /// Accepts any value unchanged.
    Any,
    /// A single scalar constant.
    Literal(DynamicValue),
    /// An ordered set of scalar constants; accepted by exact or
    /// case-insensitive string match.
    Enum(Vec<DynamicValue>),
    /// A homogeneous array of `items`.
    Array {
        /// The schema every element must satisfy.
        items: Box<Schema>,
    },
    /// A fixed-arity, heterogeneous sequence.
    Tuple {
        /// Per-position schemas, in order.
        items: Vec<Schema>,
        /// How to treat elements beyond `items.len()`.
        additional_items: AdditionalItems,
    },
    /// An object with a declared set of fields.
    Object {
        /// Field name -> field schema, in declaration order.
        properties: IndexMap<String, Schema>,
        /// Names from `properties` that must be present.
        required: IndexSet<String>,
        /// How to treat fields not named in `properties`.
        additional_properties: AdditionalProperties,
    },
    /// A homogeneous string-keyed map.
    Record {
        /// The schema every value must satisfy. Keys are always strings.
        value: Box<Schema>,
    },
    /// An ordered list of alternatives; the coercer picks the best fit
    /// (SPEC_FULL §4.3 "Union selection").
    Union(Vec<Schema>),
    /// An ordered list of object schemas, shallow-merged field-wise before
    /// coercion (SPEC_FULL §4.3 "Intersect").
    Intersect(Vec<Schema>),
    /// Wraps an inner schema; both an absent field and an explicit `null`
    /// are accepted.
    Optional(Box<Schema>),
    /// A textual pointer. Treated as `Any` at coercion time; recorded as an
    /// unresolved-reference coercion note (SPEC_FULL §4.3, §7).
    Ref(String),
}

/// A schema node plus the metadata every node may carry.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// The type constructor and its payload.
    pub node: SchemaNode,
    /// Default value and description shared by every node kind.
    pub meta: SchemaMeta,
}

impl Schema {
    fn new(node: SchemaNode) -> Self {
        Self {
            node,
            meta: SchemaMeta::default(),
        }
    }

    /// An unconstrained `String` schema.
    pub fn string() -> Self {
        Self::new(SchemaNode::String(StringConstraints::default()))
    }

    /// A `String` schema with the given constraints.
    pub fn string_with(constraints: StringConstraints) -> Self {
        Self::new(SchemaNode::String(constraints))
    }

    /// An unconstrained `Integer` schema.
    pub fn integer() -> Self {
        Self::new(SchemaNode::Integer(NumericConstraints::default()))
    }

    /// An `Integer` schema with the given constraints.
    pub fn integer_with(constraints: NumericConstraints) -> Self {
        Self::new(SchemaNode::Integer(constraints))
    }

    /// An unconstrained `Number` schema.
    pub fn number() -> Self {
        Self::new(SchemaNode::Number(NumericConstraints::default()))
    }

    /// A `Number` schema with the given constraints.
    pub fn number_with(constraints: NumericConstraints) -> Self {
        Self::new(SchemaNode::Number(constraints))
    }

    /// A `Boolean` schema.
    pub fn boolean() -> Self {
        Self::new(SchemaNode::Boolean)
    }

    /// A `Null` schema.
    pub fn null() -> Self {
        Self::new(SchemaNode::Null)
    }

    /// An `Any` schema.
    pub fn any() -> Self {
        Self::new(SchemaNode::Any)
    }

    /// A `Literal` schema.
    pub fn literal(value: DynamicValue) -> Self {
        Self::new(SchemaNode::Literal(value))
    }

    /// An `Enum` schema.
    pub fn enum_of(values: Vec<DynamicValue>) -> Self {
        Self::new(SchemaNode::Enum(values))
    }

    /// An `Array` schema.
    pub fn array(items: Schema) -> Self {
        Self::new(SchemaNode::Array {
            items: Box::new(items),
        })
    }

    /// A `Tuple` schema with elements kept beyond the declared arity.
    pub fn tuple(items: Vec<Schema>) -> Self {
        Self::new(SchemaNode::Tuple {
            items,
            additional_items: AdditionalItems::Allow,
        })
    }

    /// An `Object` schema.
    pub fn object(properties: IndexMap<String, Schema>, required: IndexSet<String>) -> Self {
        Self::new(SchemaNode::Object {
            properties,
            required,
            additional_properties: AdditionalProperties::Allow,
        })
    }

    /// A `Record` schema.
    pub fn record(value: Schema) -> Self {
        Self::new(SchemaNode::Record {
            value: Box::new(value),
        })
    }

    /// A `Union` schema. Alternatives are tried in the given order, and
    /// ties are broken in favor of earlier alternatives (SPEC_FULL §3, §4.3).
    pub fn union(alternatives: Vec<Schema>) -> Self {
        Self::new(SchemaNode::Union(alternatives))
    }

    /// An `Intersect` schema.
    pub fn intersect(alternatives: Vec<Schema>) -> Self {
        Self::new(SchemaNode::Intersect(alternatives))
    }

    /// An `Optional` schema.
    pub fn optional(inner: Schema) -> Self {
        Self::new(SchemaNode::Optional(Box::new(inner)))
    }

    /// A `Ref` schema.
    pub fn reference(pointer: impl Into<String>) -> Self {
        Self::new(SchemaNode::Ref(pointer.into()))
    }

    /// Builder: restrict additional object properties.
    pub fn with_additional_properties(mut self, policy: AdditionalProperties) -> Self {
        if let SchemaNode::Object {
            additional_properties,
            ..
        } = &mut self.node
        {
            *additional_properties = policy;
        }
        self
    }

    /// Builder: restrict additional tuple items.
    pub fn with_additional_items(mut self, policy: AdditionalItems) -> Self {
        if let SchemaNode::Tuple {
            additional_items, ..
        } = &mut self.node
        {
            *additional_items = policy;
        }
        self
    }

    /// Builder: attach a default value.
    pub fn with_default(mut self, value: DynamicValue) -> Self {
        self.meta.default = Some(value);
        self
    }

    /// Builder: attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = Some(description.into());
        self
    }

    /// Whether this schema node (or, for `Union`, any alternative) accepts
    /// `null`. Used by the coercer's null-handling rule (SPEC_FULL §4.3).
    pub fn accepts_null(&self) -> bool {
        match &self.node {
            SchemaNode::Null | SchemaNode::Any | SchemaNode::Optional(_) => true,
            SchemaNode::Union(alts) => alts.iter().any(Schema::accepts_null),
            _ => false,
        }
    }
}
