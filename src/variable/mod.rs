//! Experiment definition language
//!
//! A definition is a nested, JSON-compatible tree describing how to build the
//! objects of an experiment. Three reserved conventions drive its
//! interpretation:
//!
//! - a mapping carrying an `"objectType"` key (any casing) is a
//!   [`TypedVariable`], a recipe for polymorphic instantiation;
//! - a mapping whose only key is `"*"` is a [`MultiVariable`], a branching
//!   axis whose alternatives fan out into separate experiment variants;
//! - the literal string `"UNDETERMINED"` is an [`Variable::Undetermined`]
//!   placeholder, filled by feedback from an earlier pipeline stage.
//!
//! Everything else is carried opaquely: scalars as [`Variable::Scalar`],
//! arrays as [`Variable::List`], and untagged mappings as
//! [`DefinitionVariable`]s with case-insensitive key lookup.
//!
//! # Example
//!
//! ```
//! use trazar::variable::{parse_definition, Variable};
//!
//! let raw = serde_json::json!({
//!     "objectType": "vsm",
//!     "min_score": { "*": [0.0, 0.5] },
//!     "checkpoint": "UNDETERMINED",
//! });
//! let def = parse_definition(&raw).unwrap();
//! assert!(def.contains_multi());
//! assert!(matches!(def.get("Checkpoint"), Some(Variable::Undetermined)));
//! ```

mod parse;

#[cfg(test)]
mod tests;

pub use parse::{parse_definition, parse_variable};

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

/// Reserved key naming the target type of a [`TypedVariable`].
pub const TYPE_TAG_KEY: &str = "objectType";

/// Reserved key marking a branching axis. Must be the mapping's only key.
pub const MULTI_MARKER_KEY: &str = "*";

/// Sentinel string marking a value resolved by a later pipeline stage.
pub const UNDETERMINED_SENTINEL: &str = "UNDETERMINED";

/// Errors raised while parsing or expanding a definition tree.
///
/// These are configuration errors: fatal, raised before any job executes,
/// never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("definition is missing the required \"{TYPE_TAG_KEY}\" tag")]
    MissingTypeTag,

    #[error("\"{TYPE_TAG_KEY}\" must be a non-empty string, got {0}")]
    InvalidTypeTag(String),

    #[error("branching marker \"{MULTI_MARKER_KEY}\" must hold a non-empty array of alternatives")]
    EmptyMulti,

    #[error("branching marker \"{MULTI_MARKER_KEY}\" must be the only key of its mapping")]
    StrayMultiMarker,

    #[error("duplicate key (case-insensitive): \"{0}\"")]
    DuplicateKey(String),

    #[error("definition root must be a mapping, got {0}")]
    NonMappingRoot(String),

    #[error("nested branching exceeded {0} expansion passes")]
    NestedBranchingTooDeep(usize),
}

/// A single node of the definition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Variable {
    /// Opaque scalar payload, passed through to construction unchanged.
    Scalar(Value),
    /// Ordered sequence of nested variables.
    List(Vec<Variable>),
    /// Named mapping describing one object's construction.
    Definition(DefinitionVariable),
    /// Definition tagged with a target type for polymorphic instantiation.
    Typed(TypedVariable),
    /// Branching axis: each alternative yields a separate variant.
    Multi(MultiVariable),
    /// Placeholder filled by feedback from a prior pipeline stage.
    Undetermined,
}

impl Variable {
    /// Wrap a JSON-compatible value as an opaque scalar.
    pub fn scalar(value: impl Into<Value>) -> Self {
        Variable::Scalar(value.into())
    }

    /// True if this subtree still contains a branching axis.
    pub fn contains_multi(&self) -> bool {
        match self {
            Variable::Multi(_) => true,
            Variable::List(items) => items.iter().any(Variable::contains_multi),
            Variable::Definition(def) => def.contains_multi(),
            Variable::Typed(typed) => typed.body.contains_multi(),
            Variable::Scalar(_) | Variable::Undetermined => false,
        }
    }

    /// Scalar payload, if this node is a scalar.
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Variable::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// The mapping body of this node, for both tagged and plain definitions.
    pub fn as_definition(&self) -> Option<&DefinitionVariable> {
        match self {
            Variable::Definition(def) => Some(def),
            Variable::Typed(typed) => Some(&typed.body),
            _ => None,
        }
    }

    /// Require this node to be a [`TypedVariable`].
    ///
    /// A plain mapping in a position that demands a type tag is a fatal
    /// configuration error, not a silently accepted definition.
    pub fn expect_typed(&self) -> Result<&TypedVariable, ConfigError> {
        match self {
            Variable::Typed(typed) => Ok(typed),
            _ => Err(ConfigError::MissingTypeTag),
        }
    }

    /// Render this node back into plain JSON, reinstating reserved markers.
    pub fn to_json(&self) -> Value {
        match self {
            Variable::Scalar(v) => v.clone(),
            Variable::List(items) => Value::Array(items.iter().map(Variable::to_json).collect()),
            Variable::Definition(def) => def.to_json(),
            Variable::Typed(typed) => typed.to_json(),
            Variable::Multi(multi) => {
                let alts = multi.alternatives().iter().map(Variable::to_json).collect();
                let mut map = serde_json::Map::new();
                map.insert(MULTI_MARKER_KEY.to_string(), Value::Array(alts));
                Value::Object(map)
            }
            Variable::Undetermined => Value::String(UNDETERMINED_SENTINEL.to_string()),
        }
    }
}

/// A mapping from parameter names to [`Variable`]s.
///
/// Keys are unique under case-insensitive comparison and `get` disregards
/// case. Entry order is preserved from construction and drives the
/// deterministic traversal order of grid expansion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DefinitionVariable {
    entries: Vec<(String, Variable)>,
}

impl DefinitionVariable {
    /// Create an empty definition.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new entry, rejecting keys that collide case-insensitively.
    pub fn insert(&mut self, key: impl Into<String>, value: Variable) -> Result<(), ConfigError> {
        let key = key.into();
        if self.contains_key(&key) {
            return Err(ConfigError::DuplicateKey(key));
        }
        self.entries.push((key, value));
        Ok(())
    }

    /// Insert or replace the entry for `key` (case-insensitive match).
    pub fn set(&mut self, key: impl Into<String>, value: Variable) {
        let key = key.into();
        match self
            .entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Look up an entry, disregarding key case.
    pub fn get(&self, key: &str) -> Option<&Variable> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Mutable case-insensitive lookup.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Variable> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// True if an entry exists for `key`, disregarding case.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate entries in stored order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Mutable iteration in stored order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Variable)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), &mut *v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the definition holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if any entry's subtree still contains a branching axis.
    pub fn contains_multi(&self) -> bool {
        self.entries.iter().any(|(_, v)| v.contains_multi())
    }

    /// Replace remaining `UNDETERMINED` placeholders from feedback produced
    /// by earlier pipeline stages.
    ///
    /// A placeholder under key `k` is filled when `feedback` holds an entry
    /// whose key equals `k` case-insensitively. Placeholders with no matching
    /// feedback are left in place; reaching instantiation with one is the
    /// instantiating stage's error to raise.
    pub fn fill_undetermined(&mut self, feedback: &HashMap<String, Value>) {
        for (key, value) in &mut self.entries {
            match value {
                Variable::Undetermined => {
                    if let Some(supplied) = lookup_ci(feedback, key) {
                        *value = Variable::Scalar(supplied.clone());
                    }
                }
                Variable::Definition(def) => def.fill_undetermined(feedback),
                Variable::Typed(typed) => typed.body.fill_undetermined(feedback),
                Variable::List(items) => fill_items(items, feedback),
                Variable::Scalar(_) | Variable::Multi(_) => {}
            }
        }
    }

    /// Render back into a JSON mapping.
    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (key, value) in &self.entries {
            map.insert(key.clone(), value.to_json());
        }
        Value::Object(map)
    }
}

fn lookup_ci<'a>(feedback: &'a HashMap<String, Value>, key: &str) -> Option<&'a Value> {
    feedback
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

fn fill_items(items: &mut [Variable], feedback: &HashMap<String, Value>) {
    for item in items {
        match item {
            Variable::Definition(def) => def.fill_undetermined(feedback),
            Variable::Typed(typed) => typed.body.fill_undetermined(feedback),
            Variable::List(inner) => fill_items(inner, feedback),
            Variable::Scalar(_) | Variable::Multi(_) | Variable::Undetermined => {}
        }
    }
}

/// A definition tagged with the name of the type it instantiates.
///
/// The reserved tag key is stripped from the body during parsing; `to_json`
/// reinstates it.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedVariable {
    /// Registry name of the target type.
    pub object_type: String,
    /// Construction parameters, tag key excluded.
    pub body: DefinitionVariable,
}

impl TypedVariable {
    /// Create a typed definition.
    pub fn new(object_type: impl Into<String>, body: DefinitionVariable) -> Self {
        Self {
            object_type: object_type.into(),
            body,
        }
    }

    /// Render back into a JSON mapping with the tag key reinstated.
    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert(
            TYPE_TAG_KEY.to_string(),
            Value::String(self.object_type.clone()),
        );
        if let Value::Object(body) = self.body.to_json() {
            for (k, v) in body {
                map.insert(k, v);
            }
        }
        Value::Object(map)
    }
}

/// An ordered, non-empty sequence of alternatives for one parameter slot.
///
/// Each alternative is a complete stand-in for the slot; expansion selects
/// exactly one per variant.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiVariable {
    alternatives: Vec<Variable>,
}

impl MultiVariable {
    /// Create a branching axis. Zero alternatives is a configuration error,
    /// not an empty expansion.
    pub fn new(alternatives: Vec<Variable>) -> Result<Self, ConfigError> {
        if alternatives.is_empty() {
            return Err(ConfigError::EmptyMulti);
        }
        Ok(Self { alternatives })
    }

    /// The alternatives, in declaration order.
    pub fn alternatives(&self) -> &[Variable] {
        &self.alternatives
    }

    /// Number of alternatives.
    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    /// Always false; construction rejects empty axes.
    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }
}
