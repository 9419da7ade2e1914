//! Registry-backed object instantiation
//!
//! Turns a concrete (fully expanded, branch-free)
//! [`TypedVariable`](crate::variable::TypedVariable) into a live object. Every constructible type declares a static field contract
//! ([`FieldSpec`]) and a [`FromDefinition`] constructor; the
//! [`ObjectRegistry`](registry::ObjectRegistry) maps type-tag strings to
//! builders and recurses into nested typed definitions so constructor
//! arguments arrive fully built.
//!
//! Validation fails loudly: a definition key the target does not accept is an
//! error, as is a missing required field. Configuration is never silently
//! dropped.
//!
//! # Example
//!
//! ```
//! use trazar::object::{FieldSpec, FromDefinition, ObjectError, ObjectRegistry, ResolvedFields};
//! use trazar::variable::parse_variable;
//!
//! struct Widget { size: u64 }
//!
//! impl FromDefinition for Widget {
//!     fn type_name() -> &'static str { "widget" }
//!     fn fields() -> &'static [FieldSpec] {
//!         const FIELDS: &[FieldSpec] = &[FieldSpec::required("size")];
//!         FIELDS
//!     }
//!     fn from_fields(fields: &mut ResolvedFields) -> Result<Self, ObjectError> {
//!         Ok(Widget { size: fields.u64_field("size")? })
//!     }
//! }
//!
//! let mut registry = ObjectRegistry::new();
//! registry.register::<Widget>();
//!
//! let def = parse_variable(&serde_json::json!({"objectType": "widget", "size": 4})).unwrap();
//! let widget: Widget = registry.instantiate_as(def.expect_typed().unwrap()).unwrap();
//! assert_eq!(widget.size, 4);
//! ```

mod registry;

pub use registry::ObjectRegistry;

use std::any::Any;

use serde_json::Value;
use thiserror::Error;

use crate::variable::{DefinitionVariable, Variable};

/// Errors raised while instantiating objects from a definition.
///
/// Fatal per variant: they abort the variant that triggered them and leave
/// sibling grid points untouched.
#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("unknown object type \"{0}\"")]
    UnknownType(String),

    #[error("{type_name}: missing required field \"{field}\"")]
    MissingField { type_name: String, field: String },

    #[error("{type_name}: unexpected field \"{field}\"")]
    UnexpectedField { type_name: String, field: String },

    #[error("field \"{field}\" is still UNDETERMINED at instantiation")]
    UnresolvedUndetermined { field: String },

    #[error("field \"{field}\" still contains an unexpanded branching axis")]
    ResidualMulti { field: String },

    #[error("{type_name}: field \"{field}\" has the wrong type (expected {expected})")]
    FieldType {
        type_name: String,
        field: String,
        expected: String,
    },

    #[error("registry built \"{type_name}\" but it is not the requested Rust type")]
    BuiltTypeMismatch { type_name: String },
}

/// One entry of a type's static field contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Parameter name, matched case-insensitively against definition keys.
    pub name: &'static str,
    /// Whether instantiation fails when the definition omits this field.
    pub required: bool,
}

impl FieldSpec {
    /// A field the definition must supply.
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
        }
    }

    /// A field the definition may omit.
    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
        }
    }
}

/// A constructor argument resolved from the definition tree.
///
/// Scalars and plain collections arrive as JSON; nested typed definitions
/// arrive as already-built objects.
pub enum ResolvedValue {
    /// Raw JSON payload.
    Json(Value),
    /// An object built through the registry for a nested typed definition.
    Object(Box<dyn Any>),
}

impl std::fmt::Debug for ResolvedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedValue::Json(v) => f.debug_tuple("Json").field(v).finish(),
            ResolvedValue::Object(_) => f.debug_tuple("Object").finish(),
        }
    }
}

/// The validated, fully resolved arguments handed to [`FromDefinition`].
///
/// By the time a constructor sees this, unexpected and missing fields have
/// already been rejected; the accessors here only deal with value shape.
#[derive(Debug)]
pub struct ResolvedFields {
    type_name: String,
    entries: Vec<(String, ResolvedValue)>,
}

impl ResolvedFields {
    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))
    }

    /// True if the definition supplied this field.
    pub fn has(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    fn json(&self, name: &str) -> Result<Option<&Value>, ObjectError> {
        match self.position(name) {
            None => Ok(None),
            Some(i) => match &self.entries[i].1 {
                ResolvedValue::Json(v) => Ok(Some(v)),
                ResolvedValue::Object(_) => Err(self.wrong_type(name, "a JSON value")),
            },
        }
    }

    fn required_json(&self, name: &str) -> Result<&Value, ObjectError> {
        self.json(name)?.ok_or_else(|| ObjectError::MissingField {
            type_name: self.type_name.clone(),
            field: name.to_string(),
        })
    }

    fn wrong_type(&self, field: &str, expected: &str) -> ObjectError {
        ObjectError::FieldType {
            type_name: self.type_name.clone(),
            field: field.to_string(),
            expected: expected.to_string(),
        }
    }

    /// String field.
    pub fn str_field(&self, name: &str) -> Result<String, ObjectError> {
        match self.required_json(name)? {
            Value::String(s) => Ok(s.clone()),
            _ => Err(self.wrong_type(name, "a string")),
        }
    }

    /// Unsigned integer field.
    pub fn u64_field(&self, name: &str) -> Result<u64, ObjectError> {
        self.required_json(name)?
            .as_u64()
            .ok_or_else(|| self.wrong_type(name, "an unsigned integer"))
    }

    /// Float field (integers widen).
    pub fn f64_field(&self, name: &str) -> Result<f64, ObjectError> {
        self.required_json(name)?
            .as_f64()
            .ok_or_else(|| self.wrong_type(name, "a number"))
    }

    /// Boolean field.
    pub fn bool_field(&self, name: &str) -> Result<bool, ObjectError> {
        self.required_json(name)?
            .as_bool()
            .ok_or_else(|| self.wrong_type(name, "a boolean"))
    }

    /// Optional float field; `Ok(None)` when omitted.
    pub fn opt_f64(&self, name: &str) -> Result<Option<f64>, ObjectError> {
        match self.json(name)? {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.wrong_type(name, "a number")),
        }
    }

    /// Optional string field; `Ok(None)` when omitted.
    pub fn opt_str(&self, name: &str) -> Result<Option<String>, ObjectError> {
        match self.json(name)? {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.wrong_type(name, "a string")),
        }
    }

    /// Deserialize a JSON field into any serde type.
    pub fn deserialize_field<T: serde::de::DeserializeOwned>(
        &self,
        name: &str,
    ) -> Result<T, ObjectError> {
        let value = self.required_json(name)?.clone();
        serde_json::from_value(value).map_err(|e| self.wrong_type(name, &e.to_string()))
    }

    /// Take ownership of a nested object built through the registry,
    /// downcasting it to its concrete Rust type.
    pub fn take_object<T: 'static>(&mut self, name: &str) -> Result<T, ObjectError> {
        let i = self.position(name).ok_or_else(|| ObjectError::MissingField {
            type_name: self.type_name.clone(),
            field: name.to_string(),
        })?;
        match self.entries.remove(i) {
            (_, ResolvedValue::Object(boxed)) => boxed
                .downcast::<T>()
                .map(|b| *b)
                .map_err(|_| self.wrong_type(name, std::any::type_name::<T>())),
            (key, value) => {
                // Put it back so a later accessor still sees it.
                self.entries.insert(i, (key, value));
                Err(self.wrong_type(
                    name,
                    "a constructed object (does the nested definition carry an \"objectType\" tag?)",
                ))
            }
        }
    }
}

/// Contract for types constructible from a definition.
///
/// The registry validates the definition's keys against [`fields`] before
/// [`from_fields`] runs, so constructors receive exactly the declared
/// parameters, fully resolved.
///
/// [`fields`]: FromDefinition::fields
/// [`from_fields`]: FromDefinition::from_fields
pub trait FromDefinition: Sized {
    /// Registry name matched against the definition's type tag.
    fn type_name() -> &'static str;

    /// Static field contract.
    fn fields() -> &'static [FieldSpec];

    /// Build from validated, resolved fields.
    fn from_fields(fields: &mut ResolvedFields) -> Result<Self, ObjectError>;
}

/// Validate a definition's keys against a static field contract.
///
/// Rejects keys the contract does not name (unexpected field) and required
/// fields the definition omits (missing field).
pub fn check_fields(
    type_name: &str,
    specs: &[FieldSpec],
    def: &DefinitionVariable,
) -> Result<(), ObjectError> {
    for (key, _) in def.iter() {
        if !specs.iter().any(|spec| spec.name.eq_ignore_ascii_case(key)) {
            return Err(ObjectError::UnexpectedField {
                type_name: type_name.to_string(),
                field: key.to_string(),
            });
        }
    }
    for spec in specs {
        if spec.required && !def.contains_key(spec.name) {
            return Err(ObjectError::MissingField {
                type_name: type_name.to_string(),
                field: spec.name.to_string(),
            });
        }
    }
    Ok(())
}

/// Validate and resolve a typed definition's fields, depth-first.
///
/// Children resolve before parents: nested typed definitions are built
/// through the registry here, so `from_fields` never sees an unresolved
/// variable.
pub fn resolve_fields(
    type_name: &str,
    specs: &[FieldSpec],
    def: &DefinitionVariable,
    registry: &ObjectRegistry,
) -> Result<ResolvedFields, ObjectError> {
    check_fields(type_name, specs, def)?;

    let mut entries = Vec::with_capacity(def.len());
    for (key, var) in def.iter() {
        entries.push((key.to_string(), resolve_value(key, var, registry)?));
    }

    Ok(ResolvedFields {
        type_name: type_name.to_string(),
        entries,
    })
}

fn resolve_value(
    field: &str,
    var: &Variable,
    registry: &ObjectRegistry,
) -> Result<ResolvedValue, ObjectError> {
    match var {
        Variable::Scalar(v) => Ok(ResolvedValue::Json(v.clone())),
        Variable::List(items) => Ok(ResolvedValue::Json(Value::Array(
            items
                .iter()
                .map(|item| plain_json(field, item))
                .collect::<Result<Vec<_>, _>>()?,
        ))),
        Variable::Definition(nested) => Ok(ResolvedValue::Json(plain_json_definition(nested)?)),
        Variable::Typed(typed) => Ok(ResolvedValue::Object(registry.instantiate(typed)?)),
        Variable::Undetermined => Err(ObjectError::UnresolvedUndetermined {
            field: field.to_string(),
        }),
        Variable::Multi(_) => Err(ObjectError::ResidualMulti {
            field: field.to_string(),
        }),
    }
}

/// Render an untyped subtree back to JSON for argument passthrough. Typed
/// definitions and residual markers are not legal inside plain data.
fn plain_json(field: &str, var: &Variable) -> Result<Value, ObjectError> {
    match var {
        Variable::Scalar(v) => Ok(v.clone()),
        Variable::List(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| plain_json(field, item))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Variable::Definition(nested) => plain_json_definition(nested),
        Variable::Typed(typed) => Err(ObjectError::FieldType {
            type_name: typed.object_type.clone(),
            field: field.to_string(),
            expected: "plain data (typed definitions cannot nest inside lists or untyped mappings)"
                .to_string(),
        }),
        Variable::Undetermined => Err(ObjectError::UnresolvedUndetermined {
            field: field.to_string(),
        }),
        Variable::Multi(_) => Err(ObjectError::ResidualMulti {
            field: field.to_string(),
        }),
    }
}

fn plain_json_definition(def: &DefinitionVariable) -> Result<Value, ObjectError> {
    let mut map = serde_json::Map::new();
    for (key, var) in def.iter() {
        map.insert(key.to_string(), plain_json(key, var)?);
    }
    Ok(Value::Object(map))
}
