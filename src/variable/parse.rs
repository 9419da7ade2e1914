//! Parse raw JSON into the definition tree
//!
//! Each JSON node has exactly one interpretation:
//!
//! - mapping with the reserved type key -> [`TypedVariable`]
//! - mapping whose single key is `"*"` -> [`MultiVariable`]
//! - any other mapping -> plain [`DefinitionVariable`]
//! - the string `"UNDETERMINED"` -> [`Variable::Undetermined`]
//! - arrays -> [`Variable::List`] of parsed elements
//! - any other scalar -> [`Variable::Scalar`]

use serde_json::Value;

use super::{
    ConfigError, DefinitionVariable, MultiVariable, TypedVariable, Variable, MULTI_MARKER_KEY,
    TYPE_TAG_KEY, UNDETERMINED_SENTINEL,
};

/// Parse a JSON value that must be a mapping into a definition.
///
/// This is the entry point for a definition document root; nested values go
/// through [`parse_variable`].
pub fn parse_definition(value: &Value) -> Result<DefinitionVariable, ConfigError> {
    match parse_variable(value)? {
        Variable::Definition(def) => Ok(def),
        Variable::Typed(typed) => {
            // A tagged root is still a mapping; keep the tag as an entry so
            // callers see the same shape they wrote.
            let mut def = DefinitionVariable::new();
            def.insert(TYPE_TAG_KEY, Variable::scalar(typed.object_type.clone()))?;
            for (key, var) in typed.body.iter() {
                def.insert(key, var.clone())?;
            }
            Ok(def)
        }
        other => Err(ConfigError::NonMappingRoot(json_kind(value, &other))),
    }
}

/// Parse any JSON value into a [`Variable`].
pub fn parse_variable(value: &Value) -> Result<Variable, ConfigError> {
    match value {
        Value::String(s) if s == UNDETERMINED_SENTINEL => Ok(Variable::Undetermined),
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            Ok(Variable::Scalar(value.clone()))
        }
        Value::Array(items) => {
            let parsed = items
                .iter()
                .map(parse_variable)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Variable::List(parsed))
        }
        Value::Object(map) => parse_mapping(map),
    }
}

fn parse_mapping(map: &serde_json::Map<String, Value>) -> Result<Variable, ConfigError> {
    if map.contains_key(MULTI_MARKER_KEY) {
        if map.len() != 1 {
            return Err(ConfigError::StrayMultiMarker);
        }
        return parse_multi(&map[MULTI_MARKER_KEY]);
    }

    let mut object_type = None;
    let mut body = DefinitionVariable::new();
    for (key, value) in map {
        if key.eq_ignore_ascii_case(TYPE_TAG_KEY) {
            if object_type.is_some() {
                return Err(ConfigError::DuplicateKey(key.clone()));
            }
            object_type = Some(parse_type_tag(value)?);
            continue;
        }
        body.insert(key.clone(), parse_variable(value)?)?;
    }

    match object_type {
        Some(name) => Ok(Variable::Typed(TypedVariable::new(name, body))),
        None => Ok(Variable::Definition(body)),
    }
}

fn parse_type_tag(value: &Value) -> Result<String, ConfigError> {
    match value {
        Value::String(name) if !name.is_empty() => Ok(name.clone()),
        other => Err(ConfigError::InvalidTypeTag(other.to_string())),
    }
}

fn parse_multi(value: &Value) -> Result<Variable, ConfigError> {
    let alternatives = match value {
        Value::Array(items) => items
            .iter()
            .map(parse_variable)
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(ConfigError::EmptyMulti),
    };
    Ok(Variable::Multi(MultiVariable::new(alternatives)?))
}

fn json_kind(value: &Value, parsed: &Variable) -> String {
    match parsed {
        Variable::Multi(_) => "a branching marker".to_string(),
        Variable::Undetermined => format!("the sentinel {UNDETERMINED_SENTINEL:?}"),
        _ => match value {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "a boolean".to_string(),
            Value::Number(_) => "a number".to_string(),
            Value::String(_) => "a string".to_string(),
            Value::Array(_) => "an array".to_string(),
            Value::Object(_) => "a mapping".to_string(),
        },
    }
}
