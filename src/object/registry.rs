//! Type registry: name -> builder table
//!
//! An explicit registration table populated at startup, queried through a
//! single lookup-or-error path. The registry owns the lookup contract only;
//! callers decide what gets registered.

use std::any::Any;
use std::collections::HashMap;

use crate::variable::TypedVariable;

use super::{resolve_fields, FromDefinition, ObjectError};

type Builder =
    Box<dyn Fn(&TypedVariable, &ObjectRegistry) -> Result<Box<dyn Any>, ObjectError> + Send + Sync>;

/// Maps type-tag strings to object builders.
///
/// Names are matched case-insensitively, like every other key in the
/// definition language.
#[derive(Default)]
pub struct ObjectRegistry {
    builders: HashMap<String, Builder>,
}

impl ObjectRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a [`FromDefinition`] type under its declared name.
    ///
    /// The generated builder validates the definition against the type's
    /// field contract, resolves nested definitions through this registry,
    /// and boxes the constructed value.
    pub fn register<T: FromDefinition + 'static>(&mut self) {
        self.register_with(T::type_name(), |typed, registry| {
            let mut fields =
                resolve_fields(T::type_name(), T::fields(), &typed.body, registry)?;
            Ok(Box::new(T::from_fields(&mut fields)?) as Box<dyn Any>)
        });
    }

    /// Register a custom builder under an explicit name.
    ///
    /// Escape hatch for builders that wrap their product in a trait object
    /// or otherwise deviate from plain [`FromDefinition`] construction.
    pub fn register_with<F>(&mut self, name: &str, builder: F)
    where
        F: Fn(&TypedVariable, &ObjectRegistry) -> Result<Box<dyn Any>, ObjectError>
            + Send
            + Sync
            + 'static,
    {
        self.builders
            .insert(name.to_ascii_lowercase(), Box::new(builder));
    }

    /// True if a builder is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Build the object a typed definition describes.
    pub fn instantiate(&self, typed: &TypedVariable) -> Result<Box<dyn Any>, ObjectError> {
        let builder = self
            .builders
            .get(&typed.object_type.to_ascii_lowercase())
            .ok_or_else(|| ObjectError::UnknownType(typed.object_type.clone()))?;
        builder(typed, self)
    }

    /// Build and downcast to a concrete Rust type.
    pub fn instantiate_as<T: 'static>(&self, typed: &TypedVariable) -> Result<T, ObjectError> {
        self.instantiate(typed)?
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| ObjectError::BuiltTypeMismatch {
                type_name: typed.object_type.clone(),
            })
    }
}

impl std::fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}
