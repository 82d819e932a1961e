//! Attribute definitions and defaults.

use crate::model::value::Value;
use crate::transform::{Transform, TransformError};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Default applied when an attribute has no stored field.
#[derive(Clone)]
pub enum AttributeDefault {
    /// Typed value used as-is.
    Value(Value),
    /// Stored-form string passed through the attribute's transform.
    Stored(String),
    /// Called each time a default is needed.
    Producer(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl AttributeDefault {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn stored(raw: impl Into<String>) -> Self {
        Self::Stored(raw.into())
    }

    pub fn producer(producer: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        Self::Producer(Arc::new(producer))
    }

    /// Typed default in the attribute's own type: values pass through the
    /// transform's stored form, so `value("5")` on an integer yields
    /// `Integer(5)` exactly as a stored `"5"` would.
    pub(crate) fn resolve(&self, transform: &dyn Transform) -> Result<Value, TransformError> {
        match self {
            Self::Value(value) => normalize(transform, value),
            Self::Stored(raw) => transform.deserialize(raw),
            Self::Producer(producer) => normalize(transform, &producer()),
        }
    }
}

fn normalize(transform: &dyn Transform, value: &Value) -> Result<Value, TransformError> {
    match transform.serialize(value)? {
        Some(raw) => transform.deserialize(&raw),
        None => Ok(Value::Null),
    }
}

impl Debug for AttributeDefault {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Stored(raw) => f.debug_tuple("Stored").field(raw).finish(),
            Self::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// One declared attribute. Immutable once the schema is built.
#[derive(Clone)]
pub struct AttributeDef {
    name: String,
    tag: String,
    transform: Arc<dyn Transform>,
    default: Option<AttributeDefault>,
}

impl AttributeDef {
    pub(crate) fn new(
        name: String,
        transform: Arc<dyn Transform>,
        default: Option<AttributeDefault>,
    ) -> Self {
        Self {
            name,
            tag: transform.tag().to_string(),
            transform,
            default,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn transform(&self) -> &dyn Transform {
        self.transform.as_ref()
    }

    pub fn default(&self) -> Option<&AttributeDefault> {
        self.default.as_ref()
    }

    /// Typed default, or `Value::Null` when none is declared.
    pub(crate) fn default_value(&self) -> Result<Value, TransformError> {
        match &self.default {
            Some(default) => default.resolve(self.transform.as_ref()),
            None => Ok(Value::Null),
        }
    }

    pub(crate) fn serialize(&self, value: &Value) -> Result<Option<String>, TransformError> {
        self.transform.serialize(value)
    }

    pub(crate) fn deserialize(&self, raw: &str) -> Result<Value, TransformError> {
        self.transform.deserialize(raw)
    }
}

impl Debug for AttributeDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttributeDef")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("default", &self.default)
            .finish()
    }
}
