//! Attribute value transforms.
//!
//! # Responsibility
//! - Convert typed attribute values to their stored string form and back.
//! - Provide the registry that resolves a symbolic tag to a transform.
//!
//! # Invariants
//! - `serialize(Null)` is always `Ok(None)`: nil never becomes a sentinel string.
//! - `deserialize(serialize(v)) == v` for every value a transform accepts.

use crate::model::value::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod builtin;
pub mod registry;

pub use builtin::{
    BooleanTransform, FloatTransform, IntegerTransform, JsonTransform, StringTransform,
    TimeTransform, BOOLEAN_TAG, FLOAT_TAG, INTEGER_TAG, JSON_TAG, STRING_TAG, TIME_TAG,
};
pub use registry::{default_registry, RegistryError, TransformRegistry};

/// Bidirectional converter between a typed value and its stored string.
///
/// Implementations are stateless and shared across threads; the registry
/// hands out `Arc<dyn Transform>` handles.
pub trait Transform: Send + Sync {
    /// Symbolic key this transform is registered under.
    fn tag(&self) -> &str;

    /// Returns the stored form, or `None` when no field should be written.
    fn serialize(&self, value: &Value) -> Result<Option<String>, TransformError>;

    /// Rebuilds the typed value from a stored field.
    fn deserialize(&self, raw: &str) -> Result<Value, TransformError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// The in-memory value cannot be coerced by this transform.
    Incompatible { tag: String, found: &'static str },
    /// The stored string is not a valid encoding for this transform.
    Malformed { tag: String, raw: String },
}

impl TransformError {
    pub(crate) fn incompatible(tag: &str, value: &Value) -> Self {
        Self::Incompatible {
            tag: tag.to_string(),
            found: value.kind(),
        }
    }

    pub(crate) fn malformed(tag: &str, raw: &str) -> Self {
        Self::Malformed {
            tag: tag.to_string(),
            raw: raw.to_string(),
        }
    }
}

impl Display for TransformError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incompatible { tag, found } => {
                write!(f, "`{tag}` transform cannot convert a {found} value")
            }
            Self::Malformed { tag, raw } => {
                write!(f, "`{tag}` transform cannot parse stored value `{raw}`")
            }
        }
    }
}

impl Error for TransformError {}
