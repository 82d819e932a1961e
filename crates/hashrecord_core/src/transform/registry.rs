//! Tag-keyed transform registry.

use super::builtin::{
    BooleanTransform, FloatTransform, IntegerTransform, JsonTransform, StringTransform,
    TimeTransform,
};
use super::Transform;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

static DEFAULT_REGISTRY: Lazy<TransformRegistry> = Lazy::new(TransformRegistry::with_builtins);

/// Registration/lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidTag(String),
    UnknownTransform(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTag(value) => write!(f, "transform tag is invalid: `{value}`"),
            Self::UnknownTransform(value) => write!(f, "unknown transform: `{value}`"),
        }
    }
}

impl Error for RegistryError {}

/// Mapping from tag to transform.
///
/// Built-in and custom transforms are stored the same way; registering a
/// tag that already exists replaces the previous transform.
#[derive(Default, Clone)]
pub struct TransformRegistry {
    transforms: BTreeMap<String, Arc<dyn Transform>>,
}

impl TransformRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in transform.
    pub fn with_builtins() -> Self {
        let builtins: [Arc<dyn Transform>; 6] = [
            Arc::new(BooleanTransform),
            Arc::new(IntegerTransform),
            Arc::new(FloatTransform),
            Arc::new(JsonTransform),
            Arc::new(TimeTransform),
            Arc::new(StringTransform),
        ];
        let transforms = builtins
            .into_iter()
            .map(|transform| (transform.tag().to_string(), transform))
            .collect();
        Self { transforms }
    }

    /// Registers a transform under its own tag.
    pub fn register(&mut self, transform: Arc<dyn Transform>) -> Result<(), RegistryError> {
        let tag = transform.tag().trim().to_string();
        if !is_valid_tag(&tag) {
            return Err(RegistryError::InvalidTag(tag));
        }
        if self.transforms.insert(tag.clone(), transform).is_some() {
            log::info!("event=transform_register module=transform status=replaced tag={tag}");
        }
        Ok(())
    }

    /// Resolves a tag.
    pub fn lookup(&self, tag: &str) -> Result<Arc<dyn Transform>, RegistryError> {
        self.transforms
            .get(tag.trim())
            .cloned()
            .ok_or_else(|| RegistryError::UnknownTransform(tag.trim().to_string()))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.transforms.contains_key(tag.trim())
    }

    /// Returns sorted tags.
    pub fn tags(&self) -> Vec<String> {
        self.transforms.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

/// Process-wide registry of the built-in transforms.
///
/// Read-only; callers with custom transforms build their own registry with
/// [`TransformRegistry::with_builtins`] and register into it.
pub fn default_registry() -> &'static TransformRegistry {
    &DEFAULT_REGISTRY
}

fn is_valid_tag(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}
