//! Per-model attribute schema.
//!
//! # Responsibility
//! - Declare which attributes a model has, the transform each one uses and
//!   its default.
//! - Carry the model's ordered validation rules.
//!
//! # Invariants
//! - Attribute names are unique and every transform tag resolved at
//!   declaration time.
//! - A built `Schema` is immutable and shared by reference with every
//!   repository call for its model.
//! - Declaring attributes never touches the store.

pub mod attribute;

use crate::model::record::Record;
use crate::transform::{RegistryError, TransformRegistry, STRING_TAG, TIME_TAG};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

pub use attribute::{AttributeDef, AttributeDefault};

/// Stored field holding the soft-delete flag.
pub const DELETED_FIELD: &str = "_deleted";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

const RESERVED_NAMES: &[&str] = &["id", DELETED_FIELD];

static ATTRIBUTE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("valid attribute name regex"));
static NAMESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_\-]*$").expect("valid namespace regex"));

/// Pure check over a record; returns zero or more messages.
pub type ValidationRule = Arc<dyn Fn(&Record) -> Vec<String> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    InvalidNamespace(String),
    InvalidAttributeName(String),
    ReservedAttribute(String),
    DuplicateAttribute(String),
    UnknownTransform { attribute: String, tag: String },
    InvalidDefault { attribute: String, reason: String },
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNamespace(value) => write!(f, "model namespace is invalid: `{value}`"),
            Self::InvalidAttributeName(value) => write!(f, "attribute name is invalid: `{value}`"),
            Self::ReservedAttribute(value) => write!(f, "attribute name is reserved: `{value}`"),
            Self::DuplicateAttribute(value) => write!(f, "attribute already declared: `{value}`"),
            Self::UnknownTransform { attribute, tag } => {
                write!(f, "attribute `{attribute}` uses unknown transform `{tag}`")
            }
            Self::InvalidDefault { attribute, reason } => {
                write!(f, "default for attribute `{attribute}` is invalid: {reason}")
            }
        }
    }
}

impl Error for SchemaError {}

/// Immutable attribute schema of one model.
pub struct Schema {
    namespace: String,
    attributes: BTreeMap<String, AttributeDef>,
    rules: Vec<ValidationRule>,
    timestamps: bool,
}

impl Schema {
    /// Starts a schema for the model stored under `namespace`.
    pub fn builder<'r>(
        namespace: &str,
        registry: &'r TransformRegistry,
    ) -> Result<SchemaBuilder<'r>, SchemaError> {
        let namespace = namespace.trim();
        if !NAMESPACE_RE.is_match(namespace) {
            return Err(SchemaError::InvalidNamespace(namespace.to_string()));
        }
        Ok(SchemaBuilder {
            namespace: namespace.to_string(),
            registry,
            attributes: BTreeMap::new(),
            rules: Vec::new(),
            timestamps: false,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.get(name)
    }

    /// Declared attributes, sorted by name.
    pub fn attributes(&self) -> impl Iterator<Item = &AttributeDef> {
        self.attributes.values()
    }

    pub fn has_timestamps(&self) -> bool {
        self.timestamps
    }

    /// Runs every rule in declaration order and collects the messages.
    pub fn validate(&self, record: &Record) -> Vec<String> {
        self.rules.iter().flat_map(|rule| rule(record)).collect()
    }
}

impl Debug for Schema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schema")
            .field("namespace", &self.namespace)
            .field("attributes", &self.attributes)
            .field("rules", &self.rules.len())
            .field("timestamps", &self.timestamps)
            .finish()
    }
}

/// Collects declarations for one model.
pub struct SchemaBuilder<'r> {
    namespace: String,
    registry: &'r TransformRegistry,
    attributes: BTreeMap<String, AttributeDef>,
    rules: Vec<ValidationRule>,
    timestamps: bool,
}

impl SchemaBuilder<'_> {
    /// Declares one attribute.
    ///
    /// # Errors
    /// - `DuplicateAttribute` when `name` was already declared.
    /// - `UnknownTransform` when `tag` is not registered.
    /// - `InvalidDefault` when the default does not fit the transform.
    pub fn declare_attribute(
        &mut self,
        name: &str,
        tag: &str,
        default: Option<AttributeDefault>,
    ) -> Result<&mut Self, SchemaError> {
        let name = name.trim();
        if RESERVED_NAMES.contains(&name) {
            return Err(SchemaError::ReservedAttribute(name.to_string()));
        }
        if !ATTRIBUTE_NAME_RE.is_match(name) {
            return Err(SchemaError::InvalidAttributeName(name.to_string()));
        }
        if self.attributes.contains_key(name) {
            return Err(SchemaError::DuplicateAttribute(name.to_string()));
        }

        let transform = self.registry.lookup(tag).map_err(|err| match err {
            RegistryError::UnknownTransform(tag) | RegistryError::InvalidTag(tag) => {
                SchemaError::UnknownTransform {
                    attribute: name.to_string(),
                    tag,
                }
            }
        })?;

        if let Some(default) = &default {
            check_default(name, default, transform.as_ref())?;
        }

        self.attributes.insert(
            name.to_string(),
            AttributeDef::new(name.to_string(), transform, default),
        );
        Ok(self)
    }

    /// Declares an attribute without a default.
    pub fn attribute(&mut self, name: &str, tag: &str) -> Result<&mut Self, SchemaError> {
        self.declare_attribute(name, tag, None)
    }

    /// Declares an attribute with no tag; it is stored by the string
    /// transform.
    pub fn string_attribute(&mut self, name: &str) -> Result<&mut Self, SchemaError> {
        self.declare_attribute(name, STRING_TAG, None)
    }

    /// Declares `created_at` and `updated_at`, maintained by `save`/`update`.
    pub fn timestamps(&mut self) -> Result<&mut Self, SchemaError> {
        self.declare_attribute(CREATED_AT, TIME_TAG, None)?;
        self.declare_attribute(UPDATED_AT, TIME_TAG, None)?;
        self.timestamps = true;
        Ok(self)
    }

    /// Appends a validation rule; rules run in the order added.
    pub fn validate_with(
        &mut self,
        rule: impl Fn(&Record) -> Vec<String> + Send + Sync + 'static,
    ) -> &mut Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn build(self) -> Schema {
        info!(
            "event=schema_build module=schema status=ok namespace={} attributes={} rules={}",
            self.namespace,
            self.attributes.len(),
            self.rules.len()
        );
        Schema {
            namespace: self.namespace,
            attributes: self.attributes,
            rules: self.rules,
            timestamps: self.timestamps,
        }
    }
}

fn check_default(
    name: &str,
    default: &AttributeDefault,
    transform: &dyn crate::transform::Transform,
) -> Result<(), SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidDefault {
        attribute: name.to_string(),
        reason,
    };
    match default {
        // Producers run per record, not at declaration.
        AttributeDefault::Producer(_) => Ok(()),
        AttributeDefault::Stored(_) | AttributeDefault::Value(_) => default
            .resolve(transform)
            .map(|_| ())
            .map_err(|err| invalid(err.to_string())),
    }
}
