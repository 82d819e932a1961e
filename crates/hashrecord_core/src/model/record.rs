//! Record: one instance of a model.
//!
//! # Responsibility
//! - Hold identity, typed attribute values and lifecycle flags.
//!
//! # Invariants
//! - `id` is `None` until the first successful save and never changes after.
//! - Only declared attributes are tracked; the key set is fixed when the
//!   record is constructed by the repository.
//! - `id` and `persisted` are written by the repository only.

use super::value::Value;
use std::collections::BTreeMap;

/// Stable identifier of a stored record.
pub type RecordId = String;

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub(crate) id: Option<RecordId>,
    pub(crate) attributes: BTreeMap<String, Value>,
    pub(crate) persisted: bool,
    pub(crate) deleted: bool,
    pub(crate) errors: Vec<String>,
}

impl Record {
    pub(crate) fn from_parts(
        id: Option<RecordId>,
        attributes: BTreeMap<String, Value>,
        persisted: bool,
        deleted: bool,
    ) -> Self {
        Self {
            id,
            attributes,
            persisted,
            deleted,
            errors: Vec::new(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Current value of `name`; `None` when the attribute is not declared.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Assigns a declared attribute.
    ///
    /// Returns `false` and leaves the record unchanged when `name` is not
    /// declared on the model.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> bool {
        match self.attributes.get_mut(name) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    /// All tracked attributes, sorted by name.
    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn is_new_record(&self) -> bool {
        !self.persisted
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Messages from the last validation run; empty means no known violations.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}
