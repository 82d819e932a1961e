//! In-memory record model.
//!
//! # Responsibility
//! - Define the record shape every model shares: identity, typed
//!   attributes, persisted/deleted flags and validation errors.
//!
//! # Invariants
//! - Deletion is a soft-delete flag; data is never dropped by this layer.

pub mod record;
pub mod value;
