//! Record persistence over a hash store.
//!
//! # Responsibility
//! - Move records between memory and the store using the model schema.
//! - Own id assignment, soft-delete visibility and the per-model id index.
//!
//! # Invariants
//! - `save` runs validation first and writes nothing for an invalid record.
//! - The record hash is written before its id joins the id index.
//! - Soft-deleted records stay in the id index and keep their data.
//! - Read paths reject stored values a transform cannot parse.
//!
//! # Store layout
//! - `<ns>:record:<id>` hash: one field per non-nil attribute plus `_deleted`.
//! - `<ns>:ids` set: every id ever saved.
//! - `<ns>:deleted_ids` set: ids currently soft-deleted.

use super::batches::{BatchQuery, Batches};
use crate::config::RepositoryConfig;
use crate::model::record::{Record, RecordId};
use crate::model::value::Value;
use crate::schema::{AttributeDef, Schema, CREATED_AT, DELETED_FIELD, UPDATED_AT};
use crate::store::{Fields, HashStore, StoreError};
use crate::transform::{BooleanTransform, Transform, TransformError};
use chrono::Utc;
use log::{debug, error, info};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    Store(StoreError),
    /// An in-memory value could not be serialized for `attribute`.
    Transform {
        attribute: String,
        source: TransformError,
    },
    /// Stored state cannot be materialized into a record.
    InvalidData(String),
    UnknownAttribute(String),
    /// The operation needs a saved record.
    NotPersisted,
    NotFound(RecordId),
    InvalidBatchSize(usize),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Transform { attribute, source } => {
                write!(f, "cannot store attribute `{attribute}`: {source}")
            }
            Self::InvalidData(message) => write!(f, "invalid stored record data: {message}"),
            Self::UnknownAttribute(name) => write!(f, "attribute is not declared: `{name}`"),
            Self::NotPersisted => write!(f, "record has not been saved"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::InvalidBatchSize(size) => {
                write!(f, "batch size must be greater than zero, got {size}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Transform { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Field writes and removals for one hash.
#[derive(Default)]
struct FieldChanges {
    set: Fields,
    clear: Vec<String>,
}

impl FieldChanges {
    fn push(&mut self, def: &AttributeDef, value: &Value) -> RepoResult<()> {
        let encoded = def.serialize(value).map_err(|source| RepoError::Transform {
            attribute: def.name().to_string(),
            source,
        })?;
        match encoded {
            Some(raw) => {
                self.set.insert(def.name().to_string(), raw);
            }
            None => self.clear.push(def.name().to_string()),
        }
        Ok(())
    }
}

/// Persistence engine for one model.
///
/// Borrows the store and the model's schema; cheap to construct per call
/// site.
pub struct ModelRepository<'a, S: HashStore + ?Sized> {
    pub(super) store: &'a S,
    schema: &'a Schema,
    config: RepositoryConfig,
    key_base: String,
}

impl<'a, S: HashStore + ?Sized> ModelRepository<'a, S> {
    pub fn new(store: &'a S, schema: &'a Schema) -> Self {
        Self::with_config(store, schema, RepositoryConfig::default())
    }

    pub fn with_config(store: &'a S, schema: &'a Schema, config: RepositoryConfig) -> Self {
        let key_base = match config.key_prefix.as_deref() {
            Some(prefix) => format!("{}:{}", prefix.trim(), schema.namespace()),
            None => schema.namespace().to_string(),
        };
        Self {
            store,
            schema,
            config,
            key_base,
        }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// Builds an unsaved record.
    ///
    /// Declared attributes not named in `attrs` start at their default;
    /// producers run only for those.
    /// Values keep their given type; coercion happens at save time.
    pub fn new_record<I, K, V>(&self, attrs: I) -> RepoResult<Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut attributes = BTreeMap::new();
        for (name, value) in attrs {
            let name = name.into();
            if self.schema.attribute(&name).is_none() {
                return Err(RepoError::UnknownAttribute(name));
            }
            attributes.insert(name, value.into());
        }

        for def in self.schema.attributes() {
            if attributes.contains_key(def.name()) {
                continue;
            }
            let value = def
                .default_value()
                .map_err(|source| RepoError::Transform {
                    attribute: def.name().to_string(),
                    source,
                })?;
            attributes.insert(def.name().to_string(), value);
        }

        Ok(Record::from_parts(None, attributes, false, false))
    }

    /// Runs the model's validation rules and stores the messages on the record.
    pub fn valid(&self, record: &mut Record) -> bool {
        record.errors = self.schema.validate(record);
        record.errors.is_empty()
    }

    /// Validates and writes the record.
    ///
    /// Returns `Ok(false)` when validation fails; nothing is written and the
    /// id stays unassigned. A new record gets its id here.
    pub fn save(&self, record: &mut Record) -> RepoResult<bool> {
        let started_at = Instant::now();
        if !self.valid(record) {
            debug!(
                "event=record_save module=repo status=invalid namespace={} errors={}",
                self.schema.namespace(),
                record.errors.len()
            );
            return Ok(false);
        }

        let result = self.persist(record);
        match &result {
            Ok(()) => debug!(
                "event=record_save module=repo status=ok namespace={} id={} duration_ms={}",
                self.schema.namespace(),
                record.id().unwrap_or_default(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=record_save module=repo status=error namespace={} duration_ms={} error={err}",
                self.schema.namespace(),
                started_at.elapsed().as_millis()
            ),
        }
        result.map(|()| true)
    }

    fn persist(&self, record: &mut Record) -> RepoResult<()> {
        let is_new = record.id.is_none();
        let id = record.id.clone().unwrap_or_else(generate_id);

        let mut stamped: Vec<(&str, Value)> = Vec::new();
        if self.schema.has_timestamps() {
            let now = Value::Time(Utc::now());
            if record.get(CREATED_AT).map_or(true, Value::is_null) {
                stamped.push((CREATED_AT, now.clone()));
            }
            stamped.push((UPDATED_AT, now));
        }

        let null = Value::Null;
        let mut changes = FieldChanges::default();
        for def in self.schema.attributes() {
            let value = stamped
                .iter()
                .find(|(name, _)| *name == def.name())
                .map(|(_, value)| value)
                .or_else(|| record.attributes.get(def.name()))
                .unwrap_or(&null);
            changes.push(def, value)?;
        }
        if is_new {
            changes.clear.clear();
            changes
                .set
                .insert(DELETED_FIELD.to_string(), flag_text(false).to_string());
        }

        self.write_changes(&self.record_key(&id), &changes)?;
        self.store.add_member(&self.index_key(), &id)?;

        for (name, value) in stamped {
            record.attributes.insert(name.to_string(), value);
        }
        record.id = Some(id);
        record.persisted = true;
        Ok(())
    }

    /// `new_record` followed by `save`; the record is returned either way so
    /// callers can inspect `errors`.
    pub fn create<I, K, V>(&self, attrs: I) -> RepoResult<Record>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut record = self.new_record(attrs)?;
        self.save(&mut record)?;
        Ok(record)
    }

    /// Loads one record. Soft-deleted records are hidden unless
    /// `include_deleted` is set.
    pub fn find(&self, id: &str, include_deleted: bool) -> RepoResult<Option<Record>> {
        let Some(fields) = self.store.get_fields(&self.record_key(id))? else {
            debug!(
                "event=record_find module=repo status=not_found namespace={} id={id}",
                self.schema.namespace()
            );
            return Ok(None);
        };

        let deleted = self.deleted_flag(id, &fields)?;
        if deleted && !include_deleted {
            debug!(
                "event=record_find module=repo status=hidden namespace={} id={id}",
                self.schema.namespace()
            );
            return Ok(None);
        }

        self.materialize(id, &fields, deleted).map(Some)
    }

    /// Default-visibility lookup.
    pub fn find_by_id(&self, id: &str) -> RepoResult<Option<Record>> {
        self.find(id, false)
    }

    /// Loads each id independently, omitting ids that resolve to nothing.
    pub fn find_by_ids<I>(&self, ids: I) -> RepoResult<Vec<Record>>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.load_many(ids, false)
    }

    pub(super) fn load_many<I>(&self, ids: I, include_deleted: bool) -> RepoResult<Vec<Record>>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut records = Vec::new();
        for id in ids {
            if let Some(record) = self.find(id.as_ref(), include_deleted)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Streams visible records in chunks of at most `batch_size`.
    pub fn find_in_batches(&self, batch_size: usize) -> RepoResult<Batches<'_, 'a, S>> {
        self.batches(&BatchQuery {
            batch_size,
            include_deleted: false,
        })
    }

    pub fn batches(&self, query: &BatchQuery) -> RepoResult<Batches<'_, 'a, S>> {
        if query.batch_size == 0 {
            return Err(RepoError::InvalidBatchSize(query.batch_size));
        }
        Ok(Batches::new(self, self.index_key(), query))
    }

    /// Every visible record, gathered batch by batch.
    pub fn all(&self) -> RepoResult<Vec<Record>> {
        let mut records = Vec::new();
        for batch in self.find_in_batches(self.config.default_batch_size)? {
            records.extend(batch?);
        }
        Ok(records)
    }

    /// Number of saved records that are not soft-deleted.
    pub fn count(&self) -> RepoResult<u64> {
        let total = self.store.cardinality(&self.index_key())?;
        let deleted = self.store.cardinality(&self.deleted_index_key())?;
        Ok(total.saturating_sub(deleted))
    }

    /// Size of the id index, soft-deleted records included.
    pub fn count_with_deleted(&self) -> RepoResult<u64> {
        Ok(self.store.cardinality(&self.index_key())?)
    }

    /// Storage presence check; ignores the soft-delete flag.
    pub fn exists(&self, id: &str) -> RepoResult<bool> {
        Ok(self.store.exists(&self.record_key(id))?)
    }

    /// Merges the given attributes into the stored record without running
    /// validations. Refreshes `updated_at` on timestamped models.
    ///
    /// Returns `false` when no record is stored under `id`.
    pub fn update<I, K, V>(&self, id: &str, attrs: I) -> RepoResult<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut values = self.declared_values(attrs)?;
        if self.schema.has_timestamps() && !values.iter().any(|(def, _)| def.name() == UPDATED_AT)
        {
            if let Some(def) = self.schema.attribute(UPDATED_AT) {
                values.push((def, Value::Time(Utc::now())));
            }
        }
        self.write_columns("record_update", id, &values)
    }

    /// Writes the given attributes straight to the stored hash: no
    /// validation, no timestamps, no record load.
    ///
    /// Returns `false` when no record is stored under `id`.
    pub fn update_columns<I, K, V>(&self, id: &str, attrs: I) -> RepoResult<bool>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let values = self.declared_values(attrs)?;
        self.write_columns("record_update_columns", id, &values)
    }

    fn write_columns(
        &self,
        event: &str,
        id: &str,
        values: &[(&AttributeDef, Value)],
    ) -> RepoResult<bool> {
        let key = self.record_key(id);
        if !self.store.exists(&key)? {
            debug!(
                "event={event} module=repo status=not_found namespace={} id={id}",
                self.schema.namespace()
            );
            return Ok(false);
        }

        let mut changes = FieldChanges::default();
        for (def, value) in values {
            changes.push(def, value)?;
        }
        self.write_changes(&key, &changes)?;
        debug!(
            "event={event} module=repo status=ok namespace={} id={id} fields={}",
            self.schema.namespace(),
            values.len()
        );
        Ok(true)
    }

    /// Soft-deletes a saved record; its data and index entry are kept.
    pub fn delete(&self, record: &mut Record) -> RepoResult<()> {
        let id = record.id.clone().ok_or(RepoError::NotPersisted)?;
        self.set_deleted(&id, true)?;
        record.deleted = true;
        Ok(())
    }

    /// Clears the soft-delete flag.
    pub fn undelete(&self, record: &mut Record) -> RepoResult<()> {
        let id = record.id.clone().ok_or(RepoError::NotPersisted)?;
        self.set_deleted(&id, false)?;
        record.deleted = false;
        Ok(())
    }

    fn set_deleted(&self, id: &str, deleted: bool) -> RepoResult<()> {
        let key = self.record_key(id);
        if !self.store.exists(&key)? {
            return Err(RepoError::NotFound(id.to_string()));
        }

        let mut fields = Fields::new();
        fields.insert(DELETED_FIELD.to_string(), flag_text(deleted).to_string());
        self.store.set_fields(&key, &fields)?;
        // A hash whose indexing failed on save is re-indexed here, so the
        // deleted set stays a subset of the id index.
        if self.store.add_member(&self.index_key(), id)? {
            debug!(
                "event=record_reindex module=repo status=ok namespace={} id={id}",
                self.schema.namespace()
            );
        }
        if deleted {
            self.store.add_member(&self.deleted_index_key(), id)?;
        } else {
            self.store.remove_member(&self.deleted_index_key(), id)?;
        }

        info!(
            "event={} module=repo status=ok namespace={} id={id}",
            if deleted { "record_delete" } else { "record_undelete" },
            self.schema.namespace()
        );
        Ok(())
    }

    fn declared_values<I, K, V>(&self, attrs: I) -> RepoResult<Vec<(&'a AttributeDef, Value)>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        attrs
            .into_iter()
            .map(|(name, value)| {
                let name = name.into();
                match self.schema.attribute(&name) {
                    Some(def) => Ok((def, value.into())),
                    None => Err(RepoError::UnknownAttribute(name)),
                }
            })
            .collect()
    }

    fn write_changes(&self, key: &str, changes: &FieldChanges) -> RepoResult<()> {
        if !changes.set.is_empty() {
            self.store.set_fields(key, &changes.set)?;
        }
        if !changes.clear.is_empty() {
            self.store.remove_fields(key, &changes.clear)?;
        }
        Ok(())
    }

    fn deleted_flag(&self, id: &str, fields: &Fields) -> RepoResult<bool> {
        match fields.get(DELETED_FIELD) {
            None => Ok(false),
            Some(raw) => match BooleanTransform.deserialize(raw) {
                Ok(Value::Bool(flag)) => Ok(flag),
                _ => Err(RepoError::InvalidData(format!(
                    "invalid {DELETED_FIELD} value `{raw}` for {}",
                    self.record_key(id)
                ))),
            },
        }
    }

    fn materialize(&self, id: &str, fields: &Fields, deleted: bool) -> RepoResult<Record> {
        let mut attributes = BTreeMap::new();
        for def in self.schema.attributes() {
            let value = match fields.get(def.name()) {
                Some(raw) => def.deserialize(raw).map_err(|err| {
                    RepoError::InvalidData(format!(
                        "attribute `{}` of {}: {err}",
                        def.name(),
                        self.record_key(id)
                    ))
                })?,
                None => def.default_value().map_err(|source| RepoError::Transform {
                    attribute: def.name().to_string(),
                    source,
                })?,
            };
            attributes.insert(def.name().to_string(), value);
        }

        Ok(Record::from_parts(
            Some(id.to_string()),
            attributes,
            true,
            deleted,
        ))
    }

    fn record_key(&self, id: &str) -> String {
        format!("{}:record:{id}", self.key_base)
    }

    fn index_key(&self) -> String {
        format!("{}:ids", self.key_base)
    }

    fn deleted_index_key(&self) -> String {
        format!("{}:deleted_ids", self.key_base)
    }
}

/// Client-side id; no store round-trip or shared counter involved.
fn generate_id() -> RecordId {
    Uuid::new_v4().to_string()
}

fn flag_text(flag: bool) -> &'static str {
    if flag {
        "true"
    } else {
        "false"
    }
}
