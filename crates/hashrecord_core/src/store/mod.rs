//! Key-value store adapter contract.
//!
//! # Responsibility
//! - Describe the flat string-keyed store the repository runs on: string
//!   field hashes plus string sets.
//! - Provide in-memory and SQLite adapters.
//!
//! # Invariants
//! - A hash exists iff it holds at least one field.
//! - Set enumeration is cursor based and yields members in ascending order,
//!   so a scan can always restart from the beginning.
//! - Adapter failures are returned as-is; this layer never retries.

use crate::db::DbError;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryHashStore;
pub use sqlite::SqliteHashStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Field map of one stored hash.
pub type Fields = BTreeMap<String, String>;

#[derive(Debug)]
pub enum StoreError {
    /// The store cannot serve the request right now.
    Unavailable(String),
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unavailable(_) => None,
            Self::Db(err) => Some(err),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One page of set members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberPage {
    pub members: Vec<String>,
    /// Resume point for the next page; `None` once the set is exhausted.
    pub cursor: Option<String>,
}

/// Store adapter consumed by the repository.
pub trait HashStore {
    /// Returns every field of `key`, or `None` when the hash does not exist.
    fn get_fields(&self, key: &str) -> StoreResult<Option<Fields>>;

    /// Upserts the given fields; fields not named are left untouched.
    fn set_fields(&self, key: &str, fields: &Fields) -> StoreResult<()>;

    /// Removes the named fields. Removing the last field removes the hash.
    fn remove_fields(&self, key: &str, fields: &[String]) -> StoreResult<()>;

    fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Returns `true` when `member` was not already present.
    fn add_member(&self, set_key: &str, member: &str) -> StoreResult<bool>;

    /// Returns `true` when `member` was present.
    fn remove_member(&self, set_key: &str, member: &str) -> StoreResult<bool>;

    /// Up to `count` members strictly after `after`, in ascending order.
    fn scan_members(&self, set_key: &str, after: Option<&str>, count: usize)
        -> StoreResult<MemberPage>;

    fn cardinality(&self, set_key: &str) -> StoreResult<u64>;
}

/// Lazy page sequence over one set.
///
/// Each `next` performs one `scan_members` round-trip. The sequence is
/// finite and can only be restarted by creating a new one.
pub struct MemberPages<'s, S: HashStore + ?Sized> {
    store: &'s S,
    set_key: String,
    page_size: usize,
    cursor: Option<String>,
    done: bool,
}

impl<'s, S: HashStore + ?Sized> MemberPages<'s, S> {
    pub fn new(store: &'s S, set_key: impl Into<String>, page_size: usize) -> Self {
        Self {
            store,
            set_key: set_key.into(),
            page_size: page_size.max(1),
            cursor: None,
            done: false,
        }
    }
}

impl<S: HashStore + ?Sized> Iterator for MemberPages<'_, S> {
    type Item = StoreResult<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let page = match self.store.scan_members(
                &self.set_key,
                self.cursor.as_deref(),
                self.page_size,
            ) {
                Ok(page) => page,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };
            self.done = page.cursor.is_none();
            self.cursor = page.cursor;
            if !page.members.is_empty() {
                return Some(Ok(page.members));
            }
        }
        None
    }
}
