//! HashMap-backed store for tests and single-process use.

use super::{Fields, HashStore, MemberPage, StoreError, StoreResult};
use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct State {
    hashes: HashMap<String, Fields>,
    sets: HashMap<String, BTreeSet<String>>,
}

/// In-memory hash store. Clones share the same storage.
#[derive(Clone, Default)]
pub struct InMemoryHashStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryHashStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))
    }
}

impl HashStore for InMemoryHashStore {
    fn get_fields(&self, key: &str) -> StoreResult<Option<Fields>> {
        Ok(self.read()?.hashes.get(key).cloned())
    }

    fn set_fields(&self, key: &str, fields: &Fields) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut state = self.write()?;
        let hash = state.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    fn remove_fields(&self, key: &str, fields: &[String]) -> StoreResult<()> {
        let mut state = self.write()?;
        let now_empty = match state.hashes.get_mut(key) {
            Some(hash) => {
                for field in fields {
                    hash.remove(field);
                }
                hash.is_empty()
            }
            None => false,
        };
        if now_empty {
            state.hashes.remove(key);
        }
        Ok(())
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.read()?.hashes.contains_key(key))
    }

    fn add_member(&self, set_key: &str, member: &str) -> StoreResult<bool> {
        Ok(self
            .write()?
            .sets
            .entry(set_key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    fn remove_member(&self, set_key: &str, member: &str) -> StoreResult<bool> {
        let mut state = self.write()?;
        let removed = state
            .sets
            .get_mut(set_key)
            .is_some_and(|set| set.remove(member));
        if state.sets.get(set_key).is_some_and(BTreeSet::is_empty) {
            state.sets.remove(set_key);
        }
        Ok(removed)
    }

    fn scan_members(
        &self,
        set_key: &str,
        after: Option<&str>,
        count: usize,
    ) -> StoreResult<MemberPage> {
        let state = self.read()?;
        let Some(set) = state.sets.get(set_key) else {
            return Ok(MemberPage::default());
        };

        let lower = match after {
            Some(cursor) => Bound::Excluded(cursor.to_string()),
            None => Bound::Unbounded,
        };
        let mut remaining = set.range((lower, Bound::Unbounded));
        let members: Vec<String> = remaining.by_ref().take(count).cloned().collect();
        let cursor = if remaining.next().is_some() {
            members.last().cloned()
        } else {
            None
        };

        Ok(MemberPage { members, cursor })
    }

    fn cardinality(&self, set_key: &str) -> StoreResult<u64> {
        Ok(self
            .read()?
            .sets
            .get(set_key)
            .map_or(0, |set| set.len() as u64))
    }
}
