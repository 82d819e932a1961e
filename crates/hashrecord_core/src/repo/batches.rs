//! Batched enumeration of a model's id index.

use super::model_repo::{ModelRepository, RepoResult};
use crate::config::DEFAULT_BATCH_SIZE;
use crate::model::record::Record;
use crate::store::{HashStore, MemberPages};
use std::collections::VecDeque;

/// Options for batched enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchQuery {
    pub batch_size: usize,
    pub include_deleted: bool,
}

impl Default for BatchQuery {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            include_deleted: false,
        }
    }
}

/// Iterator of record batches.
///
/// Every batch holds at most `batch_size` records, and at most two pages of
/// ids are buffered at any time. Ids whose record is hidden or gone are
/// skipped, so a batch may be shorter than `batch_size`; empty batches are
/// never yielded. The first error ends the iteration.
pub struct Batches<'r, 'a, S: HashStore + ?Sized> {
    repo: &'r ModelRepository<'a, S>,
    pages: MemberPages<'a, S>,
    pending: VecDeque<String>,
    batch_size: usize,
    include_deleted: bool,
    pages_done: bool,
    failed: bool,
}

impl<'r, 'a, S: HashStore + ?Sized> Batches<'r, 'a, S> {
    pub(super) fn new(
        repo: &'r ModelRepository<'a, S>,
        index_key: String,
        query: &BatchQuery,
    ) -> Self {
        Self {
            repo,
            pages: MemberPages::new(repo.store, index_key, query.batch_size),
            pending: VecDeque::with_capacity(query.batch_size.min(1024)),
            batch_size: query.batch_size,
            include_deleted: query.include_deleted,
            pages_done: false,
            failed: false,
        }
    }
}

impl<S: HashStore + ?Sized> Iterator for Batches<'_, '_, S> {
    type Item = RepoResult<Vec<Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            while self.pending.len() < self.batch_size && !self.pages_done {
                match self.pages.next() {
                    Some(Ok(members)) => self.pending.extend(members),
                    Some(Err(err)) => {
                        self.failed = true;
                        return Some(Err(err.into()));
                    }
                    None => self.pages_done = true,
                }
            }

            if self.pending.is_empty() {
                return None;
            }

            let take = self.batch_size.min(self.pending.len());
            let ids: Vec<String> = self.pending.drain(..take).collect();
            match self.repo.load_many(&ids, self.include_deleted) {
                Ok(records) if records.is_empty() => continue,
                Ok(records) => return Some(Ok(records)),
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
