//! SQLite-backed hash store.
//!
//! # Responsibility
//! - Persist hashes and sets durably in the `hash_fields` / `set_members`
//!   tables created by `db::migrations`.
//!
//! # Invariants
//! - Callers pass a connection returned by `db::open_db*`.
//! - Multi-field writes are applied in a single transaction.

use super::{Fields, HashStore, MemberPage, StoreResult};
use log::error;
use rusqlite::{params, Connection, OptionalExtension};

/// Hash store over a borrowed SQLite connection.
pub struct SqliteHashStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteHashStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl HashStore for SqliteHashStore<'_> {
    fn get_fields(&self, key: &str) -> StoreResult<Option<Fields>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT field, value FROM hash_fields WHERE key = ?1;")?;
        let rows = stmt.query_map([key], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut fields = Fields::new();
        for row in rows {
            let (field, value) = row?;
            fields.insert(field, value);
        }

        Ok(if fields.is_empty() { None } else { Some(fields) })
    }

    fn set_fields(&self, key: &str, fields: &Fields) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO hash_fields (key, field, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key, field) DO UPDATE SET value = excluded.value;",
            )?;
            for (field, value) in fields {
                stmt.execute(params![key, field, value])?;
            }
        }
        tx.commit().map_err(|err| {
            error!("event=store_write module=store status=error backend=sqlite error={err}");
            err.into()
        })
    }

    fn remove_fields(&self, key: &str, fields: &[String]) -> StoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt =
                tx.prepare_cached("DELETE FROM hash_fields WHERE key = ?1 AND field = ?2;")?;
            for field in fields {
                stmt.execute(params![key, field])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn exists(&self, key: &str) -> StoreResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM hash_fields WHERE key = ?1 LIMIT 1;",
                [key],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn add_member(&self, set_key: &str, member: &str) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO set_members (set_key, member) VALUES (?1, ?2);",
            params![set_key, member],
        )?;
        Ok(changed > 0)
    }

    fn remove_member(&self, set_key: &str, member: &str) -> StoreResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM set_members WHERE set_key = ?1 AND member = ?2;",
            params![set_key, member],
        )?;
        Ok(changed > 0)
    }

    fn scan_members(
        &self,
        set_key: &str,
        after: Option<&str>,
        count: usize,
    ) -> StoreResult<MemberPage> {
        // One extra row tells us whether another page follows.
        let limit = i64::try_from(count.saturating_add(1)).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare_cached(
            "SELECT member FROM set_members
             WHERE set_key = ?1 AND (?2 IS NULL OR member > ?2)
             ORDER BY member ASC
             LIMIT ?3;",
        )?;
        let rows = stmt.query_map(params![set_key, after, limit], |row| row.get::<_, String>(0))?;

        let mut members = Vec::with_capacity(count.min(1024));
        let mut has_more = false;
        for row in rows {
            let member = row?;
            if members.len() == count {
                has_more = true;
                break;
            }
            members.push(member);
        }

        let cursor = if has_more { members.last().cloned() } else { None };
        Ok(MemberPage { members, cursor })
    }

    fn cardinality(&self, set_key: &str) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM set_members WHERE set_key = ?1;",
            [set_key],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
