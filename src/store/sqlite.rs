//! SQLite-backed response store.
//!
//! The concrete persistence target for [`super::ResponseStore`]: a single
//! table, auto-committing per statement (SQLite's default, matching the
//! single-writer model this cache assumes).

use super::ResponseStore;
use crate::error::CacheResult;
use crate::record::ResponseRecord;
use rusqlite::{params, Connection};

const CREATE_TABLE: &str = "
CREATE TABLE IF NOT EXISTS responses (
    key TEXT PRIMARY KEY,
    request_key TEXT NOT NULL,
    response TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

/// [`ResponseStore`] backed by a SQLite database at a single file path (or
/// `:memory:`, primarily for tests).
pub struct SqliteResponseStore {
    conn: Connection,
}

impl SqliteResponseStore {
    pub fn open(path: &str) -> CacheResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute(CREATE_TABLE, [])?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute(CREATE_TABLE, [])?;
        Ok(Self { conn })
    }
}

impl ResponseStore for SqliteResponseStore {
    fn fetch(&self, key: &str) -> CacheResult<Option<ResponseRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, request_key, response FROM responses WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(ResponseRecord {
                key: row.get(0)?,
                request_key: row.get(1)?,
                response: row.get(2)?,
            })),
            None => Ok(None),
        }
    }

    fn fetch_by_request(&self, request_key: &str) -> CacheResult<Option<ResponseRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, request_key, response FROM responses \
             WHERE request_key = ?1 ORDER BY rowid ASC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![request_key])?;
        match rows.next()? {
            Some(row) => Ok(Some(ResponseRecord {
                key: row.get(0)?,
                request_key: row.get(1)?,
                response: row.get(2)?,
            })),
            None => Ok(None),
        }
    }

    fn save(&mut self, record: ResponseRecord) -> CacheResult<String> {
        self.conn.execute(
            "INSERT INTO responses (key, request_key, response) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                request_key = excluded.request_key,
                response = excluded.response",
            params![record.key, record.request_key, record.response],
        )?;
        Ok(record.key)
    }

    fn remove(&mut self, key: &str) -> CacheResult<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM responses WHERE key = ?1", params![key])?;
        Ok(affected > 0)
    }

    fn remove_by_request(&mut self, request_key: &str) -> CacheResult<bool> {
        let affected = self.conn.execute(
            "DELETE FROM responses WHERE request_key = ?1",
            params![request_key],
        )?;
        Ok(affected > 0)
    }

    fn exists(&self, key: &str) -> CacheResult<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM responses WHERE key = ?1")?;
        Ok(stmt.exists(params![key])?)
    }

    fn size(&self) -> CacheResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM responses", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, request_key: &str, response: &str) -> ResponseRecord {
        ResponseRecord {
            key: key.to_string(),
            request_key: request_key.to_string(),
            response: response.to_string(),
        }
    }

    #[test]
    fn schema_created_on_first_open() {
        let store = SqliteResponseStore::open_in_memory().unwrap();
        assert_eq!(store.size().unwrap(), 0);
    }

    #[test]
    fn save_then_fetch() {
        let mut store = SqliteResponseStore::open_in_memory().unwrap();
        store.save(record("k1", "r1", "hello")).unwrap();
        let fetched = store.fetch("k1").unwrap().unwrap();
        assert_eq!(fetched.response, "hello");
        assert!(store.exists("k1").unwrap());
    }

    #[test]
    fn upsert_replaces_on_conflict() {
        let mut store = SqliteResponseStore::open_in_memory().unwrap();
        store.save(record("k1", "r1", "hello")).unwrap();
        store.save(record("k1", "r1", "goodbye")).unwrap();
        assert_eq!(store.size().unwrap(), 1);
        assert_eq!(store.fetch("k1").unwrap().unwrap().response, "goodbye");
    }

    #[test]
    fn fetch_by_request_returns_first_insertion() {
        let mut store = SqliteResponseStore::open_in_memory().unwrap();
        store.save(record("k1", "r1", "first")).unwrap();
        let fetched = store.fetch_by_request("r1").unwrap().unwrap();
        assert_eq!(fetched.key, "k1");
    }

    #[test]
    fn remove_returns_whether_present() {
        let mut store = SqliteResponseStore::open_in_memory().unwrap();
        store.save(record("k1", "r1", "hello")).unwrap();
        assert!(store.remove("k1").unwrap());
        assert!(!store.remove("k1").unwrap());
    }

    #[test]
    fn persists_across_reopen_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("responses.db");
        let path_str = path.to_str().unwrap();

        {
            let mut store = SqliteResponseStore::open(path_str).unwrap();
            store.save(record("k1", "r1", "hello")).unwrap();
        }

        let reopened = SqliteResponseStore::open(path_str).unwrap();
        assert_eq!(reopened.fetch("k1").unwrap().unwrap().response, "hello");
    }
}
