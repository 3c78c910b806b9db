//! Keyed blob persistence for player records.
//!
//! The store is a single append-only table: each insert adds a row, `get`
//! returns the newest row for a key and `get_all` every row in insertion
//! order. Opening creates the database and table when missing, and is safe
//! to repeat.

use crate::error::StoreError;
use bincode::{deserialize, serialize};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS gamestates (
  id INTEGER NOT NULL,
  state BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS gamestates_id ON gamestates (id);
";

pub trait BlobStore: Send + Sync {
    fn get(&self, key: u64) -> Result<Option<Vec<u8>>, StoreError>;
    fn get_all(&self, key: u64) -> Result<Vec<Vec<u8>>, StoreError>;
    fn insert(&self, key: u64, value: &[u8]) -> Result<(), StoreError>;
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let existed = path.exists();
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;

        if existed {
            debug!("Opened player store at {}", path.display());
        } else {
            info!("Created player store at {}", path.display());
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl BlobStore for SqliteStore {
    fn get(&self, key: u64) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = self.conn();
        let blob = conn
            .query_row(
                "SELECT state FROM gamestates WHERE id = ?1 ORDER BY rowid DESC LIMIT 1",
                params![key as i64],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(blob)
    }

    fn get_all(&self, key: u64) -> Result<Vec<Vec<u8>>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT state FROM gamestates WHERE id = ?1 ORDER BY rowid")?;
        let rows = stmt
            .query_map(params![key as i64], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn insert(&self, key: u64, value: &[u8]) -> Result<(), StoreError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO gamestates (id, state) VALUES (?1, ?2)",
            params![key as i64, value],
        )?;
        Ok(())
    }
}

/// Loads and decodes the newest record stored under `key`.
pub fn load<T: DeserializeOwned>(store: &dyn BlobStore, key: u64) -> Result<Option<T>, StoreError> {
    match store.get(key)? {
        Some(blob) => Ok(Some(deserialize(&blob)?)),
        None => Ok(None),
    }
}

pub fn save<T: Serialize>(store: &dyn BlobStore, key: u64, value: &T) -> Result<(), StoreError> {
    let blob = serialize(value)?;
    store.insert(key, &blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio_test::assert_ok;

    #[test]
    fn test_missing_key_is_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.get(1).unwrap(), None);
        assert!(store.get_all(1).unwrap().is_empty());
    }

    #[test]
    fn test_get_returns_newest_and_get_all_keeps_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(7, b"first").unwrap();
        store.insert(8, b"other").unwrap();
        store.insert(7, b"second").unwrap();

        assert_eq!(store.get(7).unwrap(), Some(b"second".to_vec()));
        assert_eq!(
            store.get_all(7).unwrap(),
            vec![b"first".to_vec(), b"second".to_vec()]
        );
        assert_eq!(store.get_all(8).unwrap().len(), 1);
    }

    #[test]
    fn test_open_creates_missing_database_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("GameStates.db3");

        {
            let store = SqliteStore::open(&path).unwrap();
            assert_eq!(store.get(1).unwrap(), None);
            assert_ok!(store.insert(1, b"kept"));
        }
        assert!(path.exists());

        let first = SqliteStore::open(&path).unwrap();
        let second = SqliteStore::open(&path).unwrap();
        assert_eq!(first.get(1).unwrap(), Some(b"kept".to_vec()));
        assert_eq!(second.get(1).unwrap(), Some(b"kept".to_vec()));
    }

    #[test]
    fn test_typed_round_trip_through_store() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert_ok!(save(&store, 3, &("Iolo".to_string(), 42u32)));

        let loaded: Option<(String, u32)> = load(&store, 3).unwrap();
        assert_eq!(loaded, Some(("Iolo".to_string(), 42)));

        let missing: Option<(String, u32)> = load(&store, 4).unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_corrupt_blob_is_an_error() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert(5, &[1]).unwrap();
        let loaded: Result<Option<(String, u64)>, _> = load(&store, 5);
        assert!(loaded.is_err());
    }
}
