//! SQLite resource store implementation.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;

/// Resource name of the claim table.
pub const RIDABLES: &str = "ridables";

/// Raw object id → owner id table as persisted.
pub type ClaimMapping = BTreeMap<u64, u64>;

/// SQLite-backed named-resource store.
pub struct ResourceStore {
    conn: Connection,
}

impl ResourceStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS resources (
                name TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Replace the named resource with `value`.
    pub fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let data = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO resources (name, data, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![name, data, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Read the named resource, if it has ever been written.
    pub fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let data: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM resources WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    /// When the named resource was last written.
    pub fn updated_at(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        let stamp: Option<String> = self
            .conn
            .query_row(
                "SELECT updated_at FROM resources WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;

        stamp
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| Error::Corrupt {
                        name: name.to_string(),
                        reason: e.to_string(),
                    })
            })
            .transpose()
    }

    /// Read a claim mapping; a resource that was never written is empty.
    pub fn read_mapping(&self, name: &str) -> Result<ClaimMapping> {
        Ok(self.read(name)?.unwrap_or_default())
    }

    /// Overwrite a claim mapping as a whole.
    pub fn write_mapping(&self, name: &str, mapping: &ClaimMapping) -> Result<()> {
        self.write(name, mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_mapping_is_empty() {
        let store = ResourceStore::in_memory().unwrap();
        assert!(store.read_mapping(RIDABLES).unwrap().is_empty());
        assert!(store.updated_at(RIDABLES).unwrap().is_none());
    }

    #[test]
    fn test_write_replaces_whole_mapping() {
        let store = ResourceStore::in_memory().unwrap();

        let mut mapping = ClaimMapping::new();
        mapping.insert(1, 10);
        mapping.insert(2, 20);
        store.write_mapping(RIDABLES, &mapping).unwrap();

        mapping.remove(&1);
        store.write_mapping(RIDABLES, &mapping).unwrap();

        let loaded = store.read_mapping(RIDABLES).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(&2), Some(&20));
        assert!(store.updated_at(RIDABLES).unwrap().is_some());
    }

    #[test]
    fn test_mapping_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("claims.db");

        {
            let store = ResourceStore::open(&path).unwrap();
            let mut mapping = ClaimMapping::new();
            mapping.insert(1017, 76561198000000001);
            store.write_mapping(RIDABLES, &mapping).unwrap();
        }

        let store = ResourceStore::open(&path).unwrap();
        let loaded = store.read_mapping(RIDABLES).unwrap();
        assert_eq!(loaded.get(&1017), Some(&76561198000000001));
    }

    #[test]
    fn test_mapping_json_uses_string_keys() {
        let store = ResourceStore::in_memory().unwrap();
        let mut mapping = ClaimMapping::new();
        mapping.insert(7, 9);
        store.write_mapping(RIDABLES, &mapping).unwrap();

        let raw: serde_json::Value = store.read(RIDABLES).unwrap().unwrap();
        assert_eq!(raw, serde_json::json!({ "7": 9 }));
    }

    #[test]
    fn test_resources_are_independent() {
        let store = ResourceStore::in_memory().unwrap();
        store.write("other", &vec!["a", "b"]).unwrap();
        assert!(store.read_mapping(RIDABLES).unwrap().is_empty());

        let other: Vec<String> = store.read("other").unwrap().unwrap();
        assert_eq!(other, vec!["a", "b"]);
    }
}
