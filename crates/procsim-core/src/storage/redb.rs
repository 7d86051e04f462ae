//! Redb store backend.
//!
//! Provides persistent parameter storage using the redb embedded database.

use std::path::{Path, PathBuf};

use redb::{Database, ReadableTable, TableDefinition};

use super::{KeyedStore, Result, StoreError, StoreValue};

// Single table keyed by the full store path; values are JSON-encoded `StoreValue`s.
const VALUES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("procsim_values");

fn backend_err(e: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// redb-based persistent keyed store.
///
/// Every write is committed in its own transaction.
pub struct RedbStore {
    db: Database,
    path: PathBuf,
}

impl RedbStore {
    /// Open or create a store at the given path, creating parent directories.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let db = if path.exists() {
            Database::open(path).map_err(backend_err)?
        } else {
            Database::create(path).map_err(backend_err)?
        };

        // Make sure the table exists so read transactions never fail on a fresh file.
        let txn = db.begin_write().map_err(backend_err)?;
        txn.open_table(VALUES_TABLE).map_err(backend_err)?;
        txn.commit().map_err(backend_err)?;

        tracing::debug!(path = %path.display(), "Opened redb store");
        Ok(Self {
            db,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored paths starting with `prefix`.
    pub fn scan_paths(&self, prefix: &str) -> Result<Vec<String>> {
        let txn = self.db.begin_read().map_err(backend_err)?;
        let t = txn.open_table(VALUES_TABLE).map_err(backend_err)?;

        let mut paths = Vec::new();
        for item in t.iter().map_err(backend_err)? {
            let (key, _) = item.map_err(backend_err)?;
            if key.value().starts_with(prefix) {
                paths.push(key.value().to_string());
            }
        }
        Ok(paths)
    }
}

impl KeyedStore for RedbStore {
    fn write(&mut self, path: &str, value: StoreValue) -> Result<()> {
        let bytes = serde_json::to_vec(&value)?;
        let txn = self.db.begin_write().map_err(backend_err)?;
        {
            let mut t = txn.open_table(VALUES_TABLE).map_err(backend_err)?;
            t.insert(path, bytes.as_slice()).map_err(backend_err)?;
        }
        txn.commit().map_err(backend_err)?;
        Ok(())
    }

    fn read(&self, path: &str) -> Result<Option<StoreValue>> {
        let txn = self.db.begin_read().map_err(backend_err)?;
        let t = txn.open_table(VALUES_TABLE).map_err(backend_err)?;
        match t.get(path).map_err(backend_err)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }
}
