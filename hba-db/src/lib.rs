//! SQLite store for the precomputed upstream network.
//!
//! The network-building step writes one record per basin: local and
//! cumulative area, Pfafstetter code, stream order and the ids of every
//! basin draining into it. Aggregation reads it through
//! [`hba_core::NetworkIndex`].
//!
//! # Usage
//!
//! ```rust
//! use hba_core::NetworkIndex;
//! use hba_db::Database;
//!
//! let db = Database::new().unwrap();
//! db.load_network("basin_id,area,tot_area,pfaf_id,order,up_seg_ids\n1,10,30,1721,2,2;3\n")
//!     .unwrap();
//! let basin = db.get(1).unwrap();
//! assert_eq!(basin.up_seg_ids, vec![2, 3]);
//! ```
//!
//! # Tables
//!
//! See [`schema::create_schema`] for the full SQL schema.

pub mod schema;
mod loader;
mod queries;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use hba_core::{BasinId, NetworkIndex, NetworkRecord};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid network row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },

    #[error("Basin {0} is already in the network index")]
    Duplicate(BasinId),

    #[error("Stored basin {id} is corrupt: {reason}")]
    Corrupt { id: BasinId, reason: String },

    #[error("Database connection lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, DbError>;

/// SQLite network index, in memory or on disk.
///
/// Cheaply cloneable; clones share one connection, so the index can be
/// read from worker threads.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Create an empty in-memory database with the schema applied.
    pub fn new() -> Result<Self> {
        Database::from_connection(Connection::open_in_memory()?)
    }

    /// Open (or create) an on-disk index.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::from_connection(Connection::open(path)?)?;
        log::info!("db: opened network index {}", path.display());
        Ok(db)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(schema::create_schema())?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }
}

impl NetworkIndex for Database {
    fn get(&self, id: BasinId) -> hba_core::Result<NetworkRecord> {
        match self.get_basin(id) {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(hba_core::Error::BasinNotFound(id.to_string())),
            Err(e) => Err(hba_core::Error::Index(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NETWORK: &str = "basin_id,area,tot_area,pfaf_id,order,up_seg_ids\n1,10,30,1721,2,2 3\n2,10,10,1722,1,\n";

    #[test]
    fn database_creates_successfully() {
        assert!(Database::new().is_ok(), "Database should create without errors");
    }

    #[test]
    fn database_is_cloneable() {
        let db = Database::new().unwrap();
        let db2 = db.clone();
        db.load_network(NETWORK).unwrap();
        assert_eq!(db2.basin_count().unwrap(), 2, "Clone should see same data via shared Arc");
    }

    #[test]
    fn network_index_maps_missing_basin_to_not_found() {
        let db = Database::new().unwrap();
        db.load_network(NETWORK).unwrap();
        assert_eq!(NetworkIndex::get(&db, 1).unwrap().tot_area, 30.0);
        assert!(matches!(
            NetworkIndex::get(&db, 3),
            Err(hba_core::Error::BasinNotFound(id)) if id == "3"
        ));
        assert!(!db.contains(3).unwrap());
    }

    #[test]
    fn on_disk_index_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("network.sqlite");
        Database::open(&path).unwrap().load_network(NETWORK).unwrap();

        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.basin_count().unwrap(), 2);
        assert_eq!(reopened.get_basin(1).unwrap().unwrap().up_seg_ids, vec![2, 3]);
    }
}
