//! SQLite-backed address store.
//!
//! [`AddressStore`] owns the connection. A store is either *created* for a
//! fresh import (any previous file is removed, writer pragmas applied) or
//! *opened* for lookups and search once an import has finished.

pub mod retry;
pub mod schema;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use crate::config::RetryConfig;
use crate::error::{Result, Stage, StageContext};
use crate::extract::AddressRecord;
use crate::store::retry::retry_sql;

/// How long SQLite itself waits on a lock before reporting busy.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A persisted address row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAddress {
    pub id: i64,
    #[serde(flatten)]
    pub record: AddressRecord,
}

impl StoredAddress {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(StoredAddress {
            id: row.get(0)?,
            record: AddressRecord {
                street: row.get(1)?,
                house_number: row.get(2)?,
                city: row.get(3)?,
                lon: row.get(4)?,
                lat: row.get(5)?,
            },
        })
    }
}

/// Size and content summary of a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub addresses: u64,
    pub fts_rows: u64,
    pub has_fts: bool,
    pub page_count: u64,
    pub page_size: u64,
}

impl StoreStats {
    /// Database size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.page_count * self.page_size
    }
}

/// Connection to an address database.
#[derive(Debug)]
pub struct AddressStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl AddressStore {
    /// Create a fresh store at `path` for bulk loading, replacing any
    /// existing database file.
    pub fn create<P: AsRef<Path>>(path: P, retry: &RetryConfig) -> Result<Self> {
        let path = path.as_ref();
        remove_database_files(path).stage(Stage::OpenStore)?;
        Self::create_at(path, retry)
    }

    /// Open `path` for bulk loading without removing what is there.
    pub fn create_at<P: AsRef<Path>>(path: P, retry: &RetryConfig) -> Result<Self> {
        let path = path.as_ref();
        info!("Creating address store at {}", path.display());
        let conn = Connection::open(path).stage(Stage::OpenStore)?;
        let store = AddressStore {
            conn,
            path: Some(path.to_path_buf()),
        };
        store.configure_writer(retry)?;
        Ok(store)
    }

    /// Open an existing store for lookups and search.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .stage(Stage::OpenStore)?;
        conn.busy_timeout(BUSY_TIMEOUT).stage(Stage::OpenStore)?;
        debug!("Opened address store {}", path.display());
        Ok(AddressStore {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// In-memory store with the primary relation, for tests and tooling.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().stage(Stage::OpenStore)?;
        let store = AddressStore { conn, path: None };
        store
            .conn
            .execute_batch(schema::CREATE_ADDRESSES_SQL)
            .stage(Stage::Schema)?;
        Ok(store)
    }

    fn configure_writer(&self, retry: &RetryConfig) -> Result<()> {
        self.conn.busy_timeout(BUSY_TIMEOUT).stage(Stage::OpenStore)?;
        retry_sql(retry, "apply pragmas", || {
            self.conn.execute_batch(schema::WRITER_PRAGMAS_SQL)
        })
        .stage(Stage::OpenStore)?;
        retry_sql(retry, "create addresses table", || {
            self.conn.execute_batch(schema::CREATE_ADDRESSES_SQL)
        })
        .stage(Stage::Schema)?;
        Ok(())
    }

    /// Underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// File backing this store, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Rows in the primary relation.
    pub fn address_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM addresses", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Whether the full-text mirror exists.
    pub fn has_fts(&self) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![schema::FTS_TABLE],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Rows indexed in the full-text mirror, 0 when it does not exist.
    pub fn fts_row_count(&self) -> Result<u64> {
        if !self.has_fts()? {
            return Ok(0);
        }
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM address_fts_docsize",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Look up one address by its natural key.
    pub fn find_exact(
        &self,
        street: &str,
        house_number: &str,
        city: &str,
    ) -> Result<Option<StoredAddress>> {
        let sql = format!(
            "{} WHERE street = ?1 AND house_number = ?2 AND city = ?3",
            schema::SELECT_ADDRESS_COLUMNS
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let found = stmt
            .query_row(params![street, house_number, city], StoredAddress::from_row)
            .optional()?;
        Ok(found)
    }

    /// Addresses on `street`, ordered by house number.
    pub fn find_by_street(&self, street: &str, limit: usize) -> Result<Vec<StoredAddress>> {
        let sql = format!(
            "{} WHERE street = ?1 ORDER BY house_number, id LIMIT ?2",
            schema::SELECT_ADDRESS_COLUMNS
        );
        self.collect(&sql, street, limit)
    }

    /// Addresses in `city`, ordered by street and house number.
    pub fn find_by_city(&self, city: &str, limit: usize) -> Result<Vec<StoredAddress>> {
        let sql = format!(
            "{} WHERE city = ?1 ORDER BY street, house_number, id LIMIT ?2",
            schema::SELECT_ADDRESS_COLUMNS
        );
        self.collect(&sql, city, limit)
    }

    fn collect(&self, sql: &str, key: &str, limit: usize) -> Result<Vec<StoredAddress>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare_cached(sql)?;
        let rows = stmt.query_map(params![key, limit], StoredAddress::from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Row counts and on-disk size.
    pub fn stats(&self) -> Result<StoreStats> {
        let page_count: i64 = self
            .conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))?;
        let page_size: i64 = self
            .conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))?;
        Ok(StoreStats {
            addresses: self.address_count()?,
            fts_rows: self.fts_row_count()?,
            has_fts: self.has_fts()?,
            page_count: page_count as u64,
            page_size: page_size as u64,
        })
    }
}

/// Remove a database file and its WAL/shared-memory siblings.
fn remove_database_files(path: &Path) -> io::Result<()> {
    let mut candidates = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm", "-journal"] {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        candidates.push(PathBuf::from(name));
    }
    for candidate in candidates {
        match fs::remove_file(&candidate) {
            Ok(()) => debug!("Removed {}", candidate.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
