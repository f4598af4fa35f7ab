//! Post-load index and full-text build.
//!
//! Runs once, after the last batch has been committed:
//!
//! 1. secondary indices on `city`, `street` and `(street, house_number)`
//! 2. `ANALYZE` and `PRAGMA optimize`
//! 3. `VACUUM`
//! 4. the FTS5 mirror over `street`, `house_number`, `city`
//! 5. a single bulk copy from `addresses` into the mirror
//!
//! The mirror is never maintained incrementally; there are no triggers.

use std::time::{Duration, Instant};

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::RetryConfig;
use crate::error::Result;
use crate::store::retry::retry_sql;
use crate::store::{AddressStore, schema};

/// Timings and row counts of a build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexBuildReport {
    pub indexes_created: usize,
    pub fts_rows: u64,
    pub index_duration: Duration,
    pub optimize_duration: Duration,
    pub vacuum_duration: Duration,
    pub fts_duration: Duration,
}

/// Builds indices and the full-text mirror on a loaded store.
pub struct IndexBuilder<'s> {
    store: &'s AddressStore,
    retry: RetryConfig,
}

impl<'s> IndexBuilder<'s> {
    pub fn new(store: &'s AddressStore, retry: &RetryConfig) -> Self {
        IndexBuilder {
            store,
            retry: retry.clone(),
        }
    }

    /// Run every build step in order.
    pub fn build(&self) -> Result<IndexBuildReport> {
        let mut report = IndexBuildReport::default();

        let started = Instant::now();
        report.indexes_created = self.create_indexes()?;
        report.index_duration = started.elapsed();

        let started = Instant::now();
        self.optimize()?;
        report.optimize_duration = started.elapsed();

        let started = Instant::now();
        self.vacuum()?;
        report.vacuum_duration = started.elapsed();

        let started = Instant::now();
        report.fts_rows = self.build_fts()?;
        report.fts_duration = started.elapsed();

        info!(
            "Index build done: {} indices, {} rows in full-text index",
            report.indexes_created, report.fts_rows
        );
        Ok(report)
    }

    /// Create the secondary indices. Returns how many statements ran.
    pub fn create_indexes(&self) -> Result<usize> {
        info!("Creating indices...");
        for (name, sql) in schema::CREATE_INDEXES_SQL {
            self.execute(name, sql)?;
        }
        Ok(schema::CREATE_INDEXES_SQL.len())
    }

    /// Refresh planner statistics and let SQLite optimize.
    pub fn optimize(&self) -> Result<()> {
        self.execute("analyze", "ANALYZE")?;
        self.execute("optimize", "PRAGMA optimize")
    }

    /// Reclaim space fragmented by the bulk load.
    pub fn vacuum(&self) -> Result<()> {
        info!("Compacting store (VACUUM)...");
        self.execute("vacuum", "VACUUM")
    }

    /// Create the mirror and copy every address into it. Returns the number
    /// of rows indexed.
    pub fn build_fts(&self) -> Result<u64> {
        info!("Creating full-text index...");
        self.execute("drop full-text index", schema::DROP_FTS_SQL)?;
        self.execute("create full-text index", schema::CREATE_FTS_SQL)?;

        info!("Populating full-text index...");
        let conn = self.store.connection();
        let rows = retry_sql(&self.retry, "populate full-text index", || {
            conn.execute(schema::POPULATE_FTS_SQL, [])
        })?;
        Ok(rows as u64)
    }

    fn execute(&self, what: &str, sql: &str) -> Result<()> {
        let conn = self.store.connection();
        retry_sql(&self.retry, what, || conn.execute_batch(sql))
    }
}
