//! Batched, transactional loading of address records.
//!
//! The loader keeps one open transaction and one in-memory buffer. A flush
//! happens when the buffer reaches [`BatchConfig::max_batch_records`] or the
//! open transaction is older than [`BatchConfig::max_batch_duration`],
//! whichever comes first. Each flush writes the buffer in multi-row
//! `INSERT OR IGNORE` chunks, commits, and opens the next transaction.
//!
//! A flush is all-or-nothing. If anything fails before the commit, or the
//! loader is dropped without [`BatchLoader::finish`], the in-flight
//! transaction is rolled back and earlier flushes stay intact.

use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rusqlite::ToSql;
use rusqlite::params_from_iter;
use serde::{Deserialize, Serialize};

use crate::config::{BatchConfig, RetryConfig};
use crate::error::Result;
use crate::extract::AddressRecord;
use crate::store::retry::retry_sql;
use crate::store::{AddressStore, schema};

/// Upper bound on the buffer's initial allocation.
const INITIAL_BUFFER_CAPACITY: usize = 64 * 1024;

/// Advisory completion estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Percent of the expected total, `None` without an expected total.
    pub percent: Option<f64>,
    /// Projected time left, `None` until throughput is known.
    pub remaining: Option<Duration>,
}

impl Progress {
    /// Estimate from records loaded so far, the expected total and the
    /// current throughput.
    pub fn estimate(total_so_far: u64, expected_total: u64, records_per_second: f64) -> Self {
        if expected_total == 0 {
            return Progress {
                percent: None,
                remaining: None,
            };
        }
        let percent = total_so_far as f64 / expected_total as f64 * 100.0;
        let left = expected_total.saturating_sub(total_so_far) as f64;
        let remaining = (records_per_second > 0.0)
            .then(|| Duration::from_secs_f64(left / records_per_second));
        Progress {
            percent: Some(percent),
            remaining,
        }
    }
}

/// What one flush did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlushStats {
    /// 1-based flush number.
    pub sequence: u64,
    /// Records committed in this flush.
    pub records: usize,
    /// Rows actually added.
    pub inserted: usize,
    /// Records absorbed by the natural-key constraint.
    pub ignored_duplicates: usize,
    /// INSERT statements issued.
    pub chunks: usize,
    /// Time spent writing and committing.
    pub flush_duration: Duration,
    /// Records of this flush over time since the previous flush completed.
    pub records_per_second: f64,
    /// Records submitted across all flushes so far.
    pub total_records: u64,
    pub progress: Progress,
}

/// Totals over a whole load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub flushes: u64,
    pub records_submitted: u64,
    pub rows_inserted: u64,
    pub duplicates_ignored: u64,
    /// Most records committed by any single transaction.
    pub largest_flush: usize,
}

impl LoadSummary {
    fn record(&mut self, stats: &FlushStats) {
        self.flushes += 1;
        self.records_submitted += stats.records as u64;
        self.rows_inserted += stats.inserted as u64;
        self.duplicates_ignored += stats.ignored_duplicates as u64;
        self.largest_flush = self.largest_flush.max(stats.records);
    }
}

/// Accumulates records and commits them in bounded transactions.
pub struct BatchLoader<'s> {
    store: &'s AddressStore,
    config: BatchConfig,
    retry: RetryConfig,
    buffer: Vec<AddressRecord>,
    /// Pre-built statement text for a full chunk.
    full_chunk_sql: String,
    in_transaction: bool,
    window_started: Instant,
    last_flush_at: Instant,
    summary: LoadSummary,
}

impl<'s> BatchLoader<'s> {
    /// Create a loader writing into `store` and open its first transaction.
    pub fn new(store: &'s AddressStore, config: &BatchConfig, retry: &RetryConfig) -> Result<Self> {
        config.validate()?;
        let now = Instant::now();
        let mut loader = BatchLoader {
            store,
            config: config.clone(),
            retry: retry.clone(),
            buffer: Vec::with_capacity(config.max_batch_records.min(INITIAL_BUFFER_CAPACITY)),
            full_chunk_sql: schema::insert_sql(config.insert_chunk_size),
            in_transaction: false,
            window_started: now,
            last_flush_at: now,
            summary: LoadSummary::default(),
        };
        loader.begin()?;
        Ok(loader)
    }

    /// Records buffered and not yet committed.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Totals of the flushes committed so far.
    pub fn summary(&self) -> &LoadSummary {
        &self.summary
    }

    /// Buffer a record. Returns the flush statistics if this record
    /// triggered a flush.
    pub fn push(&mut self, record: AddressRecord) -> Result<Option<FlushStats>> {
        self.buffer.push(record);
        if self.should_flush() {
            return self.flush().map(Some);
        }
        Ok(None)
    }

    /// Whether either window limit has been reached.
    pub fn should_flush(&self) -> bool {
        self.buffer.len() >= self.config.max_batch_records
            || self.window_started.elapsed() >= self.config.max_batch_duration
    }

    /// Write and commit the buffer, then open the next transaction.
    pub fn flush(&mut self) -> Result<FlushStats> {
        let stats = self.write_and_commit()?;
        self.begin()?;
        Ok(stats)
    }

    /// Commit whatever is left and close the loader.
    pub fn finish(mut self) -> Result<LoadSummary> {
        if self.buffer.is_empty() {
            self.commit()?;
        } else {
            self.write_and_commit()?;
        }
        info!(
            "Load finished: {} records in {} flushes, {} rows inserted, {} duplicates ignored",
            self.summary.records_submitted,
            self.summary.flushes,
            self.summary.rows_inserted,
            self.summary.duplicates_ignored
        );
        Ok(std::mem::take(&mut self.summary))
    }

    fn begin(&mut self) -> Result<()> {
        let conn = self.store.connection();
        retry_sql(&self.retry, "begin transaction", || {
            conn.execute_batch("BEGIN IMMEDIATE")
        })?;
        self.in_transaction = true;
        self.window_started = Instant::now();
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let conn = self.store.connection();
        retry_sql(&self.retry, "commit transaction", || {
            conn.execute_batch("COMMIT")
        })?;
        self.in_transaction = false;
        Ok(())
    }

    fn write_and_commit(&mut self) -> Result<FlushStats> {
        let started = Instant::now();
        let records = self.buffer.len();
        let (inserted, chunks) = self.insert_buffer()?;
        self.commit()?;
        self.buffer.clear();

        let now = Instant::now();
        let since_last = now.duration_since(self.last_flush_at).as_secs_f64();
        self.last_flush_at = now;
        let records_per_second = if since_last > 0.0 {
            records as f64 / since_last
        } else {
            0.0
        };

        let total_records = self.summary.records_submitted + records as u64;
        let stats = FlushStats {
            sequence: self.summary.flushes + 1,
            records,
            inserted,
            ignored_duplicates: records - inserted,
            chunks,
            flush_duration: started.elapsed(),
            records_per_second,
            total_records,
            progress: Progress::estimate(
                total_records,
                self.config.expected_total_records,
                records_per_second,
            ),
        };
        self.summary.record(&stats);
        log_flush(&stats);
        Ok(stats)
    }

    /// Issue the buffer as fixed-width multi-row inserts inside the open
    /// transaction. Returns rows inserted and statements issued.
    fn insert_buffer(&self) -> Result<(usize, usize)> {
        let conn = self.store.connection();
        let mut inserted = 0;
        let mut chunks = 0;
        for chunk in self.buffer.chunks(self.config.insert_chunk_size) {
            let partial_sql;
            let sql = if chunk.len() == self.config.insert_chunk_size {
                &self.full_chunk_sql
            } else {
                partial_sql = schema::insert_sql(chunk.len());
                &partial_sql
            };
            let mut stmt = conn.prepare_cached(sql)?;
            let values = chunk.iter().flat_map(|r| {
                [
                    &r.street as &dyn ToSql,
                    &r.house_number,
                    &r.city,
                    &r.lon,
                    &r.lat,
                ]
            });
            inserted += stmt.execute(params_from_iter(values))?;
            chunks += 1;
        }
        debug!("Issued {chunks} insert statements for {} records", self.buffer.len());
        Ok((inserted, chunks))
    }
}

impl Drop for BatchLoader<'_> {
    fn drop(&mut self) {
        if !self.in_transaction {
            return;
        }
        if !self.buffer.is_empty() {
            warn!(
                "Discarding {} uncommitted records from an unfinished batch",
                self.buffer.len()
            );
        }
        if let Err(e) = self.store.connection().execute_batch("ROLLBACK") {
            warn!("Rollback of unfinished batch failed: {e}");
        }
    }
}

fn log_flush(stats: &FlushStats) {
    let eta = match stats.progress.remaining {
        Some(remaining) => format!("{:.1} min remaining", remaining.as_secs_f64() / 60.0),
        None => "estimating...".to_string(),
    };
    info!(
        "Flushed batch {}: {} addresses total ({:.1}/s, {:.1}%, {eta})",
        stats.sequence,
        stats.total_records,
        stats.records_per_second,
        stats.progress.percent.unwrap_or(0.0),
    );
    debug!(
        "Batch {}: {} records, {} inserted, {} duplicates, {} chunks, {:?}",
        stats.sequence,
        stats.records,
        stats.inserted,
        stats.ignored_duplicates,
        stats.chunks,
        stats.flush_duration
    );
}
