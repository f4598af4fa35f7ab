//! Configuration for an import run.
//!
//! An [`ImportConfig`] is built once and passed by reference to every
//! component. Nothing in the crate reads paths or limits from global state,
//! so several pipelines can run side by side in one process.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GeoAddressError, Result};

/// Bound parameters per inserted address row.
pub const PARAMS_PER_RECORD: usize = 5;

/// SQLite's default ceiling on bound parameters per statement.
pub const MAX_STATEMENT_PARAMS: usize = 32_766;

/// Top-level configuration for one import run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// GeoJSON feature collection to read.
    pub input_path: PathBuf,

    /// SQLite file to create.
    pub store_path: PathBuf,

    /// Remove an existing store file before importing.
    pub replace_existing_store: bool,

    /// Transaction windowing.
    pub batch: BatchConfig,

    /// Property keys and coordinate policy.
    pub extractor: ExtractorConfig,

    /// Read-side defaults.
    pub search: SearchConfig,

    /// Backoff for busy storage.
    pub retry: RetryConfig,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("filtered.geojson"),
            store_path: PathBuf::from("filtered.db"),
            replace_existing_store: true,
            batch: BatchConfig::default(),
            extractor: ExtractorConfig::default(),
            search: SearchConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl ImportConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration for `input`, storing into `<stem>.db` next to it.
    pub fn for_input<P: AsRef<Path>>(input: P) -> Self {
        let input = input.as_ref();
        let store_path = input.with_extension("db");
        Self {
            input_path: input.to_path_buf(),
            store_path,
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file. Missing keys take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: ImportConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the input path.
    pub fn with_input_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.input_path = path.into();
        self
    }

    /// Set the store path.
    pub fn with_store_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.store_path = path.into();
        self
    }

    /// Set the batch configuration.
    pub fn with_batch(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }

    /// Set the extractor configuration.
    pub fn with_extractor(mut self, extractor: ExtractorConfig) -> Self {
        self.extractor = extractor;
        self
    }

    /// Set the search configuration.
    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Check all nested settings.
    pub fn validate(&self) -> Result<()> {
        self.batch.validate()?;
        self.search.validate()?;
        Ok(())
    }
}

/// Transaction windowing for the batch loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Flush once this many records are buffered.
    pub max_batch_records: usize,

    /// Flush once the open transaction is older than this.
    pub max_batch_duration: Duration,

    /// Records per multi-row INSERT statement.
    pub insert_chunk_size: usize,

    /// Rough total used only for progress estimates.
    pub expected_total_records: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_records: 500_000,
            max_batch_duration: Duration::from_secs(5),
            insert_chunk_size: 500,
            expected_total_records: 33_000_000,
        }
    }
}

impl BatchConfig {
    /// Set the record-count flush trigger.
    pub fn with_max_batch_records(mut self, max: usize) -> Self {
        self.max_batch_records = max;
        self
    }

    /// Set the time-based flush trigger.
    pub fn with_max_batch_duration(mut self, duration: Duration) -> Self {
        self.max_batch_duration = duration;
        self
    }

    /// Set the per-statement chunk width.
    pub fn with_insert_chunk_size(mut self, size: usize) -> Self {
        self.insert_chunk_size = size;
        self
    }

    /// Set the expected record total used for progress estimates.
    pub fn with_expected_total_records(mut self, total: u64) -> Self {
        self.expected_total_records = total;
        self
    }

    /// Reject sizes the loader cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_batch_records == 0 {
            return Err(GeoAddressError::config(
                "max_batch_records must be greater than zero",
            ));
        }
        if self.insert_chunk_size == 0 {
            return Err(GeoAddressError::config(
                "insert_chunk_size must be greater than zero",
            ));
        }
        if self.insert_chunk_size * PARAMS_PER_RECORD > MAX_STATEMENT_PARAMS {
            return Err(GeoAddressError::config(format!(
                "insert_chunk_size {} exceeds the statement limit of {} records",
                self.insert_chunk_size,
                MAX_STATEMENT_PARAMS / PARAMS_PER_RECORD
            )));
        }
        Ok(())
    }
}

/// Which feature properties feed an address record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub street_key: String,
    pub house_number_key: String,
    /// City fallbacks, first present key wins.
    pub city_keys: Vec<String>,
    /// Treat a representative coordinate of exactly (0, 0) as unusable.
    pub reject_null_island: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            street_key: "addr:street".to_string(),
            house_number_key: "addr:housenumber".to_string(),
            city_keys: vec![
                "addr:city".to_string(),
                "addr:town".to_string(),
                "addr:village".to_string(),
            ],
            reject_null_island: true,
        }
    }
}

impl ExtractorConfig {
    /// Toggle the (0, 0) exclusion.
    pub fn with_reject_null_island(mut self, reject: bool) -> Self {
        self.reject_null_island = reject;
        self
    }
}

/// Read-side defaults for the search engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum hits per query.
    pub limit: usize,
    /// Marker inserted before a matched token.
    pub highlight_open: String,
    /// Marker inserted after a matched token.
    pub highlight_close: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 5,
            highlight_open: "<b>".to_string(),
            highlight_close: "</b>".to_string(),
        }
    }
}

impl SearchConfig {
    /// Set the result limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the highlight marker pair.
    pub fn with_markers<S: Into<String>>(mut self, open: S, close: S) -> Self {
        self.highlight_open = open.into();
        self.highlight_close = close.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(GeoAddressError::config("search limit must be greater than zero"));
        }
        Ok(())
    }
}

/// Exponential backoff for busy or locked storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`, capped.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}
