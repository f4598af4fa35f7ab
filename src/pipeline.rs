//! End-to-end import: decode, extract, load, index.
//!
//! [`Importer`] wires the stages together for one configured run. The
//! pipeline is single threaded; each feature is decoded, extracted and
//! buffered inline, and the index build starts only once the loader has
//! committed its last batch.
//!
//! A cancellation flag can be attached. It is checked right after a batch
//! commits, so a cancelled run keeps every committed batch and leaves no
//! partial one behind.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::ImportConfig;
use crate::error::{GeoAddressError, Result, Stage, StageContext};
use crate::extract::{AddressExtractor, ExclusionReason, Extraction};
use crate::geojson::{DecodedFeature, FeatureStream};
use crate::index_builder::{IndexBuildReport, IndexBuilder};
use crate::loader::{BatchLoader, FlushStats, LoadSummary};
use crate::store::AddressStore;

/// Aggregate outcome of an import run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReport {
    /// Elements of the `features` array consumed, malformed ones included.
    pub features_seen: u64,
    /// Elements that could not be decoded as a feature.
    pub malformed: u64,
    /// Features the extractor rejected, per reason.
    pub excluded: BTreeMap<ExclusionReason, u64>,
    /// Records handed to the loader.
    pub extracted: u64,
    #[serde(flatten)]
    pub load: LoadSummary,
    pub index: IndexBuildReport,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
}

impl ImportReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        ImportReport {
            features_seen: 0,
            malformed: 0,
            excluded: BTreeMap::new(),
            extracted: 0,
            load: LoadSummary::default(),
            index: IndexBuildReport::default(),
            started_at,
            finished_at: started_at,
            elapsed: Duration::ZERO,
        }
    }

    /// Features excluded for any reason.
    pub fn excluded_total(&self) -> u64 {
        self.excluded.values().sum()
    }

    /// Features excluded for `reason`.
    pub fn excluded_for(&self, reason: ExclusionReason) -> u64 {
        self.excluded.get(&reason).copied().unwrap_or(0)
    }

    /// Every exclusion reason with its count, zeros included, in
    /// reporting order.
    pub fn exclusions(&self) -> impl Iterator<Item = (ExclusionReason, u64)> + '_ {
        ExclusionReason::ALL
            .into_iter()
            .map(|reason| (reason, self.excluded_for(reason)))
    }

    pub fn rows_inserted(&self) -> u64 {
        self.load.rows_inserted
    }

    pub fn duplicates_ignored(&self) -> u64 {
        self.load.duplicates_ignored
    }

    pub fn flushes(&self) -> u64 {
        self.load.flushes
    }

    pub fn largest_flush(&self) -> usize {
        self.load.largest_flush
    }
}

/// Runs the import pipeline for one configuration.
pub struct Importer {
    config: ImportConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl Importer {
    pub fn new(config: &ImportConfig) -> Self {
        Importer {
            config: config.clone(),
            cancel: None,
        }
    }

    /// Stop at the next batch commit once `flag` is set.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Import the configured input file into the configured store.
    pub fn run(&self) -> Result<ImportReport> {
        self.config.validate()?;
        info!("Reading features from {}", self.config.input_path.display());
        let stream = FeatureStream::open(&self.config.input_path).stage(Stage::OpenInput)?;
        self.run_stream(stream)
    }

    /// Import a document read from `reader` into the configured store.
    pub fn run_from_reader<R: BufRead>(&self, reader: R) -> Result<ImportReport> {
        self.config.validate()?;
        self.run_stream(FeatureStream::new(reader))
    }

    fn open_store(&self) -> Result<AddressStore> {
        let path = &self.config.store_path;
        if self.config.replace_existing_store {
            AddressStore::create(path, &self.config.retry)
        } else {
            AddressStore::create_at(path, &self.config.retry)
        }
    }

    fn run_stream<R: BufRead>(&self, stream: FeatureStream<R>) -> Result<ImportReport> {
        let clock = Instant::now();
        let mut report = ImportReport::new(Utc::now());
        let store = self.open_store()?;

        info!("Loading addresses...");
        let load = self.load(&store, stream, &mut report).stage(Stage::Load)?;
        report.load = load;

        info!("Building indices...");
        report.index = IndexBuilder::new(&store, &self.config.retry)
            .build()
            .stage(Stage::IndexBuild)?;

        report.finished_at = Utc::now();
        report.elapsed = clock.elapsed();
        log_report(&report);
        Ok(report)
    }

    fn load<R: BufRead>(
        &self,
        store: &AddressStore,
        stream: FeatureStream<R>,
        report: &mut ImportReport,
    ) -> Result<LoadSummary> {
        let extractor = AddressExtractor::new(self.config.extractor.clone());
        let mut loader = BatchLoader::new(store, &self.config.batch, &self.config.retry)?;

        for decoded in stream {
            report.features_seen += 1;
            let flushed = match decoded? {
                DecodedFeature::Feature(feature) => match extractor.extract(&feature) {
                    Extraction::Record(record) => {
                        report.extracted += 1;
                        loader.push(record)?
                    }
                    Extraction::Excluded(reason) => {
                        debug!("Feature {} excluded: {reason}", report.features_seen - 1);
                        *report.excluded.entry(reason).or_insert(0) += 1;
                        None
                    }
                },
                DecodedFeature::Malformed { index, reason } => {
                    debug!("Feature {index} malformed: {reason}");
                    report.malformed += 1;
                    None
                }
            };

            // A long run of skipped features must not hold the window open.
            let flushed = match flushed {
                None if loader.pending() > 0 && loader.should_flush() => Some(loader.flush()?),
                other => other,
            };
            if let Some(stats) = flushed {
                self.check_cancelled(&stats)?;
            }
        }

        loader.finish()
    }

    fn check_cancelled(&self, stats: &FlushStats) -> Result<()> {
        let requested = self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed));
        if requested {
            info!("Import cancelled after batch {}", stats.sequence);
            return Err(GeoAddressError::cancelled(format!(
                "stopped after {} committed batches ({} records)",
                stats.sequence, stats.total_records
            )));
        }
        Ok(())
    }
}

fn log_report(report: &ImportReport) {
    info!(
        "Import done in {:.1}s: {} features, {} addresses, {} rows inserted, {} duplicates, {} malformed",
        report.elapsed.as_secs_f64(),
        report.features_seen,
        report.extracted,
        report.rows_inserted(),
        report.duplicates_ignored(),
        report.malformed
    );
    for (reason, count) in &report.excluded {
        info!("  excluded ({reason}): {count}");
    }
}
