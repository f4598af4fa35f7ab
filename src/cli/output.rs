//! Output formatting for CLI commands.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cli::args::{GeoAddressArgs, OutputFormat};
use crate::error::Result;
use crate::pipeline::ImportReport;
use crate::search::SearchHit;
use crate::store::StoreStats;

/// Result of an import.
#[derive(Debug, Serialize, Deserialize)]
pub struct ImportResult {
    pub store: PathBuf,
    #[serde(flatten)]
    pub report: ImportReport,
}

/// Result of a search.
#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResults {
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub duration_ms: u64,
}

/// Store statistics.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResult {
    pub store: PathBuf,
    #[serde(flatten)]
    pub stats: StoreStats,
}

/// Human-readable rendering of a command result.
pub trait HumanOutput {
    fn print_human(&self);
}

/// Output a result in the selected format.
pub fn output_result<T>(message: &str, result: &T, args: &GeoAddressArgs) -> Result<()>
where
    T: Serialize + HumanOutput,
{
    match args.output_format {
        OutputFormat::Human => {
            if args.verbosity() > 0 {
                println!("{message}");
                println!();
            }
            result.print_human();
            Ok(())
        }
        OutputFormat::Json => output_json(result, args),
    }
}

fn output_json<T: Serialize>(result: &T, args: &GeoAddressArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    println!("{json}");
    Ok(())
}

impl HumanOutput for ImportResult {
    fn print_human(&self) {
        let report = &self.report;
        println!("Store: {}", self.store.display());
        println!("Features read: {}", report.features_seen);
        println!("Addresses extracted: {}", report.extracted);
        println!("Rows inserted: {}", report.rows_inserted());
        println!("Duplicates ignored: {}", report.duplicates_ignored());
        println!("Malformed features: {}", report.malformed);
        println!("Excluded features: {}", report.excluded_total());
        for (reason, count) in report.exclusions() {
            println!("  {reason}: {count}");
        }
        println!(
            "Transactions: {} (largest {} records)",
            report.flushes(),
            report.largest_flush()
        );
        println!("Full-text rows: {}", report.index.fts_rows);
        println!("Elapsed: {:.1}s", report.elapsed.as_secs_f64());
    }
}

impl HumanOutput for SearchResults {
    fn print_human(&self) {
        if self.hits.is_empty() {
            println!("No results for \"{}\"", self.query);
            return;
        }
        for (i, hit) in self.hits.iter().enumerate() {
            let h = &hit.highlighted;
            println!(
                "{}. {} {}, {} ({:.6}, {:.6}) rank {:.3}",
                i + 1,
                h.street,
                h.house_number,
                h.city,
                hit.record.lon,
                hit.record.lat,
                hit.rank
            );
        }
        println!();
        println!("{} hits in {}ms", self.hits.len(), self.duration_ms);
    }
}

impl HumanOutput for StatsResult {
    fn print_human(&self) {
        println!("Store: {}", self.store.display());
        println!("Addresses: {}", self.stats.addresses);
        if self.stats.has_fts {
            println!("Full-text rows: {}", self.stats.fts_rows);
        } else {
            println!("Full-text index: missing");
        }
        println!("Size: {}", format_bytes(self.stats.size_bytes()));
    }
}

/// Format bytes in human-readable format.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let unit = UNITS[unit_index];
    if unit_index == 0 {
        format!("{bytes} {unit}")
    } else {
        format!("{size:.1} {unit}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(16384), "16.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024 / 2), "1.5 MB");
    }

    #[test]
    fn test_stats_json_is_flat() {
        let result = StatsResult {
            store: PathBuf::from("a.db"),
            stats: StoreStats {
                addresses: 2,
                fts_rows: 2,
                has_fts: true,
                page_count: 4,
                page_size: 16384,
            },
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["store"], "a.db");
        assert_eq!(value["addresses"], 2);
        assert_eq!(value["has_fts"], true);
    }
}
