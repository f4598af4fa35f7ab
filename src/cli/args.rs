//! Command line argument parsing using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use serde::{Deserialize, Serialize};

/// geoaddress - stream GeoJSON address points into a searchable SQLite store
#[derive(Parser, Debug, Clone)]
#[command(name = "geoaddress")]
#[command(about = "Import GeoJSON addresses into SQLite and search them")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct GeoAddressArgs {
    /// Verbosity level (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl GeoAddressArgs {
    /// Effective verbosity: 0 quiet, 1 normal, 2 verbose, 3+ debug.
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose.saturating_add(1)
        }
    }

    /// Log filter for the effective verbosity.
    pub fn log_level(&self) -> LevelFilter {
        match self.verbosity() {
            0 => LevelFilter::Error,
            1 => LevelFilter::Warn,
            2 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Import a GeoJSON feature collection into a fresh store
    Import(ImportArgs),

    /// Full-text search an imported store
    Search(SearchArgs),

    /// Show store statistics
    Stats(StatsArgs),
}

/// Arguments for importing
#[derive(Parser, Debug, Clone)]
pub struct ImportArgs {
    /// GeoJSON feature collection
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Store to create (default: INPUT with a .db extension)
    #[arg(short, long, value_name = "STORE")]
    pub store: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, value_name = "CONFIG_FILE", env = "GEOADDRESS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Records per transaction
    #[arg(short, long)]
    pub batch_size: Option<usize>,

    /// Seconds before an open transaction is committed
    #[arg(long)]
    pub commit_interval_secs: Option<u64>,

    /// Keep features located at exactly (0, 0)
    #[arg(long)]
    pub keep_null_island: bool,
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Imported store
    #[arg(value_name = "STORE")]
    pub store: PathBuf,

    /// Free-text query
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Maximum number of results to return
    #[arg(short, long, default_value = "5")]
    pub limit: usize,

    /// Treat QUERY as a raw FTS5 expression
    #[arg(long)]
    pub raw: bool,
}

/// Arguments for statistics
#[derive(Parser, Debug, Clone)]
pub struct StatsArgs {
    /// Imported store
    #[arg(value_name = "STORE")]
    pub store: PathBuf,
}

/// Output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        GeoAddressArgs::command().debug_assert();
    }

    #[test]
    fn test_parse_import() {
        let args = GeoAddressArgs::try_parse_from([
            "geoaddress",
            "-vv",
            "import",
            "filtered.geojson",
            "--batch-size",
            "1000",
            "--commit-interval-secs",
            "2",
        ])
        .unwrap();
        assert_eq!(args.verbosity(), 3);
        match args.command {
            Command::Import(import) => {
                assert_eq!(import.input, PathBuf::from("filtered.geojson"));
                assert_eq!(import.batch_size, Some(1000));
                assert_eq!(import.commit_interval_secs, Some(2));
                assert!(import.store.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_log_levels_follow_verbosity() {
        let level = |flags: &[&str]| {
            let mut argv = vec!["geoaddress"];
            argv.extend_from_slice(flags);
            argv.extend_from_slice(&["stats", "a.db"]);
            GeoAddressArgs::try_parse_from(argv).unwrap().log_level()
        };
        assert_eq!(level(&["-q"]), LevelFilter::Error);
        assert_eq!(level(&[]), LevelFilter::Warn);
        assert_eq!(level(&["-v"]), LevelFilter::Info);
        assert_eq!(level(&["-vv"]), LevelFilter::Debug);
        assert_eq!(level(&["-vvvv"]), LevelFilter::Debug);
    }

    #[test]
    fn test_parse_search_json() {
        let args = GeoAddressArgs::try_parse_from([
            "geoaddress",
            "-q",
            "--format",
            "json",
            "search",
            "addresses.db",
            "Hauptstraße Berlin",
            "--limit",
            "3",
        ])
        .unwrap();
        assert_eq!(args.verbosity(), 0);
        assert_eq!(args.output_format, OutputFormat::Json);
        match args.command {
            Command::Search(search) => {
                assert_eq!(search.query, "Hauptstraße Berlin");
                assert_eq!(search.limit, 3);
                assert!(!search.raw);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
