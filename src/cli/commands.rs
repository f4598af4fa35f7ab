//! Command implementations for the geoaddress CLI.

use std::time::{Duration, Instant};

use log::info;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::{ImportConfig, SearchConfig};
use crate::error::Result;
use crate::pipeline::Importer;
use crate::search::SearchEngine;
use crate::store::AddressStore;

/// Execute a CLI command.
pub fn execute_command(args: GeoAddressArgs) -> Result<()> {
    match &args.command {
        Command::Import(import_args) => import(import_args, &args),
        Command::Search(search_args) => search(search_args, &args),
        Command::Stats(stats_args) => show_stats(stats_args, &args),
    }
}

/// Build the import configuration from a config file and flag overrides.
pub fn import_config(args: &ImportArgs) -> Result<ImportConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            ImportConfig::from_json_file(path)?
        }
        None => ImportConfig::for_input(&args.input),
    };
    config.input_path = args.input.clone();
    if let Some(store) = &args.store {
        config.store_path = store.clone();
    } else if args.config.is_some() {
        config.store_path = args.input.with_extension("db");
    }
    if let Some(size) = args.batch_size {
        config.batch = config.batch.with_max_batch_records(size);
    }
    if let Some(secs) = args.commit_interval_secs {
        config.batch = config.batch.with_max_batch_duration(Duration::from_secs(secs));
    }
    if args.keep_null_island {
        config.extractor = config.extractor.with_reject_null_island(false);
    }
    config.validate()?;
    Ok(config)
}

fn import(args: &ImportArgs, cli_args: &GeoAddressArgs) -> Result<()> {
    let config = import_config(args)?;
    if cli_args.verbosity() > 1 {
        println!(
            "Importing {} into {}",
            config.input_path.display(),
            config.store_path.display()
        );
    }

    let report = Importer::new(&config).run()?;
    output_result(
        "Import finished",
        &ImportResult {
            store: config.store_path.clone(),
            report,
        },
        cli_args,
    )
}

fn search(args: &SearchArgs, cli_args: &GeoAddressArgs) -> Result<()> {
    let engine = SearchEngine::open(&args.store, SearchConfig::default().with_limit(args.limit))?;

    let started = Instant::now();
    let hits = if args.raw {
        engine.search_expression(&args.query, args.limit)?
    } else {
        engine.search(&args.query)?
    };
    let duration_ms = started.elapsed().as_millis() as u64;

    output_result(
        "Search results",
        &SearchResults {
            query: args.query.clone(),
            hits,
            duration_ms,
        },
        cli_args,
    )
}

fn show_stats(args: &StatsArgs, cli_args: &GeoAddressArgs) -> Result<()> {
    let store = AddressStore::open(&args.store)?;
    let stats = store.stats()?;
    output_result(
        "Store statistics",
        &StatsResult {
            store: args.store.clone(),
            stats,
        },
        cli_args,
    )
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::Builder;

    use super::*;

    fn import_args(input: PathBuf) -> ImportArgs {
        ImportArgs {
            input,
            store: None,
            config: None,
            batch_size: None,
            commit_interval_secs: None,
            keep_null_island: false,
        }
    }

    #[test]
    fn test_import_config_defaults_from_input() {
        let mut args = import_args(PathBuf::from("data/filtered.geojson"));
        args.batch_size = Some(1000);
        args.commit_interval_secs = Some(1);
        args.keep_null_island = true;

        let config = import_config(&args).unwrap();
        assert_eq!(config.store_path, PathBuf::from("data/filtered.db"));
        assert_eq!(config.batch.max_batch_records, 1000);
        assert_eq!(config.batch.max_batch_duration, Duration::from_secs(1));
        assert!(!config.extractor.reject_null_island);
    }

    #[test]
    fn test_import_config_file_then_flags() {
        let dir = Builder::new().prefix("test_cli").tempdir().unwrap();
        let config_path = dir.path().join("import.json");
        fs::write(
            &config_path,
            r#"{"batch": {"max_batch_records": 20, "insert_chunk_size": 10}}"#,
        )
        .unwrap();

        let mut args = import_args(dir.path().join("in.geojson"));
        args.config = Some(config_path);
        args.store = Some(dir.path().join("out.db"));

        let config = import_config(&args).unwrap();
        assert_eq!(config.batch.max_batch_records, 20);
        assert_eq!(config.batch.insert_chunk_size, 10);
        assert_eq!(config.store_path, dir.path().join("out.db"));
        assert_eq!(config.input_path, dir.path().join("in.geojson"));
    }

    #[test]
    fn test_import_config_rejects_zero_batch() {
        let mut args = import_args(PathBuf::from("in.geojson"));
        args.batch_size = Some(0);
        assert!(import_config(&args).is_err());
    }
}
