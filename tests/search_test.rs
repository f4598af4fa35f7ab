use std::io::Cursor;
use std::path::PathBuf;

use geoaddress::config::{ImportConfig, SearchConfig};
use geoaddress::error::{Result, Stage};
use geoaddress::pipeline::Importer;
use geoaddress::search::SearchEngine;
use tempfile::{Builder, TempDir};

const ADDRESSES: &str = r#"{"type": "FeatureCollection", "features": [
  {"properties": {"addr:street": "Haupt-Straße", "addr:housenumber": "4", "addr:city": "Nürnberg"},
   "geometry": {"type": "Point", "coordinates": [11.07, 49.45]}},
  {"properties": {"addr:street": "Hauptstraße", "addr:housenumber": "9", "addr:town": "Fürth"},
   "geometry": {"type": "Point", "coordinates": [10.99, 49.47]}},
  {"properties": {"addr:street": "Königstraße", "addr:housenumber": "1", "addr:city": "Nürnberg"},
   "geometry": {"type": "MultiPolygon", "coordinates": [[[[11.08, 49.44], [11.09, 49.44], [11.08, 49.44]]]]}},
  {"properties": {"addr:street": "Königstraße", "addr:housenumber": "2", "addr:city": "Nürnberg"},
   "geometry": {"type": "Point", "coordinates": [11.081, 49.441]}},
  {"properties": {"addr:street": "Dorfstraße", "addr:village": "Buch"},
   "geometry": {"type": "Point", "coordinates": [11.0, 49.5]}}
]}"#;

fn imported() -> Result<(TempDir, PathBuf)> {
    let dir = Builder::new().prefix("test_search").tempdir().unwrap();
    let store_path = dir.path().join("addresses.db");
    let config = ImportConfig::new().with_store_path(&store_path);
    Importer::new(&config).run_from_reader(Cursor::new(ADDRESSES))?;
    Ok((dir, store_path))
}

#[test]
fn test_hyphenated_street_matches_as_one_token() -> Result<()> {
    let (_dir, path) = imported()?;
    let engine = SearchEngine::open(&path, SearchConfig::default())?;

    let hits = engine.search("Haupt-Straße")?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.city, "Nürnberg");
    assert_eq!(hits[0].highlighted.street, "<b>Haupt-Straße</b>");

    // The pieces of a hyphenated street are not tokens of their own.
    assert!(engine.search("Straße")?.is_empty());
    Ok(())
}

#[test]
fn test_diacritics_are_significant() -> Result<()> {
    let (_dir, path) = imported()?;
    let engine = SearchEngine::open(&path, SearchConfig::default())?;

    assert_eq!(engine.search("Fürth")?.len(), 1);
    assert!(engine.search("Furth")?.is_empty());
    Ok(())
}

#[test]
fn test_multi_term_query_highlights_each_field() -> Result<()> {
    let (_dir, path) = imported()?;
    let engine = SearchEngine::open(&path, SearchConfig::default())?;

    let hits = engine.search("Königstraße 2 Nürnberg")?;
    assert_eq!(hits.len(), 1);
    let highlighted = &hits[0].highlighted;
    assert_eq!(highlighted.street, "<b>Königstraße</b>");
    assert_eq!(highlighted.house_number, "<b>2</b>");
    assert_eq!(highlighted.city, "<b>Nürnberg</b>");
    assert_eq!((hits[0].record.lon, hits[0].record.lat), (11.081, 49.441));
    Ok(())
}

#[test]
fn test_limit_and_ordering() -> Result<()> {
    let (_dir, path) = imported()?;
    let engine = SearchEngine::open(&path, SearchConfig::default().with_limit(2))?;

    let hits = engine.search("Nürnberg")?;
    assert_eq!(hits.len(), 2);
    assert!(hits[0].rank <= hits[1].rank);
    assert_eq!(engine.search_with_limit("Nürnberg", 10)?.len(), 3);
    Ok(())
}

#[test]
fn test_raw_expressions() -> Result<()> {
    let (_dir, path) = imported()?;
    let engine = SearchEngine::open(&path, SearchConfig::default())?;

    assert_eq!(engine.search_expression("Dorfstraße OR Fürth", 10)?.len(), 2);
    assert_eq!(engine.search_expression("König*", 10)?.len(), 2);

    let err = engine.search_expression("\"unterminated", 10).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Search));
    Ok(())
}

#[test]
fn test_hits_serialize_for_output() -> Result<()> {
    let (_dir, path) = imported()?;
    let engine = SearchEngine::open(&path, SearchConfig::default())?;

    let hits = engine.search("Dorfstraße")?;
    let value = serde_json::to_value(&hits).unwrap();
    assert_eq!(value[0]["record"]["city"], "Buch");
    assert_eq!(value[0]["record"]["house_number"], "");
    assert_eq!(value[0]["highlighted"]["street"], "<b>Dorfstraße</b>");
    Ok(())
}

#[test]
fn test_search_on_missing_store_fails() {
    let dir = Builder::new().prefix("test_search").tempdir().unwrap();
    let result = SearchEngine::open(dir.path().join("absent.db"), SearchConfig::default());
    assert!(result.is_err());
}
