//! Ranked full-text search over a finished store.
//!
//! The engine reads the FTS5 mirror built by the
//! [`IndexBuilder`](crate::index_builder::IndexBuilder), joins every match
//! back to the primary relation and returns hits ordered best first, with
//! matched tokens wrapped in the configured highlight markers.
//!
//! # Examples
//!
//! ```no_run
//! use geoaddress::config::SearchConfig;
//! use geoaddress::search::SearchEngine;
//!
//! let engine = SearchEngine::open("addresses.db", SearchConfig::default())?;
//! for hit in engine.search("Hauptstraße Berlin")? {
//!     println!("{} {} {}", hit.highlighted.street, hit.highlighted.house_number, hit.rank);
//! }
//! # Ok::<(), geoaddress::error::GeoAddressError>(())
//! ```

pub mod highlight;
pub mod query;

use std::path::Path;

use log::debug;
use rusqlite::{Row, params};
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::error::{Result, Stage, StageContext};
use crate::extract::AddressRecord;
use crate::search::highlight::HighlightConfig;
use crate::store::{AddressStore, schema};

/// Street, house number and city with matched tokens marked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightedAddress {
    pub street: String,
    pub house_number: String,
    pub city: String,
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Row identity shared by the primary relation and the mirror.
    pub id: i64,
    pub record: AddressRecord,
    pub highlighted: HighlightedAddress,
    /// FTS5 rank; lower is better.
    pub rank: f64,
}

impl SearchHit {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SearchHit {
            id: row.get(0)?,
            record: AddressRecord {
                street: row.get(1)?,
                house_number: row.get(2)?,
                city: row.get(3)?,
                lon: row.get(4)?,
                lat: row.get(5)?,
            },
            highlighted: HighlightedAddress {
                street: row.get(6)?,
                house_number: row.get(7)?,
                city: row.get(8)?,
            },
            rank: row.get(9)?,
        })
    }
}

/// Search engine over an imported address store.
pub struct SearchEngine {
    store: AddressStore,
    config: SearchConfig,
    highlight: HighlightConfig,
}

impl SearchEngine {
    /// Create an engine over an already opened store.
    pub fn new(store: AddressStore, config: SearchConfig) -> Result<Self> {
        config.validate().stage(Stage::Search)?;
        let highlight = HighlightConfig::from(&config);
        Ok(SearchEngine {
            store,
            config,
            highlight,
        })
    }

    /// Open the store at `path` and create an engine over it.
    pub fn open<P: AsRef<Path>>(path: P, config: SearchConfig) -> Result<Self> {
        let store = AddressStore::open(path)?;
        Self::new(store, config)
    }

    pub fn store(&self) -> &AddressStore {
        &self.store
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn highlight(&self) -> &HighlightConfig {
        &self.highlight
    }

    /// Search free text with the configured limit.
    pub fn search(&self, text: &str) -> Result<Vec<SearchHit>> {
        self.search_with_limit(text, self.config.limit)
    }

    /// Search free text, returning at most `limit` hits.
    ///
    /// Text without any searchable term yields no hits and does not touch
    /// the store.
    pub fn search_with_limit(&self, text: &str, limit: usize) -> Result<Vec<SearchHit>> {
        match query::match_expression(text) {
            Some(expression) => self.search_expression(&expression, limit),
            None => {
                debug!("Query {text:?} has no searchable terms");
                Ok(Vec::new())
            }
        }
    }

    /// Run a raw FTS5 match expression (prefix, `OR`, `NEAR`, column
    /// filters), returning at most `limit` hits.
    pub fn search_expression(&self, expression: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        debug!("Full-text query: {expression}");

        let conn = self.store.connection();
        let mut stmt = conn.prepare_cached(schema::SEARCH_SQL).stage(Stage::Search)?;
        let rows = stmt
            .query_map(
                params![
                    expression,
                    self.highlight.open,
                    self.highlight.close,
                    limit
                ],
                SearchHit::from_row,
            )
            .stage(Stage::Search)?;

        let mut hits = Vec::new();
        for row in rows {
            hits.push(row.stage(Stage::Search)?);
        }
        Ok(hits)
    }
}
