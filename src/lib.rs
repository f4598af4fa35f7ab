//! # geoaddress
//!
//! Streaming import of GeoJSON address points into a searchable SQLite store.
//!
//! ## Features
//!
//! - Constant-memory decoding of arbitrarily large feature collections
//! - Street, house number and city extraction with a fixed representative vertex
//! - Size- and time-windowed transactions with natural-key deduplication
//! - FTS5 full-text mirror built once after loading
//! - Ranked search with per-field highlighting
//!
//! ## Example
//!
//! ```no_run
//! use geoaddress::prelude::*;
//!
//! let config = ImportConfig::for_input("filtered.geojson");
//! let report = Importer::new(&config).run()?;
//! println!("{} addresses imported", report.rows_inserted());
//!
//! let engine = SearchEngine::open(&config.store_path, SearchConfig::default())?;
//! for hit in engine.search("Hauptstraße Berlin")? {
//!     println!("{} {}", hit.highlighted.street, hit.record.city);
//! }
//! # Ok::<(), GeoAddressError>(())
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod geojson;
pub mod index_builder;
pub mod loader;
pub mod pipeline;
pub mod search;
pub mod store;

pub mod prelude {
    pub use crate::config::{
        BatchConfig, ExtractorConfig, ImportConfig, RetryConfig, SearchConfig,
    };
    pub use crate::error::{GeoAddressError, Result, Stage};
    pub use crate::extract::{AddressExtractor, AddressRecord, ExclusionReason, Extraction};
    pub use crate::geojson::{DecodedFeature, FeatureStream};
    pub use crate::pipeline::{ImportReport, Importer};
    pub use crate::search::{SearchEngine, SearchHit};
    pub use crate::store::AddressStore;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
