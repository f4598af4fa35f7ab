//! Error types for the geoaddress importer.
//!
//! All fatal failures are represented by [`GeoAddressError`]. Failures that
//! leave the import pipeline are tagged with the [`Stage`] that produced them,
//! so the final message always names the step that broke.
//!
//! Per-feature problems (malformed JSON, missing street, unusable geometry)
//! are *not* errors; they surface as explicit outcomes from the decoder and
//! the extractor and are counted in the import report.
//!
//! # Examples
//!
//! ```
//! use geoaddress::error::{GeoAddressError, Result, Stage, StageContext};
//!
//! fn open_something() -> Result<()> {
//!     Err(GeoAddressError::config("batch size must be positive"))
//! }
//!
//! let err = open_something().stage(Stage::OpenStore).unwrap_err();
//! assert!(err.to_string().starts_with("open store failed"));
//! ```

use std::fmt;
use std::io;

use thiserror::Error;

/// Pipeline step a fatal error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Opening the GeoJSON input.
    OpenInput,
    /// Opening or creating the SQLite store.
    OpenStore,
    /// Creating tables.
    Schema,
    /// Decoding and loading features in batched transactions.
    Load,
    /// Building indices and the full-text mirror.
    IndexBuild,
    /// Executing a search.
    Search,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::OpenInput => "open input",
            Stage::OpenStore => "open store",
            Stage::Schema => "schema",
            Stage::Load => "load",
            Stage::IndexBuild => "index build",
            Stage::Search => "search",
        };
        f.write_str(name)
    }
}

/// The main error type for geoaddress operations.
#[derive(Error, Debug)]
pub enum GeoAddressError {
    /// I/O errors (input file, store file removal)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON errors outside of per-feature decoding (config files, output)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite errors
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Structural problems with the input document
    #[error("Decode error: {0}")]
    Decode(String),

    /// Invalid configuration values
    #[error("Config error: {0}")]
    Config(String),

    /// Run stopped at a flush boundary on request
    #[error("Operation cancelled: {0}")]
    OperationCancelled(String),

    /// Error tagged with the pipeline stage it came from
    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<GeoAddressError>,
    },
}

/// Result type alias for operations that may fail with GeoAddressError.
pub type Result<T> = std::result::Result<T, GeoAddressError>;

impl GeoAddressError {
    /// Create a new decode error.
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        GeoAddressError::Decode(msg.into())
    }

    /// Create a new config error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        GeoAddressError::Config(msg.into())
    }

    /// Create a new cancellation error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        GeoAddressError::OperationCancelled(msg.into())
    }

    /// Wrap this error with the stage it came from.
    ///
    /// Already tagged errors keep their innermost stage.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            tagged @ GeoAddressError::Stage { .. } => tagged,
            other => GeoAddressError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error is tagged with, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            GeoAddressError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Whether the error is transient store contention (busy or locked).
    pub fn is_busy(&self) -> bool {
        match self {
            GeoAddressError::Store(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            GeoAddressError::Stage { source, .. } => source.is_busy(),
            _ => false,
        }
    }

    /// Whether the error is a cancellation request rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        match self {
            GeoAddressError::OperationCancelled(_) => true,
            GeoAddressError::Stage { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// Attach a [`Stage`] to the error side of a result.
pub trait StageContext<T> {
    /// Tag the error, if any, with `stage`.
    fn stage(self, stage: Stage) -> Result<T>;
}

impl<T, E> StageContext<T> for std::result::Result<T, E>
where
    E: Into<GeoAddressError>,
{
    fn stage(self, stage: Stage) -> Result<T> {
        self.map_err(|e| e.into().in_stage(stage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_message_names_stage() {
        let err = GeoAddressError::config("bad").in_stage(Stage::Schema);
        assert_eq!(err.to_string(), "schema failed: Config error: bad");
        assert_eq!(err.stage(), Some(Stage::Schema));
    }

    #[test]
    fn test_innermost_stage_wins() {
        let err = GeoAddressError::decode("eof")
            .in_stage(Stage::Load)
            .in_stage(Stage::IndexBuild);
        assert_eq!(err.stage(), Some(Stage::Load));
    }

    #[test]
    fn test_busy_detection() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        let err = GeoAddressError::from(busy).in_stage(Stage::Load);
        assert!(err.is_busy());
        assert!(!GeoAddressError::config("x").is_busy());
    }

    #[test]
    fn test_io_error_conversion() {
        let result: std::result::Result<(), io::Error> =
            Err(io::Error::new(io::ErrorKind::NotFound, "missing"));
        let err = result.stage(Stage::OpenInput).unwrap_err();
        assert!(matches!(
            err,
            GeoAddressError::Stage {
                stage: Stage::OpenInput,
                ..
            }
        ));
    }
}
