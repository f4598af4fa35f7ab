//! Highlight markers for search hits.
//!
//! FTS5 `highlight()` wraps every matched token in the marker pair bound
//! into the search statement.

use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;

/// Marker pair placed around matched tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightConfig {
    pub open: String,
    pub close: String,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        HighlightConfig::from(&SearchConfig::default())
    }
}

impl HighlightConfig {
    pub fn new<S: Into<String>>(open: S, close: S) -> Self {
        HighlightConfig {
            open: open.into(),
            close: close.into(),
        }
    }
}

impl From<&SearchConfig> for HighlightConfig {
    fn from(config: &SearchConfig) -> Self {
        HighlightConfig::new(config.highlight_open.as_str(), config.highlight_close.as_str())
    }
}
