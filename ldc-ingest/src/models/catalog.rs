//! Catalog entries and search candidates

use serde::{Deserialize, Serialize};

/// One row of the input song list
///
/// Identity is the (title, region) pair. Scraped titles use `_` between words.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub title: String,
    pub region: String,
}

impl CatalogEntry {
    pub fn new(title: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            region: region.into(),
        }
    }

    /// Search query for this entry: title and region as plain words
    pub fn query(&self) -> String {
        format!("{} {}", self.title, self.region)
            .replace('_', " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One external search result considered as a source for a catalog entry
///
/// Ephemeral: lives only between resolution and acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCandidate {
    pub title: String,
    /// Duration as reported by the index (`"4:05"`, `"1.02.03"`, `"LIVE"`, ...)
    pub raw_duration: String,
    pub url: String,
}

impl SearchCandidate {
    pub fn new(title: impl Into<String>, raw_duration: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            raw_duration: raw_duration.into(),
            url: url.into(),
        }
    }
}
