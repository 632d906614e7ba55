//! In-process collaborators
//!
//! Each fake counts its calls so tests can assert that cached work is not repeated.

use async_trait::async_trait;
use ldc_ingest::models::{CatalogEntry, SearchCandidate};
use ldc_ingest::services::{
    AudioConverter, CatalogError, CatalogSource, ConvertError, MediaError, MediaSource,
    SearchError, SearchIndex,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Catalog
// ============================================================================

pub struct FakeCatalogSource {
    entries: Option<Vec<CatalogEntry>>,
    calls: AtomicUsize,
}

impl FakeCatalogSource {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries: Some(entries),
            calls: AtomicUsize::new(0),
        }
    }

    /// Catalog page that cannot be fetched
    pub fn unavailable() -> Self {
        Self {
            entries: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for FakeCatalogSource {
    async fn load(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entries
            .clone()
            .ok_or_else(|| CatalogError::NetworkError("connection refused".to_string()))
    }
}

// ============================================================================
// Search index
// ============================================================================

#[derive(Default)]
pub struct FakeSearchIndex {
    results: HashMap<String, Vec<SearchCandidate>>,
    delays: HashMap<String, Duration>,
    /// Remaining transient failures per query
    failures: Mutex<HashMap<String, usize>>,
    calls: AtomicUsize,
}

impl FakeSearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results for the query of `entry`, returned regardless of the requested maximum
    pub fn with_results(mut self, entry: &CatalogEntry, candidates: Vec<SearchCandidate>) -> Self {
        self.results.insert(entry.query(), candidates);
        self
    }

    pub fn with_delay(mut self, entry: &CatalogEntry, delay: Duration) -> Self {
        self.delays.insert(entry.query(), delay);
        self
    }

    /// Fail the first `count` searches for `entry` with a timeout
    pub fn with_transient_failures(self, entry: &CatalogEntry, count: usize) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(entry.query(), count);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchIndex for FakeSearchIndex {
    async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<SearchCandidate>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(query) {
            tokio::time::sleep(*delay).await;
        }

        {
            let mut failures = self.failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(query) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(SearchError::Timeout);
                }
            }
        }

        Ok(self.results.get(query).cloned().unwrap_or_default())
    }
}

// ============================================================================
// Media source
// ============================================================================

#[derive(Default)]
pub struct FakeMediaSource {
    payloads: HashMap<String, Vec<u8>>,
    downloads: AtomicUsize,
    per_url: Mutex<HashMap<String, usize>>,
}

impl FakeMediaSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for `url`; any other URL is unavailable
    pub fn with_payload(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.payloads.insert(url.to_string(), bytes);
        self
    }

    /// Successful and failed fetches
    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn downloads_of(&self, url: &str) -> usize {
        self.per_url.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl MediaSource for FakeMediaSource {
    async fn fetch_audio(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        *self.per_url.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;

        self.payloads
            .get(url)
            .cloned()
            .ok_or_else(|| MediaError::ResolveFailed(format!("video unavailable: {}", url)))
    }
}

// ============================================================================
// Converter
// ============================================================================

/// Behaviour of [`FakeConverter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterMode {
    /// Copy the (already WAV) input to the output
    Copy,
    /// Exit with an error
    Fail,
    /// Exit cleanly without writing output
    NoOutput,
}

pub struct FakeConverter {
    mode: ConverterMode,
    invocations: AtomicUsize,
}

impl FakeConverter {
    pub fn new() -> Self {
        Self::with_mode(ConverterMode::Copy)
    }

    pub fn with_mode(mode: ConverterMode) -> Self {
        Self {
            mode,
            invocations: AtomicUsize::new(0),
        }
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

impl Default for FakeConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioConverter for FakeConverter {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            ConverterMode::Copy => {
                tokio::fs::copy(input, output)
                    .await
                    .map_err(|e| ConvertError::ExecutionError(e.to_string()))?;
                Ok(())
            }
            ConverterMode::Fail => Err(ConvertError::ConversionFailed(
                "Exit code: Some(1), stderr: Invalid data found when processing input".to_string(),
            )),
            ConverterMode::NoOutput => Ok(()),
        }
    }
}
