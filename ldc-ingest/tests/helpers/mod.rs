//! Test Helper Utilities
//!
//! Shared utilities for testing ldc-ingest
#![allow(dead_code)]

pub mod audio_generator;
pub mod fakes;

use ldc_ingest::config::{RetryConfig, SelectionMode};
use ldc_ingest::PipelineConfig;

// Re-export commonly used items
pub use audio_generator::{generate_wav_bytes, wav_seconds, AudioConfig};
pub use fakes::{FakeCatalogSource, FakeConverter, FakeMediaSource, FakeSearchIndex};

/// Configuration for fast in-memory runs: whole catalog, head selection, 2 s windows,
/// millisecond retries, no effective rate limit
pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.selection.max_entries = None;
    config.selection.mode = SelectionMode::Head;
    config.search.requests_per_second = 1000;
    config.segments.window_seconds = 2;
    config.retry = RetryConfig {
        max_attempts: 2,
        initial_backoff_ms: 1,
        max_backoff_ms: 2,
    };
    config
}
