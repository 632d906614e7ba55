//! Error types for ldc-ingest
//!
//! Two severities:
//! - [`StageError`]: scoped to one row (candidate, track, segment). Logged, row skipped,
//!   batch continues.
//! - [`PipelineError`]: aborts the run (nothing to process, or nowhere to persist results).

use ldc_common::MalformedDurationError;
use thiserror::Error;

/// Row-scoped failure; never aborts the batch
#[derive(Debug, Error)]
pub enum StageError {
    /// Candidate duration text could not be parsed
    #[error(transparent)]
    MalformedDuration(#[from] MalformedDurationError),

    /// Search, stream resolution or download failed for one candidate
    #[error("Acquisition failed: {0}")]
    Acquisition(String),

    /// External converter failed or produced no output
    #[error("Transcode failed: {0}")]
    Transcode(String),

    /// Media could not be decoded (corrupt, empty, unsupported)
    #[error("Decode failed: {0}")]
    Decode(String),
}

/// Run-level failure
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Neither a persisted catalog table nor the catalog collaborator produced entries
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// Storage backend failed; results cannot be persisted
    #[error("Storage unavailable: {0}")]
    Storage(#[from] ldc_common::Error),

    /// A persisted stage table exists but cannot be parsed
    #[error("Table {key} is unreadable: {reason}")]
    CorruptTable { key: String, reason: String },

    /// Configuration rejected before the run started
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Run cancelled via cancellation token
    #[error("Run cancelled")]
    Cancelled,
}

/// Result type for run-level operations
pub type PipelineResult<T> = Result<T, PipelineError>;
