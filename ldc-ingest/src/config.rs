//! Pipeline configuration for ldc-ingest
//!
//! Every tunable of the pipeline lives in [`PipelineConfig`], which is passed explicitly into
//! the orchestrator. Values come from (highest priority first) CLI flags, environment, the
//! TOML file, and the built-in defaults below.
//!
//! ```toml
//! root_folder = "/srv/corpus"
//! concurrency = 4
//!
//! [selection]
//! max_entries = 20
//! mode = "head"
//!
//! [acquisition]
//! per_entry_limit = 2
//! max_duration_seconds = 300
//! ```

use ldc_common::config::{load_toml_config, resolve_config_path, resolve_root_folder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::PipelineError;
use crate::utils::retry::RetryPolicy;

/// Catalog page of Indonesian regional songs
pub const DEFAULT_CATALOG_URL: &str = "https://www.zonareferensi.com/lagu-daerah-indonesia/";

/// Pipeline stage, in execution order
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Catalog table (scraped once, then reused)
    Catalog,
    /// Search + download
    Acquire,
    /// Conversion to canonical WAV
    Transcode,
    /// Fixed-window segmentation
    Segment,
    /// MFCC feature extraction
    Extract,
}

impl Stage {
    /// All stages in execution order
    pub const ALL: [Stage; 5] = [
        Stage::Catalog,
        Stage::Acquire,
        Stage::Transcode,
        Stage::Segment,
        Stage::Extract,
    ];
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Catalog => "catalog",
            Stage::Acquire => "acquire",
            Stage::Transcode => "transcode",
            Stage::Segment => "segment",
            Stage::Extract => "extract",
        };
        f.write_str(name)
    }
}

/// How catalog entries are chosen when the catalog exceeds `max_entries`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// First `max_entries` rows
    Head,
    /// Random `max_entries` rows (seeded when `seed` is set), kept in catalog order
    Sample,
}

/// Which key deduplicates acquired tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKey {
    /// normalize(source title); distinct entries whose hits share a title collapse
    SourceTitle,
    /// normalize(catalog title + region + source URL); no cross-entry collapse
    EntryAndUrl,
}

/// Which search index resolves catalog entries to candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SearchBackend {
    /// `yt-dlp "ytsearchN:query"`, no service needed
    YtDlp,
    /// JSON endpoint at `search.search_url`
    Http,
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Working root for the local blob store (resolved, see [`PipelineConfig::load`])
    pub root_folder: Option<PathBuf>,
    /// Maximum rows processed concurrently within a stage
    pub concurrency: usize,
    /// Stages recomputed even when their table already exists
    pub force: BTreeSet<Stage>,
    pub catalog: CatalogConfig,
    pub selection: SelectionConfig,
    pub search: SearchConfig,
    pub acquisition: AcquisitionConfig,
    pub transcode: TranscodeConfig,
    pub segments: SegmentConfig,
    pub features: FeatureConfig,
    pub retry: RetryConfig,
    pub logging: LoggingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            concurrency: 4,
            force: BTreeSet::new(),
            catalog: CatalogConfig::default(),
            selection: SelectionConfig::default(),
            search: SearchConfig::default(),
            acquisition: AcquisitionConfig::default(),
            transcode: TranscodeConfig::default(),
            segments: SegmentConfig::default(),
            features: FeatureConfig::default(),
            retry: RetryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Catalog source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Page scraped when no catalog table exists yet
    pub url: String,
    /// HTTP timeout for the catalog page
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_CATALOG_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Catalog entry selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Maximum catalog entries per run (`None` = whole catalog)
    pub max_entries: Option<usize>,
    pub mode: SelectionMode,
    /// Seed for [`SelectionMode::Sample`]; unseeded sampling differs per run
    pub seed: Option<u64>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_entries: Some(5),
            mode: SelectionMode::Sample,
            seed: None,
        }
    }
}

/// Search index settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub backend: SearchBackend,
    /// JSON search endpoint (`GET {search_url}?q=...&max_results=N`), `http` backend only
    pub search_url: String,
    /// Prefix joined onto relative `url_suffix` results
    pub media_base_url: String,
    /// Candidates considered per catalog entry
    pub max_results: usize,
    /// Search requests per second (rate limit)
    pub requests_per_second: u32,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: SearchBackend::YtDlp,
            search_url: String::new(),
            media_base_url: "https://www.youtube.com".to_string(),
            max_results: 5,
            requests_per_second: 2,
            timeout_secs: 20,
        }
    }
}

/// Download settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Successful acquisitions per catalog entry before remaining candidates are ignored
    pub per_entry_limit: usize,
    /// Candidates at or above this duration are skipped without download
    pub max_duration_seconds: u64,
    pub identity_key: IdentityKey,
    /// `yt-dlp` executable, used for audio-only streams and by the `yt_dlp` search backend
    pub yt_dlp_path: String,
    /// Bound on stream resolution + download of one candidate
    pub timeout_secs: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            per_entry_limit: 5,
            max_duration_seconds: 300,
            identity_key: IdentityKey::SourceTitle,
            yt_dlp_path: "yt-dlp".to_string(),
            timeout_secs: 300,
        }
    }
}

/// External converter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    pub ffmpeg_path: String,
    pub timeout_secs: u64,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Segmentation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Window length in whole seconds
    pub window_seconds: u32,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self { window_seconds: 30 }
    }
}

/// MFCC analysis settings (defaults match librosa)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Cepstral coefficients per frame (= feature vector length)
    pub n_mfcc: usize,
    /// Analysis sample rate; segments are resampled to it
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    /// Bound on decode + analysis of one segment
    pub timeout_secs: u64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            n_mfcc: 13,
            sample_rate: 22_050,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            timeout_secs: 60,
        }
    }
}

/// Retry settings for transient network failures
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` takes precedence
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from the resolved TOML file (or defaults) and resolve the root
    ///
    /// `config_arg` and `root_arg` are the CLI values, which win over environment and file.
    pub fn load(config_arg: Option<&Path>, root_arg: Option<&Path>) -> Result<Self, PipelineError> {
        let config_path = resolve_config_path(config_arg).map_err(|e| PipelineError::Config(e.to_string()))?;
        if let Some(path) = &config_path {
            tracing::info!(path = %path.display(), "Loading configuration file");
        }

        let mut config: PipelineConfig = load_toml_config(config_path.as_deref())
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        config.root_folder = Some(resolve_root_folder(root_arg, config.root_folder.as_deref()));
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make a stage meaningless
    pub fn validate(&self) -> Result<(), PipelineError> {
        let checks: [(bool, &str); 9] = [
            (self.concurrency == 0, "concurrency must be at least 1"),
            (
                self.search.backend == SearchBackend::Http && self.search.search_url.trim().is_empty(),
                "search.search_url is required for the http search backend",
            ),
            (self.search.max_results == 0, "search.max_results must be at least 1"),
            (self.search.requests_per_second == 0, "search.requests_per_second must be at least 1"),
            (self.acquisition.per_entry_limit == 0, "acquisition.per_entry_limit must be at least 1"),
            (self.segments.window_seconds == 0, "segments.window_seconds must be at least 1"),
            (self.features.n_mfcc == 0, "features.n_mfcc must be at least 1"),
            (
                self.features.n_mfcc > self.features.n_mels,
                "features.n_mfcc cannot exceed features.n_mels",
            ),
            (
                self.features.hop_length == 0 || self.features.n_fft < 2 || self.features.sample_rate == 0,
                "features.n_fft, hop_length and sample_rate must be positive",
            ),
        ];

        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, message)) => Err(PipelineError::Config(message.to_string())),
            None => Ok(()),
        }
    }

    /// Whether `stage` must be recomputed even if its table exists
    pub fn is_forced(&self, stage: Stage) -> bool {
        self.force.contains(&stage)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search.timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.acquisition.timeout_secs)
    }

    pub fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode.timeout_secs)
    }

    pub fn feature_timeout(&self) -> Duration {
        Duration::from_secs(self.features.timeout_secs)
    }
}
