//! ldc-ingest - Regional folk-song corpus builder
//!
//! Scrapes (once) the regional song catalog, searches and downloads candidate recordings,
//! converts them to WAV, cuts fixed windows and writes mean-MFCC feature vectors. Every
//! stage persists a table under the root folder and is skipped on the next run.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use ldc_common::{BlobStore, LocalStore};
use ldc_ingest::config::{SearchBackend, SelectionMode};
use ldc_ingest::services::{
    FfmpegConverter, HtmlCatalogSource, HttpSearchIndex, SearchIndex, YtDlpSearchIndex, YtDlpSource,
};
use ldc_ingest::{Collaborators, Orchestrator, PipelineConfig, Stage};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Command-line arguments for ldc-ingest
#[derive(Parser, Debug)]
#[command(name = "ldc-ingest")]
#[command(about = "Build the regional folk-song feature corpus")]
#[command(version)]
struct Args {
    /// Working root for songs, segments and tables (env: LDC_ROOT_FOLDER)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// TOML configuration file (env: LDC_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Catalog entries processed this run
    #[arg(long, conflicts_with = "all_entries")]
    max_entries: Option<usize>,

    /// Process the whole catalog
    #[arg(long)]
    all_entries: bool,

    /// How entries are chosen when the catalog is larger than --max-entries
    #[arg(long, value_enum)]
    selection: Option<SelectionMode>,

    /// Seed for sampled selection
    #[arg(long)]
    seed: Option<u64>,

    /// Search results considered per entry
    #[arg(long)]
    max_results: Option<usize>,

    /// Downloads kept per entry
    #[arg(long)]
    per_entry_limit: Option<usize>,

    /// Candidates this long or longer are skipped
    #[arg(long)]
    max_duration_seconds: Option<u64>,

    /// Segment length
    #[arg(long)]
    window_seconds: Option<u32>,

    /// Coefficients per feature vector
    #[arg(long)]
    n_mfcc: Option<usize>,

    /// Rows processed concurrently per stage
    #[arg(long)]
    concurrency: Option<usize>,

    /// Recompute a stage even if its table exists (repeatable)
    #[arg(long, value_enum)]
    force: Vec<Stage>,

    /// Search index used to find candidates
    #[arg(long, value_enum)]
    search_backend: Option<SearchBackend>,

    /// JSON search endpoint URL (http backend)
    #[arg(long)]
    search_url: Option<String>,

    /// Catalog page URL
    #[arg(long)]
    catalog_url: Option<String>,
}

impl Args {
    /// CLI values override file/default configuration
    fn apply(&self, config: &mut PipelineConfig) {
        if self.all_entries {
            config.selection.max_entries = None;
        } else if let Some(max_entries) = self.max_entries {
            config.selection.max_entries = Some(max_entries);
        }
        if let Some(mode) = self.selection {
            config.selection.mode = mode;
        }
        if self.seed.is_some() {
            config.selection.seed = self.seed;
        }
        if let Some(max_results) = self.max_results {
            config.search.max_results = max_results;
        }
        if let Some(limit) = self.per_entry_limit {
            config.acquisition.per_entry_limit = limit;
        }
        if let Some(max_duration) = self.max_duration_seconds {
            config.acquisition.max_duration_seconds = max_duration;
        }
        if let Some(window) = self.window_seconds {
            config.segments.window_seconds = window;
        }
        if let Some(n_mfcc) = self.n_mfcc {
            config.features.n_mfcc = n_mfcc;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        config.force.extend(self.force.iter().copied());
        if let Some(backend) = self.search_backend {
            config.search.backend = backend;
        }
        if let Some(url) = &self.search_url {
            config.search.search_url = url.clone();
        }
        if let Some(url) = &self.catalog_url {
            config.catalog.url = url.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = PipelineConfig::load(args.config.as_deref(), args.root_folder.as_deref())
        .context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("Starting ldc-ingest v{}", env!("CARGO_PKG_VERSION"));

    let root_folder = config
        .root_folder
        .clone()
        .context("Root folder could not be resolved")?;
    info!("Root folder: {}", root_folder.display());

    let store: Arc<dyn BlobStore> = Arc::new(LocalStore::new(root_folder));

    let media_source = YtDlpSource::new(&config.acquisition.yt_dlp_path, config.download_timeout())
        .context("Failed to build media source")?;
    if let Err(e) = media_source.check_available().await {
        warn!("{} - downloads will fail until it is installed", e);
    }

    let converter = FfmpegConverter::new(&config.transcode.ffmpeg_path);
    if let Err(e) = converter.check_available().await {
        warn!("{} - transcoding will fail until it is installed", e);
    }

    let search_index: Arc<dyn SearchIndex> = match config.search.backend {
        SearchBackend::YtDlp => Arc::new(YtDlpSearchIndex::new(
            &config.acquisition.yt_dlp_path,
            &config.search.media_base_url,
        )),
        SearchBackend::Http => Arc::new(
            HttpSearchIndex::new(
                &config.search.search_url,
                &config.search.media_base_url,
                config.search_timeout(),
            )
            .context("Failed to build search client")?,
        ),
    };
    info!("Search backend: {:?}", config.search.backend);

    let collaborators = Collaborators {
        catalog_source: Arc::new(
            HtmlCatalogSource::new(
                &config.catalog.url,
                Duration::from_secs(config.catalog.timeout_secs),
            )
            .context("Failed to build catalog client")?,
        ),
        search_index,
        media_source: Arc::new(media_source),
        converter: Arc::new(converter),
    };

    let orchestrator =
        Orchestrator::new(config, store, collaborators).context("Failed to build pipeline")?;

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let report = orchestrator.run(&cancel).await.context("Pipeline failed")?;

    info!(
        "Done: {} entries, {} tracks acquired ({} downloaded, {} reused), {} transcoded, {} segments, {} feature vectors",
        report.selected_entries,
        report.acquisition.successes(),
        report.acquisition.downloaded,
        report.acquisition.cache_hits,
        report.transcoded,
        report.segments,
        report.features
    );

    Ok(())
}

/// Cancel the run on Ctrl+C; rows already in flight finish, no new rows start
async fn shutdown_signal(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("Ctrl+C received, stopping after in-flight rows");
            cancel.cancel();
        }
        Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
    }
}
