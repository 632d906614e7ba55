//! Pipeline orchestrator
//!
//! # Stage Progression
//! CATALOG → ACQUIRE → TRANSCODE → SEGMENT → EXTRACT
//!
//! Each stage is handled by a dedicated `phase_*` method and persists its table before the
//! next stage starts:
//!
//! - **CATALOG**: persisted catalog table, else scrape and persist (`data/catalog.csv`)
//! - **ACQUIRE**: search + download per selected entry (`data/results.csv`)
//! - **TRANSCODE**: canonical WAV per acquired track (`data/results_wav.csv`)
//! - **SEGMENT**: fixed windows per canonical track (`data/segments.csv`)
//! - **EXTRACT**: mean MFCC per segment (`data/features.csv`)
//!
//! # Resume
//! A stage whose table exists is read back instead of recomputed, unless it is forced or an
//! upstream stage was recomputed in this run. Recomputed stages still reuse every stored
//! per-row artifact, so repeating a stage never repeats downloads or conversions.

use chrono::Utc;
use ldc_common::BlobStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{PipelineConfig, Stage};
use crate::error::{PipelineError, PipelineResult};
use crate::models::RunReport;
use crate::services::{
    AudioConverter, CandidateResolver, CatalogSource, FeatureExtractor, MediaAcquirer,
    MediaSource, MfccParams, SearchIndex, Segmenter, Transcoder,
};
use crate::tables;
use crate::utils::identity_locks::IdentityLocks;

mod phase_acquiring;
mod phase_catalog;
mod phase_extracting;
mod phase_segmenting;
mod phase_transcoding;

pub use phase_catalog::select_entries;

/// External systems the pipeline talks to
#[derive(Clone)]
pub struct Collaborators {
    /// Used only when no catalog table has been persisted yet (or the stage is forced)
    pub catalog_source: Arc<dyn CatalogSource>,
    pub search_index: Arc<dyn SearchIndex>,
    pub media_source: Arc<dyn MediaSource>,
    pub converter: Arc<dyn AudioConverter>,
}

/// Drives all stages against one blob store
pub struct Orchestrator {
    config: PipelineConfig,
    store: Arc<dyn BlobStore>,
    catalog_source: Arc<dyn CatalogSource>,
    resolver: CandidateResolver,
    acquirer: MediaAcquirer,
    transcoder: Transcoder,
    segmenter: Segmenter,
    extractor: FeatureExtractor,
}

impl Orchestrator {
    /// Build the stage services from `config`
    ///
    /// # Errors
    /// [`PipelineError::Config`] if the configuration fails validation.
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn BlobStore>,
        collaborators: Collaborators,
    ) -> PipelineResult<Self> {
        config.validate()?;

        // Shared by all stages so racing rows on one identity never interleave writes
        let locks = IdentityLocks::new();
        let retry = config.retry.policy();

        let resolver = CandidateResolver::new(
            collaborators.search_index,
            config.search.requests_per_second,
            config.search_timeout(),
            retry.clone(),
        );
        let acquirer = MediaAcquirer::new(
            store.clone(),
            collaborators.media_source,
            locks.clone(),
            config.acquisition.identity_key,
            config.download_timeout(),
            retry,
        );
        let transcoder = Transcoder::new(
            store.clone(),
            collaborators.converter,
            locks.clone(),
            config.transcode_timeout(),
        );
        let segmenter = Segmenter::new(store.clone(), locks);
        let extractor = FeatureExtractor::new(
            store.clone(),
            MfccParams::from(&config.features),
            config.feature_timeout(),
        );

        Ok(Self {
            catalog_source: collaborators.catalog_source,
            config,
            store,
            resolver,
            acquirer,
            transcoder,
            segmenter,
            extractor,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage, returning the run's counters
    ///
    /// # Errors
    /// Fatal conditions only: catalog unavailable, storage failure, unreadable table,
    /// cancellation. Per-row failures are logged and counted in the report.
    pub async fn run(&self, cancel: &CancellationToken) -> PipelineResult<RunReport> {
        let mut report = RunReport {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        self.store.ensure_ready().await?;
        tracing::info!(
            store = %self.store.location(""),
            concurrency = self.config.concurrency,
            "Pipeline starting"
        );

        let mut upstream_recomputed = false;

        let catalog = self
            .phase_catalog(&mut report, &mut upstream_recomputed)
            .await?;
        check_cancelled(cancel)?;

        let selected = select_entries(&catalog, &self.config.selection);
        report.selected_entries = selected.len();
        tracing::info!(
            catalog_entries = catalog.len(),
            selected = selected.len(),
            mode = ?self.config.selection.mode,
            "Catalog entries selected"
        );

        let tracks = self
            .phase_acquiring(&selected, &mut report, &mut upstream_recomputed, cancel)
            .await?;
        check_cancelled(cancel)?;

        let canonical = self
            .phase_transcoding(&tracks, &mut report, &mut upstream_recomputed, cancel)
            .await?;
        check_cancelled(cancel)?;

        let segments = self
            .phase_segmenting(&canonical, &mut report, &mut upstream_recomputed, cancel)
            .await?;
        check_cancelled(cancel)?;

        self.phase_extracting(&segments, &mut report, &mut upstream_recomputed, cancel)
            .await?;

        report.finished_at = Some(Utc::now());
        self.write_report(&report).await?;

        tracing::info!(
            selected = report.selected_entries,
            acquired = report.acquisition.successes(),
            transcoded = report.transcoded,
            segments = report.segments,
            features = report.features,
            resumed = ?report.resumed_stages,
            elapsed_seconds = report.elapsed_seconds().unwrap_or_default(),
            "Pipeline complete"
        );

        Ok(report)
    }

    /// Whether `stage` can be read back from `table` instead of recomputed
    async fn can_resume(&self, stage: Stage, table: &str, upstream_recomputed: bool) -> PipelineResult<bool> {
        if self.config.is_forced(stage) {
            tracing::info!(stage = %stage, "Stage forced, recomputing");
            return Ok(false);
        }
        if upstream_recomputed {
            return Ok(false);
        }
        tables::table_exists(self.store.as_ref(), table).await
    }

    async fn write_report(&self, report: &RunReport) -> PipelineResult<()> {
        let json = serde_json::to_vec_pretty(report)
            .map_err(|e| PipelineError::Storage(ldc_common::Error::Encoding(e.to_string())))?;
        self.store.write(tables::RUN_REPORT, &json).await?;
        Ok(())
    }
}

fn check_cancelled(cancel: &CancellationToken) -> PipelineResult<()> {
    if cancel.is_cancelled() {
        tracing::warn!("Cancellation requested, stopping before next stage");
        return Err(PipelineError::Cancelled);
    }
    Ok(())
}
