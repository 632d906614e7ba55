//! ACQUIRE phase
//!
//! Per selected entry: one search, then downloads up to the per-entry limit. Entries are
//! processed with bounded concurrency; `buffered` keeps results in catalog order.

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use super::Orchestrator;
use crate::config::Stage;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{AcquiredTrack, CatalogEntry, RunReport};
use crate::services::AcquisitionOutcome;
use crate::tables;

impl Orchestrator {
    /// ACQUIRE - acquisition rows for all selected entries (failures included, no path)
    pub(super) async fn phase_acquiring(
        &self,
        entries: &[CatalogEntry],
        report: &mut RunReport,
        upstream_recomputed: &mut bool,
        cancel: &CancellationToken,
    ) -> PipelineResult<Vec<AcquiredTrack>> {
        tracing::info!(entries = entries.len(), "Phase: ACQUIRE");

        if self
            .can_resume(Stage::Acquire, tables::ACQUISITION_TABLE, *upstream_recomputed)
            .await?
        {
            report.mark_resumed(Stage::Acquire);
            let tracks = tables::read_acquisitions(self.store.as_ref()).await?;
            report.acquisition.cache_hits = tracks.iter().filter(|t| t.is_acquired()).count();
            report.acquisition.failures = tracks.len() - report.acquisition.cache_hits;
            return Ok(tracks);
        }

        let search_failures_before = self.resolver.failures();
        let results: Vec<Option<AcquisitionOutcome>> = stream::iter(entries)
            .map(|entry| self.acquire_entry(entry, cancel))
            .buffered(self.config.concurrency)
            .collect()
            .await;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        report.search_failures = self.resolver.failures() - search_failures_before;
        let mut tracks = Vec::new();
        for outcome in results.into_iter().flatten() {
            report.acquisition.merge(&outcome.stats);
            tracks.extend(outcome.tracks);
        }

        tables::write_acquisitions(self.store.as_ref(), &tracks).await?;
        *upstream_recomputed = true;

        tracing::info!(
            downloaded = report.acquisition.downloaded,
            cache_hits = report.acquisition.cache_hits,
            too_long = report.acquisition.too_long,
            malformed = report.acquisition.malformed_durations,
            failures = report.acquisition.failures,
            search_failures = report.search_failures,
            "ACQUIRE complete"
        );

        Ok(tracks)
    }

    async fn acquire_entry(&self, entry: &CatalogEntry, cancel: &CancellationToken) -> Option<AcquisitionOutcome> {
        if cancel.is_cancelled() {
            return None;
        }

        let candidates = self
            .resolver
            .resolve(entry, self.config.search.max_results)
            .await;

        let outcome = self
            .acquirer
            .acquire(
                entry,
                &candidates,
                self.config.acquisition.per_entry_limit,
                self.config.acquisition.max_duration_seconds,
            )
            .await;

        Some(outcome)
    }
}
