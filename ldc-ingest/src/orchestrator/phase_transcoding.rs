//! TRANSCODE phase
//!
//! Canonical WAV for every acquired row. Rows without a stored file are excluded; rows whose
//! conversion fails are dropped from the canonical table.

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use super::Orchestrator;
use crate::config::Stage;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{AcquiredTrack, CanonicalAudio, RunReport};
use crate::tables;

impl Orchestrator {
    /// TRANSCODE - successful conversions only, acquisition order
    pub(super) async fn phase_transcoding(
        &self,
        tracks: &[AcquiredTrack],
        report: &mut RunReport,
        upstream_recomputed: &mut bool,
        cancel: &CancellationToken,
    ) -> PipelineResult<Vec<CanonicalAudio>> {
        let acquired: Vec<&AcquiredTrack> = tracks.iter().filter(|t| t.is_acquired()).collect();
        tracing::info!(tracks = acquired.len(), "Phase: TRANSCODE");

        if self
            .can_resume(Stage::Transcode, tables::CANONICAL_TABLE, *upstream_recomputed)
            .await?
        {
            report.mark_resumed(Stage::Transcode);
            let canonical = tables::read_canonical(self.store.as_ref()).await?;
            report.transcoded = canonical.len();
            return Ok(canonical);
        }

        let results: Vec<Option<CanonicalAudio>> = stream::iter(acquired)
            .map(|track| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                self.transcoder.transcode(track).await
            })
            .buffered(self.config.concurrency)
            .collect()
            .await;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let attempted = results.len();
        let canonical: Vec<CanonicalAudio> = results.into_iter().flatten().collect();
        report.transcoded = canonical.len();
        report.transcode_failures = attempted - canonical.len();

        tables::write_canonical(self.store.as_ref(), &canonical).await?;
        *upstream_recomputed = true;

        tracing::info!(
            transcoded = report.transcoded,
            failures = report.transcode_failures,
            "TRANSCODE complete"
        );

        Ok(canonical)
    }
}
