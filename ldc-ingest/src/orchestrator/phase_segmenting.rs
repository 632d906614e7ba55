//! SEGMENT phase
//!
//! Fixed windows for every canonical track. Tracks shorter than one window contribute no
//! segments; unreadable tracks are dropped.

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use super::Orchestrator;
use crate::config::Stage;
use crate::error::{PipelineError, PipelineResult, StageError};
use crate::models::{CanonicalAudio, RunReport, Segment};
use crate::tables;

impl Orchestrator {
    /// SEGMENT - all segments, track order then index order
    pub(super) async fn phase_segmenting(
        &self,
        canonical: &[CanonicalAudio],
        report: &mut RunReport,
        upstream_recomputed: &mut bool,
        cancel: &CancellationToken,
    ) -> PipelineResult<Vec<Segment>> {
        let window_seconds = self.config.segments.window_seconds;
        tracing::info!(tracks = canonical.len(), window_seconds, "Phase: SEGMENT");

        if self
            .can_resume(Stage::Segment, tables::SEGMENT_TABLE, *upstream_recomputed)
            .await?
        {
            report.mark_resumed(Stage::Segment);
            let segments = tables::read_segments(self.store.as_ref()).await?;
            report.segments = segments.len();
            return Ok(segments);
        }

        let results: Vec<Option<Result<Vec<Segment>, StageError>>> = stream::iter(canonical)
            .map(|audio| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                Some(self.segmenter.segment(audio, window_seconds).await)
            })
            .buffered(self.config.concurrency)
            .collect()
            .await;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let mut segments = Vec::new();
        for (audio, result) in canonical.iter().zip(results) {
            match result {
                Some(Ok(track_segments)) if track_segments.is_empty() => report.short_tracks += 1,
                Some(Ok(track_segments)) => segments.extend(track_segments),
                Some(Err(e)) => {
                    tracing::warn!(
                        identity = %audio.identity,
                        wav_path = %audio.wav_path,
                        error = %e,
                        "Segmentation failed, row dropped"
                    );
                    report.segment_failures += 1;
                }
                None => {}
            }
        }
        report.segments = segments.len();

        tables::write_segments(self.store.as_ref(), &segments).await?;
        *upstream_recomputed = true;

        tracing::info!(
            segments = report.segments,
            short_tracks = report.short_tracks,
            failures = report.segment_failures,
            "SEGMENT complete"
        );

        Ok(segments)
    }
}
