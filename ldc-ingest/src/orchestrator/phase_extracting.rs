//! EXTRACT phase

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use super::Orchestrator;
use crate::config::Stage;
use crate::error::{PipelineError, PipelineResult};
use crate::models::{FeatureVector, RunReport, Segment};
use crate::tables;

impl Orchestrator {
    /// EXTRACT - one vector per segment; failed segments are left out of the table
    pub(super) async fn phase_extracting(
        &self,
        segments: &[Segment],
        report: &mut RunReport,
        upstream_recomputed: &mut bool,
        cancel: &CancellationToken,
    ) -> PipelineResult<Vec<FeatureVector>> {
        tracing::info!(
            segments = segments.len(),
            n_mfcc = self.extractor.vector_len(),
            "Phase: EXTRACT"
        );

        if self
            .can_resume(Stage::Extract, tables::FEATURE_TABLE, *upstream_recomputed)
            .await?
        {
            report.mark_resumed(Stage::Extract);
            let features = tables::read_features(self.store.as_ref()).await?;
            report.features = features.len();
            return Ok(features);
        }

        let results: Vec<Option<FeatureVector>> = stream::iter(segments)
            .map(|segment| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                self.extractor.extract(segment).await
            })
            .buffered(self.config.concurrency)
            .collect()
            .await;

        if cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let features: Vec<FeatureVector> = results.into_iter().flatten().collect();
        report.features = features.len();
        report.feature_failures = segments.len() - features.len();

        tables::write_features(self.store.as_ref(), &features).await?;
        *upstream_recomputed = true;

        tracing::info!(
            features = report.features,
            failures = report.feature_failures,
            "EXTRACT complete"
        );

        Ok(features)
    }
}
