//! Segment feature extraction
//!
//! Decode (symphonia) → mono → resample to the analysis rate (rubato) → mean MFCC. All CPU
//! work runs on the blocking pool under a timeout. Any failure drops the segment's row;
//! partial vectors are never emitted.

use ldc_common::BlobStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::StageError;
use crate::models::{FeatureVector, Segment};
use crate::services::mfcc::{MfccExtractor, MfccParams};
use crate::utils::audio_decoder::{decode_audio_bytes, resample};

/// Computes one fixed-length vector per segment
pub struct FeatureExtractor {
    store: Arc<dyn BlobStore>,
    mfcc: Arc<MfccExtractor>,
    timeout: Duration,
}

impl FeatureExtractor {
    pub fn new(store: Arc<dyn BlobStore>, params: MfccParams, timeout: Duration) -> Self {
        Self {
            store,
            mfcc: Arc::new(MfccExtractor::new(params)),
            timeout,
        }
    }

    /// Length of every vector this extractor produces
    pub fn vector_len(&self) -> usize {
        self.mfcc.params().n_mfcc
    }

    /// Feature vector for `segment`, or `None` if it cannot be computed
    pub async fn extract(&self, segment: &Segment) -> Option<FeatureVector> {
        match self.try_extract(segment).await {
            Ok(feature) => Some(feature),
            Err(e) => {
                tracing::warn!(
                    segment = %segment.identity(),
                    path = %segment.segment_path,
                    error = %e,
                    "Feature extraction failed, row dropped"
                );
                None
            }
        }
    }

    pub async fn try_extract(&self, segment: &Segment) -> Result<FeatureVector, StageError> {
        let bytes = self
            .store
            .read(&segment.segment_path)
            .await
            .map_err(|e| StageError::Decode(e.to_string()))?;

        let extension = Path::new(&segment.segment_path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string);
        let mfcc = self.mfcc.clone();

        let task = tokio::task::spawn_blocking(move || compute_mean_mfcc(bytes, extension.as_deref(), &mfcc));

        let vector = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => return Err(StageError::Decode(format!("Task join error: {}", e))),
            Err(_) => {
                return Err(StageError::Decode(format!(
                    "feature extraction timed out after {:?}",
                    self.timeout
                )))
            }
        };

        tracing::debug!(segment = %segment.identity(), "Features extracted");

        Ok(FeatureVector {
            segment: segment.clone(),
            vector,
        })
    }
}

/// Decode, downmix, resample and reduce one audio file to its mean MFCC vector
pub fn compute_mean_mfcc(
    bytes: Vec<u8>,
    extension: Option<&str>,
    mfcc: &MfccExtractor,
) -> Result<Vec<f32>, StageError> {
    let decoded = decode_audio_bytes(bytes, extension).map_err(|e| StageError::Decode(format!("{:#}", e)))?;
    if decoded.samples.is_empty() {
        return Err(StageError::Decode("zero-length audio".to_string()));
    }
    tracing::trace!(
        seconds = decoded.duration_seconds(),
        channels = decoded.channels,
        sample_rate = decoded.sample_rate,
        "Decoded for analysis"
    );

    let target_rate = mfcc.params().sample_rate;
    let samples = resample(&decoded.samples, decoded.sample_rate, target_rate)
        .map_err(|e| StageError::Decode(format!("{:#}", e)))?;

    let vector = mfcc
        .mean_mfcc(&samples)
        .ok_or_else(|| StageError::Decode("zero-length audio".to_string()))?;

    if vector.len() != mfcc.params().n_mfcc {
        return Err(StageError::Decode(format!(
            "expected {} coefficients, got {}",
            mfcc.params().n_mfcc,
            vector.len()
        )));
    }
    if let Some(bad) = vector.iter().position(|c| !c.is_finite()) {
        return Err(StageError::Decode(format!("coefficient {} is not finite", bad)));
    }

    Ok(vector)
}
