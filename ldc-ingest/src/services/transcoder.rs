//! Canonical WAV transcoding
//!
//! `datasets/songs/{identity}.{ext}` → `datasets/wav_songs/{identity}.wav`. An existing
//! canonical file is reused without running the converter.

use ldc_common::BlobStore;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::StageError;
use crate::models::{AcquiredTrack, CanonicalAudio};
use crate::services::audio_converter::AudioConverter;
use crate::utils::identity_locks::IdentityLocks;

/// Prefix of canonical WAV keys
pub const WAV_DIR: &str = "datasets/wav_songs";

pub fn wav_key(identity: &str) -> String {
    format!("{}/{}.wav", WAV_DIR, identity)
}

/// Normalizes acquired files into canonical WAV through an [`AudioConverter`]
pub struct Transcoder {
    store: Arc<dyn BlobStore>,
    converter: Arc<dyn AudioConverter>,
    locks: IdentityLocks,
    timeout: Duration,
}

impl Transcoder {
    pub fn new(
        store: Arc<dyn BlobStore>,
        converter: Arc<dyn AudioConverter>,
        locks: IdentityLocks,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            converter,
            locks,
            timeout,
        }
    }

    /// Canonical audio for `track`; `None` if it was never acquired or conversion failed
    pub async fn transcode(&self, track: &AcquiredTrack) -> Option<CanonicalAudio> {
        if !track.is_acquired() {
            return None;
        }

        match self.try_transcode(track).await {
            Ok(canonical) => Some(canonical),
            Err(e) => {
                tracing::warn!(
                    title = %track.source_title,
                    path = ?track.local_path,
                    error = %e,
                    "Transcode failed, row dropped"
                );
                None
            }
        }
    }

    pub async fn try_transcode(&self, track: &AcquiredTrack) -> Result<CanonicalAudio, StageError> {
        let (source_key, identity) = match (&track.local_path, track.identity()) {
            (Some(key), Some(identity)) => (key.clone(), identity),
            _ => {
                return Err(StageError::Transcode(format!(
                    "'{}' has no acquired file",
                    track.source_title
                )))
            }
        };
        let target_key = wav_key(&identity);

        let _guard = self.locks.lock(&identity).await;

        let exists = self
            .store
            .exists(&target_key)
            .await
            .map_err(|e| StageError::Transcode(e.to_string()))?;

        if exists {
            tracing::debug!(identity = %identity, key = %target_key, "Canonical WAV exists, skipping conversion");
        } else {
            let wav = self.convert(&source_key).await?;
            self.store
                .write(&target_key, &wav)
                .await
                .map_err(|e| StageError::Transcode(e.to_string()))?;
            tracing::info!(identity = %identity, key = %target_key, bytes = wav.len(), "Transcoded");
        }

        Ok(CanonicalAudio {
            track: track.clone(),
            identity,
            wav_path: target_key,
        })
    }

    /// Run the converter on a scratch copy of `source_key`, returning the WAV bytes
    async fn convert(&self, source_key: &str) -> Result<Vec<u8>, StageError> {
        let source = self
            .store
            .read(source_key)
            .await
            .map_err(|e| StageError::Transcode(e.to_string()))?;

        let scratch = tempfile::tempdir().map_err(|e| StageError::Transcode(e.to_string()))?;
        let extension = Path::new(source_key)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin");
        let input = scratch.path().join(format!("input.{}", extension));
        let output = scratch.path().join("output.wav");

        tokio::fs::write(&input, &source)
            .await
            .map_err(|e| StageError::Transcode(e.to_string()))?;

        match tokio::time::timeout(self.timeout, self.converter.convert(&input, &output)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(StageError::Transcode(e.to_string())),
            Err(_) => {
                return Err(StageError::Transcode(format!(
                    "converter timed out after {:?}",
                    self.timeout
                )))
            }
        }

        let wav = match tokio::fs::read(&output).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StageError::Transcode("converter produced no output".to_string()))
            }
            Err(e) => return Err(StageError::Transcode(e.to_string())),
        };

        if wav.is_empty() {
            return Err(StageError::Transcode("converter produced an empty file".to_string()));
        }

        Ok(wav)
    }
}
