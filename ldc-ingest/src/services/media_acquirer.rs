//! Media acquisition
//!
//! For one catalog entry, walks the resolved candidates in relevance order and stores up to
//! `per_entry_limit` audio files under `datasets/songs/{identity}.{ext}`.
//!
//! **Per candidate:**
//! 1. Parse the duration text (malformed → skip, no row)
//! 2. `duration >= max_duration_seconds` → skip without download, no row
//! 3. Derive the identity and take its lock
//! 4. Stored file for the identity exists → reuse it (cache hit, no network)
//! 5. Otherwise download through the [`MediaSource`], sniff the payload, store atomically
//!
//! Download failures produce a row without a path and do not count toward the limit.

use ldc_common::duration::format_duration;
use ldc_common::{normalize, parse_duration, BlobStore};
use std::sync::Arc;
use std::time::Duration;

use crate::config::IdentityKey;
use crate::error::StageError;
use crate::models::run_report::AcquisitionStats;
use crate::models::{AcquiredTrack, CatalogEntry, SearchCandidate};
use crate::services::media_source::{MediaError, MediaSource};
use crate::utils::identity_locks::IdentityLocks;
use crate::utils::retry::{retry_transient, RetryPolicy};

/// Prefix of acquired media keys
pub const SONGS_DIR: &str = "datasets/songs";

/// Extensions a stored song may carry, tried in order on cache lookup
pub const KNOWN_EXTENSIONS: [&str; 10] = [
    "m4a", "webm", "mp3", "ogg", "opus", "wav", "flac", "mp4", "mkv", "aac",
];

/// Container MIME types accepted although `infer` classifies them as video
const AUDIO_CAPABLE_CONTAINERS: [&str; 3] = ["video/webm", "video/mp4", "video/x-matroska"];

/// Result of acquiring one catalog entry
#[derive(Debug, Default)]
pub struct AcquisitionOutcome {
    /// Rows for the acquisition table, candidate order; failures have no `local_path`
    pub tracks: Vec<AcquiredTrack>,
    pub stats: AcquisitionStats,
}

/// Downloads candidates into the blob store, at most once per identity
pub struct MediaAcquirer {
    store: Arc<dyn BlobStore>,
    source: Arc<dyn MediaSource>,
    locks: IdentityLocks,
    identity_key: IdentityKey,
    timeout: Duration,
    retry: RetryPolicy,
}

impl MediaAcquirer {
    pub fn new(
        store: Arc<dyn BlobStore>,
        source: Arc<dyn MediaSource>,
        locks: IdentityLocks,
        identity_key: IdentityKey,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            source,
            locks,
            identity_key,
            timeout,
            retry,
        }
    }

    /// Acquire up to `per_entry_limit` tracks for `entry` from `candidates`
    pub async fn acquire(
        &self,
        entry: &CatalogEntry,
        candidates: &[SearchCandidate],
        per_entry_limit: usize,
        max_duration_seconds: u64,
    ) -> AcquisitionOutcome {
        let mut outcome = AcquisitionOutcome::default();

        for candidate in candidates {
            if outcome.stats.successes() >= per_entry_limit {
                tracing::debug!(
                    title = %entry.title,
                    per_entry_limit,
                    "Per-entry limit reached, remaining candidates ignored"
                );
                break;
            }
            outcome.stats.candidates_seen += 1;

            let duration_seconds = match parse_duration(&candidate.raw_duration) {
                Ok(seconds) => seconds,
                Err(e) => {
                    let error = StageError::from(e);
                    tracing::warn!(candidate = %candidate.title, error = %error, "Skipping candidate");
                    outcome.stats.malformed_durations += 1;
                    continue;
                }
            };

            if duration_seconds >= max_duration_seconds {
                tracing::info!(
                    candidate = %candidate.title,
                    duration = %format_duration(duration_seconds),
                    limit = %format_duration(max_duration_seconds),
                    "Skipping candidate: too long"
                );
                outcome.stats.too_long += 1;
                continue;
            }

            let mut track = AcquiredTrack {
                source_title: candidate.title.clone(),
                catalog_title: entry.title.clone(),
                region: entry.region.clone(),
                duration_seconds,
                source_url: candidate.url.clone(),
                local_path: None,
            };

            match self.store_candidate(entry, candidate).await {
                Ok((key, cached)) => {
                    if cached {
                        outcome.stats.cache_hits += 1;
                    } else {
                        outcome.stats.downloaded += 1;
                    }
                    track.local_path = Some(key);
                }
                Err(e) => {
                    tracing::warn!(
                        candidate = %candidate.title,
                        url = %candidate.url,
                        error = %e,
                        "Acquisition failed"
                    );
                    outcome.stats.failures += 1;
                }
            }

            outcome.tracks.push(track);
        }

        tracing::info!(
            title = %entry.title,
            region = %entry.region,
            acquired = outcome.stats.successes(),
            cache_hits = outcome.stats.cache_hits,
            failures = outcome.stats.failures,
            "Entry acquisition complete"
        );

        outcome
    }

    /// Storage identity of a candidate
    pub fn identity_for(&self, entry: &CatalogEntry, candidate: &SearchCandidate) -> String {
        match self.identity_key {
            IdentityKey::SourceTitle => normalize(&candidate.title),
            IdentityKey::EntryAndUrl => normalize(&format!(
                "{} {} {}",
                entry.title, entry.region, candidate.url
            )),
        }
    }

    /// Key of an already stored file for `identity`, if any
    pub async fn find_existing(&self, identity: &str) -> Result<Option<String>, StageError> {
        for extension in KNOWN_EXTENSIONS {
            let key = song_key(identity, extension);
            let exists = self
                .store
                .exists(&key)
                .await
                .map_err(|e| StageError::Acquisition(e.to_string()))?;
            if exists {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    /// Returns the stored key and whether it was already present
    async fn store_candidate(
        &self,
        entry: &CatalogEntry,
        candidate: &SearchCandidate,
    ) -> Result<(String, bool), StageError> {
        let identity = self.identity_for(entry, candidate);
        if identity.is_empty() {
            return Err(StageError::Acquisition(format!(
                "title '{}' has no usable identity",
                candidate.title
            )));
        }

        let _guard = self.locks.lock(&identity).await;

        if let Some(existing) = self.find_existing(&identity).await? {
            tracing::debug!(identity = %identity, key = %existing, "Reusing stored file");
            return Ok((existing, true));
        }

        let bytes = retry_transient("download", &self.retry, || async {
            match tokio::time::timeout(self.timeout, self.source.fetch_audio(&candidate.url)).await {
                Ok(result) => result,
                Err(_) => Err(MediaError::Timeout),
            }
        })
        .await
        .map_err(|e| StageError::Acquisition(e.to_string()))?;

        let extension = sniff_audio_extension(&bytes).map_err(|e| StageError::Acquisition(e.to_string()))?;
        let key = song_key(&identity, extension);

        self.store
            .write(&key, &bytes)
            .await
            .map_err(|e| StageError::Acquisition(e.to_string()))?;

        tracing::info!(
            identity = %identity,
            key = %key,
            bytes = bytes.len(),
            "Downloaded"
        );
        Ok((key, false))
    }
}

pub fn song_key(identity: &str, extension: &str) -> String {
    format!("{}/{}.{}", SONGS_DIR, identity, extension)
}

/// File extension for an audio payload, or [`MediaError::NotAudio`]
pub fn sniff_audio_extension(bytes: &[u8]) -> Result<&'static str, MediaError> {
    if bytes.is_empty() {
        return Err(MediaError::NotAudio("empty payload".to_string()));
    }

    let kind = infer::get(bytes)
        .ok_or_else(|| MediaError::NotAudio("unrecognized content".to_string()))?;

    let accepted = kind.matcher_type() == infer::MatcherType::Audio
        || AUDIO_CAPABLE_CONTAINERS.contains(&kind.mime_type());
    if !accepted {
        return Err(MediaError::NotAudio(kind.mime_type().to_string()));
    }

    Ok(kind.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_rejects_html() {
        let result = sniff_audio_extension(b"<!DOCTYPE html><html><body>blocked</body></html>");
        assert!(matches!(result, Err(MediaError::NotAudio(_))));
    }

    #[test]
    fn test_sniff_rejects_empty() {
        assert!(matches!(sniff_audio_extension(&[]), Err(MediaError::NotAudio(_))));
    }

    #[test]
    fn test_sniff_accepts_wav() {
        let mut header = Vec::new();
        header.extend_from_slice(b"RIFF");
        header.extend_from_slice(&36u32.to_le_bytes());
        header.extend_from_slice(b"WAVEfmt ");
        header.extend_from_slice(&[0u8; 24]);
        assert_eq!(sniff_audio_extension(&header).unwrap(), "wav");
    }

    #[test]
    fn test_song_key_layout() {
        assert_eq!(song_key("ampar_ampar_pisang", "m4a"), "datasets/songs/ampar_ampar_pisang.m4a");
    }
}
