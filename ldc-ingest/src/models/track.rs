//! Acquired and canonical tracks

use std::path::Path;

/// Outcome of acquiring one search candidate
///
/// `local_path` is `None` only when the download failed; such rows are kept in the
/// acquisition table for auditing and dropped before transcoding.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquiredTrack {
    /// Title reported by the search index
    pub source_title: String,
    /// Catalog title the candidate was found for
    pub catalog_title: String,
    pub region: String,
    pub duration_seconds: u64,
    pub source_url: String,
    /// Store key of the downloaded media
    pub local_path: Option<String>,
}

impl AcquiredTrack {
    /// Normalized identity, recovered from the stored file name
    pub fn identity(&self) -> Option<String> {
        self.local_path.as_deref().and_then(key_stem)
    }

    pub fn is_acquired(&self) -> bool {
        self.local_path.is_some()
    }
}

/// An acquired track converted to the canonical WAV format
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalAudio {
    pub track: AcquiredTrack,
    pub identity: String,
    /// Store key of the canonical WAV
    pub wav_path: String,
}

/// File stem of a store key (`datasets/songs/abc.mp3` → `abc`)
pub(crate) fn key_stem(key: &str) -> Option<String> {
    Path::new(key)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
