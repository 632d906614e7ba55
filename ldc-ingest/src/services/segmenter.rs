//! Fixed-window segmentation
//!
//! Splits a canonical WAV into `floor(frames / (window * sample_rate))` non-overlapping
//! windows. Window `i` covers frames `[i*W, (i+1)*W)`; the trailing partial window is
//! discarded. Each window is written as a WAV with the source's sample format to
//! `datasets/segments/{region}/{identity}/{identity}_segment{i}.wav`. A stored window is
//! reused only when its format and length match the current source and window.

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use ldc_common::{normalize, BlobStore};
use std::io::Cursor;
use std::sync::Arc;

use crate::error::StageError;
use crate::models::{CanonicalAudio, Segment};
use crate::utils::identity_locks::IdentityLocks;

/// Prefix of segment keys
pub const SEGMENTS_DIR: &str = "datasets/segments";

pub fn segment_key(region: &str, identity: &str, index: u32) -> String {
    format!(
        "{}/{}/{}/{}_segment{}.wav",
        SEGMENTS_DIR,
        normalize(region),
        identity,
        identity,
        index
    )
}

/// Number of whole windows in `total_frames`
pub fn segment_count(total_frames: u64, sample_rate: u32, window_seconds: u32) -> u32 {
    let frames_per_window = sample_rate as u64 * window_seconds as u64;
    if frames_per_window == 0 {
        return 0;
    }
    (total_frames / frames_per_window).min(u32::MAX as u64) as u32
}

/// Splits canonical audio into fixed windows stored in the blob store
pub struct Segmenter {
    store: Arc<dyn BlobStore>,
    locks: IdentityLocks,
}

impl Segmenter {
    pub fn new(store: Arc<dyn BlobStore>, locks: IdentityLocks) -> Self {
        Self { store, locks }
    }

    /// Segments of `canonical`, index order
    ///
    /// Returns an empty list (not an error) when the track is shorter than one window.
    pub async fn segment(
        &self,
        canonical: &CanonicalAudio,
        window_seconds: u32,
    ) -> Result<Vec<Segment>, StageError> {
        let identity = canonical.identity.clone();
        let region = canonical.track.region.clone();
        let _guard = self.locks.lock(&identity).await;

        let wav = Arc::new(
            self.store
                .read(&canonical.wav_path)
                .await
                .map_err(|e| StageError::Decode(e.to_string()))?,
        );

        let (spec, total_frames) = {
            let wav = wav.clone();
            run_blocking(move || read_header(&wav)).await?
        };

        let count = segment_count(total_frames, spec.sample_rate, window_seconds);
        if count == 0 {
            tracing::info!(
                identity = %identity,
                duration_seconds = total_frames as f64 / spec.sample_rate.max(1) as f64,
                window_seconds,
                "Track shorter than one window, no segments"
            );
            return Ok(Vec::new());
        }

        let segments: Vec<Segment> = (0..count)
            .map(|index| Segment {
                title: canonical.track.source_title.clone(),
                region: region.clone(),
                track_identity: identity.clone(),
                segment_index: index,
                segment_path: segment_key(&region, &identity, index),
            })
            .collect();

        let frames_per_window = spec.sample_rate * window_seconds;
        let mut missing = Vec::new();
        for segment in &segments {
            if !self
                .is_reusable(&segment.segment_path, spec, frames_per_window)
                .await?
            {
                missing.push(segment.segment_index);
            }
        }

        if !missing.is_empty() {
            let indices = missing.clone();
            let encoded =
                run_blocking(move || encode_windows(&wav, frames_per_window, &indices)).await?;

            for (index, bytes) in missing.iter().zip(encoded) {
                let key = &segments[*index as usize].segment_path;
                self.store
                    .write(key, &bytes)
                    .await
                    .map_err(|e| StageError::Decode(e.to_string()))?;
            }
        }

        tracing::info!(
            identity = %identity,
            segments = count,
            written = missing.len(),
            reused = count as usize - missing.len(),
            "Track segmented"
        );

        Ok(segments)
    }
}

impl Segmenter {
    /// Whether a stored window at `key` was cut from this source with this window length
    async fn is_reusable(&self, key: &str, spec: WavSpec, frames_per_window: u32) -> Result<bool, StageError> {
        let exists = self
            .store
            .exists(key)
            .await
            .map_err(|e| StageError::Decode(e.to_string()))?;
        if !exists {
            return Ok(false);
        }

        let bytes = self
            .store
            .read(key)
            .await
            .map_err(|e| StageError::Decode(e.to_string()))?;

        match read_header(&bytes) {
            Ok((stored, frames)) if stored == spec && frames == frames_per_window as u64 => Ok(true),
            Ok((_, frames)) => {
                tracing::info!(key, frames, expected = frames_per_window, "Stale segment, rewriting");
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Unreadable segment, rewriting");
                Ok(false)
            }
        }
    }
}

async fn run_blocking<T, F>(work: F) -> Result<T, StageError>
where
    F: FnOnce() -> Result<T, StageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StageError::Decode(format!("Task join error: {}", e)))?
}

fn read_header(wav: &[u8]) -> Result<(WavSpec, u64), StageError> {
    let reader = WavReader::new(Cursor::new(wav)).map_err(|e| StageError::Decode(e.to_string()))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 || spec.channels == 0 {
        return Err(StageError::Decode(format!(
            "invalid WAV spec: {} Hz, {} channels",
            spec.sample_rate, spec.channels
        )));
    }
    Ok((spec, reader.duration() as u64))
}

/// Encode the windows `indices` (ascending) as standalone WAV files
fn encode_windows(wav: &[u8], frames_per_window: u32, indices: &[u32]) -> Result<Vec<Vec<u8>>, StageError> {
    let decode_err = |e: hound::Error| StageError::Decode(e.to_string());

    let mut reader = WavReader::new(Cursor::new(wav)).map_err(decode_err)?;
    let spec = reader.spec();
    let samples_per_window = frames_per_window as usize * spec.channels as usize;

    let mut windows = Vec::with_capacity(indices.len());
    for &index in indices {
        reader.seek(index * frames_per_window).map_err(|e| StageError::Decode(e.to_string()))?;

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).map_err(decode_err)?;
            let written = match spec.sample_format {
                SampleFormat::Float => copy_samples::<f32, _>(&mut reader, &mut writer, samples_per_window)?,
                SampleFormat::Int => copy_samples::<i32, _>(&mut reader, &mut writer, samples_per_window)?,
            };
            if written != samples_per_window {
                return Err(StageError::Decode(format!(
                    "window {} truncated: {} of {} samples",
                    index, written, samples_per_window
                )));
            }
            writer.finalize().map_err(decode_err)?;
        }
        windows.push(cursor.into_inner());
    }

    Ok(windows)
}

fn copy_samples<S, W>(
    reader: &mut WavReader<Cursor<&[u8]>>,
    writer: &mut WavWriter<W>,
    count: usize,
) -> Result<usize, StageError>
where
    S: hound::Sample + Copy,
    W: std::io::Write + std::io::Seek,
{
    let mut written = 0;
    for sample in reader.samples::<S>().take(count) {
        let sample = sample.map_err(|e| StageError::Decode(e.to_string()))?;
        writer
            .write_sample(sample)
            .map_err(|e| StageError::Decode(e.to_string()))?;
        written += 1;
    }
    Ok(written)
}
