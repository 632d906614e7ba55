//! Audio Decoding Utilities
//!
//! **Purpose:** Decode audio bytes to mono f32 PCM for feature extraction
//!
//! Uses symphonia for format-agnostic decoding (WAV, MP3, FLAC, AAC, OGG, etc.)
//! and rubato for sample-rate conversion.

use anyhow::{bail, Context, Result};
use rubato::{FftFixedIn, Resampler};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded audio result
#[derive(Debug)]
pub struct DecodedAudio {
    /// Mono audio samples (f32, range [-1.0, 1.0])
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Original channel count
    pub channels: usize,
}

impl DecodedAudio {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode an in-memory audio file to mono f32 PCM samples
///
/// **Algorithm:**
/// 1. Probe format using symphonia (extension hint optional)
/// 2. Find default audio track and create its decoder
/// 3. Decode all packets into interleaved f32
/// 4. Average channels to mono
///
/// Packets that fail to decode are skipped; the stream only fails when nothing decodes.
pub fn decode_audio_bytes(bytes: Vec<u8>, extension_hint: Option<&str>) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension_hint {
        hint.with_extension(extension);
    }

    let detected = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to detect audio container")?;

    let mut format = detected.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio track found in stream")?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params.sample_rate.context("Sample rate unknown")?;
    let channel_count = codec_params.channels.map(|c| c.count()).unwrap_or(1).max(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => bail!("Error reading packet: {}", e),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                skipped_packets += 1;
                tracing::debug!(reason, "Skipping undecodable packet");
                continue;
            }
            Err(e) => bail!("Failed to decode packet: {}", e),
        };

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(sample_buf.samples());
    }

    if interleaved.is_empty() && skipped_packets > 0 {
        bail!("No packets could be decoded ({} skipped)", skipped_packets);
    }

    let samples = if channel_count > 1 {
        interleaved
            .chunks(channel_count)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    } else {
        interleaved
    };

    tracing::debug!(
        sample_rate,
        channels = channel_count,
        total_samples = samples.len(),
        skipped_packets,
        "Audio decoding complete"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels: channel_count,
    })
}

/// Resample mono audio from `from_rate` to `to_rate`
///
/// The resampler's output delay is dropped from the front and the tail is flushed with
/// silence, so output sample `i` lines up with input time `i / to_rate` and the length is
/// `len * to_rate / from_rate`.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from_rate == 0 || to_rate == 0 {
        bail!("Invalid sample rate conversion {} -> {}", from_rate, to_rate);
    }

    let mut resampler = FftFixedIn::<f32>::new(from_rate as usize, to_rate as usize, 1024, 2, 1)?;
    let chunk_size = resampler.input_frames_next();
    let delay = resampler.output_delay();

    let expected_len =
        ((samples.len() as u64 * to_rate as u64) as f64 / from_rate as f64).round() as usize;
    let needed = delay + expected_len;
    let mut output = Vec::with_capacity(needed + chunk_size);

    let mut chunks = samples.chunks_exact(chunk_size);
    for chunk in chunks.by_ref() {
        let frames_out = resampler.process(&[chunk], None)?;
        output.extend_from_slice(&frames_out[0]);
    }

    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let mut tail = remainder.to_vec();
        tail.resize(chunk_size, 0.0);
        let frames_out = resampler.process(&[tail], None)?;
        output.extend_from_slice(&frames_out[0]);
    }

    // Delayed samples still sit in the resampler
    let silence = vec![0.0f32; chunk_size];
    while output.len() < needed {
        let frames_out = resampler.process(&[silence.as_slice()], None)?;
        if frames_out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&frames_out[0]);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected_len);
    Ok(output)
}
