//! Audio Test Fixture Generator
//!
//! In-memory WAV payloads standing in for downloaded and canonical audio

use std::io::Cursor;

/// Configuration for generated audio
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub frequency_hz: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 5.0,
            sample_rate: 8000,
            channels: 1,
            frequency_hz: 440.0,
        }
    }
}

/// Generate a 16-bit PCM WAV with a sine tone
///
/// Sample `i` of every channel is a pure function of `i`, so segment contents can be
/// checked against frame offsets.
pub fn generate_wav_bytes(config: &AudioConfig) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: config.channels,
        sample_rate: config.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav writer");
        let total_frames = (config.duration_seconds * config.sample_rate as f64) as usize;

        for i in 0..total_frames {
            let sample = sample_at(config, i);
            for _ in 0..config.channels {
                writer.write_sample(sample).expect("write sample");
            }
        }

        writer.finalize().expect("finalize wav");
    }
    cursor.into_inner()
}

/// Value of frame `i` in [`generate_wav_bytes`] output
pub fn sample_at(config: &AudioConfig, i: usize) -> i16 {
    // Simple tone at 30% amplitude
    let t = i as f32 / config.sample_rate as f32;
    (0.3 * (2.0 * std::f32::consts::PI * config.frequency_hz * t).sin() * i16::MAX as f32) as i16
}

/// Mono 8 kHz tone of the given length
pub fn wav_seconds(duration_seconds: f64) -> Vec<u8> {
    generate_wav_bytes(&AudioConfig {
        duration_seconds,
        ..AudioConfig::default()
    })
}
