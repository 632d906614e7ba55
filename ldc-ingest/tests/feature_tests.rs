//! Feature extraction tests

mod helpers;

use helpers::{generate_wav_bytes, AudioConfig};
use ldc_common::{BlobStore, MemoryStore};
use ldc_ingest::models::Segment;
use ldc_ingest::services::{FeatureExtractor, MfccParams};
use std::sync::Arc;
use std::time::Duration;

fn segment(name: &str) -> Segment {
    Segment {
        title: "Bungong Jeumpa".to_string(),
        region: "Aceh".to_string(),
        track_identity: "bungong_jeumpa".to_string(),
        segment_index: 0,
        segment_path: format!("datasets/segments/aceh/bungong_jeumpa/{}.wav", name),
    }
}

async fn extractor_with(segment: &Segment, bytes: Vec<u8>, params: MfccParams) -> FeatureExtractor {
    let store = Arc::new(MemoryStore::new());
    store.write(&segment.segment_path, &bytes).await.unwrap();
    FeatureExtractor::new(store, params, Duration::from_secs(30))
}

fn tone(duration_seconds: f64, sample_rate: u32, frequency_hz: f32) -> Vec<u8> {
    generate_wav_bytes(&AudioConfig {
        duration_seconds,
        sample_rate,
        channels: 2,
        frequency_hz,
    })
}

#[tokio::test]
async fn test_vector_has_configured_length() {
    let segment = segment("bungong_jeumpa_segment0");
    let extractor = extractor_with(&segment, tone(2.0, 8000, 440.0), MfccParams::default()).await;

    let feature = extractor.extract(&segment).await.expect("features");

    assert_eq!(feature.vector.len(), 13);
    assert!(feature.vector.iter().all(|c| c.is_finite()));
    assert_eq!(feature.segment, segment);
}

#[tokio::test]
async fn test_length_follows_coefficient_count_not_content() {
    let params = MfccParams {
        n_mfcc: 20,
        ..MfccParams::default()
    };
    let short = segment("short");
    let long = segment("long");

    let a = extractor_with(&short, tone(0.5, 22_050, 220.0), params).await;
    let b = extractor_with(&long, tone(3.0, 44_100, 880.0), params).await;

    assert_eq!(a.extract(&short).await.unwrap().vector.len(), 20);
    assert_eq!(b.extract(&long).await.unwrap().vector.len(), 20);
}

#[tokio::test]
async fn test_different_tones_give_different_vectors() {
    let low = segment("low");
    let high = segment("high");
    let a = extractor_with(&low, tone(1.0, 22_050, 220.0), MfccParams::default()).await;
    let b = extractor_with(&high, tone(1.0, 22_050, 3000.0), MfccParams::default()).await;

    let va = a.extract(&low).await.unwrap().vector;
    let vb = b.extract(&high).await.unwrap().vector;
    assert!(va.iter().zip(&vb).any(|(x, y)| (x - y).abs() > 1.0));
}

#[tokio::test]
async fn test_zero_length_audio_has_no_features() {
    let empty = segment("empty");
    let extractor = extractor_with(&empty, tone(0.0, 8000, 440.0), MfccParams::default()).await;

    assert!(extractor.extract(&empty).await.is_none());
}

#[tokio::test]
async fn test_undecodable_segment_has_no_features() {
    let broken = segment("broken");
    let extractor =
        extractor_with(&broken, b"this is not audio at all".to_vec(), MfccParams::default()).await;

    assert!(extractor.extract(&broken).await.is_none());
}

#[tokio::test]
async fn test_missing_segment_has_no_features() {
    let store = Arc::new(MemoryStore::new());
    let extractor = FeatureExtractor::new(store, MfccParams::default(), Duration::from_secs(5));

    assert!(extractor.extract(&segment("missing")).await.is_none());
}
