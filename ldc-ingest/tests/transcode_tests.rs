//! Transcoder tests

mod helpers;

use helpers::fakes::ConverterMode;
use helpers::{wav_seconds, FakeConverter};
use ldc_common::{BlobStore, MemoryStore};
use ldc_ingest::models::AcquiredTrack;
use ldc_ingest::services::Transcoder;
use ldc_ingest::utils::IdentityLocks;
use std::sync::Arc;
use std::time::Duration;

fn track(local_path: Option<&str>) -> AcquiredTrack {
    AcquiredTrack {
        source_title: "Yamko Rambe Yamko".to_string(),
        catalog_title: "Yamko_Rambe_Yamko".to_string(),
        region: "Papua".to_string(),
        duration_seconds: 181,
        source_url: "https://www.youtube.com/watch?v=y1".to_string(),
        local_path: local_path.map(str::to_string),
    }
}

async fn store_with_song() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store
        .write("datasets/songs/yamko_rambe_yamko.m4a", &wav_seconds(1.0))
        .await
        .unwrap();
    store
}

fn transcoder(store: Arc<MemoryStore>, converter: Arc<FakeConverter>) -> Transcoder {
    Transcoder::new(store, converter, IdentityLocks::new(), Duration::from_secs(5))
}

#[tokio::test]
async fn test_transcode_writes_canonical_wav() {
    let store = store_with_song().await;
    let converter = Arc::new(FakeConverter::new());
    let transcoder = transcoder(store.clone(), converter.clone());

    let canonical = transcoder
        .transcode(&track(Some("datasets/songs/yamko_rambe_yamko.m4a")))
        .await
        .expect("canonical audio");

    assert_eq!(canonical.identity, "yamko_rambe_yamko");
    assert_eq!(canonical.wav_path, "datasets/wav_songs/yamko_rambe_yamko.wav");
    assert_eq!(
        store.read(&canonical.wav_path).await.unwrap(),
        wav_seconds(1.0)
    );
    assert_eq!(converter.invocations(), 1);
}

#[tokio::test]
async fn test_second_transcode_does_not_invoke_converter() {
    let store = store_with_song().await;
    let converter = Arc::new(FakeConverter::new());
    let transcoder = transcoder(store, converter.clone());
    let track = track(Some("datasets/songs/yamko_rambe_yamko.m4a"));

    let first = transcoder.transcode(&track).await;
    let second = transcoder.transcode(&track).await;

    assert!(first.is_some());
    assert_eq!(first, second);
    assert_eq!(converter.invocations(), 1);
}

#[tokio::test]
async fn test_track_without_file_is_not_transcoded() {
    let store = store_with_song().await;
    let converter = Arc::new(FakeConverter::new());
    let transcoder = transcoder(store, converter.clone());

    assert!(transcoder.transcode(&track(None)).await.is_none());
    assert_eq!(converter.invocations(), 0);
}

#[tokio::test]
async fn test_converter_failure_drops_row() {
    let store = store_with_song().await;
    let converter = Arc::new(FakeConverter::with_mode(ConverterMode::Fail));
    let transcoder = transcoder(store.clone(), converter);

    let result = transcoder
        .transcode(&track(Some("datasets/songs/yamko_rambe_yamko.m4a")))
        .await;

    assert!(result.is_none());
    assert!(!store.exists("datasets/wav_songs/yamko_rambe_yamko.wav").await.unwrap());
}

#[tokio::test]
async fn test_missing_converter_output_drops_row() {
    let store = store_with_song().await;
    let converter = Arc::new(FakeConverter::with_mode(ConverterMode::NoOutput));
    let transcoder = transcoder(store, converter);

    let result = transcoder
        .try_transcode(&track(Some("datasets/songs/yamko_rambe_yamko.m4a")))
        .await;

    assert!(matches!(result, Err(ldc_ingest::StageError::Transcode(_))));
}

#[tokio::test]
async fn test_missing_source_file_drops_row() {
    let store = Arc::new(MemoryStore::new());
    let converter = Arc::new(FakeConverter::new());
    let transcoder = transcoder(store, converter.clone());

    let result = transcoder
        .transcode(&track(Some("datasets/songs/yamko_rambe_yamko.m4a")))
        .await;

    assert!(result.is_none());
    assert_eq!(converter.invocations(), 0);
}
