//! Integration tests for the filesystem blob store

use ldc_common::{BlobStore, Error, LocalStore};
use tempfile::TempDir;

#[tokio::test]
async fn test_write_creates_parent_directories() {
    let temp_dir = TempDir::new().unwrap();
    let store = LocalStore::new(temp_dir.path());
    store.ensure_ready().await.unwrap();

    store
        .write("datasets/wav_songs/rasa_sayange.wav", b"RIFF")
        .await
        .unwrap();

    let on_disk = temp_dir.path().join("datasets/wav_songs/rasa_sayange.wav");
    assert!(on_disk.exists());
    assert_eq!(std::fs::read(on_disk).unwrap(), b"RIFF");
}

#[tokio::test]
async fn test_write_leaves_no_temp_files() {
    let temp_dir = TempDir::new().unwrap();
    let store = LocalStore::new(temp_dir.path());

    store.write("data/results.csv", b"first").await.unwrap();
    store.write("data/results.csv", b"second").await.unwrap();

    let entries: Vec<_> = std::fs::read_dir(temp_dir.path().join("data"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(entries, vec!["results.csv".to_string()]);
    assert_eq!(store.read("data/results.csv").await.unwrap(), b"second");
}

#[tokio::test]
async fn test_read_missing_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let store = LocalStore::new(temp_dir.path());

    assert!(!store.exists("data/missing.csv").await.unwrap());
    assert!(matches!(
        store.read("data/missing.csv").await,
        Err(Error::MissingBlob(_))
    ));
    store.remove("data/missing.csv").await.unwrap();
}

#[tokio::test]
async fn test_keys_cannot_escape_root() {
    let temp_dir = TempDir::new().unwrap();
    let store = LocalStore::new(temp_dir.path().join("root"));

    assert!(matches!(
        store.write("../escape.txt", b"x").await,
        Err(Error::InvalidKey { .. })
    ));
    assert!(!temp_dir.path().join("escape.txt").exists());
}

#[tokio::test]
async fn test_ensure_ready_rejects_file_root() {
    let temp_dir = TempDir::new().unwrap();
    let file_root = temp_dir.path().join("not_a_dir");
    std::fs::write(&file_root, b"x").unwrap();

    let store = LocalStore::new(&file_root);
    assert!(matches!(
        store.ensure_ready().await,
        Err(Error::StoreUnavailable(_))
    ));
}

#[tokio::test]
async fn test_blob_io_error_names_key() {
    let temp_dir = TempDir::new().unwrap();
    let store = LocalStore::new(temp_dir.path());
    // A file where a parent directory must be created
    std::fs::write(temp_dir.path().join("datasets"), b"x").unwrap();

    let err = store.write("datasets/songs/a.wav", b"RIFF").await.unwrap_err();
    assert!(matches!(&err, Error::BlobIo { key, .. } if key == "datasets/songs/a.wav"));
    assert!(err.to_string().contains("datasets/songs/a.wav"));
}
