//! Integration tests for configuration resolution
//!
//! Tests that manipulate LDC_* environment variables are marked #[serial]
//! so they never run concurrently.

use ldc_common::config::{
    load_toml_config, resolve_config_path, resolve_root_folder, CONFIG_FILE_ENV, ROOT_FOLDER_ENV,
};
use serde::Deserialize;
use serial_test::serial;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Settings {
    root_folder: Option<PathBuf>,
    max_entries: usize,
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    std::env::set_var(ROOT_FOLDER_ENV, "/from/env");

    let resolved = resolve_root_folder(None, Some(Path::new("/from/toml")));
    assert_eq!(resolved, PathBuf::from("/from/env"));

    std::env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_used_when_env_absent() {
    std::env::remove_var(ROOT_FOLDER_ENV);

    let resolved = resolve_root_folder(None, Some(Path::new("/from/toml")));
    assert_eq!(resolved, PathBuf::from("/from/toml"));
}

#[test]
#[serial]
fn test_blank_env_is_ignored() {
    std::env::set_var(ROOT_FOLDER_ENV, "   ");

    let resolved = resolve_root_folder(None, Some(Path::new("/from/toml")));
    assert_eq!(resolved, PathBuf::from("/from/toml"));

    std::env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_explicit_config_must_exist() {
    std::env::remove_var(CONFIG_FILE_ENV);

    let result = resolve_config_path(Some(Path::new("/definitely/not/here.toml")));
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_config_from_env_is_loaded() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ldc.toml");
    std::fs::write(&path, "root_folder = \"/corpus\"\nmax_entries = 12\n").unwrap();
    std::env::set_var(CONFIG_FILE_ENV, &path);

    let resolved = resolve_config_path(None).unwrap();
    assert_eq!(resolved.as_deref(), Some(path.as_path()));

    let settings: Settings = load_toml_config(resolved.as_deref()).unwrap();
    assert_eq!(settings.root_folder, Some(PathBuf::from("/corpus")));
    assert_eq!(settings.max_entries, 12);

    std::env::remove_var(CONFIG_FILE_ENV);
}
