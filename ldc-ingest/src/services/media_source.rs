//! Media sources
//!
//! A [`MediaSource`] turns a candidate URL into the bytes of its audio-only stream.
//! [`YtDlpSource`] asks `yt-dlp` for the best audio-only format and downloads it with
//! reqwest.

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::utils::retry::Transient;

const USER_AGENT: &str = concat!("ldc-ingest/", env!("CARGO_PKG_VERSION"));

/// Upper bound on one downloaded stream
pub const MAX_DOWNLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Media source errors
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("yt-dlp binary not found: {0}")]
    BinaryNotFound(String),

    #[error("Stream resolution failed: {0}")]
    ResolveFailed(String),

    #[error("No audio-only stream available")]
    NoAudioStream,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Download returned HTTP {0}")]
    HttpStatus(u16),

    #[error("Download timed out")]
    Timeout,

    #[error("Download exceeds {0} bytes")]
    TooLarge(usize),

    #[error("Payload is not audio: {0}")]
    NotAudio(String),
}

impl Transient for MediaError {
    fn is_transient(&self) -> bool {
        match self {
            MediaError::NetworkError(_) | MediaError::Timeout => true,
            MediaError::HttpStatus(status) => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for MediaError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            MediaError::Timeout
        } else {
            MediaError::NetworkError(e.to_string())
        }
    }
}

/// Resolves a media page URL to audio bytes
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Download the audio-only stream behind `url`
    async fn fetch_audio(&self, url: &str) -> Result<Vec<u8>, MediaError>;
}

/// Relevant subset of `yt-dlp --dump-single-json`
#[derive(Debug, Deserialize)]
struct YtDlpInfo {
    /// Direct URL of the selected format
    url: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    #[serde(default)]
    http_headers: HashMap<String, String>,
}

impl YtDlpInfo {
    fn audio_stream_url(self) -> Result<(String, HashMap<String, String>), MediaError> {
        let has_video = self.vcodec.as_deref().is_some_and(|v| v != "none");
        let has_audio = self.acodec.as_deref().map_or(true, |a| a != "none");
        if has_video || !has_audio {
            return Err(MediaError::NoAudioStream);
        }
        let url = self.url.filter(|u| !u.is_empty()).ok_or(MediaError::NoAudioStream)?;
        Ok((url, self.http_headers))
    }
}

/// `yt-dlp` stream resolution + reqwest download
pub struct YtDlpSource {
    binary_path: String,
    http_client: reqwest::Client,
}

impl YtDlpSource {
    pub fn new(binary_path: impl Into<String>, timeout: Duration) -> Result<Self, MediaError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MediaError::NetworkError(e.to_string()))?;

        Ok(Self {
            binary_path: binary_path.into(),
            http_client,
        })
    }

    /// Check that the yt-dlp binary runs
    pub async fn check_available(&self) -> Result<(), MediaError> {
        match Command::new(&self.binary_path)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => Err(MediaError::ResolveFailed(format!(
                "--version exited with {:?}",
                output.status.code()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(MediaError::BinaryNotFound(self.binary_path.clone()))
            }
            Err(e) => Err(MediaError::ResolveFailed(e.to_string())),
        }
    }

    async fn resolve_stream(&self, url: &str) -> Result<(String, HashMap<String, String>), MediaError> {
        tracing::debug!(url, "Resolving audio-only stream");

        let output = Command::new(&self.binary_path)
            .args(["--dump-single-json", "--no-playlist", "--no-warnings", "-f", "bestaudio"])
            .arg(url)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::BinaryNotFound(self.binary_path.clone()),
                _ => MediaError::ResolveFailed(e.to_string()),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("Requested format is not available") {
                return Err(MediaError::NoAudioStream);
            }
            return Err(MediaError::ResolveFailed(format!(
                "Exit code: {:?}, stderr: {}",
                output.status.code(),
                stderr.trim()
            )));
        }

        let info: YtDlpInfo = serde_json::from_slice(&output.stdout)
            .map_err(|e| MediaError::ResolveFailed(format!("unreadable yt-dlp output: {}", e)))?;
        info.audio_stream_url()
    }

    async fn download(&self, stream_url: &str, headers: &HashMap<String, String>) -> Result<Vec<u8>, MediaError> {
        let mut request = self.http_client.get(stream_url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MediaError::HttpStatus(status.as_u16()));
        }

        let expected = response.content_length().unwrap_or(0);
        let mut bytes = Vec::with_capacity(expected.min(MAX_DOWNLOAD_BYTES as u64) as usize);
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if bytes.len() + chunk.len() > MAX_DOWNLOAD_BYTES {
                return Err(MediaError::TooLarge(MAX_DOWNLOAD_BYTES));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(bytes)
    }
}

#[async_trait]
impl MediaSource for YtDlpSource {
    async fn fetch_audio(&self, url: &str) -> Result<Vec<u8>, MediaError> {
        let (stream_url, headers) = self.resolve_stream(url).await?;
        let bytes = self.download(&stream_url, &headers).await?;
        tracing::debug!(url, bytes = bytes.len(), "Stream downloaded");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_only_format_accepted() {
        let info: YtDlpInfo = serde_json::from_str(
            r#"{"url": "https://cdn.example/a.m4a", "vcodec": "none", "acodec": "mp4a.40.2",
                "http_headers": {"Referer": "https://www.youtube.com"}}"#,
        )
        .unwrap();
        let (url, headers) = info.audio_stream_url().unwrap();
        assert_eq!(url, "https://cdn.example/a.m4a");
        assert_eq!(headers.get("Referer").map(String::as_str), Some("https://www.youtube.com"));
    }

    #[test]
    fn test_muxed_format_rejected() {
        let info: YtDlpInfo = serde_json::from_str(
            r#"{"url": "https://cdn.example/v.mp4", "vcodec": "avc1", "acodec": "mp4a.40.2"}"#,
        )
        .unwrap();
        assert!(matches!(info.audio_stream_url(), Err(MediaError::NoAudioStream)));
    }

    #[test]
    fn test_missing_url_rejected() {
        let info: YtDlpInfo = serde_json::from_str(r#"{"vcodec": "none"}"#).unwrap();
        assert!(matches!(info.audio_stream_url(), Err(MediaError::NoAudioStream)));
    }

    #[tokio::test]
    async fn test_missing_binary_reported() {
        let source = YtDlpSource::new("/nonexistent/yt-dlp", Duration::from_secs(1)).unwrap();
        assert!(matches!(
            source.check_available().await,
            Err(MediaError::BinaryNotFound(_))
        ));
    }
}
