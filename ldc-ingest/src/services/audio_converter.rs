//! External audio converter
//!
//! Converts an acquired file into PCM WAV. [`FfmpegConverter`] shells out to
//! `ffmpeg -nostdin -y -i <in> -vn -acodec pcm_s16le <out>`.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

/// Converter errors
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Converter binary not found: {0}")]
    BinaryNotFound(String),

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),
}

/// Converts one audio file into a canonical WAV file
#[async_trait]
pub trait AudioConverter: Send + Sync {
    /// Convert `input` into a WAV file at `output`
    ///
    /// Success means the tool exited cleanly; callers still verify the output exists.
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError>;
}

/// `ffmpeg` subprocess converter
///
/// The child is killed when the conversion future is dropped (e.g. on timeout).
pub struct FfmpegConverter {
    binary_path: String,
}

impl FfmpegConverter {
    pub fn new(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Check that the ffmpeg binary runs
    pub async fn check_available(&self) -> Result<(), ConvertError> {
        match Command::new(&self.binary_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
        {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => Err(ConvertError::ExecutionError(format!(
                "-version exited with {:?}",
                output.status.code()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ConvertError::BinaryNotFound(self.binary_path.clone()))
            }
            Err(e) => Err(ConvertError::ExecutionError(e.to_string())),
        }
    }
}

#[async_trait]
impl AudioConverter for FfmpegConverter {
    async fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        tracing::debug!(
            input = %input.display(),
            output = %output.display(),
            "Running ffmpeg"
        );

        let result = Command::new(&self.binary_path)
            .args(["-nostdin", "-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(input)
            .args(["-vn", "-acodec", "pcm_s16le"])
            .arg(output)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => ConvertError::BinaryNotFound(self.binary_path.clone()),
                _ => ConvertError::ExecutionError(e.to_string()),
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ConvertError::ConversionFailed(format!(
                "Exit code: {:?}, stderr: {}",
                result.status.code(),
                stderr.trim()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_reported() {
        let converter = FfmpegConverter::new("/nonexistent/ffmpeg");
        let result = converter
            .convert(Path::new("/tmp/in.m4a"), Path::new("/tmp/out.wav"))
            .await;
        assert!(matches!(result, Err(ConvertError::BinaryNotFound(_))));
    }
}
