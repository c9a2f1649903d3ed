//! Non-PDF to PDF conversion for document intake (§4.K).
//!
//! Office document conversion tools (LibreOffice and similar) corrupt their
//! user profile directory under concurrent invocation, so calls are
//! serialized process-wide with an `fs4` advisory file lock bound to a
//! well-known path before shelling out.

use std::path::PathBuf;

use async_trait::async_trait;
use fs4::tokio::AsyncFileExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{PipelineError, Result};

/// Converts a non-PDF document's bytes into a PDF rendering.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert_to_pdf(&self, bytes: &[u8], extension: &str) -> Result<Vec<u8>>;
}

/// Shells out to `libreoffice --headless --convert-to pdf`, serialized by an
/// exclusive lock on `lock_path` so concurrent intake requests don't race
/// LibreOffice's user profile.
pub struct ExternalConverter {
    lock_path: PathBuf,
    binary: String,
}

impl ExternalConverter {
    pub fn new(lock_path: PathBuf) -> Self {
        Self {
            lock_path,
            binary: "libreoffice".to_string(),
        }
    }

    pub fn with_binary(lock_path: PathBuf, binary: impl Into<String>) -> Self {
        Self {
            lock_path,
            binary: binary.into(),
        }
    }

    async fn acquire_lock(&self) -> Result<File> {
        if let Some(parent) = self.lock_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::Other(anyhow::anyhow!(e)))?;
        }
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&self.lock_path)
            .await
            .map_err(|e| PipelineError::Other(anyhow::anyhow!(e)))?;
        file.lock_exclusive()
            .await
            .map_err(|e| PipelineError::Other(anyhow::anyhow!(e)))?;
        Ok(file)
    }
}

#[async_trait]
impl DocumentConverter for ExternalConverter {
    async fn convert_to_pdf(&self, bytes: &[u8], extension: &str) -> Result<Vec<u8>> {
        let lock = self.acquire_lock().await?;

        let dir = tempfile::tempdir().map_err(|e| PipelineError::Other(anyhow::anyhow!(e)))?;
        let input_path = dir.path().join(format!("input{extension}"));
        let mut input_file = File::create(&input_path)
            .await
            .map_err(|e| PipelineError::Other(anyhow::anyhow!(e)))?;
        input_file
            .write_all(bytes)
            .await
            .map_err(|e| PipelineError::Other(anyhow::anyhow!(e)))?;
        input_file
            .flush()
            .await
            .map_err(|e| PipelineError::Other(anyhow::anyhow!(e)))?;

        let output = Command::new(&self.binary)
            .args(["--headless", "--convert-to", "pdf", "--outdir"])
            .arg(dir.path())
            .arg(&input_path)
            .output()
            .await;

        let result = match output {
            Ok(output) if output.status.success() => {
                let pdf_path = input_path.with_extension("pdf");
                tokio::fs::read(&pdf_path)
                    .await
                    .map_err(|e| PipelineError::Other(anyhow::anyhow!(e)))
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(PipelineError::ValidationFailed(format!(
                    "pdf conversion failed: {stderr}"
                )))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(
                PipelineError::Other(anyhow::anyhow!("{} not found on PATH", self.binary)),
            ),
            Err(e) => Err(PipelineError::Other(anyhow::anyhow!(e))),
        };

        let _ = AsyncFileExt::unlock(&lock).await;
        result
    }
}

/// Returns a fixed byte sequence standing in for a converted PDF; used in
/// tests and offline environments without LibreOffice installed.
pub struct FakeConverter;

#[async_trait]
impl DocumentConverter for FakeConverter {
    async fn convert_to_pdf(&self, bytes: &[u8], _extension: &str) -> Result<Vec<u8>> {
        let mut out = b"%PDF-1.4 fake-conversion\n".to_vec();
        out.extend_from_slice(bytes);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_converter_prefixes_pdf_marker() {
        let converter = FakeConverter;
        let out = converter.convert_to_pdf(b"hello", ".txt").await.unwrap();
        assert!(out.starts_with(b"%PDF-1.4"));
    }
}
