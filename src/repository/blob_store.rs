//! Content-addressed blob storage, keyed by `(bucket, key)`.
//!
//! Mirrors GridFS-backed storage in shape (a `<prefix>.files` document
//! carrying metadata plus a `<prefix>.chunks` collection of ~8 MiB chunks)
//! without depending on the driver's GridFS bucket type, so the
//! delete-then-insert-with-verification ordering is explicit and easy to
//! reason about rather than hidden behind a streaming API.

use std::collections::HashMap;
use std::time::Duration;

use bson::{doc, Binary};
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PipelineError, Result};

/// Chunk size for large blobs (§3 Blob).
pub const CHUNK_SIZE: usize = 8 * 1024 * 1024;

const DELETE_VERIFY_ATTEMPTS: u32 = 3;
const DELETE_VERIFY_INTERVAL: Duration = Duration::from_secs(2);
const DELETE_RETRY_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileDoc {
    bucket: String,
    key: String,
    length: i64,
    metadata: HashMap<String, String>,
    upload_date: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChunkDoc {
    bucket: String,
    key: String,
    n: i32,
    data: Binary,
}

pub struct Blob {
    pub bytes: Vec<u8>,
    pub metadata: HashMap<String, String>,
    pub upload_date: DateTime<Utc>,
}

/// Blob store over a pair of Mongo collections named `{prefix}.files` /
/// `{prefix}.chunks`, e.g. `files`/`ocr`.
#[derive(Clone)]
pub struct BlobStore {
    files: Collection<FileDoc>,
    chunks: Collection<ChunkDoc>,
}

impl BlobStore {
    pub fn new(db: &Database, prefix: &str) -> Self {
        Self {
            files: db.collection(&format!("{prefix}.files")),
            chunks: db.collection(&format!("{prefix}.chunks")),
        }
    }

    pub async fn get(&self, bucket: &str, key: &str) -> Result<Option<Blob>> {
        let filter = doc! { "bucket": bucket, "key": key };
        let Some(file) = self.files.find_one(filter).await? else {
            return Ok(None);
        };

        let mut cursor = self
            .chunks
            .find(doc! { "bucket": bucket, "key": key })
            .sort(doc! { "n": 1 })
            .await?;

        let mut bytes = Vec::with_capacity(file.length.max(0) as usize);
        while let Some(chunk) = cursor.try_next().await? {
            bytes.extend_from_slice(&chunk.data.bytes);
        }

        Ok(Some(Blob {
            bytes,
            metadata: file.metadata,
            upload_date: file.upload_date,
        }))
    }

    /// Deletes any existing blob at `(bucket, key)`, verifies absence, then
    /// inserts `bytes` as 8 MiB chunks (§4.A).
    pub async fn save(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        metadata: HashMap<String, String>,
    ) -> Result<()> {
        self.delete(bucket, key).await?;

        let file = FileDoc {
            bucket: bucket.to_string(),
            key: key.to_string(),
            length: bytes.len() as i64,
            metadata,
            upload_date: Utc::now(),
        };
        self.files.insert_one(&file).await?;

        let chunk_docs: Vec<ChunkDoc> = bytes
            .chunks(CHUNK_SIZE)
            .enumerate()
            .map(|(n, data)| ChunkDoc {
                bucket: bucket.to_string(),
                key: key.to_string(),
                n: n as i32,
                data: Binary {
                    subtype: bson::spec::BinarySubtype::Generic,
                    bytes: data.to_vec(),
                },
            })
            .collect();

        if !chunk_docs.is_empty() {
            self.chunks.insert_many(&chunk_docs).await?;
        }

        Ok(())
    }

    /// Deletes every blob in `bucket` whose key starts with `prefix`, e.g.
    /// the per-page OCR text blobs `{doc_id}_text_page_{i}` whose count
    /// isn't known without first reading the document's page metadata.
    pub async fn delete_prefixed(&self, bucket: &str, prefix: &str) -> Result<()> {
        let filter = doc! {
            "bucket": bucket,
            "key": { "$regex": format!("^{}", regex::escape(prefix)) },
        };
        self.files.delete_many(filter.clone()).await?;
        self.chunks.delete_many(filter).await?;
        Ok(())
    }

    /// Idempotent delete with retry and read-after-delete verification
    /// (§4.A).
    pub async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let filter = doc! { "bucket": bucket, "key": key };

        let mut last_err = None;
        for attempt in 1..=DELETE_RETRY_ATTEMPTS {
            match self.files.delete_many(filter.clone()).await {
                Ok(_) => {
                    last_err = None;
                    break;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "blob delete attempt failed");
                    last_err = Some(e);
                }
            }
        }
        if let Some(e) = last_err {
            return Err(PipelineError::StorageFailed(e.to_string()));
        }
        self.chunks.delete_many(filter.clone()).await?;

        for attempt in 1..=DELETE_VERIFY_ATTEMPTS {
            let still_present = self.files.find_one(filter.clone()).await?.is_some();
            if !still_present {
                return Ok(());
            }
            warn!(attempt, bucket, key, "blob still visible after delete, retrying verification");
            tokio::time::sleep(DELETE_VERIFY_INTERVAL).await;
        }

        Err(PipelineError::StorageFailed(format!(
            "blob {bucket}/{key} still visible after {DELETE_VERIFY_ATTEMPTS} verification attempts"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_respects_chunk_size() {
        let bytes = vec![0u8; CHUNK_SIZE * 2 + 10];
        let chunks: Vec<_> = bytes.chunks(CHUNK_SIZE).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), CHUNK_SIZE);
        assert_eq!(chunks[2].len(), 10);
    }
}
