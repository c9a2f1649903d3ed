//! Remote document-analysis OCR backend.
//!
//! Uploads bytes to an ephemeral key, kicks off an async analysis job,
//! polls until terminal, paginates the block list, and always deletes the
//! ephemeral key regardless of outcome (§4.D).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::{PipelineError, Result};

use super::{Block, OcrAdapter, OcrFeatures};

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLLS: u32 = 600;

#[derive(Debug, Deserialize)]
struct StartJobResponse {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    status: String,
}

#[derive(Debug, Deserialize)]
struct BlocksPage {
    blocks: Vec<Block>,
    next_token: Option<String>,
}

pub struct CloudOcrAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    upload_bucket: String,
}

impl CloudOcrAdapter {
    pub fn new(base_url: String, api_key: String, upload_bucket: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            upload_bucket,
        }
    }

    async fn upload(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.client
            .put(format!("{}/buckets/{}/objects/{key}", self.base_url, self.upload_bucket))
            .bearer_auth(&self.api_key)
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| PipelineError::OcrFailed(format!("upload failed: {e}")))?
            .error_for_status()
            .map_err(|e| PipelineError::OcrFailed(format!("upload rejected: {e}")))?;
        Ok(())
    }

    async fn start_job(&self, key: &str, features: &OcrFeatures) -> Result<String> {
        let feature_list: Vec<&str> = [
            features.tables.then_some("TABLES"),
            features.forms.then_some("FORMS"),
        ]
        .into_iter()
        .flatten()
        .collect();

        let response: StartJobResponse = self
            .client
            .post(format!("{}/analysis/start", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "bucket": self.upload_bucket,
                "key": key,
                "feature_types": feature_list,
                "queries": features.queries,
            }))
            .send()
            .await
            .map_err(|e| PipelineError::OcrFailed(format!("start analysis failed: {e}")))?
            .error_for_status()
            .map_err(|e| PipelineError::OcrFailed(format!("start analysis rejected: {e}")))?
            .json()
            .await
            .map_err(|e| PipelineError::OcrFailed(format!("malformed start-job response: {e}")))?;
        Ok(response.job_id)
    }

    async fn poll_until_terminal(&self, job_id: &str) -> Result<()> {
        for _ in 0..MAX_POLLS {
            let status: JobStatusResponse = self
                .client
                .get(format!("{}/analysis/{job_id}/status", self.base_url))
                .bearer_auth(&self.api_key)
                .send()
                .await
                .map_err(|e| PipelineError::OcrFailed(format!("status poll failed: {e}")))?
                .json()
                .await
                .map_err(|e| PipelineError::OcrFailed(format!("malformed status response: {e}")))?;

            match status.status.as_str() {
                "SUCCEEDED" => return Ok(()),
                "FAILED" => return Err(PipelineError::OcrFailed(format!("job {job_id} failed"))),
                _ => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
        Err(PipelineError::OcrFailed(format!(
            "job {job_id} did not reach a terminal state after {MAX_POLLS} polls"
        )))
    }

    async fn fetch_all_blocks(&self, job_id: &str) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(format!("{}/analysis/{job_id}/blocks", self.base_url))
                .bearer_auth(&self.api_key);
            if let Some(t) = &token {
                request = request.query(&[("next_token", t)]);
            }

            let page: BlocksPage = request
                .send()
                .await
                .map_err(|e| PipelineError::OcrFailed(format!("block page fetch failed: {e}")))?
                .json()
                .await
                .map_err(|e| PipelineError::OcrFailed(format!("malformed block page: {e}")))?;

            blocks.extend(page.blocks);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(blocks)
    }

    async fn delete(&self, key: &str) {
        let result = self
            .client
            .delete(format!("{}/buckets/{}/objects/{key}", self.base_url, self.upload_bucket))
            .bearer_auth(&self.api_key)
            .send()
            .await;
        if let Err(e) = result {
            warn!(key, error = %e, "failed to delete ephemeral OCR upload key");
        }
    }
}

#[async_trait]
impl OcrAdapter for CloudOcrAdapter {
    async fn analyze(&self, bytes: &[u8], features: OcrFeatures) -> Result<Vec<Block>> {
        let key = format!("ocr-ephemeral/{}", Uuid::new_v4());

        self.upload(&key, bytes).await?;

        let outcome = async {
            let job_id = self.start_job(&key, &features).await?;
            self.poll_until_terminal(&job_id).await?;
            self.fetch_all_blocks(&job_id).await
        }
        .await;

        self.delete(&key).await;
        outcome
    }
}
