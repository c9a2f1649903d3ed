//! Pipeline orchestration (component J): the OCR and LLM queue message
//! handlers driven by the worker pool.
//!
//! Grounded in `analytiq_data/msg_handlers/ocr.py` and
//! `analytiq_data/msg_handlers/llm.py` — each handler claims a message,
//! walks the document through its next state transition, and always deletes
//! (marks complete) the queue message regardless of outcome, routing OCR
//! failures to a companion error queue for diagnostic retention.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info};

use crate::error::{PipelineError, Result};
use crate::llm::LlmOrchestrator;
use crate::models::{Document, DocumentState};
use crate::ocr::{self, OcrAdapter, OcrFeatures};
use crate::repository::{PromptSchemaStore, RevisionSelector, Repositories};
use crate::worker::MessageHandler;

fn document_id_from_payload(msg: &Value) -> Result<String> {
    msg.get("document_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| PipelineError::ValidationFailed("queue message missing document_id".to_string()))
}

/// Handles one OCR-stage queue message end to end (§4.J).
pub struct OcrHandler {
    repos: Repositories,
    adapter: Arc<dyn OcrAdapter>,
}

impl OcrHandler {
    pub fn new(repos: Repositories, adapter: Arc<dyn OcrAdapter>) -> Self {
        Self { repos, adapter }
    }

    /// Processes a single claimed OCR message: on failure the document is
    /// marked `ocr_failed` and the original payload is forwarded to the
    /// `ocr_err` queue, but the handler itself returns `Ok` so the worker
    /// loop marks the message completed rather than retrying it (at-least-
    /// once delivery has already happened; reprocessing is operator-only).
    pub async fn handle(&self, msg: &Value) -> Result<()> {
        let document_id = document_id_from_payload(msg)?;

        if let Err(e) = self.run(&document_id).await {
            error!(document_id, error = %e, "OCR processing failed");
            self.mark_failed(&document_id).await;
            self.repos.ocr_err_queue.forward("ocr", msg.clone()).await?;
        }
        Ok(())
    }

    async fn mark_failed(&self, document_id: &str) {
        if let Ok(Some(document)) = self.repos.documents.get_by_id(document_id).await {
            let _ = self
                .repos
                .documents
                .update_state(&document.organization_id, document_id, DocumentState::OcrFailed)
                .await;
        }
    }

    async fn run(&self, document_id: &str) -> Result<()> {
        let document = self
            .repos
            .documents
            .get_by_id(document_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("document {document_id}")))?;

        self.repos
            .documents
            .update_state(&document.organization_id, document_id, DocumentState::OcrProcessing)
            .await?;

        if !Document::is_ocr_capable(&document.mime_type) {
            self.repos
                .documents
                .update_state(&document.organization_id, document_id, DocumentState::OcrCompleted)
                .await?;
            self.repos
                .llm_queue
                .send("llm", serde_json::json!({ "document_id": document_id }))
                .await?;
            return Ok(());
        }

        let pdf = self.fetch_pdf_with_retry(&document.pdf_file_name).await?;

        let blocks = self.adapter.analyze(&pdf.bytes, OcrFeatures::default()).await?;

        let blocks_json = serde_json::to_vec(&blocks)?;
        self.repos
            .ocr_blobs
            .save("ocr", &format!("{document_id}_json"), &blocks_json, HashMap::new())
            .await?;

        let pages = ocr::page_text_map(&blocks);
        let whole_text = ocr::whole_document_text(&pages);
        let mut whole_text_metadata = HashMap::new();
        whole_text_metadata.insert("n_pages".to_string(), pages.len().to_string());
        self.repos
            .ocr_blobs
            .save(
                "ocr",
                &format!("{document_id}_text"),
                whole_text.as_bytes(),
                whole_text_metadata,
            )
            .await?;
        for (page_number, text) in &pages {
            let page_idx = page_number - 1;
            self.repos
                .ocr_blobs
                .save(
                    "ocr",
                    &format!("{document_id}_text_page_{page_idx}"),
                    text.as_bytes(),
                    HashMap::new(),
                )
                .await?;
        }

        self.repos
            .documents
            .update_state(&document.organization_id, document_id, DocumentState::OcrCompleted)
            .await?;

        self.repos
            .llm_queue
            .send("llm", serde_json::json!({ "document_id": document_id }))
            .await?;

        info!(document_id, pages = pages.len(), "OCR completed");
        Ok(())
    }

    /// Fetches the PDF blob, retrying a few times against the race where
    /// the intake write is not yet visible to a worker reading from a
    /// different connection (§4.D, §4.J, §5).
    const PDF_VISIBILITY_RETRY_ATTEMPTS: u32 = 3;
    const PDF_VISIBILITY_RETRY_INTERVAL: std::time::Duration = std::time::Duration::from_millis(500);

    async fn fetch_pdf_with_retry(&self, pdf_file_name: &str) -> Result<crate::repository::Blob> {
        for attempt in 1..=Self::PDF_VISIBILITY_RETRY_ATTEMPTS {
            if let Some(blob) = self.repos.files.get("files", pdf_file_name).await? {
                return Ok(blob);
            }
            if attempt < Self::PDF_VISIBILITY_RETRY_ATTEMPTS {
                tracing::warn!(pdf_file_name, attempt, "pdf blob not yet visible, retrying");
                tokio::time::sleep(Self::PDF_VISIBILITY_RETRY_INTERVAL).await;
            }
        }
        Err(PipelineError::NotFound(format!("pdf blob {pdf_file_name}")))
    }
}

impl MessageHandler for OcrHandler {
    fn handle<'a>(&'a self, msg: &'a Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(OcrHandler::handle(self, msg))
    }
}

/// Handles one LLM-stage queue message end to end (§4.J).
pub struct LlmHandler {
    repos: Repositories,
    orchestrator: LlmOrchestrator,
}

impl LlmHandler {
    pub fn new(repos: Repositories, orchestrator: LlmOrchestrator) -> Self {
        Self { repos, orchestrator }
    }

    pub async fn handle(&self, msg: &Value) -> Result<()> {
        let document_id = document_id_from_payload(msg)?;

        if let Err(e) = self.run(&document_id).await {
            error!(document_id, error = %e, "LLM processing failed");
            if let Ok(Some(document)) = self.repos.documents.get_by_id(&document_id).await {
                let _ = self
                    .repos
                    .documents
                    .update_state(&document.organization_id, &document_id, DocumentState::LlmFailed)
                    .await;
            }
        }
        Ok(())
    }

    async fn run(&self, document_id: &str) -> Result<()> {
        let document = self
            .repos
            .documents
            .get_by_id(document_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("document {document_id}")))?;

        self.repos
            .documents
            .update_state(&document.organization_id, document_id, DocumentState::LlmProcessing)
            .await?;

        let ocr_text = match self
            .repos
            .ocr_blobs
            .get("ocr", &format!("{document_id}_text"))
            .await?
        {
            Some(blob) => String::from_utf8_lossy(&blob.bytes).into_owned(),
            None => String::new(),
        };
        let pages = self.page_count(document_id).await?;

        let mut prompt_rev_ids = vec![crate::models::DEFAULT_PROMPT_REV_ID.to_string()];
        if !document.tag_ids.is_empty() {
            let tagged = self
                .prompts_schemas()
                .resolve_by_tags(&document.organization_id, &document.tag_ids, RevisionSelector::LatestPerStableId)
                .await?;
            prompt_rev_ids.extend(tagged.into_iter().map(|p| p.prompt_revid));
        }

        let outcomes = self
            .orchestrator
            .run_llm_for_prompt_rev_ids(&document.organization_id, document_id, &prompt_rev_ids, &ocr_text, pages)
            .await;

        let mut failures = Vec::new();
        for (prompt_rev_id, outcome) in outcomes {
            if let Err(e) = outcome {
                error!(document_id, prompt_rev_id, error = %e, "prompt run failed");
                failures.push(prompt_rev_id);
            }
        }
        if failures.len() == prompt_rev_ids.len() {
            return Err(PipelineError::ProviderFatal(format!(
                "every prompt run failed for document {document_id}"
            )));
        }

        self.repos
            .documents
            .update_state(&document.organization_id, document_id, DocumentState::LlmCompleted)
            .await?;
        Ok(())
    }

    fn prompts_schemas(&self) -> &PromptSchemaStore {
        &self.repos.prompts_schemas
    }

    async fn page_count(&self, document_id: &str) -> Result<u64> {
        match ocr::get_blocks_blob(&self.repos.ocr_blobs, document_id).await? {
            Some(blob) => {
                let blocks: Vec<ocr::Block> = serde_json::from_slice(&blob.bytes)?;
                let pages = ocr::page_text_map(&blocks);
                Ok(pages.len().max(1) as u64)
            }
            None => Ok(1),
        }
    }
}

impl MessageHandler for LlmHandler {
    fn handle<'a>(&'a self, msg: &'a Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(LlmHandler::handle(self, msg))
    }
}
