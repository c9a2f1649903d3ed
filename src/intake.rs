//! Document intake (component K): base64 decoding, MIME inference, dual-blob
//! storage, and registry/queue handoff for newly uploaded documents.
//!
//! Mirrors an `upload_document` route's MIME-inference table, keyed by
//! file extension.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use chrono::Utc;

use crate::converter::DocumentConverter;
use crate::error::{PipelineError, Result};
use crate::models::{new_id, Document, DocumentState, Id};
use crate::repository::Repositories;

/// Fixed extension -> MIME type mapping (§4.K). Anything outside this set
/// is rejected rather than guessed.
const EXTENSION_TO_MIME: &[(&str, &str)] = &[
    (".pdf", "application/pdf"),
    (
        ".docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (".doc", "application/msword"),
    (".csv", "text/csv"),
    (".xls", "application/vnd.ms-excel"),
    (
        ".xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    (".txt", "text/plain"),
];

fn extension_of(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(idx) => file_name[idx..].to_lowercase(),
        None => String::new(),
    }
}

/// Resolves the MIME type for a file name from its extension, failing on
/// anything not in [`EXTENSION_TO_MIME`].
pub fn mime_type_for(file_name: &str) -> Result<&'static str> {
    let ext = extension_of(file_name);
    EXTENSION_TO_MIME
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
        .ok_or_else(|| {
            PipelineError::ValidationFailed(format!(
                "unsupported file extension \"{ext}\": {file_name}"
            ))
        })
}

/// Decodes base64 content that may be a data URL (`data:...;base64,AAAA`)
/// or plain base64.
pub fn decode_base64_content(content: &str) -> Result<Vec<u8>> {
    let b64 = match content.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| PipelineError::ValidationFailed("malformed data URL".to_string()))?,
        None => content,
    };
    BASE64_STANDARD
        .decode(b64)
        .map_err(|e| PipelineError::ValidationFailed(format!("invalid base64 content: {e}")))
}

/// A single document to be uploaded.
pub struct UploadRequest {
    pub name: String,
    pub content: String,
    pub tag_ids: HashSet<Id>,
    pub metadata: HashMap<String, String>,
}

/// Summary of a successfully ingested document, as returned to the caller.
pub struct UploadedDocument {
    pub document_id: Id,
    pub document_name: String,
    pub tag_ids: HashSet<Id>,
    pub metadata: HashMap<String, String>,
}

pub struct DocumentIntake {
    repos: Repositories,
    converter: Arc<dyn DocumentConverter>,
}

impl DocumentIntake {
    pub fn new(repos: Repositories, converter: Arc<dyn DocumentConverter>) -> Self {
        Self { repos, converter }
    }

    /// Ingests one or more documents (§4.K). Validates all requested tags
    /// up front so a partially-invalid batch fails before anything is
    /// written.
    pub async fn upload(
        &self,
        organization_id: &str,
        uploaded_by: &str,
        requests: Vec<UploadRequest>,
    ) -> Result<Vec<UploadedDocument>> {
        let all_tag_ids: HashSet<Id> = requests
            .iter()
            .flat_map(|r| r.tag_ids.iter().cloned())
            .collect();
        if !all_tag_ids.is_empty() {
            let tag_ids: Vec<Id> = all_tag_ids.into_iter().collect();
            self.repos
                .tags
                .validate_tags_exist(organization_id, &tag_ids)
                .await?;
        }

        let mut uploaded = Vec::with_capacity(requests.len());
        for request in requests {
            uploaded.push(self.ingest_one(organization_id, uploaded_by, request).await?);
        }
        Ok(uploaded)
    }

    async fn ingest_one(
        &self,
        organization_id: &str,
        uploaded_by: &str,
        request: UploadRequest,
    ) -> Result<UploadedDocument> {
        let mime_type = mime_type_for(&request.name)?;
        let ext = extension_of(&request.name);
        let content = decode_base64_content(&request.content)?;

        let document_id = new_id();
        let mongo_file_name = format!("{document_id}{ext}");

        let mut metadata = HashMap::new();
        metadata.insert("document_id".to_string(), document_id.clone());
        metadata.insert("type".to_string(), mime_type.to_string());
        metadata.insert("size".to_string(), content.len().to_string());
        metadata.insert("user_file_name".to_string(), request.name.clone());

        self.repos
            .files
            .save("files", &mongo_file_name, &content, metadata.clone())
            .await?;

        let (pdf_id, pdf_file_name) = if mime_type == "application/pdf" {
            (document_id.clone(), mongo_file_name.clone())
        } else {
            let pdf_bytes = self.converter.convert_to_pdf(&content, &ext).await?;
            let pdf_id = new_id();
            let pdf_file_name = format!("{pdf_id}.pdf");
            self.repos
                .files
                .save("files", &pdf_file_name, &pdf_bytes, metadata)
                .await?;
            (pdf_id, pdf_file_name)
        };

        let document = Document {
            id: document_id.clone(),
            organization_id: organization_id.to_string(),
            user_file_name: request.name.clone(),
            mime_type: mime_type.to_string(),
            mongo_file_name,
            pdf_file_name,
            pdf_id,
            upload_date: Utc::now(),
            uploaded_by: uploaded_by.to_string(),
            state: DocumentState::Uploaded,
            state_updated_at: Utc::now(),
            tag_ids: request.tag_ids.clone(),
            metadata: request.metadata.clone(),
        };
        self.repos.documents.insert(&document).await?;

        self.repos
            .ocr_queue
            .send("ocr", serde_json::json!({ "document_id": document_id }))
            .await?;

        Ok(UploadedDocument {
            document_id,
            document_name: request.name,
            tag_ids: request.tag_ids,
            metadata: request.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_resolves_known_extensions() {
        assert_eq!(mime_type_for("report.pdf").unwrap(), "application/pdf");
        assert_eq!(mime_type_for("notes.TXT").unwrap(), "text/plain");
        assert_eq!(mime_type_for("table.CSV").unwrap(), "text/csv");
    }

    #[test]
    fn mime_rejects_unknown_extension() {
        assert!(mime_type_for("archive.zip").is_err());
        assert!(mime_type_for("no_extension").is_err());
    }

    #[test]
    fn decodes_plain_and_data_url_base64() {
        let plain = BASE64_STANDARD.encode(b"hello");
        assert_eq!(decode_base64_content(&plain).unwrap(), b"hello");

        let data_url = format!("data:application/pdf;base64,{plain}");
        assert_eq!(decode_base64_content(&data_url).unwrap(), b"hello");
    }

    #[test]
    fn rejects_malformed_base64() {
        assert!(decode_base64_content("not base64 at all!!").is_err());
    }
}
