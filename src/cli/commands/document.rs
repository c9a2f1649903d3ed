//! `docrouter document`: one-shot document operations useful for local
//! testing without standing up the HTTP surface (§4.K, §4.G).

use std::collections::{HashMap, HashSet};

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use console::style;

use crate::cli::DocumentCommand;
use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::intake::UploadRequest;
use crate::repository::ListFilter;

pub async fn run(context: &PipelineContext, command: DocumentCommand) -> anyhow::Result<()> {
    match command {
        DocumentCommand::Upload {
            organization_id,
            uploaded_by,
            path,
        } => {
            let bytes = std::fs::read(&path)?;
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow::anyhow!("path has no file name: {}", path.display()))?
                .to_string();

            let request = UploadRequest {
                name: name.clone(),
                content: BASE64_STANDARD.encode(&bytes),
                tag_ids: HashSet::new(),
                metadata: HashMap::new(),
            };
            let uploaded = context
                .intake
                .upload(&organization_id, &uploaded_by, vec![request])
                .await?;
            let document = &uploaded[0];
            println!(
                "{} uploaded {} as document {}",
                style("\u{2713}").green(),
                document.document_name,
                document.document_id
            );
        }
        DocumentCommand::List { organization_id } => {
            let filter = ListFilter::default().clamp_limit();
            let documents = context.repos.documents.list(&organization_id, &filter).await?;
            for document in documents {
                println!(
                    "{:<24} {:<16} {:?}",
                    document.id, document.user_file_name, document.state
                );
            }
        }
        DocumentCommand::RunLlm {
            organization_id,
            document_id,
            prompt_rev_id,
            force,
        } => {
            let document = context
                .repos
                .documents
                .get(&organization_id, &document_id)
                .await?
                .ok_or_else(|| PipelineError::NotFound(format!("document {document_id}")))?;

            let ocr_text = match context
                .repos
                .ocr_blobs
                .get("ocr", &format!("{document_id}_text"))
                .await?
            {
                Some(blob) => String::from_utf8_lossy(&blob.bytes).into_owned(),
                None => String::new(),
            };

            let prompt_rev_id = prompt_rev_id.unwrap_or_else(|| crate::models::DEFAULT_PROMPT_REV_ID.to_string());
            let result = context
                .orchestrator
                .run_llm(&document.organization_id, &document_id, &prompt_rev_id, &ocr_text, 1, None, force)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result.llm_result)?);
        }
    }
    Ok(())
}
