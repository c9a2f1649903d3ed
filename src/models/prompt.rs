//! Versioned prompt model.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

/// Stable identifier of the built-in prompt returning document
/// classification JSON (`document_type`, `document_date`, `summary`).
pub const DEFAULT_PROMPT_REV_ID: &str = "default";

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Fixed system message prepended to every LLM call, enforcing JSON-only
/// output (§4.G step 6).
pub const SYSTEM_MESSAGE: &str =
    "You are a document extraction assistant. Respond with ONLY valid JSON. \
     Do not include markdown formatting, code fences, or any prose outside the JSON object.";

/// Separator placed between the prompt content and the OCR text it is
/// run against.
pub const OCR_TEXT_SEPARATOR: &str = "\n\n---\nDocument text:\n---\n\n";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRevision {
    pub prompt_id: Id,
    pub prompt_revid: Id,
    pub prompt_version: u32,
    pub name: String,
    pub content: String,
    pub schema_id: Option<Id>,
    pub schema_version: Option<u32>,
    pub tag_ids: HashSet<Id>,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub created_by: Id,
    pub organization_id: Id,
}

impl PromptRevision {
    /// The built-in default prompt: document classification, unbound to a
    /// schema, always applicable (every document gets a run of it).
    pub fn default_prompt(organization_id: Id, created_by: Id) -> Self {
        Self {
            prompt_id: DEFAULT_PROMPT_REV_ID.to_string(),
            prompt_revid: DEFAULT_PROMPT_REV_ID.to_string(),
            prompt_version: 1,
            name: "default".to_string(),
            content: "Classify this document. Respond with JSON containing exactly these keys: \
                      document_type (a short category label), document_date (the document's own \
                      date if present, else an empty string), and summary (a one or two sentence \
                      summary)."
                .to_string(),
            schema_id: None,
            schema_version: None,
            tag_ids: HashSet::new(),
            model: DEFAULT_MODEL.to_string(),
            created_at: Utc::now(),
            created_by,
            organization_id,
        }
    }

    pub fn is_default(&self) -> bool {
        self.prompt_revid == DEFAULT_PROMPT_REV_ID
    }
}
