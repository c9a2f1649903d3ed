//! Document registry model and lifecycle state machine.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

/// Document processing state.
///
/// ```text
/// uploaded -> ocr_processing -> ocr_completed -> llm_processing -> llm_completed
///          \-> ocr_failed (terminal for stage) \-> llm_failed (terminal for stage)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Uploaded,
    OcrProcessing,
    OcrCompleted,
    OcrFailed,
    LlmProcessing,
    LlmCompleted,
    LlmFailed,
}

impl DocumentState {
    /// Whether `self -> next` is a legal transition for this state machine.
    ///
    /// Includes the "skip" rule: `Uploaded -> OcrCompleted` is legal for
    /// documents whose format does not support OCR.
    pub fn can_transition_to(self, next: DocumentState) -> bool {
        use DocumentState::*;
        matches!(
            (self, next),
            (Uploaded, OcrProcessing)
                | (Uploaded, OcrCompleted) // non-OCR-capable skip rule
                | (OcrProcessing, OcrCompleted)
                | (OcrProcessing, OcrFailed)
                | (OcrCompleted, LlmProcessing)
                | (LlmProcessing, LlmCompleted)
                | (LlmProcessing, LlmFailed)
        )
    }
}

/// Per-organization document registry row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Id,
    pub organization_id: Id,
    pub user_file_name: String,
    /// MIME type inferred from the original upload's extension at intake.
    pub mime_type: String,
    /// Blob key of the original upload.
    pub mongo_file_name: String,
    /// Blob key of the PDF view; equals `mongo_file_name` when the
    /// original upload was already a PDF.
    pub pdf_file_name: String,
    pub pdf_id: Id,
    pub upload_date: DateTime<Utc>,
    pub uploaded_by: Id,
    pub state: DocumentState,
    pub state_updated_at: DateTime<Utc>,
    pub tag_ids: HashSet<Id>,
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// A document is OCR-capable if its original file is a PDF or image;
    /// other formats skip directly to `ocr_completed`.
    pub fn is_ocr_capable(mime_type: &str) -> bool {
        mime_type == "application/pdf" || mime_type.starts_with("image/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions() {
        assert!(DocumentState::Uploaded.can_transition_to(DocumentState::OcrProcessing));
        assert!(DocumentState::Uploaded.can_transition_to(DocumentState::OcrCompleted));
        assert!(DocumentState::OcrProcessing.can_transition_to(DocumentState::OcrFailed));
        assert!(DocumentState::OcrCompleted.can_transition_to(DocumentState::LlmProcessing));
        assert!(DocumentState::LlmProcessing.can_transition_to(DocumentState::LlmCompleted));
    }

    #[test]
    fn illegal_transitions_rejected() {
        assert!(!DocumentState::Uploaded.can_transition_to(DocumentState::LlmCompleted));
        assert!(!DocumentState::OcrFailed.can_transition_to(DocumentState::LlmProcessing));
        assert!(!DocumentState::LlmCompleted.can_transition_to(DocumentState::Uploaded));
    }

    #[test]
    fn ocr_capability_by_mime() {
        assert!(Document::is_ocr_capable("application/pdf"));
        assert!(Document::is_ocr_capable("image/png"));
        assert!(!Document::is_ocr_capable("text/plain"));
        assert!(!Document::is_ocr_capable(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        ));
    }
}
