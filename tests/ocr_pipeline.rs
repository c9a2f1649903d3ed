//! End-to-end (no-database) walk of a document from upload through OCR
//! derived-view construction: the non-OCR-capable skip rule for a CSV
//! upload, and the full block-list -> page-text -> whole-document-text
//! chain for a PDF upload with a key/value pair (§8 scenarios 1-2).

use std::collections::{HashMap, HashSet};

use docrouter::models::{Document, DocumentState};
use docrouter::ocr::{self, Block, Relationship};

fn new_document(mime_type: &str) -> Document {
    Document {
        id: "doc1".to_string(),
        organization_id: "org1".to_string(),
        user_file_name: "invoice.pdf".to_string(),
        mime_type: mime_type.to_string(),
        mongo_file_name: "doc1.pdf".to_string(),
        pdf_file_name: "doc1.pdf".to_string(),
        pdf_id: "doc1".to_string(),
        upload_date: chrono::Utc::now(),
        uploaded_by: "user1".to_string(),
        state: DocumentState::Uploaded,
        state_updated_at: chrono::Utc::now(),
        tag_ids: HashSet::new(),
        metadata: HashMap::new(),
    }
}

#[test]
fn csv_upload_skips_ocr_straight_to_completed() {
    let document = new_document("text/csv");
    assert!(!Document::is_ocr_capable(&document.mime_type));
    assert!(document.state.can_transition_to(DocumentState::OcrCompleted));
    assert!(!document.state.can_transition_to(DocumentState::OcrProcessing));
}

#[test]
fn pdf_upload_goes_through_ocr_processing() {
    let document = new_document("application/pdf");
    assert!(Document::is_ocr_capable(&document.mime_type));
    assert!(document.state.can_transition_to(DocumentState::OcrProcessing));
    assert!(!document.state.can_transition_to(DocumentState::OcrCompleted));
}

fn key_value_blocks() -> Vec<Block> {
    vec![
        Block {
            id: "line1".into(),
            block_type: "LINE".into(),
            page: Some(1),
            text: Some("Invoice #4471".into()),
            entity_types: vec![],
            relationships: vec![],
        },
        Block {
            id: "line2".into(),
            block_type: "LINE".into(),
            page: Some(2),
            text: Some("Total due: $812.00".into()),
            entity_types: vec![],
            relationships: vec![],
        },
        Block {
            id: "kv_key".into(),
            block_type: "KEY_VALUE_SET".into(),
            page: Some(1),
            text: None,
            entity_types: vec!["KEY".into()],
            relationships: vec![
                Relationship { rel_type: "CHILD".into(), ids: vec!["kw".into()] },
                Relationship { rel_type: "VALUE".into(), ids: vec!["kv_value".into()] },
            ],
        },
        Block {
            id: "kw".into(),
            block_type: "WORD".into(),
            page: Some(1),
            text: Some("Invoice Number".into()),
            entity_types: vec![],
            relationships: vec![],
        },
        Block {
            id: "kv_value".into(),
            block_type: "KEY_VALUE_SET".into(),
            page: Some(1),
            text: None,
            entity_types: vec!["VALUE".into()],
            relationships: vec![Relationship { rel_type: "CHILD".into(), ids: vec!["vw".into()] }],
        },
        Block {
            id: "vw".into(),
            block_type: "WORD".into(),
            page: Some(1),
            text: Some("4471".into()),
            entity_types: vec![],
            relationships: vec![],
        },
    ]
}

#[test]
fn ocr_blocks_derive_pages_whole_text_and_key_value_pairs() {
    let blocks = key_value_blocks();

    let pages = ocr::page_text_map(&blocks);
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[&1], "Invoice #4471\n");
    assert_eq!(pages[&2], "Total due: $812.00\n");

    let whole_text = ocr::whole_document_text(&pages);
    assert_eq!(whole_text, "Invoice #4471\n\nTotal due: $812.00\n");

    let pairs = ocr::key_value_map(&blocks);
    assert_eq!(pairs.get("Invoice Number").map(String::as_str), Some("4471"));
}
