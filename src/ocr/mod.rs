//! OCR adapter abstraction and the derived views built on top of it.
//!
//! A single remote-service backend behind an `OcrAdapter` trait: one async
//! analysis call per document, polled to completion.

mod cloud;
mod fake;

pub use cloud::CloudOcrAdapter;
pub use fake::InMemoryOcrAdapter;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::repository::{Blob, BlobStore};

/// Optional analysis features requested alongside plain text detection.
#[derive(Debug, Clone, Default)]
pub struct OcrFeatures {
    pub tables: bool,
    pub forms: bool,
    pub queries: Vec<String>,
}

/// A single detected block (line, word, page, key/value pair, ...),
/// mirroring the shape of a cloud document-analysis block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub block_type: String,
    pub page: Option<u32>,
    pub text: Option<String>,
    /// `["KEY"]` or `["VALUE"]` for `KEY_VALUE_SET` blocks; empty otherwise.
    pub entity_types: Vec<String>,
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub rel_type: String,
    pub ids: Vec<String>,
}

impl Block {
    fn child_ids(&self) -> Vec<&str> {
        self.relationships
            .iter()
            .find(|r| r.rel_type == "CHILD")
            .map(|r| r.ids.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// `id -> block` for O(1) relationship traversal (§4.D).
pub fn block_map(blocks: &[Block]) -> HashMap<&str, &Block> {
    blocks.iter().map(|b| (b.id.as_str(), b)).collect()
}

/// Concatenates the text of a block's `CHILD` relationship, in order, by
/// looking each child id up in `map`.
fn child_text(block: &Block, map: &HashMap<&str, &Block>) -> String {
    block
        .child_ids()
        .iter()
        .filter_map(|id| map.get(id))
        .filter_map(|b| b.text.as_deref())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pairs inferred from `KEY_VALUE_SET` blocks: each `KEY` block's child text
/// is matched to the child text of the `VALUE` block it relates to via a
/// `VALUE` relationship (§4.D).
pub fn key_value_map(blocks: &[Block]) -> HashMap<String, String> {
    let map = block_map(blocks);
    let mut pairs = HashMap::new();

    for block in blocks {
        if block.block_type != "KEY_VALUE_SET" || !block.entity_types.iter().any(|t| t == "KEY") {
            continue;
        }
        let key_text = child_text(block, &map);
        let value_text = block
            .relationships
            .iter()
            .find(|r| r.rel_type == "VALUE")
            .and_then(|r| r.ids.first())
            .and_then(|id| map.get(id.as_str()))
            .map(|value_block| child_text(value_block, &map))
            .unwrap_or_default();
        if !key_text.is_empty() {
            pairs.insert(key_text, value_text);
        }
    }
    pairs
}

/// Page number -> concatenated `LINE.text + "\n"`, dense (every page from 1
/// to the highest observed page number is present, defaulting to an empty
/// string), sorted by page number (§4.D).
pub fn page_text_map(blocks: &[Block]) -> BTreeMap<u32, String> {
    let mut pages: BTreeMap<u32, String> = BTreeMap::new();
    let mut max_page = 0u32;

    for block in blocks {
        if block.block_type != "LINE" {
            continue;
        }
        let page = block.page.unwrap_or(1);
        max_page = max_page.max(page);
        if let Some(text) = &block.text {
            let entry = pages.entry(page).or_default();
            entry.push_str(text);
            entry.push('\n');
        }
    }

    for page in 1..=max_page.max(1) {
        pages.entry(page).or_default();
    }
    pages
}

/// Whole-document text: pages joined in order, each followed by a blank
/// line, matching the flattened view `run_llm` feeds to the model (§4.G
/// step 6).
pub fn whole_document_text(page_text: &BTreeMap<u32, String>) -> String {
    page_text.values().cloned().collect::<Vec<_>>().join("\n")
}

/// Reads the OCR block-list blob for a document, trying the current
/// `{id}_json` key first and falling back to the legacy `{id}_list` key
/// (§3 OCR Artifact: "legacy key `{doc_id}_list` must also be readable").
pub async fn get_blocks_blob(blobs: &BlobStore, document_id: &str) -> Result<Option<Blob>> {
    if let Some(blob) = blobs.get("ocr", &format!("{document_id}_json")).await? {
        return Ok(Some(blob));
    }
    blobs.get("ocr", &format!("{document_id}_list")).await
}

/// Submits document bytes to OCR, polls to completion, and returns the raw
/// block list (§4.D). Implementations own the ephemeral-key lifecycle: the
/// uploaded bytes must be deleted whether analysis succeeds or fails.
#[async_trait]
pub trait OcrAdapter: Send + Sync {
    async fn analyze(&self, bytes: &[u8], features: OcrFeatures) -> Result<Vec<Block>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, page: u32, text: &str) -> Block {
        Block {
            id: id.to_string(),
            block_type: "LINE".to_string(),
            page: Some(page),
            text: Some(text.to_string()),
            entity_types: vec![],
            relationships: vec![],
        }
    }

    #[test]
    fn page_text_map_is_dense_and_sorted() {
        let blocks = vec![line("l1", 1, "hello"), line("l2", 3, "world")];
        let pages = page_text_map(&blocks);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[&1], "hello\n");
        assert_eq!(pages[&2], "");
        assert_eq!(pages[&3], "world\n");
    }

    #[test]
    fn key_value_map_resolves_pairs() {
        let blocks = vec![
            Block {
                id: "key1".into(),
                block_type: "KEY_VALUE_SET".into(),
                page: Some(1),
                text: None,
                entity_types: vec!["KEY".into()],
                relationships: vec![
                    Relationship { rel_type: "CHILD".into(), ids: vec!["kw1".into()] },
                    Relationship { rel_type: "VALUE".into(), ids: vec!["val1".into()] },
                ],
            },
            Block {
                id: "kw1".into(),
                block_type: "WORD".into(),
                page: Some(1),
                text: Some("Invoice".into()),
                entity_types: vec![],
                relationships: vec![],
            },
            Block {
                id: "val1".into(),
                block_type: "KEY_VALUE_SET".into(),
                page: Some(1),
                text: None,
                entity_types: vec!["VALUE".into()],
                relationships: vec![Relationship { rel_type: "CHILD".into(), ids: vec!["vw1".into()] }],
            },
            Block {
                id: "vw1".into(),
                block_type: "WORD".into(),
                page: Some(1),
                text: Some("12345".into()),
                entity_types: vec![],
                relationships: vec![],
            },
        ];
        let kv = key_value_map(&blocks);
        assert_eq!(kv.get("Invoice"), Some(&"12345".to_string()));
    }

    #[test]
    fn whole_document_text_joins_pages_in_order() {
        let blocks = vec![line("l1", 1, "first"), line("l2", 2, "second")];
        let pages = page_text_map(&blocks);
        assert_eq!(whole_document_text(&pages), "first\n\nsecond\n");
    }
}
