//! In-memory `OcrAdapter` fake for tests and local development without a
//! live OCR service: a deterministic stand-in behind the same trait as the
//! real backend.

use async_trait::async_trait;

use crate::error::Result;

use super::{Block, OcrAdapter, OcrFeatures, Relationship};

/// Treats input bytes as UTF-8 text, one line per `LINE` block, all on
/// page 1. Good enough to exercise the derived-view pipeline without a
/// network dependency.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOcrAdapter;

#[async_trait]
impl OcrAdapter for InMemoryOcrAdapter {
    async fn analyze(&self, bytes: &[u8], _features: OcrFeatures) -> Result<Vec<Block>> {
        let text = String::from_utf8_lossy(bytes);
        let blocks = text
            .lines()
            .enumerate()
            .map(|(i, line)| Block {
                id: format!("line-{i}"),
                block_type: "LINE".to_string(),
                page: Some(1),
                text: Some(line.to_string()),
                entity_types: vec![],
                relationships: vec![Relationship { rel_type: "CHILD".to_string(), ids: vec![] }],
            })
            .collect();
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::page_text_map;

    #[tokio::test]
    async fn produces_one_line_block_per_input_line() {
        let adapter = InMemoryOcrAdapter;
        let blocks = adapter
            .analyze(b"first line\nsecond line", OcrFeatures::default())
            .await
            .unwrap();
        assert_eq!(blocks.len(), 2);
        let pages = page_text_map(&blocks);
        assert_eq!(pages[&1], "first line\nsecond line\n");
    }
}
