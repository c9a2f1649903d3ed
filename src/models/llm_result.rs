//! Append-only versioned extraction result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;

use super::Id;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResult {
    pub id: Id,
    pub document_id: Id,
    pub prompt_rev_id: Id,
    pub prompt_id: Id,
    pub prompt_version: u32,
    /// The provider's original response, with keys already reordered to
    /// match the bound schema (§4.G step 9).
    pub llm_result: Map<String, serde_json::Value>,
    /// Editable copy; key set must always equal `llm_result`'s.
    pub updated_llm_result: Map<String, serde_json::Value>,
    pub is_edited: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LlmResult {
    /// `updated_llm_result.keys() == llm_result.keys()` (§8 invariant).
    pub fn key_sets_match(&self) -> bool {
        let a: std::collections::HashSet<_> = self.llm_result.keys().collect();
        let b: std::collections::HashSet<_> = self.updated_llm_result.keys().collect();
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> LlmResult {
        let mut m = Map::new();
        m.insert("a".into(), json!(1));
        m.insert("b".into(), json!(2));
        LlmResult {
            id: "id".into(),
            document_id: "doc".into(),
            prompt_rev_id: "default".into(),
            prompt_id: "default".into(),
            prompt_version: 1,
            llm_result: m.clone(),
            updated_llm_result: m,
            is_edited: false,
            is_verified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn matching_key_sets() {
        assert!(sample().key_sets_match());
    }

    #[test]
    fn mismatched_key_sets_detected() {
        let mut r = sample();
        r.updated_llm_result.remove("b");
        assert!(!r.key_sets_match());
    }
}
