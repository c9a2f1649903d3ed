//! Append-only versioned extraction result store (component L).

use bson::doc;
use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::options::FindOneOptions;
use mongodb::{Collection, Database};
use serde_json::Map;

use crate::error::{PipelineError, Result};
use crate::models::{new_id, Id, LlmResult};
use crate::mongo::collections;

#[derive(Clone)]
pub struct ResultStore {
    collection: Collection<LlmResult>,
}

impl ResultStore {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(collections::LLM_RUNS),
        }
    }

    /// Returns the newest revision for `(document_id, prompt_rev_id)`, if any.
    pub async fn latest(&self, document_id: &str, prompt_rev_id: &str) -> Result<Option<LlmResult>> {
        let options = FindOneOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();
        Ok(self
            .collection
            .find_one(doc! { "document_id": document_id, "prompt_rev_id": prompt_rev_id })
            .with_options(options)
            .await?)
    }

    /// All prompt revisions' latest result for the document (§6
    /// `llm/results/{id}/download`).
    pub async fn all_for_document(&self, document_id: &str) -> Result<Vec<LlmResult>> {
        let cursor = self
            .collection
            .find(doc! { "document_id": document_id })
            .sort(doc! { "created_at": -1 })
            .await?;
        let all: Vec<LlmResult> = cursor.try_collect().await?;

        let mut latest_by_prompt: std::collections::HashMap<Id, LlmResult> = std::collections::HashMap::new();
        for result in all {
            latest_by_prompt
                .entry(result.prompt_rev_id.clone())
                .or_insert(result);
        }
        Ok(latest_by_prompt.into_values().collect())
    }

    /// Deletes any existing result for `(document_id, prompt_rev_id)`
    /// (used by `run_llm` when `force=true`, §4.G step 1).
    pub async fn delete_for_pair(&self, document_id: &str, prompt_rev_id: &str) -> Result<()> {
        self.collection
            .delete_many(doc! { "document_id": document_id, "prompt_rev_id": prompt_rev_id })
            .await?;
        Ok(())
    }

    pub async fn delete_all_for_document(&self, document_id: &str) -> Result<()> {
        self.collection
            .delete_many(doc! { "document_id": document_id })
            .await?;
        Ok(())
    }

    /// Persists a new result revision (§4.G step 11).
    pub async fn insert(
        &self,
        document_id: &str,
        prompt_rev_id: &str,
        prompt_id: &str,
        prompt_version: u32,
        llm_result: Map<String, serde_json::Value>,
    ) -> Result<LlmResult> {
        let now = Utc::now();
        let record = LlmResult {
            id: new_id(),
            document_id: document_id.to_string(),
            prompt_rev_id: prompt_rev_id.to_string(),
            prompt_id: prompt_id.to_string(),
            prompt_version,
            updated_llm_result: llm_result.clone(),
            llm_result,
            is_edited: false,
            is_verified: false,
            created_at: now,
            updated_at: now,
        };
        self.collection.insert_one(&record).await?;
        Ok(record)
    }

    /// Rewrites the newest revision's `updated_llm_result`. Rejects writes
    /// whose top-level key set differs from `llm_result`'s (§4.L, §8).
    pub async fn update(
        &self,
        document_id: &str,
        prompt_rev_id: &str,
        updated_llm_result: Map<String, serde_json::Value>,
        is_verified: Option<bool>,
    ) -> Result<LlmResult> {
        let existing = self
            .latest(document_id, prompt_rev_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("result for {document_id}/{prompt_rev_id}")))?;

        let original_keys: std::collections::HashSet<_> = existing.llm_result.keys().cloned().collect();
        let updated_keys: std::collections::HashSet<_> = updated_llm_result.keys().cloned().collect();
        if original_keys != updated_keys {
            return Err(PipelineError::ValidationFailed(
                "updated_llm_result key set must match llm_result's".to_string(),
            ));
        }

        let mut set = doc! {
            "updated_llm_result": bson::to_bson(&updated_llm_result)?,
            "is_edited": true,
            "updated_at": bson::to_bson(&Utc::now())?,
        };
        if let Some(verified) = is_verified {
            set.insert("is_verified", verified);
        }

        self.collection
            .update_one(doc! { "id": existing.id.clone() }, doc! { "$set": set })
            .await?;

        self.latest(document_id, prompt_rev_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("result for {document_id}/{prompt_rev_id}")))
    }
}
