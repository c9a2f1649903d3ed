//! Versioned prompt and schema store with tag-filtered lookup (component F).

use std::collections::{HashMap, HashSet};

use bson::doc;
use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::{Collection, Database};

use crate::error::Result;
use crate::models::{new_id, Id, JsonSchemaSpec, PromptRevision, ResponseFormat, SchemaRevision};
use crate::mongo::collections;

/// Whether a tag-set lookup should return every matching revision, or only
/// the latest version per stable id among the matches (§4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevisionSelector {
    All,
    LatestPerStableId,
}

#[derive(Clone)]
pub struct PromptSchemaStore {
    prompts: Collection<PromptRevision>,
    schemas: Collection<SchemaRevision>,
}

impl PromptSchemaStore {
    pub fn new(db: &Database) -> Self {
        Self {
            prompts: db.collection(collections::PROMPT_REVISIONS),
            schemas: db.collection(collections::SCHEMA_REVISIONS),
        }
    }

    async fn next_prompt_version(&self, prompt_id: &str) -> Result<u32> {
        let max = self
            .prompts
            .find(doc! { "prompt_id": prompt_id })
            .sort(doc! { "prompt_version": -1 })
            .limit(1)
            .await?
            .try_next()
            .await?
            .map(|p| p.prompt_version)
            .unwrap_or(0);
        Ok(max + 1)
    }

    /// Creates a new prompt revision. When `prompt_id` is `None`, a new
    /// stable id is minted (version 1); otherwise a new revision is
    /// appended at `version = max(existing) + 1` (§4.F).
    pub async fn create_prompt_revision(
        &self,
        prompt_id: Option<Id>,
        name: String,
        content: String,
        schema_id: Option<Id>,
        schema_version: Option<u32>,
        tag_ids: HashSet<Id>,
        model: String,
        organization_id: Id,
        created_by: Id,
    ) -> Result<PromptRevision> {
        let prompt_id = prompt_id.unwrap_or_else(new_id);
        let version = self.next_prompt_version(&prompt_id).await?;

        let revision = PromptRevision {
            prompt_id,
            prompt_revid: new_id(),
            prompt_version: version,
            name,
            content,
            schema_id,
            schema_version,
            tag_ids,
            model,
            created_at: Utc::now(),
            created_by,
            organization_id,
        };
        self.prompts.insert_one(&revision).await?;
        Ok(revision)
    }

    pub async fn get_prompt_revision(&self, prompt_revid: &str) -> Result<Option<PromptRevision>> {
        Ok(self
            .prompts
            .find_one(doc! { "prompt_revid": prompt_revid })
            .await?)
    }

    /// Resolves `(name, version) -> revid` (§4.F).
    pub async fn resolve_prompt_by_name_version(
        &self,
        organization_id: &str,
        name: &str,
        version: u32,
    ) -> Result<Option<PromptRevision>> {
        Ok(self
            .prompts
            .find_one(doc! {
                "organization_id": organization_id,
                "name": name,
                "prompt_version": version as i64,
            })
            .await?)
    }

    /// Resolves the set of prompt revisions whose `tag_ids` intersects
    /// `tags`, optionally collapsing to the latest version per stable id
    /// among the matches (§4.F, used by the LLM handler in §4.J).
    pub async fn resolve_by_tags(
        &self,
        organization_id: &str,
        tags: &HashSet<Id>,
        selector: RevisionSelector,
    ) -> Result<Vec<PromptRevision>> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let cursor = self
            .prompts
            .find(doc! {
                "organization_id": organization_id,
                "tag_ids": { "$in": tags.iter().cloned().collect::<Vec<_>>() },
            })
            .await?;
        let matches: Vec<PromptRevision> = cursor.try_collect().await?;

        match selector {
            RevisionSelector::All => Ok(matches),
            RevisionSelector::LatestPerStableId => {
                let mut latest: HashMap<Id, PromptRevision> = HashMap::new();
                for candidate in matches {
                    latest
                        .entry(candidate.prompt_id.clone())
                        .and_modify(|existing| {
                            if candidate.prompt_version > existing.prompt_version {
                                *existing = candidate.clone();
                            }
                        })
                        .or_insert(candidate);
                }
                Ok(latest.into_values().collect())
            }
        }
    }

    /// Lists the latest revision of every prompt stable id in the
    /// organization, for the prompts listing endpoint (§4.F, §6).
    pub async fn list_prompts(&self, organization_id: &str) -> Result<Vec<PromptRevision>> {
        let cursor = self
            .prompts
            .find(doc! { "organization_id": organization_id })
            .sort(doc! { "prompt_version": -1 })
            .await?;
        let all: Vec<PromptRevision> = cursor.try_collect().await?;

        let mut latest: HashMap<Id, PromptRevision> = HashMap::new();
        for revision in all {
            latest.entry(revision.prompt_id.clone()).or_insert(revision);
        }
        Ok(latest.into_values().collect())
    }

    pub async fn any_prompt_references_tag(&self, organization_id: &str, tag_id: &str) -> Result<bool> {
        Ok(self
            .prompts
            .find_one(doc! { "organization_id": organization_id, "tag_ids": tag_id })
            .await?
            .is_some())
    }

    async fn next_schema_version(&self, schema_id: &str) -> Result<u32> {
        let max = self
            .schemas
            .find(doc! { "schema_id": schema_id })
            .sort(doc! { "schema_version": -1 })
            .limit(1)
            .await?
            .try_next()
            .await?
            .map(|s| s.schema_version)
            .unwrap_or(0);
        Ok(max + 1)
    }

    pub async fn create_schema_revision(
        &self,
        schema_id: Option<Id>,
        name: String,
        spec: JsonSchemaSpec,
        organization_id: Id,
        created_by: Id,
    ) -> Result<SchemaRevision> {
        spec.validate()?;

        let schema_id = schema_id.unwrap_or_else(new_id);
        let version = self.next_schema_version(&schema_id).await?;

        let revision = SchemaRevision {
            schema_id,
            schema_revid: new_id(),
            schema_version: version,
            name,
            response_format: ResponseFormat::JsonSchema { json_schema: spec },
            organization_id,
            created_at: Utc::now(),
            created_by,
        };
        self.schemas.insert_one(&revision).await?;
        Ok(revision)
    }

    /// Lists the latest revision of every schema stable id in the
    /// organization (§4.F, §6).
    pub async fn list_schemas(&self, organization_id: &str) -> Result<Vec<SchemaRevision>> {
        let cursor = self
            .schemas
            .find(doc! { "organization_id": organization_id })
            .sort(doc! { "schema_version": -1 })
            .await?;
        let all: Vec<SchemaRevision> = cursor.try_collect().await?;

        let mut latest: HashMap<Id, SchemaRevision> = HashMap::new();
        for revision in all {
            latest.entry(revision.schema_id.clone()).or_insert(revision);
        }
        Ok(latest.into_values().collect())
    }

    pub async fn get_schema_revision(&self, schema_id: &str, schema_version: u32) -> Result<Option<SchemaRevision>> {
        Ok(self
            .schemas
            .find_one(doc! { "schema_id": schema_id, "schema_version": schema_version as i64 })
            .await?)
    }

    /// Resolves the schema bound to a prompt revision, if any (§4.F).
    pub async fn resolve_bound_schema(&self, prompt: &PromptRevision) -> Result<Option<SchemaRevision>> {
        match (&prompt.schema_id, prompt.schema_version) {
            (Some(schema_id), Some(version)) => self.get_schema_revision(schema_id, version).await,
            _ => Ok(None),
        }
    }
}
