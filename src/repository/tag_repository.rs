//! Tag CRUD with referential-integrity-aware deletion (component O).

use bson::doc;
use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::{Collection, Database};

use crate::error::{PipelineError, Result};
use crate::models::{new_id, Id, Tag};
use crate::mongo::collections;

use super::document_registry::DocumentRegistry;
use super::prompt_schema_store::PromptSchemaStore;

#[derive(Clone)]
pub struct TagRepository {
    collection: Collection<Tag>,
}

impl TagRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            collection: db.collection(collections::TAGS),
        }
    }

    pub async fn create(
        &self,
        organization_id: &str,
        name: &str,
        color: Option<String>,
        description: Option<String>,
        created_by: &str,
    ) -> Result<Tag> {
        if self.find_by_name(organization_id, name).await?.is_some() {
            return Err(PipelineError::Conflict(format!("tag \"{name}\" already exists")));
        }
        let tag = Tag {
            id: new_id(),
            organization_id: organization_id.to_string(),
            name: name.to_string(),
            color,
            description,
            created_at: Utc::now(),
            created_by: created_by.to_string(),
        };
        self.collection.insert_one(&tag).await?;
        Ok(tag)
    }

    pub async fn find_by_name(&self, organization_id: &str, name: &str) -> Result<Option<Tag>> {
        Ok(self
            .collection
            .find_one(doc! { "organization_id": organization_id, "name": name })
            .await?)
    }

    pub async fn list(&self, organization_id: &str) -> Result<Vec<Tag>> {
        let cursor = self
            .collection
            .find(doc! { "organization_id": organization_id })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    pub async fn count(&self, organization_id: &str) -> Result<u64> {
        Ok(self
            .collection
            .count_documents(doc! { "organization_id": organization_id })
            .await?)
    }

    pub async fn validate_tags_exist(&self, organization_id: &str, tag_ids: &[Id]) -> Result<()> {
        for tag_id in tag_ids {
            let exists = self
                .collection
                .find_one(doc! { "id": tag_id, "organization_id": organization_id })
                .await?
                .is_some();
            if !exists {
                return Err(PipelineError::ValidationFailed(format!(
                    "tag {tag_id} does not belong to organization {organization_id}"
                )));
            }
        }
        Ok(())
    }

    /// Updates a tag's name/color/description in place.
    pub async fn update(
        &self,
        organization_id: &str,
        tag_id: &str,
        name: String,
        color: Option<String>,
        description: Option<String>,
    ) -> Result<Tag> {
        let result = self
            .collection
            .update_one(
                doc! { "id": tag_id, "organization_id": organization_id },
                doc! { "$set": { "name": &name, "color": bson::to_bson(&color)?, "description": bson::to_bson(&description)? } },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(PipelineError::NotFound(format!("tag {tag_id}")));
        }
        self.collection
            .find_one(doc! { "id": tag_id, "organization_id": organization_id })
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("tag {tag_id}")))
    }

    /// Refuses deletion if the tag is referenced by any document or prompt
    /// revision (§4.O, §8).
    pub async fn delete(
        &self,
        organization_id: &str,
        tag_id: &str,
        documents: &DocumentRegistry,
        prompts: &PromptSchemaStore,
    ) -> Result<()> {
        if documents.any_references_tag(organization_id, tag_id).await? {
            return Err(PipelineError::Conflict(format!(
                "tag {tag_id} is referenced by at least one document"
            )));
        }
        if prompts.any_prompt_references_tag(organization_id, tag_id).await? {
            return Err(PipelineError::Conflict(format!(
                "tag {tag_id} is referenced by at least one prompt revision"
            )));
        }

        let result = self
            .collection
            .delete_one(doc! { "id": tag_id, "organization_id": organization_id })
            .await?;
        if result.deleted_count == 0 {
            return Err(PipelineError::NotFound(format!("tag {tag_id}")));
        }
        Ok(())
    }
}
