//! Per-organization document registry (component B).

use bson::doc;
use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::{options::FindOptions, Collection, Database};

use crate::error::{PipelineError, Result};
use crate::models::{Document, DocumentState, Id};
use crate::mongo::collections;

use super::blob_store::BlobStore;
use super::result_store::ResultStore;

#[derive(Debug, Default, Clone)]
pub struct ListFilter {
    pub skip: u64,
    pub limit: u64,
    pub tag_ids: Vec<Id>,
    pub name_search: Option<String>,
    /// Parsed `key=value` pairs from the `metadata_search` query param.
    pub metadata_search: Vec<(String, String)>,
}

impl ListFilter {
    /// Parses the comma-separated, URL-decoded `metadata_search` query
    /// parameter into `(key, value)` pairs (§4.B).
    pub fn parse_metadata_search(raw: &str) -> Vec<(String, String)> {
        raw.split(',')
            .filter_map(|pair| {
                let decoded = urlencoding::decode(pair).ok()?.into_owned();
                let (k, v) = decoded.split_once('=')?;
                Some((k.trim().to_string(), v.trim().to_string()))
            })
            .collect()
    }

    /// Clamps `limit` to `[1, 100]` per the boundary behavior in §8.
    pub fn clamp_limit(mut self) -> Self {
        self.limit = self.limit.clamp(1, 100);
        self
    }
}

#[derive(Clone)]
pub struct DocumentRegistry {
    docs: Collection<Document>,
    blobs: BlobStore,
    ocr_blobs: BlobStore,
    results: ResultStore,
}

impl DocumentRegistry {
    pub fn new(db: &Database, blobs: BlobStore, ocr_blobs: BlobStore, results: ResultStore) -> Self {
        Self {
            docs: db.collection(collections::DOCS),
            blobs,
            ocr_blobs,
            results,
        }
    }

    pub async fn get(&self, organization_id: &str, id: &str) -> Result<Option<Document>> {
        Ok(self
            .docs
            .find_one(doc! { "id": id, "organization_id": organization_id })
            .await?)
    }

    /// Looks a document up by id alone, without an organization filter.
    /// Used by the pipeline workers, whose queue messages only carry
    /// `document_id` (§4.J).
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.docs.find_one(doc! { "id": id }).await?)
    }

    pub async fn insert(&self, document: &Document) -> Result<()> {
        self.docs.insert_one(document).await?;
        Ok(())
    }

    fn list_query(organization_id: &str, filter: &ListFilter) -> bson::Document {
        let mut query = doc! { "organization_id": organization_id };

        if !filter.tag_ids.is_empty() {
            query.insert("tag_ids", doc! { "$all": filter.tag_ids.clone() });
        }
        if let Some(name) = &filter.name_search {
            query.insert(
                "user_file_name",
                doc! { "$regex": name, "$options": "i" },
            );
        }
        for (key, value) in &filter.metadata_search {
            query.insert(format!("metadata.{key}"), doc! { "$regex": value });
        }
        query
    }

    pub async fn list(&self, organization_id: &str, filter: &ListFilter) -> Result<Vec<Document>> {
        let query = Self::list_query(organization_id, filter);

        let options = FindOptions::builder()
            .sort(doc! { "upload_date": -1 })
            .skip(filter.skip)
            .limit(filter.limit as i64)
            .build();

        let cursor = self.docs.find(query).with_options(options).await?;
        Ok(cursor.try_collect().await?)
    }

    /// Total matches for `filter`, ignoring `skip`/`limit` (§6 listing
    /// endpoints report a page alongside the unpaginated total).
    pub async fn count(&self, organization_id: &str, filter: &ListFilter) -> Result<u64> {
        let query = Self::list_query(organization_id, filter);
        Ok(self.docs.count_documents(query).await?)
    }

    pub async fn update_state(&self, organization_id: &str, id: &str, next: DocumentState) -> Result<()> {
        let current = self
            .get(organization_id, id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("document {id}")))?;

        if !current.state.can_transition_to(next) {
            return Err(PipelineError::StateInvalidTransition(format!(
                "{:?} -> {:?}",
                current.state, next
            )));
        }

        self.docs
            .update_one(
                doc! { "id": id, "organization_id": organization_id },
                doc! { "$set": { "state": bson::to_bson(&next)?, "state_updated_at": bson::to_bson(&Utc::now())? } },
            )
            .await?;
        Ok(())
    }

    pub async fn update_metadata(
        &self,
        organization_id: &str,
        id: &str,
        user_file_name: Option<String>,
        tag_ids: Option<std::collections::HashSet<Id>>,
        metadata: Option<std::collections::HashMap<String, String>>,
    ) -> Result<()> {
        let mut set = doc! {};
        if let Some(name) = user_file_name {
            set.insert("user_file_name", name);
        }
        if let Some(tags) = tag_ids {
            set.insert("tag_ids", bson::to_bson(&tags)?);
        }
        if let Some(meta) = metadata {
            set.insert("metadata", bson::to_bson(&meta)?);
        }
        if set.is_empty() {
            return Ok(());
        }

        let result = self
            .docs
            .update_one(
                doc! { "id": id, "organization_id": organization_id },
                doc! { "$set": set },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(PipelineError::NotFound(format!("document {id}")));
        }
        Ok(())
    }

    /// Whether any document in the organization references `tag_id`
    /// (referential integrity check for tag deletion, §4.O).
    pub async fn any_references_tag(&self, organization_id: &str, tag_id: &str) -> Result<bool> {
        Ok(self
            .docs
            .find_one(doc! { "organization_id": organization_id, "tag_ids": tag_id })
            .await?
            .is_some())
    }

    /// Deletes the registry row, both blobs (if distinct), all OCR
    /// artifacts, and all result revisions for the document (§4.B, §8).
    pub async fn delete(&self, organization_id: &str, id: &str) -> Result<()> {
        let document = self
            .get(organization_id, id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("document {id}")))?;

        self.blobs.delete("files", &document.mongo_file_name).await?;
        if document.pdf_file_name != document.mongo_file_name {
            self.blobs.delete("files", &document.pdf_file_name).await?;
        }

        for key in [
            format!("{id}_json"),
            format!("{id}_list"),
            format!("{id}_text"),
        ] {
            self.ocr_blobs.delete("ocr", &key).await?;
        }
        self.ocr_blobs.delete_prefixed("ocr", &format!("{id}_text_page_")).await?;

        self.results.delete_all_for_document(id).await?;

        self.docs
            .delete_one(doc! { "id": id, "organization_id": organization_id })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_search_parses_key_value_pairs() {
        let parsed = ListFilter::parse_metadata_search("invoice%20no=123,vendor=Acme");
        assert_eq!(
            parsed,
            vec![
                ("invoice no".to_string(), "123".to_string()),
                ("vendor".to_string(), "Acme".to_string()),
            ]
        );
    }

    #[test]
    fn limit_clamped_to_valid_range() {
        let f = ListFilter { limit: 0, ..Default::default() }.clamp_limit();
        assert_eq!(f.limit, 1);
        let f = ListFilter { limit: 500, ..Default::default() }.clamp_limit();
        assert_eq!(f.limit, 100);
        let f = ListFilter { limit: 50, ..Default::default() }.clamp_limit();
        assert_eq!(f.limit, 50);
    }
}
