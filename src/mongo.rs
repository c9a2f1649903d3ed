//! MongoDB client setup and collection name constants.
//!
//! Collection names mirror the persisted-state layout exactly, so an
//! operator inspecting the database with `mongosh` sees the same shape
//! documented for the data model.

use bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Database, IndexModel};

use crate::config::Settings;

pub mod collections {
    pub const DOCS: &str = "docs";
    pub const FILES_FILES: &str = "files.files";
    pub const FILES_CHUNKS: &str = "files.chunks";
    pub const OCR_FILES: &str = "ocr.files";
    pub const OCR_CHUNKS: &str = "ocr.chunks";
    pub const QUEUE_OCR: &str = "ocr";
    pub const QUEUE_OCR_ERR: &str = "ocr_err";
    pub const QUEUE_LLM: &str = "llm";
    pub const TAGS: &str = "tags";
    pub const SCHEMA_REVISIONS: &str = "schema_revisions";
    pub const PROMPT_REVISIONS: &str = "prompt_revisions";
    pub const LLM_RUNS: &str = "llm_runs";
    pub const LLM_PROVIDERS: &str = "llm_providers";
    pub const ORGANIZATIONS: &str = "organizations";
    pub const USERS: &str = "users";
    pub const ACCESS_TOKENS: &str = "access_tokens";
}

/// Connects to the configured Mongo deployment and returns a handle to the
/// logical database named by `settings.env`.
pub async fn connect(settings: &Settings) -> anyhow::Result<Database> {
    let client = Client::with_uri_str(&settings.mongodb_uri).await?;
    Ok(client.database(&settings.env))
}

fn unique_index(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

/// Creates the indexes the query patterns above rely on for performance and
/// uniqueness, called once by `docrouter init` (there is no Mongo analogue
/// to a SQL migration tool, so this runs as an idempotent reconciliation
/// rather than a numbered migration).
pub async fn ensure_indexes(db: &Database) -> anyhow::Result<()> {
    db.collection::<bson::Document>(collections::DOCS)
        .create_indexes(vec![
            unique_index(doc! { "id": 1 }),
            index(doc! { "organization_id": 1, "upload_date": -1 }),
            index(doc! { "organization_id": 1, "tag_ids": 1 }),
        ])
        .await?;

    for queue in [collections::QUEUE_OCR, collections::QUEUE_OCR_ERR, collections::QUEUE_LLM] {
        db.collection::<bson::Document>(queue)
            .create_indexes(vec![index(doc! { "status": 1, "created_at": 1 })])
            .await?;
    }

    db.collection::<bson::Document>(collections::TAGS)
        .create_indexes(vec![unique_index(doc! { "organization_id": 1, "name": 1 })])
        .await?;

    db.collection::<bson::Document>(collections::PROMPT_REVISIONS)
        .create_indexes(vec![
            unique_index(doc! { "prompt_revid": 1 }),
            index(doc! { "organization_id": 1, "prompt_id": 1, "prompt_version": -1 }),
            index(doc! { "organization_id": 1, "tag_ids": 1 }),
        ])
        .await?;

    db.collection::<bson::Document>(collections::SCHEMA_REVISIONS)
        .create_indexes(vec![
            unique_index(doc! { "schema_revid": 1 }),
            index(doc! { "organization_id": 1, "schema_id": 1, "schema_version": -1 }),
        ])
        .await?;

    db.collection::<bson::Document>(collections::LLM_RUNS)
        .create_indexes(vec![index(doc! { "document_id": 1, "prompt_rev_id": 1 })])
        .await?;

    db.collection::<bson::Document>(collections::LLM_PROVIDERS)
        .create_indexes(vec![unique_index(doc! { "name": 1 })])
        .await?;

    db.collection::<bson::Document>(collections::ORGANIZATIONS)
        .create_indexes(vec![index(doc! { "members.user_id": 1 })])
        .await?;

    db.collection::<bson::Document>(collections::USERS)
        .create_indexes(vec![unique_index(doc! { "email": 1 })])
        .await?;

    db.collection::<bson::Document>(collections::ACCESS_TOKENS)
        .create_indexes(vec![index(doc! { "user_id": 1 }), index(doc! { "organization_id": 1 })])
        .await?;

    for prefix in ["files", "ocr"] {
        db.collection::<bson::Document>(&format!("{prefix}.files"))
            .create_indexes(vec![unique_index(doc! { "bucket": 1, "key": 1 })])
            .await?;
        db.collection::<bson::Document>(&format!("{prefix}.chunks"))
            .create_indexes(vec![index(doc! { "bucket": 1, "key": 1, "n": 1 })])
            .await?;
    }

    Ok(())
}
