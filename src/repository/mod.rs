//! Repository layer: one module per persisted aggregate, each wrapping a
//! Mongo collection (or collection pair) behind a narrow, typed API.

mod access_token_repository;
mod blob_store;
mod document_registry;
mod organization_repository;
mod prompt_schema_store;
mod provider_registry;
mod result_store;
mod tag_repository;
mod user_repository;
mod work_queue;

pub use access_token_repository::AccessTokenRepository;
pub use blob_store::{Blob, BlobStore, CHUNK_SIZE};
pub use document_registry::{DocumentRegistry, ListFilter};
pub use organization_repository::OrganizationRepository;
pub use prompt_schema_store::{PromptSchemaStore, RevisionSelector};
pub use provider_registry::ProviderRegistry;
pub use result_store::ResultStore;
pub use tag_repository::TagRepository;
pub use user_repository::UserRepository;
pub use work_queue::WorkQueue;

use mongodb::Database;

use crate::mongo::collections;

/// Every repository the application wires at startup, grouped for
/// convenient construction from a single `Database` handle.
#[derive(Clone)]
pub struct Repositories {
    pub documents: DocumentRegistry,
    pub files: BlobStore,
    pub ocr_blobs: BlobStore,
    pub results: ResultStore,
    pub ocr_queue: WorkQueue,
    pub ocr_err_queue: WorkQueue,
    pub llm_queue: WorkQueue,
    pub tags: TagRepository,
    pub prompts_schemas: PromptSchemaStore,
    pub providers: ProviderRegistry,
    pub organizations: OrganizationRepository,
    pub access_tokens: AccessTokenRepository,
    pub users: UserRepository,
}

impl Repositories {
    pub fn new(db: &Database) -> Self {
        let files = BlobStore::new(db, "files");
        let ocr_blobs = BlobStore::new(db, "ocr");
        let results = ResultStore::new(db);

        Self {
            documents: DocumentRegistry::new(db, files.clone(), ocr_blobs.clone(), results.clone()),
            files,
            ocr_blobs,
            results,
            ocr_queue: WorkQueue::new(db, collections::QUEUE_OCR),
            ocr_err_queue: WorkQueue::new(db, collections::QUEUE_OCR_ERR),
            llm_queue: WorkQueue::new(db, collections::QUEUE_LLM),
            tags: TagRepository::new(db),
            prompts_schemas: PromptSchemaStore::new(db),
            providers: ProviderRegistry::new(db),
            organizations: OrganizationRepository::new(db),
            access_tokens: AccessTokenRepository::new(db),
            users: UserRepository::new(db),
        }
    }
}
