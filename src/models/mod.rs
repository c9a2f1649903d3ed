//! Data models for the document extraction pipeline.

mod access_token;
mod document;
mod llm_result;
mod organization;
mod prompt;
mod provider;
mod queue;
mod schema;
mod tag;
mod user;

pub use access_token::{AccessToken, TokenContext};
pub use document::{Document, DocumentState};
pub use llm_result::LlmResult;
pub use organization::{Member, Organization, OrganizationType, Role};
pub use prompt::{
    PromptRevision, DEFAULT_MODEL, DEFAULT_PROMPT_REV_ID, OCR_TEXT_SEPARATOR, SYSTEM_MESSAGE,
};
pub use provider::{LlmProvider, ModelInfo};
pub use queue::{QueueMessage, QueueStatus};
pub use schema::{JsonSchemaSpec, ResponseFormat, SchemaRevision};
pub use tag::Tag;
pub use user::User;

use bson::oid::ObjectId;

/// Opaque 24-hex-character identifier, as required by the data model.
pub type Id = String;

/// Generates a new opaque id.
pub fn new_id() -> Id {
    ObjectId::new().to_hex()
}
