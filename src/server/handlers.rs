//! HTTP request handlers for the JSON API surface (component P).
//!
//! Each handler authenticates the bearer token against the request path,
//! checks organization membership/admin status where required, then
//! delegates to the matching repository or pipeline component. Errors
//! propagate as `PipelineError`, whose `IntoResponse` impl renders the
//! `{"detail": "..."}` body shape (§4.P, §7).

use std::collections::{HashMap, HashSet};

use axum::extract::{OriginalUri, Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::auth::AuthenticatedUser;
use crate::error::{PipelineError, Result};
use crate::intake::UploadRequest;
use crate::models::{
    Document, Id, JsonSchemaSpec, LlmResult, OrganizationType, PromptRevision, SchemaRevision, Tag,
};
use crate::ocr;
use crate::repository::ListFilter;

use super::AppState;

fn bearer(headers: &HeaderMap) -> Result<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(PipelineError::Unauthorized)
}

async fn authenticate(state: &AppState, headers: &HeaderMap, path: &str) -> Result<AuthenticatedUser> {
    state.auth.authenticate(bearer(headers)?, path).await
}

// ---------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------

#[derive(Deserialize)]
pub struct UploadItem {
    name: String,
    content: String,
    #[serde(default)]
    tag_ids: HashSet<Id>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Deserialize)]
pub struct UploadDocumentsRequest {
    documents: Vec<UploadItem>,
}

#[derive(Serialize)]
pub struct UploadedDocumentResponse {
    document_id: Id,
    document_name: String,
    tag_ids: HashSet<Id>,
    metadata: HashMap<String, String>,
}

#[derive(Serialize)]
pub struct UploadDocumentsResponse {
    documents: Vec<UploadedDocumentResponse>,
}

pub async fn upload_documents(
    State(state): State<AppState>,
    Path(org): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Json(body): Json<UploadDocumentsRequest>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_member(&principal, &org).await?;

    let requests = body
        .documents
        .into_iter()
        .map(|d| UploadRequest {
            name: d.name,
            content: d.content,
            tag_ids: d.tag_ids,
            metadata: d.metadata,
        })
        .collect();

    let uploaded = state.intake.upload(&org, &principal.user.id, requests).await?;
    let documents = uploaded
        .into_iter()
        .map(|u| UploadedDocumentResponse {
            document_id: u.document_id,
            document_name: u.document_name,
            tag_ids: u.tag_ids,
            metadata: u.metadata,
        })
        .collect();
    Ok(Json(UploadDocumentsResponse { documents }))
}

#[derive(Deserialize)]
pub struct ListDocumentsQuery {
    #[serde(default)]
    skip: u64,
    #[serde(default = "default_limit")]
    limit: u64,
    tag_ids: Option<String>,
    name_search: Option<String>,
    metadata_search: Option<String>,
}

fn default_limit() -> u64 {
    10
}

#[derive(Serialize)]
pub struct ListDocumentsResponse {
    documents: Vec<Document>,
    total_count: u64,
    skip: u64,
}

pub async fn list_documents(
    State(state): State<AppState>,
    Path(org): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(q): Query<ListDocumentsQuery>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_member(&principal, &org).await?;

    let filter = ListFilter {
        skip: q.skip,
        limit: q.limit,
        tag_ids: q
            .tag_ids
            .map(|s| s.split(',').map(str::to_string).collect())
            .unwrap_or_default(),
        name_search: q.name_search,
        metadata_search: q
            .metadata_search
            .map(|s| ListFilter::parse_metadata_search(&s))
            .unwrap_or_default(),
    }
    .clamp_limit();

    let documents = state.repos.documents.list(&org, &filter).await?;
    let total_count = state.repos.documents.count(&org, &filter).await?;
    Ok(Json(ListDocumentsResponse { documents, total_count, skip: filter.skip }))
}

#[derive(Deserialize)]
pub struct GetDocumentQuery {
    #[serde(default = "default_file_type")]
    file_type: String,
}

fn default_file_type() -> String {
    "original".to_string()
}

#[derive(Serialize)]
pub struct DocumentBytesResponse {
    #[serde(flatten)]
    document: Document,
    content: String,
}

pub async fn get_document(
    State(state): State<AppState>,
    Path((org, id)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(q): Query<GetDocumentQuery>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_member(&principal, &org).await?;

    let document = state
        .repos
        .documents
        .get(&org, &id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("document {id}")))?;

    let key = match q.file_type.as_str() {
        "pdf" => document.pdf_file_name.clone(),
        "original" => document.mongo_file_name.clone(),
        other => {
            return Err(PipelineError::ValidationFailed(format!(
                "unknown file_type \"{other}\", expected \"original\" or \"pdf\""
            )))
        }
    };

    let blob = state
        .repos
        .files
        .get("files", &key)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("blob {key}")))?;

    use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
    use base64::Engine;
    let content = BASE64_STANDARD.encode(blob.bytes);

    Ok(Json(DocumentBytesResponse { document, content }))
}

#[derive(Deserialize)]
pub struct UpdateDocumentRequest {
    name: Option<String>,
    tag_ids: Option<HashSet<Id>>,
    metadata: Option<HashMap<String, String>>,
}

pub async fn update_document(
    State(state): State<AppState>,
    Path((org, id)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Json(body): Json<UpdateDocumentRequest>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_member(&principal, &org).await?;

    if let Some(tag_ids) = &body.tag_ids {
        if !tag_ids.is_empty() {
            let ids: Vec<Id> = tag_ids.iter().cloned().collect();
            state.repos.tags.validate_tags_exist(&org, &ids).await?;
        }
    }

    state
        .repos
        .documents
        .update_metadata(&org, &id, body.name, body.tag_ids, body.metadata)
        .await?;

    let document = state
        .repos
        .documents
        .get(&org, &id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("document {id}")))?;
    Ok(Json(document))
}

pub async fn delete_document(
    State(state): State<AppState>,
    Path((org, id)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_member(&principal, &org).await?;

    state.repos.documents.delete(&org, &id).await?;
    Ok(Json(serde_json::json!({ "message": "document deleted" })))
}

// ---------------------------------------------------------------------
// OCR artifacts
// ---------------------------------------------------------------------

#[derive(Serialize)]
pub struct OcrTextResponse {
    text: String,
}

#[derive(Serialize)]
pub struct OcrMetadataResponse {
    page_count: u64,
    created_at: chrono::DateTime<chrono::Utc>,
}

pub async fn download_ocr_artifact(
    State(state): State<AppState>,
    Path((org, artifact, id)): Path<(String, String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_member(&principal, &org).await?;
    state
        .repos
        .documents
        .get(&org, &id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("document {id}")))?;

    match artifact.as_str() {
        "blocks" => {
            let blob = ocr::get_blocks_blob(&state.repos.ocr_blobs, &id)
                .await?
                .ok_or_else(|| PipelineError::NotFound(format!("OCR blocks for {id}")))?;
            let blocks: Vec<ocr::Block> = serde_json::from_slice(&blob.bytes)?;
            Ok(Json(serde_json::json!({ "blocks": blocks })).into_response())
        }
        "text" => {
            let blob = state
                .repos
                .ocr_blobs
                .get("ocr", &format!("{id}_text"))
                .await?
                .ok_or_else(|| PipelineError::NotFound(format!("OCR text for {id}")))?;
            let text = String::from_utf8_lossy(&blob.bytes).into_owned();
            Ok(Json(OcrTextResponse { text }).into_response())
        }
        "metadata" => {
            let blob = ocr::get_blocks_blob(&state.repos.ocr_blobs, &id)
                .await?
                .ok_or_else(|| PipelineError::NotFound(format!("OCR metadata for {id}")))?;
            let blocks: Vec<ocr::Block> = serde_json::from_slice(&blob.bytes)?;
            let pages = ocr::page_text_map(&blocks);
            Ok(Json(OcrMetadataResponse {
                page_count: pages.len().max(1) as u64,
                created_at: blob.upload_date,
            })
            .into_response())
        }
        other => Err(PipelineError::ValidationFailed(format!(
            "unknown OCR artifact \"{other}\", expected blocks, text, or metadata"
        ))),
    }
}

// ---------------------------------------------------------------------
// LLM run and results
// ---------------------------------------------------------------------

#[derive(Deserialize, Default)]
pub struct RunLlmRequest {
    prompt_rev_id: Option<String>,
    model: Option<String>,
    #[serde(default)]
    force: bool,
}

pub async fn run_llm(
    State(state): State<AppState>,
    Path((org, id)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Option<Json<RunLlmRequest>>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_member(&principal, &org).await?;

    let body = body.map(|Json(b)| b).unwrap_or_default();
    let prompt_rev_id = body.prompt_rev_id.unwrap_or_else(|| crate::models::DEFAULT_PROMPT_REV_ID.to_string());

    let ocr_text = match state.repos.ocr_blobs.get("ocr", &format!("{id}_text")).await? {
        Some(blob) => String::from_utf8_lossy(&blob.bytes).into_owned(),
        None => String::new(),
    };
    let pages = match ocr::get_blocks_blob(&state.repos.ocr_blobs, &id).await? {
        Some(blob) => {
            let blocks: Vec<ocr::Block> = serde_json::from_slice(&blob.bytes)?;
            ocr::page_text_map(&blocks).len().max(1) as u64
        }
        None => 1,
    };

    let result = state
        .orchestrator
        .run_llm(&org, &id, &prompt_rev_id, &ocr_text, pages, body.model, body.force)
        .await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct ResultQuery {
    prompt_rev_id: String,
}

pub async fn get_result(
    State(state): State<AppState>,
    Path((org, id)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(q): Query<ResultQuery>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_member(&principal, &org).await?;

    let result = state
        .repos
        .results
        .latest(&id, &q.prompt_rev_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("result for {id}/{}", q.prompt_rev_id)))?;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct UpdateResultRequest {
    updated_llm_result: Map<String, serde_json::Value>,
    is_verified: Option<bool>,
}

pub async fn update_result(
    State(state): State<AppState>,
    Path((org, id)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(q): Query<ResultQuery>,
    Json(body): Json<UpdateResultRequest>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_member(&principal, &org).await?;

    let result = state
        .repos
        .results
        .update(&id, &q.prompt_rev_id, body.updated_llm_result, body.is_verified)
        .await?;
    Ok(Json(result))
}

pub async fn delete_result(
    State(state): State<AppState>,
    Path((org, id)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(q): Query<ResultQuery>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_member(&principal, &org).await?;

    state.repos.results.delete_for_pair(&id, &q.prompt_rev_id).await?;
    Ok(Json(serde_json::json!({ "message": "result deleted" })))
}

#[derive(Serialize)]
pub struct DownloadResultsResponse {
    results: Vec<LlmResult>,
}

pub async fn download_results(
    State(state): State<AppState>,
    Path((org, id)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_member(&principal, &org).await?;

    let results = state.repos.results.all_for_document(&id).await?;
    Ok(Json(DownloadResultsResponse { results }))
}

// ---------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------

#[derive(Deserialize)]
pub struct TagConfig {
    name: String,
    color: Option<String>,
    description: Option<String>,
}

#[derive(Serialize)]
pub struct ListTagsResponse {
    tags: Vec<Tag>,
    total_count: u64,
    skip: u64,
}

pub async fn create_tag(
    State(state): State<AppState>,
    Path(org): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Json(body): Json<TagConfig>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_admin(&principal, &org).await?;

    let tag = state
        .repos
        .tags
        .create(&org, &body.name, body.color, body.description, &principal.user.id)
        .await?;
    Ok(Json(tag))
}

#[derive(Deserialize)]
pub struct ListTagsQuery {
    #[serde(default)]
    skip: u64,
}

pub async fn list_tags(
    State(state): State<AppState>,
    Path(org): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(q): Query<ListTagsQuery>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_member(&principal, &org).await?;

    let tags = state.repos.tags.list(&org).await?;
    let total_count = state.repos.tags.count(&org).await?;
    Ok(Json(ListTagsResponse { tags, total_count, skip: q.skip }))
}

pub async fn update_tag(
    State(state): State<AppState>,
    Path((org, tag_id)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Json(body): Json<TagConfig>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_admin(&principal, &org).await?;

    let tag = state
        .repos
        .tags
        .update(&org, &tag_id, body.name, body.color, body.description)
        .await?;
    Ok(Json(tag))
}

pub async fn delete_tag(
    State(state): State<AppState>,
    Path((org, tag_id)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_admin(&principal, &org).await?;

    state
        .repos
        .tags
        .delete(&org, &tag_id, &state.repos.documents, &state.repos.prompts_schemas)
        .await?;
    Ok(Json(serde_json::json!({ "message": "tag deleted" })))
}

// ---------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------

#[derive(Deserialize)]
pub struct PromptConfig {
    name: String,
    content: String,
    schema_id: Option<Id>,
    schema_version: Option<u32>,
    #[serde(default)]
    tag_ids: HashSet<Id>,
    #[serde(default = "default_prompt_model")]
    model: String,
}

fn default_prompt_model() -> String {
    crate::models::DEFAULT_MODEL.to_string()
}

#[derive(Serialize)]
pub struct ListPromptsResponse {
    prompts: Vec<PromptRevision>,
}

pub async fn create_prompt(
    State(state): State<AppState>,
    Path(org): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Json(body): Json<PromptConfig>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_admin(&principal, &org).await?;

    if !body.tag_ids.is_empty() {
        let ids: Vec<Id> = body.tag_ids.iter().cloned().collect();
        state.repos.tags.validate_tags_exist(&org, &ids).await?;
    }

    let revision = state
        .repos
        .prompts_schemas
        .create_prompt_revision(
            None,
            body.name,
            body.content,
            body.schema_id,
            body.schema_version,
            body.tag_ids,
            body.model,
            org.clone(),
            principal.user.id.clone(),
        )
        .await?;
    Ok(Json(revision))
}

pub async fn list_prompts(
    State(state): State<AppState>,
    Path(org): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_member(&principal, &org).await?;

    let prompts = state.repos.prompts_schemas.list_prompts(&org).await?;
    Ok(Json(ListPromptsResponse { prompts }))
}

pub async fn get_prompt(
    State(state): State<AppState>,
    Path((org, prompt_revid)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_member(&principal, &org).await?;

    let revision = state
        .repos
        .prompts_schemas
        .get_prompt_revision(&prompt_revid)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("prompt revision {prompt_revid}")))?;
    Ok(Json(revision))
}

/// `PUT .../prompts/{prompt_id}` appends a new revision under the same
/// stable id — the closest fit the append-only prompt store has to
/// "update" (§4.F, §9).
pub async fn update_prompt(
    State(state): State<AppState>,
    Path((org, prompt_id)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Json(body): Json<PromptConfig>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_admin(&principal, &org).await?;

    if !body.tag_ids.is_empty() {
        let ids: Vec<Id> = body.tag_ids.iter().cloned().collect();
        state.repos.tags.validate_tags_exist(&org, &ids).await?;
    }

    let revision = state
        .repos
        .prompts_schemas
        .create_prompt_revision(
            Some(prompt_id),
            body.name,
            body.content,
            body.schema_id,
            body.schema_version,
            body.tag_ids,
            body.model,
            org.clone(),
            principal.user.id.clone(),
        )
        .await?;
    Ok(Json(revision))
}

// ---------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SchemaConfig {
    name: String,
    schema: JsonSchemaSpec,
}

#[derive(Serialize)]
pub struct ListSchemasResponse {
    schemas: Vec<SchemaRevision>,
}

pub async fn create_schema(
    State(state): State<AppState>,
    Path(org): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Json(body): Json<SchemaConfig>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_admin(&principal, &org).await?;

    let revision = state
        .repos
        .prompts_schemas
        .create_schema_revision(None, body.name, body.schema, org.clone(), principal.user.id.clone())
        .await?;
    Ok(Json(revision))
}

pub async fn list_schemas(
    State(state): State<AppState>,
    Path(org): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_member(&principal, &org).await?;

    let schemas = state.repos.prompts_schemas.list_schemas(&org).await?;
    Ok(Json(ListSchemasResponse { schemas }))
}

#[derive(Deserialize)]
pub struct SchemaVersionQuery {
    #[serde(default = "default_schema_version")]
    version: u32,
}

fn default_schema_version() -> u32 {
    1
}

pub async fn get_schema(
    State(state): State<AppState>,
    Path((org, schema_id)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(q): Query<SchemaVersionQuery>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_member(&principal, &org).await?;

    let revision = state
        .repos
        .prompts_schemas
        .get_schema_revision(&schema_id, q.version)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("schema {schema_id} v{}", q.version)))?;
    Ok(Json(revision))
}

/// `PUT .../schemas/{schema_id}` appends a new revision, same rationale
/// as [`update_prompt`].
pub async fn update_schema(
    State(state): State<AppState>,
    Path((org, schema_id)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Json(body): Json<SchemaConfig>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_admin(&principal, &org).await?;

    let revision = state
        .repos
        .prompts_schemas
        .create_schema_revision(Some(schema_id), body.name, body.schema, org.clone(), principal.user.id.clone())
        .await?;
    Ok(Json(revision))
}

// ---------------------------------------------------------------------
// Access tokens
// ---------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateAccessTokenRequest {
    name: String,
    lifetime_days: Option<i64>,
}

#[derive(Serialize)]
pub struct CreateAccessTokenResponse {
    id: Id,
    name: String,
    /// Shown exactly once, at creation time.
    token: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
pub struct AccessTokenSummary {
    id: Id,
    name: String,
    organization_id: Option<Id>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<crate::models::AccessToken> for AccessTokenSummary {
    fn from(t: crate::models::AccessToken) -> Self {
        Self { id: t.id, name: t.name, organization_id: t.organization_id, created_at: t.created_at }
    }
}

#[derive(Serialize)]
pub struct ListAccessTokensResponse {
    access_tokens: Vec<AccessTokenSummary>,
}

pub async fn create_org_access_token(
    State(state): State<AppState>,
    Path(org): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Json(body): Json<CreateAccessTokenRequest>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_admin(&principal, &org).await?;

    let (record, plaintext) = state
        .repos
        .access_tokens
        .create(
            &state.settings.nextauth_secret,
            &principal.user.id,
            Some(org),
            &body.name,
            body.lifetime_days.map(chrono::Duration::days),
        )
        .await?;
    Ok(Json(CreateAccessTokenResponse {
        id: record.id,
        name: record.name,
        token: plaintext,
        created_at: record.created_at,
    }))
}

pub async fn list_org_access_tokens(
    State(state): State<AppState>,
    Path(org): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_admin(&principal, &org).await?;

    let tokens = state.repos.access_tokens.list_for_user(&principal.user.id).await?;
    let access_tokens = tokens
        .into_iter()
        .filter(|t| t.organization_id.as_deref() == Some(org.as_str()))
        .map(AccessTokenSummary::from)
        .collect();
    Ok(Json(ListAccessTokensResponse { access_tokens }))
}

pub async fn delete_org_access_token(
    State(state): State<AppState>,
    Path((org, token_id)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_admin(&principal, &org).await?;

    state.repos.access_tokens.revoke(&principal.user.id, &token_id).await?;
    Ok(Json(serde_json::json!({ "message": "access token deleted" })))
}

pub async fn create_account_access_token(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Json(body): Json<CreateAccessTokenRequest>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;

    let (record, plaintext) = state
        .repos
        .access_tokens
        .create(
            &state.settings.nextauth_secret,
            &principal.user.id,
            None,
            &body.name,
            body.lifetime_days.map(chrono::Duration::days),
        )
        .await?;
    Ok(Json(CreateAccessTokenResponse {
        id: record.id,
        name: record.name,
        token: plaintext,
        created_at: record.created_at,
    }))
}

pub async fn list_account_access_tokens(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;

    let tokens = state.repos.access_tokens.list_for_user(&principal.user.id).await?;
    let access_tokens = tokens
        .into_iter()
        .filter(|t| t.organization_id.is_none())
        .map(AccessTokenSummary::from)
        .collect();
    Ok(Json(ListAccessTokensResponse { access_tokens }))
}

pub async fn delete_account_access_token(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;

    state.repos.access_tokens.revoke(&principal.user.id, &token_id).await?;
    Ok(Json(serde_json::json!({ "message": "access token deleted" })))
}

#[derive(Deserialize)]
pub struct ResolveTokenQuery {
    token: String,
}

#[derive(Serialize)]
pub struct ResolveTokenResponse {
    organization_id: Option<Id>,
}

pub async fn resolve_token_organization(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(q): Query<ResolveTokenQuery>,
) -> Result<impl IntoResponse> {
    authenticate(&state, &headers, uri.path()).await?;

    let organization_id = state
        .repos
        .access_tokens
        .find_by_plaintext(&state.settings.nextauth_secret, &q.token)
        .await?
        .and_then(|t| t.organization_id);
    Ok(Json(ResolveTokenResponse { organization_id }))
}

// ---------------------------------------------------------------------
// Organizations (upgrade lattice, §4.M/§4.O)
// ---------------------------------------------------------------------

#[derive(Deserialize)]
pub struct UpgradeOrganizationRequest {
    #[serde(rename = "type")]
    org_type: OrganizationType,
}

pub async fn upgrade_organization(
    State(state): State<AppState>,
    Path(org): Path<String>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Json(body): Json<UpgradeOrganizationRequest>,
) -> Result<impl IntoResponse> {
    let principal = authenticate(&state, &headers, uri.path()).await?;
    state.auth.require_org_admin(&principal, &org).await?;
    if matches!(body.org_type, OrganizationType::Enterprise) {
        state.auth.require_system_admin(&principal)?;
    }

    let organization = state.repos.organizations.upgrade(&org, body.org_type).await?;
    Ok(Json(organization))
}
