//! Router configuration for the JSON API surface.

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::AppState;

/// Builds the full `/v0` router (§4.P, §6).
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/v0/orgs/:org/documents",
            post(handlers::upload_documents).get(handlers::list_documents),
        )
        .route(
            "/v0/orgs/:org/documents/:id",
            get(handlers::get_document)
                .put(handlers::update_document)
                .delete(handlers::delete_document),
        )
        .route(
            "/v0/orgs/:org/ocr/download/:artifact/:id",
            get(handlers::download_ocr_artifact),
        )
        .route("/v0/orgs/:org/llm/run/:id", post(handlers::run_llm))
        .route(
            "/v0/orgs/:org/llm/result/:id",
            get(handlers::get_result)
                .put(handlers::update_result)
                .delete(handlers::delete_result),
        )
        .route(
            "/v0/orgs/:org/llm/results/:id/download",
            get(handlers::download_results),
        )
        .route(
            "/v0/orgs/:org/tags",
            post(handlers::create_tag).get(handlers::list_tags),
        )
        .route(
            "/v0/orgs/:org/tags/:tag_id",
            put(handlers::update_tag).delete(handlers::delete_tag),
        )
        .route(
            "/v0/orgs/:org/prompts",
            post(handlers::create_prompt).get(handlers::list_prompts),
        )
        .route(
            "/v0/orgs/:org/prompts/:prompt_id",
            get(handlers::get_prompt).put(handlers::update_prompt),
        )
        .route(
            "/v0/orgs/:org/schemas",
            post(handlers::create_schema).get(handlers::list_schemas),
        )
        .route(
            "/v0/orgs/:org/schemas/:schema_id",
            get(handlers::get_schema).put(handlers::update_schema),
        )
        .route(
            "/v0/orgs/:org/access_tokens",
            post(handlers::create_org_access_token).get(handlers::list_org_access_tokens),
        )
        .route(
            "/v0/orgs/:org/access_tokens/:token_id",
            axum::routing::delete(handlers::delete_org_access_token),
        )
        .route("/v0/orgs/:org/upgrade", post(handlers::upgrade_organization))
        .route(
            "/v0/account/access_tokens",
            post(handlers::create_account_access_token).get(handlers::list_account_access_tokens),
        )
        .route(
            "/v0/account/access_tokens/:token_id",
            axum::routing::delete(handlers::delete_account_access_token),
        )
        .route(
            "/v0/account/token/organization",
            get(handlers::resolve_token_organization),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
