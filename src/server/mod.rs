//! HTTP API surface (component P): a JSON-over-HTTP router exposing the
//! organization- and account-scoped endpoints, split across a
//! `routes`/`handlers` pair.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;

use crate::context::PipelineContext;

/// Shared state for every handler: a cheap `Clone` of the application
/// context (every field inside is itself `Arc`-backed).
pub type AppState = PipelineContext;

/// Starts the HTTP API surface on `host:port`.
pub async fn serve(context: PipelineContext, host: &str, port: u16) -> anyhow::Result<()> {
    let app = create_router(context);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    tracing::info!(%addr, "starting HTTP API surface");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
