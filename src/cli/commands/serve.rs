//! `docrouter serve`: starts the HTTP API surface and both worker pools
//! in-process, reporting status to the terminal as it comes up.

use std::sync::Arc;

use console::style;

use crate::context::PipelineContext;
use crate::pipeline::{LlmHandler, OcrHandler};
use crate::worker::WorkerPool;

pub async fn run(context: PipelineContext, host: &str, port: u16) -> anyhow::Result<()> {
    let ocr_handler = Arc::new(OcrHandler::new(context.repos.clone(), context.ocr_adapter.clone()));
    let ocr_pool = WorkerPool::new("ocr", context.repos.ocr_queue.clone(), ocr_handler, context.settings.n_workers);
    let (_ocr_shutdown, _ocr_handles) = ocr_pool.spawn();

    let llm_handler = Arc::new(LlmHandler::new(context.repos.clone(), (*context.orchestrator).clone()));
    let llm_pool = WorkerPool::new("llm", context.repos.llm_queue.clone(), llm_handler, context.settings.n_workers);
    let (_llm_shutdown, _llm_handles) = llm_pool.spawn();

    println!(
        "{} starting on {}:{} ({} worker(s) per stage)",
        style("docrouter").bold().green(),
        host,
        port,
        context.settings.n_workers
    );

    crate::server::serve(context, host, port).await
}
