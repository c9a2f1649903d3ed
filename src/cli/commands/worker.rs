//! `docrouter worker`: starts one or both worker pools without the HTTP
//! surface, for running dedicated worker processes alongside `serve`.

use std::sync::Arc;

use console::style;

use crate::cli::Stage;
use crate::context::PipelineContext;
use crate::pipeline::{LlmHandler, OcrHandler};
use crate::worker::WorkerPool;

pub async fn run(context: PipelineContext, stage: Option<Stage>, count: Option<u32>) -> anyhow::Result<()> {
    let count = count.unwrap_or(context.settings.n_workers);

    let mut handles = Vec::new();

    if matches!(stage, None | Some(Stage::Ocr)) {
        let handler = Arc::new(OcrHandler::new(context.repos.clone(), context.ocr_adapter.clone()));
        let pool = WorkerPool::new("ocr", context.repos.ocr_queue.clone(), handler, count);
        let (_shutdown, mut pool_handles) = pool.spawn();
        println!("{} ocr worker pool started ({count} worker(s))", style("\u{2713}").green());
        handles.append(&mut pool_handles);
    }

    if matches!(stage, None | Some(Stage::Llm)) {
        let handler = Arc::new(LlmHandler::new(context.repos.clone(), (*context.orchestrator).clone()));
        let pool = WorkerPool::new("llm", context.repos.llm_queue.clone(), handler, count);
        let (_shutdown, mut pool_handles) = pool.spawn();
        println!("{} llm worker pool started ({count} worker(s))", style("\u{2713}").green());
        handles.append(&mut pool_handles);
    }

    for handle in handles {
        handle.await?;
    }
    Ok(())
}
