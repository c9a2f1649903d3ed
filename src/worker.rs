//! Worker pool (component I): N parallel loops per pipeline stage, draining
//! a named work queue with cooperative shutdown.
//!
//! A long-running pool of `tokio::spawn`ed loops that each poll a
//! Mongo-backed queue for claimable work, coordinated by a
//! `tokio::sync::watch` channel for shutdown.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::models::QueueStatus;
use crate::repository::WorkQueue;

const IDLE_SLEEP: Duration = Duration::from_millis(200);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(600);

/// Anything that can process one claimed queue message.
pub trait MessageHandler: Send + Sync + 'static {
    fn handle<'a>(&'a self, msg: &'a Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

impl<F> MessageHandler for F
where
    F: Fn(&Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> + Send + Sync + 'static,
{
    fn handle<'a>(&'a self, msg: &'a Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        self(msg)
    }
}

/// A pool of `count` workers draining `queue`, each dispatching claimed
/// messages to `handler` and marking them completed or failed. Per-message
/// handler failures are isolated: they never crash the worker loop, because
/// handlers (`OcrHandler`, `LlmHandler`) already convert failures into a
/// terminal document state and an `Ok(())` return (§4.J, §5).
pub struct WorkerPool<H: MessageHandler> {
    stage: &'static str,
    queue: WorkQueue,
    handler: Arc<H>,
    count: u32,
}

impl<H: MessageHandler> WorkerPool<H> {
    pub fn new(stage: &'static str, queue: WorkQueue, handler: Arc<H>, count: u32) -> Self {
        Self { stage, queue, handler, count }
    }

    /// Spawns `count` worker loops, returning a shutdown sender. Dropping or
    /// sending `true` on the returned sender asks every worker to exit after
    /// its current iteration.
    pub fn spawn(&self) -> (watch::Sender<bool>, Vec<tokio::task::JoinHandle<()>>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handles = (0..self.count)
            .map(|worker_index| {
                let queue = self.queue.clone();
                let handler = self.handler.clone();
                let stage = self.stage;
                let mut shutdown_rx = shutdown_rx.clone();

                tokio::spawn(async move {
                    info!(stage, worker_index, "worker started");
                    let mut last_heartbeat = tokio::time::Instant::now();

                    loop {
                        if *shutdown_rx.borrow() {
                            break;
                        }

                        match queue.recv().await {
                            Ok(Some(message)) => {
                                let outcome = handler.handle(&message.msg).await;
                                let status = match outcome {
                                    Ok(()) => QueueStatus::Completed,
                                    Err(e) => {
                                        error!(stage, worker_index, error = %e, "handler returned an error");
                                        QueueStatus::Failed
                                    }
                                };
                                if let Err(e) = queue.complete(&message.id, status).await {
                                    warn!(stage, worker_index, error = %e, "failed to mark message terminal");
                                }
                            }
                            Ok(None) => {
                                tokio::select! {
                                    _ = tokio::time::sleep(IDLE_SLEEP) => {}
                                    _ = shutdown_rx.changed() => {}
                                }
                            }
                            Err(e) => {
                                warn!(stage, worker_index, error = %e, "queue receive failed");
                                tokio::time::sleep(IDLE_SLEEP).await;
                            }
                        }

                        if last_heartbeat.elapsed() >= HEARTBEAT_INTERVAL {
                            info!(stage, worker_index, "worker heartbeat");
                            last_heartbeat = tokio::time::Instant::now();
                        }
                    }
                    info!(stage, worker_index, "worker stopped");
                })
            })
            .collect();

        (shutdown_tx, handles)
    }
}
