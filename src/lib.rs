//! Multi-tenant document extraction pipeline: OCR + LLM prompt/schema
//! orchestration over a MongoDB-backed work queue.
//!
//! Organized around a thin `main.rs`: `lib.rs` declares every module and
//! re-exports the handful of types a caller (the CLI, the HTTP surface, or
//! a test) needs without reaching into submodules directly.

pub mod auth;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod context;
pub mod converter;
pub mod credit;
pub mod crypto;
pub mod error;
pub mod intake;
pub mod llm;
pub mod models;
pub mod mongo;
pub mod ocr;
pub mod pipeline;
pub mod repository;
pub mod server;
pub mod worker;

pub use config::Settings;
pub use context::PipelineContext;
pub use error::{PipelineError, Result};
