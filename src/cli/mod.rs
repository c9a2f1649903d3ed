//! CLI surface (component S, ambient): a `clap`-derived `Cli`/`Subcommand`
//! tree exposing the HTTP server, the worker pools, and one-shot
//! administrative operations useful for local testing without the HTTP
//! surface (§4.S).

mod commands;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::Settings;
use crate::context::PipelineContext;

#[derive(Parser)]
#[command(name = "docrouter")]
#[command(about = "Multi-tenant document extraction pipeline: OCR + LLM orchestration")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Stage {
    Ocr,
    Llm,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API surface (also starts both worker pools in-process).
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Start a worker pool for one stage, or both if `--stage` is omitted.
    Worker {
        #[arg(long, value_enum)]
        stage: Option<Stage>,
        /// Overrides `N_WORKERS` for this invocation.
        #[arg(long)]
        count: Option<u32>,
    },
    /// Bootstrap Mongo indexes and the admin user/organization.
    Init,
    /// Administer the LLM provider registry.
    Provider {
        #[command(subcommand)]
        command: ProviderCommand,
    },
    /// Administer prompts from the command line.
    Prompt {
        #[command(subcommand)]
        command: PromptCommand,
    },
    /// Administer schemas from the command line.
    Schema {
        #[command(subcommand)]
        command: SchemaCommand,
    },
    /// One-shot document operations useful for local testing.
    Document {
        #[command(subcommand)]
        command: DocumentCommand,
    },
}

#[derive(Subcommand)]
pub enum ProviderCommand {
    List,
    Enable { name: String },
    Disable { name: String },
    SetToken { name: String, token: String },
}

#[derive(Subcommand)]
pub enum PromptCommand {
    New {
        #[arg(long)]
        organization_id: String,
        #[arg(long)]
        created_by: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        content: String,
        #[arg(long)]
        schema_id: Option<String>,
        #[arg(long)]
        schema_version: Option<u32>,
        #[arg(long)]
        model: Option<String>,
    },
    List {
        #[arg(long)]
        organization_id: String,
    },
    Show {
        prompt_revid: String,
    },
}

#[derive(Subcommand)]
pub enum SchemaCommand {
    New {
        #[arg(long)]
        organization_id: String,
        #[arg(long)]
        created_by: String,
        #[arg(long)]
        name: String,
        /// Path to a JSON file containing the `{type, properties,
        /// required, additionalProperties}` schema body.
        #[arg(long)]
        schema_file: std::path::PathBuf,
    },
    List {
        #[arg(long)]
        organization_id: String,
    },
    Show {
        schema_id: String,
        #[arg(long, default_value_t = 1)]
        version: u32,
    },
}

#[derive(Subcommand)]
pub enum DocumentCommand {
    Upload {
        #[arg(long)]
        organization_id: String,
        #[arg(long)]
        uploaded_by: String,
        /// Path to the file to upload; read from disk and base64-encoded.
        path: std::path::PathBuf,
    },
    List {
        #[arg(long)]
        organization_id: String,
    },
    RunLlm {
        #[arg(long)]
        organization_id: String,
        document_id: String,
        #[arg(long)]
        prompt_rev_id: Option<String>,
        #[arg(long)]
        force: bool,
    },
}

/// Parses argv, loads settings and the application context, and dispatches
/// to the matching command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Serve { host, port } => {
            let context = PipelineContext::build(settings).await?;
            crate::bootstrap::ensure_admin(&context).await?;
            commands::serve::run(context, &host, port).await
        }
        Commands::Worker { stage, count } => {
            let context = PipelineContext::build(settings).await?;
            commands::worker::run(context, stage, count).await
        }
        Commands::Init => {
            let context = PipelineContext::build(settings).await?;
            commands::init::run(&context).await
        }
        Commands::Provider { command } => {
            let context = PipelineContext::build(settings).await?;
            commands::provider::run(&context, command).await
        }
        Commands::Prompt { command } => {
            let context = PipelineContext::build(settings).await?;
            commands::prompt::run(&context, command).await
        }
        Commands::Schema { command } => {
            let context = PipelineContext::build(settings).await?;
            commands::schema::run(&context, command).await
        }
        Commands::Document { command } => {
            let context = PipelineContext::build(settings).await?;
            commands::document::run(&context, command).await
        }
    }
}
