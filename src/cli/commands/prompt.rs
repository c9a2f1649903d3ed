//! `docrouter prompt`: administers versioned prompts from the command line
//! (§4.F), for operators who prefer a shell over the HTTP surface.

use std::collections::HashSet;

use console::style;

use crate::cli::PromptCommand;
use crate::context::PipelineContext;
use crate::error::PipelineError;

pub async fn run(context: &PipelineContext, command: PromptCommand) -> anyhow::Result<()> {
    match command {
        PromptCommand::New {
            organization_id,
            created_by,
            name,
            content,
            schema_id,
            schema_version,
            model,
        } => {
            let revision = context
                .repos
                .prompts_schemas
                .create_prompt_revision(
                    None,
                    name,
                    content,
                    schema_id,
                    schema_version,
                    HashSet::new(),
                    model.unwrap_or_else(|| crate::models::DEFAULT_MODEL.to_string()),
                    organization_id,
                    created_by,
                )
                .await?;
            println!(
                "{} prompt {} created (revid {})",
                style("\u{2713}").green(),
                revision.name,
                revision.prompt_revid
            );
        }
        PromptCommand::List { organization_id } => {
            let prompts = context.repos.prompts_schemas.list_prompts(&organization_id).await?;
            for prompt in prompts {
                println!(
                    "{:<24} v{:<4} {}",
                    prompt.name, prompt.prompt_version, prompt.prompt_revid
                );
            }
        }
        PromptCommand::Show { prompt_revid } => {
            let prompt = context
                .repos
                .prompts_schemas
                .get_prompt_revision(&prompt_revid)
                .await?
                .ok_or_else(|| PipelineError::NotFound(format!("prompt {prompt_revid}")))?;
            println!("{}", serde_json::to_string_pretty(&prompt_json(&prompt))?);
        }
    }
    Ok(())
}

fn prompt_json(prompt: &crate::models::PromptRevision) -> serde_json::Value {
    serde_json::json!({
        "prompt_id": prompt.prompt_id,
        "prompt_revid": prompt.prompt_revid,
        "prompt_version": prompt.prompt_version,
        "name": prompt.name,
        "content": prompt.content,
        "schema_id": prompt.schema_id,
        "schema_version": prompt.schema_version,
        "model": prompt.model,
        "organization_id": prompt.organization_id,
    })
}
