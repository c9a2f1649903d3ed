//! `docrouter schema`: administers versioned response schemas (§4.F).

use console::style;

use crate::cli::SchemaCommand;
use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::models::JsonSchemaSpec;

pub async fn run(context: &PipelineContext, command: SchemaCommand) -> anyhow::Result<()> {
    match command {
        SchemaCommand::New {
            organization_id,
            created_by,
            name,
            schema_file,
        } => {
            let raw = std::fs::read_to_string(&schema_file)?;
            let schema_value: serde_json::Value = serde_json::from_str(&raw)?;
            let spec = JsonSchemaSpec {
                name: name.clone(),
                schema: schema_value,
                strict: true,
            };

            let revision = context
                .repos
                .prompts_schemas
                .create_schema_revision(None, name, spec, organization_id, created_by)
                .await?;
            println!(
                "{} schema {} created (id {}, v{})",
                style("\u{2713}").green(),
                revision.name,
                revision.schema_id,
                revision.schema_version
            );
        }
        SchemaCommand::List { organization_id } => {
            let schemas = context.repos.prompts_schemas.list_schemas(&organization_id).await?;
            for schema in schemas {
                println!("{:<24} v{:<4} {}", schema.name, schema.schema_version, schema.schema_id);
            }
        }
        SchemaCommand::Show { schema_id, version } => {
            let schema = context
                .repos
                .prompts_schemas
                .get_schema_revision(&schema_id, version)
                .await?
                .ok_or_else(|| PipelineError::NotFound(format!("schema {schema_id} v{version}")))?;
            println!("{}", serde_json::to_string_pretty(&schema.response_format)?);
        }
    }
    Ok(())
}
