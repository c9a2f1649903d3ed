//! `docrouter provider`: administers the LLM provider registry (§4.E).

use console::style;

use crate::cli::ProviderCommand;
use crate::context::PipelineContext;

pub async fn run(context: &PipelineContext, command: ProviderCommand) -> anyhow::Result<()> {
    match command {
        ProviderCommand::List => {
            let providers = context.repos.providers.list().await?;
            for provider in providers {
                let status = if provider.enabled {
                    style("enabled").green()
                } else {
                    style("disabled").dim()
                };
                println!(
                    "{:<12} {:<10} models enabled: {}",
                    provider.name,
                    status,
                    provider.litellm_models_enabled.join(", ")
                );
            }
        }
        ProviderCommand::Enable { name } => {
            context.repos.providers.set_enabled(&name, true).await?;
            println!("{} provider {} enabled", style("\u{2713}").green(), name);
        }
        ProviderCommand::Disable { name } => {
            context.repos.providers.set_enabled(&name, false).await?;
            println!("{} provider {} disabled", style("\u{2713}").green(), name);
        }
        ProviderCommand::SetToken { name, token } => {
            context
                .repos
                .providers
                .set_token(&context.settings.nextauth_secret, &name, &token)
                .await?;
            println!("{} token stored for provider {}", style("\u{2713}").green(), name);
        }
    }
    Ok(())
}
