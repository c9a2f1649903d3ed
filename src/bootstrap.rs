//! Idempotent startup bootstrap: an administrator user and their individual
//! organization, created once and left alone on every subsequent boot
//! (§4.Q, §9).

use tracing::info;

use crate::context::PipelineContext;
use crate::models::OrganizationType;

/// Ensures the configured admin user (and their individual organization)
/// exist. A no-op when `ADMIN_EMAIL`/`ADMIN_PASSWORD` are unset, or when the
/// admin user already exists.
pub async fn ensure_admin(context: &PipelineContext) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (
        context.settings.admin_email.as_deref(),
        context.settings.admin_password.as_deref(),
    ) else {
        return Ok(());
    };

    let existing = context.repos.users.find_by_email(email).await?;
    let is_new = existing.is_none();

    let admin = context.repos.users.ensure_bootstrap_admin(email, password).await?;

    if is_new {
        context
            .repos
            .organizations
            .create(&admin.email, OrganizationType::Individual, &admin.id)
            .await?;
        info!(email, "bootstrap admin and individual organization created");
    }

    Ok(())
}
