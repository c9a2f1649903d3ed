//! `docrouter init`: bootstraps Mongo indexes and the admin user/
//! organization, preparing a fresh deployment before its first `serve`
//! (§4.S, §4.Q).

use console::style;

use crate::context::PipelineContext;

pub async fn run(context: &PipelineContext) -> anyhow::Result<()> {
    let db = crate::mongo::connect(&context.settings).await?;
    crate::mongo::ensure_indexes(&db).await?;
    println!("{} indexes ensured", style("\u{2713}").green());

    crate::bootstrap::ensure_admin(context).await?;
    println!("{} admin bootstrap checked", style("\u{2713}").green());

    Ok(())
}
