use anyhow::Context;
use server::{deployment::Deployment, init_tracing, load_dotenv, serve};
use services::services::{config::Config, database_validator::DatabaseValidator};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv_warning = load_dotenv();
    init_tracing();
    if let Some(warning) = dotenv_warning {
        warn!("{warning}");
    }

    let config = Config::from_env().context("invalid configuration")?;
    let deployment = Deployment::new(config)
        .await
        .context("failed to initialize services")?;

    let schema = DatabaseValidator::new(deployment.db().pool.clone())
        .require_schema()
        .await
        .context("database schema check failed")?;
    info!("{}", schema.summary());

    match deployment.config().admin_bootstrap.as_ref() {
        Some(bootstrap) => deployment
            .auth()
            .ensure_admin(bootstrap)
            .await
            .context("failed to bootstrap admin account")?,
        None => warn!("ADMIN_EMAIL/ADMIN_PASSWORD not set, skipping admin bootstrap"),
    }

    serve(deployment).await
}
