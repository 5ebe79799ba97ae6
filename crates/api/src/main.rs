use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use hooktail_api::config::Settings;
use hooktail_api::router::build_app_router;
use hooktail_api::state::AppState;
use hooktail_api::{logging, server};
use hooktail_core::exec::PrivilegedExecutor;
use hooktail_pipeline::{DeploymentLauncher, DeploymentPipeline, LaunchMode};

/// How long in-flight deployments may keep running after the server stops.
const DEPLOYMENT_DRAIN: Duration = Duration::from_secs(30);

/// Receive GitHub push webhooks and deploy the matching working copy.
#[derive(Debug, Parser)]
#[command(name = "hooktail", version, about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, env = "HOOKTAIL_CONFIG", default_value = "config.yml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // --- Configuration ---
    let settings = Settings::load(&cli.config)
        .with_context(|| format!("load configuration from {}", cli.config.display()))?;

    // --- Tracing ---
    logging::init(settings.log_format, settings.log_file.as_deref())?;
    settings.log_summary();

    // --- Deployment pipeline ---
    let runner = Arc::new(PrivilegedExecutor::new().with_timeout(settings.command_timeout));
    let pipeline = Arc::new(DeploymentPipeline::new(runner));
    let launcher = Arc::new(DeploymentLauncher::new(pipeline, LaunchMode::Background));

    // --- Router ---
    let state = AppState::new(settings, Arc::clone(&launcher));
    let settings = Arc::clone(&state.settings);
    let app = build_app_router(state);

    // --- Start server ---
    server::serve(app, &settings).await?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections");
    if launcher.shutdown(DEPLOYMENT_DRAIN).await {
        tracing::info!("Graceful shutdown complete");
    } else {
        tracing::warn!(
            in_flight = launcher.in_flight(),
            "Deployments still running at shutdown were abandoned",
        );
    }
    Ok(())
}
