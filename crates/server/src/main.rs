mod api;
mod cli;
mod router;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use enron_core::Config;
use enron_ingest::IngestionJob;

use crate::state::AppState;

fn load_config() -> Config {
    enron_core::config::load_dotenv();
    Config::from_env()
}

async fn serve(config: Config) -> anyhow::Result<()> {
    config.log_summary();
    if !config.maildir.path.is_dir() {
        tracing::warn!(
            path = %config.maildir.path.display(),
            "maildir does not exist yet; ingestion will finish empty until it does"
        );
    }

    let addr = config.server.bind_addr();
    let state = Arc::new(AppState::new(config));
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ingest_once(root: PathBuf) -> anyhow::Result<()> {
    let job = IngestionJob::new(root);
    job.start()?;
    job.wait_finished().await;

    let snapshot = job.snapshot()?;
    if let Some(err) = &snapshot.report.walk_error {
        tracing::error!("walk aborted: {}", err);
    }
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let config = load_config();
    let args = cli::CliArgs::parse();
    cli::dispatch(config, args).await
}
