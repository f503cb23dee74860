//! keepsake-ui web server
//!
//! Run with: cargo run -p keepsake-web -- -r file:///path/to/repository

use anyhow::Context;
use clap::Parser;
use keepsake_store::Project;
use keepsake_web::{cli::Cli, config::Config, router::build_router, state::AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_cli(&cli);

    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers.max(1))
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    runtime.block_on(serve(config))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let uri = config.repository_uri()?;
    let project = Project::open(uri, config.project_options())
        .with_context(|| format!("opening repository {uri}"))?;
    info!(repository = %uri, daemon_timeout = ?project.options().daemon_timeout, "Project opened");

    let router = build_router(AppState::new(project.clone()));

    let bind_addr = &config.server.bind;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    info!("Web UI listening on http://{}", bind_addr);
    info!("   Experiments:  http://{}/experiments", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    project.shutdown().await;
    info!("Shut down cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
