use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use feedback_explorer::app;
use feedback_explorer::config::Config;
use feedback_explorer::state::{AppState, Dataset};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    let source = config.source()?;

    // The service has nothing to show without its table, so a failed load is fatal.
    let table = source
        .load()
        .await
        .with_context(|| format!("loading feedback from {source}"))?;
    let dataset = Dataset::new(table)?;
    log::info!(
        "{} AI models, {} projects",
        dataset.ai_models.len(),
        dataset.project_names.len()
    );

    let state = AppState::new(dataset, source);
    if let Some(secs) = config.refresh_secs {
        state.spawn_periodic_refresh(Duration::from_secs(secs));
        log::info!("refreshing dataset every {secs}s");
    }

    let app = app::router(state, config.static_dir.as_deref());
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    log::info!("serving on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    log::info!("shutting down");
}
