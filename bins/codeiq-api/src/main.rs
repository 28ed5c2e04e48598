mod handlers;
mod routes;

use anyhow::{Context, Result};
use axum::Router;
use codeiq_common::Config;
use codeiq_engine::{Engine, EngineConfig};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub struct AppState {
    pub engine: Engine,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new().merge(routes::routes()).with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("CodeIQ API booting...");

    let config = Config::from_env()?;
    let engine_config = EngineConfig::from_config(&config)?;
    info!(
        scratch_dir = %engine_config.workspace_root.display(),
        time_limit_ms = config.time_limit_ms,
        failure_policy = ?config.failure_policy,
        "Engine configured"
    );

    let state = Arc::new(AppState {
        engine: Engine::new(engine_config),
    });

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("HTTP server listening on {}", config.bind_addr);

    axum::serve(listener, app(state)).await.context("Server error")?;
    Ok(())
}
