mod config;
mod routes;

use crate::config::Config;
use crate::routes::{AppState, router};
use anyhow::Context;
use interview_core::{GeminiModel, SharedModel};
use interview_core::storage::FileStore;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load API configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let prompts = config.gemini.prompts().context("Failed to load prompt templates")?;
    let model: SharedModel = Arc::new(GeminiModel::from_settings(&config.gemini, &prompts));
    let state = AppState::new(model, prompts, Arc::new(FileStore::new(&config.data_dir)));
    info!("Interview history kept in {}", config.data_dir.display());

    // Configure a permissive CORS policy so a separate frontend can call the API.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    info!("Starting interview API, listening on {}", config.bind_address);
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
