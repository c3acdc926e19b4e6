use anyhow::Context;
use axum::{response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

mod api;
mod assistant;
mod config;
mod context;
mod intent;
mod llm;
mod media;
mod planner;
#[cfg(test)]
mod testing;
mod vision;

use assistant::{Assistant, LlmQuestionAnswerer};
use config::DaemonConfig;
use intent::LlmIntentClassifier;
use llm::LlmClient;
use media::FfmpegOperations;
use planner::LlmActionPlanner;
use vision::MlServiceVision;

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let config = DaemonConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", config.output_dir))?;
    info!("Writing edits to {:?}", config.output_dir);

    if config.llm.api_key.is_none() {
        info!("OPENAI_API_KEY is not set, LLM calls go to {} unauthenticated", config.llm.api_base);
    }

    let llm = LlmClient::new(config.llm.clone())?;
    let operations = Arc::new(FfmpegOperations::new(&config));
    let assistant = Assistant::new(
        Arc::new(LlmIntentClassifier::new(llm.clone())),
        Arc::new(LlmActionPlanner::new(llm.clone())),
        Arc::new(MlServiceVision::new(&config.vision)),
        Arc::new(LlmQuestionAnswerer::new(llm)),
        operations.clone(),
    );
    let state = api::AppState {
        assistant: Arc::new(assistant),
        operations,
    };

    // Build the router with CORS support
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_credentials(false);

    let app = Router::new()
        .route("/health", get(health))
        .nest("/api", api::router(state))
        .nest_service("/outputs", ServeDir::new(&config.output_dir))
        .layer(cors);

    info!("Starting daemon server on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
