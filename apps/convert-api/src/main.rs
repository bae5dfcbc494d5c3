//! Batch PDF → DOCX Conversion API Server
//!
//! Provides REST endpoints for:
//! - Batch submission (multipart upload, background orchestration)
//! - Per-file status and aggregate summary polling
//! - Result archive download, with or without the combined document
//!
//! Request handlers only read and write the job registry; they never block on
//! orchestration progress.

use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

mod adobe;
mod error;
mod handlers;
mod models;
mod state;

use state::AppState;

/// Batches are whole drawing sets; allow up to 200 MiB per submission.
const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("convert_api=info".parse()?)
                .add_directive("convert_core=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Missing provider credentials are fatal: the service never becomes ready.
    info!("Initializing conversion API...");
    let state = AppState::from_env()?;

    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Batch lifecycle
        .route("/api/convert/batch", post(handlers::submit_batch))
        .route("/api/convert/status/:id", get(handlers::get_status))
        .route("/api/convert/summary/:id", get(handlers::get_summary))
        .route("/api/convert/download/:id", get(handlers::download_archive))
        // Add middleware
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // Parse bind address
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3002);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting conversion API on http://{}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
