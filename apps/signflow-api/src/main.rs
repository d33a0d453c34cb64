//! Signflow API Server - backend for document e-signing
//!
//! Provides REST endpoints for:
//! - Document creation with signer-assigned signature boxes
//! - The per-signer signing flow (load, submit, saved signatures)
//! - Final signed-PDF download once every signer has signed
//! - Outbound signer notification (`POST /notify`)

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

mod email;
mod error;
mod handlers;
mod models;
mod state;

use state::AppState;

/// Build the application router; shared with the test harness.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Document lifecycle
        .route("/api/documents", post(handlers::create_document))
        .route("/api/documents/:id", get(handlers::get_document))
        .route("/api/documents/:id/sign", post(handlers::sign_document))
        .route(
            "/api/documents/:id/download",
            get(handlers::download_document),
        )
        // Reusable saved signatures
        .route(
            "/api/signatures/:user_id",
            get(handlers::get_saved_signature).put(handlers::put_saved_signature),
        )
        // Signer notification email
        .route("/notify", post(handlers::notify))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("signflow_api=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    info!("Initializing Signflow API...");
    let state = Arc::new(AppState::new().await?);

    let app = router(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting Signflow API on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
