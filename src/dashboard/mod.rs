//! Dashboard: read-only Axum server for the scoreboard screen.
//!
//! Serves a JSON API plus the plain-text leaderboard at `/`.
//! CORS enabled so a projector page on another origin can poll it.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use routes::AppState;

/// Bind the dashboard port and serve in a background task.
///
/// Binding happens before spawning, so a taken port is reported to the
/// caller instead of dying inside the task.
pub async fn spawn_dashboard(state: AppState, port: u16) -> Result<JoinHandle<()>> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard server starting on http://localhost:{port}");

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Dashboard server error");
        }
    }))
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // API routes
        .route("/api/status", get(routes::get_status))
        .route("/api/standings", get(routes::get_standings))
        .route("/api/standings/csv", get(routes::get_standings_csv))
        .route("/api/breakdown", get(routes::get_breakdown))
        .route("/api/races", get(routes::get_races))
        .route("/api/races/:number", get(routes::get_race))
        .route("/api/horses", get(routes::get_horses))
        .route("/api/bettors", get(routes::get_bettors))
        .route("/api/export", get(routes::get_export))
        .route("/health", get(routes::health))
        // Leaderboard text
        .route("/", get(routes::get_leaderboard))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
