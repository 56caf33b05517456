//! Dashboard API route handlers.
//!
//! All endpoints are read-only and return JSON, except `/` which returns
//! the plain-text leaderboard. State is shared via `Arc<DashboardState>`.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::engine::event::{DerbyEvent, EventStats};
use crate::engine::scoring::{self, RaceBreakdown, ScoreboardSummary};
use crate::snapshot::EventSnapshot;
use crate::types::{Podium, Race, RaceStatus, Standing};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub event_name: String,
    pub event: RwLock<DerbyEvent>,
}

impl DashboardState {
    pub fn new(event_name: impl Into<String>, event: DerbyEvent) -> Self {
        Self {
            event_name: event_name.into(),
            event: RwLock::new(event),
        }
    }

    /// Swap in a freshly loaded event.
    pub async fn replace(&self, event: DerbyEvent) {
        *self.event.write().await = event;
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub event_name: String,
    pub phase: String,
    pub current_race: u32,
    pub total_races: u32,
    pub stats: EventStats,
    pub summary: ScoreboardSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct RaceView {
    pub race_number: u32,
    pub status: RaceStatus,
    pub result: Option<Podium>,
    pub completed_at: Option<DateTime<Utc>>,
    pub picks: BTreeMap<String, String>,
}

impl From<&Race> for RaceView {
    fn from(race: &Race) -> Self {
        Self {
            race_number: race.race_number(),
            status: race.status(),
            result: race.result().cloned(),
            completed_at: race.completed_at(),
            picks: race.picks().clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StandingsQuery {
    pub search: Option<String>,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let event = state.event.read().await;
    Json(StatusResponse {
        event_name: state.event_name.clone(),
        phase: event.phase().to_string(),
        current_race: event.config().current_race,
        total_races: event.config().total_races,
        stats: event.stats(),
        summary: event.summary(),
    })
}

/// GET /api/standings?search=
pub async fn get_standings(
    State(state): State<AppState>,
    Query(query): Query<StandingsQuery>,
) -> Json<Vec<Standing>> {
    let standings = state.event.read().await.compute_standings();
    match query.search.as_deref() {
        Some(term) => Json(scoring::filter_standings(&standings, term)),
        None => Json(standings),
    }
}

/// GET /api/standings/csv
pub async fn get_standings_csv(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let csv = state
        .event
        .read()
        .await
        .standings_csv()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv))
}

/// GET /api/breakdown
pub async fn get_breakdown(State(state): State<AppState>) -> Json<Vec<RaceBreakdown>> {
    Json(state.event.read().await.race_breakdown())
}

/// GET /api/races
pub async fn get_races(State(state): State<AppState>) -> Json<Vec<RaceView>> {
    let event = state.event.read().await;
    Json(event.list_races().into_iter().map(RaceView::from).collect())
}

/// GET /api/races/:number
pub async fn get_race(
    State(state): State<AppState>,
    Path(number): Path<u32>,
) -> Result<Json<RaceView>, StatusCode> {
    let event = state.event.read().await;
    event
        .get_race(number)
        .map(|race| Json(RaceView::from(race)))
        .ok_or(StatusCode::NOT_FOUND)
}

/// GET /api/horses
pub async fn get_horses(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.event.read().await.list_horses())
}

/// GET /api/bettors
pub async fn get_bettors(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.event.read().await.list_bettors())
}

/// GET /api/export
pub async fn get_export(State(state): State<AppState>) -> Json<EventSnapshot> {
    Json(state.event.read().await.export_snapshot())
}

/// GET /
pub async fn get_leaderboard(State(state): State<AppState>) -> String {
    let standings = state.event.read().await.compute_standings();
    format!("{}\n\n{}", state.event_name, scoring::render_leaderboard(&standings))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
