//! Persistence layer.
//!
//! Saves and loads the event snapshot to/from a JSON file. The snapshot
//! is the same structure used for export, so a state file can also be
//! handed to `derby import` on another machine.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::snapshot::EventSnapshot;

/// Default state file path.
pub const DEFAULT_STATE_FILE: &str = "derby_state.json";

/// Save an event snapshot to a JSON file.
///
/// Writes to a sibling temp file first and renames it into place, so a
/// crash mid-write leaves the previous state intact.
pub fn save_state(snapshot: &EventSnapshot, path: Option<&str>) -> Result<()> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);
    let json = serde_json::to_string_pretty(snapshot)
        .context("Failed to serialise event snapshot")?;

    let tmp = format!("{path}.tmp");
    std::fs::write(&tmp, &json)
        .with_context(|| format!("Failed to write state to {tmp}"))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move state into {path}"))?;

    debug!(
        path,
        horses = snapshot.horses.len(),
        bettors = snapshot.bettors.len(),
        races = snapshot.races.len(),
        "State saved"
    );
    Ok(())
}

/// Load an event snapshot from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_state(path: Option<&str>) -> Result<Option<EventSnapshot>> {
    let path = path.unwrap_or(DEFAULT_STATE_FILE);

    if !Path::new(path).exists() {
        info!(path, "No saved state found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read state from {path}"))?;

    let snapshot: EventSnapshot = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse state from {path}"))?;

    info!(
        path,
        horses = snapshot.horses.len(),
        bettors = snapshot.bettors.len(),
        races = snapshot.races.len(),
        current_race = snapshot.config.current_race,
        "State loaded from disk"
    );

    Ok(Some(snapshot))
}

// ---------------------------------------------------------------------------
// Store abstraction
// ---------------------------------------------------------------------------

/// Where a session keeps its snapshot between runs.
#[cfg_attr(test, mockall::automock)]
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Result<Option<EventSnapshot>>;
    fn save(&self, snapshot: &EventSnapshot) -> Result<()>;
}

/// JSON file store backed by [`save_state`] / [`load_state`].
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn path_str(&self) -> Result<&str> {
        self.path
            .to_str()
            .with_context(|| format!("State path is not valid UTF-8: {}", self.path.display()))
    }
}

impl SnapshotStore for JsonFileStore {
    fn load(&self) -> Result<Option<EventSnapshot>> {
        load_state(Some(self.path_str()?))
    }

    fn save(&self, snapshot: &EventSnapshot) -> Result<()> {
        save_state(snapshot, Some(self.path_str()?))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
