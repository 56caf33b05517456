//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! field has a default, so a partial file (or none at all) is valid.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

use crate::engine::event::EventDefaults;
use crate::storage::DEFAULT_STATE_FILE;
use crate::types::{DEFAULT_HORSE_COUNT, DEFAULT_TOTAL_RACES};

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub event: EventSection,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EventSection {
    pub name: String,
    pub total_races: u32,
    /// Horses auto-provisioned when horse setup closes on an empty roster.
    pub default_horse_count: u32,
    pub state_file: String,
}

impl Default for EventSection {
    fn default() -> Self {
        Self {
            name: "Derby Day".to_string(),
            total_races: DEFAULT_TOTAL_RACES,
            default_horse_count: DEFAULT_HORSE_COUNT,
            state_file: DEFAULT_STATE_FILE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
    /// How often `serve` re-reads the state file.
    pub refresh_secs: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8501,
            refresh_secs: 5,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.event.total_races > 0, "event.total_races must be at least 1");
        anyhow::ensure!(
            self.event.default_horse_count > 0,
            "event.default_horse_count must be at least 1"
        );
        anyhow::ensure!(!self.event.state_file.is_empty(), "event.state_file must not be empty");
        anyhow::ensure!(self.dashboard.refresh_secs > 0, "dashboard.refresh_secs must be at least 1");
        Ok(())
    }

    pub fn event_defaults(&self) -> EventDefaults {
        EventDefaults {
            total_races: self.event.total_races,
            horse_count: self.event.default_horse_count,
        }
    }
}
