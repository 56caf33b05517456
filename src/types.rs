//! Shared types for the DERBY pool.
//!
//! These types form the data model used across all modules. The engine,
//! snapshot, and dashboard modules depend on them without circular
//! references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Points for picking the winner.
pub const FIRST_PLACE_POINTS: u32 = 3;
/// Points for picking the runner-up.
pub const SECOND_PLACE_POINTS: u32 = 2;
/// Points for picking third place.
pub const THIRD_PLACE_POINTS: u32 = 1;

/// Default number of races in an event.
pub const DEFAULT_TOTAL_RACES: u32 = 10;
/// Size of the roster auto-provisioned on first horse setup.
pub const DEFAULT_HORSE_COUNT: u32 = 8;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Stable id handed out when a bettor joins the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BettorId(pub u64);

impl fmt::Display for BettorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which kind of entity an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Horse,
    Bettor,
    Race,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Horse => write!(f, "horse"),
            EntityKind::Bettor => write!(f, "bettor"),
            EntityKind::Race => write!(f, "race"),
        }
    }
}

// ---------------------------------------------------------------------------
// Race
// ---------------------------------------------------------------------------

/// Top-three finish order of a race, by horse number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Podium {
    pub first: String,
    pub second: String,
    pub third: String,
}

impl Podium {
    pub fn new(first: impl Into<String>, second: impl Into<String>, third: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
            third: third.into(),
        }
    }

    /// Whether all three placings name different horses.
    pub fn is_distinct(&self) -> bool {
        self.first != self.second && self.first != self.third && self.second != self.third
    }

    /// Whether `horse` finished anywhere in the top three.
    pub fn contains(&self, horse: &str) -> bool {
        self.first == horse || self.second == horse || self.third == horse
    }

    /// Points earned by a pick against this podium. No pick scores 0.
    pub fn points_for(&self, pick: Option<&str>) -> u32 {
        match pick {
            Some(h) if h == self.first => FIRST_PLACE_POINTS,
            Some(h) if h == self.second => SECOND_PLACE_POINTS,
            Some(h) if h == self.third => THIRD_PLACE_POINTS,
            _ => 0,
        }
    }
}

impl fmt::Display for Podium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "1st #{} | 2nd #{} | 3rd #{}", self.first, self.second, self.third)
    }
}

/// Race lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RaceStatus {
    Pending,
    Finalized,
}

impl fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RaceStatus::Pending => write!(f, "PENDING"),
            RaceStatus::Finalized => write!(f, "FINALIZED"),
        }
    }
}

/// Result and completion time recorded when a race is finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finalization {
    pub podium: Podium,
    pub completed_at: DateTime<Utc>,
}

/// A single race in the ledger.
///
/// The result and completion time live together in `finalization`, so a
/// race is finalized exactly when it has a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Race {
    race_number: u32,
    finalization: Option<Finalization>,
    picks: BTreeMap<String, String>,
}

impl Race {
    /// A fresh pending race with no picks.
    pub fn pending(race_number: u32) -> Self {
        Self {
            race_number,
            finalization: None,
            picks: BTreeMap::new(),
        }
    }

    pub fn race_number(&self) -> u32 {
        self.race_number
    }

    pub fn status(&self) -> RaceStatus {
        if self.finalization.is_some() {
            RaceStatus::Finalized
        } else {
            RaceStatus::Pending
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalization.is_some()
    }

    pub fn result(&self) -> Option<&Podium> {
        self.finalization.as_ref().map(|f| &f.podium)
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.finalization.as_ref().map(|f| f.completed_at)
    }

    /// Bettor name → horse number for this race.
    pub fn picks(&self) -> &BTreeMap<String, String> {
        &self.picks
    }

    /// Whether this race's result or picks mention `horse`.
    pub fn references_horse(&self, horse: &str) -> bool {
        self.result().is_some_and(|p| p.contains(horse)) || self.picks.values().any(|h| h == horse)
    }

    /// Replace result and picks in one step.
    pub(crate) fn finalize(&mut self, finalization: Finalization, picks: BTreeMap<String, String>) {
        self.finalization = Some(finalization);
        self.picks = picks;
    }

    /// Drop a bettor's pick. Returns whether one was present.
    pub(crate) fn remove_pick(&mut self, bettor: &str) -> bool {
        self.picks.remove(bettor).is_some()
    }
}

impl fmt::Display for Race {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.result() {
            Some(podium) => write!(
                f,
                "Race {} [{}] {} ({} picks)",
                self.race_number,
                self.status(),
                podium,
                self.picks.len(),
            ),
            None => write!(f, "Race {} [{}]", self.race_number, self.status()),
        }
    }
}

// ---------------------------------------------------------------------------
// Standings
// ---------------------------------------------------------------------------

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub rank: usize,
    pub bettor_name: String,
    /// Points per finalized race, keyed by race number.
    pub per_race_points: BTreeMap<u32, u32>,
    pub total_points: u32,
}

impl fmt::Display for Standing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {} - {} pts", self.rank, self.bettor_name, self.total_points)
    }
}

// ---------------------------------------------------------------------------
// Event configuration & phase
// ---------------------------------------------------------------------------

/// Per-event configuration and setup gates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventConfig {
    pub total_races: u32,
    pub current_race: u32,
    pub horse_setup_complete: bool,
    pub bettor_setup_complete: bool,
    /// Number of horses requested by the last bulk setup (informational).
    #[serde(default)]
    pub target_horse_count: u32,
    #[serde(default)]
    pub target_bettor_count: Option<u32>,
    /// Set once the default roster has been provisioned for this event.
    #[serde(default)]
    pub auto_provisioned: bool,
}

impl EventConfig {
    pub fn new(total_races: u32) -> Self {
        Self {
            total_races,
            current_race: 1,
            horse_setup_complete: false,
            bettor_setup_complete: false,
            target_horse_count: 0,
            target_bettor_count: None,
            auto_provisioned: false,
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TOTAL_RACES)
    }
}

/// Where the event is in its setup → racing lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    AwaitingHorseSetup,
    AwaitingBettorSetup,
    Active,
    /// Advisory: every scheduled race has been run.
    Complete,
}

impl Phase {
    /// Whether race results may be recorded in this phase.
    pub fn accepts_results(&self) -> bool {
        matches!(self, Phase::Active | Phase::Complete)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::AwaitingHorseSetup => write!(f, "Awaiting horse setup"),
            Phase::AwaitingBettorSetup => write!(f, "Awaiting bettor setup"),
            Phase::Active => write!(f, "Active"),
            Phase::Complete => write!(f, "Complete"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for DERBY. All are recoverable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DerbyError {
    #[error("Duplicate {kind}: {key}")]
    Duplicate { kind: EntityKind, key: String },

    #[error("Unknown {kind}: {key}")]
    NotFound { kind: EntityKind, key: String },

    #[error("Cannot remove {kind} {key}: {reason}")]
    Referenced {
        kind: EntityKind,
        key: String,
        reason: String,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not allowed yet: {0}")]
    Precondition(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DerbyError {
    pub(crate) fn duplicate(kind: EntityKind, key: impl Into<String>) -> Self {
        DerbyError::Duplicate { kind, key: key.into() }
    }

    pub(crate) fn not_found(kind: EntityKind, key: impl Into<String>) -> Self {
        DerbyError::NotFound { kind, key: key.into() }
    }
}

pub type Result<T> = std::result::Result<T, DerbyError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
