//! Event snapshots: the structured shape used for export, import, and
//! persistence.
//!
//! Importing never writes state directly: a snapshot is replayed through
//! the same validated calls a live event uses, into a fresh event that is
//! only handed back if every step succeeds.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::event::{DerbyEvent, EventDefaults};
use crate::types::{DerbyError, EventConfig, Podium, Result, Standing, DEFAULT_TOTAL_RACES};

// ---------------------------------------------------------------------------
// Snapshot shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    pub horses: Vec<String>,
    pub bettors: Vec<String>,
    pub races: Vec<RaceSnapshot>,
    pub config: EventConfig,
    /// Derived on export; ignored on import.
    #[serde(default)]
    pub standings: Vec<Standing>,
    #[serde(default)]
    pub exported_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceSnapshot {
    pub race_number: u32,
    #[serde(default)]
    pub result: Option<ResultSnapshot>,
    #[serde(default)]
    pub picks: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSnapshot {
    pub first: String,
    pub second: String,
    pub third: String,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ResultSnapshot {
    fn podium(&self) -> Podium {
        Podium::new(&self.first, &self.second, &self.third)
    }
}

// ---------------------------------------------------------------------------
// Export / import
// ---------------------------------------------------------------------------

impl DerbyEvent {
    pub fn export_snapshot(&self) -> EventSnapshot {
        let races = self
            .ledger()
            .list_races()
            .map(|race| RaceSnapshot {
                race_number: race.race_number(),
                result: race.result().map(|p| ResultSnapshot {
                    first: p.first.clone(),
                    second: p.second.clone(),
                    third: p.third.clone(),
                    completed_at: race.completed_at(),
                }),
                picks: race.picks().clone(),
            })
            .collect();

        EventSnapshot {
            horses: self.list_horses(),
            bettors: self.list_bettors(),
            races,
            config: self.config().clone(),
            standings: self.compute_standings(),
            exported_at: Some(Utc::now()),
        }
    }

    /// Rebuild an event by replaying a snapshot.
    pub fn import_snapshot(snapshot: &EventSnapshot, defaults: EventDefaults) -> Result<DerbyEvent> {
        let cfg = &snapshot.config;
        if cfg.current_race == 0 {
            return Err(DerbyError::Validation("current race must be at least 1".into()));
        }

        let mut event = DerbyEvent::new(defaults);
        event.config_mut().auto_provisioned = cfg.auto_provisioned;

        for horse in &snapshot.horses {
            event.add_horse(horse)?;
        }
        if cfg.horse_setup_complete {
            if event.roster().horse_count() > 0 {
                event.complete_horse_setup()?;
            } else {
                // Every horse was removed after setup closed.
                event.config_mut().horse_setup_complete = true;
            }
        }
        event.config_mut().target_horse_count = cfg.target_horse_count;

        for bettor in &snapshot.bettors {
            event.add_bettor(bettor)?;
        }
        let bettor_count = event.roster().bettor_count() as u32;
        if cfg.bettor_setup_complete {
            if bettor_count > 0 {
                // Bettors removed after setup closed no longer count toward
                // the target, so the gate is checked against today's roster.
                let target = cfg.target_bettor_count.unwrap_or(bettor_count).min(bettor_count);
                event.set_target_bettor_count(target)?;
                event.complete_bettor_setup()?;
            } else if event.config().horse_setup_complete {
                event.config_mut().bettor_setup_complete = true;
            } else {
                return Err(DerbyError::Precondition("finish horse setup first".into()));
            }
        } else if let Some(target) = cfg.target_bettor_count {
            event.set_target_bettor_count(target)?;
        }
        event.config_mut().target_bettor_count = cfg.target_bettor_count;

        for race in &snapshot.races {
            match &race.result {
                Some(result) => event.finalize_race_at(
                    race.race_number,
                    result.podium(),
                    race.picks.clone(),
                    result.completed_at.unwrap_or_else(Utc::now),
                )?,
                None if !race.picks.is_empty() => {
                    return Err(DerbyError::Validation(format!(
                        "race {}: picks recorded without a result",
                        race.race_number
                    )))
                }
                None => {
                    event.create_race(race.race_number)?;
                }
            }
        }

        // Results may run past `total_races`, so only the pointer is checked
        // against the race count; the completed-race floor applies to edits.
        if cfg.total_races == 0 {
            return Err(DerbyError::Validation("an event needs at least one race".into()));
        }
        if cfg.current_race > cfg.total_races.saturating_add(1) {
            return Err(DerbyError::Validation(format!(
                "current race {} is past the end of a {}-race event",
                cfg.current_race, cfg.total_races
            )));
        }
        let config = event.config_mut();
        config.total_races = cfg.total_races;
        config.current_race = cfg.current_race;

        Ok(event)
    }
}

// ---------------------------------------------------------------------------
// Legacy export format
// ---------------------------------------------------------------------------

/// The flat JSON export written by the earlier single-page app.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyExport {
    #[serde(default)]
    pub horses: Vec<String>,
    #[serde(default)]
    pub bettors: Vec<LegacyBettor>,
    #[serde(default)]
    pub races: Vec<LegacyRace>,
    #[serde(default = "first_race")]
    pub current_race: u32,
    #[serde(default)]
    pub setup_complete: bool,
    #[serde(default)]
    pub target_horse_count: u32,
    #[serde(default)]
    pub bettors_setup_complete: bool,
    #[serde(default)]
    pub target_bettor_count: u32,
    #[serde(default = "default_total_races")]
    pub total_races: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyBettor {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyRace {
    pub race_number: u32,
    #[serde(default)]
    pub results: Option<LegacyResults>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyResults {
    pub first: String,
    pub second: String,
    pub third: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub bettor_bets: BTreeMap<String, String>,
}

fn first_race() -> u32 {
    1
}

fn default_total_races() -> u32 {
    DEFAULT_TOTAL_RACES
}

/// Accepts RFC 3339, ISO 8601 without offset, and SQLite's
/// `YYYY-MM-DD HH:MM:SS`. Naive times are taken as UTC.
fn parse_legacy_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

impl From<LegacyExport> for EventSnapshot {
    fn from(legacy: LegacyExport) -> Self {
        let races = legacy
            .races
            .into_iter()
            .map(|race| match race.results {
                Some(results) => RaceSnapshot {
                    race_number: race.race_number,
                    result: Some(ResultSnapshot {
                        completed_at: results.timestamp.as_deref().and_then(parse_legacy_timestamp),
                        first: results.first,
                        second: results.second,
                        third: results.third,
                    }),
                    // Unfilled entries were exported as empty strings.
                    picks: results
                        .bettor_bets
                        .into_iter()
                        .filter(|(_, horse)| !horse.is_empty())
                        .collect(),
                },
                None => RaceSnapshot {
                    race_number: race.race_number,
                    result: None,
                    picks: BTreeMap::new(),
                },
            })
            .collect();

        EventSnapshot {
            horses: legacy.horses,
            bettors: legacy.bettors.into_iter().map(|b| b.name).collect(),
            races,
            config: EventConfig {
                total_races: legacy.total_races,
                current_race: legacy.current_race,
                horse_setup_complete: legacy.setup_complete,
                bettor_setup_complete: legacy.bettors_setup_complete,
                target_horse_count: legacy.target_horse_count,
                target_bettor_count: (legacy.target_bettor_count > 0)
                    .then_some(legacy.target_bettor_count),
                auto_provisioned: false,
            },
            standings: Vec::new(),
            exported_at: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
