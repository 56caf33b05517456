//! Race ledger: pending and finalized races with their picks.
//!
//! `finalize_race` validates everything up front and only then writes the
//! result and the full pick map together, so a rejected submission never
//! leaves a race with a result but no picks (or the reverse).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::engine::roster::Roster;
use crate::types::{DerbyError, EntityKind, Finalization, Podium, Race, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    races: BTreeMap<u32, Race>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_race(&mut self, race_number: u32) -> Result<u32> {
        validate_race_number(race_number)?;
        if self.races.contains_key(&race_number) {
            return Err(DerbyError::duplicate(EntityKind::Race, race_number.to_string()));
        }
        self.races.insert(race_number, Race::pending(race_number));
        Ok(race_number)
    }

    /// Record the top three and the picks scored against them.
    ///
    /// Checks, in order: the race number is valid, the placings are
    /// pairwise distinct, each placed horse exists, and every pick names a
    /// known bettor and horse. A missing race is created on success.
    /// Re-finalizing replaces the previous result and picks wholesale.
    pub fn finalize_race(
        &mut self,
        roster: &Roster,
        race_number: u32,
        podium: Podium,
        picks: BTreeMap<String, String>,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        validate_race_number(race_number)?;

        if !podium.is_distinct() {
            return Err(DerbyError::Validation(format!(
                "race {race_number}: placings must be three different horses ({podium})"
            )));
        }

        for horse in [&podium.first, &podium.second, &podium.third] {
            if !roster.has_horse(horse) {
                return Err(DerbyError::Validation(format!(
                    "race {race_number}: unknown horse #{horse} in result"
                )));
            }
        }

        for (bettor, horse) in &picks {
            if !roster.has_bettor(bettor) {
                return Err(DerbyError::Validation(format!(
                    "race {race_number}: pick for unknown bettor {bettor}"
                )));
            }
            if !roster.has_horse(horse) {
                return Err(DerbyError::Validation(format!(
                    "race {race_number}: {bettor} picked unknown horse #{horse}"
                )));
            }
        }

        self.races
            .entry(race_number)
            .or_insert_with(|| Race::pending(race_number))
            .finalize(Finalization { podium, completed_at }, picks);
        Ok(())
    }

    pub fn get_race(&self, race_number: u32) -> Option<&Race> {
        self.races.get(&race_number)
    }

    /// All races by race number ascending.
    pub fn list_races(&self) -> impl Iterator<Item = &Race> {
        self.races.values()
    }

    pub fn finalized_races(&self) -> impl Iterator<Item = &Race> {
        self.races.values().filter(|r| r.is_finalized())
    }

    pub fn finalized_count(&self) -> usize {
        self.finalized_races().count()
    }

    pub fn race_count(&self) -> usize {
        self.races.len()
    }

    /// Picks for a race; empty when the race is unknown or pending.
    pub fn picks_for(&self, race_number: u32) -> BTreeMap<String, String> {
        self.races
            .get(&race_number)
            .filter(|r| r.is_finalized())
            .map(|r| r.picks().clone())
            .unwrap_or_default()
    }

    /// Race numbers whose result or picks mention `horse`.
    pub fn races_referencing_horse(&self, horse: &str) -> Vec<u32> {
        self.races
            .values()
            .filter(|r| r.references_horse(horse))
            .map(|r| r.race_number())
            .collect()
    }

    /// Drop a bettor's pick from every race. Returns how many were removed.
    pub(crate) fn remove_picks_for(&mut self, bettor: &str) -> usize {
        let mut removed = 0;
        for race in self.races.values_mut() {
            if race.remove_pick(bettor) {
                removed += 1;
            }
        }
        removed
    }
}

fn validate_race_number(race_number: u32) -> Result<()> {
    if race_number == 0 {
        return Err(DerbyError::Validation("race numbers start at 1".into()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
