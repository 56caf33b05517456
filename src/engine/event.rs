//! Event state machine.
//!
//! `DerbyEvent` owns the roster, the race ledger, and the event
//! configuration, and is the only way to mutate them. Every operation
//! checks the lifecycle gates (horses → bettors → races) before touching
//! state, and multi-step operations validate fully before writing.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::engine::ledger::Ledger;
use crate::engine::roster::Roster;
use crate::engine::scoring::{self, RaceBreakdown, ScoreboardSummary};
use crate::types::{
    BettorId, DerbyError, EntityKind, EventConfig, Phase, Podium, Race, Result, Standing,
    DEFAULT_HORSE_COUNT, DEFAULT_TOTAL_RACES,
};

/// Values an event starts from (and returns to on full reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventDefaults {
    pub total_races: u32,
    /// Size of the one-time auto-provisioned horse roster.
    pub horse_count: u32,
}

impl Default for EventDefaults {
    fn default() -> Self {
        Self {
            total_races: DEFAULT_TOTAL_RACES,
            horse_count: DEFAULT_HORSE_COUNT,
        }
    }
}

/// Outcome of a lenient bulk insert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: Vec<String>,
    /// Already registered.
    pub skipped: Vec<String>,
    /// Refused for any other reason, with the error.
    pub rejected: Vec<(String, DerbyError)>,
}

/// Counts shown on the status screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct EventStats {
    pub total_horses: usize,
    pub total_bettors: usize,
    pub total_races: usize,
    pub completed_races: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerbyEvent {
    roster: Roster,
    ledger: Ledger,
    config: EventConfig,
    defaults: EventDefaults,
}

impl Default for DerbyEvent {
    fn default() -> Self {
        Self::new(EventDefaults::default())
    }
}

impl DerbyEvent {
    pub fn new(defaults: EventDefaults) -> Self {
        Self {
            roster: Roster::new(),
            ledger: Ledger::new(),
            config: EventConfig::new(defaults.total_races),
            defaults,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn config(&self) -> &EventConfig {
        &self.config
    }

    pub fn defaults(&self) -> EventDefaults {
        self.defaults
    }

    pub fn phase(&self) -> Phase {
        if !self.config.horse_setup_complete {
            Phase::AwaitingHorseSetup
        } else if !self.config.bettor_setup_complete {
            Phase::AwaitingBettorSetup
        } else if self.config.current_race > self.config.total_races {
            Phase::Complete
        } else {
            Phase::Active
        }
    }

    // -- Horses --------------------------------------------------------------

    pub fn add_horse(&mut self, number: &str) -> Result<()> {
        if number.is_empty() {
            return Err(DerbyError::Validation("horse number must not be empty".into()));
        }
        self.roster.add_horse(number)
    }

    pub fn add_horses_bulk<I, S>(&mut self, numbers: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let numbers: Vec<String> = numbers
            .into_iter()
            .map(|n| n.as_ref().to_string())
            .filter(|n| !n.is_empty())
            .collect();
        self.roster.add_horses_bulk(numbers)
    }

    /// Remove a horse that no race result or pick refers to.
    pub fn remove_horse(&mut self, number: &str) -> Result<()> {
        if !self.roster.has_horse(number) {
            return Err(DerbyError::not_found(EntityKind::Horse, number));
        }
        let races = self.ledger.races_referencing_horse(number);
        if !races.is_empty() {
            let list: Vec<String> = races.iter().map(u32::to_string).collect();
            return Err(DerbyError::Referenced {
                kind: EntityKind::Horse,
                key: number.to_string(),
                reason: format!("referenced by race(s) {}", list.join(", ")),
            });
        }
        self.roster.remove_horse(number)
    }

    pub fn list_horses(&self) -> Vec<String> {
        self.roster.list_horses()
    }

    /// Number horses "1".."count" and mark horse setup complete.
    pub fn setup_horses(&mut self, count: u32) -> Result<()> {
        if self.config.horse_setup_complete {
            return Err(DerbyError::Precondition("horse setup is already complete".into()));
        }
        if count == 0 {
            return Err(DerbyError::Validation("need at least one horse".into()));
        }
        self.roster.add_horses_bulk((1..=count).map(|n| n.to_string()));
        self.config.target_horse_count = count;
        self.config.horse_setup_complete = true;
        Ok(())
    }

    /// Close horse setup.
    ///
    /// An empty roster on an event that has never been provisioned gets
    /// the default numbered roster first; this happens at most once.
    pub fn complete_horse_setup(&mut self) -> Result<()> {
        if self.config.horse_setup_complete {
            return Err(DerbyError::Precondition("horse setup is already complete".into()));
        }
        if self.roster.horse_count() == 0 && !self.config.auto_provisioned {
            let count = self.defaults.horse_count;
            self.roster.add_horses_bulk((1..=count).map(|n| n.to_string()));
            self.config.target_horse_count = count;
            self.config.auto_provisioned = true;
        }
        if self.roster.horse_count() == 0 {
            return Err(DerbyError::Precondition("at least one horse is required".into()));
        }
        self.config.horse_setup_complete = true;
        Ok(())
    }

    // -- Bettors -------------------------------------------------------------

    pub fn add_bettor(&mut self, name: &str) -> Result<BettorId> {
        if name.is_empty() {
            return Err(DerbyError::Validation("bettor name must not be empty".into()));
        }
        self.roster.add_bettor(name)
    }

    /// Add each name, reporting rather than failing on bad entries.
    pub fn add_bettors_bulk<I, S>(&mut self, names: I) -> ImportReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = ImportReport::default();
        for name in names {
            let name = name.as_ref();
            match self.add_bettor(name) {
                Ok(_) => report.added.push(name.to_string()),
                Err(DerbyError::Duplicate { .. }) => report.skipped.push(name.to_string()),
                Err(e) => report.rejected.push((name.to_string(), e)),
            }
        }
        report
    }

    /// Remove a bettor and every pick they made.
    pub fn remove_bettor(&mut self, name: &str) -> Result<()> {
        self.roster.remove_bettor(name)?;
        self.ledger.remove_picks_for(name);
        Ok(())
    }

    pub fn list_bettors(&self) -> Vec<String> {
        self.roster.list_bettors()
    }

    pub fn set_target_bettor_count(&mut self, count: u32) -> Result<()> {
        if self.config.bettor_setup_complete {
            return Err(DerbyError::Precondition("bettor setup is already complete".into()));
        }
        if count == 0 {
            return Err(DerbyError::Validation("target bettor count must be positive".into()));
        }
        self.config.target_bettor_count = Some(count);
        Ok(())
    }

    pub fn complete_bettor_setup(&mut self) -> Result<()> {
        match self.phase() {
            Phase::AwaitingHorseSetup => {
                return Err(DerbyError::Precondition("finish horse setup first".into()))
            }
            Phase::AwaitingBettorSetup => {}
            Phase::Active | Phase::Complete => {
                return Err(DerbyError::Precondition("bettor setup is already complete".into()))
            }
        }
        let target = self
            .config
            .target_bettor_count
            .ok_or_else(|| DerbyError::Precondition("set a target bettor count first".into()))?;
        let have = self.roster.bettor_count();
        if have < target as usize {
            return Err(DerbyError::Precondition(format!(
                "{have} of {target} bettors registered"
            )));
        }
        self.config.bettor_setup_complete = true;
        Ok(())
    }

    // -- Races ---------------------------------------------------------------

    pub fn create_race(&mut self, race_number: u32) -> Result<u32> {
        self.ledger.create_race(race_number)
    }

    pub fn finalize_race(
        &mut self,
        race_number: u32,
        podium: Podium,
        picks: BTreeMap<String, String>,
    ) -> Result<()> {
        self.finalize_race_at(race_number, podium, picks, Utc::now())
    }

    /// Finalize with an explicit completion time (used when replaying).
    pub fn finalize_race_at(
        &mut self,
        race_number: u32,
        podium: Podium,
        picks: BTreeMap<String, String>,
        completed_at: DateTime<Utc>,
    ) -> Result<()> {
        let phase = self.phase();
        if !phase.accepts_results() {
            return Err(DerbyError::Precondition(format!(
                "cannot record results while {}",
                phase.to_string().to_lowercase()
            )));
        }
        self.ledger
            .finalize_race(&self.roster, race_number, podium, picks, completed_at)
    }

    pub fn get_race(&self, race_number: u32) -> Option<&Race> {
        self.ledger.get_race(race_number)
    }

    pub fn list_races(&self) -> Vec<&Race> {
        self.ledger.list_races().collect()
    }

    pub fn picks_for(&self, race_number: u32) -> BTreeMap<String, String> {
        self.ledger.picks_for(race_number)
    }

    /// Move the current-race pointer forward by one.
    ///
    /// Whether the current race was finalized is not checked. The pointer
    /// may step one past `total_races` (the event is then complete) but no
    /// further.
    pub fn advance_race(&mut self) -> Result<u32> {
        if self.config.current_race > self.config.total_races {
            return Err(DerbyError::Precondition(format!(
                "all {} races have been run",
                self.config.total_races
            )));
        }
        self.config.current_race = self
            .config
            .current_race
            .checked_add(1)
            .ok_or_else(|| DerbyError::Validation("race number out of range".into()))?;
        Ok(self.config.current_race)
    }

    pub fn set_total_races(&mut self, total: u32) -> Result<()> {
        if total == 0 {
            return Err(DerbyError::Validation("an event needs at least one race".into()));
        }
        let completed = self.ledger.finalized_count();
        if (total as usize) < completed {
            return Err(DerbyError::Validation(format!(
                "cannot reduce race count below {completed}: that many races are completed"
            )));
        }
        if total < self.config.current_race {
            return Err(DerbyError::Validation(format!(
                "cannot reduce race count below {}: already on that race",
                self.config.current_race
            )));
        }
        self.config.total_races = total;
        Ok(())
    }

    // -- Scoring -------------------------------------------------------------

    pub fn compute_standings(&self) -> Vec<Standing> {
        scoring::compute_standings(&self.roster, &self.ledger)
    }

    pub fn summary(&self) -> ScoreboardSummary {
        scoring::summarize(&self.compute_standings(), &self.ledger, &self.config)
    }

    pub fn race_breakdown(&self) -> Vec<RaceBreakdown> {
        scoring::race_breakdown(&self.compute_standings(), &self.ledger)
    }

    /// Full scoreboard as CSV text.
    pub fn standings_csv(&self) -> Result<String> {
        scoring::render_csv(&self.compute_standings(), &self.ledger)
            .map_err(|e| DerbyError::Storage(format!("csv export failed: {e}")))
    }

    pub fn stats(&self) -> EventStats {
        EventStats {
            total_horses: self.roster.horse_count(),
            total_bettors: self.roster.bettor_count(),
            total_races: self.ledger.race_count(),
            completed_races: self.ledger.finalized_count(),
        }
    }

    // -- Resets --------------------------------------------------------------

    /// Clear roster, ledger, and configuration back to the defaults.
    pub fn reset_all(&mut self) {
        *self = Self::new(self.defaults);
    }

    /// Clear the horse roster. Only allowed while no bettor exists and no
    /// race result refers to a horse. Bettor setup reopens with it, since
    /// bettors can only be set up against a closed horse roster.
    pub fn reset_horses(&mut self) -> Result<()> {
        if self.roster.bettor_count() > 0 {
            return Err(DerbyError::Precondition(
                "cannot reset horses while bettors exist".into(),
            ));
        }
        if self.ledger.finalized_count() > 0 {
            return Err(DerbyError::Precondition(
                "cannot reset horses while races have results".into(),
            ));
        }
        self.roster.clear_horses();
        self.config.horse_setup_complete = false;
        self.config.target_horse_count = 0;
        self.config.bettor_setup_complete = false;
        self.config.target_bettor_count = None;
        Ok(())
    }

    /// Clear the bettor roster. Only allowed before any race is finalized.
    pub fn reset_bettors(&mut self) -> Result<()> {
        if self.ledger.finalized_count() > 0 {
            return Err(DerbyError::Precondition(
                "cannot reset bettors while races have results".into(),
            ));
        }
        self.roster.clear_bettors();
        self.config.bettor_setup_complete = false;
        self.config.target_bettor_count = None;
        Ok(())
    }

    pub(crate) fn config_mut(&mut self) -> &mut EventConfig {
        &mut self.config
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
