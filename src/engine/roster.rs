//! Roster store: the horses and bettors of an event.
//!
//! Enforces uniqueness of horse numbers and bettor names (exact,
//! case-sensitive match, no trimming). Referential checks that need the
//! race ledger live in the event state machine.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{BettorId, DerbyError, EntityKind, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    horses: BTreeSet<String>,
    bettors: BTreeMap<String, BettorId>,
    next_bettor_id: u64,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Horses --------------------------------------------------------------

    pub fn add_horse(&mut self, number: &str) -> Result<()> {
        if self.horses.contains(number) {
            return Err(DerbyError::duplicate(EntityKind::Horse, number));
        }
        self.horses.insert(number.to_string());
        Ok(())
    }

    /// Insert every number not already present; duplicates are skipped.
    /// Returns how many were actually added.
    pub fn add_horses_bulk<I, S>(&mut self, numbers: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;
        for number in numbers {
            if self.horses.insert(number.as_ref().to_string()) {
                added += 1;
            }
        }
        added
    }

    /// Remove a horse unconditionally. Callers check references first.
    pub(crate) fn remove_horse(&mut self, number: &str) -> Result<()> {
        if self.horses.remove(number) {
            Ok(())
        } else {
            Err(DerbyError::not_found(EntityKind::Horse, number))
        }
    }

    pub fn has_horse(&self, number: &str) -> bool {
        self.horses.contains(number)
    }

    pub fn horse_count(&self) -> usize {
        self.horses.len()
    }

    /// Horses in numeric order ("2" before "10").
    pub fn list_horses(&self) -> Vec<String> {
        let mut horses: Vec<String> = self.horses.iter().cloned().collect();
        horses.sort_by(|a, b| compare_horse_numbers(a, b));
        horses
    }

    pub(crate) fn clear_horses(&mut self) {
        self.horses.clear();
    }

    // -- Bettors -------------------------------------------------------------

    pub fn add_bettor(&mut self, name: &str) -> Result<BettorId> {
        if self.bettors.contains_key(name) {
            return Err(DerbyError::duplicate(EntityKind::Bettor, name));
        }
        self.next_bettor_id += 1;
        let id = BettorId(self.next_bettor_id);
        self.bettors.insert(name.to_string(), id);
        Ok(id)
    }

    /// Remove a bettor from the roster only. Pick cascade is the ledger's job.
    pub(crate) fn remove_bettor(&mut self, name: &str) -> Result<BettorId> {
        self.bettors
            .remove(name)
            .ok_or_else(|| DerbyError::not_found(EntityKind::Bettor, name))
    }

    pub fn has_bettor(&self, name: &str) -> bool {
        self.bettors.contains_key(name)
    }

    pub fn bettor_id(&self, name: &str) -> Option<BettorId> {
        self.bettors.get(name).copied()
    }

    pub fn bettor_count(&self) -> usize {
        self.bettors.len()
    }

    /// Bettor names, lexical ascending.
    pub fn list_bettors(&self) -> Vec<String> {
        self.bettors.keys().cloned().collect()
    }

    pub(crate) fn clear_bettors(&mut self) {
        self.bettors.clear();
    }
}

/// Numeric labels first by value, then anything else lexically.
fn compare_horse_numbers(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
