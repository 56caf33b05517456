//! Session: a live event bound to the store that persists it.
//!
//! Every mutation runs against a working copy. The copy is saved and only
//! then swapped in, so neither memory nor disk ever holds a half-applied
//! change.

use tracing::{debug, info, warn};

use crate::engine::event::{DerbyEvent, EventDefaults};
use crate::storage::SnapshotStore;
use crate::types::{DerbyError, Result};

pub struct Session<S: SnapshotStore> {
    event: DerbyEvent,
    store: S,
}

impl<S: SnapshotStore> Session<S> {
    /// Restore the event from the store, or start a fresh one.
    pub fn open(store: S, defaults: EventDefaults) -> Result<Self> {
        let event = match store.load().map_err(storage_error)? {
            Some(snapshot) => {
                let event = DerbyEvent::import_snapshot(&snapshot, defaults)?;
                info!(
                    phase = %event.phase(),
                    current_race = event.config().current_race,
                    bettors = event.roster().bettor_count(),
                    "Resumed from saved state"
                );
                event
            }
            None => {
                info!(total_races = defaults.total_races, "Fresh event");
                DerbyEvent::new(defaults)
            }
        };
        Ok(Self { event, store })
    }

    pub fn event(&self) -> &DerbyEvent {
        &self.event
    }

    pub fn into_event(self) -> DerbyEvent {
        self.event
    }

    /// Apply a mutation and persist it. Nothing changes if either fails.
    pub fn apply<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnOnce(&mut DerbyEvent) -> Result<T>,
    {
        let mut working = self.event.clone();
        let out = op(&mut working)?;

        self.store.save(&working.export_snapshot()).map_err(|e| {
            warn!(error = %format!("{e:#}"), "Failed to save state, change discarded");
            storage_error(e)
        })?;

        self.event = working;
        debug!(phase = %self.event.phase(), "Change committed");
        Ok(out)
    }
}

fn storage_error(e: anyhow::Error) -> DerbyError {
    DerbyError::Storage(format!("{e:#}"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
