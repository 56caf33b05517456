//! Core engine: roster, race ledger, scoring, and the event state machine.
//!
//! Pure and synchronous. Nothing in here logs or touches the filesystem;
//! callers persist through `session` and log at that level.

pub mod roster;
pub mod ledger;
pub mod scoring;
pub mod event;

pub use event::{DerbyEvent, EventDefaults};
