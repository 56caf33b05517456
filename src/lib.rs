//! DERBY: race-day betting pool scoring and standings.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod engine;
pub mod snapshot;
pub mod import;
pub mod storage;
pub mod session;
pub mod dashboard;
