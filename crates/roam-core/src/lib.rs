//! Core orchestration logic for the room roaming client.
//!
//! This crate is intentionally transport-agnostic. The platform's auth and room
//! endpoints live behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod credentials;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod logging;
pub mod orchestrator;
pub mod pacing;
pub mod ports;
pub mod refresher;
pub mod retry;

pub use errors::{Error, Result};
