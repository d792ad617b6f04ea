//! Rules Probe Agent
//!
//! Checks that a hosted document database's access rules accept the
//! `groups` record shape: on a matching activation signal it writes one
//! synthetic record as the signed-in principal, reads it back and deletes it.
//!
//! # Design Principles
//! - One run per signal, independent of any other run
//! - Every failure ends the run; nothing is retried
//! - Every remote call is bounded by the request timeout

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
pub mod identity;
pub mod telemetry;

// Re-export contracts
#[path = "../contracts/mod.rs"]
pub mod contracts;

pub use client::{FirebaseRestStore, MemoryStore, RemoteStore, StoreError};
pub use config::ProbeConfig;
pub use contracts::*;
pub use engine::{summarize, ProbeSettings, RulesProbe, TriggerOutcome};
pub use error::{ConfigError, ProbeError};
pub use identity::{IdentityProvider, Principal, StaticIdentity};
