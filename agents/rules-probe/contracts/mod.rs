//! Rules Probe Agent Contracts
//!
//! Record shape, run stages and run reports shared by the engine,
//! the signal handler and the CLI.

mod record;

pub use record::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const AGENT_ID: &str = "rules-probe-agent";
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Activation signal the probe answers to
pub const DEFAULT_ACTION: &str = "com.dawitf.akahidegn.DEBUG_TEST_FIREBASE_RULES";

/// Collection the probe record is written into
pub const DEFAULT_COLLECTION: &str = "groups";

/// Stage of a probe run
///
/// `Idle → KeyAllocated → Writing → {WriteFailed | WriteSucceeded → Reading
/// → {ReadFailed | ReadSucceeded → Deleting → Done}}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStage {
    Idle,
    KeyAllocated,
    Writing,
    WriteFailed,
    WriteSucceeded,
    Reading,
    ReadFailed,
    ReadSucceeded,
    Deleting,
    Done,
}

impl ProbeStage {
    /// Whether a run stops in this stage
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProbeStage::WriteFailed | ProbeStage::ReadFailed | ProbeStage::Done
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStage::Idle => "idle",
            ProbeStage::KeyAllocated => "key_allocated",
            ProbeStage::Writing => "writing",
            ProbeStage::WriteFailed => "write_failed",
            ProbeStage::WriteSucceeded => "write_succeeded",
            ProbeStage::Reading => "reading",
            ProbeStage::ReadFailed => "read_failed",
            ProbeStage::ReadSucceeded => "read_succeeded",
            ProbeStage::Deleting => "deleting",
            ProbeStage::Done => "done",
        }
    }
}

impl std::fmt::Display for ProbeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a probe run that reached `Done`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Run identifier (also the tracing span field)
    pub run_id: Uuid,

    /// Principal the record was written as
    pub principal: String,

    /// Key the record lived under
    pub key: String,

    /// Record as written
    pub record: ProbeRecord,

    /// Whether the read-back decoded to the written record
    pub round_trip_matches: bool,

    /// Start timestamp
    pub started_at: DateTime<Utc>,

    /// Total duration in milliseconds
    pub duration_ms: u64,
}

impl ProbeReport {
    /// Final stage of a completed run
    pub fn stage(&self) -> ProbeStage {
        ProbeStage::Done
    }
}

/// Printable summary of one run, successful or not
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub passed: bool,

    pub stage: ProbeStage,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Key of a record left behind in the store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphaned_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_trip_matches: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl RunSummary {
    pub fn passed(report: &ProbeReport) -> Self {
        Self {
            passed: true,
            stage: report.stage(),
            run_id: Some(report.run_id),
            key: Some(report.key.clone()),
            orphaned_key: None,
            round_trip_matches: Some(report.round_trip_matches),
            error: None,
            duration_ms: Some(report.duration_ms),
        }
    }

    pub fn failed(
        run_id: Uuid,
        stage: ProbeStage,
        key: Option<String>,
        orphaned_key: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            passed: false,
            stage,
            run_id: Some(run_id),
            key,
            orphaned_key,
            round_trip_matches: None,
            error: Some(error.into()),
            duration_ms: None,
        }
    }
}
