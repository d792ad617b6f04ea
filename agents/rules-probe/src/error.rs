//! Error types for the Rules Probe Agent
//!
//! Every probe error is terminal for its run; nothing here is retried.

use thiserror::Error;

use crate::client::StoreError;
use crate::contracts::ProbeStage;

/// Failure of a single probe run
#[derive(Error, Debug)]
pub enum ProbeError {
    /// No signed-in principal; no remote call was made
    #[error("No authenticated principal")]
    NoPrincipal,

    #[error("Key allocation failed: {0}")]
    KeyAllocationFailed(StoreError),

    #[error("Failed to encode probe record: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Rules or transport rejected the write
    #[error("Write rejected: {0}")]
    WriteRejected(StoreError),

    /// Write succeeded but read-back did not; the record stays at `key`
    #[error("Read failed for {key}: {source}")]
    ReadFailed { key: String, source: StoreError },

    #[error("Timed out in {stage} after {after_ms}ms")]
    Timeout {
        stage: ProbeStage,
        key: Option<String>,
        after_ms: u64,
    },
}

impl ProbeError {
    /// Stage the run stopped in
    pub fn stage(&self) -> ProbeStage {
        match self {
            ProbeError::NoPrincipal | ProbeError::KeyAllocationFailed(_) => ProbeStage::Idle,
            ProbeError::Encoding(_) => ProbeStage::KeyAllocated,
            ProbeError::WriteRejected(_) => ProbeStage::WriteFailed,
            ProbeError::ReadFailed { .. } => ProbeStage::ReadFailed,
            ProbeError::Timeout { stage, .. } => *stage,
        }
    }

    /// Key the run had allocated when it stopped, if it is known
    pub fn key(&self) -> Option<&str> {
        match self {
            ProbeError::ReadFailed { key, .. } => Some(key),
            ProbeError::Timeout { key, .. } => key.as_deref(),
            _ => None,
        }
    }

    /// Key of a record known to be left in the store
    pub fn orphaned_key(&self) -> Option<&str> {
        match self {
            ProbeError::ReadFailed { key, .. } => Some(key),
            ProbeError::Timeout {
                stage: ProbeStage::Reading,
                key,
                ..
            } => key.as_deref(),
            _ => None,
        }
    }

    /// Whether the store reported a policy rejection
    pub fn is_policy_rejection(&self) -> bool {
        match self {
            ProbeError::WriteRejected(e)
            | ProbeError::KeyAllocationFailed(e)
            | ProbeError::ReadFailed { source: e, .. } => e.is_permission_denied(),
            _ => false,
        }
    }

    /// Metric label
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::NoPrincipal => "no_principal",
            ProbeError::KeyAllocationFailed(_) => "key_allocation_failed",
            ProbeError::Encoding(_) => "encoding",
            ProbeError::WriteRejected(_) => "write_rejected",
            ProbeError::ReadFailed { .. } => "read_failed",
            ProbeError::Timeout { .. } => "timeout",
        }
    }
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File error: {0}")]
    FileError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ConfigError::InvalidInput(msg.into())
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::FileError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(format!("YAML error: {}", err))
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(format!("TOML error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(ProbeError::NoPrincipal.to_string(), "No authenticated principal");

        let err = ProbeError::Timeout {
            stage: ProbeStage::Writing,
            key: Some("-Nk".into()),
            after_ms: 250,
        };
        assert_eq!(err.to_string(), "Timed out in writing after 250ms");
    }

    #[test]
    fn test_stage_and_orphaned_key() {
        let err = ProbeError::ReadFailed {
            key: "-Nk".into(),
            source: StoreError::Network("reset".into()),
        };
        assert_eq!(err.stage(), ProbeStage::ReadFailed);
        assert_eq!(err.orphaned_key(), Some("-Nk"));

        let err = ProbeError::WriteRejected(StoreError::Network("reset".into()));
        assert_eq!(err.stage(), ProbeStage::WriteFailed);
        assert_eq!(err.orphaned_key(), None);

        let err = ProbeError::Timeout {
            stage: ProbeStage::Reading,
            key: Some("-Nk".into()),
            after_ms: 10,
        };
        assert_eq!(err.orphaned_key(), Some("-Nk"));
    }

    #[test]
    fn test_write_timeout_keeps_key_but_not_orphaned() {
        let err = ProbeError::Timeout {
            stage: ProbeStage::Writing,
            key: Some("-Nk".into()),
            after_ms: 10,
        };
        assert_eq!(err.key(), Some("-Nk"));
        assert_eq!(err.orphaned_key(), None);

        let err = ProbeError::Timeout {
            stage: ProbeStage::Idle,
            key: None,
            after_ms: 10,
        };
        assert_eq!(err.key(), None);
        assert_eq!(ProbeError::NoPrincipal.key(), None);
    }

    #[test]
    fn test_policy_rejection() {
        let denied = ProbeError::WriteRejected(StoreError::PermissionDenied("no".into()));
        assert!(denied.is_policy_rejection());

        let transport = ProbeError::WriteRejected(StoreError::Network("reset".into()));
        assert!(!transport.is_policy_rejection());
        assert!(!ProbeError::NoPrincipal.is_policy_rejection());
    }

    #[test]
    fn test_config_error_from_io() {
        let err: ConfigError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, ConfigError::FileError(_)));
    }
}
