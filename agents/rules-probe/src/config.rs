//! Probe configuration
//!
//! Loaded from a YAML or TOML file (picked by extension), then overridden
//! from `RULES_PROBE_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::contracts::{DEFAULT_ACTION, DEFAULT_COLLECTION};
use crate::error::ConfigError;

pub const ENV_DATABASE_URL: &str = "RULES_PROBE_DATABASE_URL";
pub const ENV_AUTH_UID: &str = "RULES_PROBE_AUTH_UID";
pub const ENV_ID_TOKEN: &str = "RULES_PROBE_ID_TOKEN";
pub const ENV_ACTION: &str = "RULES_PROBE_ACTION";
pub const ENV_TIMEOUT_MS: &str = "RULES_PROBE_TIMEOUT_MS";

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_action() -> String {
    DEFAULT_ACTION.to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Realtime Database root, e.g. `https://<project>.firebasedatabase.app`
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Signal identifier that starts a run
    #[serde(default = "default_action")]
    pub action: String,

    /// Upper bound for each remote call
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub uid: Option<String>,

    #[serde(default)]
    pub id_token: Option<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            collection: default_collection(),
            action: default_action(),
            request_timeout_ms: default_timeout_ms(),
            auth: AuthConfig::default(),
        }
    }
}

impl ProbeConfig {
    /// Load from `path` (or defaults), apply process environment, validate
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(toml::from_str(&content)?),
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            other => Err(ConfigError::invalid_input(format!(
                "Unsupported config extension: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    /// Apply overrides from a variable lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.database_url = Some(url);
        }
        if let Some(uid) = lookup(ENV_AUTH_UID) {
            self.auth.uid = Some(uid);
        }
        if let Some(token) = lookup(ENV_ID_TOKEN) {
            self.auth.id_token = Some(token);
        }
        if let Some(action) = lookup(ENV_ACTION) {
            self.action = action;
        }
        if let Some(timeout) = lookup(ENV_TIMEOUT_MS) {
            self.request_timeout_ms = timeout.parse().map_err(|_| {
                ConfigError::invalid_input(format!("{} must be an integer: {}", ENV_TIMEOUT_MS, timeout))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.action.is_empty() {
            return Err(ConfigError::invalid_input("action must not be empty"));
        }
        if self.collection.is_empty() {
            return Err(ConfigError::invalid_input("collection must not be empty"));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_input("request_timeout_ms must be positive"));
        }
        if let Some(url) = &self.database_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::invalid_input(format!(
                    "database_url must be http(s): {}",
                    url
                )));
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
