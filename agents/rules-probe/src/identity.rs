//! Authenticated principal lookup
//!
//! The probe never manages sessions; it asks an [`IdentityProvider`] who is
//! signed in at the moment a run starts.

use std::fmt;

use crate::config::AuthConfig;

/// Authenticated identity the remote policy evaluates writes against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub uid: String,
    pub id_token: Option<String>,
}

impl Principal {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            id_token: None,
        }
    }

    pub fn with_id_token(mut self, token: impl Into<String>) -> Self {
        self.id_token = Some(token.into());
        self
    }
}

pub trait IdentityProvider: Send + Sync + fmt::Debug {
    /// Currently signed-in principal, if any
    fn current_principal(&self) -> Option<Principal>;
}

/// Provider with a fixed answer
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    principal: Option<Principal>,
}

impl StaticIdentity {
    pub fn signed_in(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
        }
    }

    pub fn signed_out() -> Self {
        Self { principal: None }
    }

    /// Principal described by the `auth` config section; signed out when no uid is set
    pub fn from_config(auth: &AuthConfig) -> Self {
        let principal = auth
            .uid
            .as_deref()
            .filter(|uid| !uid.is_empty())
            .map(|uid| Principal {
                uid: uid.to_string(),
                id_token: auth.id_token.clone(),
            });
        Self { principal }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_principal(&self) -> Option<Principal> {
        self.principal.clone()
    }
}
