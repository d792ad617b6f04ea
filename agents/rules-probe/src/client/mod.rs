//! Remote store clients
//!
//! The probe only needs four capabilities from the hosted database:
//! allocate a key, write, read and delete a single child of a collection.
//! Data operations carry the credential of the principal performing them.

mod firebase;
mod memory;
mod push_id;

pub use firebase::FirebaseRestStore;
pub use memory::MemoryStore;
pub use push_id::{PushKeyGenerator, PUSH_CHARS, PUSH_KEY_LEN};

use std::fmt;

/// Keyed document store the probe writes into
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync + fmt::Debug {
    /// Store identifier used in logs
    fn name(&self) -> &str;

    /// Allocate a fresh unique key under `collection`
    async fn allocate_key(&self, collection: &str) -> Result<String, StoreError>;

    /// Write `value` at `collection/key`, replacing anything already there
    async fn set(
        &self,
        collection: &str,
        key: &str,
        value: serde_json::Value,
        auth: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Read `collection/key`; `None` when nothing is stored there
    async fn get(
        &self,
        collection: &str,
        key: &str,
        auth: Option<&str>,
    ) -> Result<Option<serde_json::Value>, StoreError>;

    /// Delete `collection/key`
    async fn remove(
        &self,
        collection: &str,
        key: &str,
        auth: Option<&str>,
    ) -> Result<(), StoreError>;
}

/// Store errors
///
/// Carries whatever diagnostic the remote side returned; the probe does
/// not interpret it beyond logging.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether the remote access policy refused the operation
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StoreError::PermissionDenied(_))
    }
}
