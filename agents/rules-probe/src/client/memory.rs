//! In-process store
//!
//! Backs `--memory` dry runs and tests. Can emulate the owner rule of the
//! hosted database: a write is accepted only when its `createdBy` field
//! equals the uid the store was opened for. Credentials are not checked.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::RwLock;

use super::{PushKeyGenerator, RemoteStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, HashMap<String, Value>>>,
    keys: PushKeyGenerator,
    owner_rule: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject writes whose `createdBy` differs from `uid`
    pub fn with_owner_rule(mut self, uid: impl Into<String>) -> Self {
        self.owner_rule = Some(uid.into());
        self
    }

    /// Number of children stored under `collection`
    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }

    fn check_owner(&self, value: &Value) -> Result<(), StoreError> {
        match &self.owner_rule {
            Some(uid) if value.get("createdBy").and_then(Value::as_str) != Some(uid.as_str()) => {
                Err(StoreError::PermissionDenied("Permission denied".to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl RemoteStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn allocate_key(&self, _collection: &str) -> Result<String, StoreError> {
        Ok(self.keys.next_key())
    }

    async fn set(
        &self,
        collection: &str,
        key: &str,
        value: Value,
        _auth: Option<&str>,
    ) -> Result<(), StoreError> {
        self.check_owner(&value)?;

        let mut collections = self.collections.write().await;
        // writing null deletes, as on the hosted database
        if value.is_null() {
            if let Some(children) = collections.get_mut(collection) {
                children.remove(key);
            }
        } else {
            collections
                .entry(collection.to_string())
                .or_default()
                .insert(key.to_string(), value);
        }
        Ok(())
    }

    async fn get(
        &self,
        collection: &str,
        key: &str,
        _auth: Option<&str>,
    ) -> Result<Option<Value>, StoreError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .and_then(|children| children.get(key))
            .cloned())
    }

    async fn remove(
        &self,
        collection: &str,
        key: &str,
        _auth: Option<&str>,
    ) -> Result<(), StoreError> {
        if let Some(children) = self.collections.write().await.get_mut(collection) {
            children.remove(key);
        }
        Ok(())
    }
}
