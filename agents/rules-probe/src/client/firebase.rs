//! Realtime Database REST client
//!
//! Children are addressed as `{base_url}/{collection}/{key}.json`; the
//! caller's ID token travels in the `auth` query parameter of each request.
//! Rule rejections come back as 401 with `{"error": "Permission denied"}`.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::{PushKeyGenerator, RemoteStore, StoreError};

#[derive(Debug)]
pub struct FirebaseRestStore {
    base_url: String,
    client: Client,
    keys: PushKeyGenerator,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl FirebaseRestStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
            keys: PushKeyGenerator::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn child_url(&self, collection: &str, key: &str) -> String {
        format!("{}/{}/{}.json", self.base_url, collection, key)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        auth: Option<&str>,
    ) -> Result<Response, StoreError> {
        let request = match auth {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or(body);

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::PermissionDenied(message),
            _ => StoreError::Server {
                status: status.as_u16(),
                message,
            },
        })
    }
}

#[async_trait::async_trait]
impl RemoteStore for FirebaseRestStore {
    fn name(&self) -> &str {
        "firebase-rest"
    }

    async fn allocate_key(&self, _collection: &str) -> Result<String, StoreError> {
        Ok(self.keys.next_key())
    }

    async fn set(
        &self,
        collection: &str,
        key: &str,
        value: Value,
        auth: Option<&str>,
    ) -> Result<(), StoreError> {
        let url = self.child_url(collection, key);
        self.send(self.client.put(&url).json(&value), auth).await?;
        Ok(())
    }

    async fn get(
        &self,
        collection: &str,
        key: &str,
        auth: Option<&str>,
    ) -> Result<Option<Value>, StoreError> {
        let url = self.child_url(collection, key);
        let response = self.send(self.client.get(&url), auth).await?;

        let value: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.to_string()))?;

        Ok(if value.is_null() { None } else { Some(value) })
    }

    async fn remove(
        &self,
        collection: &str,
        key: &str,
        auth: Option<&str>,
    ) -> Result<(), StoreError> {
        let url = self.child_url(collection, key);
        self.send(self.client.delete(&url), auth).await?;
        Ok(())
    }
}
