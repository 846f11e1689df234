//! HTTP gateway to the blob store.
//!
//! Objects live at `{endpoint}/{bucket}/{key}`. Writes carry an optional
//! bearer token. `put` is the only operation with built-in retries: clock
//! skew and transient failures back off exponentially (capped at 32 s) and
//! the underlying HTTP client is rebuilt after a skew rejection so the next
//! attempt signs with fresh connection state.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::error::StorageError;

/// Ceiling on the exponential backoff between put attempts.
const BACKOFF_CAP_SECS: u64 = 32;

/// Marker the store embeds in 403 bodies when the request time is out of
/// tolerance.
const SKEW_MARKER: &str = "RequestTimeTooSkewed";

#[derive(Debug, Deserialize)]
struct ListResponse {
    objects: Vec<String>,
}

pub struct BlobClient {
    client: Client,
    base_url: String,
    bucket: String,
    token: Option<String>,
    timeout_secs: u64,
    max_put_attempts: u32,
}

impl BlobClient {
    /// Creates a client for the store at `endpoint`. Point `endpoint` at a
    /// mock server in tests.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        endpoint: &str,
        bucket: &str,
        token: Option<&str>,
        timeout_secs: u64,
        max_put_attempts: u32,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            client: Self::build_http(timeout_secs)?,
            base_url: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            token: token.map(str::to_string),
            timeout_secs,
            max_put_attempts: max_put_attempts.max(1),
        })
    }

    fn build_http(timeout_secs: u64) -> Result<Client, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(client)
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.bucket, key)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Stores `bytes` at `key`, overwriting any existing object.
    ///
    /// Retries transient failures with exponential backoff. A skew rejection
    /// additionally rebuilds the HTTP client before the next attempt.
    ///
    /// # Errors
    ///
    /// Returns the last error once attempts are exhausted, or immediately
    /// for non-transient failures such as [`StorageError::Unauthorized`].
    pub async fn put(
        &mut self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut attempt = 0u32;
        loop {
            match self.try_put(key, bytes, content_type).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    attempt += 1;
                    if !err.is_transient() || attempt >= self.max_put_attempts {
                        return Err(err);
                    }
                    if matches!(err, StorageError::SkewedClock) {
                        self.client = Self::build_http(self.timeout_secs)?;
                    }
                    let delay_secs = BACKOFF_CAP_SECS.min(1u64 << (attempt - 1).min(62));
                    tracing::warn!(
                        key,
                        attempt,
                        max_attempts = self.max_put_attempts,
                        delay_secs,
                        error = %err,
                        "transient blob store error, retrying after backoff"
                    );
                    tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                }
            }
        }
    }

    async fn try_put(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        let response = self
            .authorize(self.client.put(self.object_url(key)))
            .header("content-type", content_type)
            .body(bytes.to_vec())
            .send()
            .await?;
        Self::check_write_status(key, response).await
    }

    /// Whether an object exists at `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Http`] on network failure, or the mapped
    /// store error for unexpected statuses.
    pub async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let response = self
            .authorize(self.client.head(self.object_url(key)))
            .send()
            .await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StorageError::Unauthorized),
            s => Err(StorageError::UnexpectedStatus {
                key: key.to_string(),
                status: s.as_u16(),
            }),
        }
    }

    /// Deletes the object at `key`. Returns `true` if the store reported a
    /// deletion, `false` if the object was already absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Http`] on network failure, or the mapped
    /// store error for unexpected statuses.
    pub async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let response = self
            .authorize(self.client.delete(self.object_url(key)))
            .send()
            .await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StorageError::Unauthorized),
            s => Err(StorageError::UnexpectedStatus {
                key: key.to_string(),
                status: s.as_u16(),
            }),
        }
    }

    /// Lists up to `limit` object keys under `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Http`] on network failure or a non-2xx
    /// status, or [`StorageError::MalformedList`] if the body does not parse.
    pub async fn list_objects(
        &self,
        prefix: &str,
        limit: u32,
    ) -> Result<Vec<String>, StorageError> {
        let url = format!("{}/{}", self.base_url, self.bucket);
        let response = self
            .authorize(self.client.get(url))
            .query(&[("prefix", prefix), ("limit", &limit.to_string())])
            .send()
            .await?;
        let response = response.error_for_status()?;
        let body = response.text().await?;
        let parsed: ListResponse = serde_json::from_str(&body)?;
        Ok(parsed.objects)
    }

    /// Deletes every object under `prefix` and returns how many were
    /// removed. Used by operator cleanup when a block is purged.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered while listing or deleting.
    pub async fn delete_prefix(&self, prefix: &str) -> Result<u64, StorageError> {
        let mut deleted = 0u64;
        loop {
            let keys = self.list_objects(prefix, 1000).await?;
            if keys.is_empty() {
                return Ok(deleted);
            }
            for key in &keys {
                if self.delete(key).await? {
                    deleted += 1;
                }
            }
            // A short page means the listing is exhausted.
            if keys.len() < 1000 {
                return Ok(deleted);
            }
        }
    }

    async fn check_write_status(key: &str, response: reqwest::Response) -> Result<(), StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        match status {
            StatusCode::FORBIDDEN => {
                // Skew rejections are 403s with the marker in the body; a
                // bare 403 is bad credentials.
                let body = response.text().await.unwrap_or_default();
                if body.contains(SKEW_MARKER) {
                    Err(StorageError::SkewedClock)
                } else {
                    Err(StorageError::Unauthorized)
                }
            }
            StatusCode::UNAUTHORIZED => Err(StorageError::Unauthorized),
            s => Err(StorageError::UnexpectedStatus {
                key: key.to_string(),
                status: s.as_u16(),
            }),
        }
    }
}
