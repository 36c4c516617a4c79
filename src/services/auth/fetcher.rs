//! Outbound JWKS fetch (the only network call on the authentication path).
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use thiserror::Error;
use url::Url;

/// Key-store failures.
///
/// Cloneable because a single refresh outcome is handed to every caller that
/// waited on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyStoreError {
    #[error("jwks request failed: {0}")]
    Http(String),
    #[error("jwks endpoint returned status {0}")]
    Status(u16),
    #[error("jwks body could not be decoded: {0}")]
    Decode(String),
    #[error("jwks contained no usable signing keys")]
    EmptyKeySet,
}

/// Source of the identity provider's published key set.
#[async_trait]
pub trait JwksFetcher: Send + Sync + 'static {
    // Fetch and decode the current key set.
    async fn fetch(&self) -> Result<JwkSet, KeyStoreError>;
}

/// `reqwest`-backed fetcher with a per-attempt timeout and bounded retries.
#[derive(Debug, Clone)]
pub struct HttpJwksFetcher {
    client: reqwest::Client,
    url: Url,
    retries: u32,
    backoff: Duration,
}

impl HttpJwksFetcher {
    pub fn new(url: Url, timeout: Duration, retries: u32) -> Result<Self, KeyStoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| KeyStoreError::Http(e.to_string()))?;

        Ok(Self {
            client,
            url,
            retries,
            backoff: Duration::from_millis(200),
        })
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn fetch_once(&self) -> Result<JwkSet, (KeyStoreError, bool)> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| (KeyStoreError::Http(e.to_string()), true))?;

        let status = response.status();
        if !status.is_success() {
            // 4xx will not fix itself on retry
            return Err((KeyStoreError::Status(status.as_u16()), status.is_server_error()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| (KeyStoreError::Http(e.to_string()), true))?;

        serde_json::from_slice::<JwkSet>(&body)
            .map_err(|e| (KeyStoreError::Decode(e.to_string()), false))
    }
}

#[async_trait]
impl JwksFetcher for HttpJwksFetcher {
    async fn fetch(&self) -> Result<JwkSet, KeyStoreError> {
        let mut attempt = 0;
        loop {
            match self.fetch_once().await {
                Ok(set) => return Ok(set),
                Err((err, retryable)) => {
                    if !retryable || attempt >= self.retries {
                        return Err(err);
                    }
                    attempt += 1;
                    tracing::warn!(
                        url = %self.url,
                        attempt,
                        error = %err,
                        "jwks fetch failed, retrying"
                    );
                    tokio::time::sleep(self.backoff * attempt).await;
                }
            }
        }
    }
}
