//! Cached identity-provider signing keys.
//!
//! Readers always see one complete snapshot (`Arc<KeySet>`); a refresh builds
//! a new set off to the side and swaps the pointer.
//!
//! Refreshes are single-flight: callers that arrive while a fetch is running
//! wait on the gate and receive that fetch's outcome instead of starting their
//! own.
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use jsonwebtoken::jwk::{Jwk, JwkSet, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use super::fetcher::{JwksFetcher, KeyStoreError};

/// One usable verification key from the published set.
#[derive(Clone)]
pub struct PublicKey {
    pub kid: String,
    // `None` when the provider did not pin an algorithm on the key.
    pub algorithm: Option<Algorithm>,
    pub decoding_key: DecodingKey,
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublicKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// Immutable `kid -> key` snapshot.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, Arc<PublicKey>>,
}

impl KeySet {
    /// Convert a fetched JWKS, dropping entries that cannot verify signatures.
    pub fn from_jwks(jwks: &JwkSet) -> Result<Self, KeyStoreError> {
        let mut keys = HashMap::new();

        for jwk in &jwks.keys {
            match public_key_from_jwk(jwk) {
                Ok(key) => {
                    keys.insert(key.kid.clone(), Arc::new(key));
                }
                Err(reason) => {
                    tracing::warn!(kid = ?jwk.common.key_id, reason, "skipping jwk");
                }
            }
        }

        if keys.is_empty() {
            return Err(KeyStoreError::EmptyKeySet);
        }

        Ok(Self { keys })
    }

    pub fn get(&self, kid: &str) -> Option<Arc<PublicKey>> {
        self.keys.get(kid).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

fn public_key_from_jwk(jwk: &Jwk) -> Result<PublicKey, &'static str> {
    let kid = jwk
        .common
        .key_id
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or("missing kid")?;

    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        return Err("encryption key");
    }

    let algorithm = match &jwk.common.key_algorithm {
        Some(alg) => Some(signature_algorithm(alg).ok_or("not a signature algorithm")?),
        None => None,
    };

    let decoding_key = DecodingKey::from_jwk(jwk).map_err(|_| "unusable key material")?;

    Ok(PublicKey {
        kid,
        algorithm,
        decoding_key,
    })
}

// JWK `alg` uses the JOSE names; encryption algorithms (RSA-OAEP, ...) don't map.
fn signature_algorithm<T: serde::Serialize>(alg: &T) -> Option<Algorithm> {
    serde_json::to_value(alg)
        .ok()?
        .as_str()?
        .parse::<Algorithm>()
        .ok()
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("kid {0} is not published")]
    NotFound(String),
    #[error(transparent)]
    Refresh(#[from] KeyStoreError),
}

struct RefreshOutcome {
    attempt: u64,
    result: Result<Arc<KeySet>, KeyStoreError>,
}

/// State shared with detached refresh tasks.
struct Shared {
    fetcher: Arc<dyn JwksFetcher>,
    current: RwLock<Arc<KeySet>>,
    // Number of completed refresh attempts (success or failure).
    attempts: AtomicU64,
    gate: Mutex<Option<RefreshOutcome>>,
}

pub struct KeyStore {
    shared: Arc<Shared>,
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("attempts", &self.shared.attempts.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl KeyStore {
    /// Create an empty store. Call [`KeyStore::refresh`] once before serving traffic.
    pub fn new(fetcher: Arc<dyn JwksFetcher>) -> Self {
        Self {
            shared: Arc::new(Shared {
                fetcher,
                current: RwLock::new(Arc::new(KeySet::default())),
                attempts: AtomicU64::new(0),
                gate: Mutex::new(None),
            }),
        }
    }

    /// Cached lookup; never touches the network.
    pub async fn get(&self, kid: &str) -> Option<Arc<PublicKey>> {
        self.shared.current.read().await.get(kid)
    }

    pub async fn snapshot(&self) -> Arc<KeySet> {
        self.shared.current.read().await.clone()
    }

    /// Fetch the published set and swap it in.
    pub async fn refresh(&self) -> Result<Arc<KeySet>, KeyStoreError> {
        let observed = self.shared.attempts.load(Ordering::Acquire);
        self.refresh_after(observed).await
    }

    /// Lookup that tolerates key rotation: a miss triggers one refresh and one retry.
    pub async fn resolve(&self, kid: &str) -> Result<Arc<PublicKey>, LookupError> {
        // Read the counter before the lookup so a refresh finishing in between is reused.
        let observed = self.shared.attempts.load(Ordering::Acquire);
        if let Some(key) = self.get(kid).await {
            return Ok(key);
        }

        tracing::debug!(kid, "kid not cached, refreshing jwks");
        let set = self.refresh_after(observed).await?;
        set.get(kid)
            .ok_or_else(|| LookupError::NotFound(kid.to_string()))
    }

    /// The refresh runs on its own task: a caller that goes away (client
    /// disconnect) does not cancel the fetch the other waiters are queued on.
    async fn refresh_after(&self, observed: u64) -> Result<Arc<KeySet>, KeyStoreError> {
        let shared = self.shared.clone();
        tokio::spawn(async move { shared.refresh_after(observed).await })
            .await
            .unwrap_or_else(|err| Err(KeyStoreError::Http(format!("refresh task failed: {err}"))))
    }
}

impl Shared {
    async fn refresh_after(&self, observed: u64) -> Result<Arc<KeySet>, KeyStoreError> {
        let mut gate = self.gate.lock().await;

        if let Some(outcome) = gate.as_ref().filter(|o| o.attempt > observed) {
            return outcome.result.clone();
        }

        let result = match self.fetcher.fetch().await {
            Ok(jwks) => KeySet::from_jwks(&jwks).map(Arc::new),
            Err(err) => Err(err),
        };

        match &result {
            Ok(set) => {
                *self.current.write().await = set.clone();
                tracing::info!(keys = set.len(), "jwks refreshed");
            }
            Err(err) => {
                // Keep serving the previous snapshot.
                tracing::warn!(error = %err, "jwks refresh failed");
            }
        }

        let attempt = self.attempts.fetch_add(1, Ordering::AcqRel) + 1;
        *gate = Some(RefreshOutcome {
            attempt,
            result: result.clone(),
        });

        result
    }
}
