//! Ed25519 keys, token minting and a scripted fetcher for unit tests.
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::SigningKey;
use ed25519_dalek::pkcs8::EncodePrivateKey;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

use super::fetcher::{JwksFetcher, KeyStoreError};

pub const ISSUER: &str = "https://idp.example.com/";

pub struct TestKey {
    pub kid: String,
    signing: SigningKey,
}

impl TestKey {
    pub fn new(kid: &str, seed: u8) -> Self {
        Self {
            kid: kid.to_string(),
            signing: SigningKey::from_bytes(&[seed; 32]),
        }
    }

    pub fn jwk(&self) -> Value {
        json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "kid": self.kid,
            "alg": "EdDSA",
            "use": "sig",
            "x": URL_SAFE_NO_PAD.encode(self.signing.verifying_key().to_bytes()),
        })
    }

    pub fn sign(&self, claims: &Value) -> String {
        self.sign_with_kid(Some(&self.kid), claims)
    }

    pub fn sign_with_kid(&self, kid: Option<&str>, claims: &Value) -> String {
        let der = self.signing.to_pkcs8_der().expect("pkcs8 der");
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = kid.map(str::to_string);
        jsonwebtoken::encode(&header, claims, &EncodingKey::from_ed_der(der.as_bytes()))
            .expect("token")
    }
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn claims(scope: &str) -> Value {
    json!({
        "iss": ISSUER,
        "sub": "client-1@clients",
        "exp": now() + 300,
        "scope": scope,
    })
}

pub fn jwks(keys: &[&TestKey]) -> JwkSet {
    let keys: Vec<Value> = keys.iter().map(|k| k.jwk()).collect();
    serde_json::from_value(json!({ "keys": keys })).expect("jwks")
}

/// Fetcher returning a replaceable key set and counting calls.
pub struct ScriptedFetcher {
    response: Mutex<Result<JwkSet, KeyStoreError>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedFetcher {
    pub fn new(response: Result<JwkSet, KeyStoreError>) -> Self {
        Self {
            response: Mutex::new(response),
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set(&self, response: Result<JwkSet, KeyStoreError>) {
        *self.response.lock().expect("lock") = response;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JwksFetcher for ScriptedFetcher {
    async fn fetch(&self) -> Result<JwkSet, KeyStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.response.lock().expect("lock").clone()
    }
}
