use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::key_store::{KeyStore, LookupError};

/// Reasons a bearer token is refused.
///
/// Every variant is answered with the same 401; the variant itself only shows
/// up in the structured log.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("token missing")]
    TokenMissing,
    #[error("token malformed: {0}")]
    TokenMalformed(&'static str),
    #[error("unsupported algorithm {0:?}")]
    UnsupportedAlgorithm(Algorithm),
    #[error("signing key not found: {0}")]
    KeyNotFound(String),
    #[error("signature invalid")]
    SignatureInvalid,
    #[error("token expired")]
    TokenExpired,
    #[error("issuer mismatch")]
    IssuerMismatch,
    #[error("audience mismatch")]
    AudienceMismatch,
}

/// Verified access-token claims.
///
/// `scope` is the raw space-separated grant list, empty when the token carries none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub sub: String,
    pub exp: u64,
    #[serde(default)]
    pub scope: String,
}

/// Only the part of the payload needed before signature verification.
#[derive(Debug, Deserialize)]
struct UnverifiedExpiry {
    exp: Option<u64>,
}

#[derive(Clone)]
pub struct Authenticator {
    keys: Arc<KeyStore>,
    issuer: String,
    audience: Option<String>,
    leeway_seconds: u64,
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

impl Authenticator {
    pub fn new(
        keys: Arc<KeyStore>,
        issuer: impl Into<String>,
        audience: Option<String>,
        leeway_seconds: u64,
    ) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
            audience,
            leeway_seconds,
        }
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.keys
    }

    /// Verify a compact JWT and return its claims.
    ///
    /// Checks run cheapest first: shape, algorithm and expiry are decided
    /// from the token alone so that junk or stale tokens never cause a JWKS
    /// refresh. Claims are only returned after the signature verifies.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Claims, AuthError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::TokenMissing)?;

        let header = parse_header(token)?;
        if !is_asymmetric(header.alg) {
            return Err(AuthError::UnsupportedAlgorithm(header.alg));
        }

        let exp = unverified_expiry(token)?;
        if exp.saturating_add(self.leeway_seconds) < now_seconds() {
            return Err(AuthError::TokenExpired);
        }

        let kid = header
            .kid
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AuthError::KeyNotFound("<none>".to_string()))?;

        let key = self.keys.resolve(kid).await.map_err(|err| {
            if let LookupError::Refresh(cause) = &err {
                tracing::warn!(kid, error = %cause, "jwks refresh failed during lookup");
            }
            AuthError::KeyNotFound(kid.to_string())
        })?;

        if key.algorithm.is_some_and(|alg| alg != header.alg) {
            return Err(AuthError::UnsupportedAlgorithm(header.alg));
        }

        let validation = self.validation(header.alg);
        let data = jsonwebtoken::decode::<Claims>(token, &key.decoding_key, &validation)
            .map_err(|e| classify(e.kind()))?;

        Ok(data.claims)
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        validation.leeway = self.leeway_seconds;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.required_spec_claims =
            HashSet::from(["exp".to_string(), "iss".to_string()]);

        match &self.audience {
            Some(aud) => {
                validation.set_audience(&[aud.as_str()]);
                validation.required_spec_claims.insert("aud".to_string());
            }
            None => validation.validate_aud = false,
        }

        validation
    }
}

fn classify(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        ErrorKind::InvalidIssuer => AuthError::IssuerMismatch,
        ErrorKind::InvalidAudience => AuthError::AudienceMismatch,
        ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => AuthError::IssuerMismatch,
        ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => AuthError::AudienceMismatch,
        ErrorKind::MissingRequiredClaim(_) => AuthError::TokenMalformed("missing claim"),
        ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
            AuthError::TokenMalformed("undecodable payload")
        }
        _ => AuthError::SignatureInvalid,
    }
}

fn parse_header(token: &str) -> Result<Header, AuthError> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(AuthError::TokenMalformed("expected three segments"));
    }

    jsonwebtoken::decode_header(token).map_err(|_| AuthError::TokenMalformed("invalid header"))
}

fn unverified_expiry(token: &str) -> Result<u64, AuthError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or(AuthError::TokenMalformed("expected three segments"))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| AuthError::TokenMalformed("invalid payload encoding"))?;

    let parsed: UnverifiedExpiry = serde_json::from_slice(&bytes)
        .map_err(|_| AuthError::TokenMalformed("invalid payload"))?;

    parsed.exp.ok_or(AuthError::TokenMalformed("missing exp"))
}

fn is_asymmetric(alg: Algorithm) -> bool {
    !matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

fn now_seconds() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Decode header and payload of a token without verifying it.
///
/// Used for display only; never for access decisions.
pub fn inspect(token: &str) -> Result<(serde_json::Value, serde_json::Value), AuthError> {
    parse_header(token)?;

    let mut parts = token.split('.');
    let mut decode = |what: &'static str| -> Result<serde_json::Value, AuthError> {
        let segment = parts.next().ok_or(AuthError::TokenMalformed(what))?;
        let bytes = URL_SAFE_NO_PAD
            .decode(segment.trim_end_matches('='))
            .map_err(|_| AuthError::TokenMalformed(what))?;
        serde_json::from_slice(&bytes).map_err(|_| AuthError::TokenMalformed(what))
    };

    let header = decode("invalid header")?;
    let payload = decode("invalid payload")?;
    Ok((header, payload))
}
