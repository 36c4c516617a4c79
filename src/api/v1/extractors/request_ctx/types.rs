/*
 * Responsibility
 * - The per-request "authenticated context" handed from middleware to handlers
 * - The access middleware verifies the token and stores this in request extensions;
 *   the scope middleware and handlers only ever read it
 */
use crate::services::auth::Claims;

/// Verified identity of the caller for one request.
///
/// - `claims` are the verified token claims (scope kept verbatim)
/// - `token` is the raw bearer token, kept for echo-style endpoints
#[derive(Debug, Clone)]
pub struct RequestContext {
    claims: Claims,
    token: String,
}

impl RequestContext {
    pub fn new(claims: Claims, token: impl Into<String>) -> Self {
        Self {
            claims,
            token: token.into(),
        }
    }

    pub fn subject(&self) -> &str {
        &self.claims.sub
    }

    /// Space-separated granted scopes, empty when none were granted.
    pub fn scope(&self) -> &str {
        &self.claims.scope
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}
