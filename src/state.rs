/*
 * Responsibility
 * - Shared context bound to the Router (AppState)
 *   - authenticator (holds the JWKS key store), scope policy, token header name
 * - Cheap to Clone (Arc inside)
 */
use std::sync::Arc;

use axum::http::HeaderName;

use crate::config::DEFAULT_TOKEN_HEADER;
use crate::services::auth::{Authenticator, ScopePolicy};

#[derive(Clone, Debug)]
pub struct AppState {
    pub auth: Arc<Authenticator>,
    pub scopes: Arc<ScopePolicy>,
    pub token_header: HeaderName,
}

impl AppState {
    pub fn new(auth: Arc<Authenticator>, scopes: ScopePolicy) -> Self {
        Self {
            auth,
            scopes: Arc::new(scopes),
            token_header: HeaderName::from_static(DEFAULT_TOKEN_HEADER),
        }
    }

    pub fn with_token_header(mut self, token_header: HeaderName) -> Self {
        self.token_header = token_header;
        self
    }
}
