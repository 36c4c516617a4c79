//! Bearer token verification → `RequestContext` in request extensions.
//!
//! - The token is read from the configured header (`Authentication` by default,
//!   not `Authorization`). A `Bearer ` prefix is optional.
//! - Any verification failure ends the request with 401; the precise reason only
//!   goes to the log.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, Request},
    middleware::Next,
    response::Response,
};

use crate::api::v1::extractors::RequestContext;
use crate::error::AppError;
use crate::services::auth::AuthError;
use crate::state::AppState;

pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers(), &state.token_header);
    let verified = match &token {
        Ok(token) => state.auth.authenticate(token.as_deref()).await,
        Err(err) => Err(err.clone()),
    };

    let claims = match verified {
        Ok(claims) => claims,
        Err(err) => {
            tracing::warn!(error = %err, "access token verification failed");
            return Err(AppError::Unauthorized(err));
        }
    };

    let ctx = RequestContext::new(claims, token.ok().flatten().unwrap_or_default());

    // middleware → scope check / extractor
    req.extensions_mut().insert(ctx);

    Ok(next.run(req).await)
}

/// Raw token from `header`, with an optional `Bearer ` prefix removed.
///
/// `Ok(None)` when the header is absent or blank; a value that is not visible
/// ASCII cannot be a compact JWT and is refused as malformed.
pub fn bearer_token(headers: &HeaderMap, header: &HeaderName) -> Result<Option<String>, AuthError> {
    let Some(value) = headers.get(header) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| AuthError::TokenMalformed("header is not visible ascii"))?
        .trim();

    let token = match raw.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        None if raw.eq_ignore_ascii_case("bearer") => "",
        _ => raw,
    };

    Ok((!token.is_empty()).then(|| token.to_string()))
}
