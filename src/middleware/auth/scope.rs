//! Route scope check. Runs after `access::authenticate`.

use axum::{
    body::Body,
    extract::{OriginalUri, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::api::v1::extractors::RequestContext;
use crate::error::AppError;
use crate::services::auth::AuthError;
use crate::state::AppState;

pub async fn authorize(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    // Nested routers see a stripped uri; the scope is derived from the full path.
    let path = req
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let ctx = req
        .extensions()
        .get::<RequestContext>()
        .ok_or(AppError::Unauthorized(AuthError::TokenMissing))?;

    let decision = state.scopes.decide(&path, ctx.scope());
    if let Err(err) = decision.clone().into_result(ctx.scope()) {
        tracing::info!(
            subject = ctx.subject(),
            required = %decision.required,
            "scope check failed"
        );
        return Err(AppError::Forbidden(err));
    }

    tracing::debug!(matched = ?decision.matched, "scope check passed");
    Ok(next.run(req).await)
}
