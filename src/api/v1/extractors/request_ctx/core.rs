use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::services::auth::AuthError;

use super::RequestContext;

/// Extractor giving handlers the `RequestContext`.
/// The access middleware must have inserted it into request extensions;
/// if it is missing the route was not protected, so answer 401.
pub struct Authenticated(pub RequestContext);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .map(Authenticated)
            .ok_or(AppError::Unauthorized(AuthError::TokenMissing))
    }
}
