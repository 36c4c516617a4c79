/*
 * Responsibility
 * - GET /v1/programming/uuid          (scope: programming-uuid)
 * - GET /v1/programming-jwtdebugger   (scope: programming-jwtdebugger)
 *   decodes (does not verify) a token's header and payload for display
 */
use axum::{Json, extract::Query};
use uuid::Uuid;

use crate::api::v1::dto::programming::{JwtDebuggerQuery, JwtDebuggerResponse, UuidResponse};
use crate::api::v1::extractors::Authenticated;
use crate::error::AppError;
use crate::services::auth::token;

pub async fn new_uuid(Authenticated(ctx): Authenticated) -> Json<UuidResponse> {
    tracing::debug!(subject = ctx.subject(), "uuid requested");
    Json(UuidResponse {
        uuid: Uuid::new_v4(),
    })
}

pub async fn jwt_debugger(
    Authenticated(ctx): Authenticated,
    Query(query): Query<JwtDebuggerQuery>,
) -> Result<Json<JwtDebuggerResponse>, AppError> {
    let raw = query.token.as_deref().unwrap_or(ctx.token());

    let (header, payload) = token::inspect(raw)
        .map_err(|e| AppError::bad_request(format!("cannot decode token: {e}")))?;

    Ok(Json(JwtDebuggerResponse { header, payload }))
}
