/*
 * Responsibility
 * - URL layout
 * - Protected routes follow `/{version}/{segments...}`; the joined segments are the
 *   scope a caller needs (e.g. `/v1/programming/uuid` → `programming-uuid`)
 */
use axum::{Router, routing::get};

use crate::state::AppState;

use crate::api::v1::handlers::{
    health::health,
    programming::{jwt_debugger, new_uuid},
};

/// Routes served without a token.
pub fn public() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

/// Routes behind authentication and the route-scope check.
pub fn protected() -> Router<AppState> {
    Router::new()
        .route("/v1/programming/uuid", get(new_uuid))
        .route("/v1/programming-jwtdebugger", get(jwt_debugger))
}
