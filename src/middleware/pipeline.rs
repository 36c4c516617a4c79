//! Request pipeline composition.
//!
//! Stages, outermost first. Each one receives the rest of the chain as `Next`
//! and may answer without calling it:
//!
//! 1. request id (set, then echoed on the response)
//! 2. access log
//! 3. panic → 500
//! 4. body limit
//! 5. authenticate  (protected routes only)
//! 6. authorize     (protected routes only)
//! 7. handler

use axum::{Router, middleware};
use tower::ServiceBuilder;

use super::access_log::{SharedSink, access_log};
use super::auth::{authenticate, authorize};
use super::http;
use crate::state::AppState;

/// Build the service router from `public` routes (no token needed) and
/// `protected` routes (token + route scope required).
pub fn compose(
    public: Router<AppState>,
    protected: Router<AppState>,
    state: AppState,
    sink: SharedSink,
) -> Router {
    // route_layer: unknown paths fall through to 404 instead of 401
    let protected = protected.route_layer(
        ServiceBuilder::new()
            .layer(middleware::from_fn_with_state(state.clone(), authenticate))
            .layer(middleware::from_fn_with_state(state.clone(), authorize)),
    );

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(
            ServiceBuilder::new()
                .layer(http::set_request_id())
                .layer(http::propagate_request_id())
                .layer(middleware::from_fn_with_state(sink, access_log))
                .layer(http::catch_panic())
                .layer(http::body_limit()),
        )
        .with_state(state)
}
