//! Utility API guarded by JWT authentication (JWKS-backed) and route-derived
//! scope authorization, with one structured access record per request.
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
