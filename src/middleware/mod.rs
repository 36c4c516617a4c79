/*
 * Responsibility
 * - Public interface of the middleware stages
 * - pipeline::compose wires them in order
 */
pub mod access_log;
pub mod auth;
pub mod http;
pub mod pipeline;
