/*
 * Responsibility
 * - Public surface of v1 (route builders, extractors)
 */
pub mod dto;
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::{protected, public};
