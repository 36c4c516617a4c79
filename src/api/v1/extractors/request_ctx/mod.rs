/*!
 * Request context extractor
 *
 * Responsibility:
 * - Provide the authenticated request context (RequestContext) to middleware and handlers
 * - Keep axum-specific code in core, the type itself in types
 *
 * Public API:
 * - RequestContext
 * - Authenticated
 */

mod core;
mod types;

pub use core::Authenticated;
pub use types::RequestContext;
