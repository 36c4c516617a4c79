pub mod access;
pub mod scope;

pub use access::{authenticate, bearer_token};
pub use scope::authorize;
