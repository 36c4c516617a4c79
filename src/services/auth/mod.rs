pub mod fetcher;
pub mod key_store;
pub mod scope;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use fetcher::{HttpJwksFetcher, JwksFetcher, KeyStoreError};
pub use key_store::{KeySet, KeyStore, LookupError, PublicKey};
pub use scope::{AuthorizationDecision, ScopeError, ScopeMatch, ScopePolicy, required_scope};
pub use token::{AuthError, Authenticator, Claims};
