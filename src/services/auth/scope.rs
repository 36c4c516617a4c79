//! Route → scope convention and the grant check.
//!
//! `/v1/programming/uuid` requires `programming-uuid`: drop the leading `/`
//! and the version segment, join the rest with `-`.
use std::collections::HashSet;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScopeError {
    #[error("no scopes granted (required {required:?})")]
    ScopeMissing { required: String },
    #[error("granted scopes do not cover {required:?}")]
    ScopeMismatch { required: String },
}

/// How a granted scope URI is compared with the required token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeMatch {
    /// Granted set must contain `{resource_server}/{required}`.
    Exact { resource_server: String },
    /// Any granted scope ending with the required token is accepted.
    ///
    /// Kept for deployments without a configured resource server. Note that
    /// `.../admin-programming-uuid` also satisfies `programming-uuid` here.
    Suffix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    pub allowed: bool,
    pub required: String,
    pub matched: Option<String>,
}

impl AuthorizationDecision {
    pub fn into_result(self, granted: &str) -> Result<Self, ScopeError> {
        if self.allowed {
            return Ok(self);
        }
        if granted.trim().is_empty() {
            Err(ScopeError::ScopeMissing {
                required: self.required,
            })
        } else {
            Err(ScopeError::ScopeMismatch {
                required: self.required,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopePolicy {
    matching: ScopeMatch,
}

impl ScopePolicy {
    pub fn new(resource_server: Option<String>) -> Self {
        let matching = match resource_server {
            Some(rs) => ScopeMatch::Exact {
                resource_server: rs.trim_end_matches('/').to_string(),
            },
            None => ScopeMatch::Suffix,
        };
        Self { matching }
    }

    pub fn matching(&self) -> &ScopeMatch {
        &self.matching
    }

    /// Decide whether `granted` (space-separated scope URIs) covers `path`.
    ///
    /// Pure: no state is read or written.
    pub fn decide(&self, path: &str, granted: &str) -> AuthorizationDecision {
        let required = required_scope(path);

        let matched = if required.is_empty() {
            None
        } else {
            match &self.matching {
                ScopeMatch::Exact { resource_server } => {
                    let expected = format!("{resource_server}/{required}");
                    let granted: HashSet<&str> = granted.split_whitespace().collect();
                    granted.contains(expected.as_str()).then_some(expected)
                }
                ScopeMatch::Suffix => granted
                    .split_whitespace()
                    .find(|scope| scope.ends_with(required.as_str()))
                    .map(str::to_string),
            }
        };

        AuthorizationDecision {
            allowed: matched.is_some(),
            required,
            matched,
        }
    }
}

/// Required scope token for a request path.
pub fn required_scope(path: &str) -> String {
    path.trim_start_matches('/')
        .split('/')
        .skip(1)
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
