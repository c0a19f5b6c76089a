use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod auth;

pub use auth::{AuthorizationError, RejectionReason, AUTHENTICATION_FAILED};

/// An outstanding login attempt, keyed by its correlation token
///
/// Created when an authorization request is issued and removed on the first
/// callback that presents its `state`, whatever the outcome of that callback.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PendingAttempt {
    pub correlation_token: String,
    pub nonce: String,
    pub expected_issuer: String,
    pub created_at: DateTime<Utc>,
}

impl PendingAttempt {
    #[must_use]
    pub fn new(
        correlation_token: impl Into<String>,
        nonce: impl Into<String>,
        expected_issuer: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            correlation_token: correlation_token.into(),
            nonce: nonce.into(),
            expected_issuer: expected_issuer.into(),
            created_at,
        }
    }

    /// Age of the attempt relative to `now`
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.created_at)
    }

    /// Whether the attempt is older than `max_age` at `now`
    #[must_use]
    pub fn is_expired(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        self.age(now) > max_age
    }
}

/// Stable user identifier: the token's `sub` qualified by its issuer
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubjectId(String);

impl SubjectId {
    /// Compose `"{sub}@{issuer}"` so identical subjects from different
    /// providers stay distinct
    #[must_use]
    pub fn new(subject: &str, issuer: &str) -> Self {
        Self(format!("{subject}@{issuer}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SubjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
