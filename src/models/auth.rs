//! Handshake error types
//!
//! Every callback rejection is terminal for its attempt. Callers show the user
//! the generic [`RejectionReason::public_message`] and log the `Display` form.

use std::fmt;

/// Generic message shown to end users for any rejection
pub const AUTHENTICATION_FAILED: &str = "authentication failed";

/// Why a callback was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    /// `id_token`, `token_type` or `state` missing or blank
    MissingParameter,
    /// `state` was never issued or was already consumed
    UnknownOrReplayedState,
    /// The attempt was found but is older than the configured window
    AttemptExpired,
    /// No registry entry for the issuer recorded with the attempt
    UnknownIssuer,
    /// Signature, audience, time window or token format check failed
    TokenVerificationFailed,
    /// Token `nonce` differs from the nonce issued with the attempt
    NonceMismatch,
    /// Token `iss` differs from the issuer the request was sent to
    IssuerMismatch,
}

impl RejectionReason {
    /// Message safe to surface to end users
    #[must_use]
    pub const fn public_message(self) -> &'static str {
        AUTHENTICATION_FAILED
    }

    /// Short machine-readable code for operator logs and metrics labels
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingParameter => "missing_parameter",
            Self::UnknownOrReplayedState => "unknown_or_replayed_state",
            Self::AttemptExpired => "attempt_expired",
            Self::UnknownIssuer => "unknown_issuer",
            Self::TokenVerificationFailed => "token_verification_failed",
            Self::NonceMismatch => "nonce_mismatch",
            Self::IssuerMismatch => "issuer_mismatch",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameter => write!(f, "Required callback parameter missing"),
            Self::UnknownOrReplayedState => write!(f, "Unknown or already consumed state"),
            Self::AttemptExpired => write!(f, "Login attempt expired"),
            Self::UnknownIssuer => write!(f, "No provider registered for issuer"),
            Self::TokenVerificationFailed => write!(f, "ID token verification failed"),
            Self::NonceMismatch => write!(f, "ID token nonce does not match the issued nonce"),
            Self::IssuerMismatch => write!(f, "ID token issuer does not match the expected issuer"),
        }
    }
}

impl std::error::Error for RejectionReason {}

/// Errors raised while building an authorization request
#[derive(Debug)]
pub enum AuthorizationError {
    /// The provider issuer does not form a valid authorization endpoint URL
    InvalidIssuer(String),
    /// The requested provider is not in the registry
    UnknownProvider(String),
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIssuer(msg) => write!(f, "Invalid provider issuer: {msg}"),
            Self::UnknownProvider(issuer) => write!(f, "Provider {issuer} not configured"),
        }
    }
}

impl std::error::Error for AuthorizationError {}
