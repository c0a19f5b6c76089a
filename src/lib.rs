#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Relying-party side of the PoP implicit-flow (`id_token`) handshake
//!
//! [`RelyingParty::begin_login`] issues an authorization redirect and records
//! a single-use pending attempt; [`RelyingParty::complete_login`] verifies the
//! returned ID token against that attempt and yields a [`SubjectId`].

/// Version of the popcha-rp library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod models;
pub mod oauth;
pub mod relying_party;
pub mod settings;
pub mod store;
pub mod utils;
pub mod validation;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use models::{AuthorizationError, PendingAttempt, RejectionReason, SubjectId};
pub use oauth::{
    AuthorizationRequestBuilder, CallbackParams, JwtValidator, ProviderEntry, ProviderRegistry,
    StaticProviderRegistry,
};
pub use relying_party::RelyingParty;
pub use settings::RelyingPartySettings;
pub use store::{AttemptStore, InMemoryAttemptStore};
pub use validation::CallbackValidator;
