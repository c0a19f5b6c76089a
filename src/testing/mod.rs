//! Testing utilities for the handshake
//!
//! - [`fixtures`] - Fixture RSA keys, the PoP cross-validation token and
//!   pre-wired relying parties
//! - [`builders`] - A fluent builder that signs test ID tokens
//!
//! ## Usage
//!
//! ```ignore
//! use popcha_rp::testing::{fixtures::TestFixtures, TestTokenBuilder};
//!
//! let token = TestTokenBuilder::new()
//!     .with_nonce("n0nc3")
//!     .sign(TestFixtures::private_key_pem());
//! assert_eq!(token.split('.').count(), 3);
//! ```

pub mod builders;
pub mod fixtures;

pub use builders::TestTokenBuilder;
pub use fixtures::{TestFixtures, BE1_CROSS_VALIDATION_TOKEN};

/// Common test constants
pub mod constants {
    /// Audience of the cross-validation token
    pub const TEST_CLIENT_ID: &str = "cID122dw";

    /// Issuer of the cross-validation token
    pub const TEST_ISSUER: &str = "https://server.example.com";

    /// Bare-domain provider used where settings validation applies
    pub const TEST_PROVIDER_DOMAIN: &str = "server.example";

    /// A LAO identifier as used for login hints
    pub const TEST_LOGIN_HINT: &str = "fzJSZjKf-2cbXH7kds9H8NORuuFIRLkevJlN7qQemjo=";

    pub const TEST_NONCE: &str = "n0nc3";

    pub const TEST_SUBJECT: &str = "ppid12564";

    pub const TEST_STATE: &str = "5ta7e-c0rre1at10n";

    pub const TEST_CALLBACK_BASE_URL: &str = "https://127.0.0.1:8000";
}
