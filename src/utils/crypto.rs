// Cryptographic utilities for generating per-attempt secrets

use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;

/// Number of random bytes behind every nonce and state value (256 bits)
pub const SECRET_TOKEN_BYTES: usize = 32;

/// Generate a cryptographically secure, URL-safe random token
///
/// The bytes come from the thread-local CSPRNG, which is seeded from the
/// operating system. A failing entropy source panics inside the RNG; there
/// is no recoverable error path for it.
///
/// # Arguments
///
/// * `length` - Number of random bytes to generate
///
/// # Returns
///
/// A base64url-encoded string without padding, safe to place unescaped in a
/// URL query component
#[must_use]
pub fn generate_url_safe_token(length: usize) -> String {
    let mut bytes = vec![0u8; length];
    rand::rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate the nonce bound into an authorization request
#[must_use]
pub fn generate_nonce() -> String {
    generate_url_safe_token(SECRET_TOKEN_BYTES)
}

/// Generate the single-use correlation token sent as `state`
#[must_use]
pub fn generate_state_token() -> String {
    generate_url_safe_token(SECRET_TOKEN_BYTES)
}
