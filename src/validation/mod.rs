//! Validation Module
//!
//! Callback validation for the implicit-flow handshake plus the small helpers
//! it shares with ID token verification.
//!
//! - [`core`] - Parameter and JWT segment helpers
//! - [`oauth_callback`] - The ordered callback validation steps

pub mod core;
pub mod oauth_callback;

pub use self::core::{
    decode_and_parse_jwt_part, extract_audiences_from_claim, extract_required_param,
};

pub use oauth_callback::CallbackValidator;
