//! OpenID Connect implicit-flow module
//!
//! Authorization request construction, the provider registry and local ID
//! token verification.

pub mod authorization;
pub mod jwt_validation;
pub mod providers;

pub use authorization::{authorize_endpoint, AuthorizationRequestBuilder};
pub use jwt_validation::{IdTokenClaims, JwtValidationError, JwtValidator, SigningAlgorithm};
pub use providers::{ProviderEntry, ProviderRegistry, StaticProviderRegistry, LOGIN_HINT_LENGTH};

use std::borrow::Borrow;
use std::fmt;

use serde::Deserialize;

/// Query parameters delivered to the callback endpoint
///
/// Every field is optional here; presence is enforced by the callback
/// validator so a missing value maps to a rejection instead of a parse error.
#[derive(Deserialize, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub id_token: Option<String>,
    pub token_type: Option<String>,
    pub state: Option<String>,
}

impl CallbackParams {
    /// Collect callback parameters from decoded `(key, value)` pairs
    ///
    /// Only the first occurrence of each parameter is kept. Unknown keys are ignored.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Borrow<str>,
        V: Into<String>,
    {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.borrow() {
                "id_token" => &mut params.id_token,
                "token_type" => &mut params.token_type,
                "state" => &mut params.state,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into());
            }
        }
        params
    }

    /// Parse an `application/x-www-form-urlencoded` query string, with or
    /// without the leading `?`
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()))
    }
}

// Tokens and state are credentials; only report whether they are present.
impl fmt::Debug for CallbackParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackParams")
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("token_type", &self.token_type)
            .field("state", &self.state.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
