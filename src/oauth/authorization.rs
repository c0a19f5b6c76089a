//! Authorization request construction
//!
//! Each request gets a fresh nonce and correlation token. The pending attempt
//! is recorded in the store before the URL is handed back, so the callback can
//! never race ahead of its own record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use url::Url;

use crate::models::{AuthorizationError, PendingAttempt};
use crate::oauth::providers::{normalize_issuer, ProviderEntry};
use crate::settings::{join_callback_url, ApplicationSettings};
use crate::store::AttemptStore;
use crate::utils::crypto::{generate_nonce, generate_state_token};
use crate::utils::logging::LoggingHelper;

pub const RESPONSE_MODE: &str = "query";
pub const RESPONSE_TYPE: &str = "id_token";
pub const SCOPE: &str = "openid profile";

/// Builds implicit-flow authorization redirects and records pending attempts
#[derive(Clone)]
pub struct AuthorizationRequestBuilder {
    store: Arc<dyn AttemptStore>,
    client_id: String,
    callback_base_url: String,
    callback_path: String,
}

impl AuthorizationRequestBuilder {
    #[must_use]
    pub fn new(store: Arc<dyn AttemptStore>, application: &ApplicationSettings) -> Self {
        Self {
            store,
            client_id: application.client_id.clone(),
            callback_base_url: application.callback_base_url.clone(),
            callback_path: application.callback_path.clone(),
        }
    }

    /// Build the redirect for a registered provider with the configured client id
    /// and callback base URL
    ///
    /// # Errors
    ///
    /// Returns `InvalidIssuer` if the provider issuer cannot form a URL
    pub fn build_for_provider(&self, provider: &ProviderEntry) -> Result<Url, AuthorizationError> {
        self.build_authorization_url(
            &provider.issuer_domain,
            &provider.login_hint,
            &self.client_id,
            &self.callback_base_url,
        )
    }

    /// Build an authorization URL and record the pending attempt
    ///
    /// The attempt's `expected_issuer` is the normalized issuer URL, which is
    /// what the provider puts in the token's `iss` claim.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIssuer` if the provider issuer cannot form a URL. The
    /// store is left untouched in that case.
    pub fn build_authorization_url(
        &self,
        provider_issuer: &str,
        login_hint: &str,
        client_id: &str,
        callback_base_url: &str,
    ) -> Result<Url, AuthorizationError> {
        self.build_authorization_url_at(
            provider_issuer,
            login_hint,
            client_id,
            callback_base_url,
            Utc::now(),
        )
    }

    /// Same as [`Self::build_authorization_url`], stamping the attempt with `now`
    ///
    /// # Errors
    ///
    /// Returns `InvalidIssuer` if the provider issuer cannot form a URL
    pub fn build_authorization_url_at(
        &self,
        provider_issuer: &str,
        login_hint: &str,
        client_id: &str,
        callback_base_url: &str,
        now: DateTime<Utc>,
    ) -> Result<Url, AuthorizationError> {
        let mut url = authorize_endpoint(provider_issuer)?;

        let nonce = generate_nonce();
        let state = generate_state_token();
        let redirect_uri = join_callback_url(callback_base_url, &self.callback_path);

        url.query_pairs_mut()
            .append_pair("response_mode", RESPONSE_MODE)
            .append_pair("response_type", RESPONSE_TYPE)
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", &redirect_uri)
            .append_pair("scope", SCOPE)
            .append_pair("login_hint", login_hint)
            .append_pair("nonce", &nonce)
            .append_pair("state", &state);

        LoggingHelper::log_authorization_url_built(provider_issuer, &nonce, &state);
        self.store.put(PendingAttempt::new(
            state,
            nonce,
            normalize_issuer(provider_issuer),
            now,
        ));

        Ok(url)
    }
}

/// Authorization endpoint for an issuer
///
/// Bare domains get an `https://` scheme; issuers that already carry an
/// `http(s)://` scheme are used as given.
///
/// # Errors
///
/// Returns `InvalidIssuer` if the result is not a valid URL
pub fn authorize_endpoint(issuer: &str) -> Result<Url, AuthorizationError> {
    if issuer.trim().trim_end_matches('/').is_empty() {
        return Err(AuthorizationError::InvalidIssuer("empty issuer".to_string()));
    }

    let endpoint = format!("{}/authorize", normalize_issuer(issuer));
    Url::parse(&endpoint)
        .map_err(|e| AuthorizationError::InvalidIssuer(format!("{issuer}: {e}")))
}
