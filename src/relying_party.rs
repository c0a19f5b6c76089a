//! Relying party wiring
//!
//! Owns one store shared by the authorization builder and the callback
//! validator, so a login can only be completed by the instance that began it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use url::Url;

use crate::models::{AuthorizationError, RejectionReason, SubjectId};
use crate::oauth::providers::{ProviderRegistry, StaticProviderRegistry};
use crate::oauth::{AuthorizationRequestBuilder, CallbackParams};
use crate::settings::RelyingPartySettings;
use crate::store::{AttemptStore, InMemoryAttemptStore};
use crate::validation::CallbackValidator;

#[derive(Clone)]
pub struct RelyingParty {
    settings: RelyingPartySettings,
    registry: Arc<dyn ProviderRegistry>,
    builder: AuthorizationRequestBuilder,
    validator: CallbackValidator,
}

impl RelyingParty {
    #[must_use]
    pub fn new(
        settings: RelyingPartySettings,
        registry: Arc<dyn ProviderRegistry>,
        store: Arc<dyn AttemptStore>,
    ) -> Self {
        let builder = AuthorizationRequestBuilder::new(store.clone(), &settings.application);
        let validator =
            CallbackValidator::from_settings(store, registry.clone(), &settings.validation);

        Self {
            settings,
            registry,
            builder,
            validator,
        }
    }

    /// Build a relying party with the configured providers and an in-memory store
    #[must_use]
    pub fn from_settings(settings: RelyingPartySettings) -> Self {
        let registry = Arc::new(StaticProviderRegistry::from_settings(&settings.providers));
        Self::new(settings, registry, Arc::new(InMemoryAttemptStore::new()))
    }

    /// Start a login with a registered provider
    ///
    /// # Errors
    ///
    /// Returns `UnknownProvider` if the issuer is not registered, or
    /// `InvalidIssuer` if it cannot form an authorization URL
    pub fn begin_login(&self, issuer: &str) -> Result<Url, AuthorizationError> {
        self.begin_login_at(issuer, Utc::now())
    }

    /// Start a login, stamping the pending attempt with `now`
    ///
    /// # Errors
    ///
    /// See [`Self::begin_login`]
    pub fn begin_login_at(
        &self,
        issuer: &str,
        now: DateTime<Utc>,
    ) -> Result<Url, AuthorizationError> {
        let provider = self
            .registry
            .lookup(issuer)
            .ok_or_else(|| AuthorizationError::UnknownProvider(issuer.to_string()))?;

        self.builder.build_authorization_url_at(
            &provider.issuer_domain,
            &provider.login_hint,
            self.client_id(),
            &self.settings.application.callback_base_url,
            now,
        )
    }

    /// Complete a login from callback parameters
    ///
    /// # Errors
    ///
    /// Returns the reason the callback was rejected
    pub fn complete_login(&self, params: &CallbackParams) -> Result<SubjectId, RejectionReason> {
        self.validator.validate_callback(params, self.client_id())
    }

    /// Complete a login as of `now`
    ///
    /// # Errors
    ///
    /// Returns the reason the callback was rejected
    pub fn complete_login_at(
        &self,
        params: &CallbackParams,
        now: DateTime<Utc>,
    ) -> Result<SubjectId, RejectionReason> {
        self.validator.validate_callback_at(params, self.client_id(), now)
    }

    /// Complete a login from the raw callback query string
    ///
    /// # Errors
    ///
    /// Returns the reason the callback was rejected
    pub fn complete_login_query(&self, query: &str) -> Result<SubjectId, RejectionReason> {
        self.complete_login(&CallbackParams::from_query(query))
    }

    #[must_use]
    pub fn settings(&self) -> &RelyingPartySettings {
        &self.settings
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.settings.application.client_id
    }

    #[must_use]
    pub fn builder(&self) -> &AuthorizationRequestBuilder {
        &self.builder
    }

    #[must_use]
    pub fn validator(&self) -> &CallbackValidator {
        &self.validator
    }
}
