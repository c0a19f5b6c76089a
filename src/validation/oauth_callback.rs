//! Authentication callback validation
//!
//! Breaks callback processing into ordered steps. Every step maps its failure
//! to a [`RejectionReason`]; the specific reason is logged here and callers
//! only ever show [`RejectionReason::public_message`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::models::{PendingAttempt, RejectionReason, SubjectId};
use crate::oauth::jwt_validation::{IdTokenClaims, JwtValidator};
use crate::oauth::providers::{ProviderEntry, ProviderRegistry};
use crate::oauth::CallbackParams;
use crate::settings::ValidationSettings;
use crate::store::AttemptStore;
use crate::utils::logging::LoggingHelper;
use crate::validation::extract_required_param;

/// Callback parameters that passed the presence check
#[derive(Debug)]
struct RequiredParams<'a> {
    id_token: &'a str,
    state: &'a str,
}

/// Validates authorization-server callbacks against pending attempts
#[derive(Clone)]
pub struct CallbackValidator {
    store: Arc<dyn AttemptStore>,
    registry: Arc<dyn ProviderRegistry>,
    jwt_validator: JwtValidator,
    attempt_ttl: Duration,
}

impl CallbackValidator {
    #[must_use]
    pub fn new(
        store: Arc<dyn AttemptStore>,
        registry: Arc<dyn ProviderRegistry>,
        jwt_validator: JwtValidator,
        attempt_ttl: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            jwt_validator,
            attempt_ttl,
        }
    }

    /// Build a validator using the clock skew and attempt lifetime from settings
    #[must_use]
    pub fn from_settings(
        store: Arc<dyn AttemptStore>,
        registry: Arc<dyn ProviderRegistry>,
        settings: &ValidationSettings,
    ) -> Self {
        let ttl_seconds = i64::try_from(settings.attempt_ttl_seconds).unwrap_or(i64::MAX);
        Self::new(
            store,
            registry,
            JwtValidator::new(settings.clock_skew_seconds),
            Duration::try_seconds(ttl_seconds).unwrap_or(Duration::MAX),
        )
    }

    /// Validate a callback against the current time
    ///
    /// # Errors
    ///
    /// Returns the [`RejectionReason`] of the first failing step
    pub fn validate_callback(
        &self,
        params: &CallbackParams,
        expected_client_id: &str,
    ) -> Result<SubjectId, RejectionReason> {
        self.validate_callback_at(params, expected_client_id, Utc::now())
    }

    /// Validate a callback as of `now`
    ///
    /// Once the presence check passes, the pending attempt for `state` is
    /// consumed whatever the outcome, so a stolen state cannot be retried.
    ///
    /// # Errors
    ///
    /// Returns the [`RejectionReason`] of the first failing step
    pub fn validate_callback_at(
        &self,
        params: &CallbackParams,
        expected_client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SubjectId, RejectionReason> {
        let result = self.run_validation(params, expected_client_id, now);
        match &result {
            Ok(subject) => LoggingHelper::log_login_succeeded(subject.as_str()),
            Err(reason) => LoggingHelper::log_callback_rejected(reason),
        }
        result
    }

    fn run_validation(
        &self,
        params: &CallbackParams,
        expected_client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<SubjectId, RejectionReason> {
        debug!("Starting authentication callback validation");

        // Step 0: All required parameters present, before any state is touched
        let required = Self::check_required_params(params)?;

        // Step 1: Consume the pending attempt
        let attempt = self.consume_attempt(required.state)?;

        // Step 1a: Reject stale attempts
        self.check_attempt_age(&attempt, now)?;

        // Step 2: Resolve the provider key for the recorded issuer
        let provider = self.resolve_provider(&attempt.expected_issuer)?;

        // Step 3: Verify signature, audience and validity window
        let claims = self.verify_token(required.id_token, provider, expected_client_id, now)?;

        // Step 4: Nonce binding
        Self::check_nonce(&claims, &attempt)?;

        // Step 5: Issuer binding
        Self::check_issuer(&claims, &attempt)?;

        // Step 6: Compose the subject identifier
        let subject = claims
            .sub
            .as_deref()
            .filter(|sub| !sub.is_empty())
            .ok_or_else(|| {
                LoggingHelper::log_token_verification_failure(
                    &attempt.expected_issuer,
                    &"Required claim 'sub' is missing",
                );
                RejectionReason::TokenVerificationFailed
            })?;

        Ok(SubjectId::new(subject, &attempt.expected_issuer))
    }

    fn check_required_params(
        params: &CallbackParams,
    ) -> Result<RequiredParams<'_>, RejectionReason> {
        let id_token = extract_required_param(params.id_token.as_deref());
        let token_type = extract_required_param(params.token_type.as_deref());
        let state = extract_required_param(params.state.as_deref());

        match (id_token, token_type, state) {
            (Some(id_token), Some(_), Some(state)) => Ok(RequiredParams { id_token, state }),
            _ => {
                debug!(
                    "Callback parameters present: id_token={}, token_type={}, state={}",
                    id_token.is_some(),
                    token_type.is_some(),
                    state.is_some()
                );
                Err(RejectionReason::MissingParameter)
            }
        }
    }

    fn consume_attempt(&self, state: &str) -> Result<PendingAttempt, RejectionReason> {
        debug!("Received state parameter: length = {} characters", state.len());
        self.store
            .take_once(state)
            .ok_or(RejectionReason::UnknownOrReplayedState)
    }

    fn check_attempt_age(
        &self,
        attempt: &PendingAttempt,
        now: DateTime<Utc>,
    ) -> Result<(), RejectionReason> {
        if attempt.is_expired(self.attempt_ttl, now) {
            debug!(
                "Login attempt for {} is {}s old",
                attempt.expected_issuer,
                attempt.age(now).num_seconds()
            );
            return Err(RejectionReason::AttemptExpired);
        }
        Ok(())
    }

    fn resolve_provider(&self, issuer: &str) -> Result<&ProviderEntry, RejectionReason> {
        self.registry
            .lookup(issuer)
            .ok_or(RejectionReason::UnknownIssuer)
    }

    fn verify_token(
        &self,
        id_token: &str,
        provider: &ProviderEntry,
        expected_client_id: &str,
        now: DateTime<Utc>,
    ) -> Result<IdTokenClaims, RejectionReason> {
        self.jwt_validator
            .validate_id_token(id_token, &provider.public_key, expected_client_id, now)
            .map_err(|e| {
                LoggingHelper::log_token_verification_failure(&provider.issuer_domain, &e);
                RejectionReason::TokenVerificationFailed
            })
    }

    fn check_nonce(
        claims: &IdTokenClaims,
        attempt: &PendingAttempt,
    ) -> Result<(), RejectionReason> {
        if claims.nonce.as_deref() == Some(attempt.nonce.as_str()) {
            Ok(())
        } else {
            Err(RejectionReason::NonceMismatch)
        }
    }

    fn check_issuer(
        claims: &IdTokenClaims,
        attempt: &PendingAttempt,
    ) -> Result<(), RejectionReason> {
        if claims.iss.as_deref() == Some(attempt.expected_issuer.as_str()) {
            Ok(())
        } else {
            Err(RejectionReason::IssuerMismatch)
        }
    }
}
