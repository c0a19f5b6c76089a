// Centralized logging helpers for the handshake
use log::{debug, info, warn};

use crate::models::RejectionReason;

pub struct LoggingHelper;

impl LoggingHelper {
    /// Log provider registry initialization start
    pub fn log_provider_initialization() {
        info!("🔧 Initializing identity providers from configuration...");
    }

    /// Log that a provider is disabled
    pub fn log_provider_disabled(issuer: &str) {
        info!("⏭️  Provider {issuer} is disabled, skipping");
    }

    /// Log that a provider was accepted into the registry
    pub fn log_provider_configured(issuer: &str) {
        info!("✅ Provider {issuer} configured");
    }

    /// Log that a provider entry failed the static checks
    pub fn log_provider_rejected(issuer: &str, reason: &str) {
        warn!("❌ Provider {issuer} rejected: {reason}");
    }

    /// Log summary of configured providers
    pub fn log_providers_summary(issuers: &[&str]) {
        info!("🎯 Configured identity providers: {issuers:?}");
    }

    /// Log authorization URL building. Secrets are reported by length only.
    pub fn log_authorization_url_built(issuer: &str, nonce: &str, state: &str) {
        info!("🔍 Built authorization request for {issuer}");
        debug!(
            "Authorization request secrets: nonce length = {}, state length = {}",
            nonce.len(),
            state.len()
        );
    }

    /// Log a rejected callback with its specific reason
    pub fn log_callback_rejected(reason: &RejectionReason) {
        warn!("🚫 Authentication callback rejected: {reason}");
    }

    /// Log the internal detail behind a token verification failure
    pub fn log_token_verification_failure(issuer: &str, detail: &dyn std::fmt::Display) {
        warn!("🔒 ID token from {issuer} failed verification: {detail}");
    }

    /// Log a successful login
    pub fn log_login_succeeded(subject: &str) {
        info!("🎉 Authentication succeeded for {subject}");
    }
}
