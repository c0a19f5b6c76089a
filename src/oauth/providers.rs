//! Identity provider registry
//!
//! Maps an issuer to its verification key and login hint. The handshake only
//! reads from it; keys are supplied out of band through settings.

use std::collections::HashMap;

use crate::settings::ProviderSettings;
use crate::utils::logging::LoggingHelper;

/// Length of a LAO identifier (base64 of a 32-byte hash, padded)
pub const LOGIN_HINT_LENGTH: usize = 44;

/// Issuer identifier as it appears in the `iss` claim
///
/// A bare domain becomes `https://{domain}`. Issuers that already carry an
/// `http(s)://` scheme are kept, minus any trailing slash.
///
/// ```rust
/// use popcha_rp::oauth::providers::normalize_issuer;
///
/// assert_eq!(normalize_issuer("server.example.com"), "https://server.example.com");
/// assert_eq!(normalize_issuer("https://server.example.com/"), "https://server.example.com");
/// ```
#[must_use]
pub fn normalize_issuer(issuer: &str) -> String {
    let issuer = issuer.trim().trim_end_matches('/');
    if issuer.starts_with("https://") || issuer.starts_with("http://") {
        issuer.to_string()
    } else {
        format!("https://{issuer}")
    }
}

/// A registered identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEntry {
    pub issuer_domain: String,
    pub login_hint: String,
    /// PEM-encoded RSA verification key
    pub public_key: String,
}

impl ProviderEntry {
    #[must_use]
    pub fn new(
        issuer_domain: impl Into<String>,
        login_hint: impl Into<String>,
        public_key: impl Into<String>,
    ) -> Self {
        Self {
            issuer_domain: issuer_domain.into(),
            login_hint: login_hint.into(),
            public_key: public_key.into(),
        }
    }

    /// Static shape checks applied to configured providers
    ///
    /// # Errors
    ///
    /// Returns a description of the first failing check
    pub fn check_well_formed(&self) -> Result<(), String> {
        if self.login_hint.len() != LOGIN_HINT_LENGTH || !self.login_hint.ends_with('=') {
            return Err(format!(
                "login hint must be {LOGIN_HINT_LENGTH} characters ending with '='"
            ));
        }
        if self.issuer_domain.is_empty()
            || self.issuer_domain.contains('/')
            || self.issuer_domain.starts_with("http")
        {
            return Err("issuer must be a bare domain without scheme or path".to_string());
        }
        if self.public_key.trim().is_empty() {
            return Err("public key is empty".to_string());
        }
        Ok(())
    }

    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.check_well_formed().is_ok()
    }
}

/// Read-only lookup of providers by issuer
pub trait ProviderRegistry: Send + Sync {
    fn lookup(&self, issuer: &str) -> Option<&ProviderEntry>;
}

/// Fixed set of providers held in memory
///
/// Entries are keyed by [`normalize_issuer`], so `server.example.com` and
/// `https://server.example.com` name the same provider.
#[derive(Debug, Clone, Default)]
pub struct StaticProviderRegistry {
    providers: HashMap<String, ProviderEntry>,
}

impl StaticProviderRegistry {
    /// Build a registry from entries as given, without shape checks
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = ProviderEntry>) -> Self {
        let providers = entries
            .into_iter()
            .map(|entry| (normalize_issuer(&entry.issuer_domain), entry))
            .collect();
        Self { providers }
    }

    /// Build a registry from settings, keeping only enabled, well-formed
    /// providers whose key can be resolved
    #[must_use]
    pub fn from_settings(settings: &[ProviderSettings]) -> Self {
        LoggingHelper::log_provider_initialization();

        let mut providers = HashMap::new();
        for provider_settings in settings {
            if !provider_settings.enabled {
                LoggingHelper::log_provider_disabled(&provider_settings.issuer);
                continue;
            }

            let public_key = match provider_settings.resolve_public_key() {
                Ok(Some(key)) => key,
                Ok(None) => {
                    LoggingHelper::log_provider_rejected(
                        &provider_settings.issuer,
                        "no public key configured",
                    );
                    continue;
                }
                Err(e) => {
                    LoggingHelper::log_provider_rejected(
                        &provider_settings.issuer,
                        &format!("cannot read public key: {e}"),
                    );
                    continue;
                }
            };

            let entry = ProviderEntry::new(
                provider_settings.issuer.clone(),
                provider_settings.login_hint.clone(),
                public_key,
            );
            match entry.check_well_formed() {
                Ok(()) => {
                    LoggingHelper::log_provider_configured(&entry.issuer_domain);
                    providers.insert(normalize_issuer(&entry.issuer_domain), entry);
                }
                Err(reason) => LoggingHelper::log_provider_rejected(&entry.issuer_domain, &reason),
            }
        }

        let registry = Self { providers };
        LoggingHelper::log_providers_summary(&registry.issuers());
        registry
    }

    /// Add or replace a provider
    pub fn insert(&mut self, entry: ProviderEntry) {
        self.providers
            .insert(normalize_issuer(&entry.issuer_domain), entry);
    }

    /// All registered providers, in no particular order
    pub fn entries(&self) -> impl Iterator<Item = &ProviderEntry> {
        self.providers.values()
    }

    #[must_use]
    pub fn issuers(&self) -> Vec<&str> {
        let mut issuers: Vec<&str> = self
            .providers
            .values()
            .map(|entry| entry.issuer_domain.as_str())
            .collect();
        issuers.sort_unstable();
        issuers
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl ProviderRegistry for StaticProviderRegistry {
    fn lookup(&self, issuer: &str) -> Option<&ProviderEntry> {
        self.providers.get(&normalize_issuer(issuer))
    }
}
