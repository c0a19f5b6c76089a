use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;

use crate::utils::crypto::{generate_url_safe_token, SECRET_TOKEN_BYTES};

/// Errors raised while loading settings
#[derive(Debug)]
pub enum SettingsError {
    Io(std::io::Error),
    Toml(basic_toml::Error),
    Logger(log::SetLoggerError),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Failed to read settings file: {e}"),
            Self::Toml(e) => write!(f, "Failed to parse settings TOML: {e}"),
            Self::Logger(e) => write!(f, "Failed to initialize logger: {e}"),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Toml(e) => Some(e),
            Self::Logger(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for SettingsError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<basic_toml::Error> for SettingsError {
    fn from(err: basic_toml::Error) -> Self {
        Self::Toml(err)
    }
}

impl From<log::SetLoggerError> for SettingsError {
    fn from(err: log::SetLoggerError) -> Self {
        Self::Logger(err)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RelyingPartySettings {
    #[serde(default)]
    pub application: ApplicationSettings,
    #[serde(default)]
    pub validation: ValidationSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub providers: Vec<ProviderSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationSettings {
    /// Client identifier registered with the providers (generated if empty)
    pub client_id: String,
    /// Public base URL the authorization server redirects back to
    pub callback_base_url: String,
    /// Path appended to `callback_base_url` to form `redirect_uri`
    pub callback_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Clock skew tolerance in seconds for `exp`, `iat` and `nbf` (default: 60)
    pub clock_skew_seconds: u64,
    /// How long an issued attempt stays redeemable, in seconds (default: 300)
    pub attempt_ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Issuer domain; also the registry key
    pub issuer: String,
    /// Opaque identifier forwarded as `login_hint`
    pub login_hint: String,
    /// Inline PEM-encoded RSA public key
    #[serde(default)]
    pub public_key: Option<String>,
    /// Path to a PEM file, used when `public_key` is not set
    #[serde(default)]
    pub public_key_path: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

// Helper functions for serde defaults
fn default_true() -> bool { true }

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(), // Will be generated if empty
            callback_base_url: "http://localhost:8000".to_string(),
            callback_path: "/cb".to_string(),
        }
    }
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            clock_skew_seconds: 60,
            attempt_ttl_seconds: 300,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl RelyingPartySettings {
    /// Load settings from configuration files and environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Settings file cannot be read or parsed
    /// - Logger initialization fails
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_env_file();

        // Load base settings from TOML or defaults
        let mut settings = Self::load_base_settings()?;

        // Apply environment variable overrides
        Self::apply_env_overrides(&mut settings);

        settings.init_logging()?;
        Ok(settings)
    }

    /// Parse settings from a TOML string without touching the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed
    pub fn from_toml_str(toml_content: &str) -> Result<Self, SettingsError> {
        Ok(basic_toml::from_str(toml_content)?)
    }

    /// Initialize `env_logger`, using `logging.level` when `RUST_LOG` is unset
    ///
    /// # Errors
    ///
    /// Returns an error if a global logger is already installed
    pub fn init_logging(&self) -> Result<(), SettingsError> {
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(self.logging.level.as_str()),
        )
        .try_init()?;
        Ok(())
    }

    /// Load base settings from TOML file(s) or use defaults
    /// Settings are loaded with the following priority (highest to lowest):
    /// 1. Environment variables (applied separately after loading base settings)
    /// 2. Settings.toml in `POPCHA_SECRETS_DIR` (if specified and exists)
    /// 3. Settings.toml in current directory (if exists)
    /// 4. Default settings
    fn load_base_settings() -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        let default_config_path = std::path::PathBuf::from("Settings.toml");
        if default_config_path.exists() {
            settings = Self::from_toml_str(&fs::read_to_string(&default_config_path)?)?;
            println!(
                "✓ Loaded base settings from {}",
                default_config_path.display()
            );
        }

        if let Ok(secrets_dir) = std::env::var("POPCHA_SECRETS_DIR") {
            let secrets_path = std::path::Path::new(&secrets_dir).join("Settings.toml");
            if secrets_path.exists() {
                settings = Self::from_toml_str(&fs::read_to_string(&secrets_path)?)?;
                println!("✓ Overriding settings from {}", secrets_path.display());
            } else {
                println!(
                    "ℹ POPCHA_SECRETS_DIR set but no Settings.toml found at: {}",
                    secrets_path.display()
                );
            }
        }

        Ok(settings)
    }

    /// Apply environment variable overrides to settings
    fn apply_env_overrides(settings: &mut Self) {
        Self::apply_application_env_overrides(&mut settings.application);
        Self::apply_validation_env_overrides(&mut settings.validation);
        Self::apply_logging_env_overrides(&mut settings.logging);
    }

    /// Apply environment overrides for application settings, generating a
    /// client id when none is configured
    pub fn apply_application_env_overrides(app_settings: &mut ApplicationSettings) {
        if let Ok(client_id) = std::env::var("CLIENT_ID") {
            if !client_id.is_empty() {
                app_settings.client_id = client_id;
            }
        }
        if let Ok(callback_base_url) = std::env::var("CALLBACK_BASE_URL") {
            app_settings.callback_base_url = callback_base_url;
        }
        if let Ok(callback_path) = std::env::var("CALLBACK_PATH") {
            app_settings.callback_path = callback_path;
        }

        if app_settings.client_id.is_empty() {
            app_settings.client_id = Self::generate_random_client_id();
            Self::warn_about_generated_client_id(&app_settings.client_id);
        }
    }

    /// Apply environment overrides for validation policy
    pub fn apply_validation_env_overrides(validation_settings: &mut ValidationSettings) {
        Self::apply_numeric_env_override(
            "CLOCK_SKEW_SECONDS",
            &mut validation_settings.clock_skew_seconds,
        );
        Self::apply_numeric_env_override(
            "ATTEMPT_TTL_SECONDS",
            &mut validation_settings.attempt_ttl_seconds,
        );
    }

    /// Helper function to apply numeric environment variable overrides
    fn apply_numeric_env_override(env_var: &str, target: &mut u64) {
        if let Ok(value_str) = std::env::var(env_var) {
            if let Ok(value) = value_str.parse::<u64>() {
                *target = value;
            }
        }
    }

    /// Apply environment overrides for logging settings
    fn apply_logging_env_overrides(logging_settings: &mut LoggingSettings) {
        if let Ok(log_level) = std::env::var("LOG_LEVEL") {
            logging_settings.level = log_level;
        }
    }

    /// Generate a random client identifier (32 bytes, base64url)
    fn generate_random_client_id() -> String {
        generate_url_safe_token(SECRET_TOKEN_BYTES)
    }

    /// Display warnings about using a generated client id
    fn warn_about_generated_client_id(client_id: &str) {
        eprintln!("⚠️  WARNING: Using auto-generated client id");
        eprintln!("📝 Generated client id: {client_id}");
        eprintln!("🔒 Register this id with your providers and set CLIENT_ID");
        eprintln!("   or configure client_id in Settings.toml");
        eprintln!("💡 This id will change on each restart unless explicitly configured");
    }

    /// Load environment variables from .env file
    fn load_env_file() {
        if let Ok(contents) = std::fs::read_to_string(".env") {
            for line in contents.lines() {
                if let Some((key, value)) = line.split_once('=') {
                    std::env::set_var(key.trim(), value.trim());
                }
            }
        }
    }

    /// Full `redirect_uri` for authorization requests
    #[must_use]
    pub fn callback_url(&self) -> String {
        join_callback_url(
            &self.application.callback_base_url,
            &self.application.callback_path,
        )
    }
}

impl ProviderSettings {
    /// Resolve the PEM public key, preferring the inline value over the file
    ///
    /// # Errors
    ///
    /// Returns an error if `public_key_path` is set but cannot be read
    pub fn resolve_public_key(&self) -> Result<Option<String>, std::io::Error> {
        if let Some(key) = self.public_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Ok(Some(key.clone()));
        }
        match &self.public_key_path {
            Some(path) => fs::read_to_string(path).map(Some),
            None => Ok(None),
        }
    }
}

/// Join a base URL and a path with exactly one slash between them
#[must_use]
pub fn join_callback_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}
