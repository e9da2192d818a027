//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `GALLERY_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `GALLERY_TOKEN_SECRET` - Session token signing secret (min 32 chars, high entropy)
//! - `PAYMENT_VALIDATION_URL` - Payment authorization endpoint
//!
//! ## Optional
//! - `GALLERY_HOST` - Bind address (default: 127.0.0.1)
//! - `GALLERY_PORT` - Listen port (default: 8080)
//! - `GALLERY_COOKIE_SECURE` - Mark the session cookie `Secure` (default: false)
//! - `GALLERY_COOKIE_SAME_SITE` - `Strict`, `Lax` or `None` (default: Lax)
//! - `PAYMENT_TIMEOUT_SECS` - Payment call timeout (default: 10)
//! - `IDENTITY_VERIFY_URL` - Federated token verification endpoint
//!   (default: Google token-info)
//! - `IDENTITY_AUDIENCE` - Expected `aud` of federated tokens
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)
//! - `LOG_FORMAT` - `json` for structured logs, anything else for human output

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use cookie::SameSite;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Google's token-info endpoint, used for federated sign-in by default.
pub const DEFAULT_IDENTITY_VERIFY_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct GalleryConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// HMAC key for session tokens
    pub token_secret: SecretString,
    /// Session cookie attributes
    pub cookie: CookieConfig,
    /// Payment authorization collaborator
    pub payment: PaymentConfig,
    /// Federated identity collaborator
    pub identity: IdentityConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions sent to Sentry
    pub sentry_traces_sample_rate: f32,
    /// Emit JSON logs instead of human-readable ones
    pub log_json: bool,
}

/// Session cookie attributes that vary between deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookieConfig {
    pub secure: bool,
    pub same_site: SameSite,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            secure: false,
            same_site: SameSite::Lax,
        }
    }
}

/// Payment authorization endpoint configuration.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub validation_url: Url,
    pub timeout: Duration,
}

/// Federated identity verification configuration.
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub verify_url: Url,
    /// When set, tokens issued for another audience are rejected.
    pub audience: Option<String>,
}

impl GalleryConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the token secret fails validation (length, placeholder detection,
    /// entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("GALLERY_DATABASE_URL")?;
        let host = get_env_or_default("GALLERY_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("GALLERY_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("GALLERY_PORT", "8080")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("GALLERY_PORT".to_string(), e.to_string()))?;
        let token_secret = get_validated_secret("GALLERY_TOKEN_SECRET")?;
        validate_token_secret(&token_secret, "GALLERY_TOKEN_SECRET")?;

        let cookie = CookieConfig::from_env()?;
        let payment = PaymentConfig::from_env()?;
        let identity = IdentityConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            token_secret,
            cookie,
            payment,
            identity,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env_or("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: parse_env_or("SENTRY_TRACES_SAMPLE_RATE", 0.0)?,
            log_json: get_optional_env("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CookieConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let secure = parse_env_or("GALLERY_COOKIE_SECURE", false)?;
        let same_site = parse_same_site(&get_env_or_default("GALLERY_COOKIE_SAME_SITE", "Lax"))
            .ok_or_else(|| {
                ConfigError::InvalidEnvVar(
                    "GALLERY_COOKIE_SAME_SITE".to_string(),
                    "expected Strict, Lax or None".to_string(),
                )
            })?;
        Ok(Self { secure, same_site })
    }
}

impl PaymentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let validation_url = parse_url("PAYMENT_VALIDATION_URL", &get_required_env("PAYMENT_VALIDATION_URL")?)?;
        let timeout_secs: u64 = parse_env_or("PAYMENT_TIMEOUT_SECS", 10)?;
        Ok(Self {
            validation_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl IdentityConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let verify_url = parse_url(
            "IDENTITY_VERIFY_URL",
            &get_env_or_default("IDENTITY_VERIFY_URL", DEFAULT_IDENTITY_VERIFY_URL),
        )?;
        Ok(Self {
            verify_url,
            audience: get_optional_env("IDENTITY_AUDIENCE"),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, using `default` when unset.
fn parse_env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

fn parse_url(key: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

fn parse_same_site(raw: &str) -> Option<SameSite> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "strict" => Some(SameSite::Strict),
        "lax" => Some(SameSite::Lax),
        "none" => Some(SameSite::None),
        _ => None,
    }
}

/// Validate that the token secret meets minimum length requirements.
fn validate_token_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
