//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_BASE_URL` - Public URL of the storefront
//! - `SUPABASE_URL` - Supabase project URL
//! - `SUPABASE_ANON_KEY` - Supabase anon (public) key
//! - `SUPABASE_SERVICE_ROLE_KEY` - Supabase service role key (high entropy)
//! - `MIDTRANS_SERVER_KEY` - Midtrans server key (high entropy)
//! - `MIDTRANS_CLIENT_KEY` - Midtrans client key (exposed to the Snap widget)
//! - `KOMERCE_API_KEY` - Komerce / `RajaOngkir` API key (high entropy)
//! - `KOMERCE_ORIGIN_ID` - Komerce location id of the warehouse
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_CORS_ORIGIN` - Extra origin allowed to call `/api/`
//! - `MIDTRANS_IS_PRODUCTION` - Use the production gateway (default: false)
//! - `KOMERCE_BASE_URL` - Rate API (default: `https://rajaongkir.komerce.id/api/v1`)
//! - `KOMERCE_DELIVERY_URL` - Shipment API
//!   (default: `https://api-sandbox.collaborator.komerce.id/order/api/v1`)
//! - `SHIPPING_COURIERS` - Couriers to quote (default: `jne:pos:tiki`)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Trace sample rate (default: 0.1)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const MIDTRANS_SANDBOX_SNAP: &str = "https://app.sandbox.midtrans.com/snap/v1";
const MIDTRANS_PRODUCTION_SNAP: &str = "https://app.midtrans.com/snap/v1";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
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

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Extra CORS origin for `/api/` (the base URL is always allowed)
    pub cors_origin: Option<String>,
    pub supabase: SupabaseConfig,
    pub midtrans: MidtransConfig,
    pub komerce: KomerceConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_sample_rate: f32,
    pub sentry_traces_sample_rate: f32,
}

/// Supabase project configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://abcd.supabase.co`
    pub url: String,
    /// Anon key, used for the auth endpoints
    pub anon_key: String,
    /// Service role key, used for table access (bypasses row level security)
    pub service_role_key: SecretString,
}

impl std::fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &self.anon_key)
            .field("service_role_key", &"[REDACTED]")
            .finish()
    }
}

/// Midtrans Snap configuration.
#[derive(Clone)]
pub struct MidtransConfig {
    pub server_key: SecretString,
    pub client_key: String,
    pub is_production: bool,
    /// Snap API base URL, derived from `is_production`
    pub snap_url: String,
}

impl std::fmt::Debug for MidtransConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidtransConfig")
            .field("server_key", &"[REDACTED]")
            .field("client_key", &self.client_key)
            .field("is_production", &self.is_production)
            .field("snap_url", &self.snap_url)
            .finish()
    }
}

/// Komerce (`RajaOngkir`) configuration.
#[derive(Clone)]
pub struct KomerceConfig {
    pub api_key: SecretString,
    /// Rate and destination API base URL
    pub base_url: String,
    /// Shipment (order, pickup, label) API base URL
    pub delivery_url: String,
    /// Warehouse location id used as the shipping origin
    pub origin_id: String,
    /// Colon-separated courier codes
    pub couriers: String,
}

impl std::fmt::Debug for KomerceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KomerceConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("delivery_url", &self.delivery_url)
            .field("origin_id", &self.origin_id)
            .field("couriers", &self.couriers)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = parse_env("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env("STOREFRONT_PORT", "3000")?;
        let base_url = get_required_env("STOREFRONT_BASE_URL")?;
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;

        Ok(Self {
            host,
            port,
            base_url,
            cors_origin: get_optional_env("STOREFRONT_CORS_ORIGIN"),
            supabase: SupabaseConfig::from_env()?,
            midtrans: MidtransConfig::from_env()?,
            komerce: KomerceConfig::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: parse_env("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: parse_env("SENTRY_TRACES_SAMPLE_RATE", "0.1")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl SupabaseConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: get_required_env("SUPABASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            anon_key: get_required_env("SUPABASE_ANON_KEY")?,
            service_role_key: get_validated_secret("SUPABASE_SERVICE_ROLE_KEY")?,
        })
    }
}

impl MidtransConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let is_production: bool = parse_env("MIDTRANS_IS_PRODUCTION", "false")?;
        Ok(Self {
            server_key: get_validated_secret("MIDTRANS_SERVER_KEY")?,
            client_key: get_required_env("MIDTRANS_CLIENT_KEY")?,
            is_production,
            snap_url: Self::snap_url_for(is_production).to_string(),
        })
    }

    /// Snap API base URL for the given environment.
    #[must_use]
    pub const fn snap_url_for(is_production: bool) -> &'static str {
        if is_production {
            MIDTRANS_PRODUCTION_SNAP
        } else {
            MIDTRANS_SANDBOX_SNAP
        }
    }
}

impl KomerceConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: get_validated_secret("KOMERCE_API_KEY")?,
            base_url: get_env_or_default("KOMERCE_BASE_URL", "https://rajaongkir.komerce.id/api/v1")
                .trim_end_matches('/')
                .to_string(),
            delivery_url: get_env_or_default(
                "KOMERCE_DELIVERY_URL",
                "https://api-sandbox.collaborator.komerce.id/order/api/v1",
            )
            .trim_end_matches('/')
            .to_string(),
            origin_id: get_required_env("KOMERCE_ORIGIN_ID")?,
            couriers: get_env_or_default("SHIPPING_COURIERS", "jne:pos:tiki"),
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

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
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
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the key issued by the provider."
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config() -> StorefrontConfig {
        StorefrontConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            cors_origin: None,
            supabase: SupabaseConfig {
                url: "https://abcd.supabase.co".to_string(),
                anon_key: "anon-key-value".to_string(),
                service_role_key: SecretString::from("super_secret_service_role"),
            },
            midtrans: MidtransConfig {
                server_key: SecretString::from("SB-Mid-server-hidden"),
                client_key: "SB-Mid-client-visible".to_string(),
                is_production: false,
                snap_url: MidtransConfig::snap_url_for(false).to_string(),
            },
            komerce: KomerceConfig {
                api_key: SecretString::from("komerce_hidden_key"),
                base_url: "https://rajaongkir.komerce.id/api/v1".to_string(),
                delivery_url: "https://api-sandbox.collaborator.komerce.id/order/api/v1"
                    .to_string(),
                origin_id: "17650".to_string(),
                couriers: "jne:pos:tiki".to_string(),
            },
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-midtrans-server-key", "MIDTRANS_SERVER_KEY");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_midtrans_key() {
        let result = validate_secret_strength("SB-Mid-server-7fQk2LwZp9XbN4vR1tYc", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_snap_url_by_environment() {
        assert!(MidtransConfig::snap_url_for(false).contains("sandbox"));
        assert!(!MidtransConfig::snap_url_for(true).contains("sandbox"));
    }

    #[test]
    fn test_socket_addr() {
        let addr = test_config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug_output = format!("{:?}", test_config());

        assert!(debug_output.contains("abcd.supabase.co"));
        assert!(debug_output.contains("SB-Mid-client-visible"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_service_role"));
        assert!(!debug_output.contains("SB-Mid-server-hidden"));
        assert!(!debug_output.contains("komerce_hidden_key"));
    }
}
