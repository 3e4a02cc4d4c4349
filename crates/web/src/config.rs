//! Application configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## General
//! - `GARAGE_ENV` - `development` (default), `production` or `testing`
//! - `DATABASE_URL` - SQLite connection string (required in production)
//! - `GARAGE_HOST` - Bind address (default: 127.0.0.1)
//! - `GARAGE_PORT` - Listen port (default: 5000)
//! - `GARAGE_BASE_URL` - Public URL, encoded into QR codes (required in production)
//! - `LOG_FORMAT` - `text` or `json` (default depends on environment)
//!
//! ## Storage
//! - `STORAGE_BACKEND` - `local` or `s3` (default: `local`, `s3` in production)
//! - `STORAGE_PATH` - Root directory for the local backend (default: uploads)
//! - `S3_BUCKET_NAME` - Bucket name (required for `s3`)
//! - `S3_REGION` - Bucket region (default: eu-west-2)
//! - `S3_ENDPOINT_URL` - Custom endpoint for MinIO/LocalStack
//! - `S3_PREFIX` - Key prefix (default: garage-inventory)
//! - `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` - Explicit credentials
//!   (otherwise the default AWS provider chain is used)
//!
//! ## Error tracking
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_DEV_DATABASE_URL: &str = "sqlite://garage.db?mode=rwc";
const DEFAULT_TEST_DATABASE_URL: &str = "sqlite::memory:";
const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_S3_REGION: &str = "eu-west-2";
const DEFAULT_S3_PREFIX: &str = "garage-inventory";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Testing,
}

impl Environment {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Testing => "testing",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "testing" | "test" => Ok(Self::Testing),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected 'text' or 'json', got '{other}'")),
        }
    }
}

/// Which storage backend to build at start-up.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Files on local disk under `root`.
    Local { root: PathBuf },
    /// S3-compatible object storage.
    S3(S3Config),
}

/// S3 bucket configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint (MinIO, LocalStack). Path-style URLs are used when set.
    pub endpoint_url: Option<String>,
    pub prefix: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<SecretString>,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint_url", &self.endpoint_url)
            .field("prefix", &self.prefix)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    /// SQLite connection URL
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL without trailing slash
    pub base_url: String,
    pub storage: StorageConfig,
    pub log_format: LogFormat,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let environment: Environment = env.parsed_or("GARAGE_ENV", Environment::Development)?;
        let is_production = environment == Environment::Production;

        let database_url = match (env.get("DATABASE_URL"), environment) {
            (Some(url), _) => url,
            (None, Environment::Production) => {
                return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
            }
            (None, Environment::Testing) => DEFAULT_TEST_DATABASE_URL.to_string(),
            (None, Environment::Development) => DEFAULT_DEV_DATABASE_URL.to_string(),
        };

        let host = env.parsed_or("GARAGE_HOST", IpAddr::from([127, 0, 0, 1]))?;
        let port = env.parsed_or("GARAGE_PORT", 5000_u16)?;

        let base_url = if is_production {
            env.required("GARAGE_BASE_URL")?
        } else {
            env.get("GARAGE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
        };
        let base_url = normalize_base_url(&base_url)?;

        let storage = StorageConfig::from_env(&env, environment)?;

        let default_format = if is_production {
            LogFormat::Json
        } else {
            LogFormat::Text
        };
        let log_format = env.parsed_or("LOG_FORMAT", default_format)?;

        Ok(Self {
            environment,
            database_url: SecretString::from(database_url),
            host,
            port,
            base_url,
            storage,
            log_format,
            sentry_dsn: env.get("SENTRY_DSN"),
            sentry_environment: env
                .get("SENTRY_ENVIRONMENT")
                .or_else(|| Some(environment.as_str().to_string())),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether session cookies should carry the `Secure` flag.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl StorageConfig {
    fn from_env<F>(env: &Env<F>, environment: Environment) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default_backend = if environment == Environment::Production {
            "s3"
        } else {
            "local"
        };
        let backend = env
            .get("STORAGE_BACKEND")
            .unwrap_or_else(|| default_backend.to_string())
            .to_ascii_lowercase();

        match backend.as_str() {
            "local" => Ok(Self::Local {
                root: PathBuf::from(env.get("STORAGE_PATH").unwrap_or_else(|| "uploads".into())),
            }),
            "s3" => {
                let endpoint_url = env
                    .get("S3_ENDPOINT_URL")
                    .map(|raw| {
                        Url::parse(&raw)
                            .map(|_| raw.trim_end_matches('/').to_string())
                            .map_err(|e| {
                                ConfigError::InvalidEnvVar("S3_ENDPOINT_URL".into(), e.to_string())
                            })
                    })
                    .transpose()?;

                Ok(Self::S3(S3Config {
                    bucket: env.required("S3_BUCKET_NAME")?,
                    region: env
                        .get("S3_REGION")
                        .unwrap_or_else(|| DEFAULT_S3_REGION.to_string()),
                    endpoint_url,
                    prefix: env
                        .get("S3_PREFIX")
                        .unwrap_or_else(|| DEFAULT_S3_PREFIX.to_string())
                        .trim_matches('/')
                        .to_string(),
                    access_key_id: env.get("AWS_ACCESS_KEY_ID"),
                    secret_access_key: env.get("AWS_SECRET_ACCESS_KEY").map(SecretString::from),
                }))
            }
            other => Err(ConfigError::InvalidEnvVar(
                "STORAGE_BACKEND".to_string(),
                format!("expected 'local' or 's3', got '{other}'"),
            )),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable source with the lookup helpers used above.
struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get an optional variable, treating empty values as unset.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}

/// Validate the base URL and strip a trailing slash.
fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar("GARAGE_BASE_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "GARAGE_BASE_URL".to_string(),
            "must be an http or https URL".to_string(),
        ));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_development_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.database_url.expose_secret(), DEFAULT_DEV_DATABASE_URL);
        assert_eq!(config.port, 5000);
        assert_eq!(config.base_url, "http://localhost:5000");
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(matches!(config.storage, StorageConfig::Local { .. }));
        assert!(!config.is_secure());
    }

    #[test]
    fn test_production_requires_database_url() {
        let err = load(&[("GARAGE_ENV", "production")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "DATABASE_URL"));
    }

    #[test]
    fn test_production_defaults_to_s3_and_requires_bucket() {
        let err = load(&[
            ("GARAGE_ENV", "production"),
            ("DATABASE_URL", "sqlite:///var/lib/garage.db"),
            ("GARAGE_BASE_URL", "https://garage.example.com"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "S3_BUCKET_NAME"));
    }

    #[test]
    fn test_production_full() {
        let config = load(&[
            ("GARAGE_ENV", "production"),
            ("DATABASE_URL", "sqlite:///var/lib/garage.db"),
            ("GARAGE_BASE_URL", "https://garage.example.com/"),
            ("S3_BUCKET_NAME", "boxes"),
            ("S3_PREFIX", "/photos/"),
        ])
        .unwrap();
        assert_eq!(config.base_url, "https://garage.example.com");
        assert!(config.is_secure());
        assert_eq!(config.log_format, LogFormat::Json);
        let StorageConfig::S3(s3) = config.storage else {
            panic!("expected s3 storage");
        };
        assert_eq!(s3.bucket, "boxes");
        assert_eq!(s3.region, "eu-west-2");
        assert_eq!(s3.prefix, "photos");
    }

    #[test]
    fn test_invalid_storage_backend() {
        let err = load(&[("STORAGE_BACKEND", "ftp")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "STORAGE_BACKEND"));
    }

    #[test]
    fn test_invalid_port() {
        let err = load(&[("GARAGE_PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "GARAGE_PORT"));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let err = load(&[("GARAGE_BASE_URL", "ftp://example.com")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "GARAGE_BASE_URL"));
    }

    #[test]
    fn test_s3_config_debug_redacts_secret() {
        let config = load(&[
            ("STORAGE_BACKEND", "s3"),
            ("S3_BUCKET_NAME", "boxes"),
            ("AWS_ACCESS_KEY_ID", "AKIAEXAMPLE"),
            ("AWS_SECRET_ACCESS_KEY", "super_secret_value"),
        ])
        .unwrap();
        let debug_output = format!("{:?}", config.storage);
        assert!(debug_output.contains("AKIAEXAMPLE"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_value"));
    }

    #[test]
    fn test_socket_addr() {
        let config = load(&[("GARAGE_HOST", "0.0.0.0"), ("GARAGE_PORT", "8080")]).unwrap();
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "0.0.0.0");
        assert_eq!(addr.port(), 8080);
    }
}
