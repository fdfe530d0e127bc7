//! Server configuration module
//! Loads every process-wide setting once at startup. The resulting
//! `AppConfig` is shared read-only with each component.

use crate::constants::{
    DEFAULT_HASH_ITERATIONS, DEFAULT_HASH_MEMORY_KIB, DEFAULT_HOST, DEFAULT_MAX_UPLOAD_BYTES,
    DEFAULT_PORT, DEFAULT_SMTP_HOST, DEFAULT_TOKEN_TTL_HOURS, DEFAULT_UPLOAD_DIR,
    MAX_TOKEN_TTL_HOURS, MAX_UPLOAD_BYTES_LIMIT, MIN_SECRET_LENGTH,
};
use crate::error::{RegistryError, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// SMTP credentials for the outbound mail collaborator
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub username: String,
    pub password: String,
}

/// Server configuration parameters
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// JWT secret for token signing/validation
    pub jwt_secret: String,
    /// Lifetime of issued tokens and of the login cookie
    pub token_ttl: Duration,
    /// Argon2 work factor: memory in KiB and iteration count
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
    /// JSON snapshot backing the account store; `None` keeps accounts in memory only
    pub store_path: Option<PathBuf>,
    /// Where passport images are written and served from
    pub upload_dir: PathBuf,
    pub max_upload_bytes: u64,
    /// Browser origin allowed to call the API with credentials
    pub cors_origin: Option<String>,
    /// Absent credentials fall back to a log-only mailer
    pub mail: Option<MailConfig>,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
    pub enable_tls: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        panic!("AppConfig::default() is not allowed for security reasons. Use AppConfig::from_env() instead.");
    }
}

fn var_with_fallback(prefixed: &str, plain: &str) -> Option<String> {
    env::var(prefixed).or_else(|_| env::var(plain)).ok()
}

fn flag(name: &str) -> bool {
    env::var(name)
        .map(|v| v.to_lowercase() == "true" || v == "1")
        .unwrap_or(false)
}

impl AppConfig {
    /// Create a test configuration - DANGEROUS: Only for testing!
    pub fn for_testing() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            jwt_secret: "test-jwt-key-only-for-unit-tests-never-use-in-production-42".to_string(),
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_HOURS * 3600),
            // Cheap hashing keeps the test suite fast
            hash_memory_kib: 1024,
            hash_iterations: 1,
            store_path: None,
            upload_dir: env::temp_dir().join("school-registry-test-uploads"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cors_origin: None,
            mail: None,
            tls_cert_path: None,
            tls_key_path: None,
            enable_tls: false,
        }
    }

    /// Validate that the signing secret meets security requirements
    pub fn validate_jwt_secret(secret: &str) -> Result<()> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(RegistryError::ConfigError(format!(
                "JWT secret must be at least {} characters long",
                MIN_SECRET_LENGTH
            )));
        }

        // Check for insecure default or example values
        let insecure_patterns = [
            "your-default-secret-key",
            "your-secret-key",
            "change-this",
            "changeme",
            "secret",
            "default",
            "password",
            "12345",
        ];

        let lowered = secret.to_lowercase();
        for pattern in &insecure_patterns {
            if lowered.contains(pattern) {
                return Err(RegistryError::ConfigError(format!(
                    "JWT secret contains insecure pattern '{}'. Please use a secure random value generated with: openssl rand -base64 32",
                    pattern
                )));
            }
        }

        // Ensure some complexity
        if secret.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(RegistryError::ConfigError(
                "JWT secret should contain mixed characters (letters, numbers, symbols) for security".to_string(),
            ));
        }

        Ok(())
    }

    /// Checks that `origin` is `scheme://host[:port]` and returns it without a
    /// trailing slash
    pub fn validate_cors_origin(origin: &str) -> Result<String> {
        let origin = origin.trim().trim_end_matches('/');
        let invalid = || {
            RegistryError::ConfigError(format!(
                "SCHOOL_REGISTRY_CORS_ORIGIN must look like https://host[:port], got '{}'",
                origin
            ))
        };

        let uri: warp::http::Uri = origin.parse().map_err(|_| invalid())?;
        let scheme_ok = matches!(uri.scheme_str(), Some("http") | Some("https"));
        let bare = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("");
        if !scheme_ok || uri.authority().is_none() || !(bare.is_empty() || bare == "/") {
            return Err(invalid());
        }
        Ok(origin.to_string())
    }

    /// Token lifetime for `hours`, bounded by `MAX_TOKEN_TTL_HOURS`
    pub fn token_ttl_from_hours(hours: u64) -> Result<Duration> {
        if hours > MAX_TOKEN_TTL_HOURS {
            return Err(RegistryError::ConfigError(format!(
                "SCHOOL_REGISTRY_TOKEN_TTL_HOURS must be at most {}",
                MAX_TOKEN_TTL_HOURS
            )));
        }
        Ok(Duration::from_secs(hours * 3600))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let host = env::var("SCHOOL_REGISTRY_HOST").unwrap_or(DEFAULT_HOST.to_string());
        let port = var_with_fallback("SCHOOL_REGISTRY_PORT", "PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        // No fallback key: a guessable signing key is worse than not starting
        let jwt_secret = var_with_fallback("SCHOOL_REGISTRY_JWT_SECRET", "JWT_SECRET")
            .ok_or_else(|| {
                RegistryError::ConfigError(
                    "JWT_SECRET environment variable is required for security. \
                     Generate one with: openssl rand -base64 32"
                        .to_string(),
                )
            })?;
        Self::validate_jwt_secret(&jwt_secret)?;

        let ttl_hours = env::var("SCHOOL_REGISTRY_TOKEN_TTL_HOURS")
            .ok()
            .and_then(|t| t.parse::<u64>().ok())
            .filter(|t| *t > 0)
            .unwrap_or(DEFAULT_TOKEN_TTL_HOURS);
        let token_ttl = Self::token_ttl_from_hours(ttl_hours)?;

        let hash_memory_kib = env::var("SCHOOL_REGISTRY_HASH_MEMORY_KIB")
            .ok()
            .and_then(|m| m.parse().ok())
            .unwrap_or(DEFAULT_HASH_MEMORY_KIB);

        let hash_iterations = env::var("SCHOOL_REGISTRY_HASH_ITERATIONS")
            .ok()
            .and_then(|i| i.parse().ok())
            .unwrap_or(DEFAULT_HASH_ITERATIONS);

        let store_path = var_with_fallback("SCHOOL_REGISTRY_STORE_PATH", "STORE_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let upload_dir = env::var("SCHOOL_REGISTRY_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOAD_DIR));

        let max_upload_bytes = env::var("SCHOOL_REGISTRY_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|b| b.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        if max_upload_bytes > MAX_UPLOAD_BYTES_LIMIT {
            return Err(RegistryError::ConfigError(format!(
                "SCHOOL_REGISTRY_MAX_UPLOAD_BYTES must be at most {}",
                MAX_UPLOAD_BYTES_LIMIT
            )));
        }

        let cors_origin = match env::var("SCHOOL_REGISTRY_CORS_ORIGIN") {
            Ok(origin) if !origin.trim().is_empty() => Some(Self::validate_cors_origin(&origin)?),
            _ => None,
        };

        let mail = match (env::var("EMAIL_USERNAME"), env::var("EMAIL_PASSWORD")) {
            (Ok(username), Ok(password)) if !username.is_empty() => Some(MailConfig {
                smtp_host: env::var("SCHOOL_REGISTRY_SMTP_HOST")
                    .unwrap_or(DEFAULT_SMTP_HOST.to_string()),
                username,
                password,
            }),
            _ => None,
        };

        // TLS configuration
        let enable_tls = flag("SCHOOL_REGISTRY_ENABLE_TLS");
        let tls_cert_path = env::var("SCHOOL_REGISTRY_TLS_CERT_PATH").ok();
        let tls_key_path = env::var("SCHOOL_REGISTRY_TLS_KEY_PATH").ok();

        if enable_tls {
            match (&tls_cert_path, &tls_key_path) {
                (Some(cert_path), Some(key_path)) => {
                    if !std::path::Path::new(cert_path).exists() {
                        return Err(RegistryError::ConfigError(format!(
                            "TLS certificate file does not exist: {}",
                            cert_path
                        )));
                    }
                    if !std::path::Path::new(key_path).exists() {
                        return Err(RegistryError::ConfigError(format!(
                            "TLS private key file does not exist: {}",
                            key_path
                        )));
                    }
                }
                _ => {
                    return Err(RegistryError::ConfigError(
                        "TLS is enabled but SCHOOL_REGISTRY_TLS_CERT_PATH or SCHOOL_REGISTRY_TLS_KEY_PATH is not set".to_string(),
                    ));
                }
            }
        }

        Ok(Self {
            host,
            port,
            jwt_secret,
            token_ttl,
            hash_memory_kib,
            hash_iterations,
            store_path,
            upload_dir,
            max_upload_bytes,
            cors_origin,
            mail,
            tls_cert_path,
            tls_key_path,
            enable_tls,
        })
    }
}
