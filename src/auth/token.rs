use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::auth::role::Role;
use crate::config::AppConfig;
use crate::error::{RegistryError, Result};

/// JWT Claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account email)
    pub sub: String,
    /// Role at the time the token was issued
    pub role: Role,
    /// Expiration time (as UTC timestamp)
    pub exp: u64,
    /// Issued at (as UTC timestamp)
    pub iat: u64,
    /// Not before (as UTC timestamp)
    pub nbf: u64,
}

fn now_secs() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

impl Claims {
    /// Creates claims valid for `ttl` from now
    pub fn new(email: String, role: Role, ttl: Duration) -> Self {
        let now = now_secs();
        Self {
            sub: email,
            role,
            exp: now.saturating_add(ttl.as_secs()),
            iat: now,
            nbf: now,
        }
    }

    pub fn email(&self) -> &str {
        &self.sub
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        now_secs() > self.exp
    }

    /// Fails with `PermissionDenied` unless the token carries `role`
    pub fn require_role(&self, role: Role) -> Result<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(RegistryError::PermissionDenied)
        }
    }
}

/// Issues and verifies signed, time-limited identity tokens
pub struct TokenManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenManager {
    /// Creates a new token manager with a secret
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact, no grace period
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, config.token_ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for an account using the configured lifetime
    pub fn issue(&self, email: &str, role: Role) -> Result<String> {
        self.sign(&Claims::new(email.to_string(), role, self.ttl))
    }

    /// Signs arbitrary claims
    pub fn sign(&self, claims: &Claims) -> Result<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| RegistryError::HashingError(format!("Failed to sign token: {}", e)))
    }

    /// Validates signature and expiry and returns the embedded claims
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => RegistryError::TokenExpired,
                _ => {
                    log::debug!("Token verification failed: {}", e);
                    RegistryError::TokenInvalid
                }
            }
        })?;

        let claims = data.claims;
        if claims.is_expired() {
            return Err(RegistryError::TokenExpired);
        }
        Ok(claims)
    }
}

/// Extracts the token from an Authorization header value.
///
/// Accepts `Bearer <token>` and, for older clients, the bare token.
pub fn extract_bearer_token(auth_header: &str) -> Option<String> {
    let value = auth_header.trim_start();
    let token = match value.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => value[7..].trim(),
        _ => value.trim(),
    };

    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
