//! Credential check and token issuance

use std::sync::Arc;
use std::time::Duration;

use crate::auth::password::PasswordHasher;
use crate::auth::role::Role;
use crate::auth::token::TokenManager;
use crate::error::{RegistryError, Result};
use crate::registry::validation::normalize_email;
use crate::security::AuthTimer;
use crate::storage::AccountStorage;

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub email: String,
    pub token: String,
    pub role: Role,
}

pub struct LoginService {
    store: Arc<dyn AccountStorage>,
    hasher: PasswordHasher,
    tokens: Arc<TokenManager>,
    min_duration: Duration,
    /// Verified against when the email is unknown, so both failure paths
    /// cost one hash verification
    dummy_hash: String,
}

impl LoginService {
    pub fn new(
        store: Arc<dyn AccountStorage>,
        hasher: PasswordHasher,
        tokens: Arc<TokenManager>,
        min_duration: Duration,
    ) -> Result<Self> {
        let dummy_hash = hasher.hash("placeholder-for-unknown-accounts")?;
        Ok(Self {
            store,
            hasher,
            tokens,
            min_duration,
            dummy_hash,
        })
    }

    /// Checks credentials and issues a token.
    ///
    /// Unknown email and wrong password both fail with `InvalidCredentials`
    /// after the same minimum duration.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let timer = AuthTimer::new(self.min_duration);
        let result = self.attempt(email, password).await;
        timer.wait().await;
        result
    }

    async fn attempt(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let email = normalize_email(email);
        let account = self.store.find_by_email(&email).await?;

        let stored_hash = account
            .as_ref()
            .map(|a| a.password_hash.clone())
            .unwrap_or_else(|| self.dummy_hash.clone());

        let hasher = self.hasher.clone();
        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored_hash))
            .await
            .map_err(|e| RegistryError::HashingError(format!("Verify task failed: {}", e)))?;

        match account {
            Some(account) if matches => {
                let token = self.tokens.issue(&account.email, account.role)?;
                Ok(LoginOutcome {
                    email: account.email,
                    token,
                    role: account.role,
                })
            }
            _ => Err(RegistryError::InvalidCredentials),
        }
    }
}
