//! Account creation
//!
//! Every path that creates an account runs the same pipeline: validate,
//! hash, then a single conditional insert that enforces email uniqueness.

use std::sync::Arc;

use crate::auth::password::PasswordHasher;
use crate::auth::role::Role;
use crate::error::{RegistryError, Result};
use crate::registry::validation::{validate_registration, RegistrationRequest, RoleRule};
use crate::storage::{AccountDraft, AccountStorage, AccountView};

/// Hashes on the blocking pool so a slow hash never stalls the reactor
pub(crate) async fn hash_blocking(hasher: &PasswordHasher, password: String) -> Result<String> {
    let hasher = hasher.clone();
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| RegistryError::HashingError(format!("Hashing task failed: {}", e)))?
}

/// Creates accounts
#[derive(Clone)]
pub struct Registrar {
    store: Arc<dyn AccountStorage>,
    hasher: PasswordHasher,
}

impl Registrar {
    pub fn new(store: Arc<dyn AccountStorage>, hasher: PasswordHasher) -> Self {
        Self { store, hasher }
    }

    /// Public self-registration; the payload chooses the role
    pub async fn register(
        &self,
        request: RegistrationRequest,
        passport_image: Option<String>,
    ) -> Result<AccountView> {
        self.create(request, RoleRule::Required, passport_image).await
    }

    /// Public admin registration; the role is always admin
    pub async fn register_admin(&self, request: RegistrationRequest) -> Result<AccountView> {
        self.create(request, RoleRule::Forced(Role::Admin), None).await
    }

    /// Admin-initiated student creation
    pub async fn add_student(&self, request: RegistrationRequest) -> Result<AccountView> {
        self.create(request, RoleRule::Forced(Role::Student), None).await
    }

    /// Admin-initiated admin creation
    pub async fn add_admin(&self, request: RegistrationRequest) -> Result<AccountView> {
        self.create(request, RoleRule::Forced(Role::Admin), None).await
    }

    async fn create(
        &self,
        request: RegistrationRequest,
        rule: RoleRule,
        passport_image: Option<String>,
    ) -> Result<AccountView> {
        let valid = validate_registration(request, rule)?;

        // Cheap pre-check so duplicates skip the hash. Not relied upon:
        // the insert below is what enforces uniqueness.
        if self.store.find_by_email(&valid.email).await?.is_some() {
            return Err(RegistryError::DuplicateAccount);
        }

        let password_hash = hash_blocking(&self.hasher, valid.password).await?;

        let mut profile = valid.profile;
        profile.passport_image = passport_image;

        let account = self
            .store
            .insert(AccountDraft {
                email: valid.email,
                password_hash,
                role: valid.role,
                profile,
            })
            .await?;

        log::info!("Registered {} account {}", account.role, account.id);
        Ok(account.into())
    }
}
