//! Read, search, update and delete over the account collection

use regex::{Regex, RegexBuilder};
use std::sync::Arc;

use crate::auth::password::PasswordHasher;
use crate::auth::role::Role;
use crate::auth::token::Claims;
use crate::error::{FieldError, RegistryError, Result};
use crate::registry::registration::hash_blocking;
use crate::registry::validation::{validate_update, StudentUpdateRequest};
use crate::storage::{
    Account, AccountFilter, AccountPatch, AccountStorage, AccountView, SearchField,
};

const MAX_SEARCH_TERM_LENGTH: usize = 256;
const SEARCH_REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Fields matched by the admin listing
const ALL_DATA_FIELDS: &[SearchField] = &[
    SearchField::Email,
    SearchField::Name,
    SearchField::PhoneNumber,
    SearchField::ClassName,
    SearchField::Address,
];

/// Fields matched by the general search
const SEARCH_FIELDS: &[SearchField] = &[SearchField::Name, SearchField::ClassName];

/// Compiles a case-insensitive search pattern.
///
/// A term that is not a valid pattern is matched literally. An absent term
/// matches everything.
pub fn search_pattern(term: Option<&str>) -> Result<Regex> {
    let term = term.unwrap_or("");
    if term.chars().count() > MAX_SEARCH_TERM_LENGTH {
        return Err(RegistryError::ValidationFailed(vec![FieldError::new(
            "searchTerm",
            format!("Search term must be at most {} characters", MAX_SEARCH_TERM_LENGTH),
        )]));
    }

    let build = |pattern: &str| {
        RegexBuilder::new(pattern)
            .case_insensitive(true)
            .size_limit(SEARCH_REGEX_SIZE_LIMIT)
            .build()
    };

    match build(term) {
        Ok(regex) => Ok(regex),
        Err(e) => {
            log::debug!("Search term is not a pattern ({}), matching literally", e);
            build(&regex::escape(term)).map_err(|e| {
                RegistryError::ValidationFailed(vec![FieldError::new(
                    "searchTerm",
                    format!("Unusable search term: {}", e),
                )])
            })
        }
    }
}

fn views(accounts: Vec<Account>) -> Vec<AccountView> {
    accounts.into_iter().map(AccountView::from).collect()
}

#[derive(Clone)]
pub struct Directory {
    store: Arc<dyn AccountStorage>,
    hasher: PasswordHasher,
}

impl Directory {
    pub fn new(store: Arc<dyn AccountStorage>, hasher: PasswordHasher) -> Self {
        Self { store, hasher }
    }

    /// The caller's own record. `None` when the account no longer exists.
    pub async fn student_data(&self, claims: &Claims) -> Result<Option<AccountView>> {
        claims.require_role(Role::Student)?;
        let account = self.store.find_by_email(claims.email()).await?;
        Ok(account.map(AccountView::from))
    }

    /// Every account, optionally filtered over email, name, number, class
    /// and address
    pub async fn all_data(&self, claims: &Claims, term: Option<&str>) -> Result<Vec<AccountView>> {
        claims.require_role(Role::Admin)?;
        let filter = AccountFilter::pattern(search_pattern(term)?, ALL_DATA_FIELDS);
        Ok(views(self.store.find(&filter).await?))
    }

    /// Accounts whose name or class matches the term
    pub async fn search(&self, term: Option<&str>) -> Result<Vec<AccountView>> {
        let filter = AccountFilter::pattern(search_pattern(term)?, SEARCH_FIELDS);
        Ok(views(self.store.find(&filter).await?))
    }

    /// Administrative update. A supplied password is hashed before it is
    /// stored.
    pub async fn update_student(
        &self,
        claims: &Claims,
        id: &str,
        request: StudentUpdateRequest,
    ) -> Result<AccountView> {
        claims.require_role(Role::Admin)?;
        let update = validate_update(request)?;

        let password_hash = match update.password {
            Some(password) => Some(hash_blocking(&self.hasher, password).await?),
            None => None,
        };

        let patch = AccountPatch {
            email: update.email,
            password_hash,
            name: update.name,
            phone_number: update.phone_number,
            class_name: update.class_name,
            address: update.address,
        };

        // Nothing to change; still report unknown ids
        if patch.is_empty() {
            return self
                .store
                .find_by_id(id)
                .await?
                .map(AccountView::from)
                .ok_or_else(|| RegistryError::NotFound("Student".to_string()));
        }

        let account = self.store.update(id, patch).await?;
        log::info!("Account {} updated by {}", account.id, claims.email());
        Ok(account.into())
    }

    /// Administrative delete. Fails with `NotFound` for an unknown id.
    pub async fn remove_student(&self, claims: &Claims, id: &str) -> Result<AccountView> {
        claims.require_role(Role::Admin)?;
        let account = self.store.delete(id).await?;
        log::info!("Account {} removed by {}", account.id, claims.email());
        Ok(account.into())
    }

    pub async fn all_classes(&self) -> Result<Vec<String>> {
        self.store.distinct_classes().await
    }

    pub async fn students_of_class(&self, class_name: &str) -> Result<Vec<AccountView>> {
        Ok(views(self.store.find(&AccountFilter::class(class_name)).await?))
    }
}
