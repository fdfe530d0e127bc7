//! Abstract storage interface for the account collection
//!
//! Every backend enforces email uniqueness itself, inside the same critical
//! section as the write. Callers never check-then-insert.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::auth::role::Role;
use crate::error::Result;

/// Descriptive attributes of an account. None of them carry integrity rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Phone number; the wire name is kept for existing clients
    #[serde(default, rename = "number", skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, rename = "class", skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub father_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mother_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthdate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// File name under the upload directory
    #[serde(default)]
    pub passport_image: Option<String>,
}

/// A persisted account record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Surrogate id, used by the administrative update/delete operations
    #[serde(rename = "_id")]
    pub id: String,
    /// Natural key, unique across the collection
    pub email: String,
    #[serde(rename = "passwordHash")]
    pub password_hash: String,
    pub role: Role,
    #[serde(flatten)]
    pub profile: Profile,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Outward-facing form of an account; never carries the password hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountView {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub role: Role,
    #[serde(flatten)]
    pub profile: Profile,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            email: account.email,
            role: account.role,
            profile: account.profile,
        }
    }
}

/// A validated, hashed account about to be inserted
#[derive(Debug, Clone)]
pub struct AccountDraft {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub profile: Profile,
}

/// In-place administrative update. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub email: Option<String>,
    /// Already hashed; plaintext never reaches the store
    pub password_hash: Option<String>,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub class_name: Option<String>,
    pub address: Option<String>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password_hash.is_none()
            && self.name.is_none()
            && self.phone_number.is_none()
            && self.class_name.is_none()
            && self.address.is_none()
    }

    /// Applies the patch to an account record
    pub fn apply(self, account: &mut Account) {
        if let Some(email) = self.email {
            account.email = email;
        }
        if let Some(hash) = self.password_hash {
            account.password_hash = hash;
        }
        if let Some(name) = self.name {
            account.profile.name = Some(name);
        }
        if let Some(number) = self.phone_number {
            account.profile.phone_number = Some(number);
        }
        if let Some(class_name) = self.class_name {
            account.profile.class_name = Some(class_name);
        }
        if let Some(address) = self.address {
            account.profile.address = Some(address);
        }
    }
}

/// Searchable account fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Email,
    Name,
    PhoneNumber,
    ClassName,
    Address,
}

impl SearchField {
    fn value<'a>(&self, account: &'a Account) -> Option<&'a str> {
        match self {
            SearchField::Email => Some(account.email.as_str()),
            SearchField::Name => account.profile.name.as_deref(),
            SearchField::PhoneNumber => account.profile.phone_number.as_deref(),
            SearchField::ClassName => account.profile.class_name.as_deref(),
            SearchField::Address => account.profile.address.as_deref(),
        }
    }
}

/// Query over the account collection
#[derive(Debug, Clone, Default)]
pub struct AccountFilter {
    /// Matches when the pattern hits any of `fields`. Absent fields never match.
    pub pattern: Option<(Regex, Vec<SearchField>)>,
    /// Exact class name
    pub class_name: Option<String>,
}

impl AccountFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn pattern(regex: Regex, fields: &[SearchField]) -> Self {
        Self {
            pattern: Some((regex, fields.to_vec())),
            class_name: None,
        }
    }

    pub fn class(class_name: impl Into<String>) -> Self {
        Self {
            pattern: None,
            class_name: Some(class_name.into()),
        }
    }

    pub fn matches(&self, account: &Account) -> bool {
        if let Some(ref class_name) = self.class_name {
            if account.profile.class_name.as_deref() != Some(class_name.as_str()) {
                return false;
            }
        }

        match self.pattern {
            Some((ref regex, ref fields)) => fields
                .iter()
                .filter_map(|field| field.value(account))
                .any(|value| regex.is_match(value)),
            None => true,
        }
    }
}

/// Account storage interface
#[async_trait]
pub trait AccountStorage: Send + Sync {
    /// Inserts a new account. Fails with `DuplicateAccount` if the email is
    /// taken; the check and the write are one atomic step.
    async fn insert(&self, draft: AccountDraft) -> Result<Account>;

    /// Get account by surrogate id
    async fn find_by_id(&self, id: &str) -> Result<Option<Account>>;

    /// Get account by email
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Accounts matching a filter, in insertion order
    async fn find(&self, filter: &AccountFilter) -> Result<Vec<Account>>;

    /// Updates an account in place. Fails with `NotFound` for an unknown id
    /// and `DuplicateAccount` when the new email belongs to another account.
    async fn update(&self, id: &str, patch: AccountPatch) -> Result<Account>;

    /// Deletes an account. Fails with `NotFound` for an unknown id.
    async fn delete(&self, id: &str) -> Result<Account>;

    /// Distinct class names, sorted
    async fn distinct_classes(&self) -> Result<Vec<String>>;

    /// Health check for the storage backend
    async fn health_check(&self) -> Result<bool>;
}
