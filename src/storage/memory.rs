//! In-memory account storage, optionally mirrored to a JSON snapshot file
//!
//! All records live behind a single lock so the uniqueness check and the
//! write that depends on it happen in one critical section. When a snapshot
//! path is configured, every mutation rewrites the snapshot before the lock
//! is released, and the file is loaded back on startup.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::traits::*;
use crate::error::{RegistryError, Result};

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, Account>,
    by_email: HashMap<String, String>, // email -> account id
    order: Vec<String>,
}

impl Inner {
    fn from_records(records: Vec<Account>) -> Self {
        let mut inner = Inner::default();
        for account in records {
            if inner.by_email.contains_key(&account.email) {
                log::warn!(
                    "Snapshot holds a second record for an existing email, skipping id {}",
                    account.id
                );
                continue;
            }
            inner.by_email.insert(account.email.clone(), account.id.clone());
            inner.order.push(account.id.clone());
            inner.accounts.insert(account.id.clone(), account);
        }
        inner
    }

    fn ordered(&self) -> impl Iterator<Item = &Account> {
        self.order.iter().filter_map(|id| self.accounts.get(id))
    }
}

/// In-memory account store
pub struct MemoryAccountStore {
    inner: RwLock<Inner>,
    snapshot: Option<PathBuf>,
}

impl MemoryAccountStore {
    /// A store that lives only as long as the process
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            snapshot: None,
        }
    }

    /// Opens a store backed by a snapshot file, loading it if it exists
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let records: Vec<Account> = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                RegistryError::PersistenceFailed(format!(
                    "Corrupt account snapshot {}: {}",
                    path.display(),
                    e
                ))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        log::info!(
            "Loaded {} accounts from {}",
            records.len(),
            path.display()
        );

        Ok(Self {
            inner: RwLock::new(Inner::from_records(records)),
            snapshot: Some(path),
        })
    }

    /// Writes the current state. Called with the write lock held.
    async fn persist(&self, inner: &Inner) -> Result<()> {
        let Some(ref path) = self.snapshot else {
            return Ok(());
        };

        let records: Vec<&Account> = inner.ordered().collect();
        let bytes = serde_json::to_vec_pretty(&records)
            .map_err(|e| RegistryError::PersistenceFailed(e.to_string()))?;

        write_atomically(path, &bytes).await
    }
}

impl Default for MemoryAccountStore {
    fn default() -> Self {
        Self::new()
    }
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl AccountStorage for MemoryAccountStore {
    async fn insert(&self, draft: AccountDraft) -> Result<Account> {
        let mut inner = self.inner.write().await;

        if inner.by_email.contains_key(&draft.email) {
            return Err(RegistryError::DuplicateAccount);
        }

        let account = Account {
            id: Uuid::new_v4().simple().to_string(),
            email: draft.email,
            password_hash: draft.password_hash,
            role: draft.role,
            profile: draft.profile,
            created_at: Utc::now(),
        };

        inner.by_email.insert(account.email.clone(), account.id.clone());
        inner.order.push(account.id.clone());
        inner.accounts.insert(account.id.clone(), account.clone());

        if let Err(e) = self.persist(&inner).await {
            // Roll back so memory never runs ahead of the snapshot
            inner.by_email.remove(&account.email);
            inner.order.retain(|id| id != &account.id);
            inner.accounts.remove(&account.id);
            return Err(e);
        }

        Ok(account)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Account>> {
        let inner = self.inner.read().await;
        Ok(inner.accounts.get(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        let inner = self.inner.read().await;

        Ok(inner
            .by_email
            .get(email)
            .and_then(|id| inner.accounts.get(id))
            .cloned())
    }

    async fn find(&self, filter: &AccountFilter) -> Result<Vec<Account>> {
        let inner = self.inner.read().await;
        Ok(inner
            .ordered()
            .filter(|account| filter.matches(account))
            .cloned()
            .collect())
    }

    async fn update(&self, id: &str, patch: AccountPatch) -> Result<Account> {
        let mut inner = self.inner.write().await;

        let previous = match inner.accounts.get(id) {
            Some(account) => account.clone(),
            None => return Err(RegistryError::NotFound("Student".to_string())),
        };

        if let Some(ref email) = patch.email {
            if let Some(owner) = inner.by_email.get(email) {
                if owner != id {
                    return Err(RegistryError::DuplicateAccount);
                }
            }
        }

        let mut updated = previous.clone();
        patch.apply(&mut updated);

        inner.by_email.remove(&previous.email);
        inner.by_email.insert(updated.email.clone(), id.to_string());
        inner.accounts.insert(id.to_string(), updated.clone());

        if let Err(e) = self.persist(&inner).await {
            inner.by_email.remove(&updated.email);
            inner.by_email.insert(previous.email.clone(), id.to_string());
            inner.accounts.insert(id.to_string(), previous);
            return Err(e);
        }

        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<Account> {
        let mut inner = self.inner.write().await;

        let removed = match inner.accounts.remove(id) {
            Some(account) => account,
            None => return Err(RegistryError::NotFound("Student".to_string())),
        };
        inner.by_email.remove(&removed.email);
        let position = inner.order.iter().position(|entry| entry == id);
        if let Some(position) = position {
            inner.order.remove(position);
        }

        if let Err(e) = self.persist(&inner).await {
            inner.by_email.insert(removed.email.clone(), removed.id.clone());
            let restore_at = position.unwrap_or(inner.order.len());
            inner.order.insert(restore_at, removed.id.clone());
            inner.accounts.insert(removed.id.clone(), removed);
            return Err(e);
        }

        Ok(removed)
    }

    async fn distinct_classes(&self) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        let classes: BTreeSet<String> = inner
            .accounts
            .values()
            .filter_map(|account| account.profile.class_name.clone())
            .collect();
        Ok(classes.into_iter().collect())
    }

    async fn health_check(&self) -> Result<bool> {
        match self.snapshot {
            Some(ref path) => Ok(path
                .parent()
                .map_or(true, |dir| dir.as_os_str().is_empty() || dir.exists())),
            None => Ok(true),
        }
    }
}
