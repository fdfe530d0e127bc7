//! Components shared by every request handler

use std::sync::Arc;
use std::time::Duration;

use crate::auth::password::PasswordHasher;
use crate::auth::token::TokenManager;
use crate::config::AppConfig;
use crate::constants::LOGIN_MIN_DURATION_MS;
use crate::error::Result;
use crate::mail::{mailer_from_config, Mailer};
use crate::registry::{Directory, LoginService, Registrar};
use crate::security_logger::SecurityLogger;
use crate::storage::{AccountStorage, MemoryAccountStore};
use crate::uploads::UploadStore;

/// Everything a handler needs, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn AccountStorage>,
    pub tokens: Arc<TokenManager>,
    pub registrar: Registrar,
    pub login: Arc<LoginService>,
    pub directory: Directory,
    pub mailer: Arc<dyn Mailer>,
    pub security: Arc<SecurityLogger>,
    pub uploads: UploadStore,
}

impl AppState {
    /// Wires the components around an existing store and mailer
    pub fn new(
        config: AppConfig,
        store: Arc<dyn AccountStorage>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self> {
        let config = Arc::new(config);
        let hasher = PasswordHasher::from_config(&config)?;
        let tokens = Arc::new(TokenManager::from_config(&config));

        let login = LoginService::new(
            store.clone(),
            hasher.clone(),
            tokens.clone(),
            Duration::from_millis(LOGIN_MIN_DURATION_MS),
        )?;

        Ok(Self {
            registrar: Registrar::new(store.clone(), hasher.clone()),
            directory: Directory::new(store.clone(), hasher),
            login: Arc::new(login),
            uploads: UploadStore::new(config.upload_dir.clone()),
            security: Arc::new(SecurityLogger::new()),
            tokens,
            store,
            mailer,
            config,
        })
    }

    /// Opens the configured store and mailer
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let store: Arc<dyn AccountStorage> = match config.store_path {
            Some(ref path) => {
                log::info!("Using account snapshot at {}", path.display());
                Arc::new(MemoryAccountStore::open(path).await?)
            }
            None => {
                log::warn!("No store path configured, accounts are kept in memory only");
                Arc::new(MemoryAccountStore::new())
            }
        };
        let mailer = mailer_from_config(&config)?;
        Self::new(config, store, mailer)
    }
}
