//! School registry - registration, login and role-gated records for a school
//!
//! This library provides account storage, password hashing, token issuance
//! and the warp filters that expose them over HTTP.

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod registry;
pub mod security;
pub mod security_logger;
pub mod state;
pub mod storage;
pub mod uploads;

// Re-export main components
pub use config::AppConfig;
pub use error::{RegistryError, Result};
pub use state::AppState;
