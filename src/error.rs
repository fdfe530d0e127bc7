use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::sync::PoisonError;
use warp::http::StatusCode;

/// A single rejected field of an incoming account payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub enum RegistryError {
    // Payload errors
    ValidationFailed(Vec<FieldError>),
    UploadError(String),

    // Account errors
    DuplicateAccount,
    NotFound(String),

    // Auth errors
    InvalidCredentials,
    TokenMissing,
    TokenInvalid,
    TokenExpired,
    PermissionDenied,

    // Internal errors
    PersistenceFailed(String),
    HashingError(String),
    MailError(String),

    // Configuration errors
    ConfigError(String),
}

impl RegistryError {
    /// HTTP status the error is surfaced with
    pub fn status(&self) -> StatusCode {
        match self {
            Self::ValidationFailed(_) | Self::UploadError(_) | Self::DuplicateAccount => {
                StatusCode::BAD_REQUEST
            }
            Self::InvalidCredentials | Self::TokenMissing => StatusCode::UNAUTHORIZED,
            Self::TokenInvalid | Self::TokenExpired | Self::PermissionDenied => {
                StatusCode::FORBIDDEN
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::PersistenceFailed(_)
            | Self::HashingError(_)
            | Self::MailError(_)
            | Self::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to the caller. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::ValidationFailed(_) => "Invalid registration data".to_string(),
            Self::UploadError(msg) => msg.clone(),
            Self::DuplicateAccount => "User already exists. Please log in.".to_string(),
            Self::NotFound(what) => format!("{} not found", what),
            Self::InvalidCredentials => "Invalid credentials".to_string(),
            Self::TokenMissing => "Access denied. Token missing.".to_string(),
            Self::TokenInvalid => "Access denied. Invalid token.".to_string(),
            Self::TokenExpired => "Access denied. Token expired.".to_string(),
            Self::PermissionDenied => "Permission denied".to_string(),
            Self::PersistenceFailed(_) => "Error accessing the database".to_string(),
            Self::HashingError(_) | Self::ConfigError(_) => "Internal server error".to_string(),
            Self::MailError(_) => "Error sending email".to_string(),
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(fields) => {
                let names: Vec<&str> = fields.iter().map(|e| e.field.as_str()).collect();
                write!(f, "Validation failed: {}", names.join(", "))
            }
            Self::UploadError(msg) => write!(f, "Upload error: {}", msg),
            Self::DuplicateAccount => write!(f, "Account with this email already exists"),
            Self::NotFound(what) => write!(f, "Not found: {}", what),
            Self::InvalidCredentials => write!(f, "Invalid credentials"),
            Self::TokenMissing => write!(f, "Token missing"),
            Self::TokenInvalid => write!(f, "Token invalid"),
            Self::TokenExpired => write!(f, "Token expired"),
            Self::PermissionDenied => write!(f, "Permission denied"),
            Self::PersistenceFailed(msg) => write!(f, "Persistence error: {}", msg),
            Self::HashingError(msg) => write!(f, "Hashing error: {}", msg),
            Self::MailError(msg) => write!(f, "Mail error: {}", msg),
            Self::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for RegistryError {}

impl warp::reject::Reject for RegistryError {}

// Poisoned locks only happen after a panic while persisting
impl<T> From<PoisonError<T>> for RegistryError {
    fn from(err: PoisonError<T>) -> Self {
        RegistryError::PersistenceFailed(format!("Lock poisoned: {}", err))
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        RegistryError::PersistenceFailed(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
