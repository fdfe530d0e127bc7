//! Authentication and authorization module

pub mod password;
pub mod role;
pub mod token;

// Re-export main components
pub use password::PasswordHasher;
pub use role::Role;
pub use token::{extract_bearer_token, Claims, TokenManager};
