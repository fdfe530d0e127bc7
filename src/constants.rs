// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const UPLOADS_PATH: &str = "uploads";
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";

// Upload limits
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;
/// Headroom for the text fields that travel alongside the image in one form
pub const MULTIPART_FIELD_OVERHEAD: u64 = 64 * 1024;
pub const JSON_BODY_LIMIT: u64 = 64 * 1024;
pub const MAX_UPLOAD_BYTES_LIMIT: u64 = 1024 * 1024 * 1024;

// Token lifetime, applied to both the JWT and the login cookie
pub const DEFAULT_TOKEN_TTL_HOURS: u64 = 24;
pub const MAX_TOKEN_TTL_HOURS: u64 = 24 * 365;
pub const TOKEN_COOKIE_NAME: &str = "token";

// Argon2id work factor (the argon2 crate's recommended defaults)
pub const DEFAULT_HASH_MEMORY_KIB: u32 = 19 * 1024;
pub const DEFAULT_HASH_ITERATIONS: u32 = 2;

// Account validation rules
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MIN_PHONE_LENGTH: usize = 10;
pub const MIN_SECRET_LENGTH: usize = 32;

// Login responses never complete faster than this
pub const LOGIN_MIN_DURATION_MS: u64 = 100;

pub const LOGIN_LINK: &str = "/login";
