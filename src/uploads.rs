//! Passport image storage on the local filesystem

use rand::Rng;
use std::path::PathBuf;

use crate::error::{RegistryError, Result};

const MAX_NAME_LENGTH: usize = 100;

/// Keeps `[A-Za-z0-9._-]`, replaces the rest, and never yields a path
/// component that escapes the upload directory
pub fn sanitize_file_name(original: &str) -> String {
    // Browsers on Windows may send a full path
    let base = original.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or("");

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LENGTH)
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Writes an upload and returns the stored file name
    /// `<unix millis>-<9 random digits>-<sanitised name>`
    pub async fn save(&self, original_name: &str, bytes: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
        let name = format!(
            "{}-{:09}-{}",
            chrono::Utc::now().timestamp_millis(),
            suffix,
            sanitize_file_name(original_name)
        );

        tokio::fs::write(self.dir.join(&name), bytes)
            .await
            .map_err(|e| RegistryError::UploadError(format!("Failed to store upload: {}", e)))?;

        log::debug!("Stored upload {} ({} bytes)", name, bytes.len());
        Ok(name)
    }

    /// Removes a stored upload. Missing files are not an error.
    pub async fn remove(&self, name: &str) {
        let path = self.dir.join(sanitize_file_name(name));
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove upload {}: {}", path.display(), e);
            }
        }
    }
}
