// SPDX-License-Identifier: MIT

//! Persistent key-value state shim.
//!
//! Keys are looked up as files under the state directory first, then as
//! (uppercased) environment variables. Writes always go to the file. There
//! is no atomicity and no protection against concurrent writers; the store
//! holds a handful of small blobs (OAuth client config, cached credential)
//! for a single-instance deployment.

use crate::error::AppError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Well-known state keys.
pub mod keys {
    /// HMAC key for signing the OAuth state parameter.
    pub const SECRET_KEY: &str = "secret_key";
    /// Target spreadsheet id.
    pub const SHEET_ID: &str = "sheet_id";
    /// Google OAuth client config (client_secret.json contents).
    pub const CLIENT_SECRET: &str = "client_secret";
    /// Versioned cached sheet handle (credential + watch channel).
    pub const SHEET: &str = "sheet";
}

/// File/environment-backed key-value store.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Read a key: file under the state dir, falling back to the uppercased
    /// environment variable. A missing key is `None`, not an error.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AppError> {
        match std::fs::read(self.dir.join(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Ok(std::env::var(key.to_uppercase()).ok().map(String::into_bytes))
            }
            Err(e) => Err(AppError::State(format!("failed to read {}: {}", key, e))),
        }
    }

    /// Read a key as trimmed UTF-8 text.
    pub fn get_text(&self, key: &str) -> Result<Option<String>, AppError> {
        match self.get(key)? {
            Some(bytes) => String::from_utf8(bytes)
                .map(|s| Some(s.trim().to_string()))
                .map_err(|_| AppError::State(format!("{} is not valid UTF-8", key))),
            None => Ok(None),
        }
    }

    /// Write a key to the state directory.
    pub fn set(&self, key: &str, data: &[u8]) -> Result<(), AppError> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| AppError::State(format!("failed to create state dir: {}", e)))?;
        std::fs::write(self.dir.join(key), data)
            .map_err(|e| AppError::State(format!("failed to write {}: {}", key, e)))
    }
}
