//! Secret vault - platform-backed at-rest storage for small secret blobs
//!
//! Tokens, stored credentials, and timestamps all live behind this seam.
//! The backing store is treated as fallible with no availability guarantee;
//! the calling component decides whether absence is normal (credential
//! lookup) or exceptional (explicit user action).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::VaultError;

/// Opaque key/value storage for secrets
#[async_trait]
pub trait SecretVault: Send + Sync {
    /// Read a value; `None` means nothing is stored under the key
    async fn get(&self, key: &str) -> Result<Option<String>, VaultError>;

    /// Write a value, replacing any existing one
    async fn set(&self, key: &str, value: &str) -> Result<(), VaultError>;

    /// Remove a value; removing a missing key is not an error
    async fn delete(&self, key: &str) -> Result<(), VaultError>;
}

// ============================================================================
// MemoryVault - in-process storage
// ============================================================================

/// In-process vault
///
/// Clones share the same underlying map, so one instance can back several
/// components within a session.
#[derive(Debug, Clone, Default)]
pub struct MemoryVault {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryVault {
    /// Create an empty vault
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretVault for MemoryVault {
    async fn get(&self, key: &str) -> Result<Option<String>, VaultError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| VaultError::Unavailable("poisoned lock".into()))?;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), VaultError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| VaultError::Unavailable("poisoned lock".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), VaultError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| VaultError::Unavailable("poisoned lock".into()))?;
        entries.remove(key);
        Ok(())
    }
}

// ============================================================================
// FileVault - one blob file per key
// ============================================================================

/// File-backed vault, one blob file per key under a base directory
///
/// Values are stored verbatim. This mirror is scoped to the current
/// run/session; callers are expected to clear it at session boundaries.
#[derive(Debug, Clone)]
pub struct FileVault {
    dir: PathBuf,
}

impl FileVault {
    /// Create a vault rooted at the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Ensure the base directory exists
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)
    }

    /// Get the base directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.secret"))
    }
}

#[async_trait]
impl SecretVault for FileVault {
    async fn get(&self, key: &str) -> Result<Option<String>, VaultError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&path)?))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), VaultError> {
        self.ensure_dir()?;
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), VaultError> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}
