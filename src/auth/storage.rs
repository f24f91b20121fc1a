//! Durable token storage
//!
//! Handles saving and loading the Taskboard session tokens from
//! ~/.taskboard/credentials.json. Both tokens are always written together.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use crate::Result;
use crate::error::Error;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Taskboard's own access/refresh token pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub access_token: String,
    pub refresh_token: String,
}

impl SessionCredential {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

/// Durable client-side key/value store for the session tokens
pub trait TokenStorage: Send + Sync {
    /// Read the stored pair; `None` unless both tokens are present
    fn load(&self) -> Result<Option<SessionCredential>>;

    /// Write both tokens, replacing any previous pair
    fn store(&self, credential: &SessionCredential) -> Result<()>;

    /// Remove both tokens
    fn clear(&self) -> Result<()>;
}

/// On-disk layout of the credentials file
#[derive(Debug, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(default)]
    access_token: Option<String>,

    #[serde(default)]
    refresh_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,
}

/// Get the default credentials file path
pub fn credentials_path() -> PathBuf {
    crate::config::config_dir().join("credentials.json")
}

/// Tokens kept in a JSON file
#[derive(Debug, Clone)]
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileTokenStorage {
    fn default() -> Self {
        Self::new(credentials_path())
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<SessionCredential>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)?;
        let stored: StoredTokens = match serde_json::from_str(&content) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Ignoring unreadable credentials file {:?}: {}", self.path, e);
                return Ok(None);
            }
        };

        match (stored.access_token, stored.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty() => {
                Ok(Some(SessionCredential::new(access, refresh)))
            }
            _ => {
                tracing::warn!("Ignoring incomplete token pair in {:?}", self.path);
                Ok(None)
            }
        }
    }

    fn store(&self, credential: &SessionCredential) -> Result<()> {
        // Create parent directory
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let stored = StoredTokens {
            access_token: Some(credential.access_token.clone()),
            refresh_token: Some(credential.refresh_token.clone()),
            saved_at: Some(Utc::now()),
        };
        let content = serde_json::to_string_pretty(&stored)?;

        // Write to a sibling file first so a crash never leaves half a pair
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;

        // Set restrictive permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&tmp, perms)?;
        }

        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

/// Tokens kept in memory, keyed like the on-disk file
#[derive(Debug, Default)]
pub struct MemoryTokenStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw lookup of a single key
    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().ok()?.get(key).cloned()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Storage("token storage lock poisoned".to_string()))
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<SessionCredential>> {
        let entries = self.lock()?;
        match (entries.get(ACCESS_TOKEN_KEY), entries.get(REFRESH_TOKEN_KEY)) {
            (Some(access), Some(refresh)) => Ok(Some(SessionCredential::new(access.clone(), refresh.clone()))),
            _ => Ok(None),
        }
    }

    fn store(&self, credential: &SessionCredential) -> Result<()> {
        let mut entries = self.lock()?;
        entries.insert(ACCESS_TOKEN_KEY.to_string(), credential.access_token.clone());
        entries.insert(REFRESH_TOKEN_KEY.to_string(), credential.refresh_token.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.lock()?;
        entries.remove(ACCESS_TOKEN_KEY);
        entries.remove(REFRESH_TOKEN_KEY);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_storage(dir: &TempDir) -> FileTokenStorage {
        FileTokenStorage::new(dir.path().join("nested").join("credentials.json"))
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = file_storage(&dir);
        assert!(storage.load().unwrap().is_none());

        let cred = SessionCredential::new("access", "refresh");
        storage.store(&cred).unwrap();

        // A fresh handle reads what the first one wrote
        let reopened = FileTokenStorage::new(storage.path());
        assert_eq!(reopened.load().unwrap(), Some(cred));
        assert!(!storage.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_storage_clear() {
        let dir = TempDir::new().unwrap();
        let storage = file_storage(&dir);
        storage.store(&SessionCredential::new("a", "r")).unwrap();

        storage.clear().unwrap();
        assert!(!storage.path().exists());
        assert!(storage.load().unwrap().is_none());

        // Clearing twice is fine
        storage.clear().unwrap();
    }

    #[test]
    fn test_file_storage_incomplete_pair() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, r#"{"access_token": "only-access"}"#).unwrap();

        let storage = FileTokenStorage::new(&path);
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn test_file_storage_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(&path, "not json{").unwrap();

        let storage = FileTokenStorage::new(&path);
        assert!(storage.load().unwrap().is_none());

        // Signing in again overwrites the broken file
        storage.store(&SessionCredential::new("a", "r")).unwrap();
        assert_eq!(storage.load().unwrap(), Some(SessionCredential::new("a", "r")));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_storage_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let storage = file_storage(&dir);
        storage.store(&SessionCredential::new("a", "r")).unwrap();

        let mode = std::fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_memory_storage_keys() {
        let storage = MemoryTokenStorage::new();
        storage.store(&SessionCredential::new("a", "r")).unwrap();
        assert_eq!(storage.get(ACCESS_TOKEN_KEY).as_deref(), Some("a"));
        assert_eq!(storage.get(REFRESH_TOKEN_KEY).as_deref(), Some("r"));

        storage.clear().unwrap();
        assert!(storage.get(ACCESS_TOKEN_KEY).is_none());
        assert!(storage.get(REFRESH_TOKEN_KEY).is_none());
        assert!(storage.load().unwrap().is_none());
    }
}
