//! Persisted session token storage.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::chat::core::errors::ChatResult;

/// Fixed key the session token is stored under.
pub const SESSION_TOKEN_KEY: &str = "token";

/// Client-local storage for the opaque session token.
pub trait TokenStore: Send + Sync {
    /// Read the token, if one is stored.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be read.
    fn load(&self) -> ChatResult<Option<String>>;

    /// Persist a token, replacing any previous one.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn store(&self, token: &str) -> ChatResult<()>;

    /// Remove the token. Removing an absent token succeeds.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn remove(&self) -> ChatResult<()>;
}

/// JSON file store: `{"token": "..."}`.
///
/// Other keys found in the file are preserved.
#[derive(Clone, Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Store backed by the file at `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> ChatResult<BTreeMap<String, String>> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> ChatResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(entries)?)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> ChatResult<Option<String>> {
        Ok(self.read_entries()?.remove(SESSION_TOKEN_KEY))
    }

    fn store(&self, token: &str) -> ChatResult<()> {
        let mut entries = self.read_entries()?;
        entries.insert(SESSION_TOKEN_KEY.to_string(), token.to_string());
        self.write_entries(&entries)
    }

    fn remove(&self) -> ChatResult<()> {
        let mut entries = self.read_entries()?;
        if entries.remove(SESSION_TOKEN_KEY).is_none() {
            return Ok(());
        }
        self.write_entries(&entries)
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    /// Store pre-seeded with `token`.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> ChatResult<Option<String>> {
        Ok(self
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn store(&self, token: &str) -> ChatResult<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token.to_string());
        Ok(())
    }

    fn remove(&self) -> ChatResult<()> {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("session.json"));

        assert_eq!(store.load().unwrap(), None);
        store.store("abc123").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc123"));

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["token"], "abc123");

        store.remove().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.remove().unwrap();
    }

    #[test]
    fn test_file_store_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"theme":"dark","token":"t"}"#).unwrap();

        let store = FileTokenStore::new(&path);
        store.remove().unwrap();

        let raw: BTreeMap<String, String> =
            serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw.get("theme").map(String::as_str), Some("dark"));
        assert!(!raw.contains_key(SESSION_TOKEN_KEY));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        assert!(FileTokenStore::new(path).load().is_err());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::with_token("seed");
        assert_eq!(store.load().unwrap().as_deref(), Some("seed"));
        store.remove().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.store("next").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("next"));
    }
}
