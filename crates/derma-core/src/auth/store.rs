//! Session persistence.
//!
//! `SessionManager::persist` saves a session once its login has been
//! accepted, and `logout` clears it, through whichever store the manager
//! was built with. `MemoryStore` keeps nothing
//! past the process; `FileStore` and `KeyringStore` survive restarts.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

use crate::config::{Config, SessionStoreKind, APP_NAME};

use super::SessionData;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Keychain account the session is stored under
const TOKEN_ACCOUNT: &str = "jwtToken";

pub trait SessionStore: Send + Sync {
    /// Read the stored session, if any
    fn load(&self) -> Result<Option<SessionData>>;

    fn save(&self, data: &SessionData) -> Result<()>;

    /// Remove the stored session. Clearing an empty store succeeds.
    fn clear(&self) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Build the store selected by `config.session_store`
pub fn build_store(config: &Config) -> Result<Arc<dyn SessionStore>> {
    let store: Arc<dyn SessionStore> = match config.session_store {
        SessionStoreKind::Memory => Arc::new(MemoryStore::new()),
        SessionStoreKind::File => Arc::new(FileStore::new(config.cache_dir()?)),
        SessionStoreKind::Keyring => Arc::new(KeyringStore::new()),
    };
    debug!(store = store.name(), "Session store configured");
    Ok(store)
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Option<SessionData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<SessionData>>> {
        self.data
            .lock()
            .map_err(|_| anyhow::anyhow!("Session store lock poisoned"))
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Option<SessionData>> {
        Ok(self.slot()?.clone())
    }

    fn save(&self, data: &SessionData) -> Result<()> {
        *self.slot()? = Some(data.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.slot()? = None;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

// ============================================================================
// File store
// ============================================================================

#[derive(Debug, Clone)]
pub struct FileStore {
    cache_dir: PathBuf,
}

impl FileStore {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self { cache_dir }
    }

    fn session_path(&self) -> PathBuf {
        self.cache_dir.join(SESSION_FILE)
    }
}

impl SessionStore for FileStore {
    fn load(&self) -> Result<Option<SessionData>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).context("Failed to read session file")?;
        let data = serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(data))
    }

    fn save(&self, data: &SessionData) -> Result<()> {
        let path = self.session_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(data)?;
        std::fs::write(path, contents).context("Failed to write session file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.session_path();
        if path.exists() {
            std::fs::remove_file(path).context("Failed to remove session file")?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

// ============================================================================
// OS keychain store
// ============================================================================

#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            service: APP_NAME.to_string(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, TOKEN_ACCOUNT).context("Failed to create keyring entry")
    }
}

impl SessionStore for KeyringStore {
    fn load(&self) -> Result<Option<SessionData>> {
        match self.entry()?.get_password() {
            Ok(secret) => {
                let data = serde_json::from_str(&secret)
                    .context("Failed to parse session from keychain")?;
                Ok(Some(data))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve session from keychain"),
        }
    }

    fn save(&self, data: &SessionData) -> Result<()> {
        let secret = serde_json::to_string(data)?;
        self.entry()?
            .set_password(&secret)
            .context("Failed to store session in keychain")
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session from keychain"),
        }
    }

    fn name(&self) -> &'static str {
        "keyring"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{BearerToken, Session};

    fn sample() -> SessionData {
        Session::logged_in("alice", BearerToken::new("abc123").expect("non-empty token"))
            .to_data()
            .expect("logged in session")
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load().expect("load").is_none());

        let data = sample();
        store.save(&data).expect("save");
        assert_eq!(store.load().expect("load"), Some(data));

        store.clear().expect("clear");
        assert!(store.load().expect("load").is_none());
        store.clear().expect("clearing twice is fine");
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::new(dir.path().join("derma"));
        assert!(store.load().expect("load").is_none());

        let data = sample();
        store.save(&data).expect("save");
        assert!(dir.path().join("derma").join(SESSION_FILE).exists());
        assert_eq!(store.load().expect("load"), Some(data));

        store.clear().expect("clear");
        assert!(store.load().expect("load").is_none());
        store.clear().expect("clearing twice is fine");
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(SESSION_FILE), "{not json").expect("write");
        let store = FileStore::new(dir.path().to_path_buf());
        assert!(store.load().is_err());
    }

    #[test]
    fn test_build_store_selects_kind() {
        let config = Config::default();
        assert_eq!(build_store(&config).expect("store").name(), "memory");

        let config = Config {
            session_store: SessionStoreKind::Keyring,
            ..Config::default()
        };
        assert_eq!(build_store(&config).expect("store").name(), "keyring");
    }

    #[test]
    #[ignore = "needs an OS keychain"]
    fn test_keyring_store_round_trip() {
        let store = KeyringStore::new();
        store.clear().expect("clear");

        let data = sample();
        store.save(&data).expect("save");
        assert_eq!(store.load().expect("load"), Some(data));

        store.clear().expect("clear");
        assert!(store.load().expect("load").is_none());
    }
}
