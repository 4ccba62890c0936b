//! Session Storage - persisted credential and identity snapshot
//!
//! The token and the identity snapshot are always written, read and removed as a
//! pair. A document holding only one of them is treated as corrupt.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use teamtask_core::{storage_error, Credential, Session, TeamtaskResult};
use tracing::{debug, info};

const SESSION_FILE_NAME: &str = "session.json";

/// The pair written on login and restored on startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    #[serde(rename = "jwt_token")]
    pub credential: Credential,
    #[serde(rename = "user_data")]
    pub session: Session,
}

/// On-disk shape; both halves optional so a half-written pair can be detected
#[derive(Deserialize)]
struct StoredDocument {
    #[serde(default)]
    jwt_token: Option<Credential>,
    #[serde(default)]
    user_data: Option<Session>,
}

impl StoredDocument {
    fn into_pair(self) -> TeamtaskResult<Option<PersistedSession>> {
        match (self.jwt_token, self.user_data) {
            (Some(credential), Some(session)) => Ok(Some(PersistedSession {
                credential,
                session,
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(storage_error!(
                "Persisted session has a token but no user data",
                "session_store"
            )),
            (None, Some(_)) => Err(storage_error!(
                "Persisted session has user data but no token",
                "session_store"
            )),
        }
    }
}

/// Client-local persistence for the credential and identity snapshot
pub trait SessionStore: Send + Sync {
    /// Read the persisted pair, `None` when nothing is stored
    fn load(&self) -> TeamtaskResult<Option<PersistedSession>>;

    /// Replace whatever is stored with `persisted`
    fn save(&self, persisted: &PersistedSession) -> TeamtaskResult<()>;

    /// Remove both entries; clearing an empty store succeeds
    fn clear(&self) -> TeamtaskResult<()>;
}

/// Stores the pair as one JSON document on disk
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Create a store keeping `session.json` in `storage_dir`
    pub fn new<P: AsRef<Path>>(storage_dir: P) -> TeamtaskResult<Self> {
        let storage_dir = storage_dir.as_ref().to_path_buf();

        std::fs::create_dir_all(&storage_dir).map_err(|e| {
            storage_error!(
                format!(
                    "Failed to create session directory {}: {}",
                    storage_dir.display(),
                    e
                ),
                "session_store",
                e
            )
        })?;

        info!("Session storage initialized at: {}", storage_dir.display());

        Ok(Self {
            path: storage_dir.join(SESSION_FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> TeamtaskResult<Option<PersistedSession>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(storage_error!(
                    format!("Failed to read {}: {}", self.path.display(), e),
                    "session_store",
                    e
                ))
            }
        };

        let document: StoredDocument = serde_json::from_str(&content).map_err(|e| {
            storage_error!(
                format!("Corrupt session file {}: {}", self.path.display(), e),
                "session_store",
                e
            )
        })?;

        let pair = document.into_pair()?;
        debug!(
            "Loaded session file {} (present: {})",
            self.path.display(),
            pair.is_some()
        );
        Ok(pair)
    }

    fn save(&self, persisted: &PersistedSession) -> TeamtaskResult<()> {
        let json_data = serde_json::to_string_pretty(persisted)?;
        let temp_path = self.temp_path();

        if let Err(e) = write_private(&temp_path, json_data.as_bytes()) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(storage_error!(
                format!("Failed to write {}: {}", temp_path.display(), e),
                "session_store",
                e
            ));
        }

        // Rename is atomic, so readers see either the old pair or the new one.
        if let Err(e) = std::fs::rename(&temp_path, &self.path) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(storage_error!(
                format!("Failed to replace {}: {}", self.path.display(), e),
                "session_store",
                e
            ));
        }

        debug!("Saved session to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> TeamtaskResult<()> {
        for path in [self.path.clone(), self.temp_path()] {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Deleted session file: {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(storage_error!(
                        format!("Failed to delete {}: {}", path.display(), e),
                        "session_store",
                        e
                    ))
                }
            }
        }
        Ok(())
    }
}

/// Write `contents` to a file only the owner can read
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // `mode` only applies on create; a leftover file keeps its old mode.
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(contents)?;
    file.sync_all()
}

/// Keeps the pair in memory only; nothing survives the process
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<PersistedSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(persisted: PersistedSession) -> Self {
        Self {
            slot: Mutex::new(Some(persisted)),
        }
    }

    fn slot(&self) -> TeamtaskResult<std::sync::MutexGuard<'_, Option<PersistedSession>>> {
        self.slot
            .lock()
            .map_err(|_| storage_error!("Session store lock poisoned", "memory_session_store"))
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> TeamtaskResult<Option<PersistedSession>> {
        Ok(self.slot()?.clone())
    }

    fn save(&self, persisted: &PersistedSession) -> TeamtaskResult<()> {
        *self.slot()? = Some(persisted.clone());
        Ok(())
    }

    fn clear(&self) -> TeamtaskResult<()> {
        *self.slot()? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, BTreeSet};
    use tempfile::TempDir;
    use teamtask_core::TeamtaskError;

    fn sample() -> PersistedSession {
        PersistedSession {
            credential: Credential::new("token-123"),
            session: Session {
                id: 1,
                username: "alice".to_string(),
                email: Some("alice@example.com".to_string()),
                roles: BTreeSet::from(["administrator".to_string()]),
                display_name: "Alice".to_string(),
                capabilities: BTreeMap::from([("manage_options".to_string(), true)]),
            },
        }
    }

    #[test]
    fn test_file_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp_dir.path().join("nested")).unwrap();

        assert_eq!(store.load().unwrap(), None);

        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));
        assert!(!store.temp_path().exists());

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp_dir.path()).unwrap();
        // A stale temp file with loose permissions must not leak into the saved file.
        std::fs::write(store.temp_path(), "stale").unwrap();
        std::fs::set_permissions(store.temp_path(), std::fs::Permissions::from_mode(0o644))
            .unwrap();

        store.save(&sample()).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_failed_save_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp_dir.path()).unwrap();
        // A directory in place of the session file makes the final rename fail.
        std::fs::create_dir(store.path()).unwrap();
        std::fs::write(store.path().join("occupied"), "x").unwrap();

        let error = store.save(&sample()).unwrap_err();

        assert!(matches!(error, TeamtaskError::Storage { .. }));
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_file_store_document_layout() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp_dir.path()).unwrap();
        store.save(&sample()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["jwt_token"], "token-123");
        assert_eq!(raw["user_data"]["username"], "alice");
        assert_eq!(raw["user_data"]["name"], "Alice");
    }

    #[test]
    fn test_half_written_pair_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp_dir.path()).unwrap();

        std::fs::write(store.path(), r#"{"jwt_token":"orphan"}"#).unwrap();
        assert!(matches!(
            store.load().unwrap_err(),
            TeamtaskError::Storage { .. }
        ));

        std::fs::write(store.path(), "{not json").unwrap();
        assert!(matches!(
            store.load().unwrap_err(),
            TeamtaskError::Storage { .. }
        ));

        std::fs::write(store.path(), "{}").unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_memory_store() {
        let store = MemorySessionStore::new();
        assert_eq!(store.load().unwrap(), None);

        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), Some(sample()));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
