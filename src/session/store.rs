//! Durable storage for session records.
//!
//! One pretty-printed JSON file per session, named after the percent-encoded
//! session id and overwritten wholesale on every save. An in-memory mode keeps
//! the same serialized records in a map, which tests use to avoid touching disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;

use super::SessionState;

/// Reads and writes `SessionState` records.
///
/// Cloning is cheap and clones share the same backing storage.
#[derive(Clone)]
pub struct SessionStore {
    /// Directory for file-based persistence; `None` for memory mode
    storage_path: Option<PathBuf>,
    /// Serialized records, used only in memory mode
    memory: Arc<RwLock<HashMap<String, String>>>,
}

impl SessionStore {
    /// Create a store under `~/.parlance/sessions`.
    ///
    /// # Errors
    ///
    /// Returns an error if the sessions directory cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_path(Config::dir().join("sessions"))
    }

    /// Create a store in a specific directory, creating it if needed.
    ///
    /// # Example
    /// ```no_run
    /// use parlance::session::SessionStore;
    /// use std::path::PathBuf;
    ///
    /// let store = SessionStore::with_path(PathBuf::from("/tmp/sessions")).unwrap();
    /// ```
    pub fn with_path(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            storage_path: Some(path),
            memory: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Create a store that never touches disk.
    pub fn new_memory() -> Self {
        Self {
            storage_path: None,
            memory: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Directory backing this store, if any.
    pub fn path(&self) -> Option<&Path> {
        self.storage_path.as_deref()
    }

    fn file_path(dir: &Path, session_id: &str) -> PathBuf {
        dir.join(format!("{}.json", Self::sanitize_key(session_id)))
    }

    /// Load a session record.
    ///
    /// Returns `Ok(None)` when no record exists and `Err` when one exists but
    /// cannot be read or parsed.
    pub async fn load(&self, session_id: &str) -> Result<Option<SessionState>> {
        let content = match &self.storage_path {
            Some(dir) => {
                let path = Self::file_path(dir, session_id);
                if !path.exists() {
                    return Ok(None);
                }
                tokio::fs::read_to_string(&path).await?
            }
            None => match self.memory.read().await.get(session_id) {
                Some(content) => content.clone(),
                None => return Ok(None),
            },
        };
        let state: SessionState = serde_json::from_str(&content)?;
        Ok(Some(state))
    }

    /// Persist a session record, replacing any previous version.
    pub async fn save(&self, state: &SessionState) -> Result<()> {
        let content = serde_json::to_string_pretty(state)?;
        match &self.storage_path {
            Some(dir) => {
                let path = Self::file_path(dir, &state.session_id);
                let tmp = path.with_extension("json.tmp");
                tokio::fs::write(&tmp, content).await?;
                tokio::fs::rename(&tmp, &path).await?;
                debug!(session_id = %state.session_id, path = %path.display(), "Session saved");
            }
            None => {
                self.memory
                    .write()
                    .await
                    .insert(state.session_id.clone(), content);
            }
        }
        Ok(())
    }

    /// Delete a session record. Returns `true` if one existed.
    pub async fn delete(&self, session_id: &str) -> Result<bool> {
        match &self.storage_path {
            Some(dir) => {
                let path = Self::file_path(dir, session_id);
                if path.exists() {
                    tokio::fs::remove_file(&path).await?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => Ok(self.memory.write().await.remove(session_id).is_some()),
        }
    }

    /// Check whether a record exists for `session_id`.
    pub async fn exists(&self, session_id: &str) -> bool {
        match &self.storage_path {
            Some(dir) => Self::file_path(dir, session_id).exists(),
            None => self.memory.read().await.contains_key(session_id),
        }
    }

    /// Load every readable record, sorted by session id.
    ///
    /// Unreadable records are skipped with a warning.
    pub async fn list(&self) -> Result<Vec<SessionState>> {
        let mut states = Vec::new();
        match &self.storage_path {
            Some(dir) => {
                let mut entries = tokio::fs::read_dir(dir).await?;
                while let Some(entry) = entries.next_entry().await? {
                    let path = entry.path();
                    if path.extension().map(|e| e != "json").unwrap_or(true) {
                        continue;
                    }
                    let parsed = match tokio::fs::read_to_string(&path).await {
                        Ok(content) => serde_json::from_str::<SessionState>(&content)
                            .map_err(|e| e.to_string()),
                        Err(e) => Err(e.to_string()),
                    };
                    match parsed {
                        Ok(state) => states.push(state),
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "Skipping unreadable session record")
                        }
                    }
                }
            }
            None => {
                for (id, content) in self.memory.read().await.iter() {
                    match serde_json::from_str::<SessionState>(content) {
                        Ok(state) => states.push(state),
                        Err(e) => {
                            warn!(session_id = %id, error = %e, "Skipping unreadable session record")
                        }
                    }
                }
            }
        }
        states.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(states)
    }

    /// Write a session's history to an arbitrary path as pretty JSON.
    pub async fn export(&self, state: &SessionState, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(&state.messages)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Store raw record text in memory mode. Lets tests plant corrupt records.
    #[cfg(test)]
    pub(crate) async fn put_raw(&self, session_id: &str, content: &str) {
        self.memory
            .write()
            .await
            .insert(session_id.to_string(), content.to_string());
    }

    /// Percent-encode characters that are unsafe in file names.
    ///
    /// `%` itself is encoded so distinct ids never map to the same file.
    fn sanitize_key(key: &str) -> String {
        let mut result = String::with_capacity(key.len() * 3);
        for c in key.chars() {
            match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '%' => {
                    result.push_str(&format!("%{:02X}", c as u32));
                }
                c => result.push(c),
            }
        }
        result
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new_memory()
    }
}
