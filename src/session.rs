//! Durable session-handle storage.
//!
//! The extraction endpoint hands back one opaque session identifier per
//! uploaded document; it must survive between CLI invocations so the user
//! can keep asking questions. [`SessionStore`] persists it as a small JSON
//! string map on disk, with plain key-value semantics: get, set (overwrite
//! unconditionally), clear. At most one handle is live at a time.
//!
//! Access is synchronous `std::fs`; there is no network or database here.
//! Reads and writes go through the whole file each time — the payload is a
//! handful of bytes.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::query::SessionHandle;

/// Storage key for the active session handle.
const SESSION_KEY: &str = "session_id";

/// File-backed store for the active session handle.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SessionStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored handle, or `None` if no session is active.
    ///
    /// A missing store file means no session; an empty stored value is
    /// treated the same way.
    pub fn get(&self) -> Result<Option<SessionHandle>> {
        let map = self.read_map()?;
        Ok(map
            .get(SESSION_KEY)
            .filter(|v| !v.is_empty())
            .map(SessionHandle::new))
    }

    /// Stores the handle, replacing any previous one.
    pub fn set(&self, handle: &SessionHandle) -> Result<()> {
        let mut map = self.read_map()?;
        map.insert(SESSION_KEY.to_string(), handle.as_str().to_string());
        self.write_map(&map)
    }

    /// Removes the stored handle. A no-op if none is present.
    pub fn clear(&self) -> Result<()> {
        let mut map = self.read_map()?;
        if map.remove(SESSION_KEY).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session store: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid session store file: {}", self.path.display()))
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create session directory: {}", parent.display())
                })?;
            }
        }
        let content = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write session store: {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(tmp: &TempDir) -> SessionStore {
        SessionStore::new(tmp.path().join("data").join("session.json"))
    }

    #[test]
    fn test_absent_file_means_no_session() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn test_set_then_get_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store.set(&SessionHandle::new("s1")).unwrap();
        assert_eq!(store.get().unwrap(), Some(SessionHandle::new("s1")));
    }

    #[test]
    fn test_set_overwrites_unconditionally() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store.set(&SessionHandle::new("first")).unwrap();
        store.set(&SessionHandle::new("second")).unwrap();
        assert_eq!(store.get().unwrap(), Some(SessionHandle::new("second")));
    }

    #[test]
    fn test_clear_removes_handle() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store.set(&SessionHandle::new("s1")).unwrap();
        store.clear().unwrap();
        assert_eq!(store.get().unwrap(), None);
    }

    #[test]
    fn test_clear_without_session_is_noop() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store.clear().unwrap();
        assert_eq!(store.get().unwrap(), None);
    }
}
