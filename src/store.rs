//! Per-session persistence of scan results.
//!
//! Each session owns a directory of JSON files under the state directory:
//!
//! - `last_scan.json`: the most recent [`ScanResult`]
//! - `root_path.json`: the root that was scanned
//! - `notified.json`: vulnerability ids already alerted on
//!
//! # Location
//!
//! - Linux: `~/.local/share/depwatch/sessions/<session>/`
//! - macOS: `~/Library/Application Support/depwatch/sessions/<session>/`
//! - Windows: `%APPDATA%\depwatch\sessions\<session>\`
//!
//! # Example
//!
//! ```no_run
//! use depwatch::SessionStore;
//!
//! let store = SessionStore::new("default");
//! if let Some(scan) = store.last_scan() {
//!     println!("{} packages in {}", scan.total_packages, scan.root_name);
//! }
//! ```

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::model::ScanResult;
use crate::platform::state_dir;

const LAST_SCAN: &str = "last_scan.json";
const ROOT_PATH: &str = "root_path.json";
const NOTIFIED: &str = "notified.json";

pub const DEFAULT_SESSION: &str = "default";

/// JSON files for one named session. Reads of missing or unreadable files
/// return `None`; writes replace the file atomically.
pub struct SessionStore {
    dir: PathBuf,
}

/// Maps a session id onto `[A-Za-z0-9_-]`.
fn sanitize_session(session: &str) -> String {
    let safe: String = session
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if safe.is_empty() {
        DEFAULT_SESSION.to_string()
    } else {
        safe
    }
}

impl SessionStore {
    /// Opens the store for `session` under the platform state directory.
    ///
    /// # Arguments
    ///
    /// * `session` - Session id; characters outside `[A-Za-z0-9_-]` become `_`
    pub fn new(session: &str) -> Self {
        Self::with_base(&state_dir(), session)
    }

    /// Creates a store rooted at `base` instead of the state directory.
    pub fn with_base(base: &Path, session: &str) -> Self {
        Self {
            dir: base.join("sessions").join(sanitize_session(session)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let path = self.dir.join(name);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Ignoring unreadable session file");
                None
            }
        }
    }

    fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_string(value)?)?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    pub fn last_scan(&self) -> Option<ScanResult> {
        self.read(LAST_SCAN)
    }

    pub fn set_last_scan(&self, scan: &ScanResult) -> Result<()> {
        self.write(LAST_SCAN, scan)
    }

    pub fn root_path(&self) -> Option<PathBuf> {
        self.read(ROOT_PATH)
    }

    pub fn set_root_path(&self, root: &Path) -> Result<()> {
        self.write(ROOT_PATH, &root)
    }

    pub fn notified(&self) -> Vec<String> {
        self.read(NOTIFIED).unwrap_or_default()
    }

    pub fn set_notified(&self, ids: &[String]) -> Result<()> {
        self.write(NOTIFIED, &ids)
    }

    /// Removes every file of this session.
    pub fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_session_id_is_sanitized() {
        assert_eq!(sanitize_session("../../etc"), "______etc");
        assert_eq!(sanitize_session("team-a_1"), "team-a_1");
        assert_eq!(sanitize_session(""), "default");

        let base = TempDir::new().unwrap();
        let store = SessionStore::with_base(base.path(), "a/b");
        assert_eq!(store.dir(), base.path().join("sessions").join("a_b"));
    }

    #[test]
    fn test_scan_round_trip_and_clear() {
        let base = TempDir::new().unwrap();
        let store = SessionStore::with_base(base.path(), "default");
        assert!(store.last_scan().is_none());
        assert!(store.root_path().is_none());

        let scan = ScanResult::new(Path::new("/work/app"), None).with_error("partial");
        store.set_last_scan(&scan).unwrap();
        store.set_root_path(Path::new("/work/app")).unwrap();
        store.set_notified(&["CVE-2021-44228".to_string()]).unwrap();

        let loaded = store.last_scan().unwrap();
        assert_eq!(loaded.root_name, "app");
        assert_eq!(loaded.error.as_deref(), Some("partial"));
        assert_eq!(store.root_path(), Some(PathBuf::from("/work/app")));
        assert_eq!(store.notified(), vec!["CVE-2021-44228"]);

        store.clear().unwrap();
        assert!(store.last_scan().is_none());
        assert!(store.notified().is_empty());
        assert!(!store.dir().exists());
    }

    #[test]
    fn test_corrupt_file_reads_as_none() {
        let base = TempDir::new().unwrap();
        let store = SessionStore::with_base(base.path(), "s1");
        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join(LAST_SCAN), "{ not json").unwrap();
        assert!(store.last_scan().is_none());
    }

    #[test]
    fn test_sessions_are_isolated() {
        let base = TempDir::new().unwrap();
        let a = SessionStore::with_base(base.path(), "a");
        let b = SessionStore::with_base(base.path(), "b");
        a.set_root_path(Path::new("/work/a")).unwrap();
        assert!(b.root_path().is_none());
    }
}
