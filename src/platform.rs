//! Cross-platform path resolution and scan root validation.
//!
//! Scan roots are validated before any scanning starts: they must resolve,
//! be a directory, and not be a system directory.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOS,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        #[cfg(target_os = "macos")]
        return Platform::MacOS;
        #[cfg(target_os = "windows")]
        return Platform::Windows;
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        return Platform::Linux;
    }
}

/// Setup-time rejection of a scan root.
#[derive(Debug, Error)]
pub enum PathError {
    #[error("cannot resolve {path}: {source}")]
    Unresolvable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error("refusing to scan system directory {0}")]
    Forbidden(PathBuf),
}

/// Roots that may not be scanned themselves.
const FORBIDDEN_EXACT: &[&str] = &[
    "/",
    "/usr",
    "/var",
    "/lib",
    "/lib64",
    "/opt",
    "/Library",
    "/private",
    "/Applications",
    r"C:\",
    r"C:\Program Files",
    r"C:\Program Files (x86)",
];

/// Roots that may not be scanned, nor anything below them.
const FORBIDDEN_TREES: &[&str] = &[
    "/proc",
    "/sys",
    "/dev",
    "/boot",
    "/etc",
    "/bin",
    "/sbin",
    "/System",
    r"C:\Windows",
];

/// Strips the `\\?\` prefix `canonicalize` adds on Windows.
fn normalize(path: &Path) -> PathBuf {
    let display = path.display().to_string();
    match display.strip_prefix(r"\\?\") {
        Some(stripped) => PathBuf::from(stripped),
        None => path.to_path_buf(),
    }
}

/// Returns true if `path` (already canonical) is a system location.
pub fn is_forbidden(path: &Path) -> bool {
    let path = normalize(path);
    let case_insensitive = Platform::current() == Platform::Windows;
    let same = |a: &Path, b: &str| {
        if case_insensitive {
            a.display().to_string().eq_ignore_ascii_case(b)
        } else {
            a == Path::new(b)
        }
    };

    if FORBIDDEN_EXACT.iter().any(|f| same(&path, f)) {
        return true;
    }
    FORBIDDEN_TREES
        .iter()
        .any(|f| path.ancestors().any(|a| same(a, f)))
}

/// Resolves and validates a scan root.
///
/// # Errors
///
/// Returns [`PathError`] if the path does not resolve, is not a directory,
/// or is a system directory.
pub fn validate_root(path: &Path) -> Result<PathBuf, PathError> {
    let resolved = path
        .canonicalize()
        .map_err(|source| PathError::Unresolvable {
            path: path.to_path_buf(),
            source,
        })?;

    if !resolved.is_dir() {
        return Err(PathError::NotADirectory(resolved));
    }
    if is_forbidden(&resolved) {
        return Err(PathError::Forbidden(resolved));
    }

    Ok(normalize(&resolved))
}

/// Returns the state directory for depwatch (session store).
///
/// Platform-specific locations:
/// - Linux: `~/.local/share/depwatch/`
/// - macOS: `~/Library/Application Support/depwatch/`
/// - Windows: `%APPDATA%\depwatch\`
///
/// Falls back to `./.depwatch/` if no data directory can be determined.
pub fn state_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("depwatch"))
        .unwrap_or_else(|| PathBuf::from(".depwatch"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_accepts_project_dir() {
        let dir = TempDir::new().unwrap();
        let resolved = validate_root(dir.path()).unwrap();
        assert!(resolved.is_dir());
    }

    #[test]
    fn test_validate_rejects_missing_path() {
        let dir = TempDir::new().unwrap();
        let err = validate_root(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, PathError::Unresolvable { .. }));
    }

    #[test]
    fn test_validate_rejects_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("package.json");
        std::fs::write(&file, "{}").unwrap();
        let err = validate_root(&file).unwrap_err();
        assert!(matches!(err, PathError::NotADirectory(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_forbidden_system_paths() {
        assert!(is_forbidden(Path::new("/")));
        assert!(is_forbidden(Path::new("/usr")));
        assert!(is_forbidden(Path::new("/etc/nginx")));
        assert!(is_forbidden(Path::new("/proc/1")));
        assert!(!is_forbidden(Path::new("/usr/local/src/app")));
        assert!(!is_forbidden(Path::new("/home/dev/project")));
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_rejects_root() {
        let err = validate_root(Path::new("/")).unwrap_err();
        assert!(matches!(err, PathError::Forbidden(_)));
    }
}
