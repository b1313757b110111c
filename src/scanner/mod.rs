//! Bounded recursive discovery of dependency manifests.
//!
//! [`TreeScanner`] walks a directory tree depth-first, parses every
//! recognized manifest with [`crate::manifest::parse`], and builds a tree of
//! [`FolderNode`]s that only contains folders holding manifests somewhere
//! below them. A scan is bounded by [`ScanLimits`]: maximum depth, a global
//! folder quota and a global directory-entry quota.
//!
//! [`ProjectScanner`] is the top-level entry point: it validates the root,
//! runs the walk on a blocking thread and assembles a [`ScanResult`].
//!
//! # Example
//!
//! ```no_run
//! use depwatch::scanner::{ProjectScanner, ScanLimits};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let scanner = ProjectScanner::new(ScanLimits::default());
//!     let result = scanner.scan("./".as_ref(), CancellationToken::new()).await?;
//!     println!("{} projects, {} packages", result.total_projects, result.total_packages);
//!     Ok(())
//! }
//! ```

mod fs;

pub use fs::{DirEntryInfo, FileSystem, OsFileSystem};

use crate::guard::InFlight;
use crate::manifest;
use crate::model::{FolderNode, ManifestFile, ScanResult};
use crate::platform::{validate_root, PathError};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const MAX_DEPTH: usize = 5;
pub const MAX_FOLDERS: usize = 5000;
pub const MAX_FILES: usize = 10_000;
pub const MAX_MANIFEST_BYTES: u64 = 25 * 1024 * 1024;

/// Directory names never descended into: build output, vendored code,
/// version control and caches.
pub const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    "target",
    "build",
    "dist",
    "out",
    "bin",
    "obj",
    "coverage",
    "__pycache__",
    "venv",
    "env",
    "Pods",
    "bower_components",
    "DerivedData",
    ".git",
    ".svn",
    ".hg",
    ".idea",
    ".vscode",
    ".gradle",
    ".venv",
    ".cache",
    ".next",
];

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Path(#[from] PathError),

    #[error("scan cancelled")]
    Cancelled,

    #[error("a scan is already in progress")]
    Busy,

    #[error("scan task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy)]
pub struct ScanLimits {
    pub max_depth: usize,
    pub max_folders: usize,
    pub max_files: usize,
    pub max_file_bytes: u64,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            max_folders: MAX_FOLDERS,
            max_files: MAX_FILES,
            max_file_bytes: MAX_MANIFEST_BYTES,
        }
    }
}

impl ScanLimits {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Counters for one scan invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub folders_scanned: usize,
    pub files_scanned: usize,
    pub limit_reached: bool,
    pub cancelled: bool,
}

/// Returns true if the scanner should recurse into a directory named `name`.
pub fn should_descend(name: &str) -> bool {
    !name.starts_with('.') && !SKIP_DIRS.contains(&name)
}

/// A single depth-first walk. Create one per scan; counters are never
/// shared between scans.
pub struct TreeScanner<'a, F: FileSystem + ?Sized> {
    fs: &'a F,
    limits: ScanLimits,
    cancel: Option<CancellationToken>,
    stats: ScanStats,
}

impl<'a, F: FileSystem + ?Sized> TreeScanner<'a, F> {
    pub fn new(fs: &'a F) -> Self {
        Self {
            fs,
            limits: ScanLimits::default(),
            cancel: None,
            stats: ScanStats::default(),
        }
    }

    pub fn with_limits(mut self, limits: ScanLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Walks `root` and returns its folder tree, or `None` when no manifest
    /// was found (or the scan was cancelled).
    pub fn scan(&mut self, root: &Path) -> Option<FolderNode> {
        let tree = self.visit(root, 0);
        if self.stats.cancelled {
            return None;
        }
        tree
    }

    fn is_cancelled(&mut self) -> bool {
        if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            self.stats.cancelled = true;
        }
        self.stats.cancelled
    }

    fn hit_limit(&mut self, what: &str, path: &Path) {
        if !self.stats.limit_reached {
            warn!(
                limit = what,
                path = %path.display(),
                folders = self.stats.folders_scanned,
                files = self.stats.files_scanned,
                "Scan quota reached, results are partial"
            );
        }
        self.stats.limit_reached = true;
    }

    fn visit(&mut self, path: &Path, depth: usize) -> Option<FolderNode> {
        if depth > self.limits.max_depth || self.stats.limit_reached || self.is_cancelled() {
            return None;
        }

        if self.stats.folders_scanned >= self.limits.max_folders {
            self.hit_limit("folders", path);
            return None;
        }
        self.stats.folders_scanned += 1;

        let mut entries = match self.fs.read_dir(path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read directory, skipping");
                return None;
            }
        };

        self.stats.files_scanned += entries.len();
        if self.stats.files_scanned > self.limits.max_files {
            self.hit_limit("files", path);
            return None;
        }

        entries.sort_by(|a, b| {
            b.is_dir
                .cmp(&a.is_dir)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });

        let mut manifests = Vec::new();
        let mut children = Vec::new();

        for entry in entries {
            if self.is_cancelled() {
                return None;
            }

            if entry.is_dir {
                if should_descend(&entry.name) {
                    if let Some(child) = self.visit(&entry.path, depth + 1) {
                        children.push(child);
                    }
                }
            } else if manifest::is_manifest(&entry.name) {
                if let Some(file) = self.read_manifest(&entry) {
                    manifests.push(file);
                }
            }
        }

        if manifests.is_empty() && children.is_empty() {
            return None;
        }
        Some(FolderNode::new(path, manifests, children))
    }

    fn read_manifest(&self, entry: &DirEntryInfo) -> Option<ManifestFile> {
        let ecosystem = manifest::ecosystem_for(&entry.name)?;

        let size = match self.fs.file_size(&entry.path) {
            Ok(size) => size,
            Err(e) => {
                warn!(path = %entry.path.display(), error = %e, "Cannot stat manifest, skipping");
                return None;
            }
        };
        if size > self.limits.max_file_bytes {
            warn!(
                path = %entry.path.display(),
                size,
                limit = self.limits.max_file_bytes,
                "Manifest too large, skipping"
            );
            return None;
        }

        let content = match self.fs.read_to_string(&entry.path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %entry.path.display(), error = %e, "Cannot read manifest, skipping");
                return None;
            }
        };

        let packages = manifest::parse(&entry.name, &content);
        debug!(path = %entry.path.display(), packages = packages.len(), "Found manifest");

        Some(ManifestFile {
            file_name: entry.name.clone(),
            file_path: entry.path.clone(),
            ecosystem,
            packages,
        })
    }
}

/// Top-level scan entry point. Only one scan runs at a time per instance.
pub struct ProjectScanner<F: FileSystem + 'static = OsFileSystem> {
    fs: Arc<F>,
    limits: ScanLimits,
    in_flight: InFlight,
}

impl ProjectScanner<OsFileSystem> {
    pub fn new(limits: ScanLimits) -> Self {
        Self::with_fs(OsFileSystem, limits)
    }
}

impl<F: FileSystem + 'static> ProjectScanner<F> {
    pub fn with_fs(fs: F, limits: ScanLimits) -> Self {
        Self {
            fs: Arc::new(fs),
            limits,
            in_flight: InFlight::new(),
        }
    }

    /// Validates `root` and scans it.
    ///
    /// # Errors
    ///
    /// - [`ScanError::Path`] if the root is rejected before scanning
    /// - [`ScanError::Busy`] if another scan on this instance is running
    /// - [`ScanError::Cancelled`] if `cancel` fired; the partial tree is dropped
    pub async fn scan(&self, root: &Path, cancel: CancellationToken) -> Result<ScanResult, ScanError> {
        let _guard = self.in_flight.try_enter().ok_or(ScanError::Busy)?;
        let root = validate_root(root)?;

        info!(root = %root.display(), max_depth = self.limits.max_depth, "Starting scan");

        let fs = Arc::clone(&self.fs);
        let limits = self.limits;
        let walk_root = root.clone();
        let (tree, stats) = tokio::task::spawn_blocking(move || {
            let mut scanner = TreeScanner::new(&*fs).with_limits(limits).with_cancel(cancel);
            let tree = scanner.scan(&walk_root);
            (tree, scanner.stats())
        })
        .await?;

        if stats.cancelled {
            info!(root = %root.display(), "Scan cancelled");
            return Err(ScanError::Cancelled);
        }

        let mut result = ScanResult::new(&root, tree);
        result.folders_scanned = stats.folders_scanned;
        result.files_scanned = stats.files_scanned;
        result.limit_reached = stats.limit_reached;
        if stats.limit_reached {
            result = result.with_error(format!(
                "scan stopped at the limit of {} folders or {} entries; results are partial",
                limits.max_folders, limits.max_files
            ));
        }

        info!(
            projects = result.total_projects,
            packages = result.total_packages,
            folders = stats.folders_scanned,
            files = stats.files_scanned,
            limited = stats.limit_reached,
            "Scan finished"
        );

        Ok(result)
    }
}
