use super::ManifestFile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A directory that holds manifests itself or somewhere below it.
///
/// Totals are computed once in [`FolderNode::new`] from the node's own
/// manifests plus the already-built children.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderNode {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub dependency_files: Vec<ManifestFile>,
    pub children: Vec<FolderNode>,
    pub total_packages: usize,
    pub total_projects: usize,
    pub is_project: bool,
}

impl FolderNode {
    pub fn new(path: &Path, dependency_files: Vec<ManifestFile>, children: Vec<FolderNode>) -> Self {
        let is_project = !dependency_files.is_empty();
        let own_packages: usize = dependency_files.iter().map(|f| f.packages.len()).sum();

        let total_packages = own_packages + children.iter().map(|c| c.total_packages).sum::<usize>();
        let total_projects =
            usize::from(is_project) + children.iter().map(|c| c.total_projects).sum::<usize>();

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Self {
            id: path.display().to_string(),
            name,
            path: path.to_path_buf(),
            dependency_files,
            children,
            total_packages,
            total_projects,
            is_project,
        }
    }

    /// Iterates over this node and all of its descendants, pre-order.
    pub fn walk(&self) -> Vec<&FolderNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }

    /// All manifests in this subtree, in tree order.
    pub fn manifests(&self) -> impl Iterator<Item = &ManifestFile> {
        self.walk().into_iter().flat_map(|n| n.dependency_files.iter())
    }
}

/// Outcome of one full scan of a root directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    pub root_name: String,
    pub root_path: PathBuf,
    pub tree: Option<FolderNode>,
    pub total_projects: usize,
    pub total_packages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub scanned_at: DateTime<Utc>,
    pub folders_scanned: usize,
    pub files_scanned: usize,
    pub limit_reached: bool,
}

impl ScanResult {
    pub fn new(root_path: &Path, tree: Option<FolderNode>) -> Self {
        let root_name = root_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| root_path.display().to_string());
        let (total_projects, total_packages) = tree
            .as_ref()
            .map(|t| (t.total_projects, t.total_packages))
            .unwrap_or((0, 0));

        Self {
            root_name,
            root_path: root_path.to_path_buf(),
            tree,
            total_projects,
            total_packages,
            error: None,
            scanned_at: Utc::now(),
            folders_scanned: 0,
            files_scanned: 0,
            limit_reached: false,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Every dependency record in the tree, in tree order.
    pub fn dependencies(&self) -> Vec<&super::DependencyRecord> {
        self.tree
            .as_ref()
            .map(|t| t.manifests().flat_map(|m| m.packages.iter()).collect())
            .unwrap_or_default()
    }

    /// Distinct dependency names in first-seen order, the product list for
    /// vulnerability lookups.
    pub fn product_names(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.dependencies()
            .into_iter()
            .filter(|d| seen.insert(d.name.to_lowercase()))
            .map(|d| d.name.clone())
            .collect()
    }
}
