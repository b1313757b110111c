use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Version sentinel for declarations that carry no version at all.
pub const VERSION_LATEST: &str = "latest";

/// Version sentinel for build descriptors whose version comes from a parent
/// or a dependency-management block.
pub const VERSION_MANAGED: &str = "managed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Npm,
    Packagist,
    Pypi,
    Rubygems,
    Cargo,
    Go,
    Maven,
    Cocoapods,
    Pub,
    Nuget,
}

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Packagist => "packagist",
            Ecosystem::Pypi => "pypi",
            Ecosystem::Rubygems => "rubygems",
            Ecosystem::Cargo => "cargo",
            Ecosystem::Go => "go",
            Ecosystem::Maven => "maven",
            Ecosystem::Cocoapods => "cocoapods",
            Ecosystem::Pub => "pub",
            Ecosystem::Nuget => "nuget",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Packagist => "Packagist",
            Ecosystem::Pypi => "PyPI",
            Ecosystem::Rubygems => "RubyGems",
            Ecosystem::Cargo => "Cargo",
            Ecosystem::Go => "Go",
            Ecosystem::Maven => "Maven",
            Ecosystem::Cocoapods => "CocoaPods",
            Ecosystem::Pub => "Pub",
            Ecosystem::Nuget => "NuGet",
        }
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Prod,
    Dev,
}

/// One dependency declaration extracted from a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub id: String,
    pub name: String,
    pub version: String,
    pub ecosystem: Ecosystem,
    pub kind: DependencyKind,
}

impl DependencyRecord {
    pub fn new(name: impl Into<String>, version: impl Into<String>, ecosystem: Ecosystem) -> Self {
        let name = name.into();
        let version = version.into();
        Self {
            id: format!("{}@{}", name, version),
            name,
            version,
            ecosystem,
            kind: DependencyKind::Prod,
        }
    }

    pub fn with_kind(mut self, kind: DependencyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_dev(&self) -> bool {
        self.kind == DependencyKind::Dev
    }
}

/// A recognized manifest found during a tree scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFile {
    pub file_name: String,
    pub file_path: PathBuf,
    pub ecosystem: Ecosystem,
    pub packages: Vec<DependencyRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_is_name_at_version() {
        let record = DependencyRecord::new("lodash", "4.17.21", Ecosystem::Npm);
        assert_eq!(record.id, "lodash@4.17.21");
        assert_eq!(record.kind, DependencyKind::Prod);
    }

    #[test]
    fn test_record_serializes_lowercase_tags() {
        let record = DependencyRecord::new("pytest", VERSION_LATEST, Ecosystem::Pypi)
            .with_kind(DependencyKind::Dev);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["ecosystem"], "pypi");
        assert_eq!(json["kind"], "dev");
        assert_eq!(json["id"], "pytest@latest");
    }
}
