//! Dependency manifest parsing.
//!
//! [`parse`] maps a manifest file name and its raw content to the
//! dependency records it declares. Dispatch goes through a fixed table of
//! recognized file names; adding a format means adding one [`Format`] entry.
//!
//! Parsing never fails outward. Malformed content is logged and yields an
//! empty list, so one broken manifest never aborts a tree scan.
//!
//! # Example
//!
//! ```
//! use depwatch::manifest;
//!
//! let records = manifest::parse("package.json", r#"{"dependencies":{"a":"^1.2.3"}}"#);
//! assert_eq!(records[0].id, "a@1.2.3");
//! ```

mod build;
mod json;
mod lines;
mod lock;
mod sections;

use crate::model::{DependencyRecord, Ecosystem, VERSION_LATEST};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected manifest shape: {0}")]
    Shape(&'static str),
}

type ParseFn = fn(&str) -> Result<Vec<DependencyRecord>, ManifestError>;

/// One recognized manifest file name and the strategy that parses it.
pub struct Format {
    pub file_name: &'static str,
    pub ecosystem: Ecosystem,
    parse: ParseFn,
}

impl Format {
    const fn new(file_name: &'static str, ecosystem: Ecosystem, parse: ParseFn) -> Self {
        Self {
            file_name,
            ecosystem,
            parse,
        }
    }
}

static FORMATS: &[Format] = &[
    Format::new("package.json", Ecosystem::Npm, json::parse_package_json),
    Format::new("package-lock.json", Ecosystem::Npm, json::parse_package_lock),
    Format::new("yarn.lock", Ecosystem::Npm, lock::parse_yarn_lock),
    Format::new("composer.json", Ecosystem::Packagist, json::parse_composer_json),
    Format::new("composer.lock", Ecosystem::Packagist, json::parse_composer_lock),
    Format::new("requirements.txt", Ecosystem::Pypi, lines::parse_requirements),
    Format::new("Pipfile", Ecosystem::Pypi, sections::parse_pipfile),
    Format::new("pyproject.toml", Ecosystem::Pypi, sections::parse_pyproject),
    Format::new("Gemfile", Ecosystem::Rubygems, lines::parse_gemfile),
    Format::new("Gemfile.lock", Ecosystem::Rubygems, lock::parse_gemfile_lock),
    Format::new("Cargo.toml", Ecosystem::Cargo, sections::parse_cargo_toml),
    Format::new("Cargo.lock", Ecosystem::Cargo, lock::parse_cargo_lock),
    Format::new("go.mod", Ecosystem::Go, lines::parse_go_mod),
    Format::new("pom.xml", Ecosystem::Maven, build::parse_pom),
    Format::new("build.gradle", Ecosystem::Maven, build::parse_gradle),
    Format::new("build.gradle.kts", Ecosystem::Maven, build::parse_gradle),
    Format::new("Podfile", Ecosystem::Cocoapods, lines::parse_podfile),
    Format::new("pubspec.yaml", Ecosystem::Pub, sections::parse_pubspec),
    Format::new("packages.config", Ecosystem::Nuget, build::parse_packages_config),
];

fn lookup(file_name: &str) -> Option<&'static Format> {
    FORMATS.iter().find(|f| f.file_name == file_name)
}

/// Returns true if `file_name` is a recognized manifest.
///
/// Matching is on the exact base name, so `Package.json` or
/// `requirements-dev.txt` are not manifests.
///
/// # Example
///
/// ```
/// use depwatch::manifest::is_manifest;
///
/// assert!(is_manifest("Cargo.lock"));
/// assert!(!is_manifest("README.md"));
/// ```
pub fn is_manifest(file_name: &str) -> bool {
    lookup(file_name).is_some()
}

/// Ecosystem tag for a recognized manifest file name.
pub fn ecosystem_for(file_name: &str) -> Option<Ecosystem> {
    lookup(file_name).map(|f| f.ecosystem)
}

/// The full table of recognized manifests.
pub fn supported_files() -> &'static [Format] {
    FORMATS
}

/// Parses a manifest's content into dependency records, in declaration order.
///
/// Unknown file names and malformed content both produce an empty list.
///
/// # Arguments
///
/// * `file_name` - Base name of the manifest, used to pick the strategy
/// * `content` - Raw file content
///
/// # Example
///
/// ```
/// use depwatch::manifest;
///
/// let records = manifest::parse("requirements.txt", "flask==2.0.1\n# pinned\nrequests\n");
/// let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
/// assert_eq!(ids, vec!["flask@2.0.1", "requests@latest"]);
///
/// assert!(manifest::parse("package.json", "[]").is_empty());
/// ```
pub fn parse(file_name: &str, content: &str) -> Vec<DependencyRecord> {
    let Some(format) = lookup(file_name) else {
        debug!(file = file_name, "Not a recognized manifest");
        return Vec::new();
    };

    match (format.parse)(content) {
        Ok(records) => {
            debug!(file = file_name, count = records.len(), "Parsed manifest");
            records
        }
        Err(e) => {
            warn!(file = file_name, error = %e, "Failed to parse manifest");
            Vec::new()
        }
    }
}

/// Strips leading range operators (`^ ~ > = <`) and whitespace from a
/// version constraint. Empty and wildcard constraints become `"latest"`.
pub(crate) fn clean_version(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_start_matches(|c: char| matches!(c, '^' | '~' | '>' | '=' | '<') || c.is_whitespace())
        .trim();
    if trimmed.is_empty() || trimmed == "*" {
        VERSION_LATEST.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DependencyKind;

    #[test]
    fn test_parse_package_json_strips_range() {
        let records = parse("package.json", r#"{"dependencies":{"a":"^1.2.3"}}"#);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "a");
        assert_eq!(records[0].version, "1.2.3");
        assert_eq!(records[0].ecosystem, Ecosystem::Npm);
        assert_eq!(records[0].kind, DependencyKind::Prod);
    }

    #[test]
    fn test_parse_requirements_skips_comments_and_editables() {
        let records = parse("requirements.txt", "flask==2.0.1\n# comment\n-e .\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "flask");
        assert_eq!(records[0].version, "2.0.1");
        assert_eq!(records[0].ecosystem, Ecosystem::Pypi);
    }

    #[test]
    fn test_malformed_manifest_degrades_to_empty() {
        assert!(parse("package.json", "{ not json").is_empty());
        assert!(parse("composer.lock", "[1, 2, 3]").is_empty());
    }

    #[test]
    fn test_unknown_file_is_empty() {
        assert!(parse("README.md", "anything").is_empty());
        assert!(!is_manifest("README.md"));
    }

    #[test]
    fn test_table_lookup() {
        assert!(is_manifest("Cargo.lock"));
        assert!(is_manifest("build.gradle.kts"));
        assert_eq!(ecosystem_for("Gemfile.lock"), Some(Ecosystem::Rubygems));
        assert_eq!(ecosystem_for("pubspec.yaml"), Some(Ecosystem::Pub));
        assert_eq!(supported_files().len(), 19);
    }

    #[test]
    fn test_clean_version() {
        assert_eq!(clean_version("^1.2.3"), "1.2.3");
        assert_eq!(clean_version("~> 6.1.0"), "6.1.0");
        assert_eq!(clean_version(">=2.0"), "2.0");
        assert_eq!(clean_version("==2.0.1"), "2.0.1");
        assert_eq!(clean_version("  "), "latest");
        assert_eq!(clean_version("*"), "latest");
    }
}
