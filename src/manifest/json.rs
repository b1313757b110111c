//! JSON manifests: npm and Composer dependency maps and lockfiles.

use super::{clean_version, ManifestError};
use crate::model::{DependencyKind, DependencyRecord, Ecosystem, VERSION_LATEST};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Deserialize)]
struct PackageJson {
    #[serde(default)]
    dependencies: Map<String, Value>,
    #[serde(default, rename = "devDependencies")]
    dev_dependencies: Map<String, Value>,
}

#[derive(Deserialize)]
struct ComposerJson {
    #[serde(default)]
    require: Map<String, Value>,
    #[serde(default, rename = "require-dev")]
    require_dev: Map<String, Value>,
}

#[derive(Deserialize)]
struct PackageLock {
    #[serde(default)]
    packages: Map<String, Value>,
}

#[derive(Deserialize)]
struct ComposerLock {
    #[serde(default)]
    packages: Vec<ComposerLockEntry>,
    #[serde(default, rename = "packages-dev")]
    packages_dev: Vec<ComposerLockEntry>,
}

#[derive(Deserialize)]
struct ComposerLockEntry {
    name: String,
    version: Option<String>,
}

/// Deserializes a manifest whose root must be a JSON object.
///
/// Derived structs also accept arrays positionally, so the root shape is
/// checked on the untyped value first.
fn from_object<T: DeserializeOwned>(content: &str) -> Result<T, ManifestError> {
    let value: Value = serde_json::from_str(content)?;
    if !value.is_object() {
        return Err(ManifestError::Shape("manifest root is not a JSON object"));
    }
    Ok(serde_json::from_value(value)?)
}

/// Merges a production and a development dependency map.
///
/// A name present in both keeps its production position and takes the
/// development constraint; its kind is `dev`.
fn merge_maps(
    prod: Map<String, Value>,
    dev: Map<String, Value>,
    ecosystem: Ecosystem,
) -> Vec<DependencyRecord> {
    let mut merged = prod;
    for (name, constraint) in &dev {
        merged.insert(name.clone(), constraint.clone());
    }

    merged
        .into_iter()
        .map(|(name, constraint)| {
            let kind = if dev.contains_key(&name) {
                DependencyKind::Dev
            } else {
                DependencyKind::Prod
            };
            let version = clean_version(constraint.as_str().unwrap_or_default());
            DependencyRecord::new(name, version, ecosystem).with_kind(kind)
        })
        .collect()
}

pub(super) fn parse_package_json(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    let manifest: PackageJson = from_object(content)?;
    Ok(merge_maps(manifest.dependencies, manifest.dev_dependencies, Ecosystem::Npm))
}

pub(super) fn parse_composer_json(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    let manifest: ComposerJson = from_object(content)?;
    // Platform requirements (php, ext-*, lib-*) carry no vendor prefix.
    let records = merge_maps(manifest.require, manifest.require_dev, Ecosystem::Packagist)
        .into_iter()
        .filter(|r| r.name.contains('/'))
        .collect();
    Ok(records)
}

/// Extracts the direct dependencies from an npm v2/v3 lockfile.
///
/// Only `node_modules/<name>` entries one level deep that the root package
/// (`packages[""]`) lists directly are kept. Nested paths are transitive.
pub(super) fn parse_package_lock(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    let lock: PackageLock = from_object(content)?;
    let root = lock
        .packages
        .get("")
        .and_then(Value::as_object)
        .ok_or(ManifestError::Shape("package-lock.json has no root package entry"))?;

    let direct = root.get("dependencies").and_then(Value::as_object);
    let direct_dev = root.get("devDependencies").and_then(Value::as_object);
    let is_direct = |name: &str| {
        direct.is_some_and(|m| m.contains_key(name)) || direct_dev.is_some_and(|m| m.contains_key(name))
    };

    let mut records = Vec::new();
    for (path, entry) in &lock.packages {
        let Some(name) = path.strip_prefix("node_modules/") else {
            continue;
        };
        if name.contains("node_modules/") || !is_direct(name) {
            continue;
        }

        let version = entry
            .get("version")
            .and_then(Value::as_str)
            .unwrap_or(VERSION_LATEST);
        let dev = direct_dev.is_some_and(|m| m.contains_key(name))
            || entry.get("dev").and_then(Value::as_bool).unwrap_or(false);
        let kind = if dev { DependencyKind::Dev } else { DependencyKind::Prod };

        records.push(DependencyRecord::new(name, version, Ecosystem::Npm).with_kind(kind));
    }

    Ok(records)
}

pub(super) fn parse_composer_lock(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    let lock: ComposerLock = from_object(content)?;

    let to_record = |entry: ComposerLockEntry, kind: DependencyKind| {
        let version = entry
            .version
            .map(|v| v.trim_start_matches('v').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| VERSION_LATEST.to_string());
        DependencyRecord::new(entry.name, version, Ecosystem::Packagist).with_kind(kind)
    };

    let mut records: Vec<DependencyRecord> = lock
        .packages
        .into_iter()
        .map(|e| to_record(e, DependencyKind::Prod))
        .collect();
    records.extend(lock.packages_dev.into_iter().map(|e| to_record(e, DependencyKind::Dev)));

    Ok(records)
}
