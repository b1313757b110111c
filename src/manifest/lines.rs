//! Line-oriented manifests: one declaration per line.

use super::{clean_version, ManifestError};
use crate::model::{DependencyKind, DependencyRecord, Ecosystem, VERSION_LATEST};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_REQUIREMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._-]*)\s*(?:\[[^\]]*\])?\s*(?:(?:===|==|~=|>=|<=|!=|>|<)\s*([A-Za-z0-9._*+!-]+))?")
        .unwrap()
});

static RE_GEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*gem\s+["']([^"']+)["'](?:\s*,\s*["']([^"']+)["'])?"#).unwrap()
});

static RE_GEM_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*group\s+(.+?)\s+do\b").unwrap());

static RE_POD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*pod\s+["']([^"']+)["'](?:\s*,\s*["']([^"']+)["'])?"#).unwrap()
});

static RE_GO_REQUIRE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:require\s+)?([^\s()]+)\s+(v[^\s]+)(\s*//\s*indirect)?").unwrap());

fn version_or_latest(version: Option<regex::Match<'_>>) -> String {
    version
        .map(|m| clean_version(m.as_str()))
        .unwrap_or_else(|| VERSION_LATEST.to_string())
}

/// Parses a pip requirements file.
///
/// Comments, blank lines, option lines (`-e`, `-r`, `--index-url`) and bare
/// URLs produce no records. Extras and environment markers are dropped.
pub(super) fn parse_requirements(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    let mut records = Vec::new();

    for raw in content.lines() {
        let line = raw.split(" #").next().unwrap_or_default().trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('-') {
            continue;
        }
        if line.contains("://") && !line.contains('@') {
            continue;
        }

        if let Some(caps) = RE_REQUIREMENT.captures(line) {
            let name = &caps[1];
            let version = version_or_latest(caps.get(2));
            records.push(DependencyRecord::new(name, version, Ecosystem::Pypi));
        }
    }

    Ok(records)
}

/// Parses `gem` declarations from a Gemfile. Gems inside a `group` block
/// that names `:development` or `:test` are dev dependencies.
pub(super) fn parse_gemfile(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    let mut records = Vec::new();
    let mut in_dev_group = false;

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('#') {
            continue;
        }

        if let Some(caps) = RE_GEM_GROUP.captures(line) {
            let groups = &caps[1];
            in_dev_group = groups.contains(":development") || groups.contains(":test");
            continue;
        }
        if trimmed == "end" {
            in_dev_group = false;
            continue;
        }

        if let Some(caps) = RE_GEM.captures(line) {
            let kind = if in_dev_group {
                DependencyKind::Dev
            } else {
                DependencyKind::Prod
            };
            let version = version_or_latest(caps.get(2));
            records.push(DependencyRecord::new(&caps[1], version, Ecosystem::Rubygems).with_kind(kind));
        }
    }

    Ok(records)
}

pub(super) fn parse_podfile(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    let records = content
        .lines()
        .filter(|l| !l.trim_start().starts_with('#'))
        .filter_map(|l| RE_POD.captures(l))
        .map(|caps| {
            let version = version_or_latest(caps.get(2));
            DependencyRecord::new(&caps[1], version, Ecosystem::Cocoapods)
        })
        .collect();
    Ok(records)
}

/// Parses `require` directives from a go.mod, both single-line and block
/// form. `// indirect` requirements are transitive and skipped.
pub(super) fn parse_go_mod(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    let mut records = Vec::new();
    let mut in_require_block = false;

    for line in content.lines() {
        let trimmed = line.trim();

        if in_require_block {
            if trimmed.starts_with(')') {
                in_require_block = false;
                continue;
            }
        } else if trimmed.starts_with("require") && trimmed.ends_with('(') {
            in_require_block = true;
            continue;
        } else if !trimmed.starts_with("require ") {
            continue;
        }

        if trimmed.starts_with("//") {
            continue;
        }
        if let Some(caps) = RE_GO_REQUIRE.captures(trimmed) {
            if caps.get(3).is_some() {
                continue;
            }
            records.push(DependencyRecord::new(&caps[1], &caps[2], Ecosystem::Go));
        }
    }

    Ok(records)
}
