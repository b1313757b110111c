//! Lockfiles made of indentation- or blank-line-delimited records.

use super::ManifestError;
use crate::model::{DependencyRecord, Ecosystem};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_BLOCK_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n[ \t]*\r?\n").unwrap());

static RE_YARN_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^"?(@?[^@"\s,]+)@"#).unwrap());

static RE_YARN_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^\s+version:?\s+"?([^"\s]+)"?"#).unwrap());

static RE_CARGO_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^name\s*=\s*"([^"]+)""#).unwrap());

static RE_CARGO_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^version\s*=\s*"([^"]+)""#).unwrap());

static RE_CARGO_SOURCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^source\s*=").unwrap());

// Top-level specs sit at exactly four spaces; six and more are their own
// dependencies.
static RE_GEM_SPEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ {4}([A-Za-z0-9_.\-]+) \(([^)]+)\)\s*$").unwrap());

/// Parses a yarn lockfile, classic (`version "1.2.3"`) or berry
/// (`version: 1.2.3`).
pub(super) fn parse_yarn_lock(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    let mut records = Vec::new();

    for block in RE_BLOCK_SPLIT.split(content) {
        let Some(header) = block
            .lines()
            .map(str::trim_end)
            .find(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with(' '))
        else {
            continue;
        };

        let Some(name) = RE_YARN_HEADER.captures(header) else {
            continue;
        };
        let Some(version) = RE_YARN_VERSION.captures(block) else {
            continue;
        };

        records.push(DependencyRecord::new(&name[1], &version[1], Ecosystem::Npm));
    }

    Ok(records)
}

/// Parses `[[package]]` blocks from a Cargo.lock. Packages without a
/// `source` are workspace members and not third-party dependencies.
pub(super) fn parse_cargo_lock(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    let records = RE_BLOCK_SPLIT
        .split(content)
        .filter(|block| block.trim_start().starts_with("[[package]]"))
        .filter(|block| RE_CARGO_SOURCE.is_match(block))
        .filter_map(|block| {
            let name = RE_CARGO_NAME.captures(block)?;
            let version = RE_CARGO_VERSION.captures(block)?;
            Some(DependencyRecord::new(&name[1], &version[1], Ecosystem::Cargo))
        })
        .collect();
    Ok(records)
}

/// Reads the `specs:` bodies of a Gemfile.lock. A `specs:` block runs until
/// the next section key, blank line or section header.
pub(super) fn parse_gemfile_lock(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    let mut records = Vec::new();
    let mut in_specs = false;

    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || !line.starts_with(' ') {
            in_specs = false;
            continue;
        }
        // Two-space lines are keys of the enclosing section.
        if !line.starts_with("   ") {
            in_specs = line.trim() == "specs:";
            continue;
        }
        if !in_specs {
            continue;
        }
        if let Some(caps) = RE_GEM_SPEC.captures(line) {
            records.push(DependencyRecord::new(&caps[1], &caps[2], Ecosystem::Rubygems));
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yarn_classic_blocks() {
        let content = r#"# THIS IS AN AUTOGENERATED FILE. DO NOT EDIT THIS FILE DIRECTLY.
# yarn lockfile v1


"@babel/code-frame@^7.0.0", "@babel/code-frame@^7.22.13":
  version "7.22.13"
  resolved "https://registry.yarnpkg.com/@babel/code-frame/-/code-frame-7.22.13.tgz"
  dependencies:
    "@babel/highlight" "^7.22.13"

lodash@^4.17.21:
  version "4.17.21"
  resolved "https://registry.yarnpkg.com/lodash/-/lodash-4.17.21.tgz"
"#;
        let records = parse_yarn_lock(content).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["@babel/code-frame@7.22.13", "lodash@4.17.21"]);
    }

    #[test]
    fn test_yarn_berry_blocks() {
        let content = "__metadata:\n  version: 6\n\n\"react@npm:^18.2.0\":\n  version: 18.2.0\n  resolution: \"react@npm:18.2.0\"\n";
        let records = parse_yarn_lock(content).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "react@18.2.0");
    }

    #[test]
    fn test_cargo_lock_skips_workspace_members() {
        let content = r#"# This file is automatically @generated by Cargo.
version = 3

[[package]]
name = "myapp"
version = "0.1.0"
dependencies = [
 "serde",
]

[[package]]
name = "serde"
version = "1.0.193"
source = "registry+https://github.com/rust-lang/crates.io-index"
checksum = "25dd9975e68d0cb5aa1120c288333fc98731bd1dd12f561e468ea4728c042b89"

[[package]]
name = "itoa"
version = "1.0.9"
source = "registry+https://github.com/rust-lang/crates.io-index"
"#;
        let records = parse_cargo_lock(content).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["serde@1.0.193", "itoa@1.0.9"]);
        assert_eq!(records[0].ecosystem, Ecosystem::Cargo);
    }

    #[test]
    fn test_gemfile_lock_top_level_specs_only() {
        let content = "\
GEM
  remote: https://rubygems.org/
  specs:
    actionpack (7.0.4)
      actionview (= 7.0.4)
      rack (~> 2.0, >= 2.2.0)
    nokogiri (1.14.0-x86_64-linux)
      racc (~> 1.4)
    rack (2.2.6)

PLATFORMS
  x86_64-linux

DEPENDENCIES
  actionpack
";
        let records = parse_gemfile_lock(content).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["actionpack@7.0.4", "nokogiri@1.14.0-x86_64-linux", "rack@2.2.6"]
        );
    }

    #[test]
    fn test_gemfile_lock_ignores_entries_outside_specs() {
        let content = "\
GIT
  remote: https://github.com/rails/rails.git
  revision: 0a1b2c3d
  specs:
    rails (7.1.0.alpha)

PATH
  remote: .
  glob:
    stray (0.0.1)
  specs:
    mygem (0.1.0)
  extra:
    other (9.9.9)

PLATFORMS
    ruby (3.2.2)

BUNDLED WITH
   2.4.10
";
        let records = parse_gemfile_lock(content).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["rails@7.1.0.alpha", "mygem@0.1.0"]);
    }
}
