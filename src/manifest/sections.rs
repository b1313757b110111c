//! Section-bounded manifests (TOML and YAML), read with bounded regex
//! heuristics rather than full grammars.

use super::{clean_version, lines, ManifestError};
use crate::model::{DependencyKind, DependencyRecord, Ecosystem, VERSION_LATEST};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_TOML_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*([A-Za-z0-9_.\-]+)[ \t]*=[ \t]*(.+?)[ \t]*$").unwrap());

static RE_INLINE_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"version\s*=\s*["']([^"']*)["']"#).unwrap());

static RE_QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["']([^"']*)["']"#).unwrap());

static RE_PEP621_DEPS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)(?:^|\n)dependencies\s*=\s*\[(.*?)\]").unwrap());

static RE_YAML_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^ {2}([A-Za-z0-9_\-]+):[ \t]*(.*?)[ \t]*$").unwrap());

/// Body of a TOML table: everything after `[header]` up to the next line
/// that opens a table, or the end of input.
fn toml_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let pattern = format!(r"(?ms)^\[{}\][ \t]*$(.*?)(?:^\[|\z)", regex::escape(header));
    let re = Regex::new(&pattern).ok()?;
    re.captures(content).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Body of a top-level YAML mapping: everything after `key:` up to the next
/// unindented line, or the end of input.
fn yaml_section<'a>(content: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!(r"(?ms)^{}:[ \t]*$(.*?)(?:^\S|\z)", regex::escape(key));
    let re = Regex::new(&pattern).ok()?;
    re.captures(content).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Extracts `name = "constraint"` and `name = { version = "..." }` pairs
/// from a TOML table body. Other value shapes are skipped.
fn toml_pairs(body: &str, ecosystem: Ecosystem, kind: DependencyKind) -> Vec<DependencyRecord> {
    RE_TOML_PAIR
        .captures_iter(body)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str();
            let value = caps.get(2)?.as_str();

            let version = if value.starts_with('{') {
                RE_INLINE_VERSION
                    .captures(value)
                    .map(|v| clean_version(&v[1]))
                    .unwrap_or_else(|| VERSION_LATEST.to_string())
            } else if value.starts_with('"') || value.starts_with('\'') {
                clean_version(&RE_QUOTED.captures(value)?[1])
            } else {
                return None;
            };

            Some(DependencyRecord::new(name, version, ecosystem).with_kind(kind))
        })
        .collect()
}

fn collect_toml_sections(
    content: &str,
    sections: &[(&str, DependencyKind)],
    ecosystem: Ecosystem,
) -> Vec<DependencyRecord> {
    sections
        .iter()
        .filter_map(|(header, kind)| toml_section(content, header).map(|body| (body, *kind)))
        .flat_map(|(body, kind)| toml_pairs(body, ecosystem, kind))
        .collect()
}

pub(super) fn parse_cargo_toml(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    Ok(collect_toml_sections(
        content,
        &[
            ("dependencies", DependencyKind::Prod),
            ("dev-dependencies", DependencyKind::Dev),
        ],
        Ecosystem::Cargo,
    ))
}

pub(super) fn parse_pipfile(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    Ok(collect_toml_sections(
        content,
        &[
            ("packages", DependencyKind::Prod),
            ("dev-packages", DependencyKind::Dev),
        ],
        Ecosystem::Pypi,
    ))
}

/// Parses Poetry tables and, failing those, a PEP 621 `[project]`
/// `dependencies` array.
pub(super) fn parse_pyproject(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    let poetry: Vec<DependencyRecord> = collect_toml_sections(
        content,
        &[
            ("tool.poetry.dependencies", DependencyKind::Prod),
            ("tool.poetry.dev-dependencies", DependencyKind::Dev),
            ("tool.poetry.group.dev.dependencies", DependencyKind::Dev),
        ],
        Ecosystem::Pypi,
    )
    .into_iter()
    .filter(|r| !r.name.eq_ignore_ascii_case("python"))
    .collect();

    if !poetry.is_empty() {
        return Ok(poetry);
    }

    let Some(project) = toml_section(content, "project") else {
        return Ok(Vec::new());
    };
    let Some(array) = RE_PEP621_DEPS.captures(project).and_then(|c| c.get(1)) else {
        return Ok(Vec::new());
    };

    let requirements: Vec<&str> = RE_QUOTED
        .captures_iter(array.as_str())
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    lines::parse_requirements(&requirements.join("\n"))
}

/// Parses `dependencies:` and `dev_dependencies:` from a pubspec. Entries
/// with a nested mapping (sdk, git or path sources) carry no version.
pub(super) fn parse_pubspec(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    let mut records = Vec::new();

    for (key, kind) in [
        ("dependencies", DependencyKind::Prod),
        ("dev_dependencies", DependencyKind::Dev),
    ] {
        let Some(body) = yaml_section(content, key) else {
            continue;
        };
        for caps in RE_YAML_PAIR.captures_iter(body) {
            let value = caps[2].trim_matches(|c: char| c == '"' || c == '\'');
            let version = if value.is_empty() {
                VERSION_LATEST.to_string()
            } else {
                clean_version(value)
            };
            records.push(DependencyRecord::new(&caps[1], version, Ecosystem::Pub).with_kind(kind));
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cargo_toml_sections() {
        let content = r#"[package]
name = "demo"
version = "0.1.0"

[dependencies]
serde = { version = "1.0", features = ["derive"] }
tokio = "1.35"
local = { path = "../local" }
anyhow = "^1"

[dev-dependencies]
tempfile = "3"

[workspace.dependencies]
ignored = "9.9"
"#;
        let records = parse_cargo_toml(content).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["serde@1.0", "tokio@1.35", "local@latest", "anyhow@1", "tempfile@3"]
        );
        assert_eq!(records[4].kind, DependencyKind::Dev);
        assert!(records.iter().all(|r| r.name != "name" && r.name != "version"));
    }

    #[test]
    fn test_cargo_toml_section_at_end_of_file() {
        let records = parse_cargo_toml("[dependencies]\nrand = \"0.8.5\"").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "rand@0.8.5");
    }

    #[test]
    fn test_pipfile() {
        let content = r#"[[source]]
url = "https://pypi.org/simple"

[packages]
requests = "*"
django = ">=4.0"
celery = {version = "==5.3.1", extras = ["redis"]}

[dev-packages]
pytest = "~=7.4"

[requires]
python_version = "3.11"
"#;
        let records = parse_pipfile(content).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["requests@latest", "django@4.0", "celery@5.3.1", "pytest@7.4"]);
        assert_eq!(records[3].kind, DependencyKind::Dev);
    }

    #[test]
    fn test_pyproject_poetry() {
        let content = r#"[tool.poetry]
name = "svc"

[tool.poetry.dependencies]
python = "^3.10"
fastapi = "^0.104.0"

[tool.poetry.group.dev.dependencies]
black = "^23.0"
"#;
        let records = parse_pyproject(content).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["fastapi@0.104.0", "black@23.0"]);
    }

    #[test]
    fn test_pyproject_pep621() {
        let content = r#"[project]
name = "lib"
dependencies = [
    "httpx>=0.25",
    "pydantic==2.5.0",
]

[build-system]
requires = ["hatchling"]
"#;
        let records = parse_pyproject(content).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["httpx@0.25", "pydantic@2.5.0"]);
    }

    #[test]
    fn test_pubspec() {
        let content = "name: app\n\ndependencies:\n  flutter:\n    sdk: flutter\n  http: ^1.1.0\n  provider: '6.0.5'\n\ndev_dependencies:\n  lints: ^3.0.0\n\nflutter:\n  uses-material-design: true\n";
        let records = parse_pubspec(content).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["flutter@latest", "http@1.1.0", "provider@6.0.5", "lints@3.0.0"]);
        assert_eq!(records[3].kind, DependencyKind::Dev);
    }
}
