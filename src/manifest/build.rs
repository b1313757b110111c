//! Build descriptors: Maven POMs, Gradle scripts and NuGet packages.config.
//!
//! Maven coordinates are reported by artifact id, which is what keyword
//! searches against the vulnerability database match on.

use super::ManifestError;
use crate::model::{DependencyKind, DependencyRecord, Ecosystem, VERSION_MANAGED};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_POM_DEPENDENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<dependency>(.*?)</dependency>").unwrap());

static RE_POM_ARTIFACT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<artifactId>\s*([^<]+?)\s*</artifactId>").unwrap());

static RE_POM_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<version>\s*([^<]+?)\s*</version>").unwrap());

static RE_POM_SCOPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<scope>\s*([^<]+?)\s*</scope>").unwrap());

static RE_GRADLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?m)^\s*(implementation|api|compile|compileOnly|runtimeOnly|testImplementation|testCompile|testRuntimeOnly|androidTestImplementation|kapt|annotationProcessor)\s*\(?\s*["']([^:"'\s]+):([^:"'\s]+)(?::([^:"'@\s]+))?[^"']*["']"#,
    )
    .unwrap()
});

static RE_NUGET_PACKAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<package\s[^>]*>").unwrap());

static RE_NUGET_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\sid="([^"]+)""#).unwrap());

static RE_NUGET_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\sversion="([^"]+)""#).unwrap());

/// Property placeholders (`${spring.version}`, `$kotlinVersion`) resolve
/// elsewhere in the build.
fn managed_unless_literal(version: Option<&str>) -> String {
    match version {
        Some(v) if !v.is_empty() && !v.contains('$') => v.to_string(),
        _ => VERSION_MANAGED.to_string(),
    }
}

pub(super) fn parse_pom(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    let records = RE_POM_DEPENDENCY
        .captures_iter(content)
        .filter_map(|block| {
            let body = block.get(1)?.as_str();
            let artifact = RE_POM_ARTIFACT.captures(body)?;
            let version = RE_POM_VERSION.captures(body);
            let scope = RE_POM_SCOPE.captures(body);

            let kind = match scope.as_ref().map(|s| &s[1]) {
                Some("test") => DependencyKind::Dev,
                _ => DependencyKind::Prod,
            };
            let version = managed_unless_literal(version.as_ref().map(|v| &v[1]));

            Some(DependencyRecord::new(&artifact[1], version, Ecosystem::Maven).with_kind(kind))
        })
        .collect();
    Ok(records)
}

pub(super) fn parse_gradle(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    let records = RE_GRADLE
        .captures_iter(content)
        .map(|caps| {
            let scope = &caps[1];
            let kind = if scope.starts_with("test") || scope.starts_with("androidTest") {
                DependencyKind::Dev
            } else {
                DependencyKind::Prod
            };
            let version = managed_unless_literal(caps.get(4).map(|m| m.as_str()));
            DependencyRecord::new(&caps[3], version, Ecosystem::Maven).with_kind(kind)
        })
        .collect();
    Ok(records)
}

pub(super) fn parse_packages_config(content: &str) -> Result<Vec<DependencyRecord>, ManifestError> {
    let records = RE_NUGET_PACKAGE
        .find_iter(content)
        .filter_map(|tag| {
            let tag = tag.as_str();
            let id = RE_NUGET_ID.captures(tag)?;
            let version = RE_NUGET_VERSION.captures(tag);
            let kind = if tag.contains(r#"developmentDependency="true""#) {
                DependencyKind::Dev
            } else {
                DependencyKind::Prod
            };
            let version = managed_unless_literal(version.as_ref().map(|v| &v[1]));
            Some(DependencyRecord::new(&id[1], version, Ecosystem::Nuget).with_kind(kind))
        })
        .collect();
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pom_dependencies() {
        let content = r#"<project>
  <dependencies>
    <dependency>
      <groupId>org.apache.logging.log4j</groupId>
      <artifactId>log4j-core</artifactId>
      <version>2.14.1</version>
    </dependency>
    <dependency>
      <groupId>org.springframework.boot</groupId>
      <artifactId>spring-boot-starter-web</artifactId>
    </dependency>
    <dependency>
      <groupId>junit</groupId>
      <artifactId>junit</artifactId>
      <version>${junit.version}</version>
      <scope>test</scope>
    </dependency>
  </dependencies>
</project>"#;
        let records = parse_pom(content).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["log4j-core@2.14.1", "spring-boot-starter-web@managed", "junit@managed"]
        );
        assert_eq!(records[2].kind, DependencyKind::Dev);
        assert_eq!(records[0].ecosystem, Ecosystem::Maven);
    }

    #[test]
    fn test_gradle_groovy_and_kotlin() {
        let content = r#"
dependencies {
    implementation 'com.google.guava:guava:32.1.2-jre'
    implementation("com.squareup.okhttp3:okhttp:4.12.0")
    api "org.slf4j:slf4j-api"
    testImplementation 'org.junit.jupiter:junit-jupiter:5.10.0'
    implementation "org.jetbrains.kotlin:kotlin-stdlib:$kotlinVersion"
}
"#;
        let records = parse_gradle(content).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "guava@32.1.2-jre",
                "okhttp@4.12.0",
                "slf4j-api@managed",
                "junit-jupiter@5.10.0",
                "kotlin-stdlib@managed",
            ]
        );
        assert_eq!(records[3].kind, DependencyKind::Dev);
    }

    #[test]
    fn test_packages_config() {
        let content = r#"<?xml version="1.0" encoding="utf-8"?>
<packages>
  <package id="Newtonsoft.Json" version="13.0.1" targetFramework="net472" />
  <package id="xunit" version="2.4.1" developmentDependency="true" />
</packages>"#;
        let records = parse_packages_config(content).unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["Newtonsoft.Json@13.0.1", "xunit@2.4.1"]);
        assert_eq!(records[1].kind, DependencyKind::Dev);
    }
}
