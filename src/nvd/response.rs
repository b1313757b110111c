//! Validation and transformation of CVE API responses.
//!
//! A response is checked as a whole before any record is built: one entry
//! with a missing or malformed id rejects the entire keyword.

use super::FetchError;
use crate::model::{Severity, VulnerabilityRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static RE_CVE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^CVE-[0-9]{4}-[0-9]{4,}$").unwrap());

const MAX_ID_LEN: usize = 32;
const MAX_DESCRIPTION_CHARS: usize = 1000;
const MAX_AFFECTED_PRODUCTS: usize = 50;
const MAX_REFERENCES: usize = 5;
const DETAIL_URL: &str = "https://nvd.nist.gov/vuln/detail/";

pub fn is_valid_cve_id(id: &str) -> bool {
    id.len() <= MAX_ID_LEN && RE_CVE_ID.is_match(id)
}

/// Strips control characters, trims, and caps `input` at `max_chars`
/// characters (the last three become `...` when cut).
pub fn sanitize_text(input: &str, max_chars: usize) -> String {
    let cleaned: String = input
        .chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        return cleaned.to_string();
    }
    let mut cut: String = cleaned.chars().take(max_chars.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

/// Checks the structural shape of a search response.
pub fn validate(body: &Value) -> Result<(), FetchError> {
    let root = body
        .as_object()
        .ok_or_else(|| FetchError::Validation("response root is not an object".to_string()))?;

    let Some(items) = root.get("vulnerabilities") else {
        return Ok(());
    };
    let items = items
        .as_array()
        .ok_or_else(|| FetchError::Validation("vulnerabilities is not an array".to_string()))?;

    for (i, item) in items.iter().enumerate() {
        let cve = item
            .get("cve")
            .filter(|c| c.is_object())
            .ok_or_else(|| FetchError::Validation(format!("entry {} has no cve object", i)))?;
        let id = cve
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::Validation(format!("entry {} has no id", i)))?;
        if !is_valid_cve_id(id) {
            return Err(FetchError::Validation(format!(
                "entry {} has malformed id {:?}",
                i,
                sanitize_text(id, 40)
            )));
        }
    }
    Ok(())
}

/// Validates `body` and converts every entry into a [`VulnerabilityRecord`].
pub fn parse_response(body: &Value) -> Result<Vec<VulnerabilityRecord>, FetchError> {
    validate(body)?;

    let records = body
        .get("vulnerabilities")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(|item| transform(&item["cve"])).collect())
        .unwrap_or_default();
    Ok(records)
}

fn severity_from_score(score: f64) -> Severity {
    if score >= 9.0 {
        Severity::Critical
    } else if score >= 7.0 {
        Severity::High
    } else if score >= 4.0 {
        Severity::Medium
    } else if score > 0.0 {
        Severity::Low
    } else {
        Severity::None
    }
}

fn v2_severity(score: f64) -> Severity {
    if score >= 7.0 {
        Severity::High
    } else if score >= 4.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Picks the preferred CVSS metric: 3.1, then 3.0, then 2.0.
fn cvss(metrics: &Value) -> Option<(f64, Severity, &'static str)> {
    for (key, version) in [("cvssMetricV31", "3.1"), ("cvssMetricV30", "3.0")] {
        let Some(data) = metrics[key].get(0).map(|m| &m["cvssData"]) else {
            continue;
        };
        let Some(score) = data["baseScore"].as_f64() else {
            continue;
        };
        let severity = data["baseSeverity"]
            .as_str()
            .and_then(Severity::from_label)
            .unwrap_or_else(|| severity_from_score(score));
        return Some((score, severity, version));
    }

    let score = metrics["cvssMetricV2"].get(0)?["cvssData"]["baseScore"].as_f64()?;
    Some((score, v2_severity(score), "2.0"))
}

fn description(cve: &Value) -> String {
    let descriptions = cve["descriptions"].as_array();
    let chosen = descriptions.and_then(|d| {
        d.iter()
            .find(|entry| entry["lang"].as_str() == Some("en"))
            .or_else(|| d.first())
    });
    let text = chosen.and_then(|d| d["value"].as_str()).unwrap_or_default();
    sanitize_text(text, MAX_DESCRIPTION_CHARS)
}

fn affected_products(cve: &Value) -> Vec<String> {
    let Some(configurations) = cve["configurations"].as_array() else {
        return Vec::new();
    };
    configurations
        .iter()
        .filter_map(|c| c["nodes"].as_array())
        .flatten()
        .filter_map(|node| node["cpeMatch"].as_array())
        .flatten()
        .filter(|m| m["vulnerable"].as_bool() == Some(true))
        .filter_map(|m| m["criteria"].as_str())
        .take(MAX_AFFECTED_PRODUCTS)
        .map(str::to_string)
        .collect()
}

fn references(cve: &Value) -> Vec<String> {
    cve["references"]
        .as_array()
        .map(|refs| {
            refs.iter()
                .filter_map(|r| r["url"].as_str())
                .filter(|url| url.starts_with("https://"))
                .take(MAX_REFERENCES)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn transform(cve: &Value) -> VulnerabilityRecord {
    let id = cve["id"].as_str().unwrap_or_default().to_string();
    let metric = cvss(&cve["metrics"]);

    VulnerabilityRecord {
        description: description(cve),
        score: metric.map(|(score, _, _)| score),
        severity: metric.map(|(_, severity, _)| severity).unwrap_or(Severity::None),
        cvss_version: metric.map(|(_, _, version)| version.to_string()),
        published: cve["published"].as_str().unwrap_or_default().to_string(),
        last_modified: cve["lastModified"].as_str().unwrap_or_default().to_string(),
        affected_products: affected_products(cve),
        references: references(cve),
        url: format!("{}{}", DETAIL_URL, id),
        matched_product: None,
        id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log4shell() -> Value {
        json!({
            "resultsPerPage": 1,
            "totalResults": 1,
            "vulnerabilities": [{
                "cve": {
                    "id": "CVE-2021-44228",
                    "published": "2021-12-10T10:15:09.143",
                    "lastModified": "2023-11-07T03:39:36.747",
                    "descriptions": [
                        {"lang": "es", "value": "Apache Log4j2 ... (es)"},
                        {"lang": "en", "value": "  Apache Log4j2\nJNDI features\u{7} do not protect.  "}
                    ],
                    "metrics": {
                        "cvssMetricV31": [{"cvssData": {"baseScore": 10.0, "baseSeverity": "CRITICAL"}}],
                        "cvssMetricV2": [{"cvssData": {"baseScore": 9.3}}]
                    },
                    "configurations": [{
                        "nodes": [{
                            "cpeMatch": [
                                {"vulnerable": true, "criteria": "cpe:2.3:a:apache:log4j:*:*:*:*:*:*:*:*"},
                                {"vulnerable": false, "criteria": "cpe:2.3:o:debian:debian_linux:9.0:*:*:*:*:*:*:*"}
                            ]
                        }]
                    }],
                    "references": [
                        {"url": "http://packetstormsecurity.com/files/165225"},
                        {"url": "https://logging.apache.org/log4j/2.x/security.html"}
                    ]
                }
            }]
        })
    }

    #[test]
    fn test_transform_full_record() {
        let records = parse_response(&log4shell()).unwrap();
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.id, "CVE-2021-44228");
        assert_eq!(r.score, Some(10.0));
        assert_eq!(r.severity, Severity::Critical);
        assert_eq!(r.cvss_version.as_deref(), Some("3.1"));
        assert_eq!(r.description, "Apache Log4j2 JNDI features do not protect.");
        assert_eq!(r.affected_products, vec!["cpe:2.3:a:apache:log4j:*:*:*:*:*:*:*:*"]);
        assert_eq!(r.references, vec!["https://logging.apache.org/log4j/2.x/security.html"]);
        assert_eq!(r.url, "https://nvd.nist.gov/vuln/detail/CVE-2021-44228");
        assert!(r.matched_product.is_none());
    }

    #[test]
    fn test_v30_preferred_over_v2() {
        let body = json!({"vulnerabilities": [{"cve": {
            "id": "CVE-2019-10744",
            "metrics": {
                "cvssMetricV30": [{"cvssData": {"baseScore": 9.1}}],
                "cvssMetricV2": [{"cvssData": {"baseScore": 6.4}}]
            }
        }}]});
        let r = &parse_response(&body).unwrap()[0];
        assert_eq!(r.cvss_version.as_deref(), Some("3.0"));
        assert_eq!(r.severity, Severity::Critical);
    }

    #[test]
    fn test_v2_buckets() {
        for (score, expected) in [(7.5, Severity::High), (4.0, Severity::Medium), (2.1, Severity::Low)] {
            let body = json!({"vulnerabilities": [{"cve": {
                "id": "CVE-2010-0001",
                "metrics": {"cvssMetricV2": [{"cvssData": {"baseScore": score}}]}
            }}]});
            let r = &parse_response(&body).unwrap()[0];
            assert_eq!(r.severity, expected, "score {}", score);
            assert_eq!(r.cvss_version.as_deref(), Some("2.0"));
        }
    }

    #[test]
    fn test_no_metrics_means_no_severity() {
        let body = json!({"vulnerabilities": [{"cve": {"id": "CVE-2024-12345"}}]});
        let r = &parse_response(&body).unwrap()[0];
        assert_eq!(r.severity, Severity::None);
        assert!(r.score.is_none());
        assert!(r.cvss_version.is_none());
        assert_eq!(r.description, "");
    }

    #[test]
    fn test_description_falls_back_to_first() {
        let body = json!({"vulnerabilities": [{"cve": {
            "id": "CVE-2024-0001",
            "descriptions": [{"lang": "fr", "value": "Une faille"}]
        }}]});
        assert_eq!(parse_response(&body).unwrap()[0].description, "Une faille");
    }

    #[test]
    fn test_caps() {
        let refs: Vec<Value> = (0..8)
            .map(|i| json!({"url": format!("https://example.com/{}", i)}))
            .collect();
        let matches: Vec<Value> = (0..60)
            .map(|i| json!({"vulnerable": true, "criteria": format!("cpe:2.3:a:v:p{}:*", i)}))
            .collect();
        let body = json!({"vulnerabilities": [{"cve": {
            "id": "CVE-2024-0002",
            "descriptions": [{"lang": "en", "value": "x".repeat(1500)}],
            "references": refs,
            "configurations": [{"nodes": [{"cpeMatch": matches}]}]
        }}]});
        let r = &parse_response(&body).unwrap()[0];
        assert_eq!(r.references.len(), 5);
        assert_eq!(r.affected_products.len(), 50);
        assert_eq!(r.description.chars().count(), 1000);
        assert!(r.description.ends_with("..."));
    }

    #[test]
    fn test_validation_rejects_whole_response() {
        let body = json!({"vulnerabilities": [
            {"cve": {"id": "CVE-2021-44228"}},
            {"cve": {"id": "GHSA-jfh8-c2jp-5v3q"}}
        ]});
        assert!(matches!(parse_response(&body), Err(FetchError::Validation(_))));

        let long = format!("CVE-2021-{}", "1".repeat(30));
        let body = json!({"vulnerabilities": [{"cve": {"id": long}}]});
        assert!(matches!(parse_response(&body), Err(FetchError::Validation(_))));

        assert!(matches!(parse_response(&json!([])), Err(FetchError::Validation(_))));
        assert!(matches!(
            parse_response(&json!({"vulnerabilities": {}})),
            Err(FetchError::Validation(_))
        ));
        assert!(matches!(
            parse_response(&json!({"vulnerabilities": [{"id": "CVE-2021-44228"}]})),
            Err(FetchError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_vulnerabilities_is_empty() {
        assert!(parse_response(&json!({"totalResults": 0})).unwrap().is_empty());
    }

    #[test]
    fn test_cve_id_format() {
        assert!(is_valid_cve_id("CVE-2021-44228"));
        assert!(is_valid_cve_id("CVE-1999-0001"));
        assert!(!is_valid_cve_id("CVE-21-44228"));
        assert!(!is_valid_cve_id("CVE-2021-123"));
        assert!(!is_valid_cve_id("cve-2021-44228"));
        assert!(!is_valid_cve_id("CVE-2021-44228\n"));
        assert!(!is_valid_cve_id("CVE-\u{662}\u{660}\u{662}\u{661}-\u{664}\u{664}\u{662}\u{662}"));
        assert!(!is_valid_cve_id("CVE-\u{ff12}\u{ff10}\u{ff12}\u{ff11}-44228"));
    }

    #[test]
    fn test_sanitize_text() {
        assert_eq!(sanitize_text("\u{1b}[31mred\u{1b}[0m", 100), "[31mred[0m");
        assert_eq!(sanitize_text("abcdef", 5), "ab...");
        assert_eq!(sanitize_text("  ok\t ", 5), "ok");
    }
}
