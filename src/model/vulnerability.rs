use super::DependencyRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::None => "none",
        }
    }

    /// Parses an NVD `baseSeverity` label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_uppercase().as_str() {
            "CRITICAL" => Some(Severity::Critical),
            "HIGH" => Some(Severity::High),
            "MEDIUM" => Some(Severity::Medium),
            "LOW" => Some(Severity::Low),
            "NONE" => Some(Severity::None),
            _ => None,
        }
    }

    pub fn is_high_or_worse(&self) -> bool {
        *self >= Severity::High
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A CVE record as returned by the vulnerability database, already
/// validated and sanitized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityRecord {
    pub id: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cvss_version: Option<String>,
    pub published: String,
    pub last_modified: String,
    pub affected_products: Vec<String>,
    pub references: Vec<String>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_product: Option<String>,
}

impl VulnerabilityRecord {
    /// Vendor fields of the affected CPE names (`cpe:2.3:a:<vendor>:<product>:...`).
    pub fn vendors(&self) -> impl Iterator<Item = &str> {
        self.affected_products
            .iter()
            .filter_map(|cpe| cpe.split(':').nth(3))
            .filter(|v| !v.is_empty() && *v != "*")
    }

    /// Publication time, `None` when the timestamp is not in NVD format.
    pub fn published_at(&self) -> Option<chrono::NaiveDateTime> {
        parse_nvd_timestamp(&self.published)
    }
}

/// NVD timestamps look like `2021-12-10T10:15:09.143`, sometimes with a
/// trailing `Z` or offset.
pub fn parse_nvd_timestamp(value: &str) -> Option<chrono::NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok()
}

/// A dependency together with the vulnerability records attributed to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedDependency {
    #[serde(flatten)]
    pub dependency: DependencyRecord,
    pub cves: Vec<VulnerabilityRecord>,
}

impl CorrelatedDependency {
    pub fn highest_severity(&self) -> Severity {
        self.cves
            .iter()
            .map(|c| c.severity)
            .max()
            .unwrap_or(Severity::None)
    }
}
