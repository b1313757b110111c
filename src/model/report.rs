use super::{CorrelatedDependency, ScanResult, Severity, VulnerabilityRecord};
use serde::{Deserialize, Serialize};

/// A scan together with the vulnerabilities found for its dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub scan: ScanResult,
    pub vulnerabilities: Vec<VulnerabilityRecord>,
    /// Dependencies with at least one attached vulnerability.
    pub vulnerable: Vec<CorrelatedDependency>,
    pub failed_products: Vec<String>,
    pub rate_limited: bool,
}

impl AuditReport {
    pub fn count_at(&self, severity: Severity) -> usize {
        self.vulnerabilities
            .iter()
            .filter(|v| v.severity == severity)
            .count()
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.vulnerabilities.iter().map(|v| v.severity).max()
    }
}
