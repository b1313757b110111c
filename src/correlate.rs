//! Attaches vulnerability records to the dependencies they concern.

use crate::model::{CorrelatedDependency, DependencyRecord, VulnerabilityRecord};
use serde::{Deserialize, Serialize};

/// How loosely a record's product may match a dependency name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Exact product or vendor match, or the product name contains the
    /// dependency name.
    #[default]
    Substring,
    /// Exact product or vendor match only.
    Exact,
}

impl MatchPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchPolicy::Substring => "substring",
            MatchPolicy::Exact => "exact",
        }
    }
}

/// Returns true if `vuln` should be attributed to a dependency named `name`.
///
/// Comparison is case-insensitive against the product the record was
/// fetched for and the vendor field of its affected CPEs.
///
/// # Example
///
/// ```
/// use depwatch::correlate::{matches, MatchPolicy};
/// use depwatch::{Severity, VulnerabilityRecord};
///
/// let record = VulnerabilityRecord {
///     id: "CVE-2021-44228".to_string(),
///     description: String::new(),
///     score: Some(10.0),
///     severity: Severity::Critical,
///     cvss_version: Some("3.1".to_string()),
///     published: String::new(),
///     last_modified: String::new(),
///     affected_products: vec![],
///     references: vec![],
///     url: String::new(),
///     matched_product: Some("log4j-core".to_string()),
/// };
///
/// assert!(matches("log4j", &record, MatchPolicy::Substring));
/// assert!(!matches("log4j", &record, MatchPolicy::Exact));
/// ```
pub fn matches(name: &str, vuln: &VulnerabilityRecord, policy: MatchPolicy) -> bool {
    if name.is_empty() {
        return false;
    }
    let name = name.to_lowercase();

    if let Some(product) = vuln.matched_product.as_deref() {
        let product = product.to_lowercase();
        if product == name {
            return true;
        }
        if policy == MatchPolicy::Substring && product.contains(&name) {
            return true;
        }
    }

    vuln.vendors().any(|vendor| vendor.to_lowercase() == name)
}

/// Pairs every dependency with the records that match it, in record order.
pub fn attach(
    deps: &[DependencyRecord],
    vulns: &[VulnerabilityRecord],
    policy: MatchPolicy,
) -> Vec<CorrelatedDependency> {
    deps.iter()
        .map(|dep| CorrelatedDependency {
            dependency: dep.clone(),
            cves: vulns
                .iter()
                .filter(|v| matches(&dep.name, v, policy))
                .cloned()
                .collect(),
        })
        .collect()
}

/// Keeps only dependencies with at least one attached record.
pub fn vulnerable_only(correlated: Vec<CorrelatedDependency>) -> Vec<CorrelatedDependency> {
    correlated.into_iter().filter(|c| !c.cves.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ecosystem, Severity};

    fn vuln(id: &str, product: &str, cpes: &[&str]) -> VulnerabilityRecord {
        VulnerabilityRecord {
            id: id.to_string(),
            description: String::new(),
            score: Some(7.5),
            severity: Severity::High,
            cvss_version: Some("3.1".to_string()),
            published: "2021-01-01T00:00:00".to_string(),
            last_modified: String::new(),
            affected_products: cpes.iter().map(|c| c.to_string()).collect(),
            references: vec![],
            url: String::new(),
            matched_product: Some(product.to_string()),
        }
    }

    fn dep(name: &str) -> DependencyRecord {
        DependencyRecord::new(name, "1.0.0", Ecosystem::Npm)
    }

    #[test]
    fn test_exact_product_match_is_case_insensitive() {
        let v = vuln("CVE-2021-23337", "Lodash", &[]);
        assert!(matches("lodash", &v, MatchPolicy::Exact));
        assert!(!matches("underscore", &v, MatchPolicy::Exact));
    }

    #[test]
    fn test_vendor_match() {
        let v = vuln("CVE-2021-44228", "logging", &["cpe:2.3:a:apache:log4j:2.0:*:*:*:*:*:*:*"]);
        assert!(matches("Apache", &v, MatchPolicy::Exact));
        assert!(!matches("log4j", &v, MatchPolicy::Exact));
    }

    #[test]
    fn test_substring_only_under_substring_policy() {
        let v = vuln("CVE-2021-44228", "log4j-core", &[]);
        assert!(matches("log4j", &v, MatchPolicy::Substring));
        assert!(!matches("log4j", &v, MatchPolicy::Exact));
        assert!(!matches("", &v, MatchPolicy::Substring));
    }

    #[test]
    fn test_attach_keeps_record_order_and_all_deps() {
        let vulns = vec![
            vuln("CVE-2021-0002", "react-dom", &[]),
            vuln("CVE-2021-0001", "react", &[]),
            vuln("CVE-2021-0003", "vue", &[]),
        ];
        let deps = vec![dep("react"), dep("axios")];

        let correlated = attach(&deps, &vulns, MatchPolicy::Substring);
        assert_eq!(correlated.len(), 2);
        let ids: Vec<_> = correlated[0].cves.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["CVE-2021-0002", "CVE-2021-0001"]);
        assert!(correlated[1].cves.is_empty());

        let exact = attach(&deps, &vulns, MatchPolicy::Exact);
        assert_eq!(exact[0].cves.len(), 1);

        let only = vulnerable_only(correlated);
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].dependency.name, "react");
        assert_eq!(only[0].highest_severity(), Severity::High);
    }
}
