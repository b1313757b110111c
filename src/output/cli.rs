use crate::model::{AuditReport, FolderNode, ScanResult, Severity};
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "Project")]
    path: String,
    #[tabled(rename = "Manifests")]
    manifests: String,
    #[tabled(rename = "Ecosystems")]
    ecosystems: String,
    #[tabled(rename = "Packages")]
    packages: usize,
}

#[derive(Tabled)]
struct VulnRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Dependency")]
    dependency: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "CVE")]
    cve: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Description")]
    description: String,
}

fn relative_path(node: &FolderNode, root: &Path) -> String {
    match node.path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.display().to_string(),
        Err(_) => node.path.display().to_string(),
    }
}

fn project_rows(result: &ScanResult) -> Vec<ProjectRow> {
    let Some(tree) = &result.tree else {
        return Vec::new();
    };

    tree.walk()
        .into_iter()
        .filter(|n| n.is_project)
        .map(|n| {
            let mut ecosystems: Vec<&str> = n
                .dependency_files
                .iter()
                .map(|f| f.ecosystem.display_name())
                .collect();
            ecosystems.dedup();
            ProjectRow {
                path: truncate(&relative_path(n, &result.root_path), 50),
                manifests: n
                    .dependency_files
                    .iter()
                    .map(|f| f.file_name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                ecosystems: ecosystems.join(", "),
                packages: n.dependency_files.iter().map(|f| f.packages.len()).sum(),
            }
        })
        .collect()
}

pub fn print_scan_table(result: &ScanResult) -> Result<()> {
    println!();
    println!(
        "Scanned {} at: {}",
        result.root_path.display(),
        result.scanned_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    let rows = project_rows(result);
    if rows.is_empty() {
        println!("No dependency manifests found.");
    } else {
        println!("Found {} projects:", rows.len());
        println!();
        let table = Table::new(rows).with(Style::rounded()).to_string();
        println!("{}", table);
    }

    println!();
    print_scan_summary(result);
    Ok(())
}

fn print_scan_summary(result: &ScanResult) {
    let mut by_ecosystem: HashMap<&str, usize> = HashMap::new();
    for dep in result.dependencies() {
        *by_ecosystem.entry(dep.ecosystem.display_name()).or_default() += 1;
    }

    println!("Summary:");
    println!("  Projects: {}", result.total_projects);
    println!("  Total packages: {}", result.total_packages);
    if by_ecosystem.len() > 1 {
        let mut parts: Vec<String> = by_ecosystem
            .iter()
            .map(|(e, c)| format!("{} {}", c, e))
            .collect();
        parts.sort();
        println!("  By ecosystem: {}", parts.join(", "));
    }
    println!(
        "  Folders scanned: {}, entries scanned: {}",
        result.folders_scanned, result.files_scanned
    );
    if let Some(error) = &result.error {
        println!("  Error: {}", error);
    }
}

pub fn print_audit_table(report: &AuditReport) -> Result<()> {
    print_scan_table(&report.scan)?;

    if report.vulnerable.is_empty() {
        println!();
        println!("No known vulnerabilities found.");
    } else {
        let mut rows: Vec<(Severity, VulnRow)> = report
            .vulnerable
            .iter()
            .flat_map(|c| {
                c.cves.iter().map(move |v| {
                    (
                        v.severity,
                        VulnRow {
                            severity: format_severity(&v.severity),
                            dependency: truncate(&c.dependency.name, 30),
                            version: c.dependency.version.clone(),
                            cve: v.id.clone(),
                            score: v.score.map(|s| format!("{:.1}", s)).unwrap_or_else(|| "-".to_string()),
                            description: truncate(&v.description, 50),
                        },
                    )
                })
            })
            .collect();
        rows.sort_by(|a, b| b.0.cmp(&a.0));

        println!();
        println!(
            "Found {} vulnerable dependencies ({} CVEs):",
            report.vulnerable.len(),
            report.vulnerabilities.len()
        );
        println!();
        let table = Table::new(rows.into_iter().map(|(_, row)| row))
            .with(Style::rounded())
            .to_string();
        println!("{}", table);
    }

    println!();
    print_audit_summary(report);
    Ok(())
}

fn print_audit_summary(report: &AuditReport) {
    println!(
        "  Vulnerabilities: {} critical, {} high, {} medium, {} low",
        report.count_at(Severity::Critical),
        report.count_at(Severity::High),
        report.count_at(Severity::Medium),
        report.count_at(Severity::Low)
    );

    if !report.failed_products.is_empty() {
        println!(
            "  Lookups failed for {} products: {}",
            report.failed_products.len(),
            truncate(&report.failed_products.join(", "), 80)
        );
    }
    if report.rate_limited {
        println!("  The NVD API rate limit was hit; set nvd_api_key in the config file or retry later.");
    }

    let score = calculate_health_score(report);
    println!();
    println!("Health Score: {}/100 {}", score, health_score_indicator(score));
}

fn format_severity(severity: &Severity) -> String {
    match severity {
        Severity::Critical => "\x1b[31mCRITICAL\x1b[0m".to_string(),
        Severity::High => "\x1b[91mHIGH\x1b[0m".to_string(),
        Severity::Medium => "\x1b[33mMEDIUM\x1b[0m".to_string(),
        Severity::Low => "\x1b[32mLOW\x1b[0m".to_string(),
        Severity::None => "NONE".to_string(),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// Calculate a health score (0-100) from the vulnerabilities attached to
/// dependencies.
fn calculate_health_score(report: &AuditReport) -> u8 {
    if report.scan.total_packages == 0 {
        return 100;
    }

    let mut score: i32 = 100;
    for dep in &report.vulnerable {
        for vuln in &dep.cves {
            score -= match vuln.severity {
                Severity::Critical => 25,
                Severity::High => 15,
                Severity::Medium => 8,
                Severity::Low => 3,
                Severity::None => 1,
            };
        }
    }

    score.clamp(0, 100) as u8
}

fn health_score_indicator(score: u8) -> &'static str {
    match score {
        90..=100 => "[Excellent]",
        70..=89 => "[Good]",
        50..=69 => "[Fair]",
        25..=49 => "[Poor]",
        _ => "[Critical]",
    }
}
