//! Configuration file handling.
//!
//! # Configuration Location
//!
//! The configuration file is stored at:
//! - Linux: `~/.config/depwatch/config.toml`
//! - macOS: `~/Library/Application Support/depwatch/config.toml`
//! - Windows: `%APPDATA%\depwatch\config.toml`
//!
//! # Example Configuration
//!
//! ```toml
//! max_depth = 5
//! results_per_product = 20
//! nvd_api_key = "00000000-0000-0000-0000-000000000000"
//! match_policy = "exact"
//! default_format = "table"
//!
//! [ignore]
//! packages = ["@types/*", "eslint*"]
//! vulnerabilities = ["CVE-2021-23337"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::correlate::MatchPolicy;
use crate::nvd::{self, ClientOptions};
use crate::scanner::{self, ScanLimits};

/// Application configuration.
///
/// Missing keys fall back to their defaults, so a config file only needs
/// to list what it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deepest directory level scanned below the root (root is 0).
    pub max_depth: usize,

    /// `resultsPerPage` sent with every keyword search.
    pub results_per_product: usize,

    /// CVE API endpoint.
    pub nvd_api_url: String,

    /// Optional NVD API key, sent as the `apiKey` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nvd_api_key: Option<String>,

    pub request_timeout_secs: u64,

    /// Products looked up concurrently per batch, between 1 and 5.
    pub batch_size: usize,

    /// Pause between batches, in milliseconds.
    pub batch_delay_ms: u64,

    pub cache_ttl_secs: u64,

    pub cache_max_entries: usize,

    /// Alert on new high and critical vulnerabilities after an audit.
    pub notify_high_severity: bool,

    pub match_policy: MatchPolicy,

    /// Valid values: "table", "json"
    pub default_format: String,

    /// Ignore list configuration for suppressing known issues.
    pub ignore: IgnoreConfig,
}

/// Configuration for ignoring specific packages or vulnerabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IgnoreConfig {
    /// Dependency names excluded from lookups and reports.
    /// Supports glob patterns (e.g., "lodash*", "@types/*").
    pub packages: Vec<String>,

    /// Vulnerability ids never reported (e.g., "CVE-2021-12345").
    pub vulnerabilities: Vec<String>,
}

impl IgnoreConfig {
    pub fn should_ignore_package(&self, name: &str) -> bool {
        self.packages.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, name)
            } else {
                pattern == name
            }
        })
    }

    pub fn should_ignore_vulnerability(&self, vuln_id: &str) -> bool {
        self.vulnerabilities
            .iter()
            .any(|id| id.eq_ignore_ascii_case(vuln_id))
    }
}

/// Simple glob matching (supports * as wildcard).
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == text;
    }

    let mut remaining = text;

    let first = parts[0];
    if !first.is_empty() {
        match remaining.strip_prefix(first) {
            Some(rest) => remaining = rest,
            None => return false,
        }
    }

    let last = parts[parts.len() - 1];
    if !last.is_empty() {
        match remaining.strip_suffix(last) {
            Some(rest) => remaining = rest,
            None => return false,
        }
    }

    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }

    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: scanner::MAX_DEPTH,
            results_per_product: nvd::DEFAULT_RESULTS_PER_PRODUCT,
            nvd_api_url: nvd::NVD_API_URL.to_string(),
            nvd_api_key: None,
            request_timeout_secs: nvd::REQUEST_TIMEOUT.as_secs(),
            batch_size: nvd::BATCH_SIZE,
            batch_delay_ms: nvd::BATCH_DELAY.as_millis() as u64,
            cache_ttl_secs: nvd::DEFAULT_TTL.as_secs(),
            cache_max_entries: nvd::DEFAULT_CAPACITY,
            notify_high_severity: true,
            match_policy: MatchPolicy::default(),
            default_format: "table".to_string(),
            ignore: IgnoreConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the config file.
    ///
    /// If the config file doesn't exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Saves the configuration to the config file, creating the parent
    /// directory if needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("depwatch")
            .join("config.toml")
    }

    pub fn generate_default_config() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    pub fn scan_limits(&self) -> ScanLimits {
        ScanLimits::default().with_max_depth(self.max_depth)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            batch_size: self.batch_size.clamp(1, nvd::BATCH_SIZE),
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
            cache_capacity: self.cache_max_entries.max(1),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
