use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use depwatch::{
    config::Config,
    correlate::{attach, vulnerable_only, MatchPolicy},
    manifest,
    model::{AuditReport, ScanResult, Severity},
    notify::{LogSink, Notifier},
    nvd::{FetchError, NvdClient, ReqwestTransport, SystemClock, TokioSleeper},
    output::{print_audit, print_scan, OutputFormat},
    scanner::{ProjectScanner, ScanError},
    store::{SessionStore, DEFAULT_SESSION},
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Exit codes for CI integration
mod exit_codes {
    pub const SUCCESS: u8 = 0;
    pub const ERROR: u8 = 1;
    pub const CRITICAL_VULN: u8 = 2;
    pub const HIGH_VULN: u8 = 3;
    pub const MEDIUM_VULN: u8 = 4;
    pub const LOW_VULN: u8 = 5;
    pub const INTERRUPTED: u8 = 130;
}

#[derive(Parser)]
#[command(name = "depwatch")]
#[command(
    author,
    version,
    about = "Find dependency manifests in a project tree and check them against the NVD"
)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Session whose state is read and written
    #[arg(long, global = true, default_value = DEFAULT_SESSION)]
    session: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a directory tree for dependency manifests
    Scan {
        /// Root directory to scan
        path: PathBuf,

        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,

        /// Write JSON output to file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum directory depth below the root
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Scan a directory tree and look up known vulnerabilities
    Audit {
        /// Root directory to scan
        path: PathBuf,

        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,

        /// Write JSON output to file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum directory depth below the root
        #[arg(long)]
        max_depth: Option<usize>,

        /// CVE results requested per product
        #[arg(long)]
        results: Option<usize>,

        /// Only attach CVEs whose product matches a dependency exactly
        #[arg(long)]
        exact: bool,

        /// Do not alert on new high and critical vulnerabilities
        #[arg(long)]
        no_notify: bool,

        /// Exit with error if vulnerabilities at or above this severity are found
        #[arg(long, value_enum)]
        fail_on: Option<FailLevel>,
    },

    /// Show the last scan of this session
    Last {
        /// Output format (table, json)
        #[arg(short, long)]
        format: Option<String>,
    },

    /// List output formats and recognized manifest files
    ListFormats,

    /// Show or create config file
    Config {
        /// Generate default config file
        #[arg(long)]
        init: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Delete the stored state of this session
    Forget,
}

#[derive(Clone, Copy, ValueEnum)]
enum FailLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl FailLevel {
    fn threshold(self) -> Severity {
        match self {
            FailLevel::Critical => Severity::Critical,
            FailLevel::High => Severity::High,
            FailLevel::Medium => Severity::Medium,
            FailLevel::Low => Severity::Low,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            if is_cancelled(&e) {
                eprintln!("\nInterrupted by user");
                return ExitCode::from(exit_codes::INTERRUPTED);
            }
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_codes::ERROR)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "depwatch=debug" } else { "depwatch=warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn is_cancelled(error: &anyhow::Error) -> bool {
    matches!(error.downcast_ref::<ScanError>(), Some(ScanError::Cancelled))
        || matches!(error.downcast_ref::<FetchError>(), Some(FetchError::Cancelled))
}

/// Cancels the returned token on Ctrl+C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    token
}

async fn run(cli: Cli) -> Result<u8> {
    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Ignoring unreadable config file");
        Config::default()
    });
    let store = SessionStore::new(&cli.session);

    match cli.command {
        Commands::Scan {
            path,
            format,
            output,
            max_depth,
        } => {
            let format = parse_format(format, &config)?;
            let result = scan_tree(&path, max_depth, &config, format, &store).await?;
            emit(&result, output.as_deref(), format, print_scan)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Audit {
            path,
            format,
            output,
            max_depth,
            results,
            exact,
            no_notify,
            fail_on,
        } => {
            let format = parse_format(format, &config)?;
            let scan = scan_tree(&path, max_depth, &config, format, &store).await?;
            let policy = if exact { MatchPolicy::Exact } else { config.match_policy };
            let results = results.unwrap_or(config.results_per_product);

            let report = audit(scan, results, policy, &config, format).await?;

            let notify = config.notify_high_severity && !no_notify;
            let mut notifier = Notifier::new(notify, LogSink).with_seen(store.notified());
            let alerts = notifier.process(&report.vulnerabilities);
            if alerts > 0 && format == OutputFormat::Table {
                eprintln!("{} new high or critical vulnerabilities", alerts);
            }
            let mut seen: Vec<String> = notifier.seen().iter().cloned().collect();
            seen.sort();
            store.set_notified(&seen)?;

            emit(&report, output.as_deref(), format, print_audit)?;
            Ok(determine_exit_code(&report, fail_on))
        }
        Commands::Last { format } => {
            let format = parse_format(format, &config)?;
            match store.last_scan() {
                Some(result) => print_scan(&result, format)?,
                None => println!("No scan stored for session '{}'.", cli.session),
            }
            Ok(exit_codes::SUCCESS)
        }
        Commands::ListFormats => {
            list_formats();
            Ok(exit_codes::SUCCESS)
        }
        Commands::Config { init, path } => {
            handle_config(init, path)?;
            Ok(exit_codes::SUCCESS)
        }
        Commands::Forget => {
            store.clear()?;
            println!("Session '{}' cleared.", cli.session);
            Ok(exit_codes::SUCCESS)
        }
    }
}

fn parse_format(format: Option<String>, config: &Config) -> Result<OutputFormat> {
    let format = format.unwrap_or_else(|| config.default_format.clone());
    OutputFormat::from_str(&format).map_err(|e| anyhow::anyhow!(e))
}

fn spinner(message: &str, interactive: bool) -> Option<ProgressBar> {
    if !interactive {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    Some(pb)
}

async fn scan_tree(
    path: &Path,
    max_depth: Option<usize>,
    config: &Config,
    format: OutputFormat,
    store: &SessionStore,
) -> Result<ScanResult> {
    let mut limits = config.scan_limits();
    if let Some(depth) = max_depth {
        limits = limits.with_max_depth(depth);
    }

    let progress = spinner("Scanning for manifests...", format == OutputFormat::Table);
    let scanner = ProjectScanner::new(limits);
    let outcome = scanner.scan(path, cancel_on_ctrl_c()).await;

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            if let Some(pb) = progress {
                pb.finish_and_clear();
            }
            return Err(e.into());
        }
    };

    if let Some(pb) = progress {
        pb.finish_with_message(format!(
            "Found {} packages in {} projects",
            result.total_packages, result.total_projects
        ));
    }

    store
        .set_root_path(&result.root_path)
        .and_then(|_| store.set_last_scan(&result))
        .context("saving session state")?;

    Ok(result)
}

async fn audit(
    scan: ScanResult,
    results_per_product: usize,
    policy: MatchPolicy,
    config: &Config,
    format: OutputFormat,
) -> Result<AuditReport> {
    let products: Vec<String> = scan
        .product_names()
        .into_iter()
        .filter(|name| !config.ignore.should_ignore_package(name))
        .collect();

    let transport = ReqwestTransport::new(
        config.nvd_api_url.clone(),
        config.nvd_api_key.clone(),
        config.request_timeout(),
    )?;
    let client = NvdClient::with_parts(
        transport,
        config.client_options(),
        Arc::new(SystemClock),
        Arc::new(TokioSleeper),
    );

    let progress = spinner(
        &format!("Checking {} products for vulnerabilities...", products.len()),
        format == OutputFormat::Table,
    );
    let fetched = client
        .fetch_for_products(&products, results_per_product, &cancel_on_ctrl_c())
        .await;
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }
    let fetched = fetched?;

    let rate_limited = fetched.rate_limited();
    let failed_products = fetched.failures.into_iter().map(|f| f.product).collect();
    let vulnerabilities: Vec<_> = fetched
        .records
        .into_iter()
        .filter(|v| !config.ignore.should_ignore_vulnerability(&v.id))
        .collect();

    let deps: Vec<_> = scan
        .dependencies()
        .into_iter()
        .filter(|d| !config.ignore.should_ignore_package(&d.name))
        .cloned()
        .collect();
    let vulnerable = vulnerable_only(attach(&deps, &vulnerabilities, policy));

    Ok(AuditReport {
        scan,
        vulnerabilities,
        vulnerable,
        failed_products,
        rate_limited,
    })
}

fn emit<T: serde::Serialize>(
    value: &T,
    output: Option<&Path>,
    format: OutputFormat,
    print: fn(&T, OutputFormat) -> Result<()>,
) -> Result<()> {
    match output {
        Some(path) => {
            let json = serde_json::to_string_pretty(value)?;
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            if format == OutputFormat::Table {
                println!("Results written to: {}", path.display());
            }
            Ok(())
        }
        None => print(value, format),
    }
}

/// Determine the exit code based on vulnerabilities found and --fail-on setting
fn determine_exit_code(report: &AuditReport, fail_on: Option<FailLevel>) -> u8 {
    let Some(fail_on) = fail_on else {
        return exit_codes::SUCCESS;
    };
    let Some(worst) = report.highest_severity() else {
        return exit_codes::SUCCESS;
    };
    if worst < fail_on.threshold() {
        return exit_codes::SUCCESS;
    }

    match worst {
        Severity::Critical => exit_codes::CRITICAL_VULN,
        Severity::High => exit_codes::HIGH_VULN,
        Severity::Medium => exit_codes::MEDIUM_VULN,
        Severity::Low => exit_codes::LOW_VULN,
        Severity::None => exit_codes::SUCCESS,
    }
}

fn list_formats() {
    println!("Output formats:");
    println!();
    for (name, description) in OutputFormat::ALL {
        println!("  {:<12} {}", name, description);
    }

    println!();
    println!("Recognized manifest files:");
    println!();
    for format in manifest::supported_files() {
        println!("  {:<20} {}", format.file_name, format.ecosystem.display_name());
    }
}

fn handle_config(init: bool, show_path: bool) -> Result<()> {
    let config_path = Config::config_path();

    if show_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if init {
        if config_path.exists() {
            println!("Config file already exists at: {}", config_path.display());
            return Ok(());
        }

        let config = Config::default();
        config.save()?;
        println!("Created config file at: {}", config_path.display());
        println!();
        println!("Default configuration:");
        println!("{}", Config::generate_default_config());
        return Ok(());
    }

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        println!("Config file: {}", config_path.display());
        println!();
        println!("{}", content);
    } else {
        println!("No config file found.");
        println!("Run 'depwatch config --init' to create one.");
        println!();
        println!("Config path: {}", config_path.display());
    }

    Ok(())
}
