pub mod config;
pub mod correlate;
pub mod guard;
pub mod manifest;
pub mod model;
pub mod notify;
pub mod nvd;
pub mod output;
pub mod platform;
pub mod scanner;
pub mod store;

pub use config::Config;
pub use correlate::{attach, vulnerable_only, MatchPolicy};
pub use model::{
    AuditReport, CorrelatedDependency, DependencyRecord, Ecosystem, FolderNode, ManifestFile,
    ScanResult, Severity, VulnerabilityRecord,
};
pub use notify::{LogSink, NotificationSink, Notifier};
pub use nvd::{FetchError, NvdClient, ProductFetch, ReqwestTransport};
pub use platform::PathError;
pub use scanner::{ProjectScanner, ScanError, ScanLimits, TreeScanner};
pub use store::SessionStore;
