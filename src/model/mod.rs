//! Core data types for dependencies, folder trees and vulnerabilities.
//!
//! - [`DependencyRecord`] - One declared dependency from a manifest
//! - [`ManifestFile`] - A recognized manifest and the records parsed from it
//! - [`FolderNode`] - A directory in the aggregated scan tree
//! - [`ScanResult`] - Complete result of one tree scan
//! - [`VulnerabilityRecord`] - A CVE fetched from the vulnerability database
//! - [`CorrelatedDependency`] - A dependency with its attached CVEs
//! - [`AuditReport`] - A scan plus the vulnerabilities found for it
//!
//! # Example
//!
//! ```
//! use depwatch::model::{DependencyRecord, Ecosystem};
//!
//! let record = DependencyRecord::new("lodash", "4.17.21", Ecosystem::Npm);
//! assert_eq!(record.id, "lodash@4.17.21");
//! ```

mod dependency;
mod report;
mod tree;
mod vulnerability;

pub use dependency::*;
pub use report::*;
pub use tree::*;
pub use vulnerability::*;
