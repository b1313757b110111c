//! Alerts for newly seen high-severity vulnerabilities.

use crate::model::VulnerabilityRecord;
use crate::nvd::sanitize_text;
use std::collections::HashSet;
use tracing::info;

const MAX_BODY_CHARS: usize = 200;

/// Where notifications go.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, body: &str, url: Option<&str>);
}

/// Emits notifications as log events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, title: &str, body: &str, url: Option<&str>) {
        info!(title, body, url = url.unwrap_or(""), "Vulnerability alert");
    }
}

pub fn should_notify(record: &VulnerabilityRecord, seen: &HashSet<String>) -> bool {
    !seen.contains(&record.id) && record.severity.is_high_or_worse()
}

pub struct Notifier<S: NotificationSink = LogSink> {
    enabled: bool,
    sink: S,
    seen: HashSet<String>,
}

impl<S: NotificationSink> Notifier<S> {
    pub fn new(enabled: bool, sink: S) -> Self {
        Self {
            enabled,
            sink,
            seen: HashSet::new(),
        }
    }

    /// Pre-loads ids that were already reported.
    pub fn with_seen(mut self, seen: impl IntoIterator<Item = String>) -> Self {
        self.seen.extend(seen);
        self
    }

    pub fn seen(&self) -> &HashSet<String> {
        &self.seen
    }

    /// Sends one notification per new high or critical record and marks
    /// every record as seen. Returns the number of notifications sent.
    pub fn process(&mut self, records: &[VulnerabilityRecord]) -> usize {
        let mut sent = 0;
        for record in records {
            if self.enabled && should_notify(record, &self.seen) {
                let title = match &record.matched_product {
                    Some(product) => format!("{} vulnerability in {}: {}", record.severity, product, record.id),
                    None => format!("{} vulnerability: {}", record.severity, record.id),
                };
                let body = sanitize_text(&record.description, MAX_BODY_CHARS);
                let url = Some(record.url.as_str()).filter(|u| u.starts_with("https://"));
                self.sink.notify(&sanitize_text(&title, MAX_BODY_CHARS), &body, url);
                sent += 1;
            }
            self.seen.insert(record.id.clone());
        }
        sent
    }
}
