//! The Nessus REST surface used by the launcher
//!
//! [`http::HttpApi`] is the real client. [`MockApi`] answers from memory:
//!
//! ```
//! use nessus::{Api, ExportFormat, MockApi, ScanStatus};
//!
//! let api = MockApi::new()
//!     .with_policy(7, "LITP")
//!     .with_statuses(["running", "completed"]);
//! assert_eq!(api.policies().unwrap()[0].name, "LITP");
//! assert_eq!(api.scan_status(1).unwrap(), ScanStatus::Running);
//! ```

pub mod http;

use crate::error::{Error, Result};
use crate::types::{DEFAULT_TEMPLATE, ExportFormat, NewScan, Policy, ScanStatus, Template};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Operations on a Nessus server.
pub trait Api: Send + Sync {
    /// `GET /policies`
    fn policies(&self) -> Result<Vec<Policy>>;

    /// `GET /editor/scan/templates`
    fn scan_templates(&self) -> Result<Vec<Template>>;

    /// `POST /scans`, returns the scan id.
    fn create_scan(&self, scan: &NewScan) -> Result<u64>;

    /// `POST /scans/{id}/launch`, returns the scan uuid.
    fn launch(&self, scan_id: u64) -> Result<String>;

    /// `GET /scans/{id}`
    fn scan_status(&self, scan_id: u64) -> Result<ScanStatus>;

    /// `POST /scans/{id}/export`, returns the file id.
    fn export(&self, scan_id: u64, format: ExportFormat, chapters: &str) -> Result<u64>;

    /// `GET /scans/{id}/export/{file}/status`
    fn export_ready(&self, scan_id: u64, file_id: u64) -> Result<bool>;

    /// `GET /scans/{id}/export/{file}/download`
    fn download(&self, scan_id: u64, file_id: u64) -> Result<Vec<u8>>;
}

// ============================================================================
// Mock
// ============================================================================

/// In-memory server for tests.
///
/// Statuses are consumed in order, the last one repeats. Every call is
/// recorded in [`MockApi::calls`].
#[derive(Debug, Default)]
pub struct MockApi {
    policies: Vec<Policy>,
    templates: Vec<Template>,
    statuses: Mutex<VecDeque<String>>,
    export_pending: Mutex<usize>,
    report: Vec<u8>,
    reject_launch: bool,
    calls: Mutex<Vec<String>>,
}

impl MockApi {
    /// A server offering the default template.
    #[must_use]
    pub fn new() -> Self {
        Self {
            templates: vec![Template {
                uuid: "731a8e52-advanced".to_string(),
                title: DEFAULT_TEMPLATE.to_string(),
            }],
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_policy(mut self, id: u64, name: &str) -> Self {
        self.policies.push(Policy {
            id,
            name: name.to_string(),
        });
        self
    }

    #[must_use]
    pub fn with_templates(mut self, templates: Vec<Template>) -> Self {
        self.templates = templates;
        self
    }

    #[must_use]
    pub fn with_statuses<'a>(self, statuses: impl IntoIterator<Item = &'a str>) -> Self {
        if let Ok(mut queue) = self.statuses.lock() {
            queue.extend(statuses.into_iter().map(str::to_string));
        }
        self
    }

    /// Number of export status polls answered "loading" before "ready".
    #[must_use]
    pub fn with_export_pending(self, polls: usize) -> Self {
        if let Ok(mut pending) = self.export_pending.lock() {
            *pending = polls;
        }
        self
    }

    #[must_use]
    pub fn with_report(mut self, report: &[u8]) -> Self {
        self.report = report.to_vec();
        self
    }

    #[must_use]
    pub fn rejecting_launch(mut self) -> Self {
        self.reject_launch = true;
        self
    }

    /// Calls received so far, like `launch 1`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl Api for MockApi {
    fn policies(&self) -> Result<Vec<Policy>> {
        self.record("policies".to_string());
        Ok(self.policies.clone())
    }

    fn scan_templates(&self) -> Result<Vec<Template>> {
        self.record("templates".to_string());
        Ok(self.templates.clone())
    }

    fn create_scan(&self, scan: &NewScan) -> Result<u64> {
        self.record(format!(
            "create {} policy={} targets={}",
            scan.name, scan.policy_id, scan.targets
        ));
        Ok(1)
    }

    fn launch(&self, scan_id: u64) -> Result<String> {
        self.record(format!("launch {scan_id}"));
        if self.reject_launch {
            return Err(Error::LaunchRejected {
                scan_id,
                message: "scan is disabled".to_string(),
            });
        }
        Ok(format!("uuid-{scan_id}"))
    }

    fn scan_status(&self, scan_id: u64) -> Result<ScanStatus> {
        self.record(format!("status {scan_id}"));
        let mut queue = self
            .statuses
            .lock()
            .map_err(|_| Error::InvalidResponse("status queue poisoned".to_string()))?;
        let status = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        Ok(ScanStatus::parse(status.as_deref().unwrap_or("completed")))
    }

    fn export(&self, scan_id: u64, format: ExportFormat, _chapters: &str) -> Result<u64> {
        self.record(format!("export {scan_id} {format}"));
        Ok(9)
    }

    fn export_ready(&self, scan_id: u64, file_id: u64) -> Result<bool> {
        self.record(format!("export status {scan_id}/{file_id}"));
        let mut pending = self
            .export_pending
            .lock()
            .map_err(|_| Error::InvalidResponse("export counter poisoned".to_string()))?;
        if *pending == 0 {
            return Ok(true);
        }
        *pending -= 1;
        Ok(false)
    }

    fn download(&self, scan_id: u64, file_id: u64) -> Result<Vec<u8>> {
        self.record(format!("download {scan_id}/{file_id}"));
        Ok(self.report.clone())
    }
}
