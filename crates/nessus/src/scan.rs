//! Scan orchestration: create, launch, wait, export, download

use crate::api::Api;
use crate::error::{Error, Result};
use crate::types::{DEFAULT_TEMPLATE, ExportFormat, NewScan, REPORT_CHAPTERS, ScanStatus};
use std::thread;
use std::time::Duration;

/// Polling intervals and the overall bound for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub scan_interval: Duration,
    pub export_interval: Duration,
    /// Applies separately to the scan and to the export.
    pub timeout: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(10),
            export_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(6 * 3600),
        }
    }
}

/// What to scan and how to export it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub policy: String,
    pub target: String,
    pub format: ExportFormat,
    /// Scan name shown in Nessus
    pub name: String,
}

impl ScanRequest {
    pub fn new(policy: impl Into<String>, target: impl Into<String>, format: ExportFormat) -> Self {
        let policy = policy.into();
        let target = target.into();
        Self {
            name: format!("{policy} scan for {target}"),
            policy,
            target,
            format,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// A finished scan and its downloaded report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedScan {
    pub scan_id: u64,
    pub status: ScanStatus,
    pub report: Vec<u8>,
}

/// Drives one scan through an [`Api`].
pub struct Launcher<'a> {
    api: &'a dyn Api,
    wait: WaitConfig,
}

impl<'a> Launcher<'a> {
    pub fn new(api: &'a dyn Api, wait: WaitConfig) -> Self {
        Self { api, wait }
    }

    /// Id of the policy named `name`
    pub fn policy_id(&self, name: &str) -> Result<u64> {
        let policies = self.api.policies()?;
        policies
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.id)
            .ok_or_else(|| Error::PolicyNotFound {
                name: name.to_string(),
                available: policies.iter().map(|p| p.name.clone()).collect(),
            })
    }

    fn template_uuid(&self) -> Result<String> {
        self.api
            .scan_templates()?
            .into_iter()
            .find(|t| t.title == DEFAULT_TEMPLATE)
            .map(|t| t.uuid)
            .ok_or_else(|| Error::TemplateNotFound(DEFAULT_TEMPLATE.to_string()))
    }

    /// Run the scan to completion and download its report
    ///
    /// `on_status` sees every polled scan status.
    pub fn run(
        &self,
        request: &ScanRequest,
        on_status: &mut dyn FnMut(&ScanStatus),
    ) -> Result<FinishedScan> {
        let policy_id = self.policy_id(&request.policy)?;
        let scan = NewScan {
            name: request.name.clone(),
            policy_id,
            targets: request.target.clone(),
            template_uuid: self.template_uuid()?,
        };
        let scan_id = self.api.create_scan(&scan)?;
        log::info!("Created scan {scan_id} ({})", scan.name);

        let uuid = self.api.launch(scan_id)?;
        log::info!("Launched scan {scan_id} ({uuid})");

        let status = self.wait_for_scan(scan_id, on_status)?;
        if status != ScanStatus::Completed {
            log::warn!("Scan {scan_id} ended as {status}, exporting what it found");
        }

        let file_id = self
            .api
            .export(scan_id, request.format, REPORT_CHAPTERS)?;
        poll(
            self.wait.export_interval,
            self.wait.timeout,
            &format!("export {file_id} of scan {scan_id}"),
            || self.api.export_ready(scan_id, file_id),
        )?;
        let report = self.api.download(scan_id, file_id)?;
        log::info!("Downloaded {} bytes of {} report", report.len(), request.format);

        Ok(FinishedScan {
            scan_id,
            status,
            report,
        })
    }

    /// Poll the scan status until it is finished
    ///
    /// Transient failures while polling count as "not finished yet".
    fn wait_for_scan(
        &self,
        scan_id: u64,
        on_status: &mut dyn FnMut(&ScanStatus),
    ) -> Result<ScanStatus> {
        let mut last = ScanStatus::Running;
        poll(
            self.wait.scan_interval,
            self.wait.timeout,
            &format!("scan {scan_id}"),
            || match self.api.scan_status(scan_id) {
                Ok(status) => {
                    on_status(&status);
                    let finished = status.is_finished();
                    last = status;
                    Ok(finished)
                }
                Err(err) if err.is_retryable() => {
                    log::warn!("Could not read the status of scan {scan_id}: {err}");
                    Ok(false)
                }
                Err(err) => Err(err),
            },
        )?;
        Ok(last)
    }
}

/// Call `done` until it returns true, sleeping `interval` between calls
fn poll(
    interval: Duration,
    timeout: Duration,
    what: &str,
    mut done: impl FnMut() -> Result<bool>,
) -> Result<()> {
    let mut waited = Duration::ZERO;
    loop {
        if done()? {
            return Ok(());
        }
        if waited >= timeout {
            return Err(Error::Timeout {
                what: what.to_string(),
                secs: timeout.as_secs(),
            });
        }
        thread::sleep(interval);
        waited += interval.max(Duration::from_millis(1));
    }
}
