//! Core types for the Nessus API

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Template used for every scan.
pub const DEFAULT_TEMPLATE: &str = "Advanced Scan";

/// Chapters included in exported reports
///
/// Without chapters the export only holds a heading.
pub const REPORT_CHAPTERS: &str =
    "vuln_hosts_summary;vuln_by_host;compliance_exec;remediations;vuln_by_plugin;compliance";

/// Server URL and API keys.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub url: String,
    pub access_key: String,
    pub secret_key: String,
}

impl Credentials {
    pub fn new(
        url: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Value of the `X-ApiKeys` header.
    pub fn api_keys_header(&self) -> String {
        format!(
            "accessKey={}; secretKey={}",
            self.access_key, self.secret_key
        )
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("access_key", &"********")
            .field("secret_key", &"********")
            .finish()
    }
}

/// A scan policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Policy {
    pub id: u64,
    pub name: String,
}

/// A scan template.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Template {
    pub uuid: String,
    pub title: String,
}

/// Format of the exported report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Nessus,
    Csv,
    Html,
    #[default]
    Pdf,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nessus => "nessus",
            Self::Csv => "csv",
            Self::Html => "html",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a scan as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    Running,
    Stopping,
    Pausing,
    Resuming,
    Canceled,
    Completed,
    Paused,
    Other(String),
}

impl ScanStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "running" => Self::Running,
            "stopping" => Self::Stopping,
            "pausing" => Self::Pausing,
            "resuming" => Self::Resuming,
            "canceled" => Self::Canceled,
            "completed" => Self::Completed,
            "paused" => Self::Paused,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Pausing => "pausing",
            Self::Resuming => "resuming",
            Self::Canceled => "canceled",
            Self::Completed => "completed",
            Self::Paused => "paused",
            Self::Other(other) => other,
        }
    }

    /// The scan will not make further progress.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Stopping | Self::Canceled | Self::Completed)
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings of a scan to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScan {
    pub name: String,
    pub policy_id: u64,
    pub targets: String,
    pub template_uuid: String,
}

impl NewScan {
    /// Request body of `POST /scans`. The scan is created disabled.
    pub fn body(&self) -> serde_json::Value {
        json!({
            "uuid": self.template_uuid,
            "settings": {
                "name": self.name,
                "policy_id": self.policy_id,
                "text_targets": self.targets,
                "enabled": false,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_status() {
        assert!(ScanStatus::parse("completed").is_finished());
        assert!(ScanStatus::parse("canceled").is_finished());
        assert!(ScanStatus::parse("stopping").is_finished());
        assert!(!ScanStatus::parse("running").is_finished());
        assert!(!ScanStatus::parse("paused").is_finished());
        assert_eq!(
            ScanStatus::parse("imported"),
            ScanStatus::Other("imported".into())
        );
        assert_eq!(ScanStatus::parse("imported").to_string(), "imported");
    }

    #[test]
    fn test_new_scan_body() {
        let scan = NewScan {
            name: "LITP scan for 10.0.0.5".into(),
            policy_id: 42,
            targets: "10.0.0.5".into(),
            template_uuid: "ab4bacd2".into(),
        };
        let body = scan.body();
        assert_eq!(body["uuid"], "ab4bacd2");
        assert_eq!(body["settings"]["policy_id"], 42);
        assert_eq!(body["settings"]["text_targets"], "10.0.0.5");
        assert_eq!(body["settings"]["enabled"], false);
    }

    #[test]
    fn test_credentials_are_not_debug_printed() {
        let creds = Credentials::new("https://nessus:8834", "ak-123", "sk-456");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("ak-123"));
        assert!(!debug.contains("sk-456"));
        assert_eq!(
            creds.api_keys_header(),
            "accessKey=ak-123; secretKey=sk-456"
        );
    }
}
