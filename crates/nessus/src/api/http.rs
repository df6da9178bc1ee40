//! Blocking HTTP client for the Nessus REST API

use crate::api::Api;
use crate::error::{Error, Result};
use crate::types::{Credentials, ExportFormat, NewScan, Policy, ScanStatus, Template};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::thread;
use std::time::Duration;

/// Maximum report size (exports with every chapter can be large).
const MAX_REPORT_SIZE: u64 = 512 * 1024 * 1024;

/// Attempts for a request failing with a transient error.
const REQUEST_ATTEMPTS: u32 = 5;

const SECONDS_BETWEEN_ATTEMPTS: u64 = 5;

/// Nessus client over `ureq`.
pub struct HttpApi {
    agent: ureq::Agent,
    base: String,
    api_keys: String,
    retry_delay: Duration,
}

impl HttpApi {
    /// Create a client. `verify_tls = false` accepts self-signed certificates.
    pub fn new(credentials: &Credentials, verify_tls: bool) -> Self {
        let tls = ureq::tls::TlsConfig::builder()
            .disable_verification(!verify_tls)
            .build();
        let config = ureq::Agent::config_builder().tls_config(tls).build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            base: credentials.url.trim_end_matches('/').to_string(),
            api_keys: credentials.api_keys_header(),
            retry_delay: Duration::from_secs(SECONDS_BETWEEN_ATTEMPTS),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        retrying(REQUEST_ATTEMPTS, self.retry_delay, &url, || {
            Ok(self
                .agent
                .get(&url)
                .header("X-ApiKeys", self.api_keys.as_str())
                .call()?
                .body_mut()
                .read_json()?)
        })
    }

    fn post<T: DeserializeOwned>(&self, path: &str, body: &serde_json::Value) -> Result<T> {
        let url = self.url(path);
        retrying(REQUEST_ATTEMPTS, self.retry_delay, &url, || {
            Ok(self
                .agent
                .post(&url)
                .header("X-ApiKeys", self.api_keys.as_str())
                .send_json(body)?
                .body_mut()
                .read_json()?)
        })
    }
}

/// Repeat `request` while it fails with a transient error
fn retrying<T>(
    attempts: u32,
    delay: Duration,
    url: &str,
    mut request: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut attempt = 1;
    loop {
        match request() {
            Err(err) if err.is_retryable() && attempt < attempts => {
                log::warn!(
                    "{url}: {err}, trying again in {}s (attempt {attempt}/{attempts})",
                    delay.as_secs()
                );
                thread::sleep(delay);
                attempt += 1;
            }
            result => return result,
        }
    }
}

// ============================================================================
// Response bodies
// ============================================================================

#[derive(Deserialize)]
struct PoliciesResponse {
    /// `null` when no policy is defined
    policies: Option<Vec<Policy>>,
}

#[derive(Deserialize)]
struct TemplatesResponse {
    templates: Vec<Template>,
}

#[derive(Deserialize)]
struct CreatedScan {
    id: u64,
}

#[derive(Deserialize)]
struct CreateResponse {
    scan: CreatedScan,
}

#[derive(Deserialize)]
struct LaunchResponse {
    scan_uuid: Option<String>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct ScanInfo {
    status: String,
}

#[derive(Deserialize)]
struct ScanDetails {
    info: ScanInfo,
}

#[derive(Deserialize)]
struct ExportResponse {
    file: u64,
}

#[derive(Deserialize)]
struct ExportStatus {
    status: String,
}

impl Api for HttpApi {
    fn policies(&self) -> Result<Vec<Policy>> {
        let response: PoliciesResponse = self.get("/policies")?;
        Ok(response.policies.unwrap_or_default())
    }

    fn scan_templates(&self) -> Result<Vec<Template>> {
        let response: TemplatesResponse = self.get("/editor/scan/templates")?;
        Ok(response.templates)
    }

    fn create_scan(&self, scan: &NewScan) -> Result<u64> {
        let response: CreateResponse = self.post("/scans", &scan.body())?;
        Ok(response.scan.id)
    }

    fn launch(&self, scan_id: u64) -> Result<String> {
        let response: LaunchResponse = self.post(&format!("/scans/{scan_id}/launch"), &json!({}))?;
        launched(scan_id, response)
    }

    fn scan_status(&self, scan_id: u64) -> Result<ScanStatus> {
        let details: ScanDetails = self.get(&format!("/scans/{scan_id}"))?;
        Ok(ScanStatus::parse(&details.info.status))
    }

    fn export(&self, scan_id: u64, format: ExportFormat, chapters: &str) -> Result<u64> {
        let body = json!({ "format": format.as_str(), "chapters": chapters });
        let response: ExportResponse = self.post(&format!("/scans/{scan_id}/export"), &body)?;
        Ok(response.file)
    }

    fn export_ready(&self, scan_id: u64, file_id: u64) -> Result<bool> {
        let response: ExportStatus =
            self.get(&format!("/scans/{scan_id}/export/{file_id}/status"))?;
        Ok(response.status == "ready")
    }

    fn download(&self, scan_id: u64, file_id: u64) -> Result<Vec<u8>> {
        let url = self.url(&format!("/scans/{scan_id}/export/{file_id}/download"));
        retrying(REQUEST_ATTEMPTS, self.retry_delay, &url, || {
            Ok(self
                .agent
                .get(&url)
                .header("X-ApiKeys", self.api_keys.as_str())
                .call()?
                .body_mut()
                .with_config()
                .limit(MAX_REPORT_SIZE)
                .read_to_vec()?)
        })
    }
}

fn launched(scan_id: u64, response: LaunchResponse) -> Result<String> {
    match response.scan_uuid {
        Some(uuid) => Ok(uuid),
        None => Err(Error::LaunchRejected {
            scan_id,
            message: response
                .error
                .unwrap_or_else(|| "no scan uuid in response".to_string()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_base_url_is_trimmed() {
        let api = HttpApi::new(&Credentials::new("https://nessus:8834/", "a", "s"), true);
        assert_eq!(api.url("/policies"), "https://nessus:8834/policies");
    }

    #[test]
    fn test_policies_may_be_null() {
        let response: PoliciesResponse = serde_json::from_str(r#"{"policies": null}"#).unwrap();
        assert!(response.policies.is_none());

        let response: PoliciesResponse = serde_json::from_str(
            r#"{"policies": [{"id": 12, "name": "LITP", "owner": "admin", "visibility": "private"}]}"#,
        )
        .unwrap();
        assert_eq!(
            response.policies.unwrap(),
            vec![Policy {
                id: 12,
                name: "LITP".into()
            }]
        );
    }

    #[test]
    fn test_scan_details_status() {
        let details: ScanDetails = serde_json::from_str(
            r#"{"info": {"status": "running", "name": "x", "targets": "10.0.0.5"}, "hosts": []}"#,
        )
        .unwrap();
        assert_eq!(ScanStatus::parse(&details.info.status), ScanStatus::Running);
    }

    #[test]
    fn test_launch_without_uuid_is_rejected() {
        let response: LaunchResponse =
            serde_json::from_str(r#"{"error": "Invalid Credentials"}"#).unwrap();
        let err = launched(3, response).unwrap_err();
        assert_eq!(err.to_string(), "scan 3 was not launched: Invalid Credentials");

        let response: LaunchResponse = serde_json::from_str(r#"{"scan_uuid": "e3b4"}"#).unwrap();
        assert_eq!(launched(3, response).unwrap(), "e3b4");
    }

    #[test]
    fn test_retrying_repeats_transient_errors() {
        let calls = Cell::new(0);
        let result = retrying(5, Duration::ZERO, "url", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(Error::http("HTTP 502", Some(502)))
            } else {
                Ok(calls.get())
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_retrying_gives_up() {
        let calls = Cell::new(0);
        let result: Result<()> = retrying(2, Duration::ZERO, "url", || {
            calls.set(calls.get() + 1);
            Err(Error::http("HTTP 502", Some(502)))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_retrying_stops_on_permanent_errors() {
        let calls = Cell::new(0);
        let result: Result<()> = retrying(5, Duration::ZERO, "url", || {
            calls.set(calls.get() + 1);
            Err(Error::http("HTTP 403", Some(403)))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
