//! Nessus scan launcher
//!
//! Runs a vulnerability scan of a target with a named Nessus policy and
//! downloads the exported report:
//!
//! 1. resolve the policy id and the scan template uuid
//! 2. create and launch the scan
//! 3. poll until the scan is finished
//! 4. export the report, poll until the export is ready, download it
//!
//! The REST calls go through the [`Api`] trait. [`HttpApi`] talks to a real
//! Nessus server, [`MockApi`] keeps everything in memory for tests.
//!
//! ## Example
//!
//! ```no_run
//! use nessus::{Credentials, ExportFormat, HttpApi, Launcher, ScanRequest, ScanStatus, WaitConfig};
//!
//! let api = HttpApi::new(&Credentials::new("https://nessus:8834", "access", "secret"), true);
//! let launcher = Launcher::new(&api, WaitConfig::default());
//! let request = ScanRequest::new("LITP hardening", "10.0.0.5", ExportFormat::Pdf);
//! let finished = launcher.run(&request, &mut |status: &ScanStatus| println!("{status}")).unwrap();
//! std::fs::write("scan.pdf", finished.report).unwrap();
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod error;
pub mod scan;
pub mod types;

pub use api::http::HttpApi;
pub use api::{Api, MockApi};
pub use error::{Error, Result};
pub use scan::{FinishedScan, Launcher, ScanRequest, WaitConfig};
pub use types::{
    Credentials, DEFAULT_TEMPLATE, ExportFormat, NewScan, Policy, REPORT_CHAPTERS, ScanStatus,
    Template,
};
