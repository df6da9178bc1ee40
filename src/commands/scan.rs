//! `bastion scan`: Nessus vulnerability scan of a target

use crate::Context;
use crate::cli::ScanArgs;
use crate::config::{Config, ScanSettings};
use crate::progress;
use crate::report;
use crate::ui;
use anyhow::{Context as _, Result};
use chrono::Local;
use nessus::{Api, FinishedScan, HttpApi, Launcher, ScanRequest, ScanStatus, WaitConfig};
use std::path::Path;

pub fn run(ctx: &Context, args: ScanArgs, config: &Config) -> Result<()> {
    let loaded;
    let settings = match &args.settings {
        Some(path) => {
            loaded = ScanSettings::load(path)?;
            &loaded
        }
        None => &config.scan,
    };
    let credentials = settings.credentials()?;
    if !settings.verify_tls {
        log::warn!("TLS verification disabled for {}", credentials.url);
    }
    let api = HttpApi::new(&credentials, settings.verify_tls);

    let request = ScanRequest::new(&args.policy, &args.target, args.format.into()).with_name(
        format!(
            "{} scan for {} at {}",
            args.policy,
            args.target,
            Local::now().format("%d/%m/%Y %H:%M")
        ),
    );
    scan(ctx, &api, &request, settings.wait_config(), &args.report).map(|_| ())
}

/// Run the scan and write the downloaded report to `path`
fn scan(
    ctx: &Context,
    api: &dyn Api,
    request: &ScanRequest,
    wait: WaitConfig,
    path: &Path,
) -> Result<FinishedScan> {
    if !ctx.quiet {
        ui::header(&format!("Scanning {}", request.target));
        ui::kv("Policy", &request.policy);
        ui::kv("Format", request.format.as_str());
        println!();
    }

    let pb = (!ctx.quiet).then(|| progress::spinner("Scanning..."));
    let result = Launcher::new(api, wait).run(request, &mut |status: &ScanStatus| {
        if let Some(pb) = &pb {
            pb.set_message(format!("Scanning... ({status})"));
        }
    });
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let finished = result.with_context(|| format!("Scan of {} failed", request.target))?;

    report::write(path, &finished.report)?;
    if finished.status != ScanStatus::Completed {
        ui::warn(&format!("Scan {} ended as {}", finished.scan_id, finished.status));
    }
    ui::success(&format!("Scan report exported to file: {}", path.display()));
    Ok(finished)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nessus::{ExportFormat, MockApi};
    use std::fs;
    use std::time::Duration;

    fn quiet() -> Context {
        Context {
            verbose: 0,
            quiet: true,
        }
    }

    fn fast() -> WaitConfig {
        WaitConfig {
            scan_interval: Duration::ZERO,
            export_interval: Duration::ZERO,
            timeout: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_scan_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("scan.csv");
        let api = MockApi::new()
            .with_policy(7, "LITP")
            .with_statuses(["running", "completed"])
            .with_report(b"Plugin ID,CVE,Risk\n");
        let request = ScanRequest::new("LITP", "10.0.0.5", ExportFormat::Csv);

        let finished = scan(&quiet(), &api, &request, fast(), &path).unwrap();

        assert_eq!(finished.status, ScanStatus::Completed);
        assert_eq!(fs::read(&path).unwrap(), b"Plugin ID,CVE,Risk\n");
        assert!(api.calls().contains(&"export 1 csv".to_string()));
    }

    #[test]
    fn test_unknown_policy_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        let api = MockApi::new().with_policy(3, "Basic");
        let request = ScanRequest::new("LITP", "10.0.0.5", ExportFormat::Pdf);

        let err = scan(&quiet(), &api, &request, fast(), &path).unwrap_err();

        assert!(format!("{err:#}").contains("defined policies: Basic"));
        assert!(!path.exists());
    }
}
