//! `bastion run`: check, harden and reverify hosts against a baseline

use crate::Context;
use crate::catalog;
use crate::cli::{ReportFormat, RunArgs};
use crate::config::{Config, expand_path};
use crate::hardeners;
use crate::progress::{ConsoleProgress, LinePrinter};
use crate::report;
use crate::transport::{SshTransport, ssh_config};
use crate::ui;
use anyhow::{Context as _, Result, bail};
use chrono::Local;
use colored::Colorize;
use hardening::{
    Classification, Description, Engine, EngineOptions, HardenerRegistry, NoProgress,
    ProgressCallback, RunFailure, Schema, SchemaError, TopicKey, Transport,
};
use rayon::prelude::*;
use std::fmt;
use std::path::PathBuf;

/// Where and how reports are written
struct ReportOutput {
    format: ReportFormat,
    explicit: Option<PathBuf>,
    dir: Option<PathBuf>,
    several_hosts: bool,
}

/// Hosts whose run finished with failed or incomplete topics
#[derive(Debug, Default)]
pub struct HostFailures(pub Vec<(String, RunFailure)>);

impl fmt::Display for HostFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hosts: Vec<String> = self
            .0
            .iter()
            .map(|(host, failure)| format!("{host}: {failure}"))
            .collect();
        f.write_str(&hosts.join("; "))
    }
}

impl std::error::Error for HostFailures {}

/// Result of a finished run on one host
struct HostReport {
    host: String,
    path: PathBuf,
    classification: Classification,
    failure: Option<RunFailure>,
}

pub fn run(ctx: &Context, args: RunArgs, config: &Config) -> Result<()> {
    let schema = catalog::schema();
    let registry = hardeners::registry().context("Invalid hardener registry")?;
    for key in registry.unknown_keys(schema) {
        ui::warn(&format!("Hardener registered for unknown topic {key}"));
    }

    let only = args
        .topic
        .as_deref()
        .map(|selector| parse_selector(schema, selector))
        .transpose()?;

    // Compose every description before connecting anywhere
    let baseline = config.apply(catalog::baseline(&args.baseline)?, schema)?;
    let descriptions = args
        .hosts
        .iter()
        .map(|host| baseline.compose(schema, host))
        .collect::<Result<Vec<_>, _>>()?;

    let output = ReportOutput {
        format: args.format.unwrap_or(config.report.format),
        explicit: args.report.clone(),
        dir: config.report.dir.as_deref().map(expand_path),
        several_hosts: descriptions.len() > 1,
    };

    if !ctx.quiet {
        print_plan(&descriptions, only.as_ref(), &args, &output);
    }
    if !args.yes {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt("Continue?")
            .default(true)
            .interact()
            .context("Failed to read confirmation")?;
        if !confirmed {
            ui::info("Aborted");
            return Ok(());
        }
    }

    let options = EngineOptions {
        only,
        poll: config.poll.poll_config(),
    };

    let results: Vec<(String, Result<HostReport>)> = if descriptions.len() == 1 {
        descriptions
            .into_iter()
            .map(|description| {
                let host = description.host.clone();
                let mut transport = SshTransport::new(ssh_config(&host, &args, &config.ssh));
                let mut progress: Box<dyn ProgressCallback> = if ctx.quiet {
                    Box::new(NoProgress)
                } else if ctx.verbose > 0 {
                    Box::new(LinePrinter::new(host.as_str()))
                } else {
                    Box::new(ConsoleProgress::new())
                };
                let result = harden_host(
                    description,
                    &mut transport,
                    progress.as_mut(),
                    &registry,
                    &options,
                    &output,
                );
                (host, result)
            })
            .collect()
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(args.jobs.max(1))
            .build()
            .context("Failed to build thread pool")?;
        pool.install(|| {
            descriptions
                .into_par_iter()
                .map(|description| {
                    let host = description.host.clone();
                    let mut transport = SshTransport::new(ssh_config(&host, &args, &config.ssh));
                    let mut progress: Box<dyn ProgressCallback> = if ctx.quiet {
                        Box::new(NoProgress)
                    } else {
                        Box::new(LinePrinter::new(host.as_str()))
                    };
                    let result = harden_host(
                        description,
                        &mut transport,
                        progress.as_mut(),
                        &registry,
                        &options,
                        &output,
                    );
                    (host, result)
                })
                .collect()
        })
    };

    summarize(ctx, results)
}

/// Parse and validate a `section.topic` selector
fn parse_selector(schema: &Schema, selector: &str) -> Result<TopicKey> {
    let Some(key) = TopicKey::parse(selector) else {
        bail!("Invalid topic '{selector}', expected <section>.<topic>");
    };
    if !schema.contains(&key) {
        return Err(SchemaError::UnknownTopic(selector.to_string()).into());
    }
    Ok(key)
}

fn print_plan(
    descriptions: &[Description],
    only: Option<&TopicKey>,
    args: &RunArgs,
    output: &ReportOutput,
) {
    let Some(first) = descriptions.first() else {
        return;
    };
    ui::header(&format!("Hardening plan: baseline {}", first.name));
    let hosts: Vec<&str> = descriptions.iter().map(|d| d.host.as_str()).collect();
    ui::kv("Hosts", &hosts.join(", "));
    match only {
        Some(key) => ui::kv("Topic", &key.to_string()),
        None => {
            let defined = first.topics().filter(|(_, t)| t.is_defined()).count();
            ui::kv(
                "Topics",
                &format!("{} ({defined} defined)", first.topic_count(None)),
            );
        }
    }
    if let Some(via) = &args.via_host {
        ui::kv("Via", via);
    }
    if descriptions.len() > 1 {
        ui::kv("Parallel jobs", &args.jobs.max(1).to_string());
    }
    ui::kv("Report format", output.format.extension());
    if let Some(dir) = &output.dir {
        ui::kv("Report directory", &dir.display().to_string());
    }
    println!();
}

/// Run the engine on one host and write its report
fn harden_host(
    description: Description,
    transport: &mut dyn Transport,
    progress: &mut dyn ProgressCallback,
    registry: &HardenerRegistry,
    options: &EngineOptions,
    output: &ReportOutput,
) -> Result<HostReport> {
    let host = description.host.clone();
    let run = Engine::with_options(registry, options.clone()).run(description, transport, progress)?;

    let generated_at = Local::now();
    let path = report::report_path(
        output.explicit.as_deref(),
        output.dir.as_deref(),
        &run.description,
        output.format,
        output.several_hosts,
        generated_at,
    );
    let content = report::render(
        output.format,
        &run.description,
        run.failure.as_ref(),
        generated_at,
    )?;
    report::write(&path, &content)?;
    log::info!("Report for {host} written to {}", path.display());

    Ok(HostReport {
        host,
        path,
        classification: run.description.classify(options.only.as_ref()),
        failure: run.failure,
    })
}

/// Print the outcome of every host and fold them into the command result
///
/// A host that could not be run at all is an error. Otherwise every failed
/// host keeps its own [`RunFailure`] in [`HostFailures`].
fn summarize(ctx: &Context, results: Vec<(String, Result<HostReport>)>) -> Result<()> {
    let mut errors = 0;
    let mut failures = HostFailures::default();

    for (host, result) in results {
        match result {
            Ok(report) => {
                print_host_summary(ctx, &report);
                if let Some(failure) = report.failure {
                    failures.0.push((report.host, failure));
                }
            }
            Err(err) => {
                errors += 1;
                ui::error(&format!("{host}: {err:#}"));
            }
        }
    }

    if errors > 0 {
        bail!("{} could not be hardened", ui::plural(errors, "host"));
    }
    if failures.0.is_empty() {
        Ok(())
    } else {
        Err(failures.into())
    }
}

fn print_host_summary(ctx: &Context, report: &HostReport) {
    let c = &report.classification;
    match &report.failure {
        None => ui::success(&format!(
            "{}: {} succeeded, {} ignored",
            report.host,
            ui::plural(c.succeeded.len(), "topic"),
            c.ignored.len()
        )),
        Some(failure) => {
            ui::failed_banner(&report.host, &failure.to_string());
            if !ctx.quiet {
                print_keys("Failed topics", &failure.failed);
                print_keys("Incomplete topics", &failure.incomplete);
                print_keys("Topics without hardener", &failure.hardener_missing);
            }
        }
    }
    ui::kv("Report", &report.path.display().to_string());
}

fn print_keys(title: &str, keys: &[TopicKey]) {
    if keys.is_empty() {
        return;
    }
    eprintln!("  {title}:");
    for key in keys {
        eprintln!("    {} {key}", "✗".red());
    }
}
