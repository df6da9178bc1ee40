use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use hardening::{Description, RunFailure};
use serde_json::json;

pub fn render(
    description: &Description,
    failure: Option<&RunFailure>,
    generated_at: DateTime<Local>,
) -> Result<String> {
    let report = json!({
        "baseline": description.name,
        "host": description.host,
        "generated_at": generated_at.to_rfc3339(),
        "duration_secs": description.duration.map(|d| d.as_secs_f64()),
        "succeeded": failure.is_none(),
        "failure": failure,
        "settings": description.settings,
        "ignored_topics": description.ignored_topics,
        "sections": description.sections,
    });
    serde_json::to_string_pretty(&report).context("Could not serialize the report")
}
