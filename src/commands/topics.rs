//! `bastion topics`: the schema, optionally with a baseline's expected values

use crate::catalog;
use crate::config::Config;
use crate::hardeners;
use crate::ui;
use anyhow::Result;
use colored::Colorize;
use hardening::{Expected, TopicKey};

pub fn run(baseline: Option<&str>, config: &Config) -> Result<()> {
    let schema = catalog::schema();
    let registry = hardeners::registry()?;
    let description = match baseline {
        Some(name) => Some(config.apply(catalog::baseline(name)?, schema)?.compose(schema, "-")?),
        None => None,
    };

    match &description {
        Some(d) => ui::header(&format!("Topics of baseline {}", d.name)),
        None => ui::header("Topics"),
    }

    for section in schema.sections() {
        ui::section(&section.title());
        ui::dim(section.doc());
        for spec in section.topics() {
            let key = TopicKey::new(section.name(), spec.name.as_str());
            let marker = if registry.contains(&key) {
                "✓".green()
            } else {
                "✗".red()
            };
            let topic = description.as_ref().and_then(|d| d.topic(&key));
            let text = topic.map_or_else(|| spec.template.clone(), |t| t.description());
            println!(
                "  {marker} {:<26} {:<8} {}",
                spec.name,
                spec.value_type.as_str().dimmed(),
                text
            );
            if let Some(topic) = topic {
                let expected = match &topic.expected {
                    Expected::Undefined => "undefined".dimmed().to_string(),
                    Expected::Value(value) => value.to_string(),
                };
                println!("    {} {expected}", "expected:".dimmed());
            }
        }
    }

    println!();
    ui::dim(&format!(
        "{} of {} topics have a hardener",
        registry.len(),
        schema.keys().count()
    ));
    Ok(())
}
