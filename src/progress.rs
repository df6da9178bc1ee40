//! Progress reporting for hardening runs
//!
//! [`ConsoleProgress`] shows a spinner while a topic runs and leaves an
//! aligned status column behind. [`LinePrinter`] prints one line per topic,
//! prefixed with the host, for parallel runs where spinners would interleave.

use crate::ui;
use colored::Colorize;
use hardening::{Description, ProgressCallback, Topic, TopicKey};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const DESCRIPTION_WIDTH: usize = 72;

/// Create a spinner with a message
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

// ============================================================================
// Console
// ============================================================================

/// Interactive progress for a single host
#[derive(Default)]
pub struct ConsoleProgress {
    current: Option<ProgressBar>,
    done: usize,
    total: usize,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_run_start(&mut self, description: &Description, topics: usize) {
        self.total = topics;
        ui::header(&format!(
            "Hardening {} with baseline {}",
            description.host, description.name
        ));
        ui::dim(&ui::plural(topics, "topic"));
        println!();
    }

    fn on_topic_start(&mut self, key: &TopicKey, description: &str) {
        log::debug!("Starting {key}");
        self.current = Some(spinner(&ui::fit(description, DESCRIPTION_WIDTH)));
    }

    fn on_topic_complete(&mut self, key: &TopicKey, topic: &Topic) {
        self.done += 1;
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
        println!(
            "{} {} {}",
            format!("[{:>2}/{}]", self.done, self.total).dimmed(),
            ui::fit(&topic.description(), DESCRIPTION_WIDTH),
            ui::status(topic.status)
        );
        if let Some(error) = topic.error.as_ref().or(topic.unhandled_error.as_ref()) {
            ui::dim(&format!("{key}: {}", first_line(error)));
        }
    }

    fn on_run_complete(&mut self, description: &Description) {
        if let Some(pb) = self.current.take() {
            pb.finish_and_clear();
        }
        if let Some(duration) = description.duration {
            ui::dim(&format!("Finished in {:.1}s", duration.as_secs_f64()));
        }
    }
}

// ============================================================================
// Line printer
// ============================================================================

/// One status line per topic, prefixed with the host
pub struct LinePrinter {
    host: String,
}

impl LinePrinter {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

impl ProgressCallback for LinePrinter {
    fn on_run_start(&mut self, description: &Description, topics: usize) {
        println!(
            "{} started baseline {} ({})",
            format!("[{}]", self.host).cyan(),
            description.name,
            ui::plural(topics, "topic")
        );
    }

    fn on_topic_start(&mut self, key: &TopicKey, _description: &str) {
        log::debug!("[{}] starting {key}", self.host);
    }

    fn on_topic_complete(&mut self, key: &TopicKey, topic: &Topic) {
        println!(
            "{} {} {}",
            format!("[{}]", self.host).cyan(),
            key,
            ui::status(topic.status)
        );
    }

    fn on_run_complete(&mut self, description: &Description) {
        let elapsed = description
            .duration
            .map(|d| format!(" in {:.1}s", d.as_secs_f64()))
            .unwrap_or_default();
        println!("{} finished{elapsed}", format!("[{}]", self.host).cyan());
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
