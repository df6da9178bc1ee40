//! Error taxonomy
//!
//! Composition errors ([`SchemaError`], [`SectionError`]) abort a run before
//! any connection is made. Command and hardener errors ([`CommandError`],
//! [`HardenError`]) are recorded on the topic they happened in and never
//! abort the remaining topics. [`RunFailure`] aggregates the outcome of a
//! finished run.

use crate::topic::TopicKey;
use crate::value::ValueType;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A candidate value whose kind differs from the declared topic type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMismatch {
    pub topic: String,
    pub declared: ValueType,
    pub actual: ValueType,
}

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (expected {}, got {})",
            self.topic, self.declared, self.actual
        )
    }
}

/// One class of problem found while composing a section
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("missing topics: {}", .0.join(", "))]
    MissingTopic(Vec<String>),

    #[error("unknown topics: {}", .0.join(", "))]
    UnknownTopic(Vec<String>),

    #[error("wrong topic types: {}", join(.0))]
    WrongTopicType(Vec<TypeMismatch>),
}

/// Every problem found while composing one section
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("section '{section}': {}", join(.violations))]
pub struct SectionError {
    pub section: String,
    pub violations: Vec<Violation>,
}

impl SectionError {
    pub fn missing_topics(&self) -> &[String] {
        self.violations
            .iter()
            .find_map(|v| match v {
                Violation::MissingTopic(names) => Some(names.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn unknown_topics(&self) -> &[String] {
        self.violations
            .iter()
            .find_map(|v| match v {
                Violation::UnknownTopic(names) => Some(names.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn type_mismatches(&self) -> &[TypeMismatch] {
        self.violations
            .iter()
            .find_map(|v| match v {
                Violation::WrongTopicType(mismatches) => Some(mismatches.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

/// Errors raised while building schemas, baselines and registries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("baseline '{baseline}' does not match the schema: {}", baseline_summary(.missing_sections, .unknown_sections, .sections))]
    InvalidBaseline {
        baseline: String,
        missing_sections: Vec<String>,
        unknown_sections: Vec<String>,
        sections: Vec<SectionError>,
    },

    #[error("unknown baseline '{0}'")]
    UnknownBaseline(String),

    #[error("unknown topic '{0}'")]
    UnknownTopic(String),

    #[error("a hardener is already registered for {0}")]
    DuplicateHardener(TopicKey),
}

/// A remote command that did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("cmd: {command}, status code: {status}, output: {output}")]
    Failed {
        command: String,
        status: i32,
        output: String,
    },

    #[error("cmd: {command}, transport error: {message}")]
    Transport { command: String, message: String },
}

/// Errors a hardener may raise from `check`, `harden` or `report`
#[derive(Debug, Error)]
pub enum HardenError {
    /// Fatal for the current topic. Recorded as the topic error.
    #[error("{0}")]
    Stop(String),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HardenError {
    pub fn stop(message: impl Into<String>) -> Self {
        Self::Stop(message.into())
    }
}

/// Aggregate outcome of a run with at least one unsuccessful topic
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RunFailure {
    pub failed: Vec<TopicKey>,
    pub incomplete: Vec<TopicKey>,
    pub hardener_missing: Vec<TopicKey>,
}

impl RunFailure {
    pub fn is_empty(&self) -> bool {
        self.failed.is_empty() && self.incomplete.is_empty() && self.hardener_missing.is_empty()
    }

    /// Sizes of the three sets: (failed, incomplete, hardener missing)
    pub fn counts(&self) -> (usize, usize, usize) {
        (
            self.failed.len(),
            self.incomplete.len(),
            self.hardener_missing.len(),
        )
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&run_summary(self))
    }
}

impl std::error::Error for RunFailure {}

/// Errors that abort a whole run
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to connect to {host}: {message}")]
    Connect { host: String, message: String },

    #[error("topic {0} is not part of the description")]
    UnknownTopic(TopicKey),
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn baseline_summary(missing: &[String], unknown: &[String], sections: &[SectionError]) -> String {
    let mut parts = Vec::new();
    if !missing.is_empty() {
        parts.push(format!("missing sections: {}", missing.join(", ")));
    }
    if !unknown.is_empty() {
        parts.push(format!("unknown sections: {}", unknown.join(", ")));
    }
    parts.extend(sections.iter().map(ToString::to_string));
    parts.join("; ")
}

fn keys(keys: &[TopicKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn run_summary(failure: &RunFailure) -> String {
    let mut parts = Vec::new();
    if !failure.failed.is_empty() {
        parts.push(format!("failed topics: {}", keys(&failure.failed)));
    }
    if !failure.incomplete.is_empty() {
        parts.push(format!("incomplete topics: {}", keys(&failure.incomplete)));
    }
    if !failure.hardener_missing.is_empty() {
        parts.push(format!(
            "topics without hardener: {}",
            keys(&failure.hardener_missing)
        ));
    }
    format!("hardening failed ({})", parts.join("; "))
}
