//! Topics - one checkable and hardenable setting
//!
//! A [`TopicSpec`] is the schema half (name, type, description template).
//! A [`Topic`] is the composed half: the [`TopicSpec`] plus the baseline's expected
//! value and the execution state written by the engine.

use crate::value::{Value, ValueType};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

static CHOICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(\w*)\|(\w*)>").expect("valid choice regex"));

/// Identifies a topic (and the hardener bound to it) within a description
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TopicKey {
    pub section: String,
    pub topic: String,
}

impl TopicKey {
    pub fn new(section: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            topic: topic.into(),
        }
    }

    /// Parse a `section.topic` selector
    pub fn parse(selector: &str) -> Option<Self> {
        let (section, topic) = selector.split_once('.')?;
        if section.is_empty() || topic.is_empty() || topic.contains('.') {
            return None;
        }
        Some(Self::new(section, topic))
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section, self.topic)
    }
}

/// Schema declaration of a topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub value_type: ValueType,
    /// Human description, may contain one `<positive|negative>` placeholder
    pub template: String,
}

impl TopicSpec {
    pub fn new(name: impl Into<String>, value_type: ValueType, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type,
            template: template.into(),
        }
    }
}

/// Expected value supplied by a baseline
///
/// `Undefined` means the schema declares the topic but this baseline
/// deliberately leaves it out. It is not a zero value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(untagged)]
pub enum Expected {
    #[default]
    Undefined,
    Value(Value),
}

impl Expected {
    /// A defined expected value
    pub fn of(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Undefined => None,
        }
    }
}

impl From<Value> for Expected {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// Phase a remote command was issued in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The first `check` (or the `report` fallback)
    PreHarden,
    Harden,
    /// The reverification `check`
    PostHarden,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::PreHarden => "Check",
            Self::Harden => "Harden",
            Self::PostHarden => "Double check",
        }
    }
}

/// One remote command with its exit status and combined output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRecord {
    pub phase: Phase,
    pub command: String,
    pub status: i32,
    pub output: String,
}

/// Terminal state of a topic after the engine processed it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    #[default]
    Pending,
    /// Undefined in this baseline
    Ignored,
    /// `check` not implemented, `report` provided the result
    JustReport,
    /// Value already matched
    CheckedOnly,
    /// Hardened and reverified
    CheckedAndHardened,
    /// A stop condition or a failed reverification
    HardenFailed,
    HardenNotImplemented,
    /// Neither `check` nor `report` implemented
    CheckIncomplete,
    ErrorUnhandled,
    /// Check could not determine a value, or harden reported nothing
    Indeterminate,
}

impl TopicStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::JustReport | Self::CheckedOnly | Self::CheckedAndHardened
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Ignored => "IGNORED",
            Self::JustReport => "SUCCESS: just report",
            Self::CheckedOnly => "SUCCESS: checked only",
            Self::CheckedAndHardened => "SUCCESS: checked and hardened",
            Self::HardenFailed => "FAILED",
            Self::HardenNotImplemented => "FAILED: harden case not implemented",
            Self::CheckIncomplete => "INCOMPLETE",
            Self::ErrorUnhandled => "ERROR",
            Self::Indeterminate => "INCOMPLETE: indeterminate",
        }
    }
}

/// A composed topic: schema metadata, expected value and execution state
#[derive(Debug, Clone, Serialize)]
pub struct Topic {
    pub name: String,
    pub value_type: ValueType,
    #[serde(skip)]
    template: String,
    pub expected: Expected,
    pub retrieved: Option<Value>,
    pub outputs: Vec<CommandRecord>,
    pub report: Option<Value>,
    pub error: Option<String>,
    pub unhandled_error: Option<String>,
    pub hardener_implemented: bool,
    pub harden_case_not_implemented: Option<String>,
    pub just_report: bool,
    pub checked_and_hardened: bool,
    pub status: TopicStatus,
}

impl Topic {
    /// Create a topic from its schema declaration and expected value
    pub fn new(spec: &TopicSpec, expected: Expected) -> Self {
        Self {
            name: spec.name.clone(),
            value_type: spec.value_type,
            template: spec.template.clone(),
            expected,
            retrieved: None,
            outputs: Vec::new(),
            report: None,
            error: None,
            unhandled_error: None,
            hardener_implemented: false,
            harden_case_not_implemented: None,
            just_report: false,
            checked_and_hardened: false,
            status: TopicStatus::Pending,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.expected.is_defined()
    }

    /// No report, no error and no unhandled error
    pub fn is_incomplete(&self) -> bool {
        !self.has_report() && self.error.is_none() && self.unhandled_error.is_none()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some() || self.unhandled_error.is_some()
    }

    pub fn has_report(&self) -> bool {
        self.report.as_ref().is_some_and(|r| !r.is_empty())
    }

    /// Commands recorded in a given phase
    pub fn outputs_for(&self, phase: Phase) -> impl Iterator<Item = &CommandRecord> {
        self.outputs.iter().filter(move |r| r.phase == phase)
    }

    /// The rendered description
    ///
    /// For boolean topics the `<positive|negative>` placeholder is resolved
    /// against the expected value.
    pub fn description(&self) -> String {
        render_template(&self.template, self.value_type, &self.expected)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn render_template(template: &str, value_type: ValueType, expected: &Expected) -> String {
    if value_type != ValueType::Boolean {
        return template.to_string();
    }
    let Some(caps) = CHOICE.captures(template) else {
        return template.to_string();
    };
    let positive = expected.value().and_then(Value::as_bool).unwrap_or(true);
    let choice = if positive { &caps[1] } else { &caps[2] };
    let rendered = CHOICE.replace(template, choice);
    rendered.split_whitespace().collect::<Vec<_>>().join(" ")
}
