//! Baselines and composed descriptions
//!
//! A [`Baseline`] is the declarative input: per-section candidate values and
//! description settings, optionally derived from a parent baseline. Composing
//! it against a [`Schema`] yields a [`Description`], the mutable run state the
//! engine fills in and the reporter reads.

use crate::error::{RunFailure, SchemaError};
use crate::section::{Schema, Section, SectionValues, compose_section};
use crate::topic::{Topic, TopicKey, TopicStatus};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// A named set of expected values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Baseline {
    name: String,
    sections: Vec<(String, SectionValues)>,
    settings: BTreeMap<String, String>,
}

impl Baseline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sections: Vec::new(),
            settings: BTreeMap::new(),
        }
    }

    /// A new baseline starting from this one's values and settings
    pub fn derive(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sections: self.sections.clone(),
            settings: self.settings.clone(),
        }
    }

    /// Add values for a section. Topics already present are overridden,
    /// topics not named keep their current value.
    pub fn section(mut self, name: impl Into<String>, values: SectionValues) -> Self {
        self.merge_section(name, &values);
        self
    }

    pub fn setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    pub fn merge_section(&mut self, name: impl Into<String>, values: &SectionValues) {
        let name = name.into();
        match self.sections.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => existing.merge(values),
            None => self.sections.push((name, values.clone())),
        }
    }

    pub fn set_setting(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.settings.insert(key.into(), value.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &BTreeMap<String, String> {
        &self.settings
    }

    pub fn section_values(&self, name: &str) -> Option<&SectionValues> {
        self.sections
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, values)| values)
    }

    /// Validate this baseline against the schema and build a description
    ///
    /// Every section is composed even after a failure so the error lists
    /// all problems at once.
    pub fn compose(&self, schema: &Schema, host: &str) -> Result<Description, SchemaError> {
        let mut missing_sections = Vec::new();
        let mut section_errors = Vec::new();
        let mut sections = Vec::new();

        for section_schema in schema.sections() {
            let Some(values) = self.section_values(section_schema.name()) else {
                missing_sections.push(section_schema.name().to_string());
                continue;
            };
            match compose_section(section_schema, values) {
                Ok(section) => sections.push(section),
                Err(err) => section_errors.push(err),
            }
        }

        let unknown_sections: Vec<String> = self
            .sections
            .iter()
            .filter(|(name, _)| schema.get(name).is_none())
            .map(|(name, _)| name.clone())
            .collect();

        if !missing_sections.is_empty() || !unknown_sections.is_empty() || !section_errors.is_empty()
        {
            return Err(SchemaError::InvalidBaseline {
                baseline: self.name.clone(),
                missing_sections,
                unknown_sections,
                sections: section_errors,
            });
        }

        Ok(Description {
            name: self.name.clone(),
            host: host.to_string(),
            duration: None,
            ignored_topics: Vec::new(),
            sections,
            settings: self.settings.clone(),
        })
    }
}

/// A composed baseline bound to a host, plus run metadata
#[derive(Debug, Clone, Serialize)]
pub struct Description {
    pub name: String,
    pub host: String,
    pub duration: Option<Duration>,
    pub ignored_topics: Vec<TopicKey>,
    pub sections: Vec<Section>,
    pub settings: BTreeMap<String, String>,
}

/// Topics of a finished run sorted into buckets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub succeeded: Vec<TopicKey>,
    pub failed: Vec<TopicKey>,
    pub incomplete: Vec<TopicKey>,
    pub hardener_missing: Vec<TopicKey>,
    pub ignored: Vec<TopicKey>,
}

impl Description {
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn topic(&self, key: &TopicKey) -> Option<&Topic> {
        self.section(&key.section)?.topic(&key.topic)
    }

    pub fn topic_mut(&mut self, key: &TopicKey) -> Option<&mut Topic> {
        self.sections
            .iter_mut()
            .find(|s| s.name == key.section)?
            .topic_mut(&key.topic)
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Every topic with its key, in schema order
    pub fn topics(&self) -> impl Iterator<Item = (TopicKey, &Topic)> {
        self.sections.iter().flat_map(|s| {
            s.topics
                .iter()
                .map(move |t| (TopicKey::new(s.name.as_str(), t.name.as_str()), t))
        })
    }

    /// Number of topics, optionally restricted to a single one
    pub fn topic_count(&self, only: Option<&TopicKey>) -> usize {
        self.topics()
            .filter(|(key, _)| only.is_none_or(|o| o == key))
            .count()
    }

    /// Sort topics into success / failed / incomplete / missing / ignored
    ///
    /// A topic without a hardener has no report either, so it shows up in
    /// both `incomplete` and `hardener_missing`.
    pub fn classify(&self, only: Option<&TopicKey>) -> Classification {
        let mut out = Classification::default();
        for (key, topic) in self.topics() {
            if only.is_some_and(|o| *o != key) {
                continue;
            }
            if !topic.is_defined() {
                if topic.status == TopicStatus::Ignored {
                    out.ignored.push(key);
                }
                continue;
            }
            if topic.is_failed() {
                out.failed.push(key.clone());
            }
            if topic.is_incomplete() {
                out.incomplete.push(key.clone());
            }
            if !topic.hardener_implemented {
                out.hardener_missing.push(key.clone());
            }
            if topic.status.is_success() {
                out.succeeded.push(key);
            }
        }
        out
    }

    /// Aggregate failure over defined topics, if any
    pub fn check_failed_topics(&self, only: Option<&TopicKey>) -> Result<(), RunFailure> {
        let Classification {
            failed,
            incomplete,
            hardener_missing,
            ..
        } = self.classify(only);
        let failure = RunFailure {
            failed,
            incomplete,
            hardener_missing,
        };
        if failure.is_empty() {
            Ok(())
        } else {
            Err(failure)
        }
    }
}
