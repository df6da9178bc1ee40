//! Schema sections, candidate values and the section composer

use crate::error::{SectionError, TypeMismatch, Violation};
use crate::topic::{Expected, Topic, TopicKey, TopicSpec};
use crate::value::{Value, ValueType};
use serde::Serialize;

/// Schema declaration of one section: ordered topic names, types and docs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSchema {
    name: String,
    doc: String,
    topics: Vec<TopicSpec>,
}

impl SectionSchema {
    pub fn new(name: impl Into<String>, doc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: doc.into(),
            topics: Vec::new(),
        }
    }

    /// Declare a topic. Declaration order is execution order.
    pub fn topic(
        mut self,
        name: impl Into<String>,
        value_type: ValueType,
        template: impl Into<String>,
    ) -> Self {
        let spec = TopicSpec::new(name, value_type, template);
        debug_assert!(
            self.get(&spec.name).is_none(),
            "topic {} declared twice in {}",
            spec.name,
            self.name
        );
        self.topics.push(spec);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn topics(&self) -> &[TopicSpec] {
        &self.topics
    }

    pub fn get(&self, topic: &str) -> Option<&TopicSpec> {
        self.topics.iter().find(|t| t.name == topic)
    }

    /// Human title derived from the name: `os_installation` -> `Os installation`
    pub fn title(&self) -> String {
        title_case(&self.name)
    }
}

/// The full schema: sections in declaration order
///
/// Built once per process and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    sections: Vec<SectionSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(mut self, section: SectionSchema) -> Self {
        self.sections.push(section);
        self
    }

    pub fn sections(&self) -> &[SectionSchema] {
        &self.sections
    }

    pub fn get(&self, section: &str) -> Option<&SectionSchema> {
        self.sections.iter().find(|s| s.name == section)
    }

    pub fn topic(&self, key: &TopicKey) -> Option<&TopicSpec> {
        self.get(&key.section)?.get(&key.topic)
    }

    pub fn contains(&self, key: &TopicKey) -> bool {
        self.topic(key).is_some()
    }

    /// Every topic key in declaration order
    pub fn keys(&self) -> impl Iterator<Item = TopicKey> + '_ {
        self.sections.iter().flat_map(|s| {
            s.topics
                .iter()
                .map(move |t| TopicKey::new(s.name.as_str(), t.name.as_str()))
        })
    }
}

/// Candidate values for one section, keyed by topic name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionValues {
    entries: Vec<(String, Expected)>,
}

impl SectionValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a topic to a defined value
    pub fn set(mut self, topic: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(topic, Expected::Value(value.into()));
        self
    }

    /// Declare a topic as deliberately undefined
    pub fn undefined(mut self, topic: impl Into<String>) -> Self {
        self.insert(topic, Expected::Undefined);
        self
    }

    /// Insert or replace a candidate, keeping the first insertion position
    pub fn insert(&mut self, topic: impl Into<String>, expected: Expected) {
        let topic = topic.into();
        match self.entries.iter_mut().find(|(name, _)| *name == topic) {
            Some((_, slot)) => *slot = expected,
            None => self.entries.push((topic, expected)),
        }
    }

    /// Overlay another set of candidates on top of this one
    pub fn merge(&mut self, other: &SectionValues) {
        for (name, expected) in &other.entries {
            self.insert(name.clone(), expected.clone());
        }
    }

    pub fn get(&self, topic: &str) -> Option<&Expected> {
        self.entries
            .iter()
            .find(|(name, _)| name == topic)
            .map(|(_, expected)| expected)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Expected)> {
        self.entries.iter().map(|(name, e)| (name.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A composed section: topics in schema order with their expected values
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub name: String,
    pub title: String,
    pub doc: String,
    pub topics: Vec<Topic>,
}

impl Section {
    pub fn topic(&self, name: &str) -> Option<&Topic> {
        self.topics.iter().find(|t| t.name == name)
    }

    pub fn topic_mut(&mut self, name: &str) -> Option<&mut Topic> {
        self.topics.iter_mut().find(|t| t.name == name)
    }
}

/// Bind candidate values to a schema section
///
/// Runs three passes (missing, unknown, wrong type) and reports every
/// violation found, not only the first one.
pub fn compose_section(
    schema: &SectionSchema,
    candidates: &SectionValues,
) -> Result<Section, SectionError> {
    let mut violations = Vec::new();

    let missing: Vec<String> = schema
        .topics
        .iter()
        .filter(|spec| candidates.get(&spec.name).is_none())
        .map(|spec| spec.name.clone())
        .collect();
    if !missing.is_empty() {
        violations.push(Violation::MissingTopic(missing));
    }

    let unknown: Vec<String> = candidates
        .iter()
        .filter(|(name, _)| schema.get(name).is_none())
        .map(|(name, _)| name.to_string())
        .collect();
    if !unknown.is_empty() {
        violations.push(Violation::UnknownTopic(unknown));
    }

    let mismatched: Vec<TypeMismatch> = candidates
        .iter()
        .filter_map(|(name, expected)| {
            let spec = schema.get(name)?;
            let value = expected.value()?;
            (value.value_type() != spec.value_type).then(|| TypeMismatch {
                topic: name.to_string(),
                declared: spec.value_type,
                actual: value.value_type(),
            })
        })
        .collect();
    if !mismatched.is_empty() {
        violations.push(Violation::WrongTopicType(mismatched));
    }

    if !violations.is_empty() {
        return Err(SectionError {
            section: schema.name.clone(),
            violations,
        });
    }

    let topics = schema
        .topics
        .iter()
        .map(|spec| Topic::new(spec, candidates.get(&spec.name).cloned().unwrap_or_default()))
        .collect();

    Ok(Section {
        name: schema.name.clone(),
        title: schema.title(),
        doc: schema.doc.clone(),
        topics,
    })
}

fn title_case(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
