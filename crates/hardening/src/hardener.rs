//! The Hardener trait and its registry

use crate::context::TopicContext;
use crate::error::{HardenError, SchemaError};
use crate::section::Schema;
use crate::topic::TopicKey;
use crate::value::Value;
use std::collections::BTreeMap;

/// Result of a hardener operation that may not be implemented
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Implemented(T),
    /// The operation (or this particular case of it) is not supported,
    /// optionally with a reason
    NotImplemented(Option<String>),
}

impl<T> Outcome<T> {
    pub fn is_implemented(&self) -> bool {
        matches!(self, Self::Implemented(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Implemented(v) => Outcome::Implemented(f(v)),
            Self::NotImplemented(reason) => Outcome::NotImplemented(reason),
        }
    }
}

pub type HardenResult<T> = Result<Outcome<T>, HardenError>;

/// Shorthand for a successful, implemented result
pub fn done<T>(value: T) -> HardenResult<T> {
    Ok(Outcome::Implemented(value))
}

/// Shorthand for a check that observed `value`
pub fn found(value: impl Into<Value>) -> HardenResult<Option<Value>> {
    Ok(Outcome::Implemented(Some(value.into())))
}

pub fn not_implemented<T>() -> HardenResult<T> {
    Ok(Outcome::NotImplemented(None))
}

pub fn not_implemented_because<T>(reason: impl Into<String>) -> HardenResult<T> {
    Ok(Outcome::NotImplemented(Some(reason.into())))
}

/// Check, harden and report one topic
///
/// Every operation defaults to not implemented. A hardener that only
/// reports (e.g. listing installed packages) implements `report` alone.
pub trait Hardener: Send + Sync {
    /// The topic this hardener is bound to
    fn key(&self) -> TopicKey;

    /// Observe the current value on the host
    ///
    /// `Some(value)` is compared against the expected value. `None` means
    /// the value could not be determined.
    fn check(&self, _ctx: &mut TopicContext<'_>) -> HardenResult<Option<Value>> {
        not_implemented()
    }

    /// Bring the host to the expected value, returning a report of the change
    fn harden(&self, _ctx: &mut TopicContext<'_>) -> HardenResult<String> {
        not_implemented()
    }

    /// Describe the current state when no comparison is possible
    fn report(&self, _ctx: &mut TopicContext<'_>) -> HardenResult<Value> {
        not_implemented()
    }
}

pub type BoxedHardener = Box<dyn Hardener>;

/// Hardeners keyed by topic, at most one per key
#[derive(Default)]
pub struct HardenerRegistry {
    hardeners: BTreeMap<TopicKey, BoxedHardener>,
}

impl HardenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hardener: impl Hardener + 'static) -> Result<(), SchemaError> {
        self.register_boxed(Box::new(hardener))
    }

    pub fn register_boxed(&mut self, hardener: BoxedHardener) -> Result<(), SchemaError> {
        let key = hardener.key();
        if self.hardeners.contains_key(&key) {
            return Err(SchemaError::DuplicateHardener(key));
        }
        self.hardeners.insert(key, hardener);
        Ok(())
    }

    pub fn get(&self, key: &TopicKey) -> Option<&dyn Hardener> {
        self.hardeners.get(key).map(|h| &**h)
    }

    pub fn contains(&self, key: &TopicKey) -> bool {
        self.hardeners.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &TopicKey> {
        self.hardeners.keys()
    }

    /// Registered keys the schema does not declare
    pub fn unknown_keys(&self, schema: &Schema) -> Vec<TopicKey> {
        self.hardeners
            .keys()
            .filter(|key| !schema.contains(key))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.hardeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hardeners.is_empty()
    }
}

impl std::fmt::Debug for HardenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.hardeners.keys()).finish()
    }
}
