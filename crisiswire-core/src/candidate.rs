//! Raw, untrusted threat candidates
//!
//! A candidate is whatever a collector or API caller handed us: a loosely typed
//! key-value object. It is kept distinct from [`crate::ThreatRecord`] so that
//! nothing reaches the store without passing validation and sanitization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An unsanitized, unvalidated proposed threat
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Candidate(Map<String, Value>);

impl Candidate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an arbitrary JSON value. Non-objects become an empty candidate,
    /// which validation then rejects with every required field missing.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Builder-style field setter
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Field as a string slice, if it is a JSON string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Candidate {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Value> for Candidate {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}
