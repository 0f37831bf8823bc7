//! External attribute mirroring.
//!
//! Instances keep attributes in internal state and, optionally, mirror
//! them into an external system. Reads prefer the mirror; writes go to
//! both, and a failed mirror write is non-fatal because the internal
//! value already holds.
//!
//! [`MemoryMirror`] is the in-process implementation, useful on its own
//! and as the reference for embedders backing attributes with real
//! external state.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

/// External backing store for instance attributes.
///
/// Implementations must tolerate concurrent access; the instance calls
/// them from whatever context its handlers run in.
pub trait AttributeMirror: Send + Sync + std::fmt::Debug {
    /// Reads one attribute from the external system.
    ///
    /// `None` means the mirror has no value and the instance falls back
    /// to its internal state.
    fn read(&self, name: &str) -> Option<Value>;

    /// Writes one attribute to the external system.
    ///
    /// Returns `false` on failure. The instance logs the failure and
    /// keeps its internal value.
    fn write(&self, name: &str, value: &Value) -> bool;

    /// All attributes the external system currently holds.
    fn snapshot(&self) -> HashMap<String, Value>;
}

/// In-process [`AttributeMirror`] backed by a map.
#[derive(Debug, Default)]
pub struct MemoryMirror {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryMirror {
    /// Creates an empty mirror.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one attribute, builder style.
    ///
    /// # Example
    ///
    /// ```
    /// use patchbay_node::{AttributeMirror, MemoryMirror};
    /// use serde_json::json;
    ///
    /// let mirror = MemoryMirror::new().with_entry("gain", json!(0.5));
    /// assert_eq!(mirror.read("gain"), Some(json!(0.5)));
    /// ```
    #[must_use]
    pub fn with_entry(self, name: impl Into<String>, value: Value) -> Self {
        self.entries.lock().insert(name.into(), value);
        self
    }

    /// Number of mirrored attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is mirrored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl AttributeMirror for MemoryMirror {
    fn read(&self, name: &str) -> Option<Value> {
        self.entries.lock().get(name).cloned()
    }

    fn write(&self, name: &str, value: &Value) -> bool {
        self.entries.lock().insert(name.into(), value.clone());
        true
    }

    fn snapshot(&self) -> HashMap<String, Value> {
        self.entries.lock().clone()
    }
}
