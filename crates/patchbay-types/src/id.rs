//! Identifier types for nodes and messages.
//!
//! Patchbay identifiers are deliberately plain:
//!
//! - [`NodeId`] wraps the caller-supplied instance id string. Uniqueness is
//!   enforced by the Router among live instances, not by the type.
//! - [`MessageId`] wraps the Router's monotonically increasing dispatch
//!   counter. Every top-level emission gets a fresh one.
//!
//! Neither id is ever minted by this crate; both originate in the embedding
//! application (node ids) or the owning Router (message ids).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a live node instance.
///
/// Node ids are chosen by the embedding application (`"spawner-1"`,
/// `"hud"`). The Router rejects duplicates among live instances; the type
/// itself accepts any string, including an empty one, so that validation
/// errors surface at instance construction rather than here.
///
/// # Example
///
/// ```
/// use patchbay_types::NodeId;
///
/// let id = NodeId::new("spawner-1");
/// assert_eq!(id.as_str(), "spawner-1");
/// assert_eq!(format!("{id}"), "spawner-1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates a node id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the id is the empty string.
    ///
    /// Empty ids are constructible but never valid for a live instance.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// NOTE: NodeId does not implement Default intentionally.
// A node id must always be chosen by the caller; an implicit
// empty or placeholder id would defeat the duplicate check at
// instance creation.

/// Identifier of one top-level dispatch chain.
///
/// Message ids are allocated by `Router::next_message_id()` and are strictly
/// increasing within one Router. They tag a propagation chain for cycle
/// detection and correlate queued deliveries with the emission that queued
/// them.
///
/// # Example
///
/// ```
/// use patchbay_types::MessageId;
///
/// let id = MessageId::from_seq(7);
/// assert_eq!(id.value(), 7);
/// assert_eq!(format!("{id}"), "msg:7");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a message id from a raw sequence number.
    ///
    /// Outside of tests this is only called by the Router's counter.
    #[must_use]
    pub fn from_seq(seq: u64) -> Self {
        Self(seq)
    }

    /// Returns the raw sequence number.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg:{}", self.0)
    }
}

// NOTE: MessageId does not implement Default intentionally.
// A defaulted id would alias the Router counter's first allocation
// and break the "strictly increasing per chain" contract. Ids must
// come from the counter.

// Tests are in lib.rs as integration tests for the public API.
