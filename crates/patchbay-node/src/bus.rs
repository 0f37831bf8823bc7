//! Router seam and the per-message cycle guard.
//!
//! The node layer never depends on the runtime. Instead the runtime
//! implements [`Bus`] and hands it to each dispatch; a detached
//! instance simply gets `None` and its emissions drop.
//!
//! # Cycle Guard
//!
//! Every top-level emission allocates a [`Trace`]: the message id plus
//! the set of instances already visited under that id. Fan-out marks an
//! instance before invoking it and skips instances already marked, so
//! wiring cycles terminate after one visit per instance per message.
//!
//! ```text
//! emit("fire")            trace { id: msg:7, visited: {} }
//!   ├─► relay-1           visited: {relay-1}
//!   │     └─ emit("fire") continues msg:7
//!   │          └─► relay-1   already visited, skipped
//!   └─► relay-2           visited: {relay-1, relay-2}
//! ```

use crate::node::Node;
use crate::report::ErrorReport;
use patchbay_types::{MessageId, NodeId};
use serde_json::Value;
use std::collections::HashSet;

/// Cycle guard for one routed message.
///
/// Carries the message id and the instances already visited while
/// fanning it out. Traces are values: each top-level emission gets a
/// fresh one, and nested emissions borrow the one already in flight.
#[derive(Debug, Clone)]
pub struct Trace {
    id: MessageId,
    visited: HashSet<NodeId>,
}

impl Trace {
    /// Creates a trace for a new message with nothing visited yet.
    #[must_use]
    pub fn new(id: MessageId) -> Self {
        Self {
            id,
            visited: HashSet::new(),
        }
    }

    /// The message id this trace guards.
    #[must_use]
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Marks an instance as visited.
    ///
    /// Returns `false` if it was already marked. Callers mark before
    /// invoking, so a handler that re-emits cannot be re-entered on the
    /// same message.
    pub fn mark(&mut self, node: &NodeId) -> bool {
        self.visited.insert(node.clone())
    }

    /// Returns `true` if the instance was already visited on this message.
    #[must_use]
    pub fn seen(&self, node: &NodeId) -> bool {
        self.visited.contains(node)
    }

    /// Number of instances visited so far.
    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

/// Runtime services a node sees during dispatch.
///
/// Implemented by the router; `None` at the dispatch boundary means the
/// instance is detached and emissions are dropped.
pub trait Bus: Send + Sync {
    /// Allocates a trace for a new top-level emission.
    fn begin_trace(&self) -> Trace;

    /// Routes a signal emitted by `source` to the current mode's wired
    /// consumers, under the given trace. Returns the delivery count.
    fn fan_out(&self, source: &Node, signal: &str, payload: &Value, trace: &mut Trace) -> usize;

    /// Accepts an enriched handler error report.
    ///
    /// Returns `false` if no sink is attached, in which case the caller
    /// logs the report itself.
    fn sink_report(&self, report: ErrorReport) -> bool;
}
