//! Handler error channel.
//!
//! A handler that returns `Err` never unwinds past the dispatch
//! boundary. The boundary enriches the error with instance context into
//! an [`ErrorReport`] and hands it to the router's [`ErrorSink`]; with
//! no sink attached the report is logged instead.
//!
//! [`CollectingSink`] keeps a rolling window of reports in memory for
//! tests and embedders that poll rather than stream.

use crate::error::HandlerError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use patchbay_types::{ErrorCode, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Reports kept by a [`CollectingSink`] before the oldest is evicted.
pub const DEFAULT_SINK_CAPACITY: usize = 1000;

/// A handler error enriched with the context of where it happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Instance whose handler failed.
    pub node: NodeId,
    /// Class of that instance.
    pub class: String,
    /// Handler table key that ran.
    pub handler: String,
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable failure description.
    pub reason: String,
    /// When the failure was reported.
    pub timestamp: DateTime<Utc>,
}

impl ErrorReport {
    /// Enriches a handler error with instance context, stamped now.
    #[must_use]
    pub fn new(
        node: NodeId,
        class: impl Into<String>,
        handler: impl Into<String>,
        error: &HandlerError,
    ) -> Self {
        Self {
            node,
            class: class.into(),
            handler: handler.into(),
            code: error.code().into(),
            reason: error.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Receiver for enriched handler error reports.
pub trait ErrorSink: Send + Sync + std::fmt::Debug {
    /// Accepts one report. Must not block dispatch.
    fn accept(&self, report: ErrorReport);
}

/// In-memory [`ErrorSink`] with a rolling capacity.
///
/// Oldest reports are evicted once the capacity is reached.
#[derive(Debug)]
pub struct CollectingSink {
    capacity: usize,
    entries: Mutex<VecDeque<ErrorReport>>,
}

impl CollectingSink {
    /// Creates a sink holding up to [`DEFAULT_SINK_CAPACITY`] reports.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SINK_CAPACITY)
    }

    /// Creates a sink with an explicit capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// All currently held reports, oldest first.
    #[must_use]
    pub fn reports(&self) -> Vec<ErrorReport> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Number of held reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no reports are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drops all held reports.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for CollectingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorSink for CollectingSink {
    fn accept(&self, report: ErrorReport) {
        let mut entries = self.entries.lock();
        entries.push_back(report);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }
}
