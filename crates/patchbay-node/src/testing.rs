//! Testing helpers for node classes and instances.
//!
//! Drives a single [`Node`] without a router, so class behavior can be
//! tested in isolation.
//!
//! # Features
//!
//! - Router-independent dispatch against either pin
//! - Optional active mode for mode-table tests
//! - Delivery logging for snapshot testing
//! - Stock handlers, a failing mirror, and a no-op bus stub
//!
//! # Example
//!
//! ```
//! use patchbay_node::testing::{recording, signal_log, NodeTestHarness};
//! use patchbay_node::{ClassDef, NodeClass};
//! use serde_json::json;
//!
//! let log = signal_log();
//! let class = NodeClass::define(
//!     ClassDef::named("Probe").on_input("onFire", recording(&log)),
//! )
//! .expect("class");
//!
//! let mut harness = NodeTestHarness::from_class(&class, "probe-1").expect("harness");
//! assert!(harness.send("fire", json!({"n": 1})));
//! assert!(!harness.send("vanish", json!({})));
//!
//! assert_eq!(log.lock().len(), 1);
//! assert_eq!(harness.delivery_log().len(), 2);
//! assert!(!harness.delivery_log()[1].handled);
//! ```

use crate::bus::{Bus, Trace};
use crate::class::NodeClass;
use crate::error::{HandlerError, NodeError};
use crate::handler::{handler, Handler};
use crate::mirror::AttributeMirror;
use crate::node::{Node, NodeConfig};
use crate::pin::{Pin, ON_INIT, ON_START, ON_STOP};
use crate::report::ErrorReport;
use parking_lot::Mutex;
use patchbay_types::{MessageId, TryNew};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared log filled by [`recording`] handlers.
pub type SignalLog = Arc<Mutex<Vec<(String, Value)>>>;

/// Creates an empty shared signal log.
#[must_use]
pub fn signal_log() -> SignalLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Handler that records each invocation's signal and payload.
#[must_use]
pub fn recording(log: &SignalLog) -> Handler {
    let log = Arc::clone(log);
    handler(move |scope, payload| {
        log.lock().push((scope.signal().to_string(), payload.clone()));
        Ok(())
    })
}

/// Handler that always fails with `HANDLER_EXECUTION_FAILED`.
#[must_use]
pub fn failing(reason: &str) -> Handler {
    let reason = reason.to_string();
    handler(move |_, _| Err(HandlerError::ExecutionFailed(reason.clone())))
}

/// Mirror whose writes always fail and whose reads see nothing.
#[derive(Debug, Default)]
pub struct FailingMirror;

impl AttributeMirror for FailingMirror {
    fn read(&self, _name: &str) -> Option<Value> {
        None
    }

    fn write(&self, _name: &str, _value: &Value) -> bool {
        false
    }

    fn snapshot(&self) -> HashMap<String, Value> {
        HashMap::new()
    }
}

/// [`Bus`] stub that routes nothing and collects error reports.
///
/// Useful for testing the error channel without a router.
#[derive(Debug, Default)]
pub struct NullBus {
    reports: Mutex<Vec<ErrorReport>>,
    next_id: AtomicU64,
}

impl NullBus {
    /// All reports sunk so far, oldest first.
    #[must_use]
    pub fn reports(&self) -> Vec<ErrorReport> {
        self.reports.lock().clone()
    }
}

impl Bus for NullBus {
    fn begin_trace(&self) -> Trace {
        Trace::new(MessageId::from_seq(
            self.next_id.fetch_add(1, Ordering::Relaxed),
        ))
    }

    fn fan_out(&self, _source: &Node, _signal: &str, _payload: &Value, _trace: &mut Trace) -> usize {
        0
    }

    fn sink_report(&self, report: ErrorReport) -> bool {
        self.reports.lock().push(report);
        true
    }
}

/// Record of one message driven through a [`NodeTestHarness`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// Pin the message was dispatched into.
    pub pin: Pin,
    /// Signal name as sent.
    pub signal: String,
    /// Whether a handler resolved and ran.
    pub handled: bool,
}

/// Test harness driving one instance without a router.
pub struct NodeTestHarness {
    node: Node,
    mode: Option<String>,
    delivery_log: Vec<DeliveryRecord>,
}

impl NodeTestHarness {
    /// Wraps an already-built instance.
    #[must_use]
    pub fn new(node: Node) -> Self {
        Self {
            node,
            mode: None,
            delivery_log: Vec::new(),
        }
    }

    /// Builds an instance of `class` with the given id and wraps it.
    ///
    /// # Errors
    ///
    /// Returns [`NodeError::MissingNodeId`] if `id` is empty.
    pub fn from_class(class: &Arc<NodeClass>, id: &str) -> Result<Self, NodeError> {
        let node = Node::try_new((Arc::clone(class), NodeConfig::with_id(id)))?;
        Ok(Self::new(node))
    }

    /// Sets the mode future deliveries dispatch under.
    #[must_use]
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    /// The instance under test.
    #[must_use]
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Dispatches a signal into the input pin.
    ///
    /// Returns `true` if a handler resolved and ran.
    pub fn send(&mut self, signal: &str, payload: Value) -> bool {
        self.dispatch(Pin::In, signal, payload)
    }

    /// Dispatches a lifecycle operation with a null payload.
    pub fn lifecycle(&mut self, op: &str) -> bool {
        self.dispatch(Pin::Lifecycle, op, Value::Null)
    }

    /// Drives the `onInit` lifecycle handler.
    pub fn init(&mut self) -> bool {
        self.lifecycle(ON_INIT)
    }

    /// Drives the `onStart` lifecycle handler.
    pub fn start(&mut self) -> bool {
        self.lifecycle(ON_START)
    }

    /// Drives the `onStop` lifecycle handler.
    pub fn stop(&mut self) -> bool {
        self.lifecycle(ON_STOP)
    }

    fn dispatch(&mut self, pin: Pin, signal: &str, payload: Value) -> bool {
        let handled = self
            .node
            .deliver(None, self.mode.as_deref(), pin, signal, &payload, None);
        self.delivery_log.push(DeliveryRecord {
            pin,
            signal: signal.to_string(),
            handled,
        });
        handled
    }

    /// Returns the delivery log for snapshot testing.
    #[must_use]
    pub fn delivery_log(&self) -> &[DeliveryRecord] {
        &self.delivery_log
    }

    /// Clears the delivery log.
    pub fn clear_log(&mut self) {
        self.delivery_log.clear();
    }
}
