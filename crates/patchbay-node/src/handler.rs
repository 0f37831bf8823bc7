//! Handler tables and the handler execution scope.
//!
//! Handlers are plain data: reference-counted closures keyed by name in
//! a [`HandlerTable`]. Inheritance and per-instance overrides are
//! resolved once, at build time, by layering tables. Dispatch is then a
//! flat name lookup with no chain walking.
//!
//! # Name Resolution
//!
//! [`HandlerTable::resolve`] tries the exact signal name first, then the
//! [`on_form`](crate::on_form) fold (`"ack"` resolves to `"onAck"`).
//! Exact entries always shadow folded ones.
//!
//! # Example
//!
//! ```
//! use patchbay_node::{handler, HandlerTable};
//!
//! let mut table = HandlerTable::new();
//! table.insert(
//!     "onFire",
//!     handler(|scope, payload| {
//!         scope.emit("fired", payload.clone());
//!         Ok(())
//!     }),
//! );
//!
//! assert!(table.contains("onFire"));
//! assert!(table.resolve("fire").is_some());
//! ```

use crate::bus::{Bus, Trace};
use crate::error::HandlerError;
use crate::node::Node;
use crate::pin::on_form;
use patchbay_types::NodeId;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Bare function object behind a [`Handler`].
pub type HandlerFn = dyn Fn(&mut Scope<'_>, &Value) -> Result<(), HandlerError> + Send + Sync;

/// A named unit of behavior attached to a pin.
///
/// Cloning a handler clones the `Arc`, so layered tables share one
/// closure, never duplicate it.
pub type Handler = Arc<HandlerFn>;

/// Wraps a closure as a [`Handler`].
///
/// # Example
///
/// ```
/// use patchbay_node::{handler, HandlerError};
///
/// let log_only = handler(|scope, _payload| {
///     if scope.signal().is_empty() {
///         return Err(HandlerError::InvalidPayload("empty signal".into()));
///     }
///     Ok(())
/// });
/// ```
#[must_use]
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut Scope<'_>, &Value) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Named handlers for one pin.
///
/// Tables are value types. Class inheritance, mode overrides, and
/// per-instance defaults are all expressed as [`HandlerTable::layered`]
/// merges performed at build time.
#[derive(Clone, Default)]
pub struct HandlerTable {
    entries: HashMap<String, Handler>,
}

impl HandlerTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, returning the one it replaced if any.
    pub fn insert(&mut self, name: impl Into<String>, handler: Handler) -> Option<Handler> {
        self.entries.insert(name.into(), handler)
    }

    /// Removes a handler by exact name.
    pub fn remove(&mut self, name: &str) -> Option<Handler> {
        self.entries.remove(name)
    }

    /// Looks up a handler by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Handler> {
        self.entries.get(name)
    }

    /// Returns `true` if a handler is registered under the exact name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Resolves a signal to a handler: exact name first, then the
    /// `on`-prefixed fold.
    ///
    /// Returns the key the handler is registered under together with
    /// the handler, so callers can report which entry actually ran.
    #[must_use]
    pub fn resolve(&self, signal: &str) -> Option<(&str, &Handler)> {
        if let Some((key, handler)) = self.entries.get_key_value(signal) {
            return Some((key.as_str(), handler));
        }
        let folded = on_form(signal);
        self.entries
            .get_key_value(folded.as_str())
            .map(|(key, handler)| (key.as_str(), handler))
    }

    /// Merges two tables, with `overlay` entries shadowing `base`.
    ///
    /// Handlers are shared by `Arc`, not cloned.
    #[must_use]
    pub fn layered(base: &Self, overlay: &Self) -> Self {
        let mut merged = base.clone();
        for (name, handler) in &overlay.entries {
            merged.entries.insert(name.clone(), Arc::clone(handler));
        }
        merged
    }

    /// Iterates registered handler names in arbitrary order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no handlers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("HandlerTable")
            .field("handlers", &names)
            .finish()
    }
}

/// Execution context handed to a running handler.
///
/// The scope borrows the instance the handler runs on, the router seam
/// (if the instance is attached to one), and the cycle-guard trace of
/// the delivery that triggered it. [`Scope::emit`] continues that trace;
/// a handler triggered outside any fan-out starts a fresh one.
pub struct Scope<'a> {
    node: &'a Node,
    bus: Option<&'a dyn Bus>,
    signal: &'a str,
    trace: Option<&'a mut Trace>,
}

impl<'a> Scope<'a> {
    pub(crate) fn new(
        node: &'a Node,
        bus: Option<&'a dyn Bus>,
        signal: &'a str,
        trace: Option<&'a mut Trace>,
    ) -> Self {
        Self {
            node,
            bus,
            signal,
            trace,
        }
    }

    /// The instance this handler runs on.
    #[must_use]
    pub fn node(&self) -> &Node {
        self.node
    }

    /// Id of the instance this handler runs on.
    #[must_use]
    pub fn id(&self) -> &NodeId {
        self.node.id()
    }

    /// Class name of the instance this handler runs on.
    #[must_use]
    pub fn class_name(&self) -> &str {
        self.node.class().name()
    }

    /// The signal name this handler was dispatched for, as sent.
    ///
    /// May differ from the handler's registered key when the
    /// `on`-prefixed fold resolved it.
    #[must_use]
    pub fn signal(&self) -> &str {
        self.signal
    }

    /// Returns `true` if the instance is attached to a router.
    ///
    /// Detached instances can still run handlers; their emissions are
    /// dropped with a debug log.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.bus.is_some()
    }

    /// Reads an attribute, mirror first.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.node.attribute(name)
    }

    /// Writes an attribute to internal state and the mirror.
    pub fn set_attribute(&self, name: impl Into<String>, value: Value) {
        self.node.set_attribute(name, value);
    }

    /// Emits a signal from this node's output, returning how many
    /// consumers it reached.
    ///
    /// Routing follows the current mode's wiring. An emission made
    /// while handling a fan-out delivery continues that delivery's
    /// trace, so a node already visited on this message is skipped. An
    /// emission made from any other context starts a fresh trace.
    ///
    /// Signals outside the class's declared output schema are still
    /// routed; the mismatch is logged at debug level.
    pub fn emit(&mut self, signal: &str, payload: Value) -> usize {
        if let Some(schema) = self.node.class().output_schema() {
            if !schema.declares(signal) {
                debug!(
                    node = %self.node.id(),
                    class = %self.node.class().name(),
                    signal,
                    "emitting signal outside the declared output schema"
                );
            }
        }
        let Some(bus) = self.bus else {
            debug!(
                node = %self.node.id(),
                signal,
                "emit with no router attached, dropping"
            );
            return 0;
        };
        match self.trace.as_deref_mut() {
            Some(trace) => bus.fan_out(self.node, signal, &payload, trace),
            None => {
                let mut trace = bus.begin_trace();
                bus.fan_out(self.node, signal, &payload, &mut trace)
            }
        }
    }
}
