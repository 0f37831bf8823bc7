//! Node instances.
//!
//! An instance binds a built [`NodeClass`](crate::NodeClass) to an id,
//! an attribute store, and its own copies of the tables that can change
//! at runtime. Dispatch, the wait lock, and the deferred queue all live
//! here; the router orchestrates instances but holds no per-instance
//! state of its own.
//!
//! Instances work standalone: a node that was never attached to a
//! router still resolves pins and runs handlers, and its emissions are
//! dropped with a debug log.
//!
//! # Example
//!
//! ```
//! use patchbay_node::{handler, ClassDef, Node, NodeClass, NodeConfig, Pin};
//! use patchbay_types::TryNew;
//! use serde_json::json;
//!
//! let class = NodeClass::define(ClassDef::named("Counter").on_input(
//!     "onBump",
//!     handler(|scope, _| {
//!         let n = scope.attribute("count").and_then(|v| v.as_i64()).unwrap_or(0);
//!         scope.set_attribute("count", json!(n + 1));
//!         Ok(())
//!     }),
//! ))?;
//! let node = Node::try_new((class, NodeConfig::with_id("counter-1")))?;
//!
//! node.deliver(None, None, Pin::In, "bump", &json!({}), None);
//! assert_eq!(node.attribute("count"), Some(json!(1)));
//! # Ok::<(), patchbay_node::NodeError>(())
//! ```

use crate::bus::{Bus, Trace};
use crate::class::NodeClass;
use crate::error::{HandlerError, NodeError};
use crate::handler::{handler, Handler, HandlerTable, Scope};
use crate::mirror::AttributeMirror;
use crate::pin::{on_form, Pin};
use crate::report::ErrorReport;
use parking_lot::Mutex;
use patchbay_types::{MessageId, NodeId, TryNew};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

/// Deferred inbound messages a locked instance may hold before new
/// ones are dropped.
pub const DEFERRED_QUEUE_MAX_SIZE: usize = 128;

/// Construction parameters for one instance.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    id: String,
    attributes: HashMap<String, Value>,
    mirror: Option<Arc<dyn AttributeMirror>>,
}

impl NodeConfig {
    /// Starts a config with the given instance id.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: HashMap::new(),
            mirror: None,
        }
    }

    /// Seeds one attribute, builder style.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    /// Attaches an external attribute mirror.
    #[must_use]
    pub fn with_mirror(mut self, mirror: Arc<dyn AttributeMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    /// The instance id this config will build as.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

/// One inbound message deferred while its target was locked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedSignal {
    /// Signal name as originally sent.
    pub signal: String,
    /// Payload as originally sent.
    pub payload: Value,
    /// Message id of the fan-out that carried it, if it arrived wired.
    pub origin: Option<MessageId>,
}

/// Outcome of the wait-lock check for one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Dispatch may proceed: the instance is unlocked, or this is the
    /// signal an armed wait is for.
    Pass,
    /// The instance is locked; the message was deferred.
    Queued,
    /// The instance is locked and its queue is full; the message was
    /// dropped.
    Dropped,
}

#[derive(Default)]
struct WaitState {
    locked: bool,
    waiting_for: Option<String>,
    armed: Option<Arc<Mutex<Option<oneshot::Sender<Value>>>>>,
    shadowed: Option<Option<Handler>>,
    queue: VecDeque<QueuedSignal>,
}

/// A live node instance.
///
/// All state is behind interior mutability, so handlers that re-enter
/// the dispatch path (a handler emitting to a peer that sends back)
/// never hold a lock across an invocation.
pub struct Node {
    id: NodeId,
    class: Arc<NodeClass>,
    attrs: Mutex<HashMap<String, Value>>,
    mirror: Option<Arc<dyn AttributeMirror>>,
    lifecycle: HandlerTable,
    input: Mutex<HandlerTable>,
    mode_pins: BTreeMap<String, HashMap<Pin, HandlerTable>>,
    wait: Mutex<WaitState>,
}

impl TryNew for Node {
    type Error = NodeError;
    type Args = (Arc<NodeClass>, NodeConfig);

    /// Builds an instance from a class and a config.
    ///
    /// The lifecycle and input tables are copied out of the class with
    /// defaults layered underneath, and every mode table is deep-copied
    /// so later instance-level changes never leak between siblings.
    fn try_new((class, config): Self::Args) -> Result<Self, Self::Error> {
        if config.id.is_empty() {
            return Err(NodeError::MissingNodeId {
                class: class.name().into(),
            });
        }
        let lifecycle = class.instance_table(Pin::Lifecycle);
        let input = class.instance_table(Pin::In);
        let mode_pins = class.mode_pins().clone();
        Ok(Self {
            id: NodeId::new(config.id),
            class,
            attrs: Mutex::new(config.attributes),
            mirror: config.mirror,
            lifecycle,
            input: Mutex::new(input),
            mode_pins,
            wait: Mutex::new(WaitState::default()),
        })
    }
}

impl Node {
    /// The instance id.
    #[must_use]
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// The class this instance was built from.
    #[must_use]
    pub fn class(&self) -> &Arc<NodeClass> {
        &self.class
    }

    /// Reads one attribute, preferring the mirror over internal state.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<Value> {
        if let Some(mirror) = &self.mirror {
            if let Some(value) = mirror.read(name) {
                return Some(value);
            }
        }
        self.attrs.lock().get(name).cloned()
    }

    /// Writes one attribute to internal state and, if attached, the
    /// mirror.
    ///
    /// A failed mirror write is logged and the internal value kept, so
    /// handlers keep working against a broken external store.
    pub fn set_attribute(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.attrs.lock().insert(name.clone(), value.clone());
        if let Some(mirror) = &self.mirror {
            if !mirror.write(&name, &value) {
                warn!(
                    node = %self.id,
                    attribute = %name,
                    "mirror write failed, keeping internal value"
                );
            }
        }
    }

    /// All attributes, internal state merged with the mirror's view.
    ///
    /// Mirror values win on conflict, matching [`Node::attribute`].
    #[must_use]
    pub fn attributes(&self) -> HashMap<String, Value> {
        let mut merged = self.attrs.lock().clone();
        if let Some(mirror) = &self.mirror {
            merged.extend(mirror.snapshot());
        }
        merged
    }

    /// Selects the handler table for a pin under a mode.
    ///
    /// A mode-specific table wins when one exists for the pin;
    /// otherwise the unmoded table is returned.
    #[must_use]
    pub fn resolve_pin(&self, mode: Option<&str>, pin: Pin) -> HandlerTable {
        if let Some(mode) = mode {
            if let Some(table) = self.mode_pins.get(mode).and_then(|pins| pins.get(&pin)) {
                return table.clone();
            }
        }
        match pin {
            Pin::Lifecycle => self.lifecycle.clone(),
            Pin::In => self.input.lock().clone(),
        }
    }

    /// Resolves a signal to a handler for dispatch.
    ///
    /// The mode table is consulted first; a signal the mode table lacks
    /// falls back to the unmoded table. Within each table the exact
    /// name wins over the `on`-prefixed fold.
    fn resolve_handler(
        &self,
        mode: Option<&str>,
        pin: Pin,
        signal: &str,
    ) -> Option<(String, Handler)> {
        if let Some(mode) = mode {
            if let Some(table) = self.mode_pins.get(mode).and_then(|pins| pins.get(&pin)) {
                if let Some((key, found)) = table.resolve(signal) {
                    return Some((key.to_string(), Arc::clone(found)));
                }
            }
        }
        match pin {
            Pin::Lifecycle => self
                .lifecycle
                .resolve(signal)
                .map(|(key, found)| (key.to_string(), Arc::clone(found))),
            Pin::In => self
                .input
                .lock()
                .resolve(signal)
                .map(|(key, found)| (key.to_string(), Arc::clone(found))),
        }
    }

    /// Dispatches one message into this instance.
    ///
    /// Resolves the handler, runs it, and routes any handler error to
    /// the error channel instead of propagating it. Returns `false` if
    /// no handler resolved, in which case the message is ignored.
    ///
    /// The handler is resolved and cloned out before invocation, so a
    /// handler that re-enters dispatch on this same instance cannot
    /// deadlock.
    pub fn deliver(
        &self,
        bus: Option<&dyn Bus>,
        mode: Option<&str>,
        pin: Pin,
        signal: &str,
        payload: &Value,
        trace: Option<&mut Trace>,
    ) -> bool {
        let Some((key, resolved)) = self.resolve_handler(mode, pin, signal) else {
            debug!(node = %self.id, pin = %pin, signal, "no handler resolved, message ignored");
            return false;
        };
        let mut scope = Scope::new(self, bus, signal, trace);
        if let Err(err) = resolved(&mut scope, payload) {
            self.raise(bus, &key, &err);
        }
        true
    }

    /// Routes a handler error to the error channel.
    ///
    /// With a router attached the enriched report goes to its sink;
    /// detached, or with no sink installed, it is logged with context.
    fn raise(&self, bus: Option<&dyn Bus>, handler_key: &str, error: &HandlerError) {
        let report = ErrorReport::new(self.id.clone(), self.class.name(), handler_key, error);
        if let Some(bus) = bus {
            if bus.sink_report(report.clone()) {
                return;
            }
        }
        error!(
            node = %self.id,
            class = %self.class.name(),
            handler = handler_key,
            code = %report.code,
            "handler failed: {}", report.reason
        );
    }

    /// Returns `true` while a wait holds this instance's lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.wait.lock().locked
    }

    /// Number of deferred messages currently queued.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.wait.lock().queue.len()
    }

    /// Checks one inbound message against the wait lock.
    ///
    /// Unlocked instances pass everything. A locked instance passes
    /// only the signal its armed wait is for (exact or folded name);
    /// every other message is deferred in arrival order, or dropped
    /// with a warning once [`DEFERRED_QUEUE_MAX_SIZE`] is reached.
    pub fn admit(&self, signal: &str, payload: &Value, origin: Option<MessageId>) -> Admission {
        let mut wait = self.wait.lock();
        if !wait.locked {
            return Admission::Pass;
        }
        let is_awaited = wait
            .waiting_for
            .as_deref()
            .map_or(false, |awaited| awaited == signal || on_form(signal) == awaited);
        if is_awaited {
            let armed = wait
                .armed
                .as_ref()
                .map_or(false, |slot| slot.lock().is_some());
            if armed {
                return Admission::Pass;
            }
        }
        if wait.queue.len() >= DEFERRED_QUEUE_MAX_SIZE {
            warn!(node = %self.id, signal, "deferred queue full, dropping message");
            return Admission::Dropped;
        }
        debug!(node = %self.id, signal, "instance locked, deferring message");
        wait.queue.push_back(QueuedSignal {
            signal: signal.into(),
            payload: payload.clone(),
            origin,
        });
        Admission::Queued
    }

    /// Arms a wait: locks the instance and installs a temporary input
    /// handler under `signal` that forwards the first matching payload
    /// into `sender`.
    ///
    /// The handler previously registered under that name (if any) is
    /// shadowed and comes back in [`Node::end_wait`].
    pub fn begin_wait(&self, signal: &str, sender: oneshot::Sender<Value>) {
        let slot = Arc::new(Mutex::new(Some(sender)));
        let forward = Arc::clone(&slot);
        let temp = handler(move |_, payload: &Value| {
            if let Some(tx) = forward.lock().take() {
                // A dropped receiver means the wait already timed out;
                // the payload is lost either way.
                let _ = tx.send(payload.clone());
            }
            Ok(())
        });
        let shadowed = self.input.lock().insert(signal.to_string(), temp);
        let mut wait = self.wait.lock();
        wait.locked = true;
        wait.waiting_for = Some(signal.to_string());
        wait.armed = Some(slot);
        wait.shadowed = Some(shadowed);
        debug!(node = %self.id, signal, "wait armed, instance locked");
    }

    /// Tears down an armed wait: removes the temporary handler,
    /// restores the shadowed one, and clears the waiting slot.
    ///
    /// The lock itself stays held; [`Node::unlock`] releases it
    /// separately.
    pub fn end_wait(&self) {
        let (signal, shadowed) = {
            let mut wait = self.wait.lock();
            wait.armed = None;
            (wait.waiting_for.take(), wait.shadowed.take())
        };
        if let Some(signal) = signal {
            let mut input = self.input.lock();
            match shadowed.flatten() {
                Some(original) => {
                    input.insert(signal, original);
                }
                None => {
                    input.remove(&signal);
                }
            }
        }
    }

    /// Removes and returns all currently deferred messages, oldest
    /// first. Replaying them is the caller's job; entries keep their
    /// arrival order.
    pub fn drain_deferred(&self) -> Vec<QueuedSignal> {
        self.wait.lock().queue.drain(..).collect()
    }

    /// Releases the wait lock.
    pub fn unlock(&self) {
        self.wait.lock().locked = false;
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let wait = self.wait.lock();
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("class", &self.class.name())
            .field("locked", &wait.locked)
            .field("queued", &wait.queue.len())
            .finish_non_exhaustive()
    }
}
