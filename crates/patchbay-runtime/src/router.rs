//! The message router.
//!
//! A [`Router`] owns the three registries a running patch is made of:
//! node classes, live instances, and modes. It drives lifecycle fan-out,
//! dispatches directed messages, routes emissions along the current
//! mode's wiring, and arbitrates the per-instance wait lock.
//!
//! All registries sit behind interior mutability, so a `Router` is a
//! plain value shared by reference (or `Arc`) between the driving code
//! and any task parked in [`Router::wait_for_signal`]. No registry or
//! instance lock is ever held across a handler invocation: handlers are
//! free to re-enter the dispatch path, and wiring cycles are cut by the
//! per-message visited set, not by locking.
//!
//! # Dispatch Walkthrough
//!
//! ```text
//! send_to("pulse-1", "tick")
//!   └─ pulse-1 onTick runs, emits "level"
//!        └─ fan_out under mode "live"      trace msg:4 { }
//!             wiring: Pulse → [Meter]
//!               ├─► meter-1                visited: {meter-1}
//!               └─► meter-2                visited: {meter-1, meter-2}
//! ```
//!
//! # Example
//!
//! ```
//! use patchbay_node::{handler, ClassDef, NodeClass, NodeConfig};
//! use patchbay_runtime::{ModeConfig, Router};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let router = Router::new();
//! router.register_class(NodeClass::define(ClassDef::named("Meter").on_input(
//!     "onLevel",
//!     handler(|scope, payload| {
//!         scope.set_attribute("last", payload.clone());
//!         Ok(())
//!     }),
//! ))?)?;
//!
//! let meter = router.create_instance("Meter", NodeConfig::with_id("meter-1"))?;
//! router.define_mode("live", ModeConfig::new().with_node("Meter"))?;
//! router.switch_mode("live")?;
//! router.init();
//! router.start()?;
//!
//! router.send_to(&meter, "level", json!({ "db": -6 }));
//!
//! let node = router.node(&meter).ok_or("meter gone")?;
//! assert_eq!(node.attribute("last"), Some(json!({ "db": -6 })));
//! # Ok(())
//! # }
//! ```

use crate::error::RouterError;
use crate::mode::{ModeBook, ModeConfig};
use parking_lot::Mutex;
use patchbay_node::{
    Admission, Bus, ErrorReport, ErrorSink, Node, NodeClass, NodeConfig, Pin, Trace,
    ON_DESPAWNING, ON_INIT, ON_MODE_CHANGE, ON_SPAWNED, ON_START, ON_STOP,
};
use patchbay_types::{MessageId, NodeId, TryNew};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Default timeout for [`Router::wait_for_signal`], in milliseconds.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5000;

/// Outcome of one directed message.
///
/// Directed messages soft-fail: an outcome other than
/// [`Delivery::Delivered`] is reported here and logged, never raised as
/// an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delivery {
    /// A handler resolved and ran.
    Delivered,
    /// The target is locked; the message was deferred into its queue.
    Queued,
    /// The target is locked and its deferred queue is full; the message
    /// was dropped.
    QueueFull,
    /// The target resolved no handler for the signal; the message was
    /// ignored.
    NoHandler,
    /// No instance is registered under the target id.
    UnknownNode,
    /// The router has not been started.
    NotStarted,
}

impl Delivery {
    /// Returns `true` if a handler actually ran.
    #[must_use]
    pub fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Routes messages between node instances.
///
/// See the [module docs](self) for the dispatch model.
pub struct Router {
    classes: Mutex<HashMap<String, Arc<NodeClass>>>,
    /// Live instances in registration order. Lifecycle fan-out walks
    /// this order, so lookups stay linear on purpose.
    nodes: Mutex<Vec<Arc<Node>>>,
    modes: Mutex<BTreeMap<String, ModeConfig>>,
    current_mode: Mutex<Option<String>>,
    sink: Mutex<Option<Arc<dyn ErrorSink>>>,
    initialized: AtomicBool,
    started: AtomicBool,
    message_seq: AtomicU64,
}

impl Router {
    /// Creates an empty router with no sink attached.
    #[must_use]
    pub fn new() -> Self {
        Self {
            classes: Mutex::new(HashMap::new()),
            nodes: Mutex::new(Vec::new()),
            modes: Mutex::new(BTreeMap::new()),
            current_mode: Mutex::new(None),
            sink: Mutex::new(None),
            initialized: AtomicBool::new(false),
            started: AtomicBool::new(false),
            message_seq: AtomicU64::new(0),
        }
    }

    /// Attaches an error sink, builder style.
    ///
    /// Handler errors from every instance are enriched with node id,
    /// class, and handler key, then forwarded here. Without a sink they
    /// are logged instead.
    #[must_use]
    pub fn with_sink(self, sink: Arc<dyn ErrorSink>) -> Self {
        *self.sink.lock() = Some(sink);
        self
    }

    // ------------------------------------------------------------------
    // Class registry
    // ------------------------------------------------------------------

    /// Registers a built class under its name.
    ///
    /// Validates the handler contract first: every name the class (or an
    /// ancestor) requires must resolve to an own or default handler.
    /// Registering the same name again replaces the previous class;
    /// instances already built keep the tables they were built with.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnresolvedContract`] listing the missing
    /// handlers as `pin:name`.
    pub fn register_class(&self, class: Arc<NodeClass>) -> Result<(), RouterError> {
        let missing = class.unresolved();
        if !missing.is_empty() {
            return Err(RouterError::UnresolvedContract {
                class: class.name().into(),
                missing: missing
                    .into_iter()
                    .map(|(pin, name)| format!("{pin}:{name}"))
                    .collect(),
            });
        }
        info!(
            class = class.name(),
            chain = ?class.inheritance_chain(),
            "class registered"
        );
        if self
            .classes
            .lock()
            .insert(class.name().to_string(), Arc::clone(&class))
            .is_some()
        {
            debug!(class = class.name(), "previous class definition replaced");
        }
        Ok(())
    }

    /// Looks up a registered class by name.
    #[must_use]
    pub fn class(&self, name: &str) -> Option<Arc<NodeClass>> {
        self.classes.lock().get(name).cloned()
    }

    /// Number of registered classes.
    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes.lock().len()
    }

    // ------------------------------------------------------------------
    // Instance registry
    // ------------------------------------------------------------------

    /// Builds an instance of a registered class and registers it.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownClass`] if no class is registered
    /// under `class_name`, [`RouterError::DuplicateNode`] if the id is
    /// taken, or a wrapped [`NodeError`](patchbay_node::NodeError) if
    /// the config has no id.
    pub fn create_instance(
        &self,
        class_name: &str,
        config: NodeConfig,
    ) -> Result<NodeId, RouterError> {
        let node = self.insert_instance(class_name, config)?;
        info!(node = %node.id(), class = class_name, "instance created");
        Ok(node.id().clone())
    }

    fn insert_instance(
        &self,
        class_name: &str,
        config: NodeConfig,
    ) -> Result<Arc<Node>, RouterError> {
        let class = self
            .classes
            .lock()
            .get(class_name)
            .cloned()
            .ok_or_else(|| RouterError::UnknownClass(class_name.into()))?;
        let node = Arc::new(Node::try_new((class, config))?);
        let mut nodes = self.nodes.lock();
        if nodes.iter().any(|held| held.id() == node.id()) {
            return Err(RouterError::DuplicateNode(node.id().to_string()));
        }
        nodes.push(Arc::clone(&node));
        Ok(node)
    }

    /// Looks up a live instance by id.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<Arc<Node>> {
        self.nodes.lock().iter().find(|held| held.id() == id).cloned()
    }

    /// Number of live instances.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.lock().len()
    }

    fn instances_of(&self, class: &str) -> Vec<Arc<Node>> {
        self.nodes
            .lock()
            .iter()
            .filter(|held| held.class().name() == class)
            .cloned()
            .collect()
    }

    fn instances(&self) -> Vec<Arc<Node>> {
        self.nodes.lock().clone()
    }

    // ------------------------------------------------------------------
    // Modes
    // ------------------------------------------------------------------

    /// Defines (or redefines) a mode.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::MissingModeName`] if the name is empty.
    pub fn define_mode(
        &self,
        name: impl Into<String>,
        config: ModeConfig,
    ) -> Result<(), RouterError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RouterError::MissingModeName);
        }
        debug!(mode = %name, wired_sources = config.wiring.len(), "mode defined");
        self.modes.lock().insert(name, config);
        Ok(())
    }

    /// Defines every mode in a book, typically one loaded from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::MissingModeName`] if the book keys a mode
    /// under an empty name; modes defined before the bad entry stay
    /// defined.
    pub fn define_modes(&self, book: ModeBook) -> Result<(), RouterError> {
        for (name, config) in book.modes {
            self.define_mode(name, config)?;
        }
        Ok(())
    }

    /// Number of defined modes.
    #[must_use]
    pub fn mode_count(&self) -> usize {
        self.modes.lock().len()
    }

    /// Name of the current mode, if one has been switched to.
    #[must_use]
    pub fn current_mode(&self) -> Option<String> {
        self.current_mode.lock().clone()
    }

    /// Makes a defined mode current.
    ///
    /// The mode's attribute overrides are applied to every live instance
    /// of each listed class first, then the mode becomes current, then
    /// every live instance is offered `onModeChange` on its lifecycle
    /// pin with `{ "old": previous-or-null, "new": name }`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownMode`] if the mode was never
    /// defined; the current mode is left unchanged.
    pub fn switch_mode(&self, name: &str) -> Result<(), RouterError> {
        let config = self
            .modes
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| RouterError::UnknownMode(name.into()))?;
        for (class, overrides) in &config.attributes {
            for node in self.instances_of(class) {
                for (attr, value) in overrides {
                    node.set_attribute(attr.clone(), value.clone());
                }
            }
        }
        let old = std::mem::replace(&mut *self.current_mode.lock(), Some(name.to_string()));
        info!(from = old.as_deref().unwrap_or("<none>"), to = name, "mode switched");
        let payload = json!({ "old": old, "new": name });
        for node in self.instances() {
            node.deliver(
                Some(self),
                Some(name),
                Pin::Lifecycle,
                ON_MODE_CHANGE,
                &payload,
                None,
            );
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Runs `onInit` on every live instance in registration order and
    /// marks the router initialized.
    pub fn init(&self) {
        let nodes = self.instances();
        info!(instances = nodes.len(), "router initializing");
        self.initialized.store(true, Ordering::SeqCst);
        let mode = self.current_mode();
        for node in &nodes {
            node.deliver(
                Some(self),
                mode.as_deref(),
                Pin::Lifecycle,
                ON_INIT,
                &Value::Null,
                None,
            );
        }
    }

    /// Runs `onStart` on every live instance in registration order and
    /// marks the router started.
    ///
    /// The started flag is raised before the handlers run, so an
    /// `onStart` handler may already emit.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::NotInitialized`] if [`Router::init`] has
    /// not completed.
    pub fn start(&self) -> Result<(), RouterError> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(RouterError::NotInitialized);
        }
        let nodes = self.instances();
        info!(instances = nodes.len(), "router starting");
        self.started.store(true, Ordering::SeqCst);
        let mode = self.current_mode();
        for node in &nodes {
            node.deliver(
                Some(self),
                mode.as_deref(),
                Pin::Lifecycle,
                ON_START,
                &Value::Null,
                None,
            );
        }
        Ok(())
    }

    /// Runs `onStop` on every live instance in registration order, then
    /// clears the started flag.
    ///
    /// The flag drops after the handlers run, so `onStop` handlers get a
    /// last chance to emit; anything sent after `stop` returns
    /// soft-fails.
    pub fn stop(&self) {
        let nodes = self.instances();
        info!(instances = nodes.len(), "router stopping");
        let mode = self.current_mode();
        for node in &nodes {
            node.deliver(
                Some(self),
                mode.as_deref(),
                Pin::Lifecycle,
                ON_STOP,
                &Value::Null,
                None,
            );
        }
        self.started.store(false, Ordering::SeqCst);
    }

    /// Returns `true` once [`Router::init`] has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Returns `true` while the router is started.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Creates an instance mid-flight and runs its individual lifecycle:
    /// `onSpawned`, `onInit`, `onStart`.
    ///
    /// The spawn sequence runs regardless of the router's own flags, so
    /// a patch can be assembled piecewise before `start`.
    ///
    /// # Errors
    ///
    /// Same as [`Router::create_instance`].
    pub fn spawn(&self, class_name: &str, config: NodeConfig) -> Result<NodeId, RouterError> {
        let node = self.insert_instance(class_name, config)?;
        let mode = self.current_mode();
        for op in [ON_SPAWNED, ON_INIT, ON_START] {
            node.deliver(
                Some(self),
                mode.as_deref(),
                Pin::Lifecycle,
                op,
                &Value::Null,
                None,
            );
        }
        info!(node = %node.id(), class = class_name, "instance spawned");
        Ok(node.id().clone())
    }

    /// Winds an instance down (`onStop`, then `onDespawning`) and
    /// removes it from the registry.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownNode`] if no instance is registered
    /// under the id.
    pub fn despawn(&self, id: &NodeId) -> Result<(), RouterError> {
        let node = self
            .node(id)
            .ok_or_else(|| RouterError::UnknownNode(id.to_string()))?;
        let mode = self.current_mode();
        for op in [ON_STOP, ON_DESPAWNING] {
            node.deliver(
                Some(self),
                mode.as_deref(),
                Pin::Lifecycle,
                op,
                &Value::Null,
                None,
            );
        }
        self.nodes.lock().retain(|held| held.id() != id);
        info!(node = %id, "instance despawned");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------

    /// Sends a signal to one instance's input pin.
    ///
    /// Requires the router to be started and the target to exist; both
    /// failures are soft (logged, reported in the outcome). A locked
    /// target defers the message into its queue instead of running the
    /// handler.
    pub fn send_to(&self, id: &NodeId, signal: &str, payload: Value) -> Delivery {
        if !self.is_started() {
            warn!(node = %id, signal, "message before start, ignoring");
            return Delivery::NotStarted;
        }
        let Some(node) = self.node(id) else {
            warn!(node = %id, signal, "message to unknown node, ignoring");
            return Delivery::UnknownNode;
        };
        let outcome = self.dispatch(&node, signal, &payload, None);
        debug!(node = %id, signal, outcome = ?outcome, "directed message dispatched");
        outcome
    }

    /// Sends a signal to every live instance's lifecycle pin,
    /// unconditionally: no started check, no wiring, no mode, no wait
    /// lock. Returns how many instances handled it.
    pub fn broadcast(&self, signal: &str, payload: Value) -> usize {
        let nodes = self.instances();
        let mut delivered = 0;
        for node in &nodes {
            if node.deliver(Some(self), None, Pin::Lifecycle, signal, &payload, None) {
                delivered += 1;
            }
        }
        debug!(signal, delivered, total = nodes.len(), "lifecycle broadcast");
        delivered
    }

    /// Runs the admission check and delivers if it passes.
    fn dispatch(
        &self,
        node: &Arc<Node>,
        signal: &str,
        payload: &Value,
        trace: Option<&mut Trace>,
    ) -> Delivery {
        let origin = trace.as_deref().map(Trace::id);
        match node.admit(signal, payload, origin) {
            Admission::Queued => Delivery::Queued,
            Admission::Dropped => Delivery::QueueFull,
            Admission::Pass => {
                let mode = self.current_mode();
                if node.deliver(Some(self), mode.as_deref(), Pin::In, signal, payload, trace) {
                    Delivery::Delivered
                } else {
                    Delivery::NoHandler
                }
            }
        }
    }

    /// Allocates the next message id, strictly increasing from 1.
    pub fn next_message_id(&self) -> MessageId {
        MessageId::from_seq(self.message_seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    // ------------------------------------------------------------------
    // Waiting
    // ------------------------------------------------------------------

    /// Parks until `signal` reaches the instance, or the timeout lapses.
    ///
    /// While parked the instance is locked: inbound messages other than
    /// the awaited signal defer into its queue in arrival order. The
    /// first arrival of the awaited signal (exact or folded name)
    /// completes the wait with its payload; a timeout completes it with
    /// `None`. Either way the shadowed handler is restored, the lock is
    /// released, and the deferred queue is replayed in arrival order
    /// through the normal dispatch path before this call returns.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::UnknownNode`] if no instance is registered
    /// under the id.
    pub async fn wait_for_signal(
        &self,
        id: &NodeId,
        signal: &str,
        timeout: Duration,
    ) -> Result<Option<Value>, RouterError> {
        let node = self
            .node(id)
            .ok_or_else(|| RouterError::UnknownNode(id.to_string()))?;
        let (sender, receiver) = oneshot::channel();
        node.begin_wait(signal, sender);
        debug!(
            node = %id,
            signal,
            timeout_ms = timeout.as_millis() as u64,
            "waiting for signal"
        );
        let outcome = tokio::time::timeout(timeout, receiver).await;
        node.end_wait();
        node.unlock();
        for deferred in node.drain_deferred() {
            debug!(
                node = %id,
                signal = %deferred.signal,
                origin = ?deferred.origin,
                "replaying deferred message"
            );
            self.dispatch(&node, &deferred.signal, &deferred.payload, None);
        }
        match outcome {
            Ok(Ok(payload)) => {
                debug!(node = %id, signal, "awaited signal arrived");
                Ok(Some(payload))
            }
            // The armed sender only drops on teardown; treat it like a
            // timeout.
            Ok(Err(_)) => Ok(None),
            Err(_) => {
                debug!(node = %id, signal, "wait timed out");
                Ok(None)
            }
        }
    }

    // ------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------

    /// Clears every registry, the current mode, both flags, and the
    /// message id counter. Defined for test isolation and full teardown.
    pub fn reset(&self) {
        self.classes.lock().clear();
        self.nodes.lock().clear();
        self.modes.lock().clear();
        *self.current_mode.lock() = None;
        self.initialized.store(false, Ordering::SeqCst);
        self.started.store(false, Ordering::SeqCst);
        self.message_seq.store(0, Ordering::SeqCst);
        info!("router reset");
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for Router {
    fn begin_trace(&self) -> Trace {
        Trace::new(self.next_message_id())
    }

    /// Fans an emission out along the current mode's wiring.
    ///
    /// Each wired consumer class is walked in wiring order, each live
    /// instance of it in registration order. Instances already visited
    /// under this trace are skipped; everything else is marked before
    /// delivery, so a deferred delivery still counts as visited.
    fn fan_out(&self, source: &Node, signal: &str, payload: &Value, trace: &mut Trace) -> usize {
        if !self.is_started() {
            warn!(node = %source.id(), signal, "emission before start, dropping");
            return 0;
        }
        let Some(mode) = self.current_mode() else {
            debug!(node = %source.id(), signal, "no mode selected, emission unrouted");
            return 0;
        };
        let consumers: Vec<String> = {
            let modes = self.modes.lock();
            modes
                .get(&mode)
                .map(|config| config.consumers(source.class().name()).to_vec())
                .unwrap_or_default()
        };
        if consumers.is_empty() {
            debug!(
                node = %source.id(),
                mode = %mode,
                signal,
                "no consumers wired, emission unrouted"
            );
            return 0;
        }
        let mut delivered = 0;
        for class in &consumers {
            for target in self.instances_of(class) {
                if trace.seen(target.id()) {
                    debug!(
                        message = %trace.id(),
                        node = %target.id(),
                        signal,
                        "already visited on this message, skipping"
                    );
                    continue;
                }
                trace.mark(target.id());
                if self
                    .dispatch(&target, signal, payload, Some(&mut *trace))
                    .is_delivered()
                {
                    delivered += 1;
                }
            }
        }
        debug!(
            node = %source.id(),
            mode = %mode,
            signal,
            message = %trace.id(),
            delivered,
            "emission fanned out"
        );
        delivered
    }

    fn sink_report(&self, report: ErrorReport) -> bool {
        let Some(sink) = self.sink.lock().clone() else {
            return false;
        };
        debug!(
            node = %report.node,
            handler = %report.handler,
            code = %report.code,
            "handler report sunk"
        );
        sink.accept(report);
        true
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("classes", &self.class_count())
            .field("nodes", &self.node_count())
            .field("modes", &self.mode_count())
            .field("current_mode", &self.current_mode())
            .field("initialized", &self.is_initialized())
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchbay_node::testing::{failing, recording, signal_log};
    use patchbay_node::{handler, ClassDef, CollectingSink};
    use patchbay_types::ErrorCode;
    use serde_json::json;

    fn relay_class() -> Arc<NodeClass> {
        NodeClass::define(ClassDef::named("Relay").on_input("onFire", handler(|_, _| Ok(()))))
            .expect("class")
    }

    fn running_router_with(class: Arc<NodeClass>, id: &str) -> (Router, NodeId) {
        let router = Router::new();
        router.register_class(class).expect("register");
        let node = router
            .create_instance("Relay", NodeConfig::with_id(id))
            .expect("instance");
        router.init();
        router.start().expect("start");
        (router, node)
    }

    #[test]
    fn new_router_is_empty() {
        let router = Router::new();
        assert_eq!(router.class_count(), 0);
        assert_eq!(router.node_count(), 0);
        assert_eq!(router.mode_count(), 0);
        assert_eq!(router.current_mode(), None);
        assert!(!router.is_initialized());
        assert!(!router.is_started());
    }

    #[test]
    fn register_class_replaces_same_name() {
        let router = Router::new();
        router.register_class(relay_class()).expect("first");
        router.register_class(relay_class()).expect("second");
        assert_eq!(router.class_count(), 1);
        assert!(router.class("Relay").is_some());
    }

    #[test]
    fn register_class_rejects_unresolved_contract() {
        let class = NodeClass::define(ClassDef::named("Strict").require(Pin::In, "onFrame"))
            .expect("class");
        let err = Router::new().register_class(class).expect_err("contract");

        assert_eq!(err.code(), "ROUTER_UNRESOLVED_CONTRACT");
        assert!(!err.is_recoverable());
        match err {
            RouterError::UnresolvedContract { class, missing } => {
                assert_eq!(class, "Strict");
                assert_eq!(missing, vec!["in:onFrame".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn create_instance_requires_registered_class() {
        let err = Router::new()
            .create_instance("Ghost", NodeConfig::with_id("g-1"))
            .expect_err("unknown class");
        assert_eq!(err.code(), "ROUTER_UNKNOWN_CLASS");
    }

    #[test]
    fn create_instance_rejects_duplicate_id() {
        let router = Router::new();
        router.register_class(relay_class()).expect("register");
        router
            .create_instance("Relay", NodeConfig::with_id("r-1"))
            .expect("first");
        let err = router
            .create_instance("Relay", NodeConfig::with_id("r-1"))
            .expect_err("duplicate");

        assert_eq!(err.code(), "ROUTER_DUPLICATE_NODE");
        assert_eq!(router.node_count(), 1);
    }

    #[test]
    fn create_instance_requires_id() {
        let router = Router::new();
        router.register_class(relay_class()).expect("register");
        let err = router
            .create_instance("Relay", NodeConfig::with_id(""))
            .expect_err("missing id");

        assert_eq!(err.code(), "ROUTER_NODE_CONSTRUCTION");
        assert_eq!(router.node_count(), 0);
    }

    #[test]
    fn define_mode_rejects_empty_name() {
        let err = Router::new()
            .define_mode("", ModeConfig::new())
            .expect_err("empty name");
        assert_eq!(err.code(), "ROUTER_MISSING_MODE_NAME");
    }

    #[test]
    fn define_modes_loads_a_book() {
        let book = ModeBook::new()
            .with_mode("live", ModeConfig::new())
            .with_mode("muted", ModeConfig::new());
        let router = Router::new();
        router.define_modes(book).expect("book");
        assert_eq!(router.mode_count(), 2);
    }

    #[test]
    fn switch_mode_requires_definition() {
        let err = Router::new().switch_mode("ghost").expect_err("unknown mode");
        assert_eq!(err.code(), "ROUTER_UNKNOWN_MODE");
    }

    #[test]
    fn start_requires_init() {
        let router = Router::new();
        let err = router.start().expect_err("not initialized");
        assert_eq!(err.code(), "ROUTER_NOT_INITIALIZED");
        assert!(err.is_recoverable());

        router.init();
        router.start().expect("start after init");
        assert!(router.is_started());
    }

    #[test]
    fn stop_clears_started_only() {
        let router = Router::new();
        router.init();
        router.start().expect("start");
        router.stop();

        assert!(!router.is_started());
        assert!(router.is_initialized());
    }

    #[test]
    fn send_before_start_soft_fails() {
        let router = Router::new();
        router.register_class(relay_class()).expect("register");
        let id = router
            .create_instance("Relay", NodeConfig::with_id("r-1"))
            .expect("instance");

        assert_eq!(router.send_to(&id, "fire", json!({})), Delivery::NotStarted);
    }

    #[test]
    fn send_to_unknown_node_soft_fails() {
        let (router, _) = running_router_with(relay_class(), "r-1");
        let ghost = NodeId::new("ghost");
        assert_eq!(router.send_to(&ghost, "fire", json!({})), Delivery::UnknownNode);
    }

    #[test]
    fn send_without_handler_is_ignored() {
        let (router, id) = running_router_with(relay_class(), "r-1");
        assert_eq!(router.send_to(&id, "vanish", json!({})), Delivery::NoHandler);
        assert_eq!(router.send_to(&id, "fire", json!({})), Delivery::Delivered);
    }

    #[test]
    fn despawn_unknown_node_fails() {
        let err = Router::new()
            .despawn(&NodeId::new("ghost"))
            .expect_err("unknown node");
        assert_eq!(err.code(), "ROUTER_UNKNOWN_NODE");
    }

    #[test]
    fn message_ids_increase_from_one() {
        let router = Router::new();
        assert_eq!(router.next_message_id(), MessageId::from_seq(1));
        assert_eq!(router.next_message_id(), MessageId::from_seq(2));
        assert_eq!(router.next_message_id(), MessageId::from_seq(3));
    }

    #[test]
    fn broadcast_hits_lifecycle_pins_only() {
        let log = signal_log();
        let class = NodeClass::define(
            ClassDef::named("Relay")
                .on_lifecycle("onPing", recording(&log))
                .on_input("onFire", recording(&log)),
        )
        .expect("class");

        let router = Router::new();
        router.register_class(class).expect("register");
        router
            .create_instance("Relay", NodeConfig::with_id("r-1"))
            .expect("r-1");
        router
            .create_instance("Relay", NodeConfig::with_id("r-2"))
            .expect("r-2");

        // Works before start: broadcast is unconditional.
        assert_eq!(router.broadcast("ping", json!({"at": 1})), 2);
        assert_eq!(router.broadcast("fire", json!({})), 0);
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn sink_receives_enriched_reports() {
        let sink = Arc::new(CollectingSink::new());
        let class = NodeClass::define(
            ClassDef::named("Flaky").on_input("onFire", failing("bad patch cord")),
        )
        .expect("class");

        let router = Router::new().with_sink(Arc::clone(&sink) as Arc<dyn ErrorSink>);
        router.register_class(class).expect("register");
        let id = router
            .create_instance("Flaky", NodeConfig::with_id("f-1"))
            .expect("instance");
        router.init();
        router.start().expect("start");

        assert_eq!(router.send_to(&id, "fire", json!({})), Delivery::Delivered);

        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].node.as_str(), "f-1");
        assert_eq!(reports[0].class, "Flaky");
        assert_eq!(reports[0].handler, "onFire");
        assert!(reports[0].reason.contains("bad patch cord"));
    }

    #[test]
    fn reset_clears_everything() {
        let (router, id) = running_router_with(relay_class(), "r-1");
        router
            .define_mode("live", ModeConfig::new())
            .expect("mode");
        router.switch_mode("live").expect("switch");
        router.next_message_id();

        router.reset();

        assert_eq!(router.class_count(), 0);
        assert_eq!(router.node_count(), 0);
        assert_eq!(router.mode_count(), 0);
        assert_eq!(router.current_mode(), None);
        assert!(!router.is_initialized());
        assert!(!router.is_started());
        assert_eq!(router.next_message_id(), MessageId::from_seq(1));
        assert_eq!(router.send_to(&id, "fire", json!({})), Delivery::NotStarted);
    }
}
