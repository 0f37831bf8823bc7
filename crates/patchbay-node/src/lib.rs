//! Node SDK for the patchbay message bus.
//!
//! This crate provides the class and instance layer: everything a node
//! needs to define behavior, hold state, and run handlers, with or
//! without a router attached.
//!
//! # Crate Architecture
//!
//! This crate is the middle of the **SDK layer**:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        SDK Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  patchbay-types   : NodeId, MessageId, ErrorCode            │
//! │  patchbay-node    : classes, instances, pins  ◄── HERE      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      Runtime Layer                           │
//! │  patchbay-runtime : Router, modes, wiring, waits            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! | Concept | Type | Purpose |
//! |---------|------|---------|
//! | Class | [`NodeClass`] | Built definition, ancestors merged in |
//! | Instance | [`Node`] | Id, attributes, runnable handler tables |
//! | Pin | [`Pin`] | Where a message enters (lifecycle or in) |
//! | Handler | [`Handler`] | Named closure in a [`HandlerTable`] |
//! | Mirror | [`AttributeMirror`] | External attribute backing store |
//! | Error channel | [`ErrorSink`] | Where enriched handler errors go |
//!
//! # Handlers Are Data
//!
//! Inheritance is a build-time merge, not a dispatch-time chain walk:
//! [`NodeClass::extend`] layers tables once, and every lookup afterward
//! is flat. The same layering expresses defaults, subclass overrides,
//! and mode-specific variants.
//!
//! # Standalone Instances
//!
//! A [`Node`] never requires a router. Dispatch takes the router seam
//! as an `Option<&dyn Bus>`; detached instances run handlers normally
//! and drop emissions with a debug log, which keeps class behavior
//! testable in isolation (see [`testing`]).
//!
//! # Example
//!
//! ```
//! use patchbay_node::{handler, ClassDef, Node, NodeClass, NodeConfig, Pin};
//! use patchbay_types::TryNew;
//! use serde_json::json;
//!
//! let relay = NodeClass::define(
//!     ClassDef::named("Relay").require(Pin::In, "onFire").on_input(
//!         "onFire",
//!         handler(|scope, payload| {
//!             scope.set_attribute("last", payload.clone());
//!             Ok(())
//!         }),
//!     ),
//! )?;
//! assert!(relay.unresolved().is_empty());
//!
//! let node = Node::try_new((relay, NodeConfig::with_id("relay-1")))?;
//! node.deliver(None, None, Pin::In, "fire", &json!({"volume": 3}), None);
//! assert_eq!(node.attribute("last"), Some(json!({"volume": 3})));
//! # Ok::<(), patchbay_node::NodeError>(())
//! ```
//!
//! # Related Crates
//!
//! - [`patchbay_types`] - Core identifier types and error conventions
//! - `patchbay-runtime` - Router, mode switching, wired fan-out

mod bus;
mod class;
mod error;
mod handler;
mod mirror;
mod node;
mod pin;
mod report;

pub mod testing;

// Re-export the router seam
pub use bus::{Bus, Trace};

// Re-export class types
pub use class::{ClassDef, NodeClass, OutputSchema};

// Re-export handler types
pub use handler::{handler, Handler, HandlerFn, HandlerTable, Scope};

// Re-export instance types
pub use node::{Admission, Node, NodeConfig, QueuedSignal, DEFERRED_QUEUE_MAX_SIZE};

// Re-export pins and the naming convention
pub use pin::{
    on_form, Pin, LIFECYCLE_OPS, ON_DESPAWNING, ON_INIT, ON_MODE_CHANGE, ON_SPAWNED, ON_START,
    ON_STOP,
};

// Re-export the attribute mirror seam
pub use mirror::{AttributeMirror, MemoryMirror};

// Re-export the error channel
pub use report::{CollectingSink, ErrorReport, ErrorSink, DEFAULT_SINK_CAPACITY};

// Re-export error types
pub use error::{HandlerError, NodeError};
