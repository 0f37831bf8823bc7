//! Runtime layer for the patchbay message bus.
//!
//! This crate provides the [`Router`]: the registries, mode switching,
//! wired fan-out, and wait primitive that turn standalone node
//! instances into a running patch.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        SDK Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  patchbay-types   : NodeId, MessageId, ErrorCode            │
//! │  patchbay-node    : classes, instances, pins                │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      Runtime Layer                           │
//! │  patchbay-runtime : Router, modes, wiring, waits ◄── HERE   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! | Concept | Type | Purpose |
//! |---------|------|---------|
//! | Router | [`Router`] | Registries, dispatch, lifecycle fan-out |
//! | Mode | [`ModeConfig`] | Wiring and attribute overrides |
//! | Mode book | [`ModeBook`] | Named modes, loadable from TOML |
//! | Outcome | [`Delivery`] | Soft-fail result of a directed message |
//! | Failure | [`RouterError`] | Hard registration/lifecycle errors |
//!
//! # Soft and Hard Failures
//!
//! Message-path problems never raise errors: a directed message to an
//! unknown node, a missing handler, or a not-yet-started router comes
//! back as a [`Delivery`] variant with a log line, and the patch keeps
//! running. Configuration problems are hard [`RouterError`]s: an
//! unresolved handler contract, a duplicate instance id, an undefined
//! mode.
//!
//! # Waiting
//!
//! [`Router::wait_for_signal`] parks an async caller until a chosen
//! signal reaches an instance. While parked the instance defers other
//! inbound messages into a bounded queue; on completion or timeout the
//! queue is replayed in arrival order. Handlers themselves stay
//! synchronous.
//!
//! # Example
//!
//! ```
//! use patchbay_node::{handler, ClassDef, NodeClass, NodeConfig, OutputSchema};
//! use patchbay_runtime::{ModeConfig, Router};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let router = Router::new();
//!
//! router.register_class(NodeClass::define(
//!     ClassDef::named("Pulse")
//!         .with_output(OutputSchema::new(["level"]))
//!         .on_input(
//!             "onTick",
//!             handler(|scope, payload| {
//!                 scope.emit("level", payload.clone());
//!                 Ok(())
//!             }),
//!         ),
//! )?)?;
//! router.register_class(NodeClass::define(ClassDef::named("Meter").on_input(
//!     "onLevel",
//!     handler(|scope, payload| {
//!         scope.set_attribute("last", payload.clone());
//!         Ok(())
//!     }),
//! ))?)?;
//!
//! let pulse = router.create_instance("Pulse", NodeConfig::with_id("pulse-1"))?;
//! let meter = router.create_instance("Meter", NodeConfig::with_id("meter-1"))?;
//!
//! router.define_mode(
//!     "live",
//!     ModeConfig::new()
//!         .with_node("Pulse")
//!         .with_node("Meter")
//!         .wire("Pulse", ["Meter"]),
//! )?;
//! router.switch_mode("live")?;
//! router.init();
//! router.start()?;
//!
//! router.send_to(&pulse, "tick", json!({ "db": -3 }));
//!
//! let meter = router.node(&meter).ok_or("meter gone")?;
//! assert_eq!(meter.attribute("last"), Some(json!({ "db": -3 })));
//! # Ok(())
//! # }
//! ```
//!
//! # Related Crates
//!
//! - [`patchbay_node`] - Class and instance layer, runnable standalone
//! - [`patchbay_types`] - Core identifier types and error conventions

mod error;
mod mode;
mod router;

// Re-export the runtime surface
pub use error::RouterError;
pub use mode::{ModeBook, ModeBookError, ModeConfig};
pub use router::{Delivery, Router, DEFAULT_WAIT_TIMEOUT_MS};

// Re-export the SDK types that appear in the Router API
pub use patchbay_node::{ErrorReport, ErrorSink, Node, NodeClass, NodeConfig};
pub use patchbay_types::{MessageId, NodeId};
