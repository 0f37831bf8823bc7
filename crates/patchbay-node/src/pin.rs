//! Pins and the signal naming convention.
//!
//! Every node class exposes the same fixed set of pins. Handlers are
//! registered per pin, and dispatch picks the pin before it picks the
//! handler.
//!
//! # Built-in Pins
//!
//! | Pin | Purpose | Example Handlers |
//! |-----|---------|------------------|
//! | `Lifecycle` | Runtime-driven phases | `onInit`, `onStart`, `onStop` |
//! | `In` | Inbound signals from peers | `onFire`, `onAck` |
//!
//! Outbound signals are not a handler table. Classes declare them as an
//! [`OutputSchema`](crate::OutputSchema), which is advisory only.
//!
//! # Dispatch Flow
//!
//! ```text
//! send_to(node, "ack", payload)
//!     │
//!     ▼
//! Pin::In table for the current mode
//!     │ exact: "ack"?        ── miss
//!     │ folded: "onAck"?     ── hit
//!     ▼
//! handler("onAck") runs
//! ```
//!
//! The fold step is [`on_form`]: a bare signal name matches a handler
//! registered under its `on`-prefixed, capitalized form. Exact matches
//! always win over folded ones.

use serde::{Deserialize, Serialize};

/// Lifecycle handler invoked once by `Router::init`.
pub const ON_INIT: &str = "onInit";
/// Lifecycle handler invoked once by `Router::start`.
pub const ON_START: &str = "onStart";
/// Lifecycle handler invoked by `Router::stop`.
pub const ON_STOP: &str = "onStop";
/// Lifecycle handler invoked when an instance is spawned at runtime.
pub const ON_SPAWNED: &str = "onSpawned";
/// Lifecycle handler invoked just before an instance is removed.
pub const ON_DESPAWNING: &str = "onDespawning";
/// Lifecycle handler invoked on every instance after a mode switch.
pub const ON_MODE_CHANGE: &str = "onModeChange";

/// All lifecycle handler names the runtime itself invokes.
pub const LIFECYCLE_OPS: [&str; 6] = [
    ON_INIT,
    ON_START,
    ON_STOP,
    ON_SPAWNED,
    ON_DESPAWNING,
    ON_MODE_CHANGE,
];

/// A connection point on a node class.
///
/// Handler tables are keyed by pin. The runtime drives the `Lifecycle`
/// pin; peers and embedders drive the `In` pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pin {
    /// Runtime-driven phase handlers (init, start, stop, spawn, mode).
    ///
    /// Broadcast also targets this pin, unconditionally.
    Lifecycle,

    /// Inbound signal handlers.
    ///
    /// This is the pin that `send_to` and wired fan-out dispatch into,
    /// and the only pin affected by a wait lock.
    In,
}

impl Pin {
    /// Returns `true` if this is the lifecycle pin.
    #[must_use]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Lifecycle)
    }

    /// Returns `true` if this is the inbound signal pin.
    #[must_use]
    pub fn is_in(&self) -> bool {
        matches!(self, Self::In)
    }

    /// Returns the display name of this pin.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lifecycle => "lifecycle",
            Self::In => "in",
        }
    }
}

impl std::fmt::Display for Pin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Folds a bare signal name into its handler form.
///
/// `"ack"` becomes `"onAck"`. Dispatch tries the exact name first and
/// falls back to this form, so a handler table may register either
/// spelling.
///
/// # Example
///
/// ```
/// use patchbay_node::on_form;
///
/// assert_eq!(on_form("ack"), "onAck");
/// assert_eq!(on_form("modeChange"), "onModeChange");
/// ```
#[must_use]
pub fn on_form(signal: &str) -> String {
    let mut folded = String::with_capacity(signal.len() + 2);
    folded.push_str("on");
    let mut chars = signal.chars();
    if let Some(first) = chars.next() {
        folded.extend(first.to_uppercase());
        folded.push_str(chars.as_str());
    }
    folded
}
