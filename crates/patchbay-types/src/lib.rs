//! Core types for the Patchbay message bus.
//!
//! This crate provides the foundational identifier and error-code types
//! shared by every Patchbay layer.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       SDK Layer                              │
//! │  (what node authors depend on)                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  patchbay-types : NodeId, MessageId, ErrorCode    ◄── HERE   │
//! │  patchbay-node  : Pin, NodeClass, Node, Scope               │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Runtime Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  patchbay-runtime : Router, modes, wiring, dispatch         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Identifier Design
//!
//! Unlike systems that mint UUIDs, Patchbay identifiers reflect their
//! origin:
//!
//! - [`NodeId`] is the instance id the embedding application chose; the
//!   Router enforces uniqueness among live instances.
//! - [`MessageId`] is a strictly increasing counter value allocated per
//!   top-level emission by the owning Router.
//!
//! # Example
//!
//! ```
//! use patchbay_types::{MessageId, NodeId};
//!
//! let hud = NodeId::new("hud");
//! assert_eq!(hud.as_str(), "hud");
//!
//! let msg = MessageId::from_seq(1);
//! assert_eq!(format!("{msg}"), "msg:1");
//! ```

mod construct;
mod error;
mod id;

pub use construct::TryNew;
pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use id::{MessageId, NodeId};
