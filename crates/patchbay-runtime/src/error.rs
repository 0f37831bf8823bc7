//! Router error types.
//!
//! # Error Code Convention
//!
//! Every variant maps to one stable `ROUTER_` code:
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`UnknownClass`](RouterError::UnknownClass) | `ROUTER_UNKNOWN_CLASS` | No |
//! | [`DuplicateNode`](RouterError::DuplicateNode) | `ROUTER_DUPLICATE_NODE` | No |
//! | [`UnknownNode`](RouterError::UnknownNode) | `ROUTER_UNKNOWN_NODE` | No |
//! | [`UnknownMode`](RouterError::UnknownMode) | `ROUTER_UNKNOWN_MODE` | No |
//! | [`MissingModeName`](RouterError::MissingModeName) | `ROUTER_MISSING_MODE_NAME` | No |
//! | [`UnresolvedContract`](RouterError::UnresolvedContract) | `ROUTER_UNRESOLVED_CONTRACT` | No |
//! | [`NotInitialized`](RouterError::NotInitialized) | `ROUTER_NOT_INITIALIZED` | Yes |
//! | [`Node`](RouterError::Node) | `ROUTER_NODE_CONSTRUCTION` | No |

use patchbay_node::NodeError;
use patchbay_types::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reported by the router.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum RouterError {
    /// An instance was requested for a class the router does not know.
    ///
    /// **Not recoverable** - register the class first.
    #[error("unknown node class: {0}")]
    UnknownClass(String),

    /// An instance id is already registered.
    ///
    /// **Not recoverable** - pick a different id or despawn the
    /// existing instance.
    #[error("node id already registered: {0}")]
    DuplicateNode(String),

    /// An operation named an instance the router does not hold.
    ///
    /// **Not recoverable** - check the id.
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// A mode switch named a mode that was never defined.
    ///
    /// **Not recoverable** - define the mode first.
    #[error("unknown mode: {0}")]
    UnknownMode(String),

    /// A mode was defined with an empty name.
    ///
    /// **Not recoverable** - fix the mode definition.
    #[error("mode name must not be empty")]
    MissingModeName,

    /// A class declares required handlers that neither it nor its
    /// ancestors provide.
    ///
    /// **Not recoverable** - fix the class definition. Entries are
    /// formatted as `pin:name`.
    #[error("class {class} has unresolved handler contract: {missing:?}")]
    UnresolvedContract {
        /// Class whose contract is incomplete.
        class: String,
        /// Missing handlers, formatted as `pin:name`.
        missing: Vec<String>,
    },

    /// `start` was called before `init`.
    ///
    /// **Recoverable** - call `init` and retry.
    #[error("router is not initialized")]
    NotInitialized,

    /// Instance construction failed inside the node layer.
    #[error("node construction failed: {0}")]
    Node(#[from] NodeError),
}

impl ErrorCode for RouterError {
    /// Returns a machine-readable error code.
    ///
    /// All router errors use the `ROUTER_` prefix.
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownClass(_) => "ROUTER_UNKNOWN_CLASS",
            Self::DuplicateNode(_) => "ROUTER_DUPLICATE_NODE",
            Self::UnknownNode(_) => "ROUTER_UNKNOWN_NODE",
            Self::UnknownMode(_) => "ROUTER_UNKNOWN_MODE",
            Self::MissingModeName => "ROUTER_MISSING_MODE_NAME",
            Self::UnresolvedContract { .. } => "ROUTER_UNRESOLVED_CONTRACT",
            Self::NotInitialized => "ROUTER_NOT_INITIALIZED",
            Self::Node(_) => "ROUTER_NODE_CONSTRUCTION",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotInitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchbay_types::assert_error_codes;

    fn all_variants() -> Vec<RouterError> {
        vec![
            RouterError::UnknownClass("Relay".into()),
            RouterError::DuplicateNode("relay-1".into()),
            RouterError::UnknownNode("relay-9".into()),
            RouterError::UnknownMode("live".into()),
            RouterError::MissingModeName,
            RouterError::UnresolvedContract {
                class: "Relay".into(),
                missing: vec!["in:onFrame".into()],
            },
            RouterError::NotInitialized,
            RouterError::Node(NodeError::MissingClassName),
        ]
    }

    #[test]
    fn all_codes_follow_convention() {
        assert_error_codes(&all_variants(), "ROUTER_");
    }

    #[test]
    fn only_not_initialized_is_recoverable() {
        for err in all_variants() {
            let expected = matches!(err, RouterError::NotInitialized);
            assert_eq!(err.is_recoverable(), expected, "variant {err:?}");
        }
    }

    #[test]
    fn unresolved_contract_names_missing_handlers() {
        let err = RouterError::UnresolvedContract {
            class: "Relay".into(),
            missing: vec!["in:onFrame".into(), "lifecycle:onInit".into()],
        };
        let text = err.to_string();
        assert!(text.contains("Relay"));
        assert!(text.contains("in:onFrame"));
        assert!(text.contains("lifecycle:onInit"));
    }

    #[test]
    fn node_error_converts() {
        let err: RouterError = NodeError::MissingClassName.into();
        assert_eq!(err.code(), "ROUTER_NODE_CONSTRUCTION");
        assert!(err.to_string().contains("node construction failed"));
    }

    #[test]
    fn errors_serialize() {
        let err = RouterError::UnknownMode("live".into());
        let json = serde_json::to_string(&err).expect("serialize");
        assert!(json.contains("UnknownMode"));
    }
}
