//! Node layer errors.
//!
//! Errors raised while defining classes, building instances, and running
//! handlers. All errors implement [`ErrorCode`] for unified handling.
//!
//! # Error Code Convention
//!
//! Definition and construction errors use the `NODE_` prefix; errors
//! returned from handler bodies use the `HANDLER_` prefix:
//!
//! | Error | Code | Recoverable |
//! |-------|------|-------------|
//! | [`MissingClassName`](NodeError::MissingClassName) | `NODE_MISSING_CLASS_NAME` | No |
//! | [`MissingNodeId`](NodeError::MissingNodeId) | `NODE_MISSING_NODE_ID` | No |
//! | [`NotSupported`](HandlerError::NotSupported) | `HANDLER_NOT_SUPPORTED` | No |
//! | [`ExecutionFailed`](HandlerError::ExecutionFailed) | `HANDLER_EXECUTION_FAILED` | Yes |
//! | [`InvalidPayload`](HandlerError::InvalidPayload) | `HANDLER_INVALID_PAYLOAD` | No |
//!
//! # Recoverability
//!
//! - **Recoverable**: Retry may succeed (transient failures)
//! - **Not Recoverable**: Retry won't help (definition or payload errors)
//!
//! # Example
//!
//! ```
//! use patchbay_node::HandlerError;
//! use patchbay_types::ErrorCode;
//!
//! let err = HandlerError::InvalidPayload("missing field: target".into());
//! assert_eq!(err.code(), "HANDLER_INVALID_PAYLOAD");
//! assert!(!err.is_recoverable());
//! ```

use patchbay_types::ErrorCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Class definition or instance construction error.
///
/// Raised before any handler runs. These are configuration mistakes and
/// never recoverable by retrying.
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum NodeError {
    /// A class definition carried an empty name.
    ///
    /// Class names key the registry and the mode wiring, so an empty
    /// name can never be routed to.
    ///
    /// **Not recoverable** - fix the definition.
    #[error("class definition is missing a name")]
    MissingClassName,

    /// An instance config carried an empty id.
    ///
    /// Instance ids key `send_to` and the live registry.
    ///
    /// **Not recoverable** - fix the config.
    #[error("instance of class '{class}' is missing an id")]
    MissingNodeId {
        /// Class the instance was built from.
        class: String,
    },
}

impl ErrorCode for NodeError {
    /// Returns a machine-readable error code.
    ///
    /// All node errors use the `NODE_` prefix.
    fn code(&self) -> &'static str {
        match self {
            Self::MissingClassName => "NODE_MISSING_CLASS_NAME",
            Self::MissingNodeId { .. } => "NODE_MISSING_NODE_ID",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Error returned from a handler body.
///
/// Handlers return this instead of panicking. The dispatch boundary
/// catches it, enriches it with instance context, and forwards it to
/// the error channel.
///
/// # Variants
///
/// | Variant | When | Recovery |
/// |---------|------|----------|
/// | `NotSupported` | Signal recognized but refused | Fix the sender |
/// | `ExecutionFailed` | Handler body failed mid-work | May retry |
/// | `InvalidPayload` | Payload shape was wrong | Fix the payload |
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
pub enum HandlerError {
    /// Signal not supported by this handler.
    ///
    /// **Not recoverable** - the signal will never work here.
    #[error("signal not supported: {0}")]
    NotSupported(String),

    /// Handler body failed during execution.
    ///
    /// Common causes: missing attribute, downstream refusal, bad state.
    ///
    /// **Recoverable** - retry may succeed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Payload did not match the shape the handler expects.
    ///
    /// **Not recoverable** - fix the payload.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl ErrorCode for HandlerError {
    /// Returns a machine-readable error code.
    ///
    /// All handler errors use the `HANDLER_` prefix.
    fn code(&self) -> &'static str {
        match self {
            Self::NotSupported(_) => "HANDLER_NOT_SUPPORTED",
            Self::ExecutionFailed(_) => "HANDLER_EXECUTION_FAILED",
            Self::InvalidPayload(_) => "HANDLER_INVALID_PAYLOAD",
        }
    }

    /// Returns whether the error is recoverable.
    ///
    /// # Returns
    ///
    /// - `true`: Retry may succeed
    /// - `false`: Retry will not help
    fn is_recoverable(&self) -> bool {
        match self {
            Self::ExecutionFailed(_) => true,
            Self::NotSupported(_) => false,
            Self::InvalidPayload(_) => false,
        }
    }
}
