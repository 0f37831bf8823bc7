//! Stable error codes for machine-readable error handling.
//!
//! Every error enum in the Patchbay crates implements [`ErrorCode`] so that
//! embedding applications (and error sinks) can branch on a stable string
//! instead of matching display text.
//!
//! # Code Conventions
//!
//! | Rule | Example |
//! |------|---------|
//! | UPPER_SNAKE_CASE | `ROUTER_UNKNOWN_MODE` |
//! | Crate-level prefix | `NODE_`, `HANDLER_`, `ROUTER_` |
//! | One code per variant | no shared codes between variants |
//!
//! The [`assert_error_code`] / [`assert_error_codes`] helpers enforce these
//! conventions in each crate's tests.

/// Trait for errors that expose a stable, machine-readable code.
///
/// # Example
///
/// ```
/// use patchbay_types::ErrorCode;
///
/// #[derive(Debug)]
/// enum WireError {
///     Detached,
/// }
///
/// impl ErrorCode for WireError {
///     fn code(&self) -> &'static str {
///         match self {
///             Self::Detached => "WIRE_DETACHED",
///         }
///     }
///
///     fn is_recoverable(&self) -> bool {
///         false
///     }
/// }
///
/// assert_eq!(WireError::Detached.code(), "WIRE_DETACHED");
/// ```
pub trait ErrorCode {
    /// Returns the stable error code for this error.
    ///
    /// Codes are UPPER_SNAKE_CASE with a crate-level prefix and never
    /// change once published.
    fn code(&self) -> &'static str;

    /// Returns `true` if the operation may succeed when retried.
    ///
    /// Configuration errors are programmer errors and always return
    /// `false`; transient runtime conditions may return `true`.
    fn is_recoverable(&self) -> bool;
}

/// Asserts that a single error's code follows the conventions.
///
/// Checks that the code is non-empty, UPPER_SNAKE_CASE, and carries the
/// expected prefix. Intended for use inside `#[cfg(test)]` modules.
///
/// # Panics
///
/// Panics with a descriptive message when any convention is violated.
pub fn assert_error_code<E: ErrorCode + std::fmt::Debug>(error: &E, expected_prefix: &str) {
    let code = error.code();
    assert!(!code.is_empty(), "error {error:?} has an empty code");
    assert!(
        is_upper_snake_case(code),
        "error {error:?} code {code:?} is not UPPER_SNAKE_CASE"
    );
    assert!(
        code.starts_with(expected_prefix),
        "error {error:?} code {code:?} does not start with {expected_prefix:?}"
    );
}

/// Asserts conventions over a slice of errors (typically every variant).
///
/// Also checks that no two errors share a code.
///
/// # Panics
///
/// Panics when any error violates the conventions or when two errors
/// share the same code.
pub fn assert_error_codes<E: ErrorCode + std::fmt::Debug>(errors: &[E], expected_prefix: &str) {
    let mut seen = std::collections::HashSet::new();
    for error in errors {
        assert_error_code(error, expected_prefix);
        assert!(
            seen.insert(error.code()),
            "error {error:?} reuses code {:?}",
            error.code()
        );
    }
}

fn is_upper_snake_case(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        && !s.starts_with('_')
        && !s.ends_with('_')
}
