//! Fallible construction trait.
//!
//! # When to Use Which Pattern
//!
//! | Pattern | Use When |
//! |---------|----------|
//! | `new()` | Construction always succeeds (infallible) |
//! | [`TryNew`] | Construction requires validation (fallible) |
//! | `TryFrom<T>` | Converting from another type (fallible) |
//! | Builder | Complex multi-field initialization |
//!
//! Following Rust naming conventions, `try_new()` makes the validation
//! explicit at the call site; types implementing [`TryNew`] should not
//! also offer a plain `new()` performing the same validation.

/// Trait for fallible construction with validation.
///
/// # Associated Types
///
/// - `Error`: the error type returned when validation fails
/// - `Args`: the arguments required for construction (a single value,
///   a tuple, or a config struct)
///
/// # Example
///
/// ```
/// use patchbay_types::TryNew;
///
/// #[derive(Debug)]
/// struct Port(u16);
///
/// #[derive(Debug, PartialEq)]
/// struct ZeroPortError;
///
/// impl TryNew for Port {
///     type Error = ZeroPortError;
///     type Args = u16;
///
///     fn try_new(value: u16) -> Result<Self, Self::Error> {
///         if value == 0 {
///             return Err(ZeroPortError);
///         }
///         Ok(Port(value))
///     }
/// }
///
/// assert!(Port::try_new(8080).is_ok());
/// assert_eq!(Port::try_new(0).unwrap_err(), ZeroPortError);
/// ```
pub trait TryNew {
    /// The error type returned when construction fails.
    type Error;

    /// Arguments required for construction.
    type Args;

    /// Attempts to create a new instance.
    ///
    /// # Errors
    ///
    /// Returns `Self::Error` if validation fails; the error should say
    /// which invariant was violated.
    fn try_new(args: Self::Args) -> Result<Self, Self::Error>
    where
        Self: Sized;
}
