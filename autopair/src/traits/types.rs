//! Utility types for trait definitions.

/// Error type raised by the engine.
///
/// Configuration and invariant errors are unrecoverable: they are raised at
/// the call site with a message naming the offending inputs, and never
/// caught inside the crate.
#[derive(thiserror::Error, Debug)]
pub enum AutoPairError {
    /// The requested configuration cannot run: empty search space after
    /// filtering, incompatible traversal for a container, Newton-3 demanded
    /// from a functor that refused it, or similar.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A container invariant was violated, e.g. adding an owned particle
    /// outside the box. The message carries the particle id and position.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A tuning strategy was driven into an undefined state, e.g. asked for
    /// the optimum without any measurements.
    #[error("tuning error: {0}")]
    Tuning(String),
}

/// Result type of the crate.
pub type Result<T> = std::result::Result<T, AutoPairError>;
