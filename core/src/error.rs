//! Error types for filter construction and the Bayesian update cycle.
//!
//! Every fallible operation in the crate returns [`Result`], so callers can match on the
//! specific failure (bad configuration, unsupported filter variant, collapsed weights) instead
//! of inspecting strings.

use thiserror::Error;

/// Errors that can occur while building or running a filter
#[derive(Error, Debug)]
pub enum FilterError {
    /// The configuration `type` tag names a filter this crate does not provide.
    #[error("{0} is not a supported type of non-parametric filter")]
    UnsupportedType(String),

    /// The configuration is well formed but its values are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Every particle likelihood collapsed, so the weights cannot be normalized.
    #[error("Degenerate particle weights: total weight {0} cannot be normalized")]
    DegenerateWeights(f64),

    /// A model or caller supplied a vector or matrix of the wrong size.
    #[error("Dimension mismatch in {context}: expected {expected}, got {got}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },

    /// A configuration document could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for filter operations
pub type Result<T> = std::result::Result<T, FilterError>;
