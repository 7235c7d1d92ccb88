//! Error types shared by the kernel crates.

use thiserror::Error;
use tracing::warn;

/// Reasons a curve, surface or domain cannot be constructed.
///
/// Constructors are all-or-nothing: when one of these is returned no
/// partially initialized object escapes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConstructionError {
    /// Fewer inputs than the object needs (control points, curves, ...).
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Inputs describe a degenerate shape (zero radius, zero axis, ...).
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// A parameter range or scalar lies outside its admissible range.
    #[error("invalid parameter range: {0}")]
    InvalidParameterRange(String),

    /// Growing a caller buffer failed under [`crate::AllocPolicy::Propagate`].
    #[error("allocation of {requested} elements failed")]
    Allocation {
        /// Number of additional elements requested.
        requested: usize,
    },
}

impl ConstructionError {
    /// Build an [`ConstructionError::InsufficientData`], logging the rejection.
    pub fn insufficient(what: impl Into<String>) -> Self {
        let what = what.into();
        warn!(%what, "construction rejected: insufficient data");
        Self::InsufficientData(what)
    }

    /// Build a [`ConstructionError::DegenerateGeometry`], logging the rejection.
    pub fn degenerate(what: impl Into<String>) -> Self {
        let what = what.into();
        warn!(%what, "construction rejected: degenerate geometry");
        Self::DegenerateGeometry(what)
    }

    /// Build a [`ConstructionError::InvalidParameterRange`], logging the rejection.
    pub fn range(what: impl Into<String>) -> Self {
        let what = what.into();
        warn!(%what, "construction rejected: invalid parameter range");
        Self::InvalidParameterRange(what)
    }
}

/// Errors from loading a [`crate::KernelConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document could not be parsed into a config.
    #[error("invalid kernel config: {0}")]
    Toml(#[from] toml::de::Error),
}
