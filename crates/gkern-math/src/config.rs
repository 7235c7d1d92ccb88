//! Kernel configuration.
//!
//! Replaces process-wide mutable settings with a value that is built once
//! (in code or from TOML) and handed to constructors.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::{ConfigError, ConstructionError, Tolerance};

/// How per-object evaluation caches behave under concurrent callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultithreadingMode {
    /// A single cache slot per object. Contended accesses skip the cache.
    Off,
    /// One cache slot per calling thread.
    #[default]
    SafeItems,
    /// One cache slot per calling thread; reserved for fully parallel modes.
    Items,
}

impl MultithreadingMode {
    /// Whether each thread gets its own cache slot.
    pub fn per_thread(self) -> bool {
        !matches!(self, Self::Off)
    }
}

/// What to do when growing a caller-supplied buffer fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocPolicy {
    /// Return [`ConstructionError::Allocation`].
    #[default]
    Propagate,
    /// Abort the process.
    Abort,
}

/// Settings shared by every object built in one modeling session.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Geometric tolerances.
    pub tolerance: Tolerance,
    /// Cache behavior under concurrency.
    pub multithreading: MultithreadingMode,
    /// Buffer growth failure policy.
    pub alloc_policy: AllocPolicy,
}

impl KernelConfig {
    /// Parse a config from TOML; missing keys take their defaults.
    ///
    /// ```
    /// use gkern_math::{KernelConfig, MultithreadingMode};
    ///
    /// let cfg = KernelConfig::from_toml_str(
    ///     "multithreading = \"off\"\n[tolerance]\nlinear = 1e-5\n",
    /// )
    /// .unwrap();
    /// assert_eq!(cfg.multithreading, MultithreadingMode::Off);
    /// assert_eq!(cfg.tolerance.linear, 1e-5);
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

/// Reserve room for `additional` more elements in a caller buffer.
pub fn reserve_for<T>(
    buf: &mut Vec<T>,
    additional: usize,
    policy: AllocPolicy,
) -> Result<(), ConstructionError> {
    match buf.try_reserve(additional) {
        Ok(()) => Ok(()),
        Err(err) => match policy {
            AllocPolicy::Propagate => {
                warn!(additional, %err, "buffer growth failed");
                Err(ConstructionError::Allocation {
                    requested: additional,
                })
            }
            AllocPolicy::Abort => {
                error!(additional, %err, "buffer growth failed, aborting");
                std::process::abort()
            }
        },
    }
}
