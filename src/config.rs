//! Global collector configuration.
//!
//! Thresholds and the `auto-collect` behavior can be tuned once, before the collector performs
//! its first allocation, via [`configure`]. After that point the configuration is frozen: the
//! adaptive estimators already derived their starting state from it.

use std::sync::OnceLock;
use thiserror::Error;

use crate::threshold::{OLD_MIN_VALUE, YOUNG_MIN_VALUE};

/// Tunable starting parameters for the collector's two generations.
#[derive(Clone, Copy, Debug)]
pub struct CollectorConfig {
    /// Floor of the young generation's adaptive threshold.
    pub young_min_threshold: usize,
    /// Floor of the old generation's adaptive threshold.
    pub old_min_threshold: usize,
    /// Whether allocating through [`Gc::new`][`crate::Gc::new`] may trigger a collection. When
    /// `false`, collections only ever happen via an explicit call to [`crate::collect`] or
    /// [`crate::collect_old`], regardless of the `auto-collect` crate feature.
    pub auto_collect: bool,
}

impl Default for CollectorConfig {
    fn default() -> CollectorConfig {
        CollectorConfig {
            young_min_threshold: YOUNG_MIN_VALUE as usize,
            old_min_threshold: OLD_MIN_VALUE as usize,
            auto_collect: cfg!(feature = "auto-collect"),
        }
    }
}

/// Error returned by [`configure`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The collector has already been configured, either explicitly or implicitly by having
    /// already performed its first allocation.
    #[error("collector is already configured; `configure` must run before the first Gc::new")]
    AlreadyInitialized,
    /// `old_min_threshold` was set lower than `young_min_threshold`, which would make the old
    /// generation collect more eagerly than the young one despite holding longer-lived objects.
    #[error("old_min_threshold ({old}) must be >= young_min_threshold ({young})")]
    OldThresholdBelowYoung { young: usize, old: usize },
}

static CONFIG: OnceLock<CollectorConfig> = OnceLock::new();

/// Installs `config` as the collector's configuration.
///
/// Must be called before the first [`Gc::new`][`crate::Gc::new`] in the process; returns
/// [`ConfigError::AlreadyInitialized`] otherwise.
pub fn configure(config: CollectorConfig) -> Result<(), ConfigError> {
    if config.old_min_threshold < config.young_min_threshold {
        return Err(ConfigError::OldThresholdBelowYoung {
            young: config.young_min_threshold,
            old: config.old_min_threshold,
        });
    }
    CONFIG.set(config).map_err(|_| ConfigError::AlreadyInitialized)
}

pub(crate) fn current() -> CollectorConfig {
    *CONFIG.get_or_init(CollectorConfig::default)
}
