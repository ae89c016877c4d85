//! Handle configuration.

use crate::error::ConfigError;

/// Configuration for [`SharedDoubleJump`](crate::SharedDoubleJump).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Options passed through to the wrapped engine.
    pub engine: doublejump::Config,
    /// Shrink automatically after a `remove` once tombstones pile up.
    ///
    /// Shrinking reshuffles some keys, so this trades mapping stability for
    /// bounded lookup cost.
    pub auto_shrink: bool,
    /// Tombstone share of the slot table that triggers an auto-shrink.
    pub shrink_ratio: f64,
    /// Tombstones required before the ratio is considered at all.
    pub shrink_min_tombstones: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: doublejump::Config::default(),
            auto_shrink: false,
            shrink_ratio: 0.5,
            shrink_min_tombstones: 64,
        }
    }
}

impl Config {
    /// Check field ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Negated so NaN is rejected too.
        if !(self.shrink_ratio > 0.0 && self.shrink_ratio <= 1.0) {
            return Err(ConfigError::ShrinkRatio(self.shrink_ratio));
        }
        Ok(())
    }

    /// Whether a table in this state is due for an auto-shrink.
    pub(crate) fn wants_shrink(&self, tombstones: usize, loose: usize) -> bool {
        self.auto_shrink
            && loose > 0
            && tombstones >= self.shrink_min_tombstones
            && tombstones as f64 / loose as f64 >= self.shrink_ratio
    }
}
