//! Error types.

use thiserror::Error;

/// Rejected [`Config`](crate::Config) values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// `shrink_ratio` outside `(0, 1]`
    #[error("shrink ratio must be in (0, 1], got {0}")]
    ShrinkRatio(f64),
}
