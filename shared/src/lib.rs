//! # doublejump-shared
//!
//! A thread-safe handle around [`doublejump::DoubleJump`].
//!
//! The engine itself is a plain single-owner data structure. This crate puts
//! it behind a `parking_lot::RwLock` so one writer and many readers can share
//! it: `add`, `remove` and `shrink` take the write lock, everything else takes
//! the read lock. Multi-step sequences that must be atomic go through
//! [`SharedDoubleJump::write`].
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use doublejump_shared::SharedDoubleJump;
//!
//! let ring = Arc::new(SharedDoubleJump::new());
//! ring.add("cache-a");
//! ring.add("cache-b");
//!
//! let reader = Arc::clone(&ring);
//! let owner = std::thread::spawn(move || reader.get("user:1001"))
//!     .join()
//!     .unwrap();
//! assert_eq!(owner, ring.get("user:1001"));
//!
//! // Check-then-remove under one lock.
//! let removed = ring.write(|dj| dj.len() > 1 && dj.remove("cache-a"));
//! assert!(removed);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;

pub use config::Config;
pub use doublejump::DoubleJump;
pub use error::ConfigError;

use parking_lot::RwLock;
use rand::Rng;
use tracing::debug;

/// Point-in-time view of the slot table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stats {
    /// Live nodes
    pub live: usize,
    /// Slots including tombstones
    pub loose: usize,
    /// Tombstoned slots awaiting a shrink
    pub tombstones: usize,
    /// `tombstones / loose`, or 0 for an empty table
    pub tombstone_ratio: f64,
    /// Approximate heap bytes held by the engine
    pub memory_bytes: usize,
}

/// Consistent hash shared between threads.
///
/// Lookups return owned strings because the read guard cannot outlive the call.
pub struct SharedDoubleJump {
    inner: RwLock<DoubleJump>,
    config: Config,
}

impl SharedDoubleJump {
    /// Create an empty handle with default configuration.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(DoubleJump::new()),
            config: Config::default(),
        }
    }

    /// Create an empty handle, rejecting invalid configuration.
    pub fn with_config(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            inner: RwLock::new(DoubleJump::with_config(config.engine.clone())),
            config,
        })
    }

    /// Configuration this handle was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Add a node. Returns `false` for empty or already-live names.
    pub fn add(&self, node: &str) -> bool {
        self.inner.write().add(node)
    }

    /// Remove a node. Returns `false` if it was not live.
    ///
    /// With `auto_shrink` enabled this may also compact the table.
    pub fn remove(&self, node: &str) -> bool {
        let mut inner = self.inner.write();
        if !inner.remove(node) {
            return false;
        }

        if self.config.wants_shrink(inner.tombstones(), inner.loose_len()) {
            let reclaimed = inner.shrink();
            debug!(reclaimed, live = inner.len(), "auto-shrink");
        }
        true
    }

    /// Node owning `key`.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<String> {
        self.inner.read().get(key).map(str::to_owned)
    }

    /// Node owning a pre-hashed key.
    pub fn get_by_hash(&self, hash: u64) -> Option<String> {
        self.inner.read().get_by_hash(hash).map(str::to_owned)
    }

    /// Uniformly random live node.
    pub fn random(&self) -> Option<String> {
        self.inner.read().random().map(str::to_owned)
    }

    /// Uniformly random live node drawn from `rng`.
    pub fn random_with<R: Rng>(&self, rng: &mut R) -> Option<String> {
        self.inner.read().random_with(rng).map(str::to_owned)
    }

    /// Live nodes in insertion order.
    pub fn all(&self) -> Vec<String> {
        self.inner.read().iter().map(str::to_owned).collect()
    }

    /// Check whether `node` is live.
    pub fn contains(&self, node: &str) -> bool {
        self.inner.read().contains(node)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Check if no node is live.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Number of slots including tombstones.
    pub fn loose_len(&self) -> usize {
        self.inner.read().loose_len()
    }

    /// Drop tombstones. Returns how many were reclaimed.
    pub fn shrink(&self) -> usize {
        self.inner.write().shrink()
    }

    /// Get slot table statistics.
    pub fn stats(&self) -> Stats {
        let inner = self.inner.read();
        let loose = inner.loose_len();
        let tombstones = inner.tombstones();
        Stats {
            live: inner.len(),
            loose,
            tombstones,
            tombstone_ratio: if loose > 0 {
                tombstones as f64 / loose as f64
            } else {
                0.0
            },
            memory_bytes: inner.memory_usage(),
        }
    }

    /// Run `f` under the read lock.
    pub fn read<T>(&self, f: impl FnOnce(&DoubleJump) -> T) -> T {
        f(&self.inner.read())
    }

    /// Run `f` under the write lock. Auto-shrink does not apply here.
    pub fn write<T>(&self, f: impl FnOnce(&mut DoubleJump) -> T) -> T {
        f(&mut self.inner.write())
    }

    /// Take the engine back out of the handle.
    pub fn into_inner(self) -> DoubleJump {
        self.inner.into_inner()
    }
}

impl Default for SharedDoubleJump {
    fn default() -> Self {
        Self::new()
    }
}

impl From<DoubleJump> for SharedDoubleJump {
    fn from(dj: DoubleJump) -> Self {
        Self {
            inner: RwLock::new(dj),
            config: Config::default(),
        }
    }
}

impl std::fmt::Debug for SharedDoubleJump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedDoubleJump")
            .field("inner", &*self.inner.read())
            .field("config", &self.config)
            .finish()
    }
}
