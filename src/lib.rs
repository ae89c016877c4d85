//! # doublejump
//!
//! Consistent hashing over a changing set of named nodes, with real removal.
//!
//! Jump consistent hash (Lamping & Veach, "A Fast, Minimal Memory, Consistent
//! Hash Algorithm", 2014) maps a key to one of `n` buckets and moves only
//! `1/n` of the keys when a bucket is appended, but buckets can only come and
//! go at the tail. `DoubleJump` runs jump hash over an append-only slot table
//! instead: removing a node turns its slot into a tombstone in place, and a
//! lookup that lands on a tombstone retries deterministically inside the range
//! below it. Keys owned by nodes that stay put never move. [`DoubleJump::shrink`]
//! drops the accumulated tombstones at the cost of a one-off reshuffle.
//!
//! ## Example
//!
//! ```rust
//! use doublejump::DoubleJump;
//!
//! let mut dj = DoubleJump::new();
//! for i in 0..10 {
//!     dj.add(&format!("node-{i}"));
//! }
//!
//! let owner = dj.get("foo").unwrap().to_owned();
//! assert_eq!(dj.get("foo"), Some(owner.as_str()));
//!
//! // Removing some other node never moves "foo".
//! let other = if owner == "node-5" { "node-7" } else { "node-5" };
//! dj.remove(other);
//! assert_eq!(dj.get("foo"), Some(owner.as_str()));
//! assert_eq!(dj.len(), 9);
//! assert_eq!(dj.loose_len(), 10);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, trace};
use xxhash_rust::xxh64::xxh64;

// =============================================================================
// Configuration
// =============================================================================

/// Full-range restarts tried when a descent runs out of slots below it.
const FALLBACK_ROUNDS: u64 = 16;

/// 2^64 / golden ratio. Spreads small salts across the whole word.
const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Keeps round salts apart from slot-index salts.
const ROUND_SALT: u64 = 0xD6E8_FEB8_6659_FD93;

/// 64-bit LCG multiplier embedded in jump hash.
const JUMP_LCG: u64 = 2_862_933_555_777_941_757;

/// Construction options for [`DoubleJump`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Slots to reserve up front.
    pub initial_capacity: usize,
    /// Seed mixed into every key hash. Engines with different seeds map keys
    /// independently of each other.
    pub seed: u64,
}

// =============================================================================
// Hashing
// =============================================================================

/// Hash a key exactly as [`DoubleJump::get`] does before picking a slot.
///
/// `dj.get(key) == dj.get_by_hash(hash_key(key, dj.seed()))` always holds.
#[inline]
pub fn hash_key(key: &[u8], seed: u64) -> u64 {
    xxh64(key, seed)
}

/// SplitMix64 finaliser over `hash ^ salt·γ`.
#[inline]
fn remix(hash: u64, salt: u64) -> u64 {
    let mut z = hash ^ salt.wrapping_mul(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

// =============================================================================
// Jump selector
// =============================================================================

/// Jump consistent hash: maps `hash` to a bucket in `0..buckets`.
///
/// For a fixed `hash`, `jump(hash, n + 1)` is either `jump(hash, n)` or `n`.
/// `buckets` must be non-zero.
#[inline]
pub fn jump(mut hash: u64, buckets: usize) -> usize {
    debug_assert!(buckets > 0, "jump over an empty range");
    let buckets = buckets as i64;
    let mut b: i64 = -1;
    let mut j: i64 = 0;
    while j < buckets {
        b = j;
        hash = hash.wrapping_mul(JUMP_LCG).wrapping_add(1);
        j = ((b + 1) as f64 * ((1u64 << 31) as f64 / ((hash >> 33) + 1) as f64)) as i64;
    }
    b.max(0) as usize
}

// =============================================================================
// Slot table
// =============================================================================

#[derive(Debug, Clone)]
enum Slot {
    /// `rank` is this slot's position in `DoubleJump::live`.
    Live { node: Arc<str>, rank: usize },
    Tombstone,
}

impl Slot {
    #[inline]
    fn node(&self) -> Option<&str> {
        match self {
            Slot::Live { node, .. } => Some(node),
            Slot::Tombstone => None,
        }
    }

    #[inline]
    fn is_live(&self) -> bool {
        matches!(self, Slot::Live { .. })
    }
}

// =============================================================================
// DoubleJump
// =============================================================================

/// Consistent hash over a set of named nodes that supports removal.
///
/// - `add` appends a slot; existing slot indices never change.
/// - `remove` tombstones a slot in place.
/// - `get` runs jump hash over every slot, retrying below a tombstone.
/// - `shrink` drops tombstones and renumbers the survivors in order.
///
/// Mutation needs `&mut self`; share it between threads behind a lock.
#[derive(Clone)]
pub struct DoubleJump {
    slots: Vec<Slot>,
    /// Live node -> slot index. Tombstoned slots have no entry.
    index: HashMap<Arc<str>, usize>,
    /// Slot indices of live nodes, in no particular order.
    live: Vec<usize>,
    seed: u64,
}

impl DoubleJump {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            slots: Vec::with_capacity(config.initial_capacity),
            index: HashMap::with_capacity(config.initial_capacity),
            live: Vec::with_capacity(config.initial_capacity),
            seed: config.seed,
        }
    }

    /// Number of live nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Number of slots, tombstones included.
    #[inline]
    pub fn loose_len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn tombstones(&self) -> usize {
        self.slots.len() - self.live.len()
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn contains(&self, node: &str) -> bool {
        self.index.contains_key(node)
    }

    /// Slot currently held by `node`. Stable until the next [`shrink`](Self::shrink).
    pub fn slot(&self, node: &str) -> Option<usize> {
        self.index.get(node).copied()
    }

    /// Append `node` as a new slot.
    ///
    /// Returns `false` without touching the table if `node` is empty or
    /// already live.
    pub fn add(&mut self, node: &str) -> bool {
        if node.is_empty() || self.index.contains_key(node) {
            return false;
        }

        let node: Arc<str> = Arc::from(node);
        let idx = self.slots.len();
        self.slots.push(Slot::Live {
            node: Arc::clone(&node),
            rank: self.live.len(),
        });
        self.live.push(idx);
        debug!(node = &*node, slot = idx, live = self.live.len(), "added node");
        self.index.insert(node, idx);
        true
    }

    /// Tombstone the slot held by `node`.
    ///
    /// Only keys that resolved to `node` change owner. Returns `false` if
    /// `node` is not live.
    pub fn remove(&mut self, node: &str) -> bool {
        let Some(idx) = self.index.remove(node) else {
            return false;
        };
        // The name index never points at a tombstone.
        let rank = match std::mem::replace(&mut self.slots[idx], Slot::Tombstone) {
            Slot::Live { rank, .. } => rank,
            Slot::Tombstone => return false,
        };

        self.live.swap_remove(rank);
        if let Some(&moved) = self.live.get(rank) {
            if let Slot::Live { rank: r, .. } = &mut self.slots[moved] {
                *r = rank;
            }
        }

        debug!(
            node,
            slot = idx,
            live = self.live.len(),
            loose = self.slots.len(),
            "tombstoned node"
        );
        true
    }

    /// Node owning `key`, or `None` when no node is live.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&str> {
        self.slot_of(key).and_then(|idx| self.slots[idx].node())
    }

    /// Like [`get`](Self::get) for a key already hashed with [`hash_key`].
    pub fn get_by_hash(&self, hash: u64) -> Option<&str> {
        self.locate(hash).and_then(|idx| self.slots[idx].node())
    }

    /// Slot index owning `key`.
    pub fn slot_of(&self, key: impl AsRef<[u8]>) -> Option<usize> {
        if self.live.is_empty() {
            return None;
        }
        self.locate(hash_key(key.as_ref(), self.seed))
    }

    /// Resolve a hash to a live slot.
    ///
    /// Each step only looks at the hash, `loose_len`, and whether the visited
    /// slots are live. Tombstoning a slot therefore only reroutes paths that
    /// ended on it, and appending a slot only reroutes paths that now reach
    /// the new slot.
    fn locate(&self, hash: u64) -> Option<usize> {
        if self.live.is_empty() {
            return None;
        }

        let loose = self.slots.len();
        for round in 0..FALLBACK_ROUNDS {
            let mut h = if round == 0 {
                hash
            } else {
                remix(hash ^ ROUND_SALT, round)
            };
            let mut range = loose;
            while range > 0 {
                let idx = jump(h, range);
                if self.slots[idx].is_live() {
                    return Some(idx);
                }
                // Strictly smaller range each retry, so this terminates.
                h = remix(h, idx as u64 + 1);
                range = idx;
            }
            trace!(hash, round, "descent exhausted below live slots");
        }

        self.slots.iter().position(Slot::is_live)
    }

    /// Uniformly random live node, using the thread-local RNG.
    pub fn random(&self) -> Option<&str> {
        self.random_with(&mut rand::thread_rng())
    }

    /// Uniformly random live node drawn from `rng`.
    ///
    /// Samples the dense live list, so tombstones do not skew the odds.
    pub fn random_with<R: Rng>(&self, rng: &mut R) -> Option<&str> {
        if self.live.is_empty() {
            return None;
        }
        let idx = self.live[rng.gen_range(0..self.live.len())];
        self.slots[idx].node()
    }

    /// Live nodes in slot order, i.e. insertion order minus removals.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.slots.iter().filter_map(Slot::node)
    }

    pub fn all(&self) -> Vec<&str> {
        self.iter().collect()
    }

    /// Drop every tombstone and renumber live slots contiguously, keeping
    /// their order. Returns the number of tombstones reclaimed.
    ///
    /// Some keys change owner afterwards because the jump range shrinks.
    pub fn shrink(&mut self) -> usize {
        let reclaimed = self.tombstones();
        if reclaimed == 0 {
            return 0;
        }

        let old = std::mem::replace(&mut self.slots, Vec::with_capacity(self.live.len()));
        self.live.clear();
        for slot in old {
            if let Slot::Live { node, .. } = slot {
                let idx = self.slots.len();
                self.index.insert(Arc::clone(&node), idx);
                self.slots.push(Slot::Live { node, rank: idx });
                self.live.push(idx);
            }
        }

        debug!(reclaimed, live = self.live.len(), "shrank slot table");
        reclaimed
    }

    /// Approximate heap bytes held by the table.
    pub fn memory_usage(&self) -> usize {
        // Arc<str> allocations carry two reference counts.
        let names: usize = self
            .index
            .keys()
            .map(|n| n.len() + 2 * std::mem::size_of::<usize>())
            .sum();
        self.slots.capacity() * std::mem::size_of::<Slot>()
            + self.index.capacity() * (std::mem::size_of::<Arc<str>>() + std::mem::size_of::<usize>())
            + self.live.capacity() * std::mem::size_of::<usize>()
            + names
    }

    pub fn shrink_to_fit(&mut self) {
        self.slots.shrink_to_fit();
        self.index.shrink_to_fit();
        self.live.shrink_to_fit();
    }
}

impl Default for DoubleJump {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DoubleJump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoubleJump")
            .field("nodes", &self.all())
            .field("loose_len", &self.loose_len())
            .finish()
    }
}

impl<S: AsRef<str>> Extend<S> for DoubleJump {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for node in iter {
            self.add(node.as_ref());
        }
    }
}

impl<S: AsRef<str>> FromIterator<S> for DoubleJump {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut dj = Self::new();
        dj.extend(iter);
        dj
    }
}


#[cfg(test)]
mod proptests;
