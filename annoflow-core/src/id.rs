//! Identifier generation.
//!
//! Ids are minted by an explicit [`IdGenerator`] handed to whatever creates
//! items, never by ambient global state. Two modes exist: random (UUID v4)
//! and seeded, where the sequence of generated ids is reproducible.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Identifier of a data item (or of an operation instance).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<Uuid> for ItemId {
    fn from(u: Uuid) -> Self {
        Self(u.to_string())
    }
}

#[derive(Debug, Clone)]
enum Mode {
    Random,
    Seeded { seed: u64, counter: Arc<AtomicU64> },
}

/// Source of unique identifiers.
///
/// Clones share state: two clones of a seeded generator continue one
/// sequence rather than replaying it.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    mode: Mode,
}

impl IdGenerator {
    /// Random UUID v4 ids.
    pub fn random() -> Self {
        Self { mode: Mode::Random }
    }

    /// Reproducible ids: the n-th call to [`generate`](Self::generate) on a
    /// generator seeded with `seed` always returns the same id.
    pub fn seeded(seed: u64) -> Self {
        Self {
            mode: Mode::Seeded {
                seed,
                counter: Arc::new(AtomicU64::new(0)),
            },
        }
    }

    pub fn is_seeded(&self) -> bool {
        matches!(self.mode, Mode::Seeded { .. })
    }

    /// Produce a fresh id.
    pub fn generate(&self) -> ItemId {
        match &self.mode {
            Mode::Random => ItemId::from(Uuid::new_v4()),
            Mode::Seeded { seed, counter } => {
                let n = counter.fetch_add(1, Ordering::Relaxed);
                generate_deterministic(&format!("seq:{seed}:{n}"))
            }
        }
    }

    /// Pure function of `seed`, independent of the generator mode.
    pub fn generate_deterministic(&self, seed: &str) -> ItemId {
        generate_deterministic(seed)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::random()
    }
}

/// Derive a UUID-formatted id from the SHA-256 digest of `seed`.
pub fn generate_deterministic(seed: &str) -> ItemId {
    let digest = Sha256::digest(seed.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    ItemId::from(uuid::Builder::from_random_bytes(bytes).into_uuid())
}
