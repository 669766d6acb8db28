//! # Fingerprint - Restart-Safe Item Identity
//!
//! **Derived identity for one specific item instance**
//!
//! Session handles are reset on every restart, so a marked item is re-found by
//! a string derived from attributes that do not change unless the item itself
//! changes.
//!
//! ## Format
//!
//! Fields are joined with `|` in this order:
//!
//! 1. base name
//! 2. identified display name (omitted when empty)
//! 3. `P{id}` for every non-zero prefix, ascending
//! 4. `S{id}` for every non-zero suffix, ascending
//! 5. `{stat}:{layer}:{value}` for every stat, sorted as strings
//!
//! The client does not enumerate stats in a stable order, so the stat fields
//! are canonicalized before joining. The format is persisted and must not
//! change between releases.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::item::{Item, Quality};

/// Field separator.
pub const SEPARATOR: char = '|';

/// A durable item fingerprint. The empty fingerprint means "no mark".
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// The empty fingerprint.
    #[must_use]
    pub const fn empty() -> Self {
        Self(String::new())
    }

    /// Wraps a previously persisted fingerprint string.
    #[must_use]
    pub fn from_persisted(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns true if no identity is stored.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The raw string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The name and quality an item must have to be fingerprinted in a category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FingerprintCategory {
    /// Required base name.
    pub target: String,
    /// Required quality.
    pub quality: Quality,
}

impl FingerprintCategory {
    /// Creates a category.
    #[must_use]
    pub fn new(target: impl Into<String>, quality: Quality) -> Self {
        Self {
            target: target.into(),
            quality,
        }
    }

    /// Returns true if the item belongs to this category.
    #[inline]
    #[must_use]
    pub fn admits(&self, item: &Item) -> bool {
        !self.target.is_empty() && item.name == self.target && item.quality == self.quality
    }

    /// Fingerprints `item`, or returns the empty fingerprint when the item is
    /// outside this category.
    #[must_use]
    pub fn fingerprint(&self, item: &Item) -> Fingerprint {
        if !self.admits(item) {
            return Fingerprint::empty();
        }
        fingerprint(item)
    }
}

/// Computes the fingerprint of any item, without a category guard.
#[must_use]
pub fn fingerprint(item: &Item) -> Fingerprint {
    let mut parts: Vec<String> = Vec::with_capacity(2 + item.stats.len() + 6);
    parts.push(item.name.clone());
    if !item.identified_name.is_empty() {
        parts.push(item.identified_name.clone());
    }

    let mut prefixes: Vec<u16> = item.affixes.prefixes.iter().copied().filter(|&id| id != 0).collect();
    prefixes.sort_unstable();
    parts.extend(prefixes.into_iter().map(|id| format!("P{id}")));

    let mut suffixes: Vec<u16> = item.affixes.suffixes.iter().copied().filter(|&id| id != 0).collect();
    suffixes.sort_unstable();
    parts.extend(suffixes.into_iter().map(|id| format!("S{id}")));

    let mut stats: Vec<String> = item
        .stats
        .iter()
        .map(|s| format!("{}:{}:{}", s.id, s.layer, s.value))
        .collect();
    stats.sort_unstable();
    parts.extend(stats);

    let mut out = String::with_capacity(parts.iter().map(|p| p.len() + 1).sum());
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push(SEPARATOR);
        }
        out.push_str(part);
    }
    Fingerprint(out)
}
