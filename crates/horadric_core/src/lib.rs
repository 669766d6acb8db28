//! # HORADRIC Core
//!
//! The item model shared by every HORADRIC crate.
//!
//! ## Design Principles
//!
//! 1. **Discovered, not created** - items come from snapshots, never from the bot
//! 2. **Canonical ordering** - every pool is sorted the same way
//! 3. **Durable identity** - fingerprints survive restarts, unit handles do not
//!
//! ## Example
//!
//! ```rust
//! use horadric_core::{FingerprintCategory, Item, ItemType, Quality, Stat};
//!
//! let ring = Item::new(7, "Ring", ItemType::Ring, Quality::Magic)
//!     .with_affixes(&[412], &[])
//!     .with_stats(vec![Stat::new(7, 0, 20)]);
//!
//! let category = FingerprintCategory::new("Ring", Quality::Magic);
//! assert_eq!(category.fingerprint(&ring).as_str(), "Ring|P412|7:0:20");
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod fingerprint;
pub mod item;
pub mod snapshot;

pub use fingerprint::{fingerprint, Fingerprint, FingerprintCategory};
pub use item::{
    Affixes, EquipSlot, Item, ItemType, Location, LocationKind, Position, Quality, Stat, UnitId, Wear,
};
pub use snapshot::{
    sort_canonical, AreaId, Difficulty, GameSnapshot, MonsterRank, NearbyObject, PlayerState, SourceKind,
};
