//! # Mark Registry
//!
//! **Two-tier identity for reroll targets**
//!
//! Each reroll category has at most one marked item. The mark is held as:
//!
//! - a durable [`Fingerprint`], the only thing ever persisted
//! - an ephemeral [`UnitId`] session handle, valid until the next restart
//!
//! The handle is an optimization. It is never trusted alone: after a restart
//! it is re-derived from the fingerprint by scanning a snapshot.
//!
//! Every change to a fingerprint sets a dirty flag. The owner of the registry
//! must call [`MarkRegistry::persist`] before continuing, so a crash between
//! mutation and save loses at most the latest correction.

use std::ops::RangeInclusive;

use horadric_core::{Fingerprint, FingerprintCategory, GameSnapshot, Item, Quality, UnitId};
use tracing::{error, info, warn};

use crate::catalog::names;
use crate::config::{CharacterConfig, ConfigStore};

/// Reroll category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RerollCategory {
    /// Magic items rerolled with perfect gems.
    Magic,
    /// Rare items rerolled with perfect skulls.
    Rare,
}

impl RerollCategory {
    /// Both categories.
    pub const ALL: [Self; 2] = [Self::Magic, Self::Rare];

    /// Quality a marked item of this category must have.
    #[must_use]
    pub const fn quality(self) -> Quality {
        match self {
            Self::Magic => Quality::Magic,
            Self::Rare => Quality::Rare,
        }
    }

    /// Recipe that rerolls this category.
    #[must_use]
    pub const fn recipe_name(self) -> &'static str {
        match self {
            Self::Magic => names::REROLL_MAGIC,
            Self::Rare => names::REROLL_RARE,
        }
    }
}

/// The mark for one category.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MarkedItemState {
    /// Base name being rerolled.
    pub target: String,
    /// Durable identity. Empty when nothing is marked.
    pub fingerprint: Fingerprint,
    /// Session handle. Unset after a restart.
    pub handle: UnitId,
}

impl MarkedItemState {
    /// Returns true if a mark exists in either tier.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.is_set() || !self.fingerprint.is_empty()
    }
}

/// Marks for both reroll categories plus the acceptance window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarkRegistry {
    magic: MarkedItemState,
    rare: MarkedItemState,
    min_level: u32,
    max_level: u32,
    dirty: bool,
}

impl MarkRegistry {
    /// Loads marks from configuration. Session handles start unset.
    #[must_use]
    pub fn from_config(config: &CharacterConfig) -> Self {
        let cube = &config.cube_recipes;
        Self {
            magic: MarkedItemState {
                target: cube.specific_item_to_reroll.clone(),
                fingerprint: cube.marked_magic_fingerprint.clone(),
                handle: UnitId::UNSET,
            },
            rare: MarkedItemState {
                target: cube.rare_specific_item_to_reroll.clone(),
                fingerprint: cube.marked_rare_fingerprint.clone(),
                handle: UnitId::UNSET,
            },
            min_level: cube.min_monster_level,
            max_level: cube.max_monster_level,
            dirty: false,
        }
    }

    /// Writes the durable tier back into `config`.
    pub fn write_to(&self, config: &mut CharacterConfig) {
        config.cube_recipes.marked_magic_fingerprint = self.magic.fingerprint.clone();
        config.cube_recipes.marked_rare_fingerprint = self.rare.fingerprint.clone();
    }

    /// State for one category.
    #[must_use]
    pub const fn state(&self, category: RerollCategory) -> &MarkedItemState {
        match category {
            RerollCategory::Magic => &self.magic,
            RerollCategory::Rare => &self.rare,
        }
    }

    fn state_mut(&mut self, category: RerollCategory) -> &mut MarkedItemState {
        match category {
            RerollCategory::Magic => &mut self.magic,
            RerollCategory::Rare => &mut self.rare,
        }
    }

    /// Fingerprint category guard for one reroll category.
    #[must_use]
    pub fn fingerprint_category(&self, category: RerollCategory) -> FingerprintCategory {
        FingerprintCategory::new(self.state(category).target.clone(), category.quality())
    }

    /// Fingerprints `item` under `category`, empty when it does not qualify.
    #[must_use]
    pub fn fingerprint(&self, category: RerollCategory, item: &Item) -> Fingerprint {
        self.fingerprint_category(category).fingerprint(item)
    }

    /// Returns true if `item` is the marked item of `category`, by fingerprint.
    #[must_use]
    pub fn is_marked_as(&self, category: RerollCategory, item: &Item) -> bool {
        let state = self.state(category);
        if state.fingerprint.is_empty() {
            return false;
        }
        self.fingerprint(category, item) == state.fingerprint
    }

    /// The category `item` is marked in, if any.
    #[must_use]
    pub fn marked_category(&self, item: &Item) -> Option<RerollCategory> {
        RerollCategory::ALL.into_iter().find(|&c| self.is_marked_as(c, item))
    }

    /// Returns true if `item` is the target the session handle points at but
    /// has not been fingerprinted yet.
    #[must_use]
    pub fn is_pending(&self, category: RerollCategory, item: &Item) -> bool {
        let state = self.state(category);
        state.handle.is_set() && state.handle == item.unit_id && state.fingerprint.is_empty()
    }

    /// Binds a fresh fingerprint and drops the session handle.
    pub fn bind(&mut self, category: RerollCategory, fingerprint: Fingerprint) {
        warn!(?category, fp = %fingerprint, "binding marked item fingerprint");
        let state = self.state_mut(category);
        state.fingerprint = fingerprint;
        state.handle = UnitId::UNSET;
        self.dirty = true;
    }

    /// Sets the session handle for a freshly marked ground item.
    pub fn set_handle(&mut self, category: RerollCategory, handle: UnitId) {
        self.state_mut(category).handle = handle;
    }

    /// Drops the session handle only.
    pub fn reset_handle(&mut self, category: RerollCategory) {
        self.state_mut(category).handle = UnitId::UNSET;
    }

    /// Clears both tiers of a mark.
    pub fn clear(&mut self, category: RerollCategory) {
        let state = self.state_mut(category);
        let had_fingerprint = !state.fingerprint.is_empty();
        state.fingerprint = Fingerprint::empty();
        state.handle = UnitId::UNSET;
        if had_fingerprint {
            warn!(?category, "marked item cleared");
            self.dirty = true;
        }
    }

    /// Re-derives session handles from fingerprints after a restart.
    pub fn rehydrate(&mut self, snapshot: &GameSnapshot) {
        for category in RerollCategory::ALL {
            if self.state(category).fingerprint.is_empty() || self.state(category).handle.is_set() {
                continue;
            }
            let found = snapshot
                .items
                .iter()
                .find(|it| self.is_marked_as(category, it))
                .map(|it| it.unit_id);
            if let Some(unit) = found {
                info!(?category, %unit, "re-found marked item");
                self.state_mut(category).handle = unit;
            }
        }
    }

    /// Acceptable monster-level window for new marks.
    #[must_use]
    pub const fn level_window(&self) -> RangeInclusive<u32> {
        self.min_level..=self.max_level
    }

    /// Returns true if a fingerprint changed since the last persist.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persists the durable tier if dirty. Failures are logged, not raised,
    /// and leave the registry dirty so the next persist point retries.
    ///
    /// Returns true if nothing was pending or the save succeeded.
    pub fn persist(&mut self, config: &mut CharacterConfig, store: &dyn ConfigStore) -> bool {
        if !self.dirty {
            return true;
        }
        self.write_to(config);
        match store.save(config.name(), config) {
            Ok(()) => {
                self.dirty = false;
                true
            }
            Err(e) => {
                error!(error = %e, "failed to persist marked item state");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigStore;
    use horadric_core::{ItemType, Stat};

    fn config() -> CharacterConfig {
        let mut config = CharacterConfig::default();
        config.character.name = "sorc".into();
        config.cube_recipes.specific_item_to_reroll = "Amulet".into();
        config.cube_recipes.rare_specific_item_to_reroll = "Diadem".into();
        config
    }

    fn amulet(unit: u32, value: i32) -> Item {
        Item::new(unit, "Amulet", ItemType::Amulet, Quality::Magic).with_stats(vec![Stat::new(127, 0, value)])
    }

    #[test]
    fn test_bind_then_match_by_fingerprint() {
        let mut marks = MarkRegistry::from_config(&config());
        let item = amulet(5, 1);
        let fp = marks.fingerprint(RerollCategory::Magic, &item);
        marks.bind(RerollCategory::Magic, fp);

        assert!(marks.is_dirty());
        assert_eq!(marks.marked_category(&item), Some(RerollCategory::Magic));
        assert_eq!(marks.marked_category(&amulet(6, 2)), None);
    }

    #[test]
    fn test_handle_alone_is_not_a_match() {
        let mut marks = MarkRegistry::from_config(&config());
        marks.set_handle(RerollCategory::Magic, UnitId(5));
        assert!(marks.state(RerollCategory::Magic).is_active());
        assert_eq!(marks.marked_category(&amulet(5, 1)), None);
        assert!(marks.is_pending(RerollCategory::Magic, &amulet(5, 1)));
    }

    #[test]
    fn test_rehydrate_after_restart() {
        let mut cfg = config();
        let item = amulet(42, 3);
        cfg.cube_recipes.marked_magic_fingerprint =
            FingerprintCategory::new("Amulet", Quality::Magic).fingerprint(&item);
        let mut marks = MarkRegistry::from_config(&cfg);
        assert!(!marks.state(RerollCategory::Magic).handle.is_set());

        let snapshot = GameSnapshot {
            items: vec![amulet(41, 9), item],
            ..GameSnapshot::default()
        };
        marks.rehydrate(&snapshot);
        assert_eq!(marks.state(RerollCategory::Magic).handle, UnitId(42));
    }

    #[test]
    fn test_clear_without_fingerprint_is_clean() {
        let mut marks = MarkRegistry::from_config(&config());
        marks.set_handle(RerollCategory::Rare, UnitId(9));
        marks.clear(RerollCategory::Rare);
        assert!(!marks.is_dirty());
        assert!(!marks.state(RerollCategory::Rare).is_active());
    }

    #[test]
    fn test_persist_writes_config() {
        let mut cfg = config();
        let store = MemoryConfigStore::new();
        let mut marks = MarkRegistry::from_config(&cfg);
        let fp = marks.fingerprint(RerollCategory::Magic, &amulet(1, 7));
        marks.bind(RerollCategory::Magic, fp.clone());

        assert!(marks.persist(&mut cfg, &store));
        assert!(!marks.is_dirty());
        assert_eq!(store.stored("sorc").unwrap().cube_recipes.marked_magic_fingerprint, fp);
    }

    #[test]
    fn test_persist_failure_stays_dirty() {
        let mut cfg = config();
        let store = MemoryConfigStore::new();
        store.fail_saves(true);
        let mut marks = MarkRegistry::from_config(&cfg);
        marks.bind(RerollCategory::Rare, Fingerprint::from_persisted("Diadem|S3"));

        assert!(!marks.persist(&mut cfg, &store));
        assert!(marks.is_dirty());
        // In-memory state is still correct for the rest of the session.
        assert_eq!(cfg.cube_recipes.marked_rare_fingerprint.as_str(), "Diadem|S3");
    }
}
