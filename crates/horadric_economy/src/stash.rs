//! # Stash Routine
//!
//! **Moves classified inventory items into the right stash tab**
//!
//! Tab 1 is the personal stash, tabs 2 and up are shared pages.
//!
//! ## Tab Selection
//!
//! 1. Priority items (runes, jewels, rings, amulets, gems, essences, tokens)
//!    try the first shared tab.
//! 2. The last tab that accepted an item is tried next, except that a
//!    non-priority item never follows a priority item into tab 2 this way.
//! 3. Rotation from the start tab up to the last shared tab. The start tab is
//!    personal unless stashing to shared; unique charms start on shared, the
//!    leg item on personal. Non-priority items try tab 2 last in rotation.
//! 4. The personal tab.
//!
//! An item that fits nowhere is reported as
//! [`EconomyError::StorageExhausted`] and left in the inventory.

use horadric_core::{GameSnapshot, Item, ItemType, Quality, UnitId};
use tracing::{debug, error, info, warn};

use crate::actions::{retry_action, GameAction, GameClient};
use crate::catalog::LEG_ITEM;
use crate::classifier::{Disposition, StashReason};
use crate::config::StashSection;
use crate::engine::Economy;
use crate::error::{EconomyError, EconomyResult};
use crate::notify::notify_stashed;

/// Personal stash tab.
pub const PERSONAL_TAB: u8 = 1;
/// First shared stash tab.
pub const FIRST_SHARED_TAB: u8 = 2;

const PRIORITY_FRAGMENTS: [&str; 12] = [
    "rune", "jewel", "ring", "amulet", "tokenofabsolution", "essence", "amethyst", "ruby", "sapphire", "topaz",
    "emerald", "diamond",
];

/// Outcome of one stash pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StashReport {
    /// Stashed items and the tab they went to.
    pub stashed: Vec<(UnitId, u8)>,
    /// Dropped items.
    pub dropped: Vec<UnitId>,
    /// Items that fit in no tab.
    pub exhausted: Vec<UnitId>,
}

/// Returns true for items that go to the first shared tab first.
#[must_use]
pub fn is_priority_item(item: &Item) -> bool {
    let lower = item.name.to_ascii_lowercase();
    PRIORITY_FRAGMENTS.iter().any(|f| lower.contains(f))
}

fn is_unique_charm(item: &Item) -> bool {
    item.item_type == ItemType::Charm && item.quality == Quality::Unique
}

/// Tabs to try for `item`, in order, without repeats.
#[must_use]
pub fn tab_order(item: &Item, stash: &StashSection, last_successful: Option<u8>) -> Vec<u8> {
    let last_tab = PERSONAL_TAB + stash.shared_pages;
    let priority = is_priority_item(item);
    let start = if item.name == LEG_ITEM {
        PERSONAL_TAB
    } else if is_unique_charm(item) || stash.stash_to_shared {
        FIRST_SHARED_TAB
    } else {
        PERSONAL_TAB
    };

    let mut order: Vec<u8> = Vec::with_capacity(usize::from(last_tab) + 2);
    let mut push = |tab: u8| {
        if (PERSONAL_TAB..=last_tab).contains(&tab) && !order.contains(&tab) {
            order.push(tab);
        }
    };

    if priority {
        push(FIRST_SHARED_TAB);
    }
    if let Some(last) = last_successful {
        if priority || last != FIRST_SHARED_TAB {
            push(last);
        }
    }
    for tab in start..=last_tab {
        if !priority && tab == FIRST_SHARED_TAB {
            continue;
        }
        push(tab);
    }
    if start <= FIRST_SHARED_TAB {
        push(FIRST_SHARED_TAB);
    }
    push(PERSONAL_TAB);
    for tab in FIRST_SHARED_TAB..=last_tab {
        push(tab);
    }
    order
}

impl Economy<'_> {
    /// Runs one stash pass over the inventory.
    ///
    /// The first pass of a session stashes everything not excluded and ends
    /// the first-run window.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Stopped`] if interrupted, or a snapshot error.
    /// Items that cannot be stashed are reported, not raised.
    pub fn stash_inventory<G: GameClient + ?Sized>(&mut self, game: &mut G) -> EconomyResult<StashReport> {
        self.gate.checkpoint()?;
        let first_run = self.session.first_run;
        let mut snapshot = game.snapshot()?;
        self.rehydrate(&snapshot);

        if self.pull_upgrade_gem(game, &snapshot)? {
            snapshot = game.snapshot()?;
        }

        let mut report = StashReport::default();
        for (item, classification) in self.classify_inventory(&snapshot, first_run) {
            match classification.disposition {
                Disposition::Keep => {}
                Disposition::Drop(reason) => {
                    self.gate.checkpoint()?;
                    debug!(%item, ?reason, "dropping");
                    self.session.blacklist(item.unit_id);
                    match retry_action(game, &GameAction::DropItem { unit: item.unit_id }) {
                        Ok(()) => report.dropped.push(item.unit_id),
                        Err(e) => warn!(%item, error = %e, "drop failed"),
                    }
                }
                Disposition::Stash(reason) => match self.stash_item(game, &item, reason) {
                    Ok(tab) => report.stashed.push((item.unit_id, tab)),
                    Err(e @ EconomyError::StorageExhausted { .. }) => {
                        error!(%item, error = %e, "item could not be stashed in any tab");
                        report.exhausted.push(item.unit_id);
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        if first_run {
            self.session.first_run = false;
        }
        Ok(report)
    }

    /// Stashes one item, trying tabs in [`tab_order`]. Returns the tab used.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::StorageExhausted`] if no tab took the item, or
    /// [`EconomyError::Stopped`] if interrupted between attempts.
    pub fn stash_item<G: GameClient + ?Sized>(&mut self, game: &mut G, item: &Item, reason: StashReason) -> EconomyResult<u8> {
        for tab in tab_order(item, &self.config.stash, self.session.last_successful_stash_tab) {
            self.gate.checkpoint()?;
            match retry_action(game, &GameAction::StashItem { unit: item.unit_id, tab }) {
                Ok(()) => {
                    if tab > PERSONAL_TAB {
                        self.session.last_successful_stash_tab = Some(tab);
                    }
                    info!(%item, tab, ?reason, "stashed");
                    notify_stashed(self.sink, item, reason, &self.config.notifications);
                    return Ok(tab);
                }
                Err(e) => debug!(%item, tab, error = %e, "tab did not take item"),
            }
        }
        Err(EconomyError::StorageExhausted { item: item.name.clone() })
    }

    /// Takes one reserved upgrade gem out of the stash if none is carried.
    /// Returns true if a gem was moved.
    fn pull_upgrade_gem<G: GameClient + ?Sized>(
        &self,
        game: &mut G,
        snapshot: &GameSnapshot,
    ) -> EconomyResult<bool> {
        let Some(gem) = self.config.inventory.upgrade_gem() else {
            return Ok(false);
        };
        if snapshot.inventory().any(|it| it.name == gem) {
            return Ok(false);
        }
        let Some(stashed) = snapshot.stash_pool().into_iter().find(|it| it.name == gem) else {
            return Ok(false);
        };
        self.gate.checkpoint()?;
        match retry_action(game, &GameAction::TakeFromStash { unit: stashed.unit_id }) {
            Ok(()) => {
                debug!(gem, "moved upgrade gem to inventory");
                Ok(true)
            }
            Err(e) => {
                warn!(gem, error = %e, "failed to take upgrade gem from stash");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, item_type: ItemType, quality: Quality) -> Item {
        Item::new(1, name, item_type, quality)
    }

    #[test]
    fn test_priority_item_tries_shared_first() {
        let rune = item("BerRune", ItemType::Rune, Quality::Normal);
        assert_eq!(tab_order(&rune, &StashSection::default(), None), vec![2, 1, 3, 4]);
    }

    #[test]
    fn test_plain_item_tries_tab_two_last() {
        let armor = item("MagePlate", ItemType::Armor, Quality::Rare);
        assert_eq!(tab_order(&armor, &StashSection::default(), None), vec![1, 3, 4, 2]);
    }

    #[test]
    fn test_last_successful_tab_tried_early() {
        let armor = item("MagePlate", ItemType::Armor, Quality::Rare);
        assert_eq!(tab_order(&armor, &StashSection::default(), Some(3)), vec![3, 1, 4, 2]);
        // A non-priority item does not follow into the priority tab.
        assert_eq!(tab_order(&armor, &StashSection::default(), Some(2)), vec![1, 3, 4, 2]);
    }

    #[test]
    fn test_unique_charm_and_leg_overrides() {
        let charm = item("GrandCharm", ItemType::Charm, Quality::Unique);
        assert_eq!(tab_order(&charm, &StashSection::default(), None), vec![3, 4, 2, 1]);
        let stash = StashSection {
            stash_to_shared: true,
            ..StashSection::default()
        };
        let leg = item(LEG_ITEM, ItemType::Club, Quality::Normal);
        assert_eq!(tab_order(&leg, &stash, None), vec![1, 3, 4, 2]);
    }

    #[test]
    fn test_priority_detection() {
        assert!(is_priority_item(&item("PerfectAmethyst", ItemType::Gem, Quality::Normal)));
        assert!(is_priority_item(&item("TokenOfAbsolution", ItemType::Token, Quality::Normal)));
        assert!(!is_priority_item(&item("Monarch", ItemType::Shield, Quality::Normal)));
    }
}
