//! # Vendor Sell List
//!
//! Decides which inventory items are sold at a vendor, and sells them.
//!
//! Protected from sale: locked slots, quest items, tomes, keys, the leg item,
//! runewords, keepers (potions excepted), the marked reroll items, jewels up
//! to the crafting reserve, potions up to the configured keep counts, and
//! portal scrolls while no portal tome is carried.

use horadric_core::{GameSnapshot, Item, LocationKind};
use tracing::{debug, info, warn};

use crate::actions::{retry_action, ActionExecutor, GameAction, GameClient};
use crate::engine::Economy;
use crate::catalog::{RecipeCatalog, JEWEL, LEG_ITEM};
use crate::config::CharacterConfig;
use crate::error::{ActionError, EconomyResult};
use crate::marks::MarkRegistry;
use crate::rules::RuleEvaluator;
use crate::session::InterruptGate;

/// Quest items that are never sold.
pub const QUEST_ITEMS: [&str; 6] = [
    "StaffOfKings",
    "HoradricStaff",
    "AmuletOfTheViper",
    "KhalimsFlail",
    "KhalimsWill",
    "HellforgeHammer",
];

const NEVER_SOLD: [&str; 4] = ["TomeOfTownPortal", "TomeOfIdentify", "Key", LEG_ITEM];
const PORTAL_TOME: &str = "TomeOfTownPortal";
const PORTAL_SCROLL: &str = "ScrollOfTownPortal";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PotionKind {
    Healing,
    Mana,
    Rejuvenation,
}

fn potion_kind(item: &Item) -> Option<PotionKind> {
    if !item.is_potion() {
        return None;
    }
    if item.name.contains("Rejuvenation") {
        Some(PotionKind::Rejuvenation)
    } else if item.name.contains("Healing") {
        Some(PotionKind::Healing)
    } else if item.name.contains("Mana") {
        Some(PotionKind::Mana)
    } else {
        None
    }
}

/// Builds sell lists.
pub struct SellPlanner<'a> {
    config: &'a CharacterConfig,
    rules: &'a dyn RuleEvaluator,
    catalog: &'a RecipeCatalog,
    marks: &'a MarkRegistry,
}

impl<'a> SellPlanner<'a> {
    /// Creates a planner.
    #[must_use]
    pub const fn new(
        config: &'a CharacterConfig,
        rules: &'a dyn RuleEvaluator,
        catalog: &'a RecipeCatalog,
        marks: &'a MarkRegistry,
    ) -> Self {
        Self {
            config,
            rules,
            catalog,
            marks,
        }
    }

    fn is_keeper(&self, item: &Item) -> bool {
        self.rules.evaluate(item).is_full()
    }

    /// Inventory items to sell, in snapshot order.
    #[must_use]
    pub fn sell_list(&self, snapshot: &GameSnapshot) -> Vec<Item> {
        let has_portal_tome = snapshot.inventory().any(|it| it.name == PORTAL_TOME);
        let potions = self.config.inventory.potions;
        let (mut healing, mut mana, mut rejuvenation) = (potions.healing, potions.mana, potions.rejuvenation);

        let crafting = self.catalog.jewel_crafting_enabled(self.config);
        let jewel_limit = self.config.cube_recipes.jewels_to_keep;
        let mut jewels_kept = u32::try_from(
            snapshot
                .by_location(&[LocationKind::Stash, LocationKind::SharedStash])
                .filter(|it| it.name == JEWEL && !self.is_keeper(it))
                .count(),
        )
        .unwrap_or(u32::MAX);

        let mut sell = Vec::new();
        for item in snapshot.inventory() {
            if self.config.inventory.is_locked(item.location.position) {
                continue;
            }
            if item.quest || QUEST_ITEMS.contains(&item.name.as_str()) || NEVER_SOLD.contains(&item.name.as_str()) {
                continue;
            }
            if !has_portal_tome && item.name == PORTAL_SCROLL {
                continue;
            }
            if item.is_runeword() {
                continue;
            }
            if !item.is_potion() && self.rules.evaluate_ignoring_tiers(item).is_full() {
                continue;
            }
            if let Some(category) = self.marks.marked_category(item) {
                warn!(%item, ?category, "not selling marked item");
                continue;
            }
            if crafting && item.name == JEWEL && !self.is_keeper(item) && jewels_kept < jewel_limit {
                jewels_kept += 1;
                debug!(%item, jewels_kept, jewel_limit, "keeping jewel for crafting");
                continue;
            }
            let budget = match potion_kind(item) {
                Some(PotionKind::Healing) => Some(&mut healing),
                Some(PotionKind::Mana) => Some(&mut mana),
                Some(PotionKind::Rejuvenation) => Some(&mut rejuvenation),
                None => None,
            };
            if let Some(left) = budget {
                if *left > 0 {
                    *left -= 1;
                    continue;
                }
            }
            sell.push(item.clone());
        }
        sell
    }

    /// Sells everything on the sell list. Items that fail to sell are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::MenuNotOpen`] if no vendor window is open, or
    /// [`crate::EconomyError::Stopped`] if interrupted.
    pub fn sell_all<E: ActionExecutor + ?Sized>(
        &self,
        snapshot: &GameSnapshot,
        executor: &mut E,
        gate: &InterruptGate,
    ) -> EconomyResult<usize> {
        if !snapshot.player.vendor_open {
            return Err(ActionError::MenuNotOpen("vendor").into());
        }
        let mut sold = 0;
        for item in self.sell_list(snapshot) {
            gate.checkpoint()?;
            match retry_action(executor, &GameAction::SellItem { unit: item.unit_id }) {
                Ok(()) => {
                    info!(%item, "sold");
                    sold += 1;
                }
                Err(e) => warn!(%item, error = %e, "sell failed, skipping"),
            }
        }
        Ok(sold)
    }
}

impl Economy<'_> {
    /// Sells the current sell list at the open vendor. Returns the number of
    /// items sold.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError::MenuNotOpen`] if no vendor window is open, or
    /// [`crate::EconomyError::Stopped`] if interrupted.
    pub fn sell_junk<G: GameClient + ?Sized>(&mut self, game: &mut G) -> EconomyResult<usize> {
        let snapshot = game.snapshot()?;
        self.rehydrate(&snapshot);
        self.sell_planner().sell_all(&snapshot, game, &self.gate)
    }
}
