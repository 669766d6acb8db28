//! # Item Classifier
//!
//! **Keep, stash or drop, decided in a fixed order**
//!
//! [`Classifier::classify`] maps one inventory item to a [`Disposition`]. The
//! first applicable step wins:
//!
//! 1. Locked slots and the never-touch list (tomes, keys, the quest staff)
//! 2. Upgrade-gem reservation
//! 3. Quest items while leveling
//! 4. First-run amnesty
//! 5. Marked reroll items
//! 6. Recipe-ingredient reservation
//! 7. Potions
//! 8. Tier upgrades for the player or mercenary
//! 9. Keep rules, with the quantity cap turning stash into drop
//! 10. Runewords
//!
//! Anything left stays where it is.
//!
//! Stash and drop cannot both be chosen: [`Disposition`] is a sum type.
//!
//! ## Mark Consistency Hook
//!
//! A marked item that turns out to be a keeper is not stashed as a marked
//! item. Instead the classification carries a [`Classification::clears_mark`]
//! request, applied with [`apply_mark_hook`], which persists the cleared state.

use horadric_core::{GameSnapshot, Item, LocationKind, Quality, UnitId};
use tracing::{debug, warn};

use crate::catalog::{RecipeCatalog, JEWEL};
use crate::config::{CharacterConfig, ConfigStore};
use crate::marks::{MarkRegistry, RerollCategory};
use crate::rules::{RuleEvaluator, RuleId, RuleMatch, Wearer};

/// Items that are never stashed or dropped.
pub const NEVER_TOUCH: [&str; 4] = ["TomeOfTownPortal", "TomeOfIdentify", "Key", "HoradricStaff"];

/// Quest item that may be stashed while leveling.
pub const CUBE_QUEST_ITEM: &str = "HoradricCube";

/// Why an item goes to the stash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StashReason {
    /// First pass of the session.
    FirstRun,
    /// A spare unit of the reserved upgrade gem.
    SpareUpgradeGem,
    /// The marked reroll item.
    MarkedItem(RerollCategory),
    /// Held for an enabled recipe.
    RecipeIngredient,
    /// Beats the equipped item; sold if it is later outclassed.
    TierUpgrade(Wearer),
    /// Matches a keep rule.
    KeepRule(RuleId),
    /// Part of a runeword.
    Runeword,
    /// Produced by a cube recipe.
    CubeResult,
    /// Taken back out of the cube after an abandoned craft.
    CubeReturn,
}

impl StashReason {
    /// Returns true if this stash carries the sell-on-downgrade marker.
    #[must_use]
    pub const fn sell_on_downgrade(self) -> bool {
        matches!(self, Self::TierUpgrade(_))
    }
}

/// Why an item is dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The matching rule already has its maximum quantity stashed.
    QuantityExceeded {
        /// The capped rule.
        rule: RuleId,
        /// Its cap.
        max_quantity: u32,
    },
}

/// What to do with an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Leave it where it is.
    Keep,
    /// Move it to the stash.
    Stash(StashReason),
    /// Drop it on the ground.
    Drop(DropReason),
}

impl Disposition {
    /// Returns true for a stash.
    #[inline]
    #[must_use]
    pub const fn is_stash(self) -> bool {
        matches!(self, Self::Stash(_))
    }

    /// Returns true for a drop.
    #[inline]
    #[must_use]
    pub const fn is_drop(self) -> bool {
        matches!(self, Self::Drop(_))
    }
}

/// Classifier output plus the mark hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Classification {
    /// The decision.
    pub disposition: Disposition,
    /// Mark to clear because the marked item turned out to be a keeper.
    pub clears_mark: Option<RerollCategory>,
}

impl From<Disposition> for Classification {
    fn from(disposition: Disposition) -> Self {
        Self {
            disposition,
            clears_mark: None,
        }
    }
}

/// Applies the mark hook of a classification and persists the result.
pub fn apply_mark_hook(
    classification: &Classification,
    marks: &mut MarkRegistry,
    config: &mut CharacterConfig,
    store: &dyn ConfigStore,
) {
    if let Some(category) = classification.clears_mark {
        marks.clear(category);
        marks.persist(config, store);
    }
}

/// Stateless classifier over one snapshot.
pub struct Classifier<'a> {
    config: &'a CharacterConfig,
    rules: &'a dyn RuleEvaluator,
    catalog: &'a RecipeCatalog,
    marks: &'a MarkRegistry,
}

impl<'a> Classifier<'a> {
    /// Creates a classifier.
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

    /// Classifies one inventory item.
    #[must_use]
    pub fn classify(&self, item: &Item, snapshot: &GameSnapshot, first_run: bool) -> Classification {
        if item.is_in(LocationKind::Inventory) && self.config.inventory.is_locked(item.location.position) {
            return Disposition::Keep.into();
        }
        if NEVER_TOUCH.contains(&item.name.as_str()) {
            return Disposition::Keep.into();
        }

        if let Some(gem) = self.config.inventory.upgrade_gem() {
            if item.name == gem {
                return if Self::is_first_in_inventory(item, snapshot) {
                    debug!(%item, "keeping gem for shrine upgrade");
                    Disposition::Keep.into()
                } else {
                    Disposition::Stash(StashReason::SpareUpgradeGem).into()
                };
            }
        }

        if self.config.character.leveling && item.quest && item.name != CUBE_QUEST_ITEM {
            return Disposition::Keep.into();
        }

        if first_run {
            return Disposition::Stash(StashReason::FirstRun).into();
        }

        let mut clears_mark = None;
        if let Some(category) = self.marks.marked_category(item) {
            if self.rules.evaluate(item).is_full() {
                warn!(%item, ?category, "marked item matches keep rules, clearing mark");
                clears_mark = Some(category);
            } else {
                warn!(%item, ?category, "forcing stash of marked item");
                return Disposition::Stash(StashReason::MarkedItem(category)).into();
            }
        }

        Classification {
            disposition: self.classify_rules(item, snapshot),
            clears_mark,
        }
    }

    fn classify_rules(&self, item: &Item, snapshot: &GameSnapshot) -> Disposition {
        if self.should_reserve_for_recipe(item, snapshot) {
            return Disposition::Stash(StashReason::RecipeIngredient);
        }
        if item.is_potion() {
            return Disposition::Keep;
        }

        let tiers = self.rules.tier(item);
        for wearer in [Wearer::Player, Wearer::Mercenary] {
            if tiers.for_wearer(wearer) > 0 && self.rules.is_upgrade(item, wearer, snapshot) {
                return Disposition::Stash(StashReason::TierUpgrade(wearer));
            }
        }

        if let RuleMatch::Full { rule, max_quantity } = self.rules.evaluate_ignoring_tiers(item) {
            if let Some(max) = max_quantity {
                let stashed = self.stashed_for_rule(rule, snapshot);
                if stashed >= max {
                    debug!(%item, rule, max, "quantity cap reached, dropping");
                    return Disposition::Drop(DropReason::QuantityExceeded {
                        rule,
                        max_quantity: max,
                    });
                }
            }
            return Disposition::Stash(StashReason::KeepRule(rule));
        }

        if item.is_runeword() {
            return Disposition::Stash(StashReason::Runeword);
        }
        Disposition::Keep
    }

    fn is_first_in_inventory(item: &Item, snapshot: &GameSnapshot) -> bool {
        snapshot
            .inventory()
            .filter(|it| it.name == item.name)
            .min_by_key(|it| (it.location.position.y, it.location.position.x, it.unit_id))
            .map_or(true, |first| first.unit_id == item.unit_id)
    }

    fn stashed_for_rule(&self, rule: RuleId, snapshot: &GameSnapshot) -> u32 {
        let count = snapshot
            .by_location(&[LocationKind::Stash, LocationKind::SharedStash])
            .filter(|it| matches!(self.rules.evaluate_ignoring_tiers(it), RuleMatch::Full { rule: r, .. } if r == rule))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn is_keeper(&self, item: &Item) -> bool {
        self.rules.evaluate(item).is_full()
    }

    /// Recipe reservation. Jewels of any quality are held up to the configured
    /// count: stashed copies plus inventory copies ahead of this one in
    /// reading order. Other ingredients must be at most magic and are held
    /// unless the stash already has a non-keeper magic copy.
    fn should_reserve_for_recipe(&self, item: &Item, snapshot: &GameSnapshot) -> bool {
        let is_jewel = item.name == JEWEL;
        if !is_jewel && item.quality > Quality::Magic {
            return false;
        }
        if !self.catalog.is_enabled_ingredient(&item.name, self.config) {
            return false;
        }

        let stash = || snapshot.by_location(&[LocationKind::Stash, LocationKind::SharedStash]);
        if is_jewel {
            let stashed = stash().filter(|it| it.name == JEWEL && !self.is_keeper(it)).count();
            let ahead = snapshot
                .inventory()
                .filter(|it| it.name == JEWEL && !self.is_keeper(it))
                .filter(|it| !item.is_in(LocationKind::Inventory) || reading_order(it) < reading_order(item))
                .count();
            let held = u32::try_from(stashed + ahead).unwrap_or(u32::MAX);
            let keep = held < self.config.cube_recipes.jewels_to_keep;
            debug!(%item, held, limit = self.config.cube_recipes.jewels_to_keep, keep, "jewel reservation");
            return keep;
        }

        !stash().any(|it| {
            it.name.eq_ignore_ascii_case(&item.name) && it.quality == Quality::Magic && !self.is_keeper(it)
        })
    }
}

/// Row, column, then unit id.
fn reading_order(item: &Item) -> (i32, i32, UnitId) {
    (item.location.position.y, item.location.position.x, item.unit_id)
}
