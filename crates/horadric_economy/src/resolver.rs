//! # Recipe Resolver
//!
//! **Decides whether a recipe's ingredients are available right now**
//!
//! Resolution never mutates the pool. A recipe either resolves to the exact
//! units to put in the cube, or is blocked for a reason that is logged at
//! debug level. "Nothing to do" is not an error.
//!
//! ## Generic Matching
//!
//! The generic path is one left-to-right greedy pass over the pool in
//! canonical order (see [`horadric_core::snapshot`]). The first unit of a
//! needed name that is not protected by a keep rule wins. There is no
//! backtracking.
//!
//! ## Specialized Matchers
//!
//! Dispatch is by [`RecipeKind`]. Each specialized matcher replaces the
//! generic path entirely.

use std::collections::HashMap;

use horadric_core::{Item, Quality};
use tracing::{debug, warn};

use crate::catalog::{Recipe, RecipeKind, ResolutionGate, SocketTarget, StockReserve, JEWEL, LEG_ITEM, UNSOCKETABLE_BASES};
use crate::config::CharacterConfig;
use crate::marks::{MarkRegistry, RerollCategory};
use crate::rules::RuleEvaluator;

/// Names whose individual units must be checked against keep rules before
/// they are consumed.
pub const IDENTITY_SENSITIVE: [&str; 13] = [
    JEWEL,
    "Ring",
    "Amulet",
    LEG_ITEM,
    "Wirt'sLeg",
    "MithrilCoil",
    "MeshBelt",
    "VampirefangBelt",
    "HeavyBracers",
    "SharkskinGloves",
    "Armet",
    "SharkskinBelt",
    "VampireboneGloves",
];

/// Perfect gems usable for a magic reroll. Skulls are kept for rare rerolls.
pub const REROLL_PERFECT_GEMS: [&str; 6] = [
    "PerfectDiamond",
    "PerfectEmerald",
    "PerfectRuby",
    "PerfectTopaz",
    "PerfectAmethyst",
    "PerfectSapphire",
];

/// Standard gems usable for the first leg step.
pub const LEG_STEP_GEMS: [&str; 3] = ["Diamond", "Emerald", "Topaz"];

const MAGIC_REROLL_GEMS: usize = 3;
const RARE_REROLL_SKULLS: usize = 6;

/// Why a recipe did not resolve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Blocked {
    /// At least one ingredient count was not met.
    MissingIngredients,
    /// A minimum-stock gate was not met.
    BelowMinimumStock {
        /// Gated item.
        item: String,
        /// Units present.
        have: u32,
        /// Units required.
        need: u32,
    },
    /// A shared reserve is not stocked yet.
    Deferred,
    /// No reroll target is configured.
    NoTarget,
    /// No item in the pool carries the marked fingerprint.
    NoMarkedItem,
    /// The marked item turned out to be a keeper; the mark was cleared.
    MarkCleared,
}

/// Outcome of resolving one recipe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// These units satisfy the recipe.
    Ready(Vec<Item>),
    /// The recipe cannot fire.
    Blocked(Blocked),
}

impl Resolution {
    /// Returns true if the recipe can fire.
    #[inline]
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The resolved units, if any.
    #[must_use]
    pub fn into_items(self) -> Option<Vec<Item>> {
        match self {
            Self::Ready(items) => Some(items),
            Self::Blocked(_) => None,
        }
    }
}

/// Resolves recipes against item pools.
pub struct Resolver<'a> {
    config: &'a CharacterConfig,
    rules: &'a dyn RuleEvaluator,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver.
    #[must_use]
    pub const fn new(config: &'a CharacterConfig, rules: &'a dyn RuleEvaluator) -> Self {
        Self { config, rules }
    }

    fn is_keeper(&self, item: &Item) -> bool {
        self.rules.evaluate(item).is_full()
    }

    fn is_identity_sensitive(&self, name: &str) -> bool {
        let cube = &self.config.cube_recipes;
        IDENTITY_SENSITIVE.contains(&name)
            || (!cube.specific_item_to_reroll.is_empty() && name == cube.specific_item_to_reroll)
            || (!cube.rare_specific_item_to_reroll.is_empty() && name == cube.rare_specific_item_to_reroll)
    }

    /// Resolves `recipe` against `pool` (stash plus shared stash, canonical
    /// order). `inventory` only feeds reserve gates. Reroll matchers may
    /// clear a mark in `marks`; the caller must persist afterwards.
    pub fn resolve(&self, recipe: &Recipe, pool: &[Item], inventory: &[Item], marks: &mut MarkRegistry) -> Resolution {
        let resolution = match recipe.kind {
            RecipeKind::Generic => self.resolve_generic(recipe, pool, inventory),
            RecipeKind::AddSockets(target) => self.resolve_sockets(recipe, target, pool),
            RecipeKind::RerollMagic => self.resolve_reroll(RerollCategory::Magic, pool, marks),
            RecipeKind::RerollRare => self.resolve_reroll(RerollCategory::Rare, pool, marks),
            RecipeKind::LegStep1 => Self::resolve_leg_step1(pool),
            RecipeKind::LegStep2 => self.resolve_leg_step2(pool),
        };
        if let Resolution::Blocked(reason) = &resolution {
            debug!(recipe = %recipe.name, ?reason, "recipe not resolvable");
        }
        resolution
    }

    // ========================================================================
    // GENERIC
    // ========================================================================

    fn resolve_generic(&self, recipe: &Recipe, pool: &[Item], inventory: &[Item]) -> Resolution {
        match &recipe.gate {
            Some(ResolutionGate::MinimumStock { item, count }) => {
                let have = pool.iter().filter(|it| it.name == *item).count() as u32;
                if have < *count {
                    return Resolution::Blocked(Blocked::BelowMinimumStock {
                        item: item.clone(),
                        have,
                        need: *count,
                    });
                }
            }
            Some(ResolutionGate::DeferUntilStocked(reserve)) => {
                if !self.reserve_stocked(reserve, pool, inventory) {
                    return Resolution::Blocked(Blocked::Deferred);
                }
            }
            None => {}
        }

        let mut needed = recipe.requirements();
        let mut remaining: u32 = needed.values().sum();
        let mut chosen = Vec::with_capacity(remaining as usize);

        for item in pool {
            if remaining == 0 {
                break;
            }
            let Some(count) = needed.get_mut(item.name.as_str()) else {
                continue;
            };
            if *count == 0 {
                continue;
            }
            if self.is_identity_sensitive(&item.name) && self.is_keeper(item) {
                continue;
            }
            *count -= 1;
            remaining -= 1;
            chosen.push(item.clone());
        }

        if remaining == 0 {
            Resolution::Ready(chosen)
        } else {
            Resolution::Blocked(Blocked::MissingIngredients)
        }
    }

    fn reserve_stocked(&self, reserve: &StockReserve, pool: &[Item], inventory: &[Item]) -> bool {
        if !reserve.when_enabled.iter().all(|r| self.config.recipe_enabled(r)) {
            return true;
        }
        let combined = || inventory.iter().chain(pool.iter());
        let jewels = combined()
            .filter(|it| it.name == JEWEL && !self.is_keeper(it))
            .count() as u32;
        if jewels < reserve.jewels {
            return false;
        }
        reserve.items.iter().all(|(name, need)| {
            let have = combined().filter(|it| it.name == *name).count() as u32;
            have >= *need
        })
    }

    // ========================================================================
    // SOCKETS
    // ========================================================================

    fn socket_eligible(target: SocketTarget, item: &Item) -> bool {
        item.quality == Quality::Normal
            && !item.has_sockets()
            && item.max_sockets > 0
            && target.accepts(item.item_type)
            && !UNSOCKETABLE_BASES.contains(&item.name.as_str())
    }

    fn resolve_sockets(&self, recipe: &Recipe, target: SocketTarget, pool: &[Item]) -> Resolution {
        let base_slot = target.base_slot();
        let mut catalysts: HashMap<&str, u32> = recipe.requirements();
        catalysts.remove(base_slot);
        let mut remaining: u32 = catalysts.values().sum();
        let mut chosen = Vec::with_capacity(remaining as usize + 1);

        for item in pool {
            if let Some(count) = catalysts.get_mut(item.name.as_str()) {
                if *count > 0 && !(self.is_identity_sensitive(&item.name) && self.is_keeper(item)) {
                    *count -= 1;
                    remaining -= 1;
                    chosen.push(item.clone());
                }
            }
        }
        if remaining > 0 {
            return Resolution::Blocked(Blocked::MissingIngredients);
        }

        let base = pool
            .iter()
            .find(|it| it.name == base_slot)
            .or_else(|| pool.iter().find(|it| Self::socket_eligible(target, it)));
        match base {
            Some(base) => {
                chosen.push(base.clone());
                Resolution::Ready(chosen)
            }
            None => Resolution::Blocked(Blocked::MissingIngredients),
        }
    }

    // ========================================================================
    // REROLLS
    // ========================================================================

    fn resolve_reroll(&self, category: RerollCategory, pool: &[Item], marks: &mut MarkRegistry) -> Resolution {
        if marks.state(category).target.is_empty() {
            return Resolution::Blocked(Blocked::NoTarget);
        }
        let Some(marked) = pool.iter().find(|it| marks.is_marked_as(category, it)) else {
            return Resolution::Blocked(Blocked::NoMarkedItem);
        };
        if self.is_keeper(marked) {
            warn!(item = %marked, "marked item now matches a keep rule, skipping reroll");
            marks.clear(category);
            return Resolution::Blocked(Blocked::MarkCleared);
        }

        let catalysts = match category {
            RerollCategory::Magic => self.pick_perfect_gems(pool),
            RerollCategory::Rare => pool
                .iter()
                .filter(|it| it.name == "PerfectSkull")
                .take(RARE_REROLL_SKULLS)
                .cloned()
                .collect(),
        };
        let required = match category {
            RerollCategory::Magic => MAGIC_REROLL_GEMS,
            RerollCategory::Rare => RARE_REROLL_SKULLS,
        };
        if catalysts.len() < required {
            return Resolution::Blocked(Blocked::MissingIngredients);
        }

        let mut chosen = Vec::with_capacity(required + 1);
        chosen.push(marked.clone());
        chosen.extend(catalysts);
        Resolution::Ready(chosen)
    }

    /// Picks up to three perfect gems. A held-back kind is skipped while its
    /// running count is at or below the reserve, so the first `reserve` units
    /// encountered are never spent. Sapphires are always held back.
    fn pick_perfect_gems(&self, pool: &[Item]) -> Vec<Item> {
        let cube = &self.config.cube_recipes;
        let reserve = cube.perfect_gem_reserve;
        let mut seen: HashMap<&str, u32> = HashMap::new();
        let mut picked = Vec::with_capacity(MAGIC_REROLL_GEMS);

        for item in pool {
            if picked.len() == MAGIC_REROLL_GEMS {
                break;
            }
            let name = item.name.as_str();
            if !REROLL_PERFECT_GEMS.contains(&name) {
                continue;
            }
            let count = seen.entry(name).or_insert(0);
            *count += 1;
            let held_back = match name {
                "PerfectAmethyst" => cube.skip_perfect_amethysts,
                "PerfectRuby" => cube.skip_perfect_rubies,
                "PerfectSapphire" => true,
                _ => false,
            };
            if held_back && *count <= reserve {
                continue;
            }
            picked.push(item.clone());
        }
        picked
    }

    // ========================================================================
    // LEG STEPS
    // ========================================================================

    fn resolve_leg_step1(pool: &[Item]) -> Resolution {
        let leg = pool
            .iter()
            .find(|it| it.name == LEG_ITEM && it.has_sockets() && it.quality <= Quality::Superior);
        let gems: Vec<Item> = pool
            .iter()
            .filter(|it| LEG_STEP_GEMS.contains(&it.name.as_str()))
            .take(3)
            .cloned()
            .collect();
        match leg {
            Some(leg) if gems.len() == 3 => {
                let mut chosen = vec![leg.clone()];
                chosen.extend(gems);
                Resolution::Ready(chosen)
            }
            _ => Resolution::Blocked(Blocked::MissingIngredients),
        }
    }

    fn resolve_leg_step2(&self, pool: &[Item]) -> Resolution {
        let leg = pool
            .iter()
            .find(|it| it.name == LEG_ITEM && it.quality == Quality::Magic && !self.is_keeper(it));
        let rune = pool.iter().find(|it| it.name == "TirRune");
        let gem = pool.iter().find(|it| it.name == "PerfectSapphire");
        let jewel = pool.iter().find(|it| it.name == JEWEL && !self.is_keeper(it));
        match (leg, rune, gem, jewel) {
            (Some(leg), Some(rune), Some(gem), Some(jewel)) => {
                Resolution::Ready(vec![leg.clone(), rune.clone(), gem.clone(), jewel.clone()])
            }
            _ => Resolution::Blocked(Blocked::MissingIngredients),
        }
    }
}
