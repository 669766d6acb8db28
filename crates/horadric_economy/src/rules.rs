//! # Keep Rules
//!
//! The user's declarative item filter, consumed through [`RuleEvaluator`].
//!
//! A rule either fully matches an item (the item is a *keeper*), partially
//! matches it (it would match once identified), or does not match. Tier
//! rules are a separate family used only for equipment upgrade comparisons.
//!
//! [`RuleSet`] is a small built-in evaluator loaded from TOML:
//!
//! ```toml
//! [[rules]]
//! name = "Ring"
//! min_quality = "Rare"
//! stats = [{ id = 105, min = 10 }]
//!
//! [[rules]]
//! item_type = "Jewel"
//! max_quantity = 4
//!
//! [[rules]]
//! item_type = "Armor"
//! tier = 3
//! ```

use serde::{Deserialize, Serialize};

use horadric_core::{GameSnapshot, Item, ItemType, LocationKind, Quality};

use crate::error::{EconomyError, EconomyResult};

/// Index of a rule within its rule set.
pub type RuleId = usize;

/// Outcome of matching one item against the keep rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleMatch {
    /// No rule applies.
    NoMatch,
    /// A rule would apply once the item is identified.
    Partial,
    /// A rule applies: the item is a keeper.
    Full {
        /// The matching rule.
        rule: RuleId,
        /// Maximum units this rule wants kept, if capped.
        max_quantity: Option<u32>,
    },
}

impl RuleMatch {
    /// Returns true for a full match.
    #[inline]
    #[must_use]
    pub const fn is_full(self) -> bool {
        matches!(self, Self::Full { .. })
    }
}

/// Who would wear an upgrade.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wearer {
    /// The player character, equipped page 0.
    Player,
    /// The hired mercenary, equipped page 1.
    Mercenary,
}

impl Wearer {
    /// Equipment page for this wearer.
    #[must_use]
    pub const fn page(self) -> u8 {
        match self {
            Self::Player => 0,
            Self::Mercenary => 1,
        }
    }
}

/// Highest tier-rule scores for one item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TierMatch {
    /// Player tier, zero when no tier rule applies.
    pub player: u32,
    /// Mercenary tier, zero when no tier rule applies.
    pub mercenary: u32,
}

impl TierMatch {
    /// Tier for one wearer.
    #[must_use]
    pub const fn for_wearer(self, wearer: Wearer) -> u32 {
        match wearer {
            Wearer::Player => self.player,
            Wearer::Mercenary => self.mercenary,
        }
    }
}

/// The rule-evaluation seam.
pub trait RuleEvaluator {
    /// Matches against every rule, tier rules included.
    fn evaluate(&self, item: &Item) -> RuleMatch;

    /// Matches against the keep rules only, ignoring tier rules.
    fn evaluate_ignoring_tiers(&self, item: &Item) -> RuleMatch;

    /// Highest applicable tier for each wearer.
    fn tier(&self, item: &Item) -> TierMatch;

    /// Returns true if `item` beats what `wearer` has equipped in the same
    /// slot. An empty slot is beaten by any positive tier.
    fn is_upgrade(&self, item: &Item, wearer: Wearer, snapshot: &GameSnapshot) -> bool {
        let Some(slot) = item.item_type.equip_slot() else {
            return false;
        };
        let candidate = self.tier(item).for_wearer(wearer);
        if candidate == 0 {
            return false;
        }
        let equipped = snapshot
            .by_location(&[LocationKind::Equipped])
            .filter(|eq| eq.location.page == wearer.page() && eq.item_type.equip_slot() == Some(slot))
            .map(|eq| self.tier(eq).for_wearer(wearer))
            .min();
        equipped.map_or(true, |current| candidate > current)
    }
}

// ============================================================================
// DECLARATIVE RULE SET
// ============================================================================

/// Minimum value for one stat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatCondition {
    /// Stat identifier.
    pub id: u16,
    /// Optional layer; any layer when absent.
    #[serde(default)]
    pub layer: Option<u16>,
    /// Minimum value, inclusive.
    pub min: i32,
}

/// One declarative rule.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepRule {
    /// Exact base name.
    pub name: Option<String>,
    /// Type family.
    pub item_type: Option<ItemType>,
    /// Minimum quality, inclusive.
    pub min_quality: Option<Quality>,
    /// Maximum quality, inclusive.
    pub max_quality: Option<Quality>,
    /// Ethereal requirement.
    pub ethereal: Option<bool>,
    /// Stat minimums; require identification.
    pub stats: Vec<StatCondition>,
    /// Maximum units to keep.
    pub max_quantity: Option<u32>,
    /// Player tier; makes this a tier rule.
    pub tier: Option<u32>,
    /// Mercenary tier; makes this a tier rule.
    pub mercenary_tier: Option<u32>,
}

impl KeepRule {
    /// Returns true if this is a tier rule.
    #[must_use]
    pub const fn is_tier_rule(&self) -> bool {
        self.tier.is_some() || self.mercenary_tier.is_some()
    }

    fn matches_base(&self, item: &Item) -> bool {
        self.name.as_ref().map_or(true, |n| *n == item.name)
            && self.item_type.map_or(true, |t| t == item.item_type)
            && self.min_quality.map_or(true, |q| item.quality >= q)
            && self.max_quality.map_or(true, |q| item.quality <= q)
            && self.ethereal.map_or(true, |e| e == item.ethereal)
    }

    fn matches_stats(&self, item: &Item) -> bool {
        self.stats.iter().all(|cond| {
            item.stats
                .iter()
                .any(|s| s.id == cond.id && cond.layer.map_or(true, |l| l == s.layer) && s.value >= cond.min)
        })
    }

    fn check(&self, item: &Item) -> Option<bool> {
        if !self.matches_base(item) {
            return None;
        }
        if self.stats.is_empty() {
            return Some(true);
        }
        if !item.identified {
            return Some(false);
        }
        self.matches_stats(item).then_some(true)
    }
}

/// A list of declarative rules, evaluated in order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    /// The rules.
    #[serde(default)]
    pub rules: Vec<KeepRule>,
}

impl RuleSet {
    /// Creates a rule set.
    #[must_use]
    pub const fn new(rules: Vec<KeepRule>) -> Self {
        Self { rules }
    }

    /// Parses a rule set from TOML.
    ///
    /// # Errors
    ///
    /// Returns error if the TOML is malformed.
    pub fn from_toml(content: &str) -> EconomyResult<Self> {
        toml::from_str(content).map_err(|e| EconomyError::InvalidConfig(format!("rule set: {e}")))
    }

    fn first_match(&self, item: &Item, include_tiers: bool) -> RuleMatch {
        let mut partial = false;
        for (id, rule) in self.rules.iter().enumerate() {
            if !include_tiers && rule.is_tier_rule() {
                continue;
            }
            match rule.check(item) {
                Some(true) => {
                    return RuleMatch::Full {
                        rule: id,
                        max_quantity: rule.max_quantity,
                    }
                }
                Some(false) => partial = true,
                None => {}
            }
        }
        if partial {
            RuleMatch::Partial
        } else {
            RuleMatch::NoMatch
        }
    }
}

impl RuleEvaluator for RuleSet {
    fn evaluate(&self, item: &Item) -> RuleMatch {
        self.first_match(item, true)
    }

    fn evaluate_ignoring_tiers(&self, item: &Item) -> RuleMatch {
        self.first_match(item, false)
    }

    fn tier(&self, item: &Item) -> TierMatch {
        self.rules
            .iter()
            .filter(|rule| rule.is_tier_rule() && rule.check(item) == Some(true))
            .fold(TierMatch::default(), |acc, rule| TierMatch {
                player: acc.player.max(rule.tier.unwrap_or(0)),
                mercenary: acc.mercenary.max(rule.mercenary_tier.unwrap_or(0)),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use horadric_core::{Location, Position, Stat};

    fn rules() -> RuleSet {
        RuleSet::from_toml(
            r#"
            [[rules]]
            name = "Ring"
            min_quality = "Rare"
            stats = [{ id = 105, min = 10 }]

            [[rules]]
            item_type = "Jewel"
            max_quantity = 2

            [[rules]]
            item_type = "Armor"
            tier = 3

            [[rules]]
            item_type = "Armor"
            min_quality = "Magic"
            tier = 5
            mercenary_tier = 2
            "#,
        )
        .unwrap()
    }

    #[test]
    fn test_full_match_with_stats() {
        let ring = Item::new(1, "Ring", ItemType::Ring, Quality::Rare).with_stats(vec![Stat::new(105, 0, 12)]);
        assert_eq!(rules().evaluate(&ring), RuleMatch::Full { rule: 0, max_quantity: None });
    }

    #[test]
    fn test_unidentified_is_partial() {
        let ring = Item::new(1, "Ring", ItemType::Ring, Quality::Rare).unidentified();
        assert_eq!(rules().evaluate(&ring), RuleMatch::Partial);
    }

    #[test]
    fn test_quantity_cap_reported() {
        let jewel = Item::new(1, "Jewel", ItemType::Jewel, Quality::Magic);
        assert_eq!(
            rules().evaluate_ignoring_tiers(&jewel),
            RuleMatch::Full { rule: 1, max_quantity: Some(2) }
        );
    }

    #[test]
    fn test_ignoring_tiers_skips_tier_rules() {
        let armor = Item::new(1, "Mage Plate", ItemType::Armor, Quality::Magic);
        assert!(rules().evaluate(&armor).is_full());
        assert_eq!(rules().evaluate_ignoring_tiers(&armor), RuleMatch::NoMatch);
    }

    #[test]
    fn test_tier_takes_highest() {
        let armor = Item::new(1, "Mage Plate", ItemType::Armor, Quality::Magic);
        assert_eq!(rules().tier(&armor), TierMatch { player: 5, mercenary: 2 });
    }

    #[test]
    fn test_upgrade_against_equipped() {
        let set = rules();
        let worn = Item::new(2, "Quilted", ItemType::Armor, Quality::Normal)
            .at(Location::on_page(LocationKind::Equipped, 0, Position::default()));
        let snapshot = GameSnapshot {
            items: vec![worn],
            ..GameSnapshot::default()
        };
        let better = Item::new(1, "Mage Plate", ItemType::Armor, Quality::Magic);
        let same = Item::new(3, "Quilted", ItemType::Armor, Quality::Normal);
        assert!(set.is_upgrade(&better, Wearer::Player, &snapshot));
        assert!(!set.is_upgrade(&same, Wearer::Player, &snapshot));
        // Mercenary slot is empty, any positive tier wins.
        assert!(set.is_upgrade(&better, Wearer::Mercenary, &snapshot));
    }

    #[test]
    fn test_non_equipment_never_upgrade() {
        let jewel = Item::new(1, "Jewel", ItemType::Jewel, Quality::Magic);
        assert!(!rules().is_upgrade(&jewel, Wearer::Player, &GameSnapshot::default()));
    }
}
