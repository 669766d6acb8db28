//! # Game Snapshot
//!
//! An already-parsed, read-only view of everything the economy needs: items
//! by location, player state and nearby monster records.
//!
//! ## Canonical Pool Order
//!
//! Resolution is a single greedy pass, so which unit is consumed when several
//! share a name depends on iteration order. Every pool handed out by this
//! module is sorted the same way: personal stash before shared stash, then
//! page, then row, then column, then unit handle.

use serde::{Deserialize, Serialize};

use crate::item::{Item, LocationKind, Position, UnitId};

/// Game difficulty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    /// Normal difficulty.
    #[default]
    Normal,
    /// Nightmare difficulty.
    Nightmare,
    /// Hell difficulty.
    Hell,
}

impl Difficulty {
    /// Index into difficulty-keyed tables.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Normal => 0,
            Self::Nightmare => 1,
            Self::Hell => 2,
        }
    }
}

/// Area identifier, an opaque lookup key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaId(pub u32);

/// Monster rank.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum MonsterRank {
    #[default]
    Normal,
    Champion,
    Unique,
    SuperUnique,
}

/// The kind of a nearby level source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceKind {
    /// The corpse of a monster killed recently.
    Corpse,
    /// A recently destroyed monster that left no corpse.
    Shattered,
    /// A chest or other container.
    Container,
}

/// A corpse, shattered-monster record, or container near the player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearbyObject {
    /// What kind of source this is.
    pub kind: SourceKind,
    /// Monster name for corpses and shattered records.
    #[serde(default)]
    pub monster: Option<String>,
    /// Monster rank for corpses and shattered records.
    #[serde(default)]
    pub rank: MonsterRank,
    /// World position.
    pub position: Position,
}

/// Player state relevant to the economy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerState {
    /// Character level.
    pub level: u32,
    /// World position.
    pub position: Position,
    /// Current area.
    pub area: AreaId,
    /// Whether the current area is terrorized.
    pub terrorized: bool,
    /// Current difficulty.
    pub difficulty: Difficulty,
    /// Whether a vendor window is open.
    pub vendor_open: bool,
}

/// A full snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSnapshot {
    /// Every observed item.
    pub items: Vec<Item>,
    /// Player state.
    pub player: PlayerState,
    /// Nearby corpses, shattered records and containers.
    pub nearby: Vec<NearbyObject>,
}

impl GameSnapshot {
    /// Items in any of the given locations, in snapshot order.
    pub fn by_location<'a>(&'a self, kinds: &'a [LocationKind]) -> impl Iterator<Item = &'a Item> + 'a {
        self.items.iter().filter(move |it| kinds.contains(&it.location.kind))
    }

    /// Inventory items, in snapshot order.
    pub fn inventory(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|it| it.is_in(LocationKind::Inventory))
    }

    /// Personal plus shared stash, in canonical pool order.
    #[must_use]
    pub fn stash_pool(&self) -> Vec<Item> {
        let mut pool: Vec<Item> = self.items.iter().filter(|it| it.is_stashed()).cloned().collect();
        sort_canonical(&mut pool);
        pool
    }

    /// Looks up an item by session handle.
    #[must_use]
    pub fn find(&self, unit: UnitId) -> Option<&Item> {
        if !unit.is_set() {
            return None;
        }
        self.items.iter().find(|it| it.unit_id == unit)
    }

    /// Counts items with the given name in the given locations.
    #[must_use]
    pub fn count_named(&self, name: &str, kinds: &[LocationKind]) -> usize {
        self.by_location(kinds).filter(|it| it.name == name).count()
    }
}

const fn location_rank(kind: LocationKind) -> u8 {
    match kind {
        LocationKind::Stash => 0,
        LocationKind::SharedStash => 1,
        LocationKind::Inventory => 2,
        LocationKind::Cube => 3,
        LocationKind::Cursor => 4,
        LocationKind::Equipped => 5,
        LocationKind::Vendor => 6,
        LocationKind::Ground => 7,
    }
}

/// Sorts items into canonical pool order.
pub fn sort_canonical(items: &mut [Item]) {
    items.sort_by_key(|it| {
        (
            location_rank(it.location.kind),
            it.location.page,
            it.location.position.y,
            it.location.position.x,
            it.unit_id,
        )
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemType, Location, Quality};

    fn gem(unit: u32, kind: LocationKind, page: u8, x: i32, y: i32) -> Item {
        Item::new(unit, "Topaz", ItemType::Gem, Quality::Normal)
            .at(Location::on_page(kind, page, Position::new(x, y)))
    }

    #[test]
    fn test_stash_pool_canonical_order() {
        let snap = GameSnapshot {
            items: vec![
                gem(1, LocationKind::SharedStash, 1, 0, 0),
                gem(2, LocationKind::Stash, 0, 5, 1),
                gem(3, LocationKind::Stash, 0, 9, 0),
                gem(4, LocationKind::Inventory, 0, 0, 0),
                gem(5, LocationKind::SharedStash, 0, 0, 0),
            ],
            ..GameSnapshot::default()
        };
        let ids: Vec<u32> = snap.stash_pool().iter().map(|it| it.unit_id.0).collect();
        assert_eq!(ids, vec![3, 2, 5, 1]);
    }

    #[test]
    fn test_find_ignores_unset_handle() {
        let mut unset = gem(0, LocationKind::Stash, 0, 0, 0);
        unset.unit_id = UnitId::UNSET;
        let snap = GameSnapshot {
            items: vec![unset],
            ..GameSnapshot::default()
        };
        assert!(snap.find(UnitId::UNSET).is_none());
    }

    #[test]
    fn test_count_named() {
        let snap = GameSnapshot {
            items: vec![
                gem(1, LocationKind::Stash, 0, 0, 0),
                gem(2, LocationKind::Inventory, 0, 0, 0),
            ],
            ..GameSnapshot::default()
        };
        assert_eq!(snap.count_named("Topaz", &[LocationKind::Stash]), 1);
        assert_eq!(snap.count_named("Topaz", &[LocationKind::Stash, LocationKind::Inventory]), 2);
    }

    #[test]
    fn test_difficulty_index() {
        assert_eq!(Difficulty::Hell.index(), 2);
    }
}
