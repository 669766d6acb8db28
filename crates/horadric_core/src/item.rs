//! # Item Model
//!
//! **The atomic unit every economy decision reasons about**
//!
//! Items are never created by the bot. They are discovered in a snapshot and
//! disappear from a later one once sold, dropped, consumed or transmuted.
//!
//! ## Invariants
//!
//! 1. An item occupies exactly one [`Location`] at a time
//! 2. A location + position pair is unique among co-located items, except on
//!    the ground where several items may share a tile
//! 3. Durability and quantity are mutually exclusive ([`Wear`])

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// IDENTIFIERS
// ============================================================================

/// Ephemeral per-session handle assigned by the game client.
///
/// Zero means "unset". A handle never survives a restart and must never be
/// trusted on its own to re-locate a marked item.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u32);

impl UnitId {
    /// The unset handle.
    pub const UNSET: Self = Self(0);

    /// Returns true if this handle refers to a live unit.
    #[inline]
    #[must_use]
    pub const fn is_set(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// QUALITY
// ============================================================================

/// Item quality tier, ordered for comparisons.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Quality {
    /// Plain base item.
    #[default]
    Normal = 0,
    /// Superior base item.
    Superior = 1,
    /// Magic (blue) item.
    Magic = 2,
    /// Rare (yellow) item.
    Rare = 3,
    /// Set item.
    Set = 4,
    /// Unique item.
    Unique = 5,
    /// Crafted item.
    Crafted = 6,
}

impl Quality {
    /// Returns the display name of this quality.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Superior => "Superior",
            Self::Magic => "Magic",
            Self::Rare => "Rare",
            Self::Set => "Set",
            Self::Unique => "Unique",
            Self::Crafted => "Crafted",
        }
    }
}

// ============================================================================
// ITEM TYPES
// ============================================================================

/// Broad item type family.
///
/// Used as an opaque lookup key. The economy only cares which families can
/// take sockets and which equipment slot a family occupies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum ItemType {
    // Weapons
    Weapon,
    Axe,
    Sword,
    Spear,
    Polearm,
    Mace,
    Bow,
    Wand,
    Staff,
    Scepter,
    Club,
    Hammer,
    Knife,
    Crossbow,
    HandToHand,
    HandToHand2,
    Orb,
    AmazonBow,
    AmazonSpear,
    // Body armor
    Armor,
    // Headgear
    Helm,
    PrimalHelm,
    Pelt,
    Circlet,
    // Shields
    Shield,
    AuricShields,
    VoodooHeads,
    // Other equipment
    Belt,
    Gloves,
    Boots,
    Ring,
    Amulet,
    // Socketables and materials
    Jewel,
    Gem,
    Rune,
    Essence,
    Token,
    Charm,
    // Consumables and utility
    Potion,
    Scroll,
    Tome,
    Key,
    Quest,
    #[default]
    Misc,
}

/// Equipment slot an item type occupies when worn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum EquipSlot {
    Weapon,
    Armor,
    Helm,
    Shield,
    Belt,
    Gloves,
    Boots,
    Ring,
    Amulet,
}

impl ItemType {
    /// Returns true for every weapon family.
    #[must_use]
    pub const fn is_weapon(self) -> bool {
        matches!(
            self,
            Self::Weapon
                | Self::Axe
                | Self::Sword
                | Self::Spear
                | Self::Polearm
                | Self::Mace
                | Self::Bow
                | Self::Wand
                | Self::Staff
                | Self::Scepter
                | Self::Club
                | Self::Hammer
                | Self::Knife
                | Self::Crossbow
                | Self::HandToHand
                | Self::HandToHand2
                | Self::Orb
                | Self::AmazonBow
                | Self::AmazonSpear
        )
    }

    /// Returns true for every headgear family.
    #[must_use]
    pub const fn is_helm(self) -> bool {
        matches!(self, Self::Helm | Self::PrimalHelm | Self::Pelt | Self::Circlet)
    }

    /// Returns true for every shield family.
    #[must_use]
    pub const fn is_shield(self) -> bool {
        matches!(self, Self::Shield | Self::AuricShields | Self::VoodooHeads)
    }

    /// The slot this family is worn in, if it is equipment.
    #[must_use]
    pub const fn equip_slot(self) -> Option<EquipSlot> {
        if self.is_weapon() {
            return Some(EquipSlot::Weapon);
        }
        if self.is_helm() {
            return Some(EquipSlot::Helm);
        }
        if self.is_shield() {
            return Some(EquipSlot::Shield);
        }
        match self {
            Self::Armor => Some(EquipSlot::Armor),
            Self::Belt => Some(EquipSlot::Belt),
            Self::Gloves => Some(EquipSlot::Gloves),
            Self::Boots => Some(EquipSlot::Boots),
            Self::Ring => Some(EquipSlot::Ring),
            Self::Amulet => Some(EquipSlot::Amulet),
            _ => None,
        }
    }
}

// ============================================================================
// LOCATION
// ============================================================================

/// Where an item currently lives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LocationKind {
    /// On the floor.
    #[default]
    Ground,
    /// Player inventory grid.
    Inventory,
    /// Personal stash tab.
    Stash,
    /// Shared stash tabs.
    SharedStash,
    /// Vendor window.
    Vendor,
    /// Horadric cube.
    Cube,
    /// Worn by the player (page 0) or the mercenary (page 1).
    Equipped,
    /// Held on the cursor.
    Cursor,
}

/// Grid position inside a location.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Position {
    /// Creates a new position.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared euclidean distance, exact in integers so ties stay ties.
    #[inline]
    #[must_use]
    pub const fn distance_sq(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        dx * dx + dy * dy
    }
}

/// A location plus page and position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Which container.
    pub kind: LocationKind,
    /// Stash tab or equipment owner. Zero for single-page containers.
    #[serde(default)]
    pub page: u8,
    /// Grid position (world position when on the ground).
    #[serde(default)]
    pub position: Position,
}

impl Location {
    /// Creates a location on page 0.
    #[must_use]
    pub const fn new(kind: LocationKind, position: Position) -> Self {
        Self { kind, page: 0, position }
    }

    /// Creates a location on a specific page.
    #[must_use]
    pub const fn on_page(kind: LocationKind, page: u8, position: Position) -> Self {
        Self { kind, page, position }
    }
}

// ============================================================================
// AFFIXES, STATS, WEAR
// ============================================================================

/// Magic affix identifiers as reported by the client. Zero means "empty".
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Affixes {
    /// Prefix identifiers.
    #[serde(default)]
    pub prefixes: Vec<u16>,
    /// Suffix identifiers.
    #[serde(default)]
    pub suffixes: Vec<u16>,
}

/// One rolled stat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stat {
    /// Stat identifier.
    pub id: u16,
    /// Layer (skill id, element, ...).
    pub layer: u16,
    /// Rolled value.
    pub value: i32,
}

impl Stat {
    /// Creates a new stat triple.
    #[inline]
    #[must_use]
    pub const fn new(id: u16, layer: u16, value: i32) -> Self {
        Self { id, layer, value }
    }
}

/// Durability or stack quantity, depending on item class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Wear {
    /// Neither applies.
    #[default]
    None,
    /// Equipment durability.
    Durability {
        /// Current durability.
        current: u16,
        /// Maximum durability.
        max: u16,
    },
    /// Stack size (keys, arrows, tomes).
    Quantity(u16),
}

// ============================================================================
// ITEM
// ============================================================================

/// An observed item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    /// Session handle.
    pub unit_id: UnitId,
    /// Stable base name, e.g. `"PerfectRuby"` or `"WirtsLeg"`.
    pub name: String,
    /// Type family.
    pub item_type: ItemType,
    /// Quality tier.
    pub quality: Quality,
    /// Whether the item has been identified.
    pub identified: bool,
    /// Identified display name, empty when unknown.
    pub identified_name: String,
    /// Magic affixes.
    pub affixes: Affixes,
    /// Rolled stats in client enumeration order.
    pub stats: Vec<Stat>,
    /// Ethereal flag.
    pub ethereal: bool,
    /// Current socket count.
    pub sockets: u8,
    /// Maximum sockets the base can hold.
    pub max_sockets: u8,
    /// Where the item is.
    pub location: Location,
    /// Runeword name, if part of an assembled runeword.
    pub runeword: Option<String>,
    /// Durability or quantity.
    pub wear: Wear,
    /// Broken flag.
    pub broken: bool,
    /// Quest flag.
    pub quest: bool,
}

impl Item {
    /// Creates an item with the given identity and defaults elsewhere.
    #[must_use]
    pub fn new(unit_id: u32, name: impl Into<String>, item_type: ItemType, quality: Quality) -> Self {
        Self {
            unit_id: UnitId(unit_id),
            name: name.into(),
            item_type,
            quality,
            identified: true,
            ..Self::default()
        }
    }

    /// Places the item.
    #[must_use]
    pub const fn at(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Sets the identified display name.
    #[must_use]
    pub fn with_identified_name(mut self, name: impl Into<String>) -> Self {
        self.identified_name = name.into();
        self.identified = true;
        self
    }

    /// Marks the item as unidentified.
    #[must_use]
    pub fn unidentified(mut self) -> Self {
        self.identified = false;
        self.identified_name.clear();
        self
    }

    /// Sets the magic affixes.
    #[must_use]
    pub fn with_affixes(mut self, prefixes: &[u16], suffixes: &[u16]) -> Self {
        self.affixes = Affixes {
            prefixes: prefixes.to_vec(),
            suffixes: suffixes.to_vec(),
        };
        self
    }

    /// Sets the stats.
    #[must_use]
    pub fn with_stats(mut self, stats: Vec<Stat>) -> Self {
        self.stats = stats;
        self
    }

    /// Sets socket state.
    #[must_use]
    pub const fn with_sockets(mut self, sockets: u8, max_sockets: u8) -> Self {
        self.sockets = sockets;
        self.max_sockets = max_sockets;
        self
    }

    /// Flags the item as part of a runeword.
    #[must_use]
    pub fn with_runeword(mut self, name: impl Into<String>) -> Self {
        self.runeword = Some(name.into());
        self
    }

    /// Flags the item as a quest item.
    #[must_use]
    pub const fn as_quest(mut self) -> Self {
        self.quest = true;
        self
    }

    /// Sets stack quantity.
    #[must_use]
    pub const fn with_quantity(mut self, quantity: u16) -> Self {
        self.wear = Wear::Quantity(quantity);
        self
    }

    /// Sets durability.
    #[must_use]
    pub const fn with_durability(mut self, current: u16, max: u16) -> Self {
        self.wear = Wear::Durability { current, max };
        self
    }

    /// Returns true if the item is in the given location kind.
    #[inline]
    #[must_use]
    pub fn is_in(&self, kind: LocationKind) -> bool {
        self.location.kind == kind
    }

    /// Returns true if the item is in either stash.
    #[inline]
    #[must_use]
    pub fn is_stashed(&self) -> bool {
        matches!(self.location.kind, LocationKind::Stash | LocationKind::SharedStash)
    }

    /// Returns true if the item has at least one socket.
    #[inline]
    #[must_use]
    pub const fn has_sockets(&self) -> bool {
        self.sockets > 0
    }

    /// Returns true if the item is part of a runeword.
    #[inline]
    #[must_use]
    pub const fn is_runeword(&self) -> bool {
        self.runeword.is_some()
    }

    /// Returns true for potions.
    #[inline]
    #[must_use]
    pub fn is_potion(&self) -> bool {
        self.item_type == ItemType::Potion
    }

    /// Stack quantity, 1 for unstackable items.
    #[must_use]
    pub const fn quantity(&self) -> u16 {
        match self.wear {
            Wear::Quantity(q) => q,
            _ => 1,
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.quality.name(), self.unit_id)
    }
}
