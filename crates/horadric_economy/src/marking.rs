//! # Ground-Item Marking
//!
//! **Monster-level assessment for new reroll targets**
//!
//! A ground item of the reroll target's name and quality becomes the marked
//! item only if the monster level where it dropped lies inside the
//! configured window. The level is derived from the nearest level source
//! within [`SEARCH_RADIUS`] of the item:
//!
//! | Source | Level |
//! |---|---|
//! | Corpse / shattered record | monster table by difficulty, +2 champion, +3 unique |
//! | Container | area table by difficulty |
//! | Any, in a terrorized area | character level + rank bonus, capped per difficulty |
//!
//! Sources are ranked by distance, then by [`SourceKind`] order (corpse,
//! shattered, container). When equally near sources disagree on level, the
//! highest-ranked one inside the window wins; if none is inside, the mark is
//! withheld.

use serde::Deserialize;
use std::collections::HashMap;

use horadric_core::{Difficulty, GameSnapshot, Item, MonsterRank, NearbyObject, PlayerState, SourceKind};
use tracing::{info, warn};

use crate::error::{EconomyError, EconomyResult};
use crate::marks::{MarkRegistry, RerollCategory};

/// Search radius around the dropped item.
pub const SEARCH_RADIUS: i64 = 50;

/// Terrorized monster level caps for normal, nightmare and hell.
pub const TERROR_LEVEL_CAPS: [u32; 3] = [45, 71, 96];

// ============================================================================
// LEVEL TABLES
// ============================================================================

#[derive(Deserialize)]
struct RawTables {
    #[serde(default)]
    monsters: HashMap<String, [u32; 3]>,
    #[serde(default)]
    areas: HashMap<String, [u32; 3]>,
}

/// Difficulty-indexed monster and area levels.
///
/// ```toml
/// [monsters]
/// Fallen = [1, 37, 67]
///
/// [areas]
/// 8 = [5, 36, 67]
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelTables {
    monsters: HashMap<String, [u32; 3]>,
    areas: HashMap<u32, [u32; 3]>,
}

impl LevelTables {
    /// Parses tables from TOML.
    ///
    /// # Errors
    ///
    /// Returns error if the TOML is malformed or an area key is not a number.
    pub fn from_toml(content: &str) -> EconomyResult<Self> {
        let raw: RawTables =
            toml::from_str(content).map_err(|e| EconomyError::InvalidConfig(format!("level tables: {e}")))?;
        let mut areas = HashMap::with_capacity(raw.areas.len());
        for (key, levels) in raw.areas {
            let id: u32 = key
                .parse()
                .map_err(|_| EconomyError::InvalidConfig(format!("area key is not a number: {key}")))?;
            areas.insert(id, levels);
        }
        Ok(Self {
            monsters: raw.monsters,
            areas,
        })
    }

    /// Adds a monster entry.
    #[must_use]
    pub fn with_monster(mut self, name: impl Into<String>, levels: [u32; 3]) -> Self {
        self.monsters.insert(name.into(), levels);
        self
    }

    /// Adds an area entry.
    #[must_use]
    pub fn with_area(mut self, area: u32, levels: [u32; 3]) -> Self {
        self.areas.insert(area, levels);
        self
    }

    /// Table level of a monster.
    #[must_use]
    pub fn monster_level(&self, name: &str, difficulty: Difficulty) -> Option<u32> {
        self.monsters.get(name).map(|levels| levels[difficulty.index()])
    }

    /// Table level of an area.
    #[must_use]
    pub fn area_level(&self, area: u32, difficulty: Difficulty) -> Option<u32> {
        self.areas.get(&area).map(|levels| levels[difficulty.index()])
    }
}

// ============================================================================
// LEVEL COMPUTATION
// ============================================================================

const fn terror_bonus(rank: MonsterRank) -> u32 {
    match rank {
        MonsterRank::Normal => 2,
        MonsterRank::Champion => 4,
        MonsterRank::Unique | MonsterRank::SuperUnique => 5,
    }
}

const fn table_bonus(rank: MonsterRank) -> u32 {
    match rank {
        MonsterRank::Champion => 2,
        MonsterRank::Unique => 3,
        MonsterRank::Normal | MonsterRank::SuperUnique => 0,
    }
}

/// Terrorized level for a source of the given rank.
#[must_use]
pub fn terror_level(character_level: u32, rank: MonsterRank, difficulty: Difficulty) -> u32 {
    (character_level + terror_bonus(rank)).min(TERROR_LEVEL_CAPS[difficulty.index()])
}

/// Effective monster level for one source, by kind.
#[must_use]
pub fn effective_level(source: &NearbyObject, player: &PlayerState, tables: &LevelTables) -> Option<u32> {
    let rank = match source.kind {
        SourceKind::Container => MonsterRank::Normal,
        SourceKind::Corpse | SourceKind::Shattered => source.rank,
    };
    if player.terrorized {
        return Some(terror_level(player.level, rank, player.difficulty));
    }
    match source.kind {
        SourceKind::Corpse | SourceKind::Shattered => {
            let name = source.monster.as_deref()?;
            tables
                .monster_level(name, player.difficulty)
                .map(|level| level + table_bonus(rank))
        }
        SourceKind::Container => tables.area_level(player.area.0, player.difficulty),
    }
}

// ============================================================================
// ASSESSMENT
// ============================================================================

/// Outcome of assessing a ground item for marking.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Assessment {
    /// The item is marked.
    Accepted {
        /// Level used.
        level: u32,
        /// Source the level came from, `None` for a sourceless terror zone.
        source: Option<SourceKind>,
    },
    /// A mark already exists for this category.
    AlreadyMarked,
    /// The item is not the configured target.
    NotTarget,
    /// No level could be determined.
    NoLevel,
    /// Equally near sources disagree and none is inside the window.
    Disagreement,
    /// The level is outside the window.
    OutOfWindow {
        /// Level found.
        level: u32,
        /// Source the level came from.
        source: Option<SourceKind>,
    },
}

struct Candidate<'a> {
    object: &'a NearbyObject,
    distance_sq: i64,
}

fn nearest_per_kind<'a>(item: &Item, nearby: &'a [NearbyObject]) -> Vec<Candidate<'a>> {
    let origin = item.location.position;
    let limit = SEARCH_RADIUS * SEARCH_RADIUS;
    let mut best: Vec<Candidate<'a>> = Vec::with_capacity(3);
    for kind in [SourceKind::Corpse, SourceKind::Shattered, SourceKind::Container] {
        let nearest = nearby
            .iter()
            .filter(|obj| obj.kind == kind)
            .map(|obj| Candidate {
                object: obj,
                distance_sq: obj.position.distance_sq(origin),
            })
            .filter(|c| c.distance_sq <= limit)
            .fold(None::<Candidate<'a>>, |acc, c| match acc {
                Some(a) if a.distance_sq <= c.distance_sq => Some(a),
                _ => Some(c),
            });
        best.extend(nearest);
    }
    best.sort_by_key(|c| (c.distance_sq, c.object.kind));
    best
}

/// Determines the level for a ground item without touching any mark.
#[must_use]
pub fn assess_level(item: &Item, snapshot: &GameSnapshot, window: &std::ops::RangeInclusive<u32>, tables: &LevelTables) -> Assessment {
    let player = &snapshot.player;
    let candidates = nearest_per_kind(item, &snapshot.nearby);

    let Some(first) = candidates.first() else {
        if player.terrorized {
            let level = terror_level(player.level, MonsterRank::Normal, player.difficulty);
            return in_window(level, None, window);
        }
        return Assessment::NoLevel;
    };

    let tied: Vec<(SourceKind, Option<u32>)> = candidates
        .iter()
        .take_while(|c| c.distance_sq == first.distance_sq)
        .map(|c| (c.object.kind, effective_level(c.object, player, tables)))
        .collect();

    let known: Vec<(SourceKind, u32)> = tied.iter().filter_map(|&(k, l)| l.map(|l| (k, l))).collect();
    let disagree = known.windows(2).any(|w| w[0].1 != w[1].1);

    if disagree {
        return known
            .iter()
            .find(|(_, level)| window.contains(level))
            .map_or(Assessment::Disagreement, |&(kind, level)| Assessment::Accepted {
                level,
                source: Some(kind),
            });
    }

    match tied[0] {
        (kind, Some(level)) => in_window(level, Some(kind), window),
        (_, None) => Assessment::NoLevel,
    }
}

fn in_window(level: u32, source: Option<SourceKind>, window: &std::ops::RangeInclusive<u32>) -> Assessment {
    if window.contains(&level) {
        Assessment::Accepted { level, source }
    } else {
        Assessment::OutOfWindow { level, source }
    }
}

/// Marks `item` for `category` if it is the target, no mark exists, and the
/// drop level is acceptable. Only the session handle is set here; the
/// fingerprint is bound after identification.
pub fn mark_if_eligible(
    item: &Item,
    category: RerollCategory,
    snapshot: &GameSnapshot,
    marks: &mut MarkRegistry,
    tables: &LevelTables,
) -> Assessment {
    if marks.state(category).is_active() {
        return Assessment::AlreadyMarked;
    }
    if !marks.fingerprint_category(category).admits(item) {
        return Assessment::NotTarget;
    }
    let assessment = assess_level(item, snapshot, &marks.level_window(), tables);
    match &assessment {
        Assessment::Accepted { level, source } => {
            info!(item = %item, level, ?source, "marked ground item for reroll");
            marks.set_handle(category, item.unit_id);
        }
        other => warn!(item = %item, outcome = ?other, "ground item not marked"),
    }
    assessment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CharacterConfig;
    use horadric_core::{AreaId, ItemType, Location, LocationKind, Position, Quality, UnitId};

    fn tables() -> LevelTables {
        LevelTables::from_toml(
            r#"
            [monsters]
            Fallen = [1, 37, 67]
            Baal = [60, 80, 99]

            [areas]
            8 = [5, 36, 85]
            "#,
        )
        .unwrap()
    }

    fn amulet() -> Item {
        Item::new(77, "Amulet", ItemType::Amulet, Quality::Magic)
            .at(Location::new(LocationKind::Ground, Position::new(100, 100)))
    }

    fn corpse(name: &str, rank: MonsterRank, x: i32, y: i32) -> NearbyObject {
        NearbyObject {
            kind: SourceKind::Corpse,
            monster: Some(name.into()),
            rank,
            position: Position::new(x, y),
        }
    }

    fn object(kind: SourceKind, name: Option<&str>, x: i32, y: i32) -> NearbyObject {
        NearbyObject {
            kind,
            monster: name.map(Into::into),
            rank: MonsterRank::Normal,
            position: Position::new(x, y),
        }
    }

    fn snapshot(nearby: Vec<NearbyObject>) -> GameSnapshot {
        GameSnapshot {
            nearby,
            player: PlayerState {
                level: 90,
                area: AreaId(8),
                difficulty: Difficulty::Hell,
                ..PlayerState::default()
            },
            ..GameSnapshot::default()
        }
    }

    fn registry(min: u32, max: u32) -> MarkRegistry {
        let mut config = CharacterConfig::default();
        config.cube_recipes.specific_item_to_reroll = "Amulet".into();
        config.cube_recipes.min_monster_level = min;
        config.cube_recipes.max_monster_level = max;
        MarkRegistry::from_config(&config)
    }

    #[test]
    fn test_area_keys_must_be_numbers() {
        assert!(LevelTables::from_toml("[areas]\nblood_moor = [1, 2, 3]").is_err());
    }

    #[test]
    fn test_table_level_with_rank_bonus() {
        let player = snapshot(vec![]).player;
        let champ = corpse("Fallen", MonsterRank::Champion, 0, 0);
        let unique = corpse("Fallen", MonsterRank::Unique, 0, 0);
        assert_eq!(effective_level(&champ, &player, &tables()), Some(69));
        assert_eq!(effective_level(&unique, &player, &tables()), Some(70));
        let unknown = corpse("Nobody", MonsterRank::Normal, 0, 0);
        assert_eq!(effective_level(&unknown, &player, &tables()), None);
    }

    #[test]
    fn test_terror_formula_caps() {
        assert_eq!(terror_level(40, MonsterRank::Normal, Difficulty::Normal), 42);
        assert_eq!(terror_level(44, MonsterRank::Champion, Difficulty::Normal), 45);
        assert_eq!(terror_level(70, MonsterRank::SuperUnique, Difficulty::Nightmare), 71);
        assert_eq!(terror_level(95, MonsterRank::Unique, Difficulty::Hell), 96);
    }

    #[test]
    fn test_accepts_nearest_corpse() {
        let mut marks = registry(60, 99);
        let snap = snapshot(vec![
            corpse("Fallen", MonsterRank::Normal, 110, 100),
            object(SourceKind::Container, None, 130, 100),
        ]);
        let result = mark_if_eligible(&amulet(), RerollCategory::Magic, &snap, &mut marks, &tables());
        assert_eq!(result, Assessment::Accepted { level: 67, source: Some(SourceKind::Corpse) });
        assert_eq!(marks.state(RerollCategory::Magic).handle, UnitId(77));
    }

    #[test]
    fn test_out_of_window_not_marked() {
        let mut marks = registry(80, 99);
        let snap = snapshot(vec![corpse("Fallen", MonsterRank::Normal, 105, 100)]);
        let result = mark_if_eligible(&amulet(), RerollCategory::Magic, &snap, &mut marks, &tables());
        assert_eq!(result, Assessment::OutOfWindow { level: 67, source: Some(SourceKind::Corpse) });
        assert!(!marks.state(RerollCategory::Magic).is_active());
    }

    #[test]
    fn test_sources_beyond_radius_ignored() {
        let mut marks = registry(0, 99);
        let snap = snapshot(vec![corpse("Fallen", MonsterRank::Normal, 151, 100)]);
        let result = mark_if_eligible(&amulet(), RerollCategory::Magic, &snap, &mut marks, &tables());
        assert_eq!(result, Assessment::NoLevel);
    }

    #[test]
    fn test_tie_prefers_in_window_source() {
        // Corpse says 67, container says 85; both at distance 10.
        let mut marks = registry(80, 90);
        let snap = snapshot(vec![
            corpse("Fallen", MonsterRank::Normal, 110, 100),
            object(SourceKind::Container, None, 100, 110),
        ]);
        let result = mark_if_eligible(&amulet(), RerollCategory::Magic, &snap, &mut marks, &tables());
        assert_eq!(result, Assessment::Accepted { level: 85, source: Some(SourceKind::Container) });
    }

    #[test]
    fn test_tie_with_no_in_window_source_withheld() {
        let mut marks = registry(70, 80);
        let snap = snapshot(vec![
            corpse("Fallen", MonsterRank::Normal, 110, 100),
            object(SourceKind::Container, None, 100, 110),
        ]);
        let result = mark_if_eligible(&amulet(), RerollCategory::Magic, &snap, &mut marks, &tables());
        assert_eq!(result, Assessment::Disagreement);
        assert!(!marks.state(RerollCategory::Magic).is_active());
    }

    #[test]
    fn test_tie_agreeing_uses_priority() {
        let mut marks = registry(0, 99);
        let snap = snapshot(vec![
            object(SourceKind::Shattered, Some("Fallen"), 100, 90),
            corpse("Fallen", MonsterRank::Normal, 110, 100),
        ]);
        let result = mark_if_eligible(&amulet(), RerollCategory::Magic, &snap, &mut marks, &tables());
        assert_eq!(result, Assessment::Accepted { level: 67, source: Some(SourceKind::Corpse) });
    }

    #[test]
    fn test_terrorized_uses_formula() {
        let mut marks = registry(90, 99);
        let mut snap = snapshot(vec![object(SourceKind::Container, None, 101, 100)]);
        snap.player.terrorized = true;
        let result = mark_if_eligible(&amulet(), RerollCategory::Magic, &snap, &mut marks, &tables());
        assert_eq!(result, Assessment::Accepted { level: 92, source: Some(SourceKind::Container) });
    }

    #[test]
    fn test_existing_mark_not_overwritten() {
        let mut marks = registry(0, 99);
        marks.set_handle(RerollCategory::Magic, UnitId(5));
        let snap = snapshot(vec![corpse("Fallen", MonsterRank::Normal, 101, 100)]);
        let result = mark_if_eligible(&amulet(), RerollCategory::Magic, &snap, &mut marks, &tables());
        assert_eq!(result, Assessment::AlreadyMarked);
        assert_eq!(marks.state(RerollCategory::Magic).handle, UnitId(5));
    }

    #[test]
    fn test_wrong_quality_not_target() {
        let mut marks = registry(0, 99);
        let mut rare = amulet();
        rare.quality = Quality::Rare;
        let result = mark_if_eligible(&rare, RerollCategory::Magic, &snapshot(vec![]), &mut marks, &tables());
        assert_eq!(result, Assessment::NotTarget);
    }
}
