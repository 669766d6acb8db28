//! # Simulated Game
//!
//! **An in-memory game client for tests and the demo binary**
//!
//! [`SimulatedGame`] keeps a [`GameSnapshot`] as its world state and applies
//! [`GameAction`]s to it the way the live client would, including the cube:
//! transmute looks the cube contents up in the recipe catalog and produces
//! the result in the inventory.
//!
//! ## Layout
//!
//! - Inventory: a 10x4 grid, one cell per item.
//! - Stash tab 1 is the personal stash, tab `n >= 2` is shared page `n - 2`.
//! - Each tab holds [`SimulatedGame::with_tab_capacity`] items; a full tab
//!   rejects the stash action.
//!
//! Transient failures can be injected per action kind with
//! [`SimulatedGame::fail_next`], or after some successes with
//! [`SimulatedGame::fail_after`].

use std::collections::{HashMap, VecDeque};
use std::mem::{discriminant, Discriminant};

use horadric_core::{GameSnapshot, Item, ItemType, Location, LocationKind, Position, Quality, Stat, UnitId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::actions::{ActionExecutor, GameAction, Notification, NotificationSink, SnapshotProvider};
use crate::catalog::{Recipe, RecipeCatalog, RecipeKind, LEG_ITEM};
use crate::config::{CharacterConfig, INVENTORY_COLUMNS, INVENTORY_ROWS};
use crate::error::{ActionError, EconomyError, EconomyResult};

/// Items a stash tab holds by default.
pub const DEFAULT_TAB_CAPACITY: usize = 100;

const STASH_COLUMNS: i32 = 10;

const GEM_SUFFIXES: [&str; 7] = ["Amethyst", "Diamond", "Emerald", "Ruby", "Sapphire", "Topaz", "Skull"];

/// Best-effort type family for a produced item name.
#[must_use]
pub fn type_for_name(name: &str) -> ItemType {
    if name.ends_with("Rune") {
        ItemType::Rune
    } else if GEM_SUFFIXES.iter().any(|g| name.ends_with(g)) {
        ItemType::Gem
    } else if name.starts_with("Token") {
        ItemType::Token
    } else if name == "Jewel" {
        ItemType::Jewel
    } else {
        ItemType::Misc
    }
}

// ============================================================================
// SCENARIO
// ============================================================================

/// A starting world, as loaded by the demo binary.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Character configuration.
    pub config: CharacterConfig,
    /// World state.
    pub snapshot: GameSnapshot,
    /// Items the vendor offers.
    pub vendor: Vec<Item>,
}

impl Scenario {
    /// Parses a scenario from TOML.
    ///
    /// # Errors
    ///
    /// Returns error if the TOML is malformed.
    pub fn from_toml(content: &str) -> EconomyResult<Self> {
        toml::from_str(content).map_err(|e| EconomyError::InvalidConfig(format!("scenario: {e}")))
    }
}

// ============================================================================
// SIMULATED GAME
// ============================================================================

/// Pending injected failures for one action kind.
#[derive(Clone, Copy, Debug)]
struct Injected {
    /// Successes still allowed before failing.
    pass: u32,
    /// Failures still to return.
    fail: u32,
}

/// In-memory game client.
#[derive(Debug)]
pub struct SimulatedGame {
    world: GameSnapshot,
    catalog: RecipeCatalog,
    vendor: Vec<Item>,
    tab_capacity: usize,
    shared_pages: u8,
    next_unit: u32,
    rerolls: VecDeque<Vec<Stat>>,
    roll_counter: i32,
    failures: HashMap<Discriminant<GameAction>, Injected>,
    log: Vec<GameAction>,
}

impl SimulatedGame {
    /// Creates a game around `world`.
    #[must_use]
    pub fn new(world: GameSnapshot) -> Self {
        let next_unit = world.items.iter().map(|it| it.unit_id.0).max().unwrap_or(0) + 1000;
        Self {
            world,
            catalog: RecipeCatalog::standard(),
            vendor: Vec::new(),
            tab_capacity: DEFAULT_TAB_CAPACITY,
            shared_pages: 3,
            next_unit,
            rerolls: VecDeque::new(),
            roll_counter: 0,
            failures: HashMap::new(),
            log: Vec::new(),
        }
    }

    /// Creates a game from a scenario.
    #[must_use]
    pub fn from_scenario(scenario: &Scenario) -> Self {
        Self::new(scenario.snapshot.clone())
            .with_vendor(scenario.vendor.clone())
            .with_shared_pages(scenario.config.stash.shared_pages)
    }

    /// Sets the vendor stock.
    #[must_use]
    pub fn with_vendor(mut self, stock: Vec<Item>) -> Self {
        self.vendor = stock;
        self.world.player.vendor_open = true;
        self
    }

    /// Sets how many items one stash tab holds.
    #[must_use]
    pub fn with_tab_capacity(mut self, capacity: usize) -> Self {
        self.tab_capacity = capacity;
        self
    }

    /// Sets the number of shared stash pages.
    #[must_use]
    pub fn with_shared_pages(mut self, pages: u8) -> Self {
        self.shared_pages = pages;
        self
    }

    /// Sets the recipe table transmute consults.
    #[must_use]
    pub fn with_catalog(mut self, catalog: RecipeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Stats the next reroll produces, instead of the generated ones.
    pub fn queue_reroll(&mut self, stats: Vec<Stat>) {
        self.rerolls.push_back(stats);
    }

    /// Makes the next `times` actions of the same kind as `action` fail.
    pub fn fail_next(&mut self, action: &GameAction, times: u32) {
        self.fail_after(action, 0, times);
    }

    /// Lets `passes` actions of the same kind as `action` succeed, then makes
    /// the following `times` fail.
    pub fn fail_after(&mut self, action: &GameAction, passes: u32, times: u32) {
        self.failures.insert(
            discriminant(action),
            Injected {
                pass: passes,
                fail: times,
            },
        );
    }

    /// Every action executed, failed ones included.
    #[must_use]
    pub fn log(&self) -> &[GameAction] {
        &self.log
    }

    /// Current world state.
    #[must_use]
    pub const fn world(&self) -> &GameSnapshot {
        &self.world
    }

    /// Mutable world state, for staging.
    pub fn world_mut(&mut self) -> &mut GameSnapshot {
        &mut self.world
    }

    /// Items at `kind`.
    #[must_use]
    pub fn items_at(&self, kind: LocationKind) -> Vec<&Item> {
        self.world.items.iter().filter(|it| it.is_in(kind)).collect()
    }

    /// Number of items named `name` at any of `kinds`.
    #[must_use]
    pub fn count(&self, name: &str, kinds: &[LocationKind]) -> usize {
        self.world.count_named(name, kinds)
    }

    // ========================================================================
    // WORLD HELPERS
    // ========================================================================

    fn allocate_unit(&mut self) -> UnitId {
        let unit = UnitId(self.next_unit);
        self.next_unit += 1;
        unit
    }

    fn index_of(&self, unit: UnitId, kinds: &[LocationKind]) -> Result<usize, ActionError> {
        self.world
            .items
            .iter()
            .position(|it| it.unit_id == unit && kinds.contains(&it.location.kind))
            .ok_or(ActionError::ItemMoved)
    }

    fn free_inventory_cell(&self) -> Result<Position, ActionError> {
        for y in 0..INVENTORY_ROWS as i32 {
            for x in 0..INVENTORY_COLUMNS as i32 {
                let pos = Position::new(x, y);
                if !self
                    .world
                    .inventory()
                    .any(|it| it.location.position == pos)
                {
                    return Ok(pos);
                }
            }
        }
        Err(ActionError::Rejected("inventory full".into()))
    }

    fn tab_location(&self, tab: u8) -> Result<(LocationKind, u8), ActionError> {
        match tab {
            0 => Err(ActionError::Rejected("no such tab".into())),
            1 => Ok((LocationKind::Stash, 0)),
            n if n - 2 < self.shared_pages => Ok((LocationKind::SharedStash, n - 2)),
            _ => Err(ActionError::Rejected("no such tab".into())),
        }
    }

    fn free_tab_cell(&self, kind: LocationKind, page: u8) -> Result<Position, ActionError> {
        let on_page: Vec<Position> = self
            .world
            .items
            .iter()
            .filter(|it| it.location.kind == kind && it.location.page == page)
            .map(|it| it.location.position)
            .collect();
        if on_page.len() >= self.tab_capacity {
            return Err(ActionError::Rejected("tab full".into()));
        }
        (0..)
            .map(|i: i32| Position::new(i % STASH_COLUMNS, i / STASH_COLUMNS))
            .find(|pos| !on_page.contains(pos))
            .ok_or_else(|| ActionError::Rejected("tab full".into()))
    }

    fn place_in_inventory(&mut self, mut item: Item) -> Result<UnitId, ActionError> {
        let pos = self.free_inventory_cell()?;
        item.location = Location::new(LocationKind::Inventory, pos);
        let unit = item.unit_id;
        self.world.items.push(item);
        Ok(unit)
    }

    fn move_to_inventory(&mut self, index: usize) -> Result<(), ActionError> {
        let pos = self.free_inventory_cell()?;
        self.world.items[index].location = Location::new(LocationKind::Inventory, pos);
        Ok(())
    }

    // ========================================================================
    // TRANSMUTE
    // ========================================================================

    fn matches(recipe: &Recipe, cube: &[Item]) -> bool {
        let names: Vec<&str> = cube.iter().map(|it| it.name.as_str()).collect();
        let count = |name: &str| names.iter().filter(|n| **n == name).count() as u32;
        let has_all = |skip: Option<&str>| {
            recipe
                .requirements()
                .iter()
                .filter(|(name, _)| Some(**name) != skip)
                .all(|(name, need)| count(name) == *need)
        };
        match recipe.kind {
            RecipeKind::Generic => {
                let required: u32 = recipe.requirements().values().sum();
                let extra = cube.len() as u32 - required.min(cube.len() as u32);
                if !has_all(None) {
                    return false;
                }
                match (&recipe.purchase, extra) {
                    (_, 0) => true,
                    (Some(p), 1) if p.required => cube.iter().any(|it| p.items.contains(&it.name)),
                    _ => false,
                }
            }
            RecipeKind::AddSockets(target) => {
                let slot = target.base_slot();
                has_all(Some(slot))
                    && cube.len() == recipe.ingredients.len()
                    && cube.iter().any(|it| target.accepts(it.item_type) && it.quality == Quality::Normal)
            }
            RecipeKind::RerollMagic => {
                cube.len() == 4
                    && cube.iter().filter(|it| it.name.starts_with("Perfect") && it.name != "PerfectSkull").count() == 3
                    && cube.iter().any(|it| it.quality == Quality::Magic)
            }
            RecipeKind::RerollRare => {
                cube.len() == 7
                    && count("PerfectSkull") == 6
                    && cube.iter().any(|it| it.quality == Quality::Rare)
            }
            RecipeKind::LegStep1 => {
                cube.len() == 4
                    && cube.iter().any(|it| it.name == LEG_ITEM && it.quality < Quality::Magic)
                    && cube.iter().filter(|it| it.item_type == ItemType::Gem).count() == 3
            }
            RecipeKind::LegStep2 => {
                cube.len() == 4
                    && cube.iter().any(|it| it.name == LEG_ITEM && it.quality == Quality::Magic)
                    && has_all(Some(LEG_ITEM))
            }
        }
    }

    fn next_roll(&mut self) -> Vec<Stat> {
        self.roll_counter += 1;
        self.rerolls
            .pop_front()
            .unwrap_or_else(|| vec![Stat::new(7, 0, 10 + self.roll_counter * 7)])
    }

    fn produce(&mut self, recipe: &Recipe, cube: &[Item]) -> Item {
        let unit = self.allocate_unit().0;
        match recipe.kind {
            RecipeKind::Generic => {
                if let Some(result) = &recipe.result {
                    return Item::new(unit, result.clone(), type_for_name(result), Quality::Normal);
                }
                let base = cube
                    .iter()
                    .find(|it| !recipe.requirements().contains_key(it.name.as_str()))
                    .or_else(|| cube.iter().find(|it| it.item_type.equip_slot().is_some()))
                    .cloned()
                    .unwrap_or_default();
                let stats = self.next_roll();
                Item {
                    unit_id: UnitId(unit),
                    quality: Quality::Crafted,
                    identified_name: recipe.name.clone(),
                    stats,
                    ..base
                }
            }
            RecipeKind::AddSockets(target) => {
                let base = cube
                    .iter()
                    .find(|it| target.accepts(it.item_type) && it.quality == Quality::Normal)
                    .cloned()
                    .unwrap_or_default();
                let sockets = base.max_sockets;
                Item {
                    unit_id: UnitId(unit),
                    sockets,
                    ..base
                }
            }
            RecipeKind::RerollMagic | RecipeKind::RerollRare => {
                let quality = if recipe.kind == RecipeKind::RerollMagic {
                    Quality::Magic
                } else {
                    Quality::Rare
                };
                let base = cube.iter().find(|it| it.quality == quality).cloned().unwrap_or_default();
                let stats = self.next_roll();
                let prefix = 300 + self.roll_counter as u16;
                Item {
                    unit_id: UnitId(unit),
                    identified: true,
                    stats,
                    ..base
                }
                .with_affixes(&[prefix], &[])
            }
            RecipeKind::LegStep1 | RecipeKind::LegStep2 => {
                let stats = self.next_roll();
                Item::new(unit, LEG_ITEM, ItemType::Club, Quality::Magic).with_stats(stats)
            }
        }
    }

    fn transmute(&mut self) -> Result<(), ActionError> {
        let cube: Vec<Item> = self
            .world
            .items
            .iter()
            .filter(|it| it.is_in(LocationKind::Cube))
            .cloned()
            .collect();
        if cube.is_empty() {
            return Err(ActionError::Rejected("cube empty".into()));
        }
        let Some(recipe) = self.catalog.iter().find(|r| Self::matches(r, &cube)).cloned() else {
            return Err(ActionError::Rejected("no recipe matches the cube contents".into()));
        };
        let result = self.produce(&recipe, &cube);
        debug!(recipe = %recipe.name, result = %result, "simulated transmute");
        self.world.items.retain(|it| !it.is_in(LocationKind::Cube));
        self.place_in_inventory(result)?;
        Ok(())
    }

    // ========================================================================
    // ACTIONS
    // ========================================================================

    fn apply(&mut self, action: &GameAction) -> Result<(), ActionError> {
        use LocationKind::{Cube, Ground, Inventory, SharedStash, Stash};

        match action {
            GameAction::StashItem { unit, tab } => {
                let index = self.index_of(*unit, &[Inventory])?;
                let (kind, page) = self.tab_location(*tab)?;
                let pos = self.free_tab_cell(kind, page)?;
                self.world.items[index].location = Location::on_page(kind, page, pos);
            }
            GameAction::TakeFromStash { unit } => {
                let index = self.index_of(*unit, &[Stash, SharedStash])?;
                self.move_to_inventory(index)?;
            }
            GameAction::MoveToCube { unit } => {
                let index = self.index_of(*unit, &[Inventory, Stash, SharedStash])?;
                self.world.items[index].location = Location::new(Cube, Position::default());
            }
            GameAction::TakeFromCube { unit } => {
                let index = self.index_of(*unit, &[Cube])?;
                self.move_to_inventory(index)?;
            }
            GameAction::Transmute => self.transmute()?,
            GameAction::DropItem { unit } => {
                let index = self.index_of(*unit, &[Inventory])?;
                self.world.items[index].location = Location::new(Ground, self.world.player.position);
            }
            GameAction::SellItem { unit } => {
                if !self.world.player.vendor_open {
                    return Err(ActionError::MenuNotOpen("vendor"));
                }
                let index = self.index_of(*unit, &[Inventory])?;
                self.world.items.remove(index);
            }
            GameAction::Gamble { candidates, min_quality } => {
                if !self.world.player.vendor_open {
                    return Err(ActionError::MenuNotOpen("vendor"));
                }
                let Some(index) = self
                    .vendor
                    .iter()
                    .position(|it| candidates.contains(&it.name) && it.quality >= *min_quality)
                else {
                    return Err(ActionError::Rejected("vendor has nothing matching".into()));
                };
                self.free_inventory_cell()?;
                let mut bought = self.vendor.remove(index);
                bought.unit_id = self.allocate_unit();
                self.place_in_inventory(bought)?;
            }
            GameAction::PickUp { unit } => {
                let index = self.index_of(*unit, &[Ground])?;
                self.move_to_inventory(index)?;
            }
            GameAction::Identify { unit } => {
                let index = self.index_of(*unit, &[Inventory])?;
                self.world.items[index].identified = true;
            }
        }
        Ok(())
    }
}

impl SnapshotProvider for SimulatedGame {
    fn snapshot(&mut self) -> EconomyResult<GameSnapshot> {
        Ok(self.world.clone())
    }
}

impl ActionExecutor for SimulatedGame {
    fn execute(&mut self, action: GameAction) -> Result<(), ActionError> {
        trace!(?action, "simulated action");
        self.log.push(action.clone());
        if let Some(injected) = self.failures.get_mut(&discriminant(&action)) {
            if injected.pass > 0 {
                injected.pass -= 1;
            } else if injected.fail > 0 {
                injected.fail -= 1;
                return Err(ActionError::NotRegistered);
            }
        }
        self.apply(&action)
    }
}

// ============================================================================
// RECORDING SINK
// ============================================================================

/// Notification sink that keeps everything it receives.
#[derive(Debug, Default)]
pub struct RecordingSink {
    received: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far.
    #[must_use]
    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, notification: Notification) {
        self.received.lock().push(notification);
    }
}
