//! # Character Configuration
//!
//! **Per-character settings, persisted as TOML**
//!
//! The economy reads its enabled recipes, reservations and persisted marks
//! from a [`CharacterConfig`]. Loading and saving go through the
//! [`ConfigStore`] seam; the only contract is that a save either writes the
//! whole struct or fails.
//!
//! ## Example
//!
//! ```toml
//! [character]
//! name = "sorc"
//!
//! [cube_recipes]
//! enabled = true
//! enabled_recipes = ["Flawed Amethyst", "Reroll Specific Magic Item"]
//! specific_item_to_reroll = "Amulet"
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use horadric_core::{Fingerprint, Position};

use crate::error::{EconomyError, EconomyResult};

/// Rows in the inventory lock grid.
pub const INVENTORY_ROWS: usize = 4;
/// Columns in the inventory lock grid.
pub const INVENTORY_COLUMNS: usize = 10;

// ============================================================================
// SECTIONS
// ============================================================================

/// Character identity and run mode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterSection {
    /// Character name, also the config file stem.
    pub name: String,
    /// Leveling mode keeps quest items out of the stash.
    pub leveling: bool,
}

/// How many potions of each kind to keep when selling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PotionKeep {
    /// Healing potions.
    pub healing: u32,
    /// Mana potions.
    pub mana: u32,
    /// Rejuvenation potions.
    pub rejuvenation: u32,
}

impl Default for PotionKeep {
    fn default() -> Self {
        Self {
            healing: 4,
            mana: 4,
            rejuvenation: 0,
        }
    }
}

/// Inventory protection and reservations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventorySection {
    /// 4x10 grid, `0` marks a protected slot.
    pub locked_slots: Vec<Vec<u8>>,
    /// Gem reserved for an upgrade action; one unit stays in the inventory.
    pub gem_to_upgrade: Option<String>,
    /// Potions kept when selling.
    pub potions: PotionKeep,
}

impl Default for InventorySection {
    fn default() -> Self {
        Self {
            locked_slots: vec![vec![1; INVENTORY_COLUMNS]; INVENTORY_ROWS],
            gem_to_upgrade: None,
            potions: PotionKeep::default(),
        }
    }
}

impl InventorySection {
    /// Returns true if the inventory slot at `position` is protected.
    #[must_use]
    pub fn is_locked(&self, position: Position) -> bool {
        let (Ok(x), Ok(y)) = (usize::try_from(position.x), usize::try_from(position.y)) else {
            return false;
        };
        self.locked_slots
            .get(y)
            .and_then(|row| row.get(x))
            .is_some_and(|&slot| slot == 0)
    }

    /// The reserved upgrade gem, if any.
    #[must_use]
    pub fn upgrade_gem(&self) -> Option<&str> {
        self.gem_to_upgrade
            .as_deref()
            .filter(|gem| !gem.is_empty() && *gem != "None")
    }
}

/// Cube recipe settings and persisted marks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CubeRecipesSection {
    /// Master switch.
    pub enabled: bool,
    /// Names of enabled recipes.
    pub enabled_recipes: Vec<String>,
    /// Non-keeper jewels preserved for crafting.
    pub jewels_to_keep: u32,
    /// Base name of the magic item being rerolled.
    pub specific_item_to_reroll: String,
    /// Base name of the rare item being rerolled.
    pub rare_specific_item_to_reroll: String,
    /// Persisted fingerprint of the marked magic item.
    pub marked_magic_fingerprint: Fingerprint,
    /// Persisted fingerprint of the marked rare item.
    pub marked_rare_fingerprint: Fingerprint,
    /// Lowest acceptable monster level for a new mark.
    pub min_monster_level: u32,
    /// Highest acceptable monster level for a new mark.
    pub max_monster_level: u32,
    /// Hold back perfect amethysts while running low.
    pub skip_perfect_amethysts: bool,
    /// Hold back perfect rubies while running low.
    pub skip_perfect_rubies: bool,
    /// How many of a held-back perfect gem are never spent on rerolls.
    pub perfect_gem_reserve: u32,
}

impl Default for CubeRecipesSection {
    fn default() -> Self {
        Self {
            enabled: false,
            enabled_recipes: Vec::new(),
            jewels_to_keep: 1,
            specific_item_to_reroll: String::new(),
            rare_specific_item_to_reroll: String::new(),
            marked_magic_fingerprint: Fingerprint::empty(),
            marked_rare_fingerprint: Fingerprint::empty(),
            min_monster_level: 0,
            max_monster_level: 99,
            skip_perfect_amethysts: false,
            skip_perfect_rubies: false,
            perfect_gem_reserve: 3,
        }
    }
}

/// Stash behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StashSection {
    /// Start stashing on the first shared tab instead of the personal one.
    pub stash_to_shared: bool,
    /// Number of shared stash pages.
    pub shared_pages: u8,
    /// Slots per shared page, used for the overflow check.
    pub page_slots: u32,
}

impl Default for StashSection {
    fn default() -> Self {
        Self {
            stash_to_shared: false,
            shared_pages: 3,
            page_slots: 100,
        }
    }
}

/// Mule rotation when the shared stash fills up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MulingSection {
    /// Whether muling is active.
    pub enabled: bool,
    /// Mule profile names, in rotation order.
    pub mules: Vec<String>,
    /// Index of the mule to use next.
    pub current_mule_index: usize,
    /// Shared stash fill percentage that triggers a mule switch.
    pub fill_threshold_percent: u8,
}

impl Default for MulingSection {
    fn default() -> Self {
        Self {
            enabled: false,
            mules: Vec::new(),
            current_mule_index: 0,
            fill_threshold_percent: 80,
        }
    }
}

/// Notification filtering.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSection {
    /// Whether notifications are sent at all.
    pub enabled: bool,
    /// Runes that are too common to announce.
    pub quiet_runes: Vec<String>,
    /// Runes from `quiet_runes` that are announced anyway.
    pub quiet_rune_exemptions: Vec<String>,
}

impl Default for NotificationSection {
    fn default() -> Self {
        let quiet = [
            "El", "Eld", "Tir", "Nef", "Eth", "Ith", "Tal", "Ral", "Ort", "Thul", "Amn", "Sol", "Shael", "Dol",
            "Hel", "Io", "Lum", "Ko", "Fal", "Pul", "Lem",
        ];
        let exempt = ["Tir", "Tal", "Ral", "Ort", "Thul", "Amn", "Sol", "Lum", "Nef"];
        Self {
            enabled: true,
            quiet_runes: quiet.iter().map(|r| format!("{r}Rune")).collect(),
            quiet_rune_exemptions: exempt.iter().map(|r| format!("{r}Rune")).collect(),
        }
    }
}

// ============================================================================
// CHARACTER CONFIG
// ============================================================================

/// Everything the economy reads or writes for one character.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    /// Identity.
    pub character: CharacterSection,
    /// Inventory protection.
    pub inventory: InventorySection,
    /// Cube recipes and marks.
    pub cube_recipes: CubeRecipesSection,
    /// Stash behavior.
    pub stash: StashSection,
    /// Mule rotation.
    pub muling: MulingSection,
    /// Notification filter.
    pub notifications: NotificationSection,
}

impl CharacterConfig {
    /// Parses a config from TOML and validates it.
    ///
    /// # Errors
    ///
    /// Returns error if the TOML is malformed or fails validation.
    pub fn from_toml(content: &str) -> EconomyResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| EconomyError::InvalidConfig(format!("TOML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the config to TOML.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_toml(&self) -> EconomyResult<String> {
        toml::to_string_pretty(self).map_err(|e| EconomyError::Persistence(format!("TOML encode error: {e}")))
    }

    /// Checks structural constraints.
    ///
    /// # Errors
    ///
    /// Returns error on an oversized lock grid or an inverted level window.
    pub fn validate(&self) -> EconomyResult<()> {
        if self.inventory.locked_slots.len() > INVENTORY_ROWS
            || self.inventory.locked_slots.iter().any(|row| row.len() > INVENTORY_COLUMNS)
        {
            return Err(EconomyError::InvalidConfig(format!(
                "inventory lock grid must be at most {INVENTORY_ROWS}x{INVENTORY_COLUMNS}"
            )));
        }
        let cube = &self.cube_recipes;
        if cube.min_monster_level > cube.max_monster_level {
            return Err(EconomyError::InvalidConfig(format!(
                "monster level window is inverted: {} > {}",
                cube.min_monster_level, cube.max_monster_level
            )));
        }
        if self.muling.fill_threshold_percent > 100 {
            return Err(EconomyError::InvalidConfig(
                "mule fill threshold must be a percentage".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns true if cubing is on and `recipe` is enabled.
    #[must_use]
    pub fn recipe_enabled(&self, recipe: &str) -> bool {
        self.cube_recipes.enabled && self.cube_recipes.enabled_recipes.iter().any(|r| r == recipe)
    }

    /// Character name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.character.name
    }
}

// ============================================================================
// CONFIG STORE
// ============================================================================

/// Load/save seam for character configuration.
pub trait ConfigStore {
    /// Loads the config for `character`.
    ///
    /// # Errors
    ///
    /// Returns error if the config cannot be read or parsed.
    fn load(&self, character: &str) -> EconomyResult<CharacterConfig>;

    /// Saves the config for `character`.
    ///
    /// # Errors
    ///
    /// Returns error if the write failed; nothing partial is left behind.
    fn save(&self, character: &str, config: &CharacterConfig) -> EconomyResult<()>;
}

/// TOML files in a directory, one per character.
#[derive(Clone, Debug)]
pub struct TomlConfigStore {
    dir: PathBuf,
}

impl TomlConfigStore {
    /// Creates a store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the config file for `character`.
    #[must_use]
    pub fn path_for(&self, character: &str) -> PathBuf {
        self.dir.join(format!("{character}.toml"))
    }

    fn write_whole(path: &Path, content: &str) -> std::io::Result<()> {
        let tmp = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, path)
    }
}

impl ConfigStore for TomlConfigStore {
    fn load(&self, character: &str) -> EconomyResult<CharacterConfig> {
        let path = self.path_for(character);
        let content = fs::read_to_string(&path)
            .map_err(|e| EconomyError::Persistence(format!("read {}: {e}", path.display())))?;
        CharacterConfig::from_toml(&content)
    }

    fn save(&self, character: &str, config: &CharacterConfig) -> EconomyResult<()> {
        let content = config.to_toml()?;
        fs::create_dir_all(&self.dir)
            .map_err(|e| EconomyError::Persistence(format!("create {}: {e}", self.dir.display())))?;
        let path = self.path_for(character);
        Self::write_whole(&path, &content)
            .map_err(|e| EconomyError::Persistence(format!("write {}: {e}", path.display())))
    }
}

/// In-memory store, for tests and the simulator.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    configs: Mutex<HashMap<String, CharacterConfig>>,
    saves: Mutex<usize>,
    fail_saves: Mutex<bool>,
}

impl MemoryConfigStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding one config.
    #[must_use]
    pub fn with_config(config: CharacterConfig) -> Self {
        let store = Self::new();
        store.configs.lock().insert(config.character.name.clone(), config);
        store
    }

    /// Makes every following save fail.
    pub fn fail_saves(&self, fail: bool) {
        *self.fail_saves.lock() = fail;
    }

    /// Number of successful saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        *self.saves.lock()
    }

    /// The last saved config for `character`.
    #[must_use]
    pub fn stored(&self, character: &str) -> Option<CharacterConfig> {
        self.configs.lock().get(character).cloned()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self, character: &str) -> EconomyResult<CharacterConfig> {
        self.configs
            .lock()
            .get(character)
            .cloned()
            .ok_or_else(|| EconomyError::Persistence(format!("no config for {character}")))
    }

    fn save(&self, character: &str, config: &CharacterConfig) -> EconomyResult<()> {
        if *self.fail_saves.lock() {
            return Err(EconomyError::Persistence("simulated write failure".to_string()));
        }
        self.configs.lock().insert(character.to_string(), config.clone());
        *self.saves.lock() += 1;
        Ok(())
    }
}
