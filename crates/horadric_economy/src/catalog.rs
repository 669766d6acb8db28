//! # Recipe Catalog
//!
//! **Static table of cube recipes**
//!
//! Every recipe carries a [`RecipeKind`]. `Generic` recipes are matched by the
//! multiset resolver; every other kind selects a bespoke matcher by pattern
//! matching, never by comparing recipe names.
//!
//! Recipes are defined once and never mutated. Whether a recipe runs in a
//! given cycle is read from [`CharacterConfig`](crate::config::CharacterConfig).

use std::collections::HashMap;

use horadric_core::ItemType;

use crate::config::CharacterConfig;

/// Recipe names referenced by gates and tests.
pub mod names {
    /// Magic reroll of the marked item.
    pub const REROLL_MAGIC: &str = "Reroll Specific Magic Item";
    /// Rare reroll of the marked item.
    pub const REROLL_RARE: &str = "Reroll Specific Rare Item";
    /// First leg step: socketed leg into a magic leg.
    pub const LEG_STEP_1: &str = "MagicWirtsLegStep1";
    /// Second leg step: magic leg into a crafted leg.
    pub const LEG_STEP_2: &str = "MagicWirtsLegStep2";
    /// The deferred amulet recipe.
    pub const CASTER_AMULET: &str = "Caster Amulet";
    /// Shares ral rune and jewel stock with the caster amulet.
    pub const BLOOD_HELM_ARMET: &str = "Blood Helm (Armet)";
    /// Shares perfect amethyst and jewel stock with the caster amulet.
    pub const CASTER_BELT_SHARKSKIN: &str = "Caster Belt (SharkskinBelt)";
}

/// Base name of the leg item.
pub const LEG_ITEM: &str = "WirtsLeg";
/// Generic decorative gem consumed by crafting recipes.
pub const JEWEL: &str = "Jewel";

/// Broad equipment category for socket recipes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SocketTarget {
    /// Weapons of every family.
    Weapon,
    /// Body armor.
    Armor,
    /// Headgear of every family.
    Helm,
    /// Shields of every family.
    Shield,
}

/// Bases that can never receive sockets from the cube.
pub const UNSOCKETABLE_BASES: [&str; 9] = [
    "Runic Talons",
    "War Scepter",
    "Greater Talons",
    "Caduceus",
    "Divine Scepter",
    "Cedar Staff",
    "Elder Staff",
    "Gnarled Staff",
    "Walking Stick",
];

impl SocketTarget {
    /// Returns true if `item_type` belongs to this category.
    #[must_use]
    pub const fn accepts(self, item_type: ItemType) -> bool {
        match self {
            Self::Weapon => item_type.is_weapon(),
            Self::Armor => matches!(item_type, ItemType::Armor),
            Self::Helm => item_type.is_helm(),
            Self::Shield => item_type.is_shield(),
        }
    }

    /// The exact-name base slot used in the recipe's ingredient list.
    #[must_use]
    pub const fn base_slot(self) -> &'static str {
        match self {
            Self::Weapon => "NormalWeapon",
            Self::Armor => "NormalArmor",
            Self::Helm => "NormalHelm",
            Self::Shield => "NormalShield",
        }
    }
}

/// Selects the resolver for a recipe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecipeKind {
    /// Single-pass greedy multiset matching.
    Generic,
    /// Three catalysts plus a socket-eligible base.
    AddSockets(SocketTarget),
    /// The marked magic item plus three perfect gems.
    RerollMagic,
    /// The marked rare item plus six perfect skulls.
    RerollRare,
    /// A socketed low-quality leg plus three standard gems.
    LegStep1,
    /// A non-keeper magic leg plus rune, perfect gem and jewel.
    LegStep2,
}

/// Stock that must exist before a deferred recipe may fire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StockReserve {
    /// Gate applies only when all of these recipes are enabled.
    pub when_enabled: Vec<String>,
    /// Non-keeper jewels required across inventory and stash.
    pub jewels: u32,
    /// Named items and counts required across inventory and stash.
    pub items: Vec<(String, u32)>,
}

/// Extra conditions checked before a generic recipe is matched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolutionGate {
    /// The stash pool must hold at least `count` of `item`.
    MinimumStock {
        /// Item to count.
        item: String,
        /// Required count.
        count: u32,
    },
    /// Withhold until a shared reserve is stocked.
    DeferUntilStocked(StockReserve),
}

/// A vendor purchase that supplies one ingredient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Purchase {
    /// Whether the purchase must happen before the recipe can run.
    pub required: bool,
    /// Acceptable purchasable base names.
    pub items: Vec<String>,
}

/// A named cube transformation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recipe {
    /// Unique name, also the key in the enabled-recipes list.
    pub name: String,
    /// Ingredient specifiers; an empty string is a wildcard slot.
    pub ingredients: Vec<String>,
    /// Which resolver runs this recipe.
    pub kind: RecipeKind,
    /// Fixed result name, when the result is a known item.
    pub result: Option<String>,
    /// Vendor purchase step.
    pub purchase: Option<Purchase>,
    /// Extra resolution gate.
    pub gate: Option<ResolutionGate>,
}

impl Recipe {
    /// Creates a generic recipe.
    #[must_use]
    pub fn new<S: AsRef<str>>(name: impl Into<String>, ingredients: &[S]) -> Self {
        Self {
            name: name.into(),
            ingredients: ingredients.iter().map(|i| i.as_ref().to_string()).collect(),
            kind: RecipeKind::Generic,
            result: None,
            purchase: None,
            gate: None,
        }
    }

    /// Sets the resolver kind.
    #[must_use]
    pub fn with_kind(mut self, kind: RecipeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the fixed result name.
    #[must_use]
    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    /// Adds a purchase step.
    #[must_use]
    pub fn with_purchase(mut self, required: bool, items: &[&str]) -> Self {
        self.purchase = Some(Purchase {
            required,
            items: items.iter().map(ToString::to_string).collect(),
        });
        self
    }

    /// Adds a resolution gate.
    #[must_use]
    pub fn with_gate(mut self, gate: ResolutionGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Returns true if the purchase step must run before transmuting.
    #[must_use]
    pub fn requires_purchase(&self) -> bool {
        self.purchase.as_ref().is_some_and(|p| p.required)
    }

    /// Non-wildcard ingredient names with their required counts.
    #[must_use]
    pub fn requirements(&self) -> HashMap<&str, u32> {
        let mut needed = HashMap::new();
        for name in self.ingredients.iter().filter(|n| !n.is_empty()) {
            *needed.entry(name.as_str()).or_insert(0) += 1;
        }
        needed
    }

    /// Returns true if `name` is one of this recipe's ingredients.
    #[must_use]
    pub fn uses(&self, name: &str) -> bool {
        self.ingredients.iter().any(|i| i == name)
    }
}

/// The full recipe table.
#[derive(Clone, Debug)]
pub struct RecipeCatalog {
    recipes: Vec<Recipe>,
}

const GEM_KINDS: [&str; 7] = ["Amethyst", "Diamond", "Emerald", "Ruby", "Sapphire", "Topaz", "Skull"];

/// Three-rune upgrades, no catalyst.
const PLAIN_RUNE_UPGRADES: [&str; 9] = ["El", "Eld", "Tir", "Nef", "Eth", "Ith", "Tal", "Ral", "Ort"];

/// Three-rune upgrades with a catalyst gem.
const CATALYST_RUNE_UPGRADES: [(&str, &str); 11] = [
    ("Thul", "ChippedTopaz"),
    ("Amn", "ChippedAmethyst"),
    ("Sol", "ChippedSapphire"),
    ("Shael", "ChippedRuby"),
    ("Dol", "ChippedEmerald"),
    ("Hel", "ChippedDiamond"),
    ("Io", "FlawedTopaz"),
    ("Lum", "FlawedAmethyst"),
    ("Ko", "FlawedSapphire"),
    ("Fal", "FlawedRuby"),
    ("Lem", "FlawedEmerald"),
];

/// Two-rune upgrades with a catalyst gem.
const HIGH_RUNE_UPGRADES: [(&str, &str); 12] = [
    ("Pul", "FlawedDiamond"),
    ("Um", "Topaz"),
    ("Mal", "Amethyst"),
    ("Ist", "Sapphire"),
    ("Gul", "Ruby"),
    ("Vex", "Emerald"),
    ("Ohm", "Diamond"),
    ("Lo", "FlawlessTopaz"),
    ("Sur", "FlawlessAmethyst"),
    ("Ber", "FlawlessSapphire"),
    ("Jah", "FlawlessRuby"),
    ("Cham", "FlawlessEmerald"),
];

/// Rune order, used to name upgrade results.
const RUNE_LADDER: [&str; 33] = [
    "El", "Eld", "Tir", "Nef", "Eth", "Ith", "Tal", "Ral", "Ort", "Thul", "Amn", "Sol", "Shael", "Dol", "Hel", "Io",
    "Lum", "Ko", "Fal", "Lem", "Pul", "Um", "Mal", "Ist", "Gul", "Vex", "Ohm", "Lo", "Sur", "Ber", "Jah", "Cham",
    "Zod",
];

/// Crafted recipes: name, ingredients, purchase required, purchasable bases.
const CRAFTED: [(&str, &[&str], bool, &[&str]); 23] = [
    ("Caster Ring", &["AmnRune", "PerfectAmethyst", JEWEL, "Ring"], false, &["Ring"]),
    (
        "Caster Belt (VampirefangBelt)",
        &["VampirefangBelt", "IthRune", "PerfectAmethyst", JEWEL],
        false,
        &["SharkskinBelt", "VampirefangBelt"],
    ),
    (
        "Caster Boots",
        &["ThulRune", "PerfectAmethyst", JEWEL, "WyrmhideBoots"],
        false,
        &["DemonhideBoots", "WyrmhideBoots"],
    ),
    ("Blood Amulet", &["AmnRune", "PerfectRuby", JEWEL], true, &["Amulet"]),
    ("Blood Ring", &["SolRune", "PerfectRuby", JEWEL, "Ring"], false, &["Ring"]),
    (
        "Blood Gloves (VampireboneGloves)",
        &["VampireboneGloves", "NefRune", "PerfectRuby", JEWEL],
        false,
        &["VampireboneGloves"],
    ),
    ("Blood Boots", &["EthRune", "PerfectRuby", JEWEL, "BattleBoots"], false, &["BattleBoots"]),
    (
        "Blood Belt (MithrilCoil)",
        &["MithrilCoil", "TalRune", "PerfectRuby", JEWEL],
        false,
        &["MeshBelt", "MithrilCoil"],
    ),
    (names::BLOOD_HELM_ARMET, &["Armet", "RalRune", "PerfectRuby", JEWEL], false, &["Armet"]),
    (
        "Blood Armor",
        &["ThulRune", "PerfectRuby", JEWEL, "HellforgePlate"],
        false,
        &["PlateMail", "TemplarPlate", "HellforgePlate"],
    ),
    ("Blood Weapon", &["OrtRune", "PerfectRuby", JEWEL, "BerserkerAxe"], false, &["BerserkerAxe"]),
    (
        "Safety Shield",
        &["NefRune", "PerfectEmerald", JEWEL, "Monarch"],
        false,
        &["KiteShield", "DragonShield", "Monarch"],
    ),
    (
        "Safety Armor",
        &["EthRune", "PerfectEmerald", JEWEL, "GreatHauberk"],
        false,
        &["BreastPlate", "Curiass", "GreatHauberk"],
    ),
    (
        "Safety Boots",
        &["OrtRune", "PerfectEmerald", JEWEL, "WarBoots"],
        false,
        &["Greaves", "WarBoots", "MyrmidonBoots"],
    ),
    (
        "Blood Gloves (SharkskinGloves)",
        &["SharkskinGloves", "NefRune", "PerfectRuby", JEWEL],
        false,
        &["Gauntlets", "WarGauntlets", "OgreGauntlets"],
    ),
    (
        "Blood Belt (MeshBelt)",
        &["MeshBelt", "TalRune", "PerfectRuby", JEWEL],
        false,
        &["Sash", "DemonhideSash", "SpiderwebSash"],
    ),
    (
        "Safety Helm",
        &["IthRune", "PerfectEmerald", JEWEL, "GrandCrown"],
        false,
        &["Crown", "GrandCrown", "Corona"],
    ),
    (
        "Hitpower Gloves (HeavyBracers)",
        &["OrtRune", "PerfectSapphire", JEWEL, "HeavyBracers"],
        false,
        &["ChainGloves", "HeavyBracers", "Vambraces"],
    ),
    (
        "Hitpower Boots",
        &["RalRune", "PerfectSapphire", JEWEL, "MeshBoots"],
        false,
        &["ChainBoots", "MeshBoots", "Boneweave"],
    ),
    (
        names::CASTER_BELT_SHARKSKIN,
        &["SharkskinBelt", "IthRune", "PerfectAmethyst", JEWEL],
        false,
        &["HeavyBelt", "BattleBelt", "TrollBelt"],
    ),
    (
        "Hitpower Helm",
        &["NefRune", "PerfectSapphire", JEWEL, "GiantConch"],
        false,
        &["FullHelm", "Basinet", "GiantConch"],
    ),
    (
        "Hitpower Armor",
        &["EthRune", "PerfectSapphire", JEWEL, "KrakenShell"],
        false,
        &["FieldPlate", "Sharktooth", "KrakenShell"],
    ),
    (names::CASTER_AMULET, &["RalRune", "PerfectAmethyst", JEWEL], true, &["Amulet"]),
];

/// Prefixes of recipes that consume jewels as a crafting ingredient.
pub const JEWEL_CRAFT_PREFIXES: [&str; 4] = ["Caster", "Blood", "Safety", "Hitpower"];

fn next_rune(rune: &str) -> Option<&'static str> {
    let idx = RUNE_LADDER.iter().position(|r| *r == rune)?;
    RUNE_LADDER.get(idx + 1).copied()
}

fn rune_upgrade(rune: &str, ingredients: &[String]) -> Recipe {
    let recipe = Recipe::new(format!("Upgrade {rune}"), ingredients);
    match next_rune(rune) {
        Some(next) => recipe.with_result(format!("{next}Rune")),
        None => recipe,
    }
}

impl RecipeCatalog {
    /// Creates a catalog from an explicit recipe list.
    #[must_use]
    pub const fn new(recipes: Vec<Recipe>) -> Self {
        Self { recipes }
    }

    /// The built-in catalog, in processing order.
    #[must_use]
    pub fn standard() -> Self {
        let mut recipes = Vec::with_capacity(96);
        Self::push_gem_ladder(&mut recipes);

        recipes.push(
            Recipe::new(
                "Token of Absolution",
                &[
                    "TwistedEssenceOfSuffering",
                    "ChargedEssenceOfHatred",
                    "BurningEssenceOfTerror",
                    "FesteringEssenceOfDestruction",
                ],
            )
            .with_result("TokenOfAbsolution"),
        );

        Self::push_rune_upgrades(&mut recipes);

        recipes.push(Recipe::new(names::LEG_STEP_1, &[LEG_ITEM, "", "", ""]).with_kind(RecipeKind::LegStep1));
        recipes.push(
            Recipe::new(names::LEG_STEP_2, &[LEG_ITEM, "TirRune", "PerfectSapphire", JEWEL])
                .with_kind(RecipeKind::LegStep2),
        );

        Self::push_socket_recipes(&mut recipes);
        Self::push_crafted(&mut recipes);

        recipes.push(
            Recipe::new(names::REROLL_MAGIC, &["Specificitem", "Perfect", "Perfect", "Perfect"])
                .with_kind(RecipeKind::RerollMagic),
        );
        let mut rare = vec!["Specificitem"];
        rare.extend(["PerfectSkull"; 6]);
        recipes.push(Recipe::new(names::REROLL_RARE, rare.as_slice()).with_kind(RecipeKind::RerollRare));

        Self { recipes }
    }

    fn push_gem_ladder(recipes: &mut Vec<Recipe>) {
        // Input tier, output tier, recipe-name prefix.
        let steps: [(&str, &str, &str); 4] = [
            ("Chipped", "Flawed", "Flawed "),
            ("Flawed", "", ""),
            ("", "Flawless", "Flawless "),
            ("Flawless", "Perfect", "Perfect "),
        ];
        for (input, output, label) in steps {
            for gem in GEM_KINDS {
                let ingredient = format!("{input}{gem}");
                let mut recipe = Recipe::new(format!("{label}{gem}"), &[&ingredient, &ingredient, &ingredient])
                    .with_result(format!("{output}{gem}"));
                if output == "Flawless" && matches!(gem, "Topaz" | "Diamond" | "Emerald") {
                    recipe = recipe.with_gate(ResolutionGate::MinimumStock {
                        item: ingredient,
                        count: 6,
                    });
                }
                recipes.push(recipe);
            }
        }
    }

    fn push_rune_upgrades(recipes: &mut Vec<Recipe>) {
        for rune in PLAIN_RUNE_UPGRADES {
            let input = format!("{rune}Rune");
            recipes.push(rune_upgrade(rune, &[input.clone(), input.clone(), input]));
        }
        for (rune, gem) in CATALYST_RUNE_UPGRADES {
            let input = format!("{rune}Rune");
            recipes.push(rune_upgrade(rune, &[input.clone(), input.clone(), input, gem.to_string()]));
        }
        for (rune, gem) in HIGH_RUNE_UPGRADES {
            let input = format!("{rune}Rune");
            recipes.push(rune_upgrade(rune, &[input.clone(), input, gem.to_string()]));
        }
    }

    fn push_socket_recipes(recipes: &mut Vec<Recipe>) {
        let table: [(&str, SocketTarget, [&str; 3]); 4] = [
            ("Add Sockets to Weapon", SocketTarget::Weapon, ["RalRune", "AmnRune", "PerfectAmethyst"]),
            ("Add Sockets to Armor", SocketTarget::Armor, ["TalRune", "ThulRune", "PerfectTopaz"]),
            ("Add Sockets to Helm", SocketTarget::Helm, ["RalRune", "ThulRune", "PerfectSapphire"]),
            ("Add Sockets to Shield", SocketTarget::Shield, ["TalRune", "AmnRune", "PerfectRuby"]),
        ];
        for (name, target, [a, b, c]) in table {
            recipes.push(Recipe::new(name, &[a, b, c, target.base_slot()]).with_kind(RecipeKind::AddSockets(target)));
        }
    }

    fn push_crafted(recipes: &mut Vec<Recipe>) {
        for (name, ingredients, required, purchasable) in CRAFTED {
            let mut recipe = Recipe::new(name, ingredients).with_purchase(required, purchasable);
            if name == names::CASTER_AMULET {
                recipe = recipe.with_gate(ResolutionGate::DeferUntilStocked(StockReserve {
                    when_enabled: [names::CASTER_AMULET, names::BLOOD_HELM_ARMET, names::CASTER_BELT_SHARKSKIN]
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                    jewels: 3,
                    items: vec![("RalRune".to_string(), 2), ("PerfectAmethyst".to_string(), 2)],
                }));
            }
            recipes.push(recipe);
        }
    }

    /// All recipes in processing order.
    pub fn iter(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.iter()
    }

    /// Looks up a recipe by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.name == name)
    }

    /// Number of recipes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    /// Returns true if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Returns true if `name` is an ingredient of a recipe enabled in `config`.
    #[must_use]
    pub fn is_enabled_ingredient(&self, name: &str, config: &CharacterConfig) -> bool {
        self.recipes.iter().any(|r| config.recipe_enabled(&r.name) && r.uses(name))
    }

    /// Returns true if any enabled recipe crafts with jewels.
    #[must_use]
    pub fn jewel_crafting_enabled(&self, config: &CharacterConfig) -> bool {
        self.recipes.iter().any(|r| {
            config.recipe_enabled(&r.name)
                && JEWEL_CRAFT_PREFIXES.iter().any(|p| r.name.starts_with(p))
                && r.uses(JEWEL)
        })
    }
}

impl Default for RecipeCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
