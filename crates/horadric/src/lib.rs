//! # HORADRIC
//!
//! **Item economy for a game bot: what to keep, what to craft, where it goes.**
//!
//! ## Layout
//!
//! ```text
//! ┌──────────────────┐   snapshot    ┌──────────────────────┐
//! │  horadric_core   │──────────────>│  horadric_economy    │
//! │  • Item          │               │  • Classifier        │
//! │  • GameSnapshot  │               │  • Resolver          │
//! │  • Fingerprint   │               │  • Cube / Town loops │
//! └──────────────────┘               └──────────┬───────────┘
//!                                               │ GameAction
//!                                               v
//!                                    ┌──────────────────────┐
//!                                    │  GameClient          │
//!                                    │  (SimulatedGame here)│
//!                                    └──────────────────────┘
//! ```
//!
//! This crate re-exports both halves and runs scenarios end to end.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

use thiserror::Error;
use tracing::info;

pub use horadric_core as core;
pub use horadric_economy as economy;

use horadric_economy::{
    CharacterConfig, ConfigStore, Economy, EconomyError, MemoryConfigStore, RecordingSink, RuleSet, Scenario,
    SimulatedGame, TownReport,
};

/// Scenario shipped with the crate, used when no file is given.
pub const DEMO_SCENARIO: &str = include_str!("../scenarios/gem_ladder.toml");

/// Rules used when no rule file is given: keep rare rings and amulets.
pub const DEMO_RULES: &str = r#"
[[rules]]
item_type = "Ring"
min_quality = "Rare"

[[rules]]
item_type = "Amulet"
min_quality = "Rare"
"#;

/// Errors from running a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// The scenario, rules or config were rejected.
    #[error("Invalid input: {0}")]
    Input(#[source] EconomyError),

    /// The town visit ended with a fatal error.
    #[error("Town visit failed: {0}")]
    Visit(#[source] EconomyError),
}

/// Outcome of one scenario run.
#[derive(Debug)]
pub struct ScenarioOutcome {
    /// Report of the final visit.
    pub report: TownReport,
    /// World after the run.
    pub game: SimulatedGame,
    /// Config as persisted by the run.
    pub persisted: CharacterConfig,
    /// Notifications sent during the run.
    pub notifications: usize,
}

/// Parses `scenario` and `rules`, then runs `visits` town visits.
///
/// # Errors
///
/// Returns error if the inputs are malformed or a visit ends fatally.
pub fn run_scenario(scenario: &str, rules: &str, visits: u32) -> Result<ScenarioOutcome, ScenarioError> {
    let scenario = Scenario::from_toml(scenario).map_err(ScenarioError::Input)?;
    scenario.config.validate().map_err(ScenarioError::Input)?;
    let rules = RuleSet::from_toml(rules).map_err(ScenarioError::Input)?;

    let name = scenario.config.character.name.clone();
    let store = MemoryConfigStore::with_config(scenario.config.clone());
    let sink = RecordingSink::new();
    let mut game = SimulatedGame::from_scenario(&scenario);
    let mut economy = Economy::new(scenario.config, &rules, &store).with_sink(&sink);

    info!(character = %name, visits, "running scenario");
    let mut report = TownReport::default();
    for visit in 1..=visits.max(1) {
        report = economy.town_visit(&mut game).map_err(ScenarioError::Visit)?;
        info!(visit, ?report, "town visit complete");
        if report.switch_to.is_some() {
            break;
        }
    }

    let persisted = store.load(&name).unwrap_or_else(|_| economy.config.clone());
    Ok(ScenarioOutcome {
        report,
        game,
        persisted,
        notifications: sink.received().len(),
    })
}
