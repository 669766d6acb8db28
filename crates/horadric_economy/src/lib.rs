//! # HORADRIC Economy
//!
//! The item-economy decision core of one bot character: what to keep, what to
//! stash, what to drop, and which cube recipes to run with what.
//!
//! ## Design Principles
//!
//! 1. **Pure decisions** - classification and resolution read a snapshot and
//!    return a decision, nothing else
//! 2. **Bounded actions** - every external action goes through a trait, is
//!    retried a fixed number of times and waited on with a deadline
//! 3. **Write, then proceed** - a changed mark fingerprint is saved before the
//!    next action runs
//! 4. **External configuration** - character config, keep rules and level
//!    tables are TOML files
//!
//! ## Threading
//!
//! One logical control thread per character. The only mutual exclusion is
//! the pickup guard; supervisor control arrives through the interrupt gate.
//!
//! ## Example
//!
//! ```rust,ignore
//! use horadric_economy::{Economy, RuleSet, SimulatedGame, TomlConfigStore};
//!
//! let store = TomlConfigStore::new("config/characters");
//! let rules = RuleSet::from_toml(&std::fs::read_to_string("config/rules.toml")?)?;
//! let mut economy = Economy::load("sorc", &rules, &store)?;
//!
//! let mut game = SimulatedGame::new(snapshot);
//! let report = economy.town_visit(&mut game)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod actions;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod marking;
pub mod marks;
pub mod notify;
pub mod orchestrator;
pub mod pickup;
pub mod resolver;
pub mod rules;
pub mod session;
pub mod sim;
pub mod stash;
pub mod town;
pub mod vendor;

pub use actions::{
    retry_action, wait_until, ActionExecutor, GameAction, GameClient, Notification, NotificationSink, NullSink,
    SnapshotProvider,
};
pub use catalog::{Recipe, RecipeCatalog, RecipeKind, ResolutionGate, SocketTarget};
pub use classifier::{Classification, Classifier, Disposition, DropReason, StashReason};
pub use config::{CharacterConfig, ConfigStore, MemoryConfigStore, TomlConfigStore};
pub use engine::Economy;
pub use error::{ActionError, EconomyError, EconomyResult, ErrorSeverity};
pub use marking::{assess_level, mark_if_eligible, Assessment, LevelTables};
pub use marks::{MarkRegistry, RerollCategory};
pub use orchestrator::CubeReport;
pub use pickup::{PickupGuard, PickupLock, PickupReport};
pub use resolver::{Blocked, Resolution, Resolver};
pub use rules::{KeepRule, RuleEvaluator, RuleMatch, RuleSet, TierMatch, Wearer};
pub use session::{ControlSignal, InterruptGate, SessionContext};
pub use sim::{RecordingSink, Scenario, SimulatedGame};
pub use stash::StashReport;
pub use town::{OverflowDecision, OverflowPolicy, TownReport};
pub use vendor::SellPlanner;
