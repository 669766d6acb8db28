//! # Economy Engine
//!
//! **One character's decision state and its collaborators**
//!
//! [`Economy`] owns the mutable state of the decision core: the character
//! config, the mark registry and the session context. Collaborators that are
//! shared or external (rule evaluator, config store, notification sink) are
//! borrowed. The stash, pickup, cube and town routines are implemented on
//! this type in their own modules.
//!
//! ```text
//! ┌──────────────┐   snapshot    ┌───────────────┐   GameAction   ┌──────────┐
//! │ GameClient   │ ────────────▶ │    Economy    │ ─────────────▶ │ GameClient│
//! └──────────────┘               │ classify      │                └──────────┘
//!                                │ resolve       │   save
//!                                │ persist marks │ ────────────▶ ConfigStore
//!                                └───────────────┘
//! ```

use std::sync::Arc;

use horadric_core::{GameSnapshot, Item};

use crate::actions::{NotificationSink, NullSink};
use crate::catalog::RecipeCatalog;
use crate::classifier::{apply_mark_hook, Classification, Classifier};
use crate::config::{CharacterConfig, ConfigStore};
use crate::error::EconomyResult;
use crate::marks::MarkRegistry;
use crate::pickup::PickupLock;
use crate::rules::RuleEvaluator;
use crate::session::{InterruptGate, SessionContext};
use crate::vendor::SellPlanner;

/// Decision state for one character.
pub struct Economy<'a> {
    /// Character configuration, written back on every mark change.
    pub config: CharacterConfig,
    /// Marked reroll items.
    pub marks: MarkRegistry,
    /// Session-scoped state.
    pub session: SessionContext,
    /// Recipe table.
    pub catalog: RecipeCatalog,
    pub(crate) rules: &'a dyn RuleEvaluator,
    pub(crate) store: &'a dyn ConfigStore,
    pub(crate) sink: &'a dyn NotificationSink,
    pub(crate) gate: InterruptGate,
    pub(crate) pickup_lock: Arc<PickupLock>,
}

impl<'a> Economy<'a> {
    /// Creates an economy from an already-loaded config.
    #[must_use]
    pub fn new(config: CharacterConfig, rules: &'a dyn RuleEvaluator, store: &'a dyn ConfigStore) -> Self {
        let marks = MarkRegistry::from_config(&config);
        Self {
            config,
            marks,
            session: SessionContext::new(),
            catalog: RecipeCatalog::standard(),
            rules,
            store,
            sink: &NullSink,
            gate: InterruptGate::detached(),
            pickup_lock: Arc::new(PickupLock::new()),
        }
    }

    /// Loads `character` from `store`.
    ///
    /// # Errors
    ///
    /// Returns error if the config cannot be loaded.
    pub fn load(character: &str, rules: &'a dyn RuleEvaluator, store: &'a dyn ConfigStore) -> EconomyResult<Self> {
        let config = store.load(character)?;
        Ok(Self::new(config, rules, store))
    }

    /// Sets the notification sink.
    #[must_use]
    pub fn with_sink(mut self, sink: &'a dyn NotificationSink) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the interrupt gate.
    #[must_use]
    pub fn with_gate(mut self, gate: InterruptGate) -> Self {
        self.gate = gate;
        self
    }

    /// Replaces the recipe table.
    #[must_use]
    pub fn with_catalog(mut self, catalog: RecipeCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Shares the pickup guard with another handle to the same character.
    #[must_use]
    pub fn with_pickup_lock(mut self, lock: Arc<PickupLock>) -> Self {
        self.pickup_lock = lock;
        self
    }

    /// The rule evaluator.
    #[must_use]
    pub fn rules(&self) -> &'a dyn RuleEvaluator {
        self.rules
    }

    /// The interrupt gate.
    #[must_use]
    pub const fn gate(&self) -> &InterruptGate {
        &self.gate
    }

    /// Starts a fresh session: first-run amnesty again, empty blacklist.
    pub fn reset_session(&mut self) {
        self.session = SessionContext::new();
    }

    /// Persists marks if dirty. Returns false if a save failed.
    pub fn persist_marks(&mut self) -> bool {
        self.marks.persist(&mut self.config, self.store)
    }

    /// Re-derives session handles from persisted fingerprints.
    pub fn rehydrate(&mut self, snapshot: &GameSnapshot) {
        self.marks.rehydrate(snapshot);
    }

    /// Classifier view over the current state.
    #[must_use]
    pub fn classifier(&self) -> Classifier<'_> {
        Classifier::new(&self.config, self.rules, &self.catalog, &self.marks)
    }

    /// Sell planner view over the current state.
    #[must_use]
    pub fn sell_planner(&self) -> SellPlanner<'_> {
        SellPlanner::new(&self.config, self.rules, &self.catalog, &self.marks)
    }

    /// Classifies every non-potion inventory item, then applies mark hooks.
    pub fn classify_inventory(&mut self, snapshot: &GameSnapshot, first_run: bool) -> Vec<(Item, Classification)> {
        let classified: Vec<(Item, Classification)> = {
            let classifier = self.classifier();
            snapshot
                .inventory()
                .filter(|it| !it.is_potion())
                .map(|it| (it.clone(), classifier.classify(it, snapshot, first_run)))
                .collect()
        };
        for (_, classification) in &classified {
            apply_mark_hook(classification, &mut self.marks, &mut self.config, self.store);
        }
        classified
    }
}
