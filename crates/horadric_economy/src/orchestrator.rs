//! # Cube Orchestrator
//!
//! **Resolve, purchase, transmute, reconcile, persist**
//!
//! Every enabled recipe is driven through the same cycle on each town visit:
//!
//! ```text
//! Scanning ──▶ Gathering ──▶ Executing ──▶ Reconciliation
//!     ▲        (purchase)    (cube +          │
//!     │                      transmute)       │
//!     └──────────── same recipe again ◀───────┘
//! ```
//!
//! A recipe repeats until the resolver reports nothing to do, then the next
//! enabled recipe starts. Every iteration resolves against a fresh snapshot,
//! so results and skipped keepers are always seen as they really are.
//!
//! ## Failure Model
//!
//! A failed purchase, cube move or transmute abandons the current recipe and
//! moves on. Whatever reached the cube goes back to the stash. A cube found
//! non-empty before gathering is emptied the same way. Only fatal errors end
//! the loop.
//!
//! ## Persistence Boundary
//!
//! Whenever a mark fingerprint is created, corrected or cleared it is saved
//! before the next action runs.

use std::collections::HashSet;

use horadric_core::{GameSnapshot, Item, LocationKind, Quality, UnitId};
use tracing::{debug, error, info, warn};

use crate::actions::{retry_action, GameAction, GameClient};
use crate::catalog::{Recipe, RecipeKind, LEG_ITEM};
use crate::classifier::{Disposition, StashReason, NEVER_TOUCH};
use crate::engine::Economy;
use crate::error::{EconomyError, EconomyResult};
use crate::marks::RerollCategory;
use crate::resolver::{Resolution, Resolver};

/// Outcome of one cube pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CubeReport {
    /// Recipes transmuted, once per successful iteration.
    pub crafted: Vec<String>,
    /// Recipes abandoned after a failed iteration.
    pub failed: Vec<String>,
    /// Cube results moved to the stash.
    pub stashed: Vec<(UnitId, u8)>,
}

const fn reroll_category(kind: RecipeKind) -> Option<RerollCategory> {
    match kind {
        RecipeKind::RerollMagic => Some(RerollCategory::Magic),
        RecipeKind::RerollRare => Some(RerollCategory::Rare),
        _ => None,
    }
}

fn inventory_units(snapshot: &GameSnapshot) -> HashSet<UnitId> {
    snapshot.inventory().map(|it| it.unit_id).collect()
}

impl Economy<'_> {
    /// Runs every enabled recipe until none can be resolved.
    ///
    /// # Errors
    ///
    /// Returns only fatal errors ([`EconomyError::Stopped`] or a fatal
    /// collaborator failure). Everything else abandons one recipe.
    pub fn run_cube_recipes<G: GameClient + ?Sized>(&mut self, game: &mut G) -> EconomyResult<CubeReport> {
        let mut report = CubeReport::default();
        if !self.config.cube_recipes.enabled {
            debug!("cube recipes disabled");
            return Ok(report);
        }

        let recipes: Vec<Recipe> = self
            .catalog
            .iter()
            .filter(|r| self.config.recipe_enabled(&r.name))
            .cloned()
            .collect();

        for recipe in &recipes {
            loop {
                self.gate.checkpoint()?;
                let snapshot = self.scan(game)?;
                let pool = snapshot.stash_pool();
                let inventory: Vec<Item> = snapshot.inventory().cloned().collect();
                let resolution = Resolver::new(&self.config, self.rules).resolve(recipe, &pool, &inventory, &mut self.marks);
                if self.marks.is_dirty() {
                    self.persist_marks();
                }
                let Resolution::Ready(items) = resolution else {
                    break;
                };

                match self.craft_once(game, recipe, &items, &mut report) {
                    Ok(()) => {
                        info!(recipe = %recipe.name, "recipe transmuted");
                        report.crafted.push(recipe.name.clone());
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!(recipe = %recipe.name, error = %e, "recipe iteration abandoned");
                        report.failed.push(recipe.name.clone());
                        break;
                    }
                }
            }
        }
        Ok(report)
    }

    /// Reads a fresh snapshot with an empty cube and rehydrated marks.
    fn scan<G: GameClient + ?Sized>(&mut self, game: &mut G) -> EconomyResult<GameSnapshot> {
        let mut snapshot = game.snapshot()?;
        if snapshot.items.iter().any(|it| it.is_in(LocationKind::Cube)) {
            warn!("cube not empty before gathering, returning its contents");
            self.empty_cube(game)?;
            snapshot = game.snapshot()?;
        }
        self.rehydrate(&snapshot);
        Ok(snapshot)
    }

    /// One purchase, cube and transmute cycle for a resolved ingredient set.
    /// Anything left in the cube by a failure is returned to the stash.
    fn craft_once<G: GameClient + ?Sized>(
        &mut self,
        game: &mut G,
        recipe: &Recipe,
        items: &[Item],
        report: &mut CubeReport,
    ) -> EconomyResult<()> {
        let mut ingredients: Vec<UnitId> = items.iter().map(|it| it.unit_id).collect();
        if recipe.requires_purchase() {
            ingredients.push(self.purchase(game, recipe)?);
        }

        let before = inventory_units(&game.snapshot()?);
        if let Err(e) = self.fill_and_transmute(game, &ingredients) {
            if e.is_fatal() {
                return Err(e);
            }
            if let Err(cleanup) = self.empty_cube(game) {
                error!(recipe = %recipe.name, error = %cleanup, "failed to empty cube after abandoned craft");
            }
            return Err(e);
        }

        let after = game.snapshot()?;
        let produced: Vec<Item> = after
            .inventory()
            .filter(|it| !before.contains(&it.unit_id))
            .cloned()
            .collect();
        debug!(recipe = %recipe.name, produced = produced.len(), "transmute produced items");

        if let Some(category) = reroll_category(recipe.kind) {
            self.rebind_reroll_result(category, &produced);
        }
        self.reconcile(game, &after, &produced, report)
    }

    fn fill_and_transmute<G: GameClient + ?Sized>(&self, game: &mut G, ingredients: &[UnitId]) -> EconomyResult<()> {
        for unit in ingredients {
            self.gate.checkpoint()?;
            retry_action(game, &GameAction::MoveToCube { unit: *unit })?;
        }
        self.gate.checkpoint()?;
        retry_action(game, &GameAction::Transmute)?;
        Ok(())
    }

    /// Moves everything in the cube back to the stash. Returns how many
    /// items were returned.
    ///
    /// # Errors
    ///
    /// Returns the first action or snapshot failure. Items already returned
    /// stay returned.
    pub fn empty_cube<G: GameClient + ?Sized>(&mut self, game: &mut G) -> EconomyResult<usize> {
        let snapshot = game.snapshot()?;
        let units: Vec<UnitId> = snapshot
            .items
            .iter()
            .filter(|it| it.is_in(LocationKind::Cube))
            .map(|it| it.unit_id)
            .collect();
        if units.is_empty() {
            return Ok(0);
        }
        for unit in &units {
            retry_action(game, &GameAction::TakeFromCube { unit: *unit })?;
        }

        let snapshot = game.snapshot()?;
        let taken: Vec<Item> = snapshot
            .inventory()
            .filter(|it| units.contains(&it.unit_id))
            .cloned()
            .collect();
        for item in &taken {
            self.stash_item(game, item, StashReason::CubeReturn)?;
        }
        info!(returned = taken.len(), "cube emptied");
        Ok(taken.len())
    }

    /// Buys one purchasable base for `recipe`, returning its unit.
    fn purchase<G: GameClient + ?Sized>(&self, game: &mut G, recipe: &Recipe) -> EconomyResult<UnitId> {
        let candidates = recipe.purchase.as_ref().map(|p| p.items.clone()).unwrap_or_default();
        let before = inventory_units(&game.snapshot()?);
        self.gate.checkpoint()?;
        retry_action(
            game,
            &GameAction::Gamble {
                candidates: candidates.clone(),
                min_quality: Quality::Magic,
            },
        )
        .map_err(|e| EconomyError::PurchaseFailed {
            recipe: recipe.name.clone(),
            reason: e.to_string(),
        })?;

        let snapshot = game.snapshot()?;
        let bought = snapshot
            .inventory()
            .find(|it| {
                !before.contains(&it.unit_id) && candidates.contains(&it.name) && it.quality >= Quality::Magic
            })
            .map(|it| {
                info!(recipe = %recipe.name, item = %it, "purchased ingredient");
                it.unit_id
            })
            .ok_or_else(|| EconomyError::PurchaseFailed {
                recipe: recipe.name.clone(),
                reason: "no matching item appeared in the inventory".into(),
            });
        bought
    }

    /// Follows the rerolled item to its new fingerprint, or drops the mark if
    /// the reroll produced a keeper. Persists before returning.
    fn rebind_reroll_result(&mut self, category: RerollCategory, produced: &[Item]) {
        let admits = self.marks.fingerprint_category(category);
        let Some(result) = produced.iter().find(|it| admits.admits(it)) else {
            warn!(?category, "reroll result not found in inventory");
            return;
        };
        if self.rules.evaluate(result).is_full() {
            info!(item = %result, ?category, "reroll produced a keeper, dropping mark");
            self.marks.clear(category);
        } else {
            let fingerprint = self.marks.fingerprint(category, result);
            self.marks.bind(category, fingerprint);
            self.marks.set_handle(category, result.unit_id);
        }
        self.persist_marks();
    }

    /// Stashes cube results that must not stay in the inventory.
    fn reconcile<G: GameClient + ?Sized>(
        &mut self,
        game: &mut G,
        snapshot: &GameSnapshot,
        produced: &[Item],
        report: &mut CubeReport,
    ) -> EconomyResult<()> {
        for item in produced {
            if self.config.inventory.is_locked(item.location.position)
                || NEVER_TOUCH.contains(&item.name.as_str())
                || item.is_potion()
            {
                continue;
            }
            let reason = if let Some(category) = self.marks.marked_category(item) {
                StashReason::MarkedItem(category)
            } else if item.name == LEG_ITEM && item.quality >= Quality::Magic {
                StashReason::CubeResult
            } else {
                match self.classifier().classify(item, snapshot, false).disposition {
                    Disposition::Stash(reason) => reason,
                    Disposition::Keep => StashReason::CubeResult,
                    Disposition::Drop(_) => continue,
                }
            };
            match self.stash_item(game, item, reason) {
                Ok(tab) => report.stashed.push((item.unit_id, tab)),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(%item, error = %e, "cube result left in inventory"),
            }
        }
        Ok(())
    }
}
