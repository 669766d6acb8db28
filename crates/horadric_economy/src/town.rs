//! # Town Routine
//!
//! **Overflow check, stash, cube, stash**
//!
//! One town visit runs these steps in order, with an interrupt checkpoint
//! between each of them:
//!
//! 1. Muling overflow check. A switch ends the visit early so the supervisor
//!    can log into the next mule.
//! 2. First-run stash, once per session.
//! 3. Stash.
//! 4. Cube recipes.
//! 5. Stash again, for anything the cube left behind.
//!
//! A failing step is logged and the visit continues. Only fatal errors
//! escape to the supervisor.

use horadric_core::{GameSnapshot, LocationKind, UnitId};
use tracing::{error, info, warn};

use crate::actions::GameClient;
use crate::config::{CharacterConfig, ConfigStore};
use crate::engine::Economy;
use crate::error::{EconomyError, EconomyResult};
use crate::orchestrator::CubeReport;
use crate::stash::{StashReport, PERSONAL_TAB};

// ============================================================================
// MULING OVERFLOW
// ============================================================================

/// What the overflow check decided.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OverflowDecision {
    /// Keep playing this character.
    Stay,
    /// Switch to the named mule profile.
    SwitchTo(String),
}

/// Shared-stash fill policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverflowPolicy {
    /// Shared stash slots across all pages.
    pub capacity: u32,
    /// Fill percentage that triggers a switch.
    pub threshold_percent: u8,
}

impl OverflowPolicy {
    /// Builds the policy from config.
    #[must_use]
    pub fn from_config(config: &CharacterConfig) -> Self {
        Self {
            capacity: u32::from(config.stash.shared_pages) * config.stash.page_slots,
            threshold_percent: config.muling.fill_threshold_percent,
        }
    }

    /// Fill percentage of the shared stash in `snapshot`.
    #[must_use]
    pub fn fill_percent(&self, snapshot: &GameSnapshot) -> u32 {
        if self.capacity == 0 {
            return 100;
        }
        let used = snapshot.by_location(&[LocationKind::SharedStash]).count() as u32;
        used.saturating_mul(100) / self.capacity
    }

    /// Decides whether to switch mules, persisting the rotation index first.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::AllMulesFull`] once every mule has been used,
    /// or [`EconomyError::Persistence`] if the new index cannot be saved, in
    /// which case no switch happens.
    pub fn check(
        &self,
        snapshot: &GameSnapshot,
        config: &mut CharacterConfig,
        store: &dyn ConfigStore,
    ) -> EconomyResult<OverflowDecision> {
        if !config.muling.enabled {
            return Ok(OverflowDecision::Stay);
        }
        let fill = self.fill_percent(snapshot);

        if fill < u32::from(self.threshold_percent) {
            if config.muling.current_mule_index != 0 {
                info!(fill, "shared stash has room again, resetting mule rotation");
                config.muling.current_mule_index = 0;
                if let Err(e) = store.save(config.name(), config) {
                    error!(error = %e, "failed to persist mule index reset");
                }
            }
            return Ok(OverflowDecision::Stay);
        }

        let index = config.muling.current_mule_index;
        let Some(mule) = config.muling.mules.get(index).cloned() else {
            return Err(EconomyError::AllMulesFull {
                mules: config.muling.mules.len(),
            });
        };
        config.muling.current_mule_index = index + 1;
        if let Err(e) = store.save(config.name(), config) {
            config.muling.current_mule_index = index;
            return Err(EconomyError::Persistence(e.to_string()));
        }
        info!(fill, %mule, "shared stash over threshold, switching mule");
        Ok(OverflowDecision::SwitchTo(mule))
    }
}

// ============================================================================
// TOWN VISIT
// ============================================================================

/// Outcome of one town visit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TownReport {
    /// Mule to switch to; when set the other steps did not run.
    pub switch_to: Option<String>,
    /// First-run stash pass, if this was the first visit of the session.
    pub first_run: Option<StashReport>,
    /// Stash pass before the cube.
    pub stash: Option<StashReport>,
    /// Cube pass.
    pub cube: Option<CubeReport>,
    /// Stash pass after the cube.
    pub restash: Option<StashReport>,
}

fn step<T>(name: &str, result: EconomyResult<T>) -> EconomyResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(step = name, error = %e, "town step failed, continuing");
            Ok(None)
        }
    }
}

impl Economy<'_> {
    /// Runs one town visit.
    ///
    /// # Errors
    ///
    /// Returns only fatal errors: [`EconomyError::Stopped`] or
    /// [`EconomyError::AllMulesFull`].
    pub fn town_visit<G: GameClient + ?Sized>(&mut self, game: &mut G) -> EconomyResult<TownReport> {
        let mut report = TownReport::default();
        self.gate.checkpoint()?;

        if !self.session.shared_stash_checked {
            let snapshot = game.snapshot()?;
            let policy = OverflowPolicy::from_config(&self.config);
            match step("overflow", policy.check(&snapshot, &mut self.config, self.store))? {
                Some(OverflowDecision::SwitchTo(mule)) => {
                    report.switch_to = Some(mule);
                    return Ok(report);
                }
                Some(OverflowDecision::Stay) => self.session.shared_stash_checked = true,
                None => {}
            }
        }

        if self.session.first_run {
            self.gate.checkpoint()?;
            report.first_run = step("first-run stash", self.stash_inventory(game))?;
        }

        self.gate.checkpoint()?;
        report.stash = step("stash", self.stash_inventory(game))?;

        self.gate.checkpoint()?;
        report.cube = step("cube", self.run_cube_recipes(game))?;

        self.gate.checkpoint()?;
        report.restash = step("restash", self.stash_inventory(game))?;

        let on_shared = |stashed: &[(UnitId, u8)]| stashed.iter().any(|(_, tab)| *tab > PERSONAL_TAB);
        let shared_touched = [&report.first_run, &report.stash, &report.restash]
            .into_iter()
            .flatten()
            .any(|r| on_shared(&r.stashed))
            || report.cube.as_ref().is_some_and(|c| on_shared(&c.stashed));
        if shared_touched {
            self.session.shared_stash_checked = false;
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfigStore;
    use horadric_core::{Item, ItemType, Location, Position, Quality};

    fn config(mules: &[&str]) -> CharacterConfig {
        let mut config = CharacterConfig::default();
        config.character.name = "sorc".into();
        config.muling.enabled = true;
        config.muling.mules = mules.iter().map(ToString::to_string).collect();
        config.stash.shared_pages = 1;
        config.stash.page_slots = 10;
        config
    }

    fn shared_items(count: u32) -> GameSnapshot {
        let mut snapshot = GameSnapshot::default();
        for i in 0..count {
            snapshot.items.push(
                Item::new(i + 1, "Ring", ItemType::Ring, Quality::Rare)
                    .at(Location::on_page(LocationKind::SharedStash, 0, Position::new(i as i32, 0))),
            );
        }
        snapshot
    }

    #[test]
    fn test_below_threshold_stays() {
        let mut config = config(&["mule1"]);
        let store = MemoryConfigStore::new();
        let policy = OverflowPolicy::from_config(&config);
        assert_eq!(policy.check(&shared_items(7), &mut config, &store), Ok(OverflowDecision::Stay));
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_over_threshold_switches_and_persists_first() {
        let mut config = config(&["mule1", "mule2"]);
        let store = MemoryConfigStore::new();
        let policy = OverflowPolicy::from_config(&config);
        let decision = policy.check(&shared_items(8), &mut config, &store);
        assert_eq!(decision, Ok(OverflowDecision::SwitchTo("mule1".into())));
        assert_eq!(store.stored("sorc").map(|c| c.muling.current_mule_index), Some(1));
    }

    #[test]
    fn test_exhausted_mules_is_fatal() {
        let mut config = config(&["mule1"]);
        config.muling.current_mule_index = 1;
        let store = MemoryConfigStore::new();
        let policy = OverflowPolicy::from_config(&config);
        let result = policy.check(&shared_items(9), &mut config, &store);
        assert!(matches!(result, Err(EconomyError::AllMulesFull { mules: 1 })));
        assert!(result.unwrap_err().is_fatal());
    }

    #[test]
    fn test_failed_save_does_not_switch() {
        let mut config = config(&["mule1"]);
        let store = MemoryConfigStore::new();
        store.fail_saves(true);
        let policy = OverflowPolicy::from_config(&config);
        let result = policy.check(&shared_items(10), &mut config, &store);
        assert!(matches!(result, Err(EconomyError::Persistence(_))));
        assert_eq!(config.muling.current_mule_index, 0);
    }

    #[test]
    fn test_room_again_resets_index() {
        let mut config = config(&["mule1", "mule2"]);
        config.muling.current_mule_index = 2;
        let store = MemoryConfigStore::new();
        let policy = OverflowPolicy::from_config(&config);
        assert_eq!(policy.check(&shared_items(1), &mut config, &store), Ok(OverflowDecision::Stay));
        assert_eq!(config.muling.current_mule_index, 0);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_disabled_muling_never_switches() {
        let mut config = config(&[]);
        config.muling.enabled = false;
        let store = MemoryConfigStore::new();
        let policy = OverflowPolicy::from_config(&config);
        assert_eq!(policy.check(&shared_items(10), &mut config, &store), Ok(OverflowDecision::Stay));
    }
}
