//! # Ground Pickup
//!
//! **Re-entrancy guarded pickup, marking and identify-and-bind**
//!
//! The pickup path must never run twice at once for one character.
//! [`PickupLock::try_acquire`] hands out a [`PickupGuard`] that releases the
//! lock when dropped, on every exit path including `?` returns.
//!
//! Picking up a reroll target runs the monster-level assessment first. A
//! freshly marked item holds only a session handle until it is identified;
//! [`Economy::identify_and_bind`] then either binds its fingerprint and
//! persists it, or drops the mark if the item is a keeper.

use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

use horadric_core::{Item, LocationKind, UnitId};
use tracing::{debug, info, warn};

use crate::actions::{retry_action, wait_until, GameAction, GameClient, DEFAULT_POLL, DEFAULT_WAIT};
use crate::engine::Economy;
use crate::error::EconomyResult;
use crate::marking::{mark_if_eligible, Assessment, LevelTables};
use crate::marks::RerollCategory;
use crate::rules::RuleMatch;

/// Held/not-held flag for the pickup path.
#[derive(Debug, Default)]
pub struct PickupLock {
    inner: Mutex<()>,
}

/// Proof that the pickup path is held. Releases on drop.
#[derive(Debug)]
pub struct PickupGuard<'a> {
    _held: MutexGuard<'a, ()>,
}

impl PickupLock {
    /// Creates a released lock.
    #[must_use]
    pub const fn new() -> Self {
        Self { inner: Mutex::new(()) }
    }

    /// Takes the lock if it is free.
    #[must_use]
    pub fn try_acquire(&self) -> Option<PickupGuard<'_>> {
        self.inner.try_lock().map(|held| PickupGuard { _held: held })
    }

    /// Returns true while a guard is alive.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.inner.is_locked()
    }
}

/// Outcome of one pickup pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PickupReport {
    /// Items picked up.
    pub picked: Vec<UnitId>,
    /// Items marked for reroll.
    pub marked: Vec<(UnitId, RerollCategory)>,
    /// True if another pickup pass was already running.
    pub skipped: bool,
}

impl Economy<'_> {
    fn wants(&self, item: &Item) -> bool {
        !matches!(self.rules.evaluate(item), RuleMatch::NoMatch)
            || RerollCategory::ALL
                .into_iter()
                .any(|c| self.marks.fingerprint_category(c).admits(item))
    }

    /// Picks up every wanted ground item, marking reroll targets on the way.
    ///
    /// Returns immediately with `skipped` set if a pass is already running.
    ///
    /// # Errors
    ///
    /// Returns a snapshot error or [`crate::EconomyError::Stopped`].
    pub fn pick_up_ground_items<G: GameClient + ?Sized>(
        &mut self,
        game: &mut G,
        tables: &LevelTables,
    ) -> EconomyResult<PickupReport> {
        let lock = Arc::clone(&self.pickup_lock);
        let Some(_guard) = lock.try_acquire() else {
            debug!("pickup already in progress");
            return Ok(PickupReport {
                skipped: true,
                ..PickupReport::default()
            });
        };

        let snapshot = game.snapshot()?;
        let candidates: Vec<Item> = snapshot
            .by_location(&[LocationKind::Ground])
            .filter(|it| !self.session.is_blacklisted(it.unit_id) && self.wants(it))
            .cloned()
            .collect();

        let mut report = PickupReport::default();
        for item in candidates {
            self.gate.checkpoint()?;
            let mut marked = None;
            for category in RerollCategory::ALL {
                if let Assessment::Accepted { .. } = mark_if_eligible(&item, category, &snapshot, &mut self.marks, tables)
                {
                    marked = Some(category);
                    break;
                }
            }

            if let Err(e) = retry_action(game, &GameAction::PickUp { unit: item.unit_id }) {
                warn!(%item, error = %e, "pickup failed, blacklisting");
                self.session.blacklist(item.unit_id);
                if let Some(category) = marked {
                    self.marks.reset_handle(category);
                }
                continue;
            }
            self.session.record_pickup(item.unit_id);
            report.picked.push(item.unit_id);

            if let Some(category) = marked {
                report.marked.push((item.unit_id, category));
                self.gate.checkpoint()?;
                if let Err(e) = self.identify_and_bind(game, category, item.unit_id) {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    warn!(%item, error = %e, "identify-and-bind failed, handle kept for this session");
                }
            }
        }
        Ok(report)
    }

    /// Identifies a freshly marked item and binds its fingerprint, or drops
    /// the mark if the identified item is a keeper.
    ///
    /// # Errors
    ///
    /// Returns the identify failure or a wait timeout. The handle is kept.
    pub fn identify_and_bind<G: GameClient + ?Sized>(
        &mut self,
        game: &mut G,
        category: RerollCategory,
        unit: UnitId,
    ) -> EconomyResult<()> {
        let current = game.snapshot()?;
        let already = current.find(unit).is_some_and(|it| it.identified);
        if !already {
            retry_action(game, &GameAction::Identify { unit })?;
        }
        let snapshot = wait_until(
            game,
            |s| s.find(unit).is_some_and(|it| it.identified),
            DEFAULT_WAIT,
            DEFAULT_POLL,
        )?;
        let Some(item) = snapshot.find(unit) else {
            self.marks.reset_handle(category);
            return Ok(());
        };

        if self.rules.evaluate(item).is_full() {
            info!(%item, ?category, "identified marked item is a keeper, dropping mark");
            self.marks.clear(category);
            self.persist_marks();
            return Ok(());
        }

        let fingerprint = self.marks.fingerprint(category, item);
        if fingerprint.is_empty() {
            warn!(%item, ?category, "identified item no longer matches the reroll target");
            self.marks.reset_handle(category);
            return Ok(());
        }
        self.marks.bind(category, fingerprint);
        self.persist_marks();
        Ok(())
    }
}
