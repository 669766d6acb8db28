//! # Collaborator Seams
//!
//! **Everything the economy asks the outside world to do**
//!
//! The decision core never reads game memory or injects input. It pulls
//! snapshots from a [`SnapshotProvider`], pushes [`GameAction`]s through an
//! [`ActionExecutor`], and reports interesting events to a
//! [`NotificationSink`].
//!
//! ## Failure Model
//!
//! Each action either succeeds (observable on the next snapshot) or returns a
//! typed [`ActionError`]. There is no partial success. Transient failures are
//! retried [`ACTION_RETRIES`] times by [`retry_action`]; effects are awaited
//! with the bounded poll in [`wait_until`].

use std::thread;
use std::time::{Duration, Instant};

use horadric_core::{GameSnapshot, Item, Quality, UnitId};
use tracing::{debug, warn};

use crate::error::{ActionError, EconomyResult};

/// Attempts per action before the enclosing step is abandoned.
pub const ACTION_RETRIES: u32 = 3;

/// Default bound for waiting on an action's effect.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(3);

/// Default interval between snapshot polls.
pub const DEFAULT_POLL: Duration = Duration::from_millis(100);

// ============================================================================
// ACTIONS
// ============================================================================

/// One external action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameAction {
    /// Move an inventory item into a stash tab. Tab 1 is personal, 2.. shared.
    StashItem {
        /// Item to move.
        unit: UnitId,
        /// Destination tab.
        tab: u8,
    },
    /// Move a stash item into the inventory.
    TakeFromStash {
        /// Item to move.
        unit: UnitId,
    },
    /// Put an item in the Horadric Cube.
    MoveToCube {
        /// Item to move.
        unit: UnitId,
    },
    /// Take an item out of the Horadric Cube into the inventory.
    TakeFromCube {
        /// Item to move.
        unit: UnitId,
    },
    /// Press transmute.
    Transmute,
    /// Drop an inventory item on the ground.
    DropItem {
        /// Item to drop.
        unit: UnitId,
    },
    /// Sell an inventory item to the open vendor.
    SellItem {
        /// Item to sell.
        unit: UnitId,
    },
    /// Gamble or buy one of the named items from the open vendor.
    Gamble {
        /// Acceptable base names.
        candidates: Vec<String>,
        /// Minimum quality of the purchased item.
        min_quality: Quality,
    },
    /// Pick an item up from the ground.
    PickUp {
        /// Item to pick up.
        unit: UnitId,
    },
    /// Identify an inventory item.
    Identify {
        /// Item to identify.
        unit: UnitId,
    },
}

/// Performs game actions.
pub trait ActionExecutor {
    /// Performs one action.
    ///
    /// # Errors
    ///
    /// Returns the typed failure when the action did not take effect.
    fn execute(&mut self, action: GameAction) -> Result<(), ActionError>;
}

/// Supplies fresh game snapshots on demand.
pub trait SnapshotProvider {
    /// Reads the current game state.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EconomyError::Snapshot`] if the state cannot be read.
    fn snapshot(&mut self) -> EconomyResult<GameSnapshot>;
}

/// A game connection that can both observe and act.
pub trait GameClient: SnapshotProvider + ActionExecutor {}

impl<T: SnapshotProvider + ActionExecutor + ?Sized> GameClient for T {}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// Something worth telling the user about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// Human-readable message.
    pub message: String,
    /// The item involved, if any.
    pub item: Option<Item>,
    /// Whether a screenshot should be attached.
    pub screenshot: bool,
}

impl Notification {
    /// Notification about an item.
    #[must_use]
    pub fn item(message: impl Into<String>, item: &Item) -> Self {
        Self {
            message: message.into(),
            item: Some(item.clone()),
            screenshot: true,
        }
    }
}

/// Fire-and-forget event sink. Failures are the sink's problem.
pub trait NotificationSink {
    /// Sends a notification.
    fn notify(&self, notification: Notification);
}

/// Sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _notification: Notification) {}
}

// ============================================================================
// RETRY AND WAIT
// ============================================================================

/// Executes `action`, retrying up to [`ACTION_RETRIES`] attempts. A
/// [`ActionError::Rejected`] is final and not retried.
///
/// # Errors
///
/// Returns the last failure once attempts are exhausted.
pub fn retry_action<E: ActionExecutor + ?Sized>(executor: &mut E, action: &GameAction) -> Result<(), ActionError> {
    let mut last = ActionError::NotRegistered;
    for attempt in 1..=ACTION_RETRIES {
        match executor.execute(action.clone()) {
            Ok(()) => return Ok(()),
            Err(e @ ActionError::Rejected(_)) => {
                debug!(?action, error = %e, "action rejected");
                return Err(e);
            }
            Err(e) => {
                warn!(?action, attempt, error = %e, "action failed");
                last = e;
            }
        }
    }
    Err(last)
}

/// Polls `provider` until `predicate` holds, returning the matching snapshot.
///
/// # Errors
///
/// Returns [`ActionError::Timeout`] once `timeout` elapses, or the provider's
/// error if a snapshot cannot be read.
pub fn wait_until<P, F>(provider: &mut P, mut predicate: F, timeout: Duration, poll: Duration) -> EconomyResult<GameSnapshot>
where
    P: SnapshotProvider + ?Sized,
    F: FnMut(&GameSnapshot) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        let snapshot = provider.snapshot()?;
        if predicate(&snapshot) {
            return Ok(snapshot);
        }
        if Instant::now() >= deadline {
            let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
            debug!(timeout_ms = ms, "condition not met before deadline");
            return Err(ActionError::Timeout(ms).into());
        }
        thread::sleep(poll);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EconomyError;
    use horadric_core::ItemType;

    struct Flaky {
        failures: u32,
        calls: u32,
    }

    impl ActionExecutor for Flaky {
        fn execute(&mut self, _action: GameAction) -> Result<(), ActionError> {
            self.calls += 1;
            if self.calls <= self.failures {
                Err(ActionError::ItemMoved)
            } else {
                Ok(())
            }
        }
    }

    struct Counter {
        calls: u32,
        ready_after: u32,
    }

    impl SnapshotProvider for Counter {
        fn snapshot(&mut self) -> EconomyResult<GameSnapshot> {
            self.calls += 1;
            let mut snap = GameSnapshot::default();
            if self.calls >= self.ready_after {
                snap.items.push(Item::new(1, "Ring", ItemType::Ring, Quality::Rare));
            }
            Ok(snap)
        }
    }

    #[test]
    fn test_retry_succeeds_within_budget() {
        let mut exec = Flaky { failures: 2, calls: 0 };
        assert!(retry_action(&mut exec, &GameAction::Transmute).is_ok());
        assert_eq!(exec.calls, 3);
    }

    #[test]
    fn test_retry_gives_up() {
        let mut exec = Flaky { failures: 5, calls: 0 };
        assert_eq!(retry_action(&mut exec, &GameAction::Transmute), Err(ActionError::ItemMoved));
        assert_eq!(exec.calls, ACTION_RETRIES);
    }

    #[test]
    fn test_rejection_not_retried() {
        struct Full(u32);
        impl ActionExecutor for Full {
            fn execute(&mut self, _action: GameAction) -> Result<(), ActionError> {
                self.0 += 1;
                Err(ActionError::Rejected("tab full".into()))
            }
        }
        let mut exec = Full(0);
        assert!(retry_action(&mut exec, &GameAction::Transmute).is_err());
        assert_eq!(exec.0, 1);
    }

    #[test]
    fn test_wait_until_polls() {
        let mut provider = Counter { calls: 0, ready_after: 3 };
        let snap = wait_until(&mut provider, |s| !s.items.is_empty(), Duration::from_secs(1), Duration::ZERO).unwrap();
        assert_eq!(snap.items.len(), 1);
        assert_eq!(provider.calls, 3);
    }

    #[test]
    fn test_wait_until_times_out() {
        let mut provider = Counter { calls: 0, ready_after: u32::MAX };
        let result = wait_until(&mut provider, |s| !s.items.is_empty(), Duration::ZERO, Duration::ZERO);
        assert!(matches!(result, Err(EconomyError::Action(ActionError::Timeout(0)))));
    }
}
