//! # Session State
//!
//! **Per-session context and cooperative interruption**
//!
//! Nothing in the economy keeps state in globals. Whatever must survive
//! between calls within one game session lives in [`SessionContext`], which is
//! created fresh at session start. Supervisor control arrives through an
//! [`InterruptGate`] that routines poll between external actions.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use horadric_core::UnitId;
use tracing::{info, warn};

use crate::error::{EconomyError, EconomyResult};

/// Identifier of one game within a session.
pub type GameId = u32;

/// Session-scoped state.
#[derive(Clone, Debug)]
pub struct SessionContext {
    /// True until the first stash pass of the session completes.
    pub first_run: bool,
    /// Set once the shared stash was found to have room. Cleared again when
    /// a town visit stashes into a shared tab.
    pub shared_stash_checked: bool,
    /// Tab that last accepted an item, tried early for the next one.
    pub last_successful_stash_tab: Option<u8>,
    /// Current game.
    pub game: GameId,
    blacklist: HashSet<UnitId>,
    picked_up_in: HashMap<UnitId, GameId>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    /// Fresh session state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            first_run: true,
            shared_stash_checked: false,
            last_successful_stash_tab: None,
            game: 0,
            blacklist: HashSet::new(),
            picked_up_in: HashMap::new(),
        }
    }

    /// Starts a new game. Per-game state is cleared.
    pub fn start_game(&mut self, game: GameId) {
        self.game = game;
        self.blacklist.clear();
    }

    /// Prevents `unit` from being picked up again this game.
    pub fn blacklist(&mut self, unit: UnitId) {
        self.blacklist.insert(unit);
    }

    /// Returns true if `unit` must not be picked up.
    #[must_use]
    pub fn is_blacklisted(&self, unit: UnitId) -> bool {
        self.blacklist.contains(&unit)
    }

    /// Records that `unit` was picked up in the current game.
    pub fn record_pickup(&mut self, unit: UnitId) {
        self.picked_up_in.insert(unit, self.game);
    }

    /// Game in which `unit` was picked up, if tracked.
    #[must_use]
    pub fn picked_up_in(&self, unit: UnitId) -> Option<GameId> {
        self.picked_up_in.get(&unit).copied()
    }
}

// ============================================================================
// INTERRUPTS
// ============================================================================

/// Supervisor control signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlSignal {
    /// Hold at the next checkpoint.
    Pause,
    /// Continue after a pause.
    Resume,
    /// Abandon the routine at the next checkpoint.
    Stop,
}

/// Receiving end of the supervisor channel.
#[derive(Clone, Debug)]
pub struct InterruptGate {
    receiver: Receiver<ControlSignal>,
    idle: Duration,
}

impl InterruptGate {
    /// Creates a gate and the sender the supervisor keeps.
    #[must_use]
    pub fn channel() -> (Sender<ControlSignal>, Self) {
        let (sender, receiver) = unbounded();
        (
            sender,
            Self {
                receiver,
                idle: Duration::from_millis(250),
            },
        )
    }

    /// Gate that never interrupts.
    #[must_use]
    pub fn detached() -> Self {
        Self::channel().1
    }

    /// Yield point. Drains pending signals and blocks while paused.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Stopped`] if a stop was requested.
    pub fn checkpoint(&self) -> EconomyResult<()> {
        let mut paused = false;
        loop {
            let signal = if paused {
                match self.receiver.recv_timeout(self.idle) {
                    Ok(signal) => Some(signal),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => {
                        warn!("supervisor went away while paused");
                        return Err(EconomyError::Stopped);
                    }
                }
            } else {
                match self.receiver.try_recv() {
                    Ok(signal) => Some(signal),
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => return Ok(()),
                }
            };
            match signal {
                Some(ControlSignal::Stop) => {
                    info!("stop requested");
                    return Err(EconomyError::Stopped);
                }
                Some(ControlSignal::Pause) => {
                    if !paused {
                        info!("paused at checkpoint");
                    }
                    paused = true;
                }
                Some(ControlSignal::Resume) => {
                    if paused {
                        info!("resumed");
                    }
                    paused = false;
                }
                None => {}
            }
        }
    }
}
