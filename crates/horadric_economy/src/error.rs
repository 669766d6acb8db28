//! # Economy Error Types
//!
//! All errors that can occur in the economy system, plus the severity that
//! decides how far each one travels.

use thiserror::Error;

/// How far an error is allowed to propagate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Retry at the call site, then abandon the enclosing step.
    Transient,
    /// Log and continue with degraded behavior.
    Recoverable,
    /// Stop the character.
    Fatal,
}

/// Typed failure returned by the action executor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// The click or key press did not register.
    #[error("action did not register")]
    NotRegistered,

    /// The required menu (stash, cube, vendor) is not open.
    #[error("menu not open: {0}")]
    MenuNotOpen(&'static str),

    /// The item moved before the action reached it.
    #[error("item moved before action completed")]
    ItemMoved,

    /// The game refused the action.
    #[error("action rejected: {0}")]
    Rejected(String),

    /// The expected effect never became observable.
    #[error("timed out after {0} ms waiting for action effect")]
    Timeout(u64),
}

/// Errors that can occur in the economy system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EconomyError {
    /// An external action failed after retries.
    #[error("action failed: {0}")]
    Action(#[from] ActionError),

    /// The vendor purchase step produced nothing usable.
    #[error("purchase failed for recipe {recipe}: {reason}")]
    PurchaseFailed {
        /// Recipe that required the purchase.
        recipe: String,
        /// What went wrong.
        reason: String,
    },

    /// Config load or save failed.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No stash tab had room for an item.
    #[error("no stash tab has room for {item}")]
    StorageExhausted {
        /// The item that could not be stored.
        item: String,
    },

    /// Every configured mule is full.
    #[error("all mules are full ({mules} configured)")]
    AllMulesFull {
        /// Number of configured mule profiles.
        mules: usize,
    },

    /// The snapshot provider could not refresh.
    #[error("snapshot unavailable: {0}")]
    Snapshot(String),

    /// The supervisor asked the routine to stop.
    #[error("stopped by supervisor")]
    Stopped,
}

impl EconomyError {
    /// Severity of this error.
    #[must_use]
    pub const fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Action(_) | Self::Snapshot(_) => ErrorSeverity::Transient,
            Self::PurchaseFailed { .. }
            | Self::Persistence(_)
            | Self::InvalidConfig(_)
            | Self::StorageExhausted { .. } => ErrorSeverity::Recoverable,
            Self::AllMulesFull { .. } | Self::Stopped => ErrorSeverity::Fatal,
        }
    }

    /// Returns true if this error must stop the character.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self.severity(), ErrorSeverity::Fatal)
    }
}

/// Result type for economy operations.
pub type EconomyResult<T> = Result<T, EconomyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_taxonomy() {
        assert_eq!(EconomyError::from(ActionError::ItemMoved).severity(), ErrorSeverity::Transient);
        assert_eq!(EconomyError::Persistence("disk".into()).severity(), ErrorSeverity::Recoverable);
        assert!(EconomyError::AllMulesFull { mules: 2 }.is_fatal());
        assert!(EconomyError::Stopped.is_fatal());
        assert!(!EconomyError::StorageExhausted { item: "Ring".into() }.is_fatal());
    }

    #[test]
    fn test_display() {
        let err = EconomyError::AllMulesFull { mules: 3 };
        assert_eq!(err.to_string(), "all mules are full (3 configured)");
    }
}
