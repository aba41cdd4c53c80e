use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle of the service.
///
/// `NotStarted -> Initializing -> Ready` on success and
/// `Initializing -> Error` on failure. `Ready` and `Error` are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitState {
    NotStarted,
    Initializing,
    Ready,
    Error,
}

impl InitState {
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }

    #[inline]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::NotStarted, Self::Initializing)
                | (Self::Initializing, Self::Ready)
                | (Self::Initializing, Self::Error)
        )
    }
}

impl fmt::Display for InitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State and message captured together, never updated in place
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub status: InitState,
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

impl StatusSnapshot {
    #[inline]
    pub fn new(status: InitState, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            updated_at: Utc::now(),
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.status == InitState::Ready
    }
}

/// Holder of the current [`StatusSnapshot`].
///
/// Readers get an `Arc` to a complete snapshot; writers replace it whole, so
/// a status is never observed with another status's message.
#[derive(Debug)]
pub struct StateCell {
    current: RwLock<Arc<StatusSnapshot>>,
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl StateCell {
    #[inline]
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(StatusSnapshot::new(
                InitState::NotStarted,
                "Service has not started initializing",
            ))),
        }
    }

    #[inline]
    pub fn get(&self) -> Arc<StatusSnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Move to `status` if the lifecycle allows it.
    ///
    /// Returns the snapshot in force afterwards and whether it was replaced.
    #[inline]
    pub fn set(&self, status: InitState, message: impl Into<String>) -> (Arc<StatusSnapshot>, bool) {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        if !current.status.can_transition_to(status) {
            return (Arc::clone(&current), false);
        }
        *current = Arc::new(StatusSnapshot::new(status, message));
        (Arc::clone(&current), true)
    }
}
