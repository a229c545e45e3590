//! Session phases and the events broadcast to subscribers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of a layout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    #[default]
    Idle,
    Searching,
    SearchFailed,
    Searched,
    Applying,
    ApplyFailed,
    Applied,
    Completing,
    Completed,
    Shuffling,
    Disposed,
}

impl SessionPhase {
    /// Returns true while an asynchronous operation is running.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            SessionPhase::Searching
                | SessionPhase::Applying
                | SessionPhase::Completing
                | SessionPhase::Shuffling
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Notifications sent to session subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionEvent {
    PhaseChanged {
        from: SessionPhase,
        to: SessionPhase,
    },
    SearchCompleted {
        results: usize,
    },
    Applied {
        index: Option<usize>,
        placed: usize,
        out_of_room: usize,
    },
    CompletionUpdated {
        fixed: usize,
        proposed: usize,
    },
    ProposedAccepted {
        count: usize,
    },
    ProposedCleared {
        count: usize,
    },
    OperationFailed {
        operation: String,
        message: String,
    },
    Cleared,
}
