//! Events module for gesture intents
//!
//! Provides the discrete intents the gesture state machine emits for the
//! switcher and the overlay to act on.

use serde::{Deserialize, Serialize};

/// Intents emitted by the gesture state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// Single quick modifier tap: switch to the previous window
    Tap,

    /// Modifier held past the tap timeout: open the overlay
    HoldStart,

    /// Modifier pressed again while the overlay is open
    Cycle,

    /// Initiator released without any modifier activity
    Cancel,

    /// Initiator released while the overlay is open
    Commit,

    /// Several quick taps: focus the window at this position
    SelectIndex {
        /// Position in a fresh window snapshot
        index: usize,
    },
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::Tap => write!(f, "TAP"),
            Intent::HoldStart => write!(f, "HOLD_START"),
            Intent::Cycle => write!(f, "CYCLE"),
            Intent::Cancel => write!(f, "CANCEL"),
            Intent::Commit => write!(f, "COMMIT"),
            Intent::SelectIndex { index } => write!(f, "SELECT_INDEX ({})", index),
        }
    }
}
