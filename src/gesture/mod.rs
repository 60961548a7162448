//! Gesture recognition
//!
//! Turns initiator/modifier key transitions into tap, hold, cycle, commit,
//! cancel and indexed-selection intents.

mod machine;

pub use machine::{GestureMachine, GestureState, IntentSink, KeyDirection, KeyEvent, Timestamp};
