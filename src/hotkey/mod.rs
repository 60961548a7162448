//! Hotkey module for global keyboard event listening
//!
//! Uses a Win32 low-level keyboard hook to observe the initiator and
//! modifier keys system-wide and drive the gesture state machine.

mod keys;
mod listener;

pub use keys::VirtualKey;
pub use listener::{HookListener, HotkeyError};
