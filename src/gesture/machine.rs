//! Gesture state machine
//!
//! Classifies raw initiator/modifier key transitions into intents. Runs
//! inside the low-level keyboard hook, so every path here is bounded and
//! non-blocking: timeouts are evaluated lazily when the next event arrives,
//! never by a timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::config::{ConfigHandle, HotkeyConfig};
use crate::events::Intent;
use crate::hotkey::VirtualKey;

/// Monotonic event time, as an offset from an arbitrary fixed origin
pub type Timestamp = Duration;

/// Whether a key went down or came up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDirection {
    Down,
    Up,
}

/// One raw key transition as reported by the hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: VirtualKey,
    pub direction: KeyDirection,
    pub at: Timestamp,
}

impl KeyEvent {
    pub fn down(key: VirtualKey, at: Timestamp) -> Self {
        Self {
            key,
            direction: KeyDirection::Down,
            at,
        }
    }

    pub fn up(key: VirtualKey, at: Timestamp) -> Self {
        Self {
            key,
            direction: KeyDirection::Up,
            at,
        }
    }
}

/// Receiver of intents emitted by the state machine
///
/// Implementations called from the hook must not block.
pub trait IntentSink {
    fn emit(&mut self, intent: Intent);
}

impl IntentSink for Vec<Intent> {
    fn emit(&mut self, intent: Intent) {
        self.push(intent);
    }
}

impl IntentSink for mpsc::Sender<Intent> {
    fn emit(&mut self, intent: Intent) {
        if let Err(e) = self.try_send(intent) {
            warn!(%intent, error = %e, "dropping intent");
        }
    }
}

/// Modifier progress within a gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Taps {
    /// No modifier release seen yet
    Undecided,
    /// Quick taps counted so far, always at least one
    Counting(usize),
    /// The overlay is open
    Held,
}

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    InitiatorHeld {
        taps: Taps,
        last_modifier_up: Timestamp,
        /// Settings captured when the gesture began
        config: Arc<HotkeyConfig>,
    },
}

/// Flag view of the machine, for inspection and logging
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GestureState {
    pub initiator_down: bool,
    pub hold_triggered: bool,
    pub tap_count: usize,
}

/// The gesture state machine
///
/// Exactly one instance lives on the hook thread; it is created when the
/// hook is installed and dropped when it is removed.
pub struct GestureMachine {
    phase: Phase,
    config: ConfigHandle,
}

impl GestureMachine {
    /// Create a new machine reading settings from `config`
    pub fn new(config: ConfigHandle) -> Self {
        Self {
            phase: Phase::Idle,
            config,
        }
    }

    /// Current flags
    pub fn state(&self) -> GestureState {
        match &self.phase {
            Phase::Idle => GestureState::default(),
            Phase::InitiatorHeld { taps, .. } => GestureState {
                initiator_down: true,
                hold_triggered: *taps == Taps::Held,
                tap_count: match taps {
                    Taps::Counting(n) => *n,
                    Taps::Undecided | Taps::Held => 0,
                },
            },
        }
    }

    /// Feed one key transition, emitting any resulting intents into `sink`
    ///
    /// Keys other than the configured initiator and modifier leave the
    /// machine untouched.
    pub fn handle_key_event(&mut self, event: KeyEvent, sink: &mut impl IntentSink) {
        match &mut self.phase {
            Phase::Idle => {
                if event.direction != KeyDirection::Down {
                    return;
                }
                let config = self.config.snapshot();
                if config.initiator.matches(event.key) {
                    trace!(key = %event.key, "gesture started");
                    self.phase = Phase::InitiatorHeld {
                        taps: Taps::Undecided,
                        last_modifier_up: event.at,
                        config,
                    };
                }
            }
            Phase::InitiatorHeld {
                taps,
                last_modifier_up,
                config,
            } => {
                if config.modifier.matches(event.key) {
                    match event.direction {
                        KeyDirection::Down => {
                            if *taps == Taps::Held {
                                sink.emit(Intent::Cycle);
                            }
                        }
                        KeyDirection::Up => {
                            let delta = event.at.saturating_sub(*last_modifier_up);
                            *last_modifier_up = event.at;
                            *taps = next_taps(*taps, delta, config, sink);
                        }
                    }
                } else if config.initiator.matches(event.key)
                    && event.direction == KeyDirection::Up
                {
                    let since_modifier_up = event.at.saturating_sub(*last_modifier_up);
                    finish(*taps, since_modifier_up, config, sink);
                    self.phase = Phase::Idle;
                }
            }
        }
    }
}

/// Account for one modifier release
fn next_taps(
    taps: Taps,
    delta: Duration,
    config: &HotkeyConfig,
    sink: &mut impl IntentSink,
) -> Taps {
    match taps {
        Taps::Undecided if delta > Duration::from_millis(config.tap_timeout_ms) => {
            debug!(delta_ms = delta.as_millis() as u64, "modifier held, opening overlay");
            sink.emit(Intent::HoldStart);
            Taps::Held
        }
        Taps::Undecided => Taps::Counting(1),
        Taps::Counting(n) => Taps::Counting(n + 1),
        // Cycling happens on modifier press
        Taps::Held => Taps::Held,
    }
}

/// Resolve the gesture when the initiator comes up
///
/// The delayed-overlay promotion is checked before the hold, and the hold
/// before the tap count.
fn finish(
    taps: Taps,
    since_modifier_up: Duration,
    config: &HotkeyConfig,
    sink: &mut impl IntentSink,
) {
    let taps = match taps {
        Taps::Counting(_) if since_modifier_up > Duration::from_millis(config.overlay_timeout_ms) => {
            debug!(
                since_ms = since_modifier_up.as_millis() as u64,
                "initiator lingered after taps, opening overlay"
            );
            sink.emit(Intent::HoldStart);
            Taps::Held
        }
        other => other,
    };

    let intent = match taps {
        Taps::Held => Intent::Commit,
        Taps::Counting(1) => Intent::Tap,
        Taps::Counting(index) => Intent::SelectIndex { index },
        Taps::Undecided => Intent::Cancel,
    };
    debug!(%intent, "gesture finished");
    sink.emit(intent);
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALT: VirtualKey = VirtualKey::LMENU;
    const SHIFT: VirtualKey = VirtualKey::LSHIFT;

    fn ms(n: u64) -> Timestamp {
        Duration::from_millis(n)
    }

    fn create_machine() -> GestureMachine {
        GestureMachine::new(ConfigHandle::new(HotkeyConfig::default()))
    }

    fn feed(machine: &mut GestureMachine, events: &[KeyEvent]) -> Vec<Intent> {
        let mut intents = Vec::new();
        for event in events {
            machine.handle_key_event(*event, &mut intents);
        }
        intents
    }

    fn tap(at: u64) -> [KeyEvent; 2] {
        [KeyEvent::down(SHIFT, ms(at)), KeyEvent::up(SHIFT, ms(at + 10))]
    }

    #[test]
    fn test_initial_state() {
        let machine = create_machine();
        assert_eq!(machine.state(), GestureState::default());
    }

    #[test]
    fn test_quick_tap_emits_tap() {
        let mut machine = create_machine();
        let intents = feed(
            &mut machine,
            &[
                KeyEvent::down(ALT, ms(0)),
                KeyEvent::down(SHIFT, ms(40)),
                KeyEvent::up(SHIFT, ms(50)),
                KeyEvent::up(ALT, ms(80)),
            ],
        );
        assert_eq!(intents, vec![Intent::Tap]);
    }

    #[test]
    fn test_hold_then_cycle_then_commit() {
        let mut machine = create_machine();

        let intents = feed(
            &mut machine,
            &[
                KeyEvent::down(ALT, ms(0)),
                KeyEvent::down(SHIFT, ms(0)),
                KeyEvent::up(SHIFT, ms(400)),
            ],
        );
        assert_eq!(intents, vec![Intent::HoldStart]);
        assert!(machine.state().hold_triggered);

        let intents = feed(&mut machine, &[KeyEvent::down(SHIFT, ms(450))]);
        assert_eq!(intents, vec![Intent::Cycle]);

        let intents = feed(&mut machine, &[KeyEvent::up(ALT, ms(500))]);
        assert_eq!(intents, vec![Intent::Commit]);
    }

    #[test]
    fn test_three_quick_taps_select_index() {
        let mut machine = create_machine();
        let mut events = vec![KeyEvent::down(ALT, ms(0))];
        events.extend(tap(20));
        events.extend(tap(80));
        events.extend(tap(140));
        events.push(KeyEvent::up(ALT, ms(200)));

        let intents = feed(&mut machine, &events);
        assert_eq!(intents, vec![Intent::SelectIndex { index: 3 }]);
    }

    #[test]
    fn test_initiator_alone_cancels() {
        let mut machine = create_machine();
        let intents = feed(
            &mut machine,
            &[KeyEvent::down(ALT, ms(0)), KeyEvent::up(ALT, ms(30))],
        );
        assert_eq!(intents, vec![Intent::Cancel]);
    }

    #[test]
    fn test_lingering_after_tap_promotes_to_overlay() {
        let mut machine = create_machine();
        let mut events = vec![KeyEvent::down(ALT, ms(0))];
        events.extend(tap(20));
        // Last modifier release at 30, initiator held until well past 500ms later
        events.push(KeyEvent::up(ALT, ms(600)));

        let intents = feed(&mut machine, &events);
        assert_eq!(intents, vec![Intent::HoldStart, Intent::Commit]);
        assert_eq!(machine.state(), GestureState::default());
    }

    #[test]
    fn test_lingering_after_multi_tap_promotes_too() {
        let mut machine = create_machine();
        let mut events = vec![KeyEvent::down(ALT, ms(0))];
        events.extend(tap(20));
        events.extend(tap(60));
        events.push(KeyEvent::up(ALT, ms(1000)));

        let intents = feed(&mut machine, &events);
        assert_eq!(intents, vec![Intent::HoldStart, Intent::Commit]);
    }

    #[test]
    fn test_tap_count_follows_modifier_releases() {
        for taps in 1..8u64 {
            let mut machine = create_machine();
            feed(&mut machine, &[KeyEvent::down(ALT, ms(0))]);
            for i in 0..taps {
                feed(&mut machine, &tap(10 + i * 40));
            }

            let state = machine.state();
            assert!(state.initiator_down);
            assert!(!state.hold_triggered);
            assert_eq!(state.tap_count, taps as usize);
        }
    }

    #[test]
    fn test_slow_first_release_never_taps() {
        let mut machine = create_machine();
        let mut events = vec![
            KeyEvent::down(ALT, ms(0)),
            KeyEvent::down(SHIFT, ms(100)),
            KeyEvent::up(SHIFT, ms(301)),
        ];
        events.extend(tap(320));
        events.extend(tap(360));
        events.push(KeyEvent::up(ALT, ms(400)));

        let intents = feed(&mut machine, &events);
        assert_eq!(
            intents,
            vec![Intent::HoldStart, Intent::Cycle, Intent::Cycle, Intent::Commit]
        );
        assert_eq!(
            intents.iter().filter(|i| **i == Intent::HoldStart).count(),
            1
        );
    }

    #[test]
    fn test_release_always_resets() {
        let scenarios: Vec<Vec<KeyEvent>> = vec![
            vec![KeyEvent::down(ALT, ms(0)), KeyEvent::up(ALT, ms(10))],
            vec![
                KeyEvent::down(ALT, ms(0)),
                KeyEvent::down(SHIFT, ms(5)),
                KeyEvent::up(SHIFT, ms(10)),
                KeyEvent::up(ALT, ms(20)),
            ],
            vec![
                KeyEvent::down(ALT, ms(0)),
                KeyEvent::up(SHIFT, ms(900)),
                KeyEvent::up(ALT, ms(950)),
            ],
        ];

        for events in scenarios {
            let mut machine = create_machine();
            feed(&mut machine, &events);
            assert_eq!(machine.state(), GestureState::default());
        }
    }

    #[test]
    fn test_unrelated_keys_pass_through() {
        let mut machine = create_machine();
        let other = VirtualKey(0x41);

        let intents = feed(
            &mut machine,
            &[KeyEvent::down(other, ms(0)), KeyEvent::up(other, ms(5))],
        );
        assert!(intents.is_empty());
        assert_eq!(machine.state(), GestureState::default());

        feed(&mut machine, &[KeyEvent::down(ALT, ms(10))]);
        let before = machine.state();
        let intents = feed(
            &mut machine,
            &[KeyEvent::down(other, ms(20)), KeyEvent::up(other, ms(30))],
        );
        assert!(intents.is_empty());
        assert_eq!(machine.state(), before);
    }

    #[test]
    fn test_modifier_without_initiator_is_ignored() {
        let mut machine = create_machine();
        let intents = feed(&mut machine, &tap(0));
        assert!(intents.is_empty());
        assert_eq!(machine.state(), GestureState::default());
    }

    #[test]
    fn test_initiator_autorepeat_does_not_restart() {
        let mut machine = create_machine();
        let mut events = vec![KeyEvent::down(ALT, ms(0))];
        events.extend(tap(20));
        events.push(KeyEvent::down(ALT, ms(40)));
        events.push(KeyEvent::down(ALT, ms(70)));

        feed(&mut machine, &events);
        assert_eq!(machine.state().tap_count, 1);
    }

    #[test]
    fn test_backwards_timestamp_clamps_to_zero() {
        let mut machine = create_machine();
        let intents = feed(
            &mut machine,
            &[
                KeyEvent::down(ALT, ms(1000)),
                KeyEvent::up(SHIFT, ms(10)),
                KeyEvent::up(ALT, ms(5)),
            ],
        );
        assert_eq!(intents, vec![Intent::Tap]);
    }

    #[test]
    fn test_generic_initiator_accepts_either_side() {
        let config = HotkeyConfig {
            initiator: VirtualKey::MENU,
            ..HotkeyConfig::default()
        };
        let mut machine = GestureMachine::new(ConfigHandle::new(config));
        let mut events = vec![KeyEvent::down(VirtualKey::RMENU, ms(0))];
        events.extend(tap(20));
        events.push(KeyEvent::up(VirtualKey::LMENU, ms(50)));

        let intents = feed(&mut machine, &events);
        assert_eq!(intents, vec![Intent::Tap]);
    }

    #[test]
    fn test_config_swap_applies_to_next_gesture() {
        let handle = ConfigHandle::new(HotkeyConfig::default());
        let mut machine = GestureMachine::new(handle.clone());

        feed(&mut machine, &[KeyEvent::down(ALT, ms(0))]);
        handle
            .replace(HotkeyConfig {
                tap_timeout_ms: 50,
                ..HotkeyConfig::default()
            })
            .unwrap();

        // In-flight gesture keeps the 300ms tap timeout
        let intents = feed(
            &mut machine,
            &[KeyEvent::up(SHIFT, ms(100)), KeyEvent::up(ALT, ms(120))],
        );
        assert_eq!(intents, vec![Intent::Tap]);

        let intents = feed(
            &mut machine,
            &[
                KeyEvent::down(ALT, ms(200)),
                KeyEvent::up(SHIFT, ms(300)),
                KeyEvent::up(ALT, ms(320)),
            ],
        );
        assert_eq!(intents, vec![Intent::HoldStart, Intent::Commit]);
    }

    #[test]
    fn test_channel_sink_does_not_block_when_full() {
        let (mut tx, mut rx) = mpsc::channel::<Intent>(1);
        tx.emit(Intent::Tap);
        tx.emit(Intent::Cancel);

        assert_eq!(rx.try_recv().unwrap(), Intent::Tap);
        assert!(rx.try_recv().is_err());
    }
}
