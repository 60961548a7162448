//! Global keyboard hook listener
//!
//! Installs a low-level keyboard hook on a dedicated thread with its own
//! message loop. The hook feeds the gesture state machine directly and
//! always passes events on to the rest of the system.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

use crate::config::ConfigHandle;
use crate::events::Intent;

/// Global keyboard hook that turns initiator/modifier activity into intents
pub struct HookListener {
    config: ConfigHandle,
    intent_tx: mpsc::Sender<Intent>,
    running: Arc<AtomicBool>,
    /// Native id of the hook thread, 0 while not running
    thread_id: Arc<AtomicU32>,
}

impl HookListener {
    /// Create a new hook listener
    pub fn new(config: ConfigHandle, intent_tx: mpsc::Sender<Intent>) -> Self {
        Self {
            config,
            intent_tx,
            running: Arc::new(AtomicBool::new(false)),
            thread_id: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Start the hook listener
    ///
    /// Spawns the hook thread and waits until the hook is installed. An
    /// error here means the switcher cannot work at all.
    pub async fn start(&self) -> Result<(), HotkeyError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let config = self.config.clone();
        let intent_tx = self.intent_tx.clone();
        let running = Arc::clone(&self.running);
        let thread_id = Arc::clone(&self.thread_id);
        let (ready_tx, ready_rx) = oneshot::channel();

        let spawned = thread::Builder::new()
            .name("keyboard-hook".to_string())
            .spawn(move || {
                info!("keyboard hook thread started");

                if let Err(e) = platform::run_hook(config, intent_tx, &thread_id, ready_tx) {
                    error!(?e, "keyboard hook error");
                }

                thread_id.store(0, Ordering::SeqCst);
                running.store(false, Ordering::SeqCst);
                info!("keyboard hook thread stopped");
            });

        if let Err(e) = spawned {
            self.running.store(false, Ordering::SeqCst);
            return Err(HotkeyError::ThreadSpawn(e.to_string()));
        }

        match ready_rx.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(HotkeyError::InstallAborted),
        }
    }

    /// Stop the hook listener
    pub fn stop(&self) {
        let thread_id = self.thread_id.load(Ordering::SeqCst);
        if thread_id != 0 {
            platform::stop_hook(thread_id);
        }
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Errors that can occur in the hook listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("keyboard hook is already running")]
    AlreadyRunning,

    #[error("failed to install low-level keyboard hook: {0}")]
    Install(String),

    #[error("keyboard hook thread exited before reporting installation")]
    InstallAborted,

    #[error("failed to spawn hook thread: {0}")]
    ThreadSpawn(String),

    #[error("low-level keyboard hooks are only available on Windows")]
    Unsupported,
}

type Ready = oneshot::Sender<Result<(), HotkeyError>>;

#[cfg(windows)]
mod platform {
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    use tokio::sync::mpsc;
    use tracing::{debug, warn};
    use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
    use windows::Win32::System::Threading::GetCurrentThreadId;
    use windows::Win32::UI::WindowsAndMessaging::{
        CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
        TranslateMessage, UnhookWindowsHookEx, HC_ACTION, KBDLLHOOKSTRUCT, MSG, WH_KEYBOARD_LL,
        WM_KEYDOWN, WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP,
    };

    use super::{HotkeyError, Ready};
    use crate::config::ConfigHandle;
    use crate::events::Intent;
    use crate::gesture::{GestureMachine, KeyDirection, KeyEvent};
    use crate::hotkey::VirtualKey;

    /// Everything the hook procedure touches, owned by the hook thread
    struct HookContext {
        machine: GestureMachine,
        intent_tx: mpsc::Sender<Intent>,
        origin: Instant,
    }

    thread_local! {
        static CONTEXT: RefCell<Option<HookContext>> = const { RefCell::new(None) };
    }

    /// Low-level keyboard hook procedure
    ///
    /// Observes only: the event always continues down the hook chain.
    unsafe extern "system" fn keyboard_hook_proc(
        code: i32,
        wparam: WPARAM,
        lparam: LPARAM,
    ) -> LRESULT {
        if code == HC_ACTION as i32 {
            let direction = match wparam.0 as u32 {
                WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyDirection::Down),
                WM_KEYUP | WM_SYSKEYUP => Some(KeyDirection::Up),
                _ => None,
            };

            if let Some(direction) = direction {
                let kbd = unsafe { &*(lparam.0 as *const KBDLLHOOKSTRUCT) };
                let key = VirtualKey(kbd.vkCode as u16);

                CONTEXT.with(|context| {
                    // Reentrant delivery is skipped rather than waited on
                    if let Ok(mut context) = context.try_borrow_mut() {
                        if let Some(context) = context.as_mut() {
                            let event = KeyEvent {
                                key,
                                direction,
                                at: context.origin.elapsed(),
                            };
                            context
                                .machine
                                .handle_key_event(event, &mut context.intent_tx);
                        }
                    }
                });
            }
        }

        unsafe { CallNextHookEx(None, code, wparam, lparam) }
    }

    pub(super) fn run_hook(
        config: ConfigHandle,
        intent_tx: mpsc::Sender<Intent>,
        thread_id: &AtomicU32,
        ready: Ready,
    ) -> Result<(), HotkeyError> {
        let hook = match unsafe {
            SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0)
        } {
            Ok(hook) => hook,
            Err(e) => {
                let _ = ready.send(Err(HotkeyError::Install(e.to_string())));
                return Ok(());
            }
        };

        CONTEXT.with(|context| {
            *context.borrow_mut() = Some(HookContext {
                machine: GestureMachine::new(config),
                intent_tx,
                origin: Instant::now(),
            });
        });

        thread_id.store(unsafe { GetCurrentThreadId() }, Ordering::SeqCst);
        debug!("low-level keyboard hook installed");
        let _ = ready.send(Ok(()));

        let mut msg = MSG::default();
        while unsafe { GetMessageW(&mut msg, None, 0, 0) }.as_bool() {
            unsafe {
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        if let Err(e) = unsafe { UnhookWindowsHookEx(hook) } {
            warn!(error = %e, "failed to remove keyboard hook");
        }
        CONTEXT.with(|context| context.borrow_mut().take());
        debug!("low-level keyboard hook removed");

        Ok(())
    }

    pub(super) fn stop_hook(thread_id: u32) {
        if let Err(e) = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
            warn!(error = %e, thread_id, "failed to signal keyboard hook thread");
        }
    }
}

#[cfg(not(windows))]
mod platform {
    use std::sync::atomic::AtomicU32;

    use tokio::sync::mpsc;
    use tracing::warn;

    use super::{HotkeyError, Ready};
    use crate::config::ConfigHandle;
    use crate::events::Intent;

    pub(super) fn run_hook(
        config: ConfigHandle,
        _intent_tx: mpsc::Sender<Intent>,
        _thread_id: &AtomicU32,
        ready: Ready,
    ) -> Result<(), HotkeyError> {
        warn!(hotkeys = ?config.snapshot(), "no keyboard hook on this platform");
        let _ = ready.send(Err(HotkeyError::Unsupported));
        Ok(())
    }

    pub(super) fn stop_hook(_thread_id: u32) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HotkeyConfig;

    #[test]
    fn test_listener_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = HookListener::new(ConfigHandle::new(HotkeyConfig::default()), tx);
        assert!(!listener.is_running());
    }

    #[cfg(not(windows))]
    #[test]
    fn test_start_reports_unsupported() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = HookListener::new(ConfigHandle::new(HotkeyConfig::default()), tx);

        let result = tokio_test::block_on(listener.start());
        assert!(matches!(result, Err(HotkeyError::Unsupported)));

        // The hook thread clears the flag on its way out
        for _ in 0..100 {
            if !listener.is_running() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert!(!listener.is_running());
    }
}
