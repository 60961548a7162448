//! Focus arbitration
//!
//! A background process is normally not allowed to take the foreground.
//! The arbitrator works around that by temporarily attaching its thread's
//! input state to the thread that currently owns the foreground, raising
//! the target window, and detaching again on every exit path.

use tracing::{debug, warn};

use super::directory::{WindowHandle, WindowId};

/// Native thread identifier
pub type ThreadId = u32;

/// Errors reported by the OS focus surface
///
/// None of these reach callers of [`FocusArbitrator::activate`]; they are
/// logged and activation carries on.
#[derive(Debug, thiserror::Error)]
pub enum FocusError {
    #[error("thread input association {from} -> {to} failed: {reason}")]
    Association {
        from: ThreadId,
        to: ThreadId,
        reason: String,
    },

    #[error("window {0:?} could not be raised: {1}")]
    Raise(WindowId, String),
}

/// The OS operations focus arbitration needs
pub trait ForegroundApi {
    /// Thread owning the current foreground window, if any
    fn foreground_thread(&self) -> Option<ThreadId>;

    /// Thread making the call
    fn current_thread(&self) -> ThreadId;

    /// Attach (`true`) or detach (`false`) the input state of two threads
    fn attach_input(&self, from: ThreadId, to: ThreadId, attach: bool) -> Result<(), FocusError>;

    fn is_minimized(&self, window: WindowId) -> bool;

    fn restore(&self, window: WindowId);

    fn bring_to_top(&self, window: WindowId) -> Result<(), FocusError>;

    fn set_foreground(&self, window: WindowId) -> Result<(), FocusError>;
}

/// A held thread-input association, released on drop
pub struct InputAttachment<'a, A: ForegroundApi> {
    api: &'a A,
    foreground: ThreadId,
    current: ThreadId,
}

impl<'a, A: ForegroundApi> InputAttachment<'a, A> {
    /// Attach `current` to `foreground`; `None` if the OS refused
    pub fn acquire(api: &'a A, foreground: ThreadId, current: ThreadId) -> Option<Self> {
        match api.attach_input(foreground, current, true) {
            Ok(()) => Some(Self {
                api,
                foreground,
                current,
            }),
            Err(e) => {
                warn!(error = %e, "could not attach to foreground thread input");
                None
            }
        }
    }
}

impl<A: ForegroundApi> Drop for InputAttachment<'_, A> {
    fn drop(&mut self) {
        if let Err(e) = self.api.attach_input(self.foreground, self.current, false) {
            warn!(error = %e, "could not detach from foreground thread input");
        }
    }
}

/// Outcome of one activation attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Activation {
    /// Input was merged with the foreground thread during the raise
    pub merged: bool,
    /// The OS accepted the foreground change
    pub raised: bool,
}

/// Forces input focus onto a chosen window
pub struct FocusArbitrator<A> {
    api: A,
}

impl<A: ForegroundApi> FocusArbitrator<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    /// Bring `window` to the front and give it input focus
    ///
    /// Minimized windows are restored first; maximized or normal windows
    /// keep their placement.
    pub fn activate(&self, window: &WindowHandle) -> Activation {
        let current = self.api.current_thread();
        let attachment = match self.api.foreground_thread() {
            Some(foreground) if foreground != current => {
                InputAttachment::acquire(&self.api, foreground, current)
            }
            _ => None,
        };
        let merged = attachment.is_some();

        if self.api.is_minimized(window.id) {
            self.api.restore(window.id);
        }

        if let Err(e) = self.api.bring_to_top(window.id) {
            debug!(error = %e, "bring to top failed");
        }
        let raised = match self.api.set_foreground(window.id) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, title = %window.title, "foreground change refused");
                false
            }
        };

        drop(attachment);

        debug!(title = %window.title, merged, raised, "window activated");
        Activation { merged, raised }
    }
}

impl<A> FocusArbitrator<A> {
    #[cfg(test)]
    pub(crate) fn api(&self) -> &A {
        &self.api
    }
}

#[cfg(windows)]
pub use win32::Win32Foreground;

#[cfg(windows)]
mod win32 {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::System::Threading::{AttachThreadInput, GetCurrentThreadId};
    use windows::Win32::UI::WindowsAndMessaging::{
        BringWindowToTop, GetForegroundWindow, GetWindowThreadProcessId, IsIconic,
        SetForegroundWindow, ShowWindow, SW_RESTORE,
    };

    use super::{FocusError, ForegroundApi, ThreadId};
    use crate::desktop::directory::WindowId;

    /// Focus surface backed by the Win32 API
    #[derive(Debug, Default, Clone, Copy)]
    pub struct Win32Foreground;

    fn hwnd(window: WindowId) -> HWND {
        HWND(window.0 as *mut _)
    }

    impl ForegroundApi for Win32Foreground {
        fn foreground_thread(&self) -> Option<ThreadId> {
            unsafe {
                let foreground = GetForegroundWindow();
                if foreground.is_invalid() {
                    return None;
                }
                match GetWindowThreadProcessId(foreground, None) {
                    0 => None,
                    thread => Some(thread),
                }
            }
        }

        fn current_thread(&self) -> ThreadId {
            unsafe { GetCurrentThreadId() }
        }

        fn attach_input(
            &self,
            from: ThreadId,
            to: ThreadId,
            attach: bool,
        ) -> Result<(), FocusError> {
            if unsafe { AttachThreadInput(from, to, attach) }.as_bool() {
                Ok(())
            } else {
                Err(FocusError::Association {
                    from,
                    to,
                    reason: std::io::Error::last_os_error().to_string(),
                })
            }
        }

        fn is_minimized(&self, window: WindowId) -> bool {
            unsafe { IsIconic(hwnd(window)) }.as_bool()
        }

        fn restore(&self, window: WindowId) {
            let _ = unsafe { ShowWindow(hwnd(window), SW_RESTORE) };
        }

        fn bring_to_top(&self, window: WindowId) -> Result<(), FocusError> {
            unsafe { BringWindowToTop(hwnd(window)) }
                .map_err(|e| FocusError::Raise(window, e.to_string()))
        }

        fn set_foreground(&self, window: WindowId) -> Result<(), FocusError> {
            if unsafe { SetForegroundWindow(hwnd(window)) }.as_bool() {
                Ok(())
            } else {
                Err(FocusError::Raise(
                    window,
                    "foreground request refused".to_string(),
                ))
            }
        }
    }
}
