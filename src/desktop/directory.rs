//! Window directory
//!
//! Enumerates the top-level windows a user would expect to switch to, in
//! the order the OS reports them (top-most first). Tooltips, popups, tool
//! palettes and invisible helper windows are filtered out.

use tracing::trace;

/// Opaque OS window identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub isize);

/// A switchable window as seen at enumeration time
///
/// Only valid for the gesture that produced it; window sets change between
/// gestures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowHandle {
    pub id: WindowId,
    pub title: String,
}

/// Window attributes relevant to switch-list eligibility
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowTraits {
    pub visible: bool,
    pub minimized: bool,
    pub tool_window: bool,
    /// Not owned by another window
    pub top_level: bool,
    pub has_caption: bool,
    pub title: String,
}

/// Check whether a window belongs in the switch list
pub fn is_eligible(traits: &WindowTraits) -> bool {
    traits.visible
        && !traits.minimized
        && !traits.tool_window
        && traits.top_level
        && traits.has_caption
        && !traits.title.trim().is_empty()
}

/// Source of raw window identities and their attributes
pub trait WindowSource {
    /// All top-level windows, in OS enumeration order
    fn candidates(&self) -> Vec<WindowId>;

    /// Attributes of one window, or `None` if it vanished
    fn describe(&self, id: WindowId) -> Option<WindowTraits>;
}

/// Enumerates eligible windows on demand
pub struct WindowDirectory<S> {
    source: S,
}

impl<S: WindowSource> WindowDirectory<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Take a snapshot of the currently eligible windows
    ///
    /// The snapshot is lazy: each window is inspected as the iterator
    /// reaches it, and it can only be walked once.
    pub fn enumerate(&self) -> Snapshot<'_, S> {
        Snapshot {
            source: &self.source,
            ids: self.source.candidates().into_iter(),
        }
    }
}

/// One pass over the eligible windows
pub struct Snapshot<'a, S> {
    source: &'a S,
    ids: std::vec::IntoIter<WindowId>,
}

impl<S: WindowSource> Iterator for Snapshot<'_, S> {
    type Item = WindowHandle;

    fn next(&mut self) -> Option<Self::Item> {
        for id in self.ids.by_ref() {
            let Some(traits) = self.source.describe(id) else {
                continue;
            };
            if is_eligible(&traits) {
                return Some(WindowHandle {
                    id,
                    title: traits.title,
                });
            }
            trace!(?id, ?traits, "skipping ineligible window");
        }
        None
    }
}

#[cfg(windows)]
pub use win32::Win32Windows;

#[cfg(windows)]
mod win32 {
    use windows::core::BOOL;
    use windows::Win32::Foundation::{HWND, LPARAM};
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetAncestor, GetWindowLongW, GetWindowTextLengthW, GetWindowTextW,
        IsIconic, IsWindowVisible, GA_ROOTOWNER, GWL_EXSTYLE, GWL_STYLE, WS_CAPTION,
        WS_EX_TOOLWINDOW,
    };

    use super::{WindowId, WindowSource, WindowTraits};

    /// Window source backed by `EnumWindows`
    #[derive(Debug, Default, Clone, Copy)]
    pub struct Win32Windows;

    unsafe extern "system" fn collect_window(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let ids = unsafe { &mut *(lparam.0 as *mut Vec<WindowId>) };
        ids.push(WindowId(hwnd.0 as isize));
        BOOL::from(true)
    }

    impl WindowSource for Win32Windows {
        fn candidates(&self) -> Vec<WindowId> {
            let mut ids: Vec<WindowId> = Vec::new();
            let result = unsafe {
                EnumWindows(
                    Some(collect_window),
                    LPARAM(&mut ids as *mut Vec<WindowId> as isize),
                )
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "window enumeration failed");
            }
            ids
        }

        fn describe(&self, id: WindowId) -> Option<WindowTraits> {
            let hwnd = HWND(id.0 as *mut _);
            unsafe {
                let ex_style = GetWindowLongW(hwnd, GWL_EXSTYLE) as u32;
                let style = GetWindowLongW(hwnd, GWL_STYLE) as u32;

                let len = GetWindowTextLengthW(hwnd);
                let title = if len > 0 {
                    let mut buf = vec![0u16; len as usize + 1];
                    let copied = GetWindowTextW(hwnd, &mut buf);
                    String::from_utf16_lossy(&buf[..copied.max(0) as usize])
                } else {
                    String::new()
                };

                Some(WindowTraits {
                    visible: IsWindowVisible(hwnd).as_bool(),
                    minimized: IsIconic(hwnd).as_bool(),
                    tool_window: ex_style & WS_EX_TOOLWINDOW.0 != 0,
                    top_level: GetAncestor(hwnd, GA_ROOTOWNER) == hwnd,
                    has_caption: style & WS_CAPTION.0 != 0,
                    title,
                })
            }
        }
    }
}
