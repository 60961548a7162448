//! Overlay selection model
//!
//! Tracks what the switch overlay shows and which entry is highlighted.
//! Drawing is left to whatever UI binds to this model; here the overlay is
//! just a window list, a cursor and a visibility flag.

use tracing::{debug, info};

use crate::desktop::WindowHandle;

/// Selection state of the switch overlay
#[derive(Debug, Default)]
pub struct SelectionOverlay {
    windows: Vec<WindowHandle>,
    selected: usize,
    visible: bool,
}

impl SelectionOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the overlay over a fresh window snapshot
    ///
    /// The previous window (second entry) is preselected when there is one.
    pub fn show(&mut self, windows: impl IntoIterator<Item = WindowHandle>) {
        self.windows = windows.into_iter().collect();
        self.selected = if self.windows.len() > 1 { 1 } else { 0 };
        self.visible = true;
        info!(entries = self.windows.len(), "overlay shown");
    }

    /// Move the highlight to the next entry, wrapping around
    pub fn advance(&mut self) {
        if !self.visible || self.windows.is_empty() {
            return;
        }
        self.selected = (self.selected + 1) % self.windows.len();
        debug!(selected = self.selected, "overlay selection advanced");
    }

    /// Close the overlay, returning the highlighted window
    pub fn commit(&mut self) -> Option<WindowHandle> {
        let chosen = if self.visible {
            self.windows.get(self.selected).cloned()
        } else {
            None
        };
        self.hide();
        chosen
    }

    /// Close the overlay and drop its snapshot
    pub fn hide(&mut self) {
        if self.visible {
            debug!("overlay hidden");
        }
        self.windows.clear();
        self.selected = 0;
        self.visible = false;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Entries in display order
    pub fn entries(&self) -> &[WindowHandle] {
        &self.windows
    }

    /// Highlighted entry, if any
    pub fn selected(&self) -> Option<&WindowHandle> {
        self.windows.get(self.selected)
    }
}
