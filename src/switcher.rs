//! Intent dispatcher
//!
//! Owns the window directory, the focus arbitrator and the overlay model,
//! and turns gesture intents into window switches. All activations go
//! through this single owner, one at a time.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::desktop::focus::Activation;
use crate::desktop::{FocusArbitrator, ForegroundApi, WindowDirectory, WindowHandle, WindowSource};
use crate::events::Intent;
use crate::overlay::SelectionOverlay;

/// Position of the previous window in a fresh snapshot
const PREVIOUS_WINDOW: usize = 1;

pub struct Switcher<S, A> {
    directory: WindowDirectory<S>,
    arbitrator: FocusArbitrator<A>,
    overlay: SelectionOverlay,
}

impl<S: WindowSource, A: ForegroundApi> Switcher<S, A> {
    pub fn new(source: S, api: A) -> Self {
        Self {
            directory: WindowDirectory::new(source),
            arbitrator: FocusArbitrator::new(api),
            overlay: SelectionOverlay::new(),
        }
    }

    /// Process intents until every sender is gone
    pub async fn run(&mut self, mut intent_rx: mpsc::Receiver<Intent>) {
        info!("switcher started");

        while let Some(intent) = intent_rx.recv().await {
            self.handle_intent(intent);
        }

        info!("switcher stopped");
    }

    /// Act on one intent, returning the activation it caused, if any
    pub fn handle_intent(&mut self, intent: Intent) -> Option<Activation> {
        info!(%intent, "intent received");

        match intent {
            Intent::Tap => self.activate_nth(PREVIOUS_WINDOW),
            Intent::SelectIndex { index } => self.activate_nth(index),
            Intent::HoldStart => {
                self.overlay.show(self.directory.enumerate());
                None
            }
            Intent::Cycle => {
                self.overlay.advance();
                None
            }
            Intent::Commit => {
                let chosen = self.overlay.commit()?;
                Some(self.activate(&chosen))
            }
            Intent::Cancel => {
                self.overlay.hide();
                None
            }
        }
    }

    /// The overlay model, for a UI to draw from
    pub fn overlay(&self) -> &SelectionOverlay {
        &self.overlay
    }

    fn activate_nth(&self, index: usize) -> Option<Activation> {
        match self.directory.enumerate().nth(index) {
            Some(window) => Some(self.activate(&window)),
            None => {
                debug!(index, "no window at that position");
                None
            }
        }
    }

    fn activate(&self, window: &WindowHandle) -> Activation {
        info!(title = %window.title, "switching window");
        self.arbitrator.activate(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::directory::tests::FakeWindows;
    use crate::desktop::focus::tests::{Call, FakeForeground};
    use crate::desktop::WindowId;

    fn create_switcher(titles: &[&str]) -> Switcher<FakeWindows, FakeForeground> {
        Switcher::new(FakeWindows::with_titles(titles), FakeForeground::default())
    }

    fn focused(switcher: &Switcher<FakeWindows, FakeForeground>) -> Vec<WindowId> {
        switcher
            .arbitrator
            .api()
            .calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::SetForeground(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_tap_focuses_previous_window() {
        let mut switcher = create_switcher(&["current", "previous", "older"]);
        let activation = switcher.handle_intent(Intent::Tap);

        assert!(activation.is_some());
        assert_eq!(focused(&switcher), vec![WindowId(2)]);
    }

    #[test]
    fn test_tap_with_single_window_does_nothing() {
        let mut switcher = create_switcher(&["alone"]);
        assert!(switcher.handle_intent(Intent::Tap).is_none());
        assert!(focused(&switcher).is_empty());
    }

    #[test]
    fn test_select_index_is_zero_based() {
        let mut switcher = create_switcher(&["a", "b", "c", "d"]);
        switcher.handle_intent(Intent::SelectIndex { index: 3 });
        assert_eq!(focused(&switcher), vec![WindowId(4)]);
    }

    #[test]
    fn test_select_index_out_of_range_is_ignored() {
        let mut switcher = create_switcher(&["a", "b", "c"]);
        assert!(switcher
            .handle_intent(Intent::SelectIndex { index: 3 })
            .is_none());
        assert!(focused(&switcher).is_empty());
    }

    #[test]
    fn test_overlay_flow() {
        let mut switcher = create_switcher(&["a", "b", "c"]);

        switcher.handle_intent(Intent::HoldStart);
        assert!(switcher.overlay().is_visible());
        assert_eq!(switcher.overlay().entries().len(), 3);

        switcher.handle_intent(Intent::Cycle);
        switcher.handle_intent(Intent::Cycle);
        let activation = switcher.handle_intent(Intent::Commit);

        assert!(activation.is_some());
        assert!(!switcher.overlay().is_visible());
        // Preselected index 1, advanced twice with wrap-around
        assert_eq!(focused(&switcher), vec![WindowId(1)]);
    }

    #[test]
    fn test_cancel_hides_without_switching() {
        let mut switcher = create_switcher(&["a", "b"]);
        switcher.handle_intent(Intent::HoldStart);
        switcher.handle_intent(Intent::Cancel);

        assert!(!switcher.overlay().is_visible());
        assert!(switcher.handle_intent(Intent::Commit).is_none());
        assert!(focused(&switcher).is_empty());
    }

    #[test]
    fn test_run_drains_channel() {
        let mut switcher = create_switcher(&["a", "b", "c"]);
        let (tx, rx) = mpsc::channel(8);

        tokio_test::block_on(async {
            tx.send(Intent::Tap).await.unwrap();
            tx.send(Intent::SelectIndex { index: 2 }).await.unwrap();
            drop(tx);
            switcher.run(rx).await;
        });

        assert_eq!(focused(&switcher), vec![WindowId(2), WindowId(3)]);
    }
}
