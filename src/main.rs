//! switcher-daemon: Background daemon for gesture-driven window switching
//!
//! This daemon runs in the user session and provides:
//! - A low-level keyboard hook observing one initiator + modifier gesture
//! - An explicit gesture state machine emitting switch intents
//! - Window enumeration and coercive focus transfer to act on them
//!
//! Scope:
//! - Quick swap to the previous window, indexed multi-tap selection and
//!   overlay-driven cycling
//! - NO overlay rendering, settings UI or theming

mod config;
mod desktop;
mod events;
mod gesture;
mod hotkey;
mod lifecycle;
mod overlay;
mod switcher;

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Config, ConfigHandle};
use crate::events::Intent;
use crate::hotkey::HookListener;
use crate::lifecycle::ShutdownSignal;

/// How often the settings file is checked for edits
const SETTINGS_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "switcher-daemon starting"
    );

    // Load configuration
    let config = Config::load();
    let hotkeys = config
        .load_hotkeys()
        .with_context(|| format!("failed to load hotkey settings from {:?}", config.settings_path))?;
    info!(?config.settings_path, initiator = %hotkeys.initiator, modifier = %hotkeys.modifier, "configuration loaded");

    if config.settings_modified().is_none() {
        if let Err(e) = config.save_hotkeys(&hotkeys) {
            warn!(error = %e, "could not write default hotkey settings");
        }
    }

    let hotkeys = ConfigHandle::new(hotkeys);

    // Create shutdown signal handler
    let shutdown = ShutdownSignal::new();

    // Hook thread -> switcher
    let (intent_tx, intent_rx) = mpsc::channel::<Intent>(64);

    // Without the hook there is nothing to do
    let listener = HookListener::new(hotkeys.clone(), intent_tx);
    listener
        .start()
        .await
        .context("failed to start keyboard hook")?;
    info!("keyboard hook listener started");

    info!("daemon initialized, entering main loop");

    tokio::select! {
        // Act on intents (owns all window activation)
        _ = run_switcher(intent_rx) => {
            info!("switcher exited");
        }

        // Pick up edits to the settings file
        _ = watch_settings(&config, &hotkeys) => {}

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    listener.stop();

    info!("switcher-daemon stopped");

    Ok(())
}

#[cfg(windows)]
async fn run_switcher(intent_rx: mpsc::Receiver<Intent>) {
    let mut switcher = switcher::Switcher::new(desktop::Win32Windows, desktop::Win32Foreground);
    switcher.run(intent_rx).await;
}

/// No window backend: intents are only logged
#[cfg(not(windows))]
async fn run_switcher(mut intent_rx: mpsc::Receiver<Intent>) {
    warn!("no window backend on this platform, intents will only be logged");
    while let Some(intent) = intent_rx.recv().await {
        info!(%intent, "intent received");
    }
}

/// Reload hotkey settings whenever the settings file changes on disk
async fn watch_settings(config: &Config, hotkeys: &ConfigHandle) {
    let mut last_modified = config.settings_modified();
    let mut interval = tokio::time::interval(SETTINGS_POLL_INTERVAL);

    loop {
        interval.tick().await;

        let modified = config.settings_modified();
        if modified == last_modified {
            continue;
        }
        last_modified = modified;

        match config.load_hotkeys().and_then(|loaded| hotkeys.replace(loaded)) {
            Ok(()) => {}
            Err(e) => warn!(error = %e, "ignoring unusable hotkey settings"),
        }
    }
}
