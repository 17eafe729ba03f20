//! File watching for hot config reload.
//!
//! Watches the configuration file and feeds a reload message into the
//! signal channel when it changes, so editing `dotclock.toml` takes
//! effect at the next tick without restarting the daemon.

use anyhow::{Context, Result};
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::thread;
use std::time::Duration;

use super::Config;
use crate::io::signals::SignalMessage;

/// Editors write files in several steps; collapse the burst into one
/// reload.
const DEBOUNCE_MS: u64 = 500;

/// Spawn the watcher thread. Failure is not fatal: the daemon still
/// reloads on SIGUSR2.
pub fn start_config_watcher(
    signal_sender: std::sync::mpsc::Sender<SignalMessage>,
    debug_enabled: bool,
) -> Result<()> {
    let config_path = Config::config_path()?;
    let watch_dir = config_path
        .parent()
        .context("config path has no parent directory")?
        .to_path_buf();

    let (tx, rx) = std::sync::mpsc::channel();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
                        let _ = tx.send(event);
                    }
                    _ => {}
                }
            }
        },
        NotifyConfig::default(),
    )
    .context("failed to create file watcher")?;

    // Watching the directory rather than the file survives the
    // replace-by-rename dance most editors do.
    watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", watch_dir.display()))?;

    if debug_enabled {
        log_pipe!();
        log_debug!("Watching {} for config changes", config_path.display());
    }

    thread::spawn(move || {
        // Keep the watcher alive inside the thread.
        let _watcher = watcher;
        loop {
            let Ok(event) = rx.recv() else { break };
            if !event.paths.iter().any(|p| p.ends_with("dotclock.toml")) {
                continue;
            }
            // Swallow the remainder of the write burst.
            thread::sleep(Duration::from_millis(DEBOUNCE_MS));
            while rx.try_recv().is_ok() {}

            if signal_sender.send(SignalMessage::Reload).is_err() {
                break;
            }
        }
    });

    Ok(())
}
