//! Signal handling and inter-process communication.
//!
//! External inputs reach the tick loop through one mpsc channel of
//! [`SignalMessage`]s: a second `dotclock` invocation signals the
//! running daemon, the config watcher reports file changes, and the
//! usual termination signals request shutdown. The loop drains the
//! channel between ticks, so a tick never observes a half-applied
//! configuration.

use anyhow::{Context, Result};
use signal_hook::{
    consts::signal::{SIGHUP, SIGINT, SIGTERM, SIGUSR1, SIGUSR2},
    iterator::Signals,
};
use std::{
    sync::Arc,
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

/// Unified message type for everything arriving from outside the loop.
#[derive(Debug, Clone)]
pub enum SignalMessage {
    /// Configuration reload (SIGUSR2 or config watcher).
    Reload,
    /// Snooze the sounding or pending alarm (SIGUSR1).
    Snooze,
    /// Shutdown (SIGTERM, SIGINT, SIGHUP).
    Shutdown,
}

/// Shared state between the signal thread and the tick loop.
pub struct SignalState {
    /// Cleared when the application should exit.
    pub running: Arc<AtomicBool>,
    /// Receiving end drained by the tick loop between ticks.
    pub signal_receiver: std::sync::mpsc::Receiver<SignalMessage>,
    /// Sender handed to the config watcher and other producers.
    pub signal_sender: std::sync::mpsc::Sender<SignalMessage>,
}

/// Install the signal handler thread and build the shared state.
pub fn setup_signal_handler(debug_enabled: bool) -> Result<SignalState> {
    let running = Arc::new(AtomicBool::new(true));
    let (signal_sender, signal_receiver) = std::sync::mpsc::channel();

    let mut signals = Signals::new([SIGTERM, SIGINT, SIGHUP, SIGUSR1, SIGUSR2])
        .context("failed to register signal handlers")?;

    let thread_sender = signal_sender.clone();
    let thread_running = Arc::clone(&running);

    thread::spawn(move || {
        for signal in signals.forever() {
            let message = match signal {
                SIGUSR1 => SignalMessage::Snooze,
                SIGUSR2 => SignalMessage::Reload,
                _ => {
                    thread_running.store(false, Ordering::SeqCst);
                    SignalMessage::Shutdown
                }
            };
            if debug_enabled {
                log_pipe!();
                log_debug!("Received signal {signal}, queueing {message:?}");
            }
            if thread_sender.send(message).is_err() {
                // Main loop is gone; nothing left to notify.
                break;
            }
        }
    });

    Ok(SignalState {
        running,
        signal_receiver,
        signal_sender,
    })
}
