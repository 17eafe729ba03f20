//! Implementation of the `snooze` subcommand.
//!
//! Sends SIGUSR1 to the running daemon, which stops a sounding alarm
//! and postpones the pending ring by the configured snooze length.

use anyhow::{Context, Result};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;

pub fn handle_snooze_command(_debug_enabled: bool) -> Result<()> {
    log_version!();

    match crate::io::lock::running_instance() {
        Some(pid) => {
            send_signal(pid, Signal::SIGUSR1)?;
            log_block_start!("Snooze sent to dotclock (PID: {pid})");
        }
        None => {
            log_pipe!();
            log_error!("No running dotclock instance found");
        }
    }
    log_end!();
    Ok(())
}

/// Deliver a signal to the daemon process.
pub(crate) fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    kill(Pid::from_raw(pid as i32), signal)
        .with_context(|| format!("failed to signal process {pid}"))
}
