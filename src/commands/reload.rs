//! Implementation of the `reload` subcommand.
//!
//! Validates the configuration locally first, so a typo is reported to
//! the terminal that made it instead of only to the daemon's log, then
//! signals the running instance with SIGUSR2.

use anyhow::Result;

use crate::config::Config;

pub fn handle_reload_command(debug_enabled: bool) -> Result<()> {
    log_version!();

    // Fail fast on a broken config before poking the daemon.
    let config = Config::load()?;
    if debug_enabled {
        config.log_config();
    }

    match crate::io::lock::running_instance() {
        Some(pid) => {
            log_block_start!("Signaling dotclock to reload...");
            super::snooze::send_signal(pid, nix::sys::signal::Signal::SIGUSR2)?;
            log_decorated!("Sent reload signal to dotclock (PID: {pid})");
        }
        None => {
            log_pipe!();
            log_error!("No running dotclock instance found");
            log_indented!("Start one with: dotclock");
        }
    }
    log_end!();
    Ok(())
}
