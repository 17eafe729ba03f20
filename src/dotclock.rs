//! Application coordinator managing the daemon lifecycle.
//!
//! Handles resource acquisition and wiring before the tick loop takes
//! over: configuration loading, single-instance lock, signal handlers,
//! the config watcher, the collaborator implementations, and finally
//! the [`Core`](crate::core::Core) that runs the clock.

use anyhow::Result;

use crate::{
    config::{self, Config},
    constants::EXIT_FAILURE,
    core::{Core, CoreParams},
    hw::host::{
        ConsoleDisplay, HostSystemClock, IdleSyncMonitor, LoggingAudioSink, SoftHardwareClock,
    },
    io::lock,
    io::signals::setup_signal_handler,
    io::store::FileStore,
};

/// Builder for configuring and running the dotclock daemon.
///
/// # Examples
///
/// ```no_run
/// use dotclock::Dotclock;
///
/// # fn main() -> anyhow::Result<()> {
/// let debug_enabled = false;
/// Dotclock::new(debug_enabled).run()?;
/// # Ok(())
/// # }
/// ```
pub struct Dotclock {
    debug_enabled: bool,
    create_lock: bool,
    show_headers: bool,
}

impl Dotclock {
    /// Create a new runner with defaults matching a normal run.
    pub fn new(debug_enabled: bool) -> Self {
        Self {
            debug_enabled,
            create_lock: true,
            show_headers: true,
        }
    }

    /// Skip lock file creation (used by tests running side by side).
    pub fn without_lock(mut self) -> Self {
        self.create_lock = false;
        self
    }

    /// Skip the header display.
    pub fn without_headers(mut self) -> Self {
        self.show_headers = false;
        self
    }

    /// Execute the daemon with the configured settings.
    pub fn run(self) -> Result<()> {
        if self.show_headers {
            log_version!();
            if self.debug_enabled {
                log_pipe!();
                log_debug!("Debug mode enabled - showing detailed clock operations");
            }
        }

        let config = match Config::load() {
            Ok(config) => config,
            Err(e) => {
                log_error_exit!("Configuration failed");
                eprintln!("{e:?}");
                std::process::exit(EXIT_FAILURE);
            }
        };

        // Hold the lock for the whole daemon lifetime.
        let _lock_file = if self.create_lock {
            Some(lock::acquire()?)
        } else {
            None
        };
        if self.create_lock {
            log_block_start!("Lock acquired, starting dotclock...");
        }

        let signal_state = setup_signal_handler(self.debug_enabled)?;

        // Hot reload is best effort; SIGUSR2 always works.
        if let Err(e) =
            config::start_config_watcher(signal_state.signal_sender.clone(), self.debug_enabled)
            && self.debug_enabled
        {
            log_pipe!();
            log_warning!("Config file watching unavailable: {e}");
            log_indented!("Hot config reload disabled, use 'dotclock reload' instead");
        }

        config.log_config();

        let store = FileStore::new(config.state_dir());

        let core = Core::new(CoreParams {
            config,
            signal_state,
            debug_enabled: self.debug_enabled,
            system_clock: Box::new(HostSystemClock::default()),
            hardware_clock: Box::new(SoftHardwareClock::default()),
            sync_monitor: Box::new(IdleSyncMonitor),
            audio: Box::new(LoggingAudioSink),
            tick_sinks: vec![Box::new(ConsoleDisplay::default())],
            store: Box::new(store),
        })?;

        core.execute()
    }
}
