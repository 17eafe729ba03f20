//! Command-line argument parsing and processing.
//!
//! Arguments stay deliberately small: run the daemon, or poke a running
//! daemon with `reload` / `snooze`. Unknown input prints the help text
//! and exits with a failure code.

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run the clock daemon.
    Run { debug_enabled: bool },
    /// Signal the running daemon to reload its configuration.
    Reload { debug_enabled: bool },
    /// Signal the running daemon to snooze the alarm.
    Snooze { debug_enabled: bool },
    /// Display help information and exit.
    ShowHelp,
    /// Display version information and exit.
    ShowVersion,
    /// Show help due to unknown arguments and exit.
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

impl ParsedArgs {
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self::from_args(args)
    }

    fn from_args(args: Vec<String>) -> Self {
        let mut debug_enabled = false;
        let mut command: Option<&str> = None;

        for arg in &args {
            match arg.as_str() {
                "-d" | "--debug" => debug_enabled = true,
                "-h" | "--help" => {
                    return Self {
                        action: CliAction::ShowHelp,
                    };
                }
                "-V" | "--version" => {
                    return Self {
                        action: CliAction::ShowVersion,
                    };
                }
                "reload" | "snooze" if command.is_none() => {
                    command = Some(arg.as_str());
                }
                _ => {
                    return Self {
                        action: CliAction::ShowHelpDueToError,
                    };
                }
            }
        }

        let action = match command {
            Some("reload") => CliAction::Reload { debug_enabled },
            Some("snooze") => CliAction::Snooze { debug_enabled },
            _ => CliAction::Run { debug_enabled },
        };
        Self { action }
    }
}

/// Print usage information.
pub fn display_help() {
    log_version!();
    log_block_start!("Usage: dotclock [OPTIONS] [COMMAND]");
    log_pipe!();
    log_decorated!("Commands:");
    log_indented!("reload     Reload the running daemon's configuration");
    log_indented!("snooze     Snooze the sounding alarm");
    log_pipe!();
    log_decorated!("Options:");
    log_indented!("-d, --debug    Enable detailed debug output");
    log_indented!("-h, --help     Print help");
    log_indented!("-V, --version  Print version");
    log_end!();
}

/// Print version information.
pub fn display_version_info() {
    log_version!();
    log_block_start!("Scheduling core for a dot-matrix alarm clock appliance");
    log_decorated!("https://github.com/udos-workshop/dotclock");
    log_end!();
}
