//! Main entry point and CLI dispatch.
//!
//! Parses the command line and hands off to the appropriate flow: the
//! daemon itself via the [`Dotclock`] builder, or one of the
//! subcommands that signal a running instance.

use anyhow::Result;

use dotclock::args::{self, CliAction, ParsedArgs};
use dotclock::commands;
use dotclock::Dotclock;

fn main() -> Result<()> {
    let parsed_args = ParsedArgs::from_env();

    match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            std::process::exit(dotclock::constants::EXIT_FAILURE);
        }
        CliAction::Run { debug_enabled } => Dotclock::new(debug_enabled).run(),
        CliAction::Reload { debug_enabled } => commands::reload::handle_reload_command(debug_enabled),
        CliAction::Snooze { debug_enabled } => commands::snooze::handle_snooze_command(debug_enabled),
    }
}
