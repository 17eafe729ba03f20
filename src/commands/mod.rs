// CLI subcommands that talk to a running daemon.

pub mod reload;
pub mod snooze;
