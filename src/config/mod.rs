//! Configuration for the dotclock daemon.
//!
//! Settings live in `dotclock.toml` under the XDG config directory.
//! Everything is optional with sensible defaults; a missing file is
//! generated from a commented template on first start. The schedule
//! table is deliberately NOT part of this file: it is runtime-mutable
//! state owned by the settings store, while this file carries the
//! operator-edited knobs.
//!
//! ```toml
//! #[Time]
//! timezone = "CET-1CEST-2,M3.5.0/2,M10.5.0/3"  # POSIX descriptor
//! ntp_server = "pool.ntp.org"   # handed to the network time collaborator
//! no_sync_threshold = 121       # minutes without sync before the RTC corrects
//!
//! #[Storage]
//! # state_dir = "/var/lib/dotclock"  # settings blob location
//! ```

pub mod watcher;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::path::PathBuf;

use crate::constants::{DEFAULT_NO_SYNC_THRESHOLD, DEFAULT_NTP_SERVER, DEFAULT_TIMEZONE};
use crate::tz::TimezoneInfo;

pub use watcher::start_config_watcher;

#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct Config {
    /// POSIX timezone descriptor. Invalid descriptors fail validation;
    /// on a hot reload the previously active configuration stays in
    /// effect.
    pub timezone: Option<String>,
    /// NTP server address, opaque to this core.
    pub ntp_server: Option<String>,
    /// Minutes without a completed sync before the hardware clock
    /// corrects the system clock.
    pub no_sync_threshold: Option<u32>,
    /// Directory for the settings blobs.
    pub state_dir: Option<String>,
}

impl Config {
    /// Load the configuration, generating a default file if none
    /// exists yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            Self::create_default_config(&path)?;
            log_block_start!("Created default configuration at {}", path.display());
        }
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/dotclock/dotclock.toml`.
    pub fn config_path() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| anyhow!("could not determine config directory"))?;
        Ok(base.join("dotclock").join("dotclock.toml"))
    }

    pub fn timezone(&self) -> &str {
        self.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE)
    }

    pub fn ntp_server(&self) -> &str {
        self.ntp_server.as_deref().unwrap_or(DEFAULT_NTP_SERVER)
    }

    pub fn no_sync_threshold(&self) -> u32 {
        self.no_sync_threshold.unwrap_or(DEFAULT_NO_SYNC_THRESHOLD)
    }

    /// Directory the settings blobs live in. Defaults to the XDG data
    /// directory so the daemon works without privileges.
    pub fn state_dir(&self) -> PathBuf {
        match self.state_dir.as_deref() {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("/var/lib"))
                .join("dotclock"),
        }
    }

    fn validate(&self) -> Result<()> {
        if let Some(descriptor) = self.timezone.as_deref() {
            TimezoneInfo::from_descriptor(descriptor)
                .map_err(|e| anyhow!(e).context("invalid timezone in configuration"))?;
        }
        if self.no_sync_threshold == Some(0) {
            anyhow::bail!("no_sync_threshold must be at least 1 minute");
        }
        if let Some(server) = self.ntp_server.as_deref()
            && server.is_empty()
        {
            anyhow::bail!("ntp_server must not be empty");
        }
        Ok(())
    }

    /// Write the commented default template.
    pub fn create_default_config(path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create config directory {}", parent.display()))?;
        }
        let template = format!(
            "#[Time]\n\
             timezone = \"{DEFAULT_TIMEZONE}\"  # POSIX timezone descriptor\n\
             ntp_server = \"{DEFAULT_NTP_SERVER}\"   # network time server (opaque to the clock core)\n\
             no_sync_threshold = {DEFAULT_NO_SYNC_THRESHOLD}       # minutes without sync before the RTC corrects\n\
             \n\
             #[Storage]\n\
             # state_dir = \"/var/lib/dotclock\"  # settings blob location (default: XDG data dir)\n"
        );
        std::fs::write(path, template)
            .with_context(|| format!("failed to write default config {}", path.display()))?;
        Ok(())
    }

    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");
        log_indented!("Timezone: {}", self.timezone());
        log_indented!("NTP server: {}", self.ntp_server());
        log_indented!("No-sync threshold: {} minutes", self.no_sync_threshold());
        log_indented!("State directory: {}", self.state_dir().display());
    }
}
