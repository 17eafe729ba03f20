//! Lock file management for single-instance enforcement.
//!
//! Exactly one dotclock daemon may drive the appliance. The lock file
//! in the runtime directory carries the owner's PID so the `reload` and
//! `snooze` subcommands can find the running instance to signal.

use anyhow::{Context, Result, bail};
use fs2::FileExt;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;

/// Path of the daemon lock file.
pub fn lock_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(runtime_dir).join("dotclock.lock")
}

/// Try to become the single running instance.
///
/// Returns the held lock file on success; the lock is released when the
/// file is dropped at shutdown. Opening without truncation matters: a
/// `File::create` would wipe the owner's PID before we know whether the
/// lock is actually free.
pub fn acquire() -> Result<File> {
    let path = lock_path();
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("failed to open lock file {}", path.display()))?;

    if lock_file.try_lock_exclusive().is_err() {
        match read_owner_pid() {
            Some(pid) if process_is_running(pid) => {
                log_pipe!();
                log_error!("dotclock is already running (PID: {pid})");
                log_pipe!();
                log_decorated!("Did you mean to:");
                log_indented!("• Reload configuration: dotclock reload");
                log_indented!("• Snooze the alarm: dotclock snooze");
                log_pipe!();
                bail!("cannot start - another dotclock instance is running");
            }
            _ => {
                // Stale lock from a dead process; the exclusive lock
                // should now be obtainable.
                log_warning!("Taking over stale lock file");
                lock_file
                    .try_lock_exclusive()
                    .context("lock file is held by an unidentifiable process")?;
            }
        }
    }

    lock_file.set_len(0)?;
    lock_file.seek(SeekFrom::Start(0))?;
    writeln!(&lock_file, "{}", std::process::id())?;
    lock_file.flush()?;

    Ok(lock_file)
}

/// PID of the running daemon, if the lock file names a live process.
pub fn running_instance() -> Option<u32> {
    let pid = read_owner_pid()?;
    process_is_running(pid).then_some(pid)
}

fn read_owner_pid() -> Option<u32> {
    let content = std::fs::read_to_string(lock_path()).ok()?;
    content.lines().next()?.trim().parse().ok()
}

fn process_is_running(pid: u32) -> bool {
    std::path::Path::new(&format!("/proc/{pid}")).exists()
}
