//! The opaque settings store and the deferred-write timer.
//!
//! Settings travel to persistence as named blobs; the store neither
//! knows nor cares what is inside them. On the appliance the blobs land
//! in NVRAM, on a host in files under the state directory. Writes are
//! deliberately rare: the deferred-write timer coalesces a burst of
//! edits into a single store operation to spare the flash.

use std::fs;
use std::path::PathBuf;

use crate::constants::PERSIST_DELAY_TICKS;
use crate::error::ClockError;

/// Named-blob persistence, the only interface the core has to storage.
pub trait SettingsStore {
    fn load_blob(&mut self, name: &str) -> Result<Option<Vec<u8>>, ClockError>;
    fn save_blob(&mut self, name: &str, blob: &[u8]) -> Result<(), ClockError>;
}

/// File-per-blob store rooted in a directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl SettingsStore for FileStore {
    fn load_blob(&mut self, name: &str) -> Result<Option<Vec<u8>>, ClockError> {
        match fs::read(self.blob_path(name)) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ClockError::device("settings store", e)),
        }
    }

    fn save_blob(&mut self, name: &str, blob: &[u8]) -> Result<(), ClockError> {
        fs::create_dir_all(&self.dir).map_err(|e| ClockError::device("settings store", e))?;
        fs::write(self.blob_path(name), blob).map_err(|e| ClockError::device("settings store", e))
    }
}

/// Tick-driven write deferral.
///
/// An edit starts (or restarts) the countdown; once enough ticks pass
/// without further edits the pending write fires exactly once and the
/// timer parks until the next edit.
#[derive(Debug, Default)]
pub struct DeferredWrite {
    ticks_dirty: Option<u32>,
}

impl DeferredWrite {
    /// Note an edit. Restarting the countdown on every edit batches
    /// rapid front-panel adjustments into one write.
    pub fn mark_dirty(&mut self) {
        self.ticks_dirty = Some(0);
    }

    pub fn is_dirty(&self) -> bool {
        self.ticks_dirty.is_some()
    }

    /// Advance one tick; returns true when the write should happen now.
    pub fn tick(&mut self) -> bool {
        match self.ticks_dirty.as_mut() {
            None => false,
            Some(ticks) => {
                *ticks += 1;
                if *ticks > PERSIST_DELAY_TICKS {
                    self.ticks_dirty = None;
                    true
                } else {
                    false
                }
            }
        }
    }
}
