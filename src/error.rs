//! Error taxonomy for the scheduling core.
//!
//! Every failure in this crate is recoverable: parse and calendar errors
//! fall back to the previously active configuration or to standard time,
//! device errors are reported and retried on a later tick. Nothing here
//! aborts the tick loop.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClockError {
    /// The timezone descriptor could not be parsed. The previously active
    /// timezone stays in effect.
    #[error("malformed timezone descriptor {descriptor:?}: {reason}")]
    Parse {
        descriptor: String,
        reason: &'static str,
    },

    /// Daylight rules cannot be computed for years before the epoch year.
    /// Conversions still succeed with the standard offset only.
    #[error("cannot compute daylight transitions for year {0}")]
    Calendar(i32),

    /// A blocking collaborator call (hardware clock, audio pipeline,
    /// settings store) failed. In-memory state is left untouched.
    #[error("{device} I/O failed")]
    DeviceIo {
        device: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// An externally supplied schedule table had the wrong entry count.
    /// The entire update is rejected and the prior table retained.
    #[error("schedule table holds {actual} entries, expected exactly {expected}")]
    ScheduleFormat { expected: usize, actual: usize },
}

impl ClockError {
    pub(crate) fn device(device: &'static str, source: std::io::Error) -> Self {
        ClockError::DeviceIo { device, source }
    }
}
