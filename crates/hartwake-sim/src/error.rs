use std::time::Duration;

use hartwake_platform::HartId;
use thiserror::Error;

use crate::hart::HartSnapshot;

pub type Result<T> = std::result::Result<T, MachineError>;

/// Errors returned when constructing or booting a [`crate::Machine`].
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("invalid hart count {0}")]
    InvalidHartCount(usize),

    #[error("firmware was built for {expected} harts but the machine has {actual}")]
    HartCountMismatch { expected: usize, actual: usize },

    #[error("failed to start {hart}: {source}")]
    Spawn {
        hart: HartId,
        #[source]
        source: std::io::Error,
    },

    #[error("{hart} panicked: {message}")]
    HartPanicked { hart: HartId, message: String },

    /// The primary hart did not exit in time.
    ///
    /// `harts` is the state of every hart when the watchdog fired, before power-off.
    #[error("watchdog expired after {timeout:?} without an exit code")]
    Watchdog {
        timeout: Duration,
        harts: Vec<HartSnapshot>,
    },

    #[error("primary hart stopped without an exit code")]
    NoExitCode,
}
