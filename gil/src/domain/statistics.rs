//! Transfer statistics for one side of the integration

use serde::Serialize;

/// Failure and drop counters, summed from the live procedure counters on each query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct Statistics {
    /// Frames discarded instead of delivered
    pub dropped_frames: u64,

    /// Failed command transfers
    pub command_failures: u64,

    /// Failed data writes
    pub data_write_failures: u64,

    /// Failed data reads
    pub data_read_failures: u64,
}

impl Statistics {
    pub fn new(dropped_frames: u64, command_failures: u64, data_write_failures: u64, data_read_failures: u64) -> Self {
        Self {
            dropped_frames,
            command_failures,
            data_write_failures,
            data_read_failures,
        }
    }
}
