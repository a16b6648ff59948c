//! Domain types for the integration layer
//!
//! Plain value types shared by adapters, procedures, the pipeline and the
//! executive. All of them are immutable once handed out.

use std::collections::HashMap;

mod descriptor;
mod frame;
mod progress;
mod state;
mod statistics;

pub use descriptor::{AdapterDescriptor, CommandDescriptor, RECONNECT_COMMAND_ID, StageDescriptor};
pub use frame::{Frame, SignalDirection, SignalMetadata};
pub use progress::ProgressInfo;
pub use state::{StatusCode, SystemSnapshot, SystemState, SystemStatus};
pub use statistics::Statistics;

/// Parameters passed to a control command
pub type CommandParams = HashMap<String, String>;

/// Values returned by a control command
pub type CommandResult = HashMap<String, String>;

/// Current wall-clock time in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
