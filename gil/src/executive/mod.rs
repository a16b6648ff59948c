//! Integration executive
//!
//! Owns the two polling loops, publishes their state and progress, manages
//! the start/stop lifecycle, aggregates statistics, describes adapters and
//! pipeline stages, and brokers control commands into the owning loop.

mod dispatch;
mod integration;
mod runner;
mod snapshot;

pub use dispatch::{CommandChannel, CommandRequest, DispatchError};
pub use integration::{ExecutiveError, IntegrationExecutive};
pub use runner::{LoopState, Side};
pub use snapshot::SnapshotCell;
