//! Per-side procedures
//!
//! A procedure wraps one adapter plus the shared integration context and
//! performs one transfer iteration per `run_once` call. The executive drives
//! each procedure from its own loop task.

mod context;
mod counters;
mod error;
mod external_system;
mod process_model;
mod traits;

pub use context::{COMMAND_QUEUE_CAPACITY, FrameSlot, IntegrationContext};
pub use counters::{ExternalSystemCounters, ProcessModelCounters};
pub use error::{CommandError, CommandTarget};
pub use external_system::StandardExternalSystemProcedure;
pub use process_model::StandardProcessModelProcedure;
pub use traits::{ExternalSystemProcedure, ProcessModelProcedure, Procedure};

#[cfg(test)]
pub use traits::mock;
