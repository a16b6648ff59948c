//! Adapter capability traits
//!
//! An adapter is the boundary to one side of the integration. The procedures
//! use the I/O half (connect, read, write, commands) from their loop task;
//! the executive uses the descriptive half (state, frequency, catalog,
//! progress) from caller threads. Every method therefore takes `&self`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{CommandDescriptor, CommandParams, CommandResult, Frame, ProgressInfo, SystemState, SystemStatus};

use super::AdapterError;

/// Optional features an adapter declares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// The adapter publishes progress through registered listeners
    pub reports_progress: bool,
}

/// Observer for adapter progress reports
pub trait ProgressListener: Send + Sync {
    fn progress_changed(&self, progress: ProgressInfo);
}

/// A command moving from the process model to the external system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCommand {
    pub id: String,
    pub params: CommandParams,
}

impl TransferCommand {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            params: CommandParams::new(),
        }
    }
}

/// Front end facing the external system (plant instrumentation, control interface, ...)
#[async_trait]
pub trait ExternalSystemAdapter: Send + Sync {
    /// Short type name shown in catalogs
    fn type_name(&self) -> &str;

    fn state(&self) -> SystemState;

    fn status(&self) -> SystemStatus;

    /// Declared operating frequency in Hz
    fn operating_frequency(&self) -> f64;

    fn capabilities(&self) -> Capabilities;

    fn available_control_commands(&self) -> Vec<CommandDescriptor>;

    /// Only called when `capabilities().reports_progress` is set
    fn add_progress_listener(&self, listener: Arc<dyn ProgressListener>);

    fn is_connected(&self) -> bool;

    async fn connect(&self) -> Result<(), AdapterError>;

    /// Must be a no-op when not connected
    async fn disconnect(&self) -> Result<(), AdapterError>;

    /// Read the next frame bound for the process model, `None` when nothing new is available
    async fn read_data(&self) -> Result<Option<Frame>, AdapterError>;

    async fn write_data(&self, frame: &Frame) -> Result<(), AdapterError>;

    async fn write_command(&self, command: &TransferCommand) -> Result<(), AdapterError>;

    async fn invoke_control_command(&self, id: &str, params: &CommandParams) -> Result<CommandResult, AdapterError>;
}

/// Front end facing the process model (a real-time simulation)
#[async_trait]
pub trait ProcessModelAdapter: Send + Sync {
    fn type_name(&self) -> &str;

    fn state(&self) -> SystemState;

    fn status(&self) -> SystemStatus;

    /// Declared operating frequency in Hz
    fn operating_frequency(&self) -> f64;

    fn capabilities(&self) -> Capabilities;

    fn available_control_commands(&self) -> Vec<CommandDescriptor>;

    /// Always called; process models are expected to report progress
    fn add_progress_listener(&self, listener: Arc<dyn ProgressListener>);

    fn is_connected(&self) -> bool;

    async fn connect(&self) -> Result<(), AdapterError>;

    /// Must be a no-op when not connected
    async fn disconnect(&self) -> Result<(), AdapterError>;

    /// Current simulation time in milliseconds
    async fn read_sim_time(&self) -> Result<i64, AdapterError>;

    /// Commands the model wants forwarded to the external system
    async fn read_commands(&self) -> Result<Vec<TransferCommand>, AdapterError>;

    /// Read the next frame bound for the external system, `None` when nothing new is available
    async fn read_data(&self) -> Result<Option<Frame>, AdapterError>;

    async fn write_data(&self, frame: &Frame) -> Result<(), AdapterError>;

    async fn invoke_control_command(&self, id: &str, params: &CommandParams) -> Result<CommandResult, AdapterError>;
}
