//! PipelineStage trait definition

use thiserror::Error;

use crate::domain::{CommandDescriptor, CommandParams, CommandResult, Frame, SignalDirection};

/// Errors raised by a stage while executing a control command
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Unknown command: {id}")]
    UnknownCommand { id: String },

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Stage failure: {0}")]
    Failed(String),
}

/// One ordered transformation step between the two sides
///
/// Stages are shared between the process-model loop (which transforms frames)
/// and caller threads (which inspect catalogs and invoke commands through the
/// loop), so every method takes `&self` and stages keep their own interior
/// mutability.
pub trait PipelineStage: Send + Sync {
    /// Short type name shown in catalogs
    fn type_name(&self) -> &str;

    /// Commands this stage accepts
    ///
    /// Returning `None` breaks the stage contract; catalog queries fail fast on it.
    fn available_commands(&self) -> Option<Vec<CommandDescriptor>>;

    /// Transform a frame flowing in `direction`; `None` drops the frame
    fn transform(&self, direction: SignalDirection, frame: Frame) -> Option<Frame> {
        let _ = direction;
        Some(frame)
    }

    fn invoke_control_command(&self, id: &str, params: &CommandParams) -> Result<CommandResult, StageError>;
}

/// Look up a required parameter and parse it
pub fn parse_param<T: std::str::FromStr>(params: &CommandParams, name: &str) -> Result<T, StageError> {
    let raw = params.get(name).ok_or_else(|| StageError::InvalidParameter {
        name: name.to_string(),
        reason: "missing".to_string(),
    })?;
    raw.trim().parse().map_err(|_| StageError::InvalidParameter {
        name: name.to_string(),
        reason: format!("cannot parse '{raw}'"),
    })
}
