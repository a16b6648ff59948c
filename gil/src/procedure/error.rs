//! Command routing types shared by the procedures and the executive

use serde::Serialize;
use thiserror::Error;

use crate::adapter::AdapterError;
use crate::pipeline::StageError;

/// What a control command is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandTarget {
    /// The procedure's own adapter
    Adapter,
    /// The pipeline stage at this sequence index
    Stage(usize),
}

impl std::fmt::Display for CommandTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Adapter => write!(f, "adapter"),
            Self::Stage(index) => write!(f, "stage {index}"),
        }
    }
}

/// Failures raised while a procedure executes a control command
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command: {id}")]
    UnknownCommand { id: String },

    #[error("No pipeline stage with index {index} (pipeline has {len} stages)")]
    UnknownStage { index: usize, len: usize },

    #[error("Command target {target} is not supported here")]
    UnsupportedTarget { target: CommandTarget },

    #[error("Adapter failed executing command: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Stage failed executing command: {0}")]
    Stage(#[from] StageError),

    #[error("Command {0}")]
    Panicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_display() {
        assert_eq!(CommandTarget::Adapter.to_string(), "adapter");
        assert_eq!(CommandTarget::Stage(3).to_string(), "stage 3");
    }

    #[test]
    fn test_adapter_error_wraps_cause() {
        let err: CommandError = AdapterError::Write("link down".to_string()).into();
        assert!(err.to_string().contains("link down"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
