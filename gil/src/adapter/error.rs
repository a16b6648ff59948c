//! Adapter error types

use thiserror::Error;

/// Errors raised by an adapter while talking to its counterpart
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("Not connected to {counterpart}")]
    NotConnected { counterpart: String },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Read failed: {0}")]
    Read(String),

    #[error("Write failed: {0}")]
    Write(String),

    #[error("Unknown command: {id}")]
    UnknownCommand { id: String },

    #[error("Command '{id}' failed: {reason}")]
    Command { id: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_message() {
        let err = AdapterError::Command {
            id: "load-state".to_string(),
            reason: "missing 'name' parameter".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("load-state"));
        assert!(msg.contains("missing 'name'"));
    }
}
