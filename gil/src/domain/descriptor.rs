//! Command, adapter and pipeline stage descriptors handed to the presentation layer

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Identifier of the command every adapter catalog starts with
pub const RECONNECT_COMMAND_ID: &str = "reconnect";

/// One entry in a command catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandDescriptor {
    pub id: String,
    pub description: String,
}

impl CommandDescriptor {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

/// An adapter's type name and the commands it accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterDescriptor {
    pub type_name: String,
    pub commands: Vec<CommandDescriptor>,
}

impl AdapterDescriptor {
    /// Build a catalog with the synthesized reconnect command first, then the
    /// adapter's own commands in their original order
    pub fn with_reconnect(
        type_name: impl Into<String>,
        counterpart: &str,
        adapter_commands: Vec<CommandDescriptor>,
    ) -> Self {
        let type_name = type_name.into();
        debug!(%type_name, count = adapter_commands.len(), "AdapterDescriptor::with_reconnect: called");
        let mut commands = Vec::with_capacity(adapter_commands.len() + 1);
        commands.push(CommandDescriptor::new(
            RECONNECT_COMMAND_ID,
            format!("Disconnects (if connected) from the {counterpart} and tries to connect."),
        ));
        commands.extend(adapter_commands);
        Self { type_name, commands }
    }

    pub fn command_ids(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().map(|c| c.id.as_str())
    }
}

/// A pipeline stage's position, type name and commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageDescriptor {
    /// Position in the pipeline, starting at 0
    pub index: usize,
    pub type_name: String,
    pub commands: Vec<CommandDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconnect_is_first() {
        let descriptor = AdapterDescriptor::with_reconnect(
            "Loopback",
            "external system",
            vec![CommandDescriptor::new("ping", "Ping"), CommandDescriptor::new("reset", "Reset")],
        );
        let ids: Vec<&str> = descriptor.command_ids().collect();
        assert_eq!(ids, vec!["reconnect", "ping", "reset"]);
        assert!(descriptor.commands[0].description.contains("external system"));
    }

    #[test]
    fn test_reconnect_with_empty_catalog() {
        let descriptor = AdapterDescriptor::with_reconnect("Model", "process model", vec![]);
        assert_eq!(descriptor.commands.len(), 1);
        assert_eq!(descriptor.commands[0].id, RECONNECT_COMMAND_ID);
    }
}
