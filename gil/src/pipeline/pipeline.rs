//! TransferPipeline - ordered sequence of stages

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::domain::{Frame, SignalDirection, StageDescriptor};

use super::PipelineStage;

/// Pipeline contract violations
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Expected stage {type_name} (index {index}) to return available commands")]
    MissingCommands { index: usize, type_name: String },
}

/// Ordered list of stages that frames pass through
///
/// Frames bound for the process model visit the stages first to last; frames
/// bound for the external system visit them last to first.
#[derive(Clone, Default)]
pub struct TransferPipeline {
    stages: Vec<Arc<dyn PipelineStage>>,
}

impl TransferPipeline {
    pub fn new(stages: Vec<Arc<dyn PipelineStage>>) -> Self {
        debug!(stage_count = stages.len(), "TransferPipeline::new: called");
        Self { stages }
    }

    pub fn stage(&self, index: usize) -> Option<&Arc<dyn PipelineStage>> {
        self.stages.get(index)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run a frame through every stage in the order for its direction
    pub fn process(&self, direction: SignalDirection, frame: Frame) -> Option<Frame> {
        match direction {
            SignalDirection::ToProcessModel => self
                .stages
                .iter()
                .try_fold(frame, |frame, stage| stage.transform(direction, frame)),
            SignalDirection::ToExternalSystem => self
                .stages
                .iter()
                .rev()
                .try_fold(frame, |frame, stage| stage.transform(direction, frame)),
        }
    }

    /// Build the stage catalog, failing before returning anything if a stage
    /// reports no command list
    pub fn describe(&self) -> Result<Vec<StageDescriptor>, PipelineError> {
        debug!(stage_count = self.stages.len(), "TransferPipeline::describe: called");
        self.stages
            .iter()
            .enumerate()
            .map(|(index, stage)| {
                let commands = stage.available_commands().ok_or_else(|| PipelineError::MissingCommands {
                    index,
                    type_name: stage.type_name().to_string(),
                })?;
                Ok(StageDescriptor {
                    index,
                    type_name: stage.type_name().to_string(),
                    commands,
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for TransferPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.stages.iter().map(|s| s.type_name())).finish()
    }
}

#[cfg(test)]
pub mod mock {
    //! Stage doubles for unit tests

    use std::sync::Mutex;

    use crate::domain::{CommandDescriptor, CommandParams, CommandResult};
    use crate::pipeline::StageError;

    use super::*;

    /// Stage that appends a marker value and records what it saw
    pub struct MarkerStage {
        pub name: String,
        pub marker: f64,
        pub commands: Option<Vec<CommandDescriptor>>,
        pub seen: Mutex<Vec<SignalDirection>>,
    }

    impl MarkerStage {
        pub fn new(name: &str, marker: f64) -> Self {
            Self {
                name: name.to_string(),
                marker,
                commands: Some(vec![CommandDescriptor::new("marker", "Return the marker")]),
                seen: Mutex::new(vec![]),
            }
        }

        pub fn without_commands(mut self) -> Self {
            self.commands = None;
            self
        }
    }

    impl PipelineStage for MarkerStage {
        fn type_name(&self) -> &str {
            &self.name
        }

        fn available_commands(&self) -> Option<Vec<CommandDescriptor>> {
            self.commands.clone()
        }

        fn transform(&self, direction: SignalDirection, mut frame: Frame) -> Option<Frame> {
            self.seen.lock().unwrap().push(direction);
            frame.values.push(self.marker);
            Some(frame)
        }

        fn invoke_control_command(&self, id: &str, _params: &CommandParams) -> Result<CommandResult, StageError> {
            match id {
                "marker" => Ok(CommandResult::from([("marker".to_string(), self.marker.to_string())])),
                _ => Err(StageError::UnknownCommand { id: id.to_string() }),
            }
        }
    }

    /// Stage that drops every frame
    pub struct DropAllStage;

    impl PipelineStage for DropAllStage {
        fn type_name(&self) -> &str {
            "DropAllStage"
        }

        fn available_commands(&self) -> Option<Vec<CommandDescriptor>> {
            Some(vec![])
        }

        fn transform(&self, _direction: SignalDirection, _frame: Frame) -> Option<Frame> {
            None
        }

        fn invoke_control_command(&self, id: &str, _params: &CommandParams) -> Result<CommandResult, StageError> {
            Err(StageError::UnknownCommand { id: id.to_string() })
        }
    }
}
