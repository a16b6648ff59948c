//! Sample pipeline stages

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::domain::{CommandDescriptor, CommandParams, CommandResult, Frame, SignalDirection};
use crate::pipeline::{PipelineStage, StageError, parse_param};

use super::external_system::join_values;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn direction_name(direction: SignalDirection) -> &'static str {
    match direction {
        SignalDirection::ToProcessModel => "to-process-model",
        SignalDirection::ToExternalSystem => "to-external-system",
    }
}

/// Multiplies every value flowing in one direction by a factor
pub struct ScaleStage {
    direction: SignalDirection,
    factor: Mutex<f64>,
}

impl ScaleStage {
    pub fn new(direction: SignalDirection, factor: f64) -> Self {
        Self {
            direction,
            factor: Mutex::new(factor),
        }
    }

    pub fn factor(&self) -> f64 {
        *locked(&self.factor)
    }
}

impl PipelineStage for ScaleStage {
    fn type_name(&self) -> &str {
        "ScaleStage"
    }

    fn available_commands(&self) -> Option<Vec<CommandDescriptor>> {
        Some(vec![
            CommandDescriptor::new("set-factor", "Sets the scale factor ('factor')."),
            CommandDescriptor::new("get-factor", "Returns the scale factor."),
        ])
    }

    fn transform(&self, direction: SignalDirection, mut frame: Frame) -> Option<Frame> {
        if direction == self.direction {
            let factor = self.factor();
            frame.values.iter_mut().for_each(|v| *v *= factor);
        }
        Some(frame)
    }

    fn invoke_control_command(&self, id: &str, params: &CommandParams) -> Result<CommandResult, StageError> {
        debug!(%id, "ScaleStage::invoke_control_command: called");
        match id {
            "set-factor" => {
                let factor: f64 = parse_param(params, "factor")?;
                if !factor.is_finite() {
                    return Err(StageError::InvalidParameter {
                        name: "factor".to_string(),
                        reason: "must be finite".to_string(),
                    });
                }
                let previous = std::mem::replace(&mut *locked(&self.factor), factor);
                Ok(CommandResult::from([
                    ("factor".to_string(), factor.to_string()),
                    ("previous".to_string(), previous.to_string()),
                ]))
            }
            "get-factor" => Ok(CommandResult::from([("factor".to_string(), self.factor().to_string())])),
            _ => Err(StageError::UnknownCommand { id: id.to_string() }),
        }
    }
}

#[derive(Default)]
struct Observed {
    to_process_model: Option<Frame>,
    to_external_system: Option<Frame>,
    frames: u64,
}

/// Passes frames through unchanged and remembers the latest one per direction
#[derive(Default)]
pub struct MonitorStage {
    observed: Mutex<Observed>,
}

impl MonitorStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames seen since the last reset
    pub fn frames_seen(&self) -> u64 {
        locked(&self.observed).frames
    }
}

impl PipelineStage for MonitorStage {
    fn type_name(&self) -> &str {
        "MonitorStage"
    }

    fn available_commands(&self) -> Option<Vec<CommandDescriptor>> {
        Some(vec![
            CommandDescriptor::new("last-frame", "Returns the latest frame seen in each direction."),
            CommandDescriptor::new("reset", "Forgets the frames seen so far."),
        ])
    }

    fn transform(&self, direction: SignalDirection, frame: Frame) -> Option<Frame> {
        let mut observed = locked(&self.observed);
        observed.frames += 1;
        match direction {
            SignalDirection::ToProcessModel => observed.to_process_model = Some(frame.clone()),
            SignalDirection::ToExternalSystem => observed.to_external_system = Some(frame.clone()),
        }
        Some(frame)
    }

    fn invoke_control_command(&self, id: &str, _params: &CommandParams) -> Result<CommandResult, StageError> {
        debug!(%id, "MonitorStage::invoke_control_command: called");
        match id {
            "last-frame" => {
                let observed = locked(&self.observed);
                let mut result = CommandResult::from([("frames".to_string(), observed.frames.to_string())]);
                for (direction, frame) in [
                    (SignalDirection::ToProcessModel, &observed.to_process_model),
                    (SignalDirection::ToExternalSystem, &observed.to_external_system),
                ] {
                    if let Some(frame) = frame {
                        result.insert(direction_name(direction).to_string(), join_values(&frame.values));
                    }
                }
                Ok(result)
            }
            "reset" => {
                *locked(&self.observed) = Observed::default();
                Ok(CommandResult::new())
            }
            _ => Err(StageError::UnknownCommand { id: id.to_string() }),
        }
    }
}

/// Drops frames whose first value exceeds a limit
pub struct ThresholdFilterStage {
    limit: Mutex<f64>,
}

impl ThresholdFilterStage {
    pub fn new(limit: f64) -> Self {
        Self { limit: Mutex::new(limit) }
    }
}

impl PipelineStage for ThresholdFilterStage {
    fn type_name(&self) -> &str {
        "ThresholdFilterStage"
    }

    fn available_commands(&self) -> Option<Vec<CommandDescriptor>> {
        Some(vec![CommandDescriptor::new(
            "set-limit",
            "Sets the limit ('limit') above which frames are dropped.",
        )])
    }

    fn transform(&self, _direction: SignalDirection, frame: Frame) -> Option<Frame> {
        let limit = *locked(&self.limit);
        match frame.values.first() {
            Some(first) if *first > limit => None,
            _ => Some(frame),
        }
    }

    fn invoke_control_command(&self, id: &str, params: &CommandParams) -> Result<CommandResult, StageError> {
        debug!(%id, "ThresholdFilterStage::invoke_control_command: called");
        match id {
            "set-limit" => {
                let limit: f64 = parse_param(params, "limit")?;
                *locked(&self.limit) = limit;
                Ok(CommandResult::from([("limit".to_string(), limit.to_string())]))
            }
            _ => Err(StageError::UnknownCommand { id: id.to_string() }),
        }
    }
}
