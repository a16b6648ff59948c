//! Data frames and the signal metadata that sizes them

use serde::{Deserialize, Serialize};

/// One unit of data moved between the two sides in an iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Time the frame was produced, in milliseconds
    pub timestamp_ms: i64,

    /// Signal values in signal-metadata order
    pub values: Vec<f64>,
}

impl Frame {
    pub fn new(timestamp_ms: i64, values: Vec<f64>) -> Self {
        Self { timestamp_ms, values }
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }
}

/// Which way a signal flows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalDirection {
    /// Read from the external system, written to the process model
    ToProcessModel,
    /// Read from the process model, written to the external system
    ToExternalSystem,
}

/// Description of one transferred signal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalMetadata {
    pub id: String,
    pub direction: SignalDirection,
}

impl SignalMetadata {
    pub fn new(id: impl Into<String>, direction: SignalDirection) -> Self {
        Self {
            id: id.into(),
            direction,
        }
    }

    /// Number of values a frame flowing in `direction` carries
    pub fn frame_width(signals: &[SignalMetadata], direction: SignalDirection) -> usize {
        signals.iter().filter(|s| s.direction == direction).count()
    }
}
