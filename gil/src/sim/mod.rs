//! Simulated integration
//!
//! A loopback external system, a gain process model and a few sample stages,
//! wired together from the `simulation` config section. Used by the binary
//! and by the integration tests.

mod external_system;
mod process_model;
mod stages;

use std::sync::Arc;

use tracing::debug;

pub use external_system::LoopbackExternalSystem;
pub use process_model::SimulatedProcessModel;
pub use stages::{MonitorStage, ScaleStage, ThresholdFilterStage};

use crate::config::{ExecutiveConfig, SimulationConfig};
use crate::domain::{SignalDirection, SignalMetadata};
use crate::executive::IntegrationExecutive;
use crate::pipeline::TransferPipeline;

/// Limit above which the threshold stage drops frames by default
const DEFAULT_THRESHOLD: f64 = 10.0;

/// The parts of a simulated integration, kept so callers can inspect them
pub struct SimulatedIntegration {
    pub external_system: Arc<LoopbackExternalSystem>,
    pub process_model: Arc<SimulatedProcessModel>,
    pub pipeline: Arc<TransferPipeline>,
    pub signals: Vec<SignalMetadata>,
}

impl SimulatedIntegration {
    /// Build the adapters, the signal list and the pipeline
    /// (monitor, scale toward the process model, threshold filter)
    pub fn from_config(config: &SimulationConfig) -> Self {
        debug!(?config, "SimulatedIntegration::from_config: called");
        let signals: Vec<SignalMetadata> = (0..config.signals_to_process_model)
            .map(|i| SignalMetadata::new(format!("es-out-{i}"), SignalDirection::ToProcessModel))
            .chain(
                (0..config.signals_to_external_system)
                    .map(|i| SignalMetadata::new(format!("pm-out-{i}"), SignalDirection::ToExternalSystem)),
            )
            .collect();

        let external_system = Arc::new(LoopbackExternalSystem::new(
            config.external_system_frequency,
            config.signals_to_process_model,
        ));
        let process_model = Arc::new(SimulatedProcessModel::new(
            config.process_model_frequency,
            config.model_gain,
            config.signals_to_external_system,
        ));
        let pipeline = Arc::new(TransferPipeline::new(vec![
            Arc::new(MonitorStage::new()),
            Arc::new(ScaleStage::new(SignalDirection::ToProcessModel, 1.0)),
            Arc::new(ThresholdFilterStage::new(DEFAULT_THRESHOLD)),
        ]));

        Self {
            external_system,
            process_model,
            pipeline,
            signals,
        }
    }

    /// Executive with the standard procedures over this integration
    pub fn executive(&self, config: ExecutiveConfig) -> IntegrationExecutive {
        IntegrationExecutive::new(
            self.process_model.clone(),
            self.external_system.clone(),
            self.pipeline.clone(),
            &self.signals,
            config,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_follow_config() {
        let config = SimulationConfig {
            signals_to_process_model: 2,
            signals_to_external_system: 3,
            ..Default::default()
        };
        let sim = SimulatedIntegration::from_config(&config);
        assert_eq!(SignalMetadata::frame_width(&sim.signals, SignalDirection::ToProcessModel), 2);
        assert_eq!(SignalMetadata::frame_width(&sim.signals, SignalDirection::ToExternalSystem), 3);
        assert_eq!(sim.pipeline.len(), 3);
    }
}
