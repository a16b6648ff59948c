//! Property tests for adapter and pipeline stage catalogs

use std::sync::Arc;

use proptest::prelude::*;

use gil::config::{ExecutiveConfig, SimulationConfig};
use gil::domain::{AdapterDescriptor, CommandDescriptor, RECONNECT_COMMAND_ID, SignalDirection};
use gil::pipeline::{PipelineStage, TransferPipeline};
use gil::sim::{MonitorStage, ScaleStage, SimulatedIntegration, ThresholdFilterStage};

fn stage(kind: u8) -> Arc<dyn PipelineStage> {
    match kind % 3 {
        0 => Arc::new(MonitorStage::new()),
        1 => Arc::new(ScaleStage::new(SignalDirection::ToProcessModel, 1.0)),
        _ => Arc::new(ThresholdFilterStage::new(1.0)),
    }
}

proptest! {
    #[test]
    fn reconnect_is_always_first(ids in proptest::collection::vec("[a-z][a-z-]{0,11}", 0..8)) {
        let commands: Vec<CommandDescriptor> = ids.iter().map(|id| CommandDescriptor::new(id.clone(), "")).collect();
        let descriptor = AdapterDescriptor::with_reconnect("Adapter", "external system", commands);

        prop_assert_eq!(descriptor.commands.len(), ids.len() + 1);
        prop_assert_eq!(descriptor.commands[0].id.as_str(), RECONNECT_COMMAND_ID);
        let rest: Vec<&str> = descriptor.command_ids().skip(1).collect();
        let expected: Vec<&str> = ids.iter().map(String::as_str).collect();
        prop_assert_eq!(rest, expected);
    }

    #[test]
    fn stage_catalog_follows_pipeline_order(kinds in proptest::collection::vec(any::<u8>(), 0..10)) {
        let stages: Vec<Arc<dyn PipelineStage>> = kinds.iter().map(|k| stage(*k)).collect();
        let names: Vec<String> = stages.iter().map(|s| s.type_name().to_string()).collect();

        let sim = SimulatedIntegration::from_config(&SimulationConfig::default());
        let executive = gil::executive::IntegrationExecutive::new(
            sim.process_model.clone(),
            sim.external_system.clone(),
            Arc::new(TransferPipeline::new(stages)),
            &sim.signals,
            ExecutiveConfig::default(),
        );

        let catalog = executive.transfer_pipeline_stages().unwrap();
        prop_assert_eq!(catalog.len(), kinds.len());
        for (i, descriptor) in catalog.iter().enumerate() {
            prop_assert_eq!(descriptor.index, i);
            prop_assert_eq!(&descriptor.type_name, &names[i]);
            prop_assert!(!descriptor.commands.is_empty());
        }
    }
}

#[test]
fn simulated_adapters_describe_their_commands() {
    let sim = SimulatedIntegration::from_config(&SimulationConfig::default());
    let executive = sim.executive(ExecutiveConfig::default());

    let es: Vec<&str> = executive.external_system_adapter().command_ids().collect();
    assert_eq!(es, vec![RECONNECT_COMMAND_ID, "ping", "last-written"]);

    let pm: Vec<&str> = executive.process_model_adapter().command_ids().collect();
    assert_eq!(pm, vec![RECONNECT_COMMAND_ID, "freeze", "run", "load-state"]);
    assert_eq!(executive.process_model_adapter().type_name, "SimulatedProcessModel");
}
