//! Integration tests for the executive driving the simulated integration
//!
//! These tests verify end-to-end behavior with the standard procedures.

use std::sync::Arc;
use std::time::Duration;

use gil::adapter::{ExternalSystemAdapter, ProcessModelAdapter};
use gil::config::{ExecutiveConfig, SimulationConfig};
use gil::domain::{CommandDescriptor, CommandParams, CommandResult, SystemState};
use gil::executive::{DispatchError, IntegrationExecutive, LoopState};
use gil::pipeline::{PipelineStage, StageError, TransferPipeline};
use gil::procedure::CommandError;
use gil::sim::SimulatedIntegration;

fn simulation() -> SimulationConfig {
    SimulationConfig {
        external_system_frequency: 100.0,
        process_model_frequency: 100.0,
        signals_to_process_model: 2,
        signals_to_external_system: 3,
        model_gain: 2.0,
        duration_secs: 0,
    }
}

fn executive_config() -> ExecutiveConfig {
    ExecutiveConfig {
        join_timeout_ms: 2_000,
        loop_yield_ms: 1,
        command_channel_capacity: 8,
        reconnect_interval_ms: 50,
    }
}

async fn started() -> (SimulatedIntegration, IntegrationExecutive) {
    let sim = SimulatedIntegration::from_config(&simulation());
    let executive = sim.executive(executive_config());
    executive.start().await.expect("Failed to start executive");
    (sim, executive)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn params(pairs: &[(&str, &str)]) -> CommandParams {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

// =============================================================================
// Lifecycle and data flow
// =============================================================================

#[tokio::test]
async fn test_frames_flow_both_ways_and_stop_disconnects() {
    let (sim, executive) = started().await;

    wait_until(|| sim.external_system.frames_written() > 2).await;
    let written = sim.external_system.last_written().expect("frame written to external system");
    assert_eq!(written.width(), 3);

    wait_until(|| executive.external_system_state() == SystemState::Running).await;
    wait_until(|| executive.process_model_state() == SystemState::Running).await;

    let observed = executive
        .invoke_pipeline_stage_command(0, "last-frame", CommandParams::new())
        .await
        .expect("monitor stage answers");
    assert!(observed.contains_key("to-process-model"));
    assert!(observed.contains_key("to-external-system"));

    executive.stop().await.expect("Failed to stop executive");
    assert_eq!(executive.external_system_loop_state(), LoopState::Stopped);
    assert_eq!(executive.process_model_loop_state(), LoopState::Stopped);
    assert!(!ExternalSystemAdapter::is_connected(sim.external_system.as_ref()));
    assert!(!ProcessModelAdapter::is_connected(sim.process_model.as_ref()));
}

#[tokio::test]
async fn test_external_system_progress_is_published() {
    let (_sim, executive) = started().await;
    wait_until(|| executive.external_system_progress().percent_complete == 100).await;
    assert_eq!(executive.external_system_progress().message, "Connected");
    executive.stop().await.unwrap();
}

#[tokio::test]
async fn test_restart_reconnects() {
    let (sim, executive) = started().await;
    wait_until(|| ProcessModelAdapter::is_connected(sim.process_model.as_ref())).await;
    executive.stop().await.unwrap();

    executive.start().await.unwrap();
    wait_until(|| ProcessModelAdapter::is_connected(sim.process_model.as_ref())).await;
    executive.stop().await.unwrap();
}

// =============================================================================
// Command dispatch
// =============================================================================

#[tokio::test]
async fn test_stage_commands_change_the_pipeline() {
    let (_sim, executive) = started().await;

    executive
        .invoke_pipeline_stage_command(1, "set-factor", params(&[("factor", "3")]))
        .await
        .unwrap();
    let result = executive
        .invoke_pipeline_stage_command(1, "get-factor", CommandParams::new())
        .await
        .unwrap();
    assert_eq!(result["factor"], "3");

    let err = executive
        .invoke_pipeline_stage_command(7, "get-factor", CommandParams::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Execution(CommandError::UnknownStage { index: 7, len: 3 })
    ));

    executive.stop().await.unwrap();
}

#[tokio::test]
async fn test_threshold_drops_are_counted_for_the_external_system() {
    let (_sim, executive) = started().await;

    executive
        .invoke_pipeline_stage_command(2, "set-limit", params(&[("limit", "-10")]))
        .await
        .unwrap();
    let before = executive.external_system_statistics().dropped_frames;
    wait_until(|| executive.external_system_statistics().dropped_frames > before + 2).await;

    executive.stop().await.unwrap();
}

#[tokio::test]
async fn test_process_model_commands_and_progress() {
    let (_sim, executive) = started().await;
    wait_until(|| executive.process_model_state() == SystemState::Running).await;

    executive
        .invoke_process_model_command("freeze", CommandParams::new())
        .await
        .unwrap();
    wait_until(|| executive.process_model_state() == SystemState::Frozen).await;

    let result = executive
        .invoke_process_model_command("load-state", params(&[("name", "warm"), ("sim-time-ms", "500")]))
        .await
        .unwrap();
    assert_eq!(result["loaded"], "warm");
    let progress = executive.process_model_progress();
    assert_eq!(progress.percent_complete, 100);
    assert_eq!(progress.message, "Loaded warm");

    executive.stop().await.unwrap();
}

#[tokio::test]
async fn test_reconnect_and_unknown_adapter_commands() {
    let (_sim, executive) = started().await;

    let result = executive
        .invoke_external_system_command("reconnect", CommandParams::new())
        .await
        .unwrap();
    assert_eq!(result["connected"], "true");

    let pong = executive
        .invoke_external_system_command("ping", CommandParams::new())
        .await
        .unwrap();
    assert!(pong.contains_key("pong"));

    let err = executive
        .invoke_process_model_command("explode", CommandParams::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Execution(CommandError::UnknownCommand { .. })));

    executive.stop().await.unwrap();
}

#[tokio::test]
async fn test_commands_after_stop_are_cancelled() {
    let (_sim, executive) = started().await;
    executive.stop().await.unwrap();

    let err = executive
        .invoke_process_model_command("run", CommandParams::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::Cancelled { .. }));
}

/// Stage whose "crash" command panics inside the owning loop
struct CrashingStage;

impl PipelineStage for CrashingStage {
    fn type_name(&self) -> &str {
        "Crashing"
    }

    fn available_commands(&self) -> Option<Vec<CommandDescriptor>> {
        Some(vec![CommandDescriptor::new("crash", "Panic while executing")])
    }

    fn invoke_control_command(&self, id: &str, _params: &CommandParams) -> Result<CommandResult, StageError> {
        match id {
            "crash" => panic!("stage crashed on purpose"),
            other => Err(StageError::UnknownCommand { id: other.to_string() }),
        }
    }
}

#[tokio::test]
async fn test_panicking_stage_command_leaves_loop_running() {
    let sim = SimulatedIntegration::from_config(&simulation());
    let pipeline = Arc::new(TransferPipeline::new(vec![Arc::new(CrashingStage)]));
    let executive = IntegrationExecutive::new(
        sim.process_model.clone(),
        sim.external_system.clone(),
        pipeline,
        &sim.signals,
        executive_config(),
    );
    executive.start().await.unwrap();
    wait_until(|| executive.process_model_state() == SystemState::Running).await;

    let err = executive
        .invoke_pipeline_stage_command(0, "crash", CommandParams::new())
        .await
        .unwrap_err();
    match err {
        DispatchError::Execution(CommandError::Panicked(message)) => {
            assert!(message.contains("stage crashed on purpose"), "{message}")
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(executive.process_model_loop_state(), LoopState::Running);

    executive
        .invoke_process_model_command("freeze", CommandParams::new())
        .await
        .unwrap();
    wait_until(|| executive.process_model_state() == SystemState::Frozen).await;
    assert_eq!(executive.process_model_loop_state(), LoopState::Running);

    executive.stop().await.unwrap();
    assert_eq!(executive.process_model_loop_state(), LoopState::Stopped);
}
