//! Standard process-model procedure

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::adapter::ProcessModelAdapter;
use crate::domain::{
    CommandParams, CommandResult, RECONNECT_COMMAND_ID, SignalDirection, SignalMetadata, SystemSnapshot, SystemState,
    SystemStatus,
};
use crate::pipeline::TransferPipeline;

use super::{CommandError, CommandTarget, IntegrationContext, ProcessModelCounters, ProcessModelProcedure, Procedure};

/// Moves frames between the process model and the integration context through the pipeline
pub struct StandardProcessModelProcedure {
    adapter: Arc<dyn ProcessModelAdapter>,
    pipeline: Arc<TransferPipeline>,
    context: Arc<IntegrationContext>,

    /// Expected width of frames read from the process model
    frame_width: usize,

    /// Process-model reads are paced at the external system's operating frequency
    read_interval_ms: i64,

    /// Minimum time between connection attempts
    reconnect_interval_ms: i64,

    last_read_ms: Option<i64>,
    last_connect_attempt_ms: Option<i64>,
    sim_time_ms: i64,
    counters: Arc<ProcessModelCounters>,
    snapshot: SystemSnapshot,
}

impl StandardProcessModelProcedure {
    pub fn new(
        adapter: Arc<dyn ProcessModelAdapter>,
        external_system_frequency: f64,
        pipeline: Arc<TransferPipeline>,
        context: Arc<IntegrationContext>,
        signals: &[SignalMetadata],
        reconnect_interval_ms: u64,
    ) -> Self {
        let frame_width = SignalMetadata::frame_width(signals, SignalDirection::ToExternalSystem);
        let read_interval_ms = if external_system_frequency > 0.0 {
            (1000.0 / external_system_frequency).round() as i64
        } else {
            0
        };
        debug!(
            adapter = adapter.type_name(),
            frame_width, read_interval_ms, "StandardProcessModelProcedure::new: called"
        );
        let snapshot = SystemSnapshot::new(adapter.state(), adapter.status());
        Self {
            adapter,
            pipeline,
            context,
            frame_width,
            read_interval_ms,
            reconnect_interval_ms: reconnect_interval_ms as i64,
            last_read_ms: None,
            last_connect_attempt_ms: None,
            sim_time_ms: 0,
            counters: Arc::new(ProcessModelCounters::default()),
            snapshot,
        }
    }

    async fn ensure_connected(&mut self, now_ms: i64) -> bool {
        if self.adapter.is_connected() {
            return true;
        }
        if let Some(last) = self.last_connect_attempt_ms
            && now_ms - last < self.reconnect_interval_ms
        {
            return false;
        }
        self.last_connect_attempt_ms = Some(now_ms);
        match self.adapter.connect().await {
            Ok(()) => {
                info!(adapter = self.adapter.type_name(), "Connected to process model");
                true
            }
            Err(e) => {
                debug!(error = %e, "ensure_connected: connect failed");
                self.snapshot = SystemSnapshot::new(
                    SystemState::NotAvailable,
                    SystemStatus::error(format!("Cannot connect to process model: {e}")),
                );
                false
            }
        }
    }

    async fn read_sim_time(&mut self) {
        match self.adapter.read_sim_time().await {
            Ok(sim_time_ms) => self.sim_time_ms = sim_time_ms,
            Err(e) => {
                debug!(error = %e, "read_sim_time: failed");
                self.counters.add_sim_time_read_failures(1);
            }
        }
    }

    async fn forward_commands(&self) {
        match self.adapter.read_commands().await {
            Ok(commands) => self.context.push_commands(commands),
            Err(e) => {
                debug!(error = %e, "forward_commands: read failed");
                self.counters.add_command_read_failures(1);
            }
        }
    }

    async fn write_data(&self) {
        let (frame, overwritten) = self.context.to_process_model.take();
        self.counters.add_dropped_external_system_frames(overwritten);
        let Some(frame) = frame else {
            return;
        };
        let Some(frame) = self.pipeline.process(SignalDirection::ToProcessModel, frame) else {
            self.counters.add_dropped_external_system_frames(1);
            return;
        };
        if let Err(e) = self.adapter.write_data(&frame).await {
            debug!(error = %e, "write_data: process model write failed");
            self.counters.add_data_write_failures(1);
        }
    }

    async fn read_data(&mut self, now_ms: i64) {
        if let Some(last) = self.last_read_ms
            && now_ms - last < self.read_interval_ms
        {
            return;
        }
        self.last_read_ms = Some(now_ms);
        match self.adapter.read_data().await {
            Ok(Some(mut frame)) if frame.width() == self.frame_width => {
                frame.timestamp_ms = self.sim_time_ms;
                match self.pipeline.process(SignalDirection::ToExternalSystem, frame) {
                    Some(frame) => self.context.to_external_system.put(frame),
                    None => self.counters.add_dropped_process_model_frames(1),
                }
            }
            Ok(Some(frame)) => {
                warn!(
                    expected = self.frame_width,
                    actual = frame.width(),
                    "Discarding process model frame with unexpected width"
                );
                self.counters.add_data_read_failures(1);
            }
            Ok(None) => {}
            Err(e) => {
                debug!(error = %e, "read_data: process model read failed");
                self.counters.add_data_read_failures(1);
            }
        }
    }

    async fn execute_adapter_command(&mut self, id: &str, params: &CommandParams) -> Result<CommandResult, CommandError> {
        if id == RECONNECT_COMMAND_ID {
            self.adapter.disconnect().await?;
            self.last_connect_attempt_ms = None;
            self.adapter.connect().await?;
            info!(adapter = self.adapter.type_name(), "Reconnected to process model");
            return Ok(CommandResult::from([("connected".to_string(), "true".to_string())]));
        }
        if !self.adapter.available_control_commands().iter().any(|c| c.id == id) {
            return Err(CommandError::UnknownCommand { id: id.to_string() });
        }
        Ok(self.adapter.invoke_control_command(id, params).await?)
    }

    fn execute_stage_command(&self, index: usize, id: &str, params: &CommandParams) -> Result<CommandResult, CommandError> {
        let stage = self.pipeline.stage(index).ok_or(CommandError::UnknownStage {
            index,
            len: self.pipeline.len(),
        })?;
        Ok(stage.invoke_control_command(id, params)?)
    }
}

#[async_trait]
impl Procedure for StandardProcessModelProcedure {
    async fn run_once(&mut self, now_ms: i64) -> eyre::Result<()> {
        if !self.ensure_connected(now_ms).await {
            return Ok(());
        }
        self.read_sim_time().await;
        self.forward_commands().await;
        self.write_data().await;
        self.read_data(now_ms).await;
        self.snapshot = SystemSnapshot::new(self.adapter.state(), self.adapter.status());
        Ok(())
    }

    async fn execute_command(
        &mut self,
        target: CommandTarget,
        id: &str,
        params: &CommandParams,
    ) -> Result<CommandResult, CommandError> {
        debug!(%target, %id, "StandardProcessModelProcedure::execute_command: called");
        match target {
            CommandTarget::Adapter => self.execute_adapter_command(id, params).await,
            CommandTarget::Stage(index) => self.execute_stage_command(index, id, params),
        }
    }

    fn snapshot(&self) -> SystemSnapshot {
        self.snapshot.clone()
    }
}

impl ProcessModelProcedure for StandardProcessModelProcedure {
    fn counters(&self) -> Arc<ProcessModelCounters> {
        self.counters.clone()
    }
}
