//! Standard external-system procedure

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::adapter::ExternalSystemAdapter;
use crate::domain::{
    CommandParams, CommandResult, RECONNECT_COMMAND_ID, SignalDirection, SignalMetadata, SystemSnapshot, SystemState,
    SystemStatus,
};

use super::{
    CommandError, CommandTarget, ExternalSystemCounters, ExternalSystemProcedure, IntegrationContext, Procedure,
};

/// Moves frames and commands between the external system and the integration context
pub struct StandardExternalSystemProcedure {
    adapter: Arc<dyn ExternalSystemAdapter>,
    context: Arc<IntegrationContext>,

    /// Expected width of frames read from the external system
    frame_width: usize,

    /// Minimum time between connection attempts
    reconnect_interval_ms: i64,

    last_connect_attempt_ms: Option<i64>,
    counters: Arc<ExternalSystemCounters>,
    snapshot: SystemSnapshot,
}

impl StandardExternalSystemProcedure {
    pub fn new(
        adapter: Arc<dyn ExternalSystemAdapter>,
        context: Arc<IntegrationContext>,
        signals: &[SignalMetadata],
        reconnect_interval_ms: u64,
    ) -> Self {
        let frame_width = SignalMetadata::frame_width(signals, SignalDirection::ToProcessModel);
        debug!(adapter = adapter.type_name(), frame_width, "StandardExternalSystemProcedure::new: called");
        let snapshot = SystemSnapshot::new(adapter.state(), adapter.status());
        Self {
            adapter,
            context,
            frame_width,
            reconnect_interval_ms: reconnect_interval_ms as i64,
            last_connect_attempt_ms: None,
            counters: Arc::new(ExternalSystemCounters::default()),
            snapshot,
        }
    }

    /// Connect when disconnected, at most once per reconnect interval
    ///
    /// Returns true when the adapter is connected afterwards.
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
                info!(adapter = self.adapter.type_name(), "Connected to external system");
                true
            }
            Err(e) => {
                debug!(error = %e, "ensure_connected: connect failed");
                self.snapshot = SystemSnapshot::new(
                    SystemState::NotAvailable,
                    SystemStatus::error(format!("Cannot connect to external system: {e}")),
                );
                false
            }
        }
    }

    async fn write_commands(&self) {
        for command in self.context.drain_commands() {
            if let Err(e) = self.adapter.write_command(&command).await {
                warn!(command = %command.id, error = %e, "Failed to write command to external system");
                self.counters.add_command_write_failures(1);
            }
        }
    }

    async fn write_data(&self) {
        let (frame, overwritten) = self.context.to_external_system.take();
        self.counters.add_dropped_process_model_frames(overwritten);
        if let Some(frame) = frame
            && let Err(e) = self.adapter.write_data(&frame).await
        {
            debug!(error = %e, "write_data: external system write failed");
            self.counters.add_data_write_failures(1);
        }
    }

    async fn read_data(&self) {
        match self.adapter.read_data().await {
            Ok(Some(frame)) if frame.width() == self.frame_width => self.context.to_process_model.put(frame),
            Ok(Some(frame)) => {
                warn!(
                    expected = self.frame_width,
                    actual = frame.width(),
                    "Discarding external system frame with unexpected width"
                );
                self.counters.add_data_read_failures(1);
            }
            Ok(None) => {}
            Err(e) => {
                debug!(error = %e, "read_data: external system read failed");
                self.counters.add_data_read_failures(1);
            }
        }
    }
}

#[async_trait]
impl Procedure for StandardExternalSystemProcedure {
    async fn run_once(&mut self, now_ms: i64) -> eyre::Result<()> {
        if !self.ensure_connected(now_ms).await {
            return Ok(());
        }
        self.write_commands().await;
        self.write_data().await;
        self.read_data().await;
        self.snapshot = SystemSnapshot::new(self.adapter.state(), self.adapter.status());
        Ok(())
    }

    async fn execute_command(
        &mut self,
        target: CommandTarget,
        id: &str,
        params: &CommandParams,
    ) -> Result<CommandResult, CommandError> {
        debug!(%target, %id, "StandardExternalSystemProcedure::execute_command: called");
        if target != CommandTarget::Adapter {
            return Err(CommandError::UnsupportedTarget { target });
        }
        if id == RECONNECT_COMMAND_ID {
            self.adapter.disconnect().await?;
            self.last_connect_attempt_ms = None;
            self.adapter.connect().await?;
            info!(adapter = self.adapter.type_name(), "Reconnected to external system");
            return Ok(CommandResult::from([("connected".to_string(), "true".to_string())]));
        }
        if !self.adapter.available_control_commands().iter().any(|c| c.id == id) {
            return Err(CommandError::UnknownCommand { id: id.to_string() });
        }
        Ok(self.adapter.invoke_control_command(id, params).await?)
    }

    fn snapshot(&self) -> SystemSnapshot {
        self.snapshot.clone()
    }
}

impl ExternalSystemProcedure for StandardExternalSystemProcedure {
    fn counters(&self) -> Arc<ExternalSystemCounters> {
        self.counters.clone()
    }
}
