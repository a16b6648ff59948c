//! IntegrationExecutive - manages the data and command interchange between the
//! process model and an external system

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::adapter::{AdapterError, ExternalSystemAdapter, ProcessModelAdapter, ProgressListener};
use crate::config::ExecutiveConfig;
use crate::domain::{
    AdapterDescriptor, CommandParams, CommandResult, ProgressInfo, SignalMetadata, StageDescriptor, Statistics,
    SystemSnapshot, SystemState, SystemStatus,
};
use crate::pipeline::{PipelineError, TransferPipeline};
use crate::procedure::{
    CommandTarget, ExternalSystemCounters, ExternalSystemProcedure, IntegrationContext, ProcessModelCounters,
    ProcessModelProcedure, StandardExternalSystemProcedure, StandardProcessModelProcedure,
};

use super::dispatch::{CommandChannel, DispatchError};
use super::runner::{LoopContext, LoopState, Side, run_polling_loop};
use super::snapshot::SnapshotCell;

/// Lifecycle and introspection failures
#[derive(Debug, Error)]
pub enum ExecutiveError {
    #[error("The {side} loop is already running; stop the executive first")]
    AlreadyRunning { side: Side },

    #[error("The {side} loop from a previous run has not exited yet")]
    StillRunning { side: Side },

    #[error(transparent)]
    StageContract(#[from] PipelineError),

    #[error("Failed to disconnect from the {side}: {source}")]
    Disconnect {
        side: Side,
        #[source]
        source: AdapterError,
    },
}

/// Values published for one side, readable from any thread
struct Publication {
    snapshot: SnapshotCell<SystemSnapshot>,
    progress: SnapshotCell<ProgressInfo>,
    loop_state: SnapshotCell<LoopState>,
    commands: CommandChannel,
}

impl Publication {
    fn new(initial: SystemSnapshot) -> Self {
        Self {
            snapshot: SnapshotCell::new(initial),
            progress: SnapshotCell::new(ProgressInfo::default()),
            loop_state: SnapshotCell::new(LoopState::NotStarted),
            commands: CommandChannel::new(),
        }
    }
}

/// A spawned loop task and its stop signal
struct RunningLoop {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

#[derive(Default)]
struct Lifecycle {
    external_system: Option<RunningLoop>,
    process_model: Option<RunningLoop>,
}

/// Runs the external-system and process-model loops and brokers access to them
///
/// Queries never block on the loops: state, status, progress and loop state
/// are read from snapshot cells, statistics from atomic counters. Commands
/// cross into the owning loop through its command channel.
pub struct IntegrationExecutive {
    config: ExecutiveConfig,
    external_system: Arc<dyn ExternalSystemAdapter>,
    process_model: Arc<dyn ProcessModelAdapter>,
    pipeline: Arc<TransferPipeline>,
    es_procedure: Arc<Mutex<Box<dyn ExternalSystemProcedure>>>,
    pm_procedure: Arc<Mutex<Box<dyn ProcessModelProcedure>>>,
    es_counters: Arc<ExternalSystemCounters>,
    pm_counters: Arc<ProcessModelCounters>,
    es: Publication,
    pm: Publication,
    es_descriptor: AdapterDescriptor,
    pm_descriptor: AdapterDescriptor,
    lifecycle: Mutex<Lifecycle>,
}

impl IntegrationExecutive {
    /// Build an executive with the standard procedures
    ///
    /// The external system adapter faces the external system, the process
    /// model adapter faces the process model, and the pipeline transforms the
    /// data flowing between them. Signal metadata sizes the frames.
    pub fn new(
        process_model: Arc<dyn ProcessModelAdapter>,
        external_system: Arc<dyn ExternalSystemAdapter>,
        pipeline: Arc<TransferPipeline>,
        signals: &[SignalMetadata],
        config: ExecutiveConfig,
    ) -> Self {
        debug!(signal_count = signals.len(), "IntegrationExecutive::new: called");
        let context = Arc::new(IntegrationContext::new());
        let pm_procedure = StandardProcessModelProcedure::new(
            process_model.clone(),
            external_system.operating_frequency(),
            pipeline.clone(),
            context.clone(),
            signals,
            config.reconnect_interval_ms,
        );
        let es_procedure =
            StandardExternalSystemProcedure::new(external_system.clone(), context, signals, config.reconnect_interval_ms);
        Self::with_procedures(
            process_model,
            external_system,
            pipeline,
            Box::new(es_procedure),
            Box::new(pm_procedure),
            config,
        )
    }

    /// Build an executive around caller-supplied procedures
    pub fn with_procedures(
        process_model: Arc<dyn ProcessModelAdapter>,
        external_system: Arc<dyn ExternalSystemAdapter>,
        pipeline: Arc<TransferPipeline>,
        es_procedure: Box<dyn ExternalSystemProcedure>,
        pm_procedure: Box<dyn ProcessModelProcedure>,
        config: ExecutiveConfig,
    ) -> Self {
        debug!(
            external_system = external_system.type_name(),
            process_model = process_model.type_name(),
            stage_count = pipeline.len(),
            "IntegrationExecutive::with_procedures: called"
        );
        let es = Publication::new(SystemSnapshot::new(external_system.state(), external_system.status()));
        let pm = Publication::new(SystemSnapshot::new(process_model.state(), process_model.status()));

        if external_system.capabilities().reports_progress {
            debug!("with_procedures: external system reports progress, registering listener");
            let listener: Arc<dyn ProgressListener> = Arc::new(es.progress.clone());
            external_system.add_progress_listener(listener);
        }
        let listener: Arc<dyn ProgressListener> = Arc::new(pm.progress.clone());
        process_model.add_progress_listener(listener);

        let es_descriptor = AdapterDescriptor::with_reconnect(
            external_system.type_name(),
            "external system",
            external_system.available_control_commands(),
        );
        let pm_descriptor = AdapterDescriptor::with_reconnect(
            process_model.type_name(),
            "process model",
            process_model.available_control_commands(),
        );

        Self {
            es_counters: es_procedure.counters(),
            pm_counters: pm_procedure.counters(),
            es_procedure: Arc::new(Mutex::new(es_procedure)),
            pm_procedure: Arc::new(Mutex::new(pm_procedure)),
            config,
            external_system,
            process_model,
            pipeline,
            es,
            pm,
            es_descriptor,
            pm_descriptor,
            lifecycle: Mutex::new(Lifecycle::default()),
        }
    }

    // === Lifecycle ===

    /// Start both loops
    ///
    /// Fails when a loop is still running (call `stop` first) or when a loop
    /// abandoned by an earlier `stop` is still alive. Loops that exited after
    /// a failure may be started again directly.
    pub async fn start(&self) -> Result<(), ExecutiveError> {
        debug!("IntegrationExecutive::start: called");
        let mut guard = self.lifecycle.lock().await;
        let lifecycle = &mut *guard;
        // A faulted loop has already exited and may be restarted without a stop
        for slot in [&mut lifecycle.external_system, &mut lifecycle.process_model] {
            if slot.as_ref().is_some_and(|running| running.join.is_finished()) {
                debug!("start: reaping exited loop");
                slot.take();
            }
        }
        if lifecycle.external_system.is_some() {
            return Err(ExecutiveError::AlreadyRunning {
                side: Side::ExternalSystem,
            });
        }
        if lifecycle.process_model.is_some() {
            return Err(ExecutiveError::AlreadyRunning {
                side: Side::ProcessModel,
            });
        }

        let es_guard = self
            .es_procedure
            .clone()
            .try_lock_owned()
            .map_err(|_| ExecutiveError::StillRunning {
                side: Side::ExternalSystem,
            })?;
        let pm_guard = self
            .pm_procedure
            .clone()
            .try_lock_owned()
            .map_err(|_| ExecutiveError::StillRunning {
                side: Side::ProcessModel,
            })?;

        lifecycle.external_system = Some(self.spawn_external_system_loop(es_guard));
        lifecycle.process_model = Some(self.spawn_process_model_loop(pm_guard));
        info!("Integration executive started");
        Ok(())
    }

    /// Stop both loops and disconnect both adapters
    ///
    /// Waits up to the join timeout for each loop. A loop that does not exit
    /// in time is left running and reported as `LoopState::Abandoned`. Both
    /// adapters are disconnected in every case, including when the executive
    /// was never started; the first disconnect failure is returned.
    pub async fn stop(&self) -> Result<(), ExecutiveError> {
        debug!("IntegrationExecutive::stop: called");
        let mut lifecycle = self.lifecycle.lock().await;
        let es_loop = lifecycle.external_system.take();
        let pm_loop = lifecycle.process_model.take();
        if es_loop.is_none() && pm_loop.is_none() {
            debug!("stop: executive was not running");
        }

        // Signal both loops before waiting on either
        for running in [&es_loop, &pm_loop].into_iter().flatten() {
            running.stop_tx.send_replace(true);
        }
        self.es.commands.close();
        self.pm.commands.close();

        let timeout = Duration::from_millis(self.config.join_timeout_ms);
        if let Some(running) = es_loop {
            join_loop(Side::ExternalSystem, &self.es, running, timeout).await;
        }
        if let Some(running) = pm_loop {
            join_loop(Side::ProcessModel, &self.pm, running, timeout).await;
        }

        let es_result = self.external_system.disconnect().await;
        let pm_result = self.process_model.disconnect().await;
        info!("Integration executive stopped");

        es_result.map_err(|source| ExecutiveError::Disconnect {
            side: Side::ExternalSystem,
            source,
        })?;
        pm_result.map_err(|source| ExecutiveError::Disconnect {
            side: Side::ProcessModel,
            source,
        })?;
        Ok(())
    }

    fn spawn_external_system_loop(&self, guard: OwnedMutexGuard<Box<dyn ExternalSystemProcedure>>) -> RunningLoop {
        let (stop_tx, ctx) = self.loop_context(Side::ExternalSystem, &self.es);
        let es_frequency = self.external_system.operating_frequency();
        let pm_frequency = self.process_model.operating_frequency();
        let join = tokio::spawn(async move {
            debug!("External system loop started");
            info!("ProcessModel operating frequency: {}", pm_frequency);
            info!("ExternalSystem operating frequency: {}", es_frequency);
            run_polling_loop(guard, ctx).await;
        });
        RunningLoop { stop_tx, join }
    }

    fn spawn_process_model_loop(&self, guard: OwnedMutexGuard<Box<dyn ProcessModelProcedure>>) -> RunningLoop {
        let (stop_tx, ctx) = self.loop_context(Side::ProcessModel, &self.pm);
        let join = tokio::spawn(async move {
            debug!("Process model loop started");
            run_polling_loop(guard, ctx).await;
        });
        RunningLoop { stop_tx, join }
    }

    fn loop_context(&self, side: Side, publication: &Publication) -> (watch::Sender<bool>, LoopContext) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let commands = publication.commands.open(self.config.command_channel_capacity);
        publication.loop_state.publish(LoopState::Running);
        let ctx = LoopContext {
            side,
            stop_rx,
            commands,
            snapshot: publication.snapshot.clone(),
            loop_state: publication.loop_state.clone(),
            yield_interval: Duration::from_millis(self.config.loop_yield_ms),
        };
        (stop_tx, ctx)
    }

    // === State, status and progress ===

    pub fn external_system_state(&self) -> SystemState {
        self.es.snapshot.get().state
    }

    pub fn external_system_status(&self) -> SystemStatus {
        self.es.snapshot.get().status
    }

    /// State and status from the same update
    pub fn external_system_snapshot(&self) -> SystemSnapshot {
        self.es.snapshot.get()
    }

    pub fn process_model_state(&self) -> SystemState {
        self.pm.snapshot.get().state
    }

    pub fn process_model_status(&self) -> SystemStatus {
        self.pm.snapshot.get().status
    }

    /// State and status from the same update
    pub fn process_model_snapshot(&self) -> SystemSnapshot {
        self.pm.snapshot.get()
    }

    /// Latest external system progress, or the default when the adapter never reported any
    pub fn external_system_progress(&self) -> ProgressInfo {
        self.es.progress.get()
    }

    /// Latest process model progress, or the default when the adapter never reported any
    pub fn process_model_progress(&self) -> ProgressInfo {
        self.pm.progress.get()
    }

    pub fn external_system_loop_state(&self) -> LoopState {
        self.es.loop_state.get()
    }

    pub fn process_model_loop_state(&self) -> LoopState {
        self.pm.loop_state.get()
    }

    /// Receiver woken on every external system snapshot publish
    pub fn subscribe_external_system(&self) -> watch::Receiver<SystemSnapshot> {
        self.es.snapshot.subscribe()
    }

    /// Receiver woken on every process model snapshot publish
    pub fn subscribe_process_model(&self) -> watch::Receiver<SystemSnapshot> {
        self.pm.snapshot.subscribe()
    }

    // === Statistics ===

    pub fn external_system_statistics(&self) -> Statistics {
        Statistics::new(
            self.pm_counters.dropped_external_system_frames(),
            self.es_counters.command_write_failures(),
            self.es_counters.data_write_failures(),
            self.es_counters.data_read_failures(),
        )
    }

    pub fn process_model_statistics(&self) -> Statistics {
        Statistics::new(
            self.pm_counters.dropped_process_model_frames() + self.es_counters.dropped_process_model_frames(),
            self.pm_counters.command_read_failures() + self.pm_counters.sim_time_read_failures(),
            self.pm_counters.data_write_failures(),
            self.pm_counters.data_read_failures(),
        )
    }

    // === Introspection ===

    /// External system catalog, captured at construction
    pub fn external_system_adapter(&self) -> &AdapterDescriptor {
        &self.es_descriptor
    }

    /// Process model catalog, captured at construction
    pub fn process_model_adapter(&self) -> &AdapterDescriptor {
        &self.pm_descriptor
    }

    /// Catalog of the pipeline stages in pipeline order
    pub fn transfer_pipeline_stages(&self) -> Result<Vec<StageDescriptor>, ExecutiveError> {
        debug!("IntegrationExecutive::transfer_pipeline_stages: called");
        Ok(self.pipeline.describe()?)
    }

    // === Command dispatch ===

    /// Invoke a command on the pipeline stage at `stage_index`
    ///
    /// Waits until the process-model loop has executed the command.
    pub async fn invoke_pipeline_stage_command(
        &self,
        stage_index: usize,
        command_id: &str,
        params: CommandParams,
    ) -> Result<CommandResult, DispatchError> {
        debug!(stage_index, %command_id, "IntegrationExecutive::invoke_pipeline_stage_command: called");
        self.pm
            .commands
            .invoke(CommandTarget::Stage(stage_index), command_id, params)
            .await
    }

    /// Invoke a command on the external system adapter
    ///
    /// Waits until the external-system loop has executed the command.
    pub async fn invoke_external_system_command(
        &self,
        command_id: &str,
        params: CommandParams,
    ) -> Result<CommandResult, DispatchError> {
        debug!(%command_id, "IntegrationExecutive::invoke_external_system_command: called");
        self.es.commands.invoke(CommandTarget::Adapter, command_id, params).await
    }

    /// Invoke a command on the process model adapter
    ///
    /// Waits until the process-model loop has executed the command.
    pub async fn invoke_process_model_command(
        &self,
        command_id: &str,
        params: CommandParams,
    ) -> Result<CommandResult, DispatchError> {
        debug!(%command_id, "IntegrationExecutive::invoke_process_model_command: called");
        self.pm.commands.invoke(CommandTarget::Adapter, command_id, params).await
    }
}

/// Wait for a signalled loop, abandoning it after `timeout`
async fn join_loop(side: Side, publication: &Publication, mut running: RunningLoop, timeout: Duration) {
    debug!(%side, ?timeout, "join_loop: called");
    match tokio::time::timeout(timeout, &mut running.join).await {
        Ok(Ok(())) => debug!(%side, "join_loop: loop exited"),
        Ok(Err(e)) => {
            error!(%side, error = %e, "Loop task ended abnormally");
            publication.loop_state.publish(LoopState::Faulted { error: e.to_string() });
        }
        Err(_) => {
            warn!(%side, ?timeout, "Loop did not stop in time, leaving it running");
            publication.loop_state.publish_if(|state| {
                if state.is_running() {
                    *state = LoopState::Abandoned;
                    true
                } else {
                    false
                }
            });
        }
    }
}

impl Drop for IntegrationExecutive {
    fn drop(&mut self) {
        let lifecycle = self.lifecycle.get_mut();
        let loops: Vec<RunningLoop> = [lifecycle.external_system.take(), lifecycle.process_model.take()]
            .into_iter()
            .flatten()
            .collect();
        if loops.is_empty() {
            return;
        }

        warn!("IntegrationExecutive dropped while running, signalling loops to stop");
        for running in &loops {
            running.stop_tx.send_replace(true);
        }

        // Disconnect on the runtime if there is one; the loops exit on their own
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let external_system = self.external_system.clone();
                let process_model = self.process_model.clone();
                handle.spawn(async move {
                    if let Err(e) = external_system.disconnect().await {
                        warn!(error = %e, "Failed to disconnect external system on drop");
                    }
                    if let Err(e) = process_model.disconnect().await {
                        warn!(error = %e, "Failed to disconnect process model on drop");
                    }
                });
            }
            Err(_) => warn!("No runtime available, adapters were not disconnected"),
        }
    }
}
