//! SimulatedProcessModel - gain model with its own simulation clock

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::adapter::{AdapterError, Capabilities, ProcessModelAdapter, ProgressListener, TransferCommand};
use crate::domain::{CommandDescriptor, CommandParams, CommandResult, Frame, ProgressInfo, SystemState, SystemStatus};

/// Simulated time between two heartbeat transfer commands
const HEARTBEAT_INTERVAL_MS: i64 = 5_000;

/// Steps reported while loading a state
const LOAD_STEPS: u32 = 4;

struct Inner {
    state: SystemState,
    sim_time_ms: i64,
    last_advance: Option<Instant>,
    next_heartbeat_ms: i64,
    inputs: Vec<f64>,
    loaded_state: Option<String>,
}

/// Process model that answers every input with `gain * input`
///
/// Simulation time follows wall-clock time while running and stands still
/// while frozen. Every five simulated seconds it issues a `heartbeat`
/// transfer command for the external system.
pub struct SimulatedProcessModel {
    frequency: f64,
    gain: f64,
    width: usize,
    connected: AtomicBool,
    inner: Mutex<Inner>,
    listeners: Mutex<Vec<Arc<dyn ProgressListener>>>,
}

impl SimulatedProcessModel {
    /// Create a model producing `width` outputs
    pub fn new(frequency: f64, gain: f64, width: usize) -> Self {
        debug!(frequency, gain, width, "SimulatedProcessModel::new: called");
        Self {
            frequency,
            gain,
            width,
            connected: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                state: SystemState::Idle,
                sim_time_ms: 0,
                last_advance: None,
                next_heartbeat_ms: HEARTBEAT_INTERVAL_MS,
                inputs: vec![],
                loaded_state: None,
            }),
            listeners: Mutex::new(vec![]),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, progress: ProgressInfo) {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner).clone();
        for listener in listeners {
            listener.progress_changed(progress.clone());
        }
    }

    fn require_connected(&self) -> Result<(), AdapterError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(AdapterError::NotConnected {
                counterpart: "simulated process model".to_string(),
            })
        }
    }

    /// Move simulation time forward by the wall-clock time since the last call
    fn advance(inner: &mut Inner) {
        let now = Instant::now();
        if inner.state == SystemState::Running
            && let Some(last) = inner.last_advance
        {
            inner.sim_time_ms += now.duration_since(last).as_millis() as i64;
        }
        inner.last_advance = Some(now);
    }

    fn set_state(&self, state: SystemState) -> CommandResult {
        let mut inner = self.inner();
        Self::advance(&mut inner);
        inner.state = state;
        info!(%state, "Simulated process model state changed");
        CommandResult::from([
            ("state".to_string(), state.to_string()),
            ("sim-time-ms".to_string(), inner.sim_time_ms.to_string()),
        ])
    }

    async fn load_state(&self, params: &CommandParams) -> Result<CommandResult, AdapterError> {
        let name = params.get("name").ok_or_else(|| AdapterError::Command {
            id: "load-state".to_string(),
            reason: "missing 'name' parameter".to_string(),
        })?;
        let sim_time_ms = match params.get("sim-time-ms") {
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| AdapterError::Command {
                id: "load-state".to_string(),
                reason: format!("cannot parse sim-time-ms '{raw}'"),
            })?,
            None => 0,
        };

        for step in 0..LOAD_STEPS {
            self.notify(ProgressInfo::new(step * 100 / LOAD_STEPS, format!("Loading {name}"), false));
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        {
            let mut inner = self.inner();
            inner.sim_time_ms = sim_time_ms;
            inner.last_advance = Some(Instant::now());
            inner.next_heartbeat_ms = sim_time_ms + HEARTBEAT_INTERVAL_MS;
            inner.loaded_state = Some(name.clone());
        }
        self.notify(ProgressInfo::new(100, format!("Loaded {name}"), false));
        info!(%name, sim_time_ms, "Simulated process model state loaded");
        Ok(CommandResult::from([
            ("loaded".to_string(), name.clone()),
            ("sim-time-ms".to_string(), sim_time_ms.to_string()),
        ]))
    }
}

#[async_trait]
impl ProcessModelAdapter for SimulatedProcessModel {
    fn type_name(&self) -> &str {
        "SimulatedProcessModel"
    }

    fn state(&self) -> SystemState {
        if self.is_connected() {
            self.inner().state
        } else {
            SystemState::NotAvailable
        }
    }

    fn status(&self) -> SystemStatus {
        if !self.is_connected() {
            return SystemStatus::warning("Disconnected");
        }
        let inner = self.inner();
        match &inner.loaded_state {
            Some(name) => SystemStatus::ok(format!("{} at {} ms ({name})", inner.state, inner.sim_time_ms)),
            None => SystemStatus::ok(format!("{} at {} ms", inner.state, inner.sim_time_ms)),
        }
    }

    fn operating_frequency(&self) -> f64 {
        self.frequency
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { reports_progress: true }
    }

    fn available_control_commands(&self) -> Vec<CommandDescriptor> {
        vec![
            CommandDescriptor::new("freeze", "Stops the simulation clock."),
            CommandDescriptor::new("run", "Starts the simulation clock."),
            CommandDescriptor::new(
                "load-state",
                "Loads the named state ('name', optional 'sim-time-ms') and reports progress.",
            ),
        ]
    }

    fn add_progress_listener(&self, listener: Arc<dyn ProgressListener>) {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).push(listener);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        debug!("SimulatedProcessModel::connect: called");
        {
            let mut inner = self.inner();
            inner.state = SystemState::Running;
            inner.last_advance = Some(Instant::now());
        }
        self.connected.store(true, Ordering::SeqCst);
        info!("Simulated process model connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        debug!("SimulatedProcessModel::disconnect: called");
        if self.connected.swap(false, Ordering::SeqCst) {
            self.inner().state = SystemState::Idle;
        }
        Ok(())
    }

    async fn read_sim_time(&self) -> Result<i64, AdapterError> {
        self.require_connected()?;
        let mut inner = self.inner();
        Self::advance(&mut inner);
        Ok(inner.sim_time_ms)
    }

    async fn read_commands(&self) -> Result<Vec<TransferCommand>, AdapterError> {
        self.require_connected()?;
        let mut inner = self.inner();
        if inner.sim_time_ms < inner.next_heartbeat_ms {
            return Ok(vec![]);
        }
        inner.next_heartbeat_ms = inner.sim_time_ms + HEARTBEAT_INTERVAL_MS;
        let mut heartbeat = TransferCommand::new("heartbeat");
        heartbeat
            .params
            .insert("sim-time-ms".to_string(), inner.sim_time_ms.to_string());
        Ok(vec![heartbeat])
    }

    async fn read_data(&self) -> Result<Option<Frame>, AdapterError> {
        self.require_connected()?;
        let inner = self.inner();
        let values = (0..self.width)
            .map(|i| match inner.inputs.len() {
                0 => 0.0,
                len => self.gain * inner.inputs[i % len],
            })
            .collect();
        Ok(Some(Frame::new(inner.sim_time_ms, values)))
    }

    async fn write_data(&self, frame: &Frame) -> Result<(), AdapterError> {
        self.require_connected()?;
        self.inner().inputs = frame.values.clone();
        Ok(())
    }

    async fn invoke_control_command(&self, id: &str, params: &CommandParams) -> Result<CommandResult, AdapterError> {
        debug!(%id, "SimulatedProcessModel::invoke_control_command: called");
        self.require_connected()?;
        match id {
            "freeze" => Ok(self.set_state(SystemState::Frozen)),
            "run" => Ok(self.set_state(SystemState::Running)),
            "load-state" => self.load_state(params).await,
            _ => Err(AdapterError::UnknownCommand { id: id.to_string() }),
        }
    }
}
