//! LoopbackExternalSystem - simulated external system producing sine waves

use std::f64::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;
use tracing::{debug, info};

use crate::adapter::{AdapterError, Capabilities, ExternalSystemAdapter, ProgressListener, TransferCommand};
use crate::domain::{
    CommandDescriptor, CommandParams, CommandResult, Frame, ProgressInfo, SystemState, SystemStatus, now_millis,
};

/// Frequency of the generated sine waves in Hz
const WAVE_FREQUENCY_HZ: f64 = 0.2;

/// Amplitude of the noise added to every generated value
const NOISE_AMPLITUDE: f64 = 0.01;

/// Transfer commands kept for `last-written`
const COMMAND_HISTORY: usize = 64;

#[derive(Default)]
struct Inner {
    connected_at: Option<Instant>,
    last_emit: Option<Instant>,
    last_written: Option<Frame>,
    commands: Vec<TransferCommand>,
}

/// External system that generates one phase-shifted sine wave per signal and
/// records everything written to it
pub struct LoopbackExternalSystem {
    frequency: f64,
    width: usize,
    connected: AtomicBool,
    frames_written: AtomicU64,
    inner: Mutex<Inner>,
    listeners: Mutex<Vec<Arc<dyn ProgressListener>>>,
}

impl LoopbackExternalSystem {
    /// Create a system emitting `width` signals at `frequency` Hz
    pub fn new(frequency: f64, width: usize) -> Self {
        debug!(frequency, width, "LoopbackExternalSystem::new: called");
        Self {
            frequency,
            width,
            connected: AtomicBool::new(false),
            frames_written: AtomicU64::new(0),
            inner: Mutex::new(Inner::default()),
            listeners: Mutex::new(vec![]),
        }
    }

    /// Number of frames written by the process model side
    pub fn frames_written(&self) -> u64 {
        self.frames_written.load(Ordering::Relaxed)
    }

    /// Last frame written by the process model side
    pub fn last_written(&self) -> Option<Frame> {
        self.inner().last_written.clone()
    }

    /// Transfer commands received so far, oldest first
    pub fn received_commands(&self) -> Vec<TransferCommand> {
        self.inner().commands.clone()
    }

    fn inner(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, progress: ProgressInfo) {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner).clone();
        for listener in listeners {
            listener.progress_changed(progress.clone());
        }
    }

    fn period(&self) -> Duration {
        if self.frequency > 0.0 {
            Duration::from_secs_f64(1.0 / self.frequency)
        } else {
            Duration::ZERO
        }
    }

    fn require_connected(&self) -> Result<(), AdapterError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(AdapterError::NotConnected {
                counterpart: "loopback".to_string(),
            })
        }
    }
}

#[async_trait]
impl ExternalSystemAdapter for LoopbackExternalSystem {
    fn type_name(&self) -> &str {
        "LoopbackExternalSystem"
    }

    fn state(&self) -> SystemState {
        if self.is_connected() {
            SystemState::Running
        } else {
            SystemState::NotAvailable
        }
    }

    fn status(&self) -> SystemStatus {
        if self.is_connected() {
            SystemStatus::ok(format!("Streaming {} signals at {} Hz", self.width, self.frequency))
        } else {
            SystemStatus::warning("Disconnected")
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
            CommandDescriptor::new("ping", "Replies with the current wall-clock time."),
            CommandDescriptor::new("last-written", "Returns the last frame written to the loopback."),
        ]
    }

    fn add_progress_listener(&self, listener: Arc<dyn ProgressListener>) {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).push(listener);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), AdapterError> {
        debug!("LoopbackExternalSystem::connect: called");
        self.notify(ProgressInfo::new(0, "Connecting", false));
        {
            let mut inner = self.inner();
            inner.connected_at = Some(Instant::now());
            inner.last_emit = None;
        }
        self.connected.store(true, Ordering::SeqCst);
        self.notify(ProgressInfo::new(100, "Connected", false));
        info!("Loopback external system connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        debug!("LoopbackExternalSystem::disconnect: called");
        if self.connected.swap(false, Ordering::SeqCst) {
            self.inner().connected_at = None;
            self.notify(ProgressInfo::new(0, "Disconnected", true));
        }
        Ok(())
    }

    async fn read_data(&self) -> Result<Option<Frame>, AdapterError> {
        self.require_connected()?;
        let period = self.period();
        let mut inner = self.inner();
        let now = Instant::now();
        if let Some(last) = inner.last_emit
            && now.duration_since(last) < period
        {
            return Ok(None);
        }
        inner.last_emit = Some(now);

        let elapsed = inner
            .connected_at
            .map(|at| now.duration_since(at).as_secs_f64())
            .unwrap_or_default();
        let mut rng = rand::rng();
        let values = (0..self.width)
            .map(|i| {
                let phase = TAU * i as f64 / self.width.max(1) as f64;
                (TAU * WAVE_FREQUENCY_HZ * elapsed + phase).sin() + rng.random_range(-NOISE_AMPLITUDE..NOISE_AMPLITUDE)
            })
            .collect();
        Ok(Some(Frame::new(now_millis(), values)))
    }

    async fn write_data(&self, frame: &Frame) -> Result<(), AdapterError> {
        self.require_connected()?;
        self.inner().last_written = Some(frame.clone());
        self.frames_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn write_command(&self, command: &TransferCommand) -> Result<(), AdapterError> {
        self.require_connected()?;
        debug!(id = %command.id, "LoopbackExternalSystem::write_command: called");
        let mut inner = self.inner();
        if inner.commands.len() == COMMAND_HISTORY {
            inner.commands.remove(0);
        }
        inner.commands.push(command.clone());
        Ok(())
    }

    async fn invoke_control_command(&self, id: &str, _params: &CommandParams) -> Result<CommandResult, AdapterError> {
        debug!(%id, "LoopbackExternalSystem::invoke_control_command: called");
        match id {
            "ping" => Ok(CommandResult::from([("pong".to_string(), now_millis().to_string())])),
            "last-written" => {
                let inner = self.inner();
                let mut result = CommandResult::from([(
                    "frames-written".to_string(),
                    self.frames_written().to_string(),
                )]);
                if let Some(frame) = &inner.last_written {
                    result.insert("timestamp-ms".to_string(), frame.timestamp_ms.to_string());
                    result.insert("values".to_string(), join_values(&frame.values));
                }
                Ok(result)
            }
            _ => Err(AdapterError::UnknownCommand { id: id.to_string() }),
        }
    }
}

/// Comma-separated values with fixed precision
pub(crate) fn join_values(values: &[f64]) -> String {
    values.iter().map(|v| format!("{v:.4}")).collect::<Vec<_>>().join(",")
}
