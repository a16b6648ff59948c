//! Polling loop shared by both sides
//!
//! Each loop repeatedly services queued commands, calls `run_once`, publishes
//! the fresh snapshot and yields briefly. Any failure inside an iteration ends
//! that loop only; the last published snapshot stays as it was.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{OwnedMutexGuard, mpsc, watch};
use tracing::{debug, error, info};

use crate::domain::{SystemSnapshot, now_millis};
use crate::procedure::Procedure;

use super::dispatch::{CommandRequest, cancel_pending, service_commands};
use super::snapshot::SnapshotCell;

/// Which side a loop drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    ExternalSystem,
    ProcessModel,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExternalSystem => write!(f, "external system"),
            Self::ProcessModel => write!(f, "process model"),
        }
    }
}

/// Lifecycle of one polling loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum LoopState {
    /// `start` was never called
    #[default]
    NotStarted,
    /// Iterating
    Running,
    /// Exited after a stop request
    Stopped,
    /// Exited because an iteration failed
    Faulted { error: String },
    /// Did not exit within the join timeout and was left running
    Abandoned,
}

impl LoopState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Faulted { error } => write!(f, "faulted: {error}"),
            Self::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Everything a loop task needs besides its procedure
pub(crate) struct LoopContext {
    pub side: Side,
    pub stop_rx: watch::Receiver<bool>,
    pub commands: mpsc::Receiver<CommandRequest>,
    pub snapshot: SnapshotCell<SystemSnapshot>,
    pub loop_state: SnapshotCell<LoopState>,
    pub yield_interval: Duration,
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Drive a procedure until stopped or until an iteration fails
///
/// Holds the procedure's lock for its whole lifetime, so a second loop can
/// never run the same procedure.
pub(crate) async fn run_polling_loop<P>(mut procedure: OwnedMutexGuard<Box<P>>, mut ctx: LoopContext)
where
    P: Procedure + ?Sized,
{
    let side = ctx.side;
    debug!(%side, "run_polling_loop: started");

    let outcome: Result<(), String> = loop {
        if *ctx.stop_rx.borrow() {
            break Ok(());
        }

        let iteration = AssertUnwindSafe(async {
            service_commands(&mut **procedure, &mut ctx.commands).await;
            procedure.run_once(now_millis()).await
        })
        .catch_unwind()
        .await;

        match iteration {
            Ok(Ok(())) => ctx.snapshot.publish(procedure.snapshot()),
            Ok(Err(e)) => break Err(format!("{e:#}")),
            Err(payload) => break Err(panic_message(payload)),
        }

        tokio::select! {
            _ = tokio::time::sleep(ctx.yield_interval) => {}
            changed = ctx.stop_rx.changed() => {
                if changed.is_err() {
                    debug!(%side, "run_polling_loop: stop sender dropped");
                    break Ok(());
                }
            }
        }
    };

    let cancelled = cancel_pending(&mut ctx.commands);
    if cancelled > 0 {
        debug!(%side, cancelled, "run_polling_loop: cancelled pending commands");
    }

    match outcome {
        Ok(()) => {
            ctx.loop_state.publish(LoopState::Stopped);
            debug!(%side, "run_polling_loop: stopped");
            info!("{} loop stopped", side);
        }
        Err(error) => {
            error!(%side, %error, "Unexpected failure in {} loop", side);
            ctx.loop_state.publish(LoopState::Faulted { error });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use tokio::sync::Mutex;

    use super::*;
    use crate::domain::{SystemState, SystemStatus};
    use crate::procedure::mock::{ScriptedControl, ScriptedProcedure};

    struct Harness {
        stop_tx: watch::Sender<bool>,
        snapshot: SnapshotCell<SystemSnapshot>,
        loop_state: SnapshotCell<LoopState>,
        control: Arc<ScriptedControl>,
        handle: tokio::task::JoinHandle<()>,
        _commands_tx: mpsc::Sender<CommandRequest>,
    }

    async fn spawn_loop() -> Harness {
        let (procedure, control) = ScriptedProcedure::new();
        let procedure: Arc<Mutex<Box<ScriptedProcedure>>> = Arc::new(Mutex::new(Box::new(procedure)));
        let guard = procedure.lock_owned().await;
        let (stop_tx, stop_rx) = watch::channel(false);
        let (commands_tx, commands) = mpsc::channel(4);
        let snapshot = SnapshotCell::new(SystemSnapshot::default());
        let loop_state = SnapshotCell::new(LoopState::Running);
        let ctx = LoopContext {
            side: Side::ExternalSystem,
            stop_rx,
            commands,
            snapshot: snapshot.clone(),
            loop_state: loop_state.clone(),
            yield_interval: Duration::from_millis(1),
        };
        let handle = tokio::spawn(run_polling_loop(guard, ctx));
        Harness {
            stop_tx,
            snapshot,
            loop_state,
            control,
            handle,
            _commands_tx: commands_tx,
        }
    }

    async fn wait_for_iterations(control: &ScriptedControl, count: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while control.iterations.load(Ordering::SeqCst) < count {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("loop did not iterate");
    }

    #[tokio::test]
    async fn test_loop_publishes_snapshot_and_stops() {
        let harness = spawn_loop().await;
        *harness.control.snapshot.lock().unwrap() =
            SystemSnapshot::new(SystemState::Running, SystemStatus::ok("all good"));
        wait_for_iterations(&harness.control, 3).await;

        assert_eq!(harness.snapshot.get().state, SystemState::Running);
        assert!(harness.control.last_now_ms.load(Ordering::SeqCst) > 0);

        harness.stop_tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(5), harness.handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(harness.loop_state.get(), LoopState::Stopped);
    }

    #[tokio::test]
    async fn test_failure_faults_loop_and_freezes_snapshot() {
        let harness = spawn_loop().await;
        *harness.control.snapshot.lock().unwrap() = SystemSnapshot::new(SystemState::Running, SystemStatus::ok("ok"));
        wait_for_iterations(&harness.control, 1).await;

        harness.control.fail_next.store(true, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(5), harness.handle)
            .await
            .unwrap()
            .unwrap();

        match harness.loop_state.get() {
            LoopState::Faulted { error } => assert!(error.contains("scripted failure")),
            other => panic!("unexpected loop state {other:?}"),
        }
        assert_eq!(harness.snapshot.get().state, SystemState::Running);
    }

    #[tokio::test]
    async fn test_panic_faults_loop() {
        let harness = spawn_loop().await;
        harness.control.panic_next.store(true, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(5), harness.handle)
            .await
            .unwrap()
            .unwrap();

        match harness.loop_state.get() {
            LoopState::Faulted { error } => assert!(error.contains("scripted panic")),
            other => panic!("unexpected loop state {other:?}"),
        }
    }

    #[test]
    fn test_loop_state_display() {
        assert_eq!(LoopState::NotStarted.to_string(), "not started");
        assert_eq!(
            LoopState::Faulted {
                error: "boom".to_string()
            }
            .to_string(),
            "faulted: boom"
        );
        assert!(LoopState::Running.is_running());
        assert!(!LoopState::Abandoned.is_running());
    }
}
