//! Procedure contracts consumed by the executive
//!
//! A procedure performs one read/transform/write iteration per `run_once`
//! call and executes control commands. The executive owns one loop task per
//! procedure; both `run_once` and `execute_command` are only ever called from
//! that task, so a command never interleaves with an in-flight iteration.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{CommandParams, CommandResult, SystemSnapshot, SystemState, SystemStatus};

use super::{CommandError, CommandTarget, ExternalSystemCounters, ProcessModelCounters};

/// Behaviour common to both procedures
#[async_trait]
pub trait Procedure: Send {
    /// Perform one transfer iteration; an `Err` is fatal for the owning loop
    async fn run_once(&mut self, now_ms: i64) -> eyre::Result<()>;

    /// Execute a control command between iterations
    async fn execute_command(
        &mut self,
        target: CommandTarget,
        id: &str,
        params: &CommandParams,
    ) -> Result<CommandResult, CommandError>;

    /// State and status computed by the latest iteration
    fn snapshot(&self) -> SystemSnapshot;
}

/// Procedure driving the external-system side
pub trait ExternalSystemProcedure: Procedure {
    fn external_system_state(&self) -> SystemState {
        self.snapshot().state
    }

    fn external_system_status(&self) -> SystemStatus {
        self.snapshot().status
    }

    /// Live counters, shared with statistics readers
    fn counters(&self) -> Arc<ExternalSystemCounters>;
}

/// Procedure driving the process-model side
pub trait ProcessModelProcedure: Procedure {
    fn process_model_state(&self) -> SystemState {
        self.snapshot().state
    }

    fn process_model_status(&self) -> SystemStatus {
        self.snapshot().status
    }

    /// Live counters, shared with statistics readers
    fn counters(&self) -> Arc<ProcessModelCounters>;
}

#[cfg(test)]
pub mod mock {
    //! Procedure doubles driven by the test through shared handles

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Duration;

    use super::*;

    /// Knobs a test flips while the procedure runs inside its loop
    #[derive(Default)]
    pub struct ScriptedControl {
        pub iterations: AtomicU64,
        pub fail_next: AtomicBool,
        pub panic_next: AtomicBool,
        pub block_ms: AtomicU64,
        pub snapshot: Mutex<SystemSnapshot>,
        pub last_now_ms: AtomicU64,
    }

    /// Procedure double usable for either side
    pub struct ScriptedProcedure {
        pub control: Arc<ScriptedControl>,
        pub es_counters: Arc<ExternalSystemCounters>,
        pub pm_counters: Arc<ProcessModelCounters>,
    }

    impl ScriptedProcedure {
        pub fn new() -> (Self, Arc<ScriptedControl>) {
            let control = Arc::new(ScriptedControl::default());
            (
                Self {
                    control: control.clone(),
                    es_counters: Arc::new(ExternalSystemCounters::default()),
                    pm_counters: Arc::new(ProcessModelCounters::default()),
                },
                control,
            )
        }
    }

    #[async_trait]
    impl Procedure for ScriptedProcedure {
        async fn run_once(&mut self, now_ms: i64) -> eyre::Result<()> {
            self.control.last_now_ms.store(now_ms as u64, Ordering::SeqCst);
            let block_ms = self.control.block_ms.load(Ordering::SeqCst);
            if block_ms > 0 {
                tokio::time::sleep(Duration::from_millis(block_ms)).await;
            }
            if self.control.panic_next.swap(false, Ordering::SeqCst) {
                panic!("scripted panic");
            }
            if self.control.fail_next.swap(false, Ordering::SeqCst) {
                // A failing iteration may already have touched its state; the loop must not publish it
                *self.control.snapshot.lock().unwrap() =
                    SystemSnapshot::new(SystemState::Error, SystemStatus::error("failed iteration"));
                return Err(eyre::eyre!("scripted failure"));
            }
            self.control.iterations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn execute_command(
            &mut self,
            target: CommandTarget,
            id: &str,
            params: &CommandParams,
        ) -> Result<CommandResult, CommandError> {
            match (target, id) {
                (CommandTarget::Stage(index), _) if index > 1 => Err(CommandError::UnknownStage { index, len: 2 }),
                (_, "echo") => Ok(params.clone()),
                (_, "panic") => panic!("scripted command panic"),
                (_, "iterations") => Ok(CommandResult::from([(
                    "iterations".to_string(),
                    self.control.iterations.load(Ordering::SeqCst).to_string(),
                )])),
                _ => Err(CommandError::UnknownCommand { id: id.to_string() }),
            }
        }

        fn snapshot(&self) -> SystemSnapshot {
            self.control.snapshot.lock().unwrap().clone()
        }
    }

    impl ExternalSystemProcedure for ScriptedProcedure {
        fn counters(&self) -> Arc<ExternalSystemCounters> {
            self.es_counters.clone()
        }
    }

    impl ProcessModelProcedure for ScriptedProcedure {
        fn counters(&self) -> Arc<ProcessModelCounters> {
            self.pm_counters.clone()
        }
    }
}
