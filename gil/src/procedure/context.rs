//! IntegrationContext - handoff between the two procedures
//!
//! The two loops run at their own cadence. Frames are handed over through a
//! latest-value slot per direction: a frame that is replaced before the other
//! side took it counts as dropped. Transfer commands read from the process
//! model queue up here until the external-system procedure writes them.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::adapter::TransferCommand;
use crate::domain::Frame;

/// Most transfer commands kept waiting for the external system
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct SlotInner {
    frame: Option<Frame>,
    overwritten: u64,
}

/// Single-frame handoff slot that counts frames replaced before being taken
#[derive(Debug, Default)]
pub struct FrameSlot {
    inner: Mutex<SlotInner>,
}

impl FrameSlot {
    /// Store the newest frame, replacing one nobody took yet
    pub fn put(&self, frame: Frame) {
        let mut inner = lock(&self.inner);
        if inner.frame.replace(frame).is_some() {
            inner.overwritten += 1;
        }
    }

    /// Take the newest frame and the number of frames replaced since the last take
    pub fn take(&self) -> (Option<Frame>, u64) {
        let mut inner = lock(&self.inner);
        let overwritten = std::mem::take(&mut inner.overwritten);
        (inner.frame.take(), overwritten)
    }
}

/// Shared coordination state passed to both procedures
#[derive(Debug, Default)]
pub struct IntegrationContext {
    /// Frames read from the external system, bound for the process model
    pub to_process_model: FrameSlot,

    /// Frames read from the process model, bound for the external system
    pub to_external_system: FrameSlot,

    commands: Mutex<VecDeque<TransferCommand>>,
}

impl IntegrationContext {
    pub fn new() -> Self {
        debug!("IntegrationContext::new: called");
        Self::default()
    }

    /// Queue commands for the external system, dropping the oldest on overflow
    pub fn push_commands(&self, commands: Vec<TransferCommand>) {
        if commands.is_empty() {
            return;
        }
        let mut queue = lock(&self.commands);
        for command in commands {
            if queue.len() == COMMAND_QUEUE_CAPACITY
                && let Some(dropped) = queue.pop_front()
            {
                warn!(command = %dropped.id, "Transfer command queue full, dropping oldest command");
            }
            queue.push_back(command);
        }
    }

    pub fn drain_commands(&self) -> Vec<TransferCommand> {
        lock(&self.commands).drain(..).collect()
    }
}
