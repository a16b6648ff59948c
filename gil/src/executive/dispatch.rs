//! Command dispatch into a running loop
//!
//! Callers send a request over the loop's channel and wait on a oneshot for
//! the result. The loop executes queued requests between two iterations.
//! When the loop exits it closes its receiver and drops whatever is still
//! queued, which the waiting callers observe as a cancellation.

use std::panic::AssertUnwindSafe;
use std::sync::{PoisonError, RwLock};

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{CommandParams, CommandResult};
use crate::procedure::{CommandError, CommandTarget, Procedure};

use super::runner::panic_message;

/// How a dispatched command can fail, as seen by the caller
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The wait for a result ended without one
    #[error("Command cancelled: {reason}")]
    Cancelled { reason: String },

    /// The adapter or stage failed while executing the command
    #[error("Command execution failed: {0}")]
    Execution(#[from] CommandError),
}

impl DispatchError {
    fn cancelled(reason: &str) -> Self {
        Self::Cancelled {
            reason: reason.to_string(),
        }
    }
}

/// One queued control command with its reply channel
#[derive(Debug)]
pub struct CommandRequest {
    pub request_id: Uuid,
    pub target: CommandTarget,
    pub id: String,
    pub params: CommandParams,
    pub reply: oneshot::Sender<Result<CommandResult, CommandError>>,
}

/// Caller side of a loop's command channel
///
/// Holds the sender only while the loop runs; the loop owns the receiver.
#[derive(Debug, Default)]
pub struct CommandChannel {
    tx: RwLock<Option<mpsc::Sender<CommandRequest>>>,
}

impl CommandChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh channel for a starting loop and return its receiver
    pub fn open(&self, capacity: usize) -> mpsc::Receiver<CommandRequest> {
        debug!(capacity, "CommandChannel::open: called");
        let (tx, rx) = mpsc::channel(capacity.max(1));
        *self.tx.write().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    /// Stop accepting new requests
    pub fn close(&self) {
        debug!("CommandChannel::close: called");
        self.tx.write().unwrap_or_else(PoisonError::into_inner).take();
    }

    /// Send a command to the loop and wait for its result
    pub async fn invoke(
        &self,
        target: CommandTarget,
        id: &str,
        params: CommandParams,
    ) -> Result<CommandResult, DispatchError> {
        let request_id = Uuid::now_v7();
        debug!(%request_id, %target, %id, "CommandChannel::invoke: called");

        // Clone the sender so no lock is held while waiting
        let tx = self
            .tx
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| DispatchError::cancelled("loop is not running"))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        tx.send(CommandRequest {
            request_id,
            target,
            id: id.to_string(),
            params,
            reply: reply_tx,
        })
        .await
        .map_err(|_| DispatchError::cancelled("loop stopped before accepting the command"))?;

        debug!(%request_id, "CommandChannel::invoke: waiting for reply");
        let result = reply_rx
            .await
            .map_err(|_| DispatchError::cancelled("loop exited before completing the command"))?;
        Ok(result?)
    }
}

/// Execute every queued request on the loop task
///
/// A panicking command is reported to its caller and does not take the loop down.
pub(crate) async fn service_commands<P>(procedure: &mut P, rx: &mut mpsc::Receiver<CommandRequest>)
where
    P: Procedure + ?Sized,
{
    while let Ok(request) = rx.try_recv() {
        debug!(request_id = %request.request_id, id = %request.id, "service_commands: executing");
        let result = AssertUnwindSafe(procedure.execute_command(request.target, &request.id, &request.params))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(CommandError::Panicked(panic_message(payload))));
        if let Err(e) = &result {
            warn!(
                request_id = %request.request_id,
                id = %request.id,
                target = %request.target,
                error = %e,
                "Command rejected"
            );
        }
        if request.reply.send(result).is_err() {
            debug!(request_id = %request.request_id, "service_commands: caller stopped waiting");
        }
    }
}

/// Close the receiver and cancel everything still queued
pub(crate) fn cancel_pending(rx: &mut mpsc::Receiver<CommandRequest>) -> usize {
    rx.close();
    let mut cancelled = 0;
    while let Ok(request) = rx.try_recv() {
        debug!(request_id = %request.request_id, "cancel_pending: dropping request");
        drop(request);
        cancelled += 1;
    }
    cancelled
}
