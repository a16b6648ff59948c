//! GIL - Generic Integration Layer
//!
//! Couples a simulation (the *process model*) with an *external system* such
//! as plant instrumentation or a control interface. Two independent polling
//! loops move data frames and commands between the sides through an ordered
//! transfer pipeline, while any thread can query state, progress and
//! statistics or invoke control commands.
//!
//! # Modules
//!
//! - [`domain`] - Value types: states, statuses, progress, statistics, descriptors, frames
//! - [`adapter`] - Adapter capability traits for both sides
//! - [`pipeline`] - Transfer pipeline and the stage contract
//! - [`procedure`] - Per-side procedures driven by the loops
//! - [`executive`] - Integration executive: lifecycle, publication, dispatch
//! - [`sim`] - Simulated adapters and sample stages
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod adapter;
pub mod cli;
pub mod config;
pub mod domain;
pub mod executive;
pub mod pipeline;
pub mod procedure;
pub mod sim;

// Re-export commonly used types
pub use adapter::{AdapterError, Capabilities, ExternalSystemAdapter, ProcessModelAdapter, ProgressListener};
pub use config::{Config, ExecutiveConfig, SimulationConfig};
pub use domain::{
    AdapterDescriptor, CommandDescriptor, CommandParams, CommandResult, Frame, ProgressInfo, SignalDirection,
    SignalMetadata, StageDescriptor, Statistics, StatusCode, SystemSnapshot, SystemState, SystemStatus,
};
pub use executive::{DispatchError, ExecutiveError, IntegrationExecutive, LoopState, Side};
pub use pipeline::{PipelineError, PipelineStage, StageError, TransferPipeline};
pub use procedure::{CommandError, CommandTarget};
