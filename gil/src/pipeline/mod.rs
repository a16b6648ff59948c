//! Transfer pipeline between the external system and the process model
//!
//! The pipeline is an ordered list of stages. Stage algorithms live in the
//! stage implementations; this module only defines the contract and the
//! ordering.

mod pipeline;
mod stage;

pub use pipeline::{PipelineError, TransferPipeline};
pub use stage::{PipelineStage, StageError, parse_param};

#[cfg(test)]
pub use pipeline::mock;
