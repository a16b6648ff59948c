//! Adapter abstraction for both sides of the integration
//!
//! Adapters handle the protocol to the real external system or process model.
//! The rest of the crate only sees the capability traits defined here.

mod error;
mod traits;

pub use error::AdapterError;
pub use traits::{Capabilities, ExternalSystemAdapter, ProcessModelAdapter, ProgressListener, TransferCommand};

#[cfg(test)]
pub use traits::mock;
