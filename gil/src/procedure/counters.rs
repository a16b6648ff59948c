//! Live failure counters
//!
//! Each procedure is the only writer of its counters; the executive reads
//! them from caller threads to build statistics, so they are plain atomics
//! shared through an `Arc`.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by the external-system procedure
#[derive(Debug, Default)]
pub struct ExternalSystemCounters {
    dropped_process_model_frames: AtomicU64,
    command_write_failures: AtomicU64,
    data_write_failures: AtomicU64,
    data_read_failures: AtomicU64,
}

impl ExternalSystemCounters {
    pub fn dropped_process_model_frames(&self) -> u64 {
        self.dropped_process_model_frames.load(Ordering::Relaxed)
    }

    pub fn command_write_failures(&self) -> u64 {
        self.command_write_failures.load(Ordering::Relaxed)
    }

    pub fn data_write_failures(&self) -> u64 {
        self.data_write_failures.load(Ordering::Relaxed)
    }

    pub fn data_read_failures(&self) -> u64 {
        self.data_read_failures.load(Ordering::Relaxed)
    }

    pub fn add_dropped_process_model_frames(&self, count: u64) {
        self.dropped_process_model_frames.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_command_write_failures(&self, count: u64) {
        self.command_write_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_data_write_failures(&self, count: u64) {
        self.data_write_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_data_read_failures(&self, count: u64) {
        self.data_read_failures.fetch_add(count, Ordering::Relaxed);
    }
}

/// Counters maintained by the process-model procedure
#[derive(Debug, Default)]
pub struct ProcessModelCounters {
    dropped_external_system_frames: AtomicU64,
    dropped_process_model_frames: AtomicU64,
    command_read_failures: AtomicU64,
    sim_time_read_failures: AtomicU64,
    data_write_failures: AtomicU64,
    data_read_failures: AtomicU64,
}

impl ProcessModelCounters {
    pub fn dropped_external_system_frames(&self) -> u64 {
        self.dropped_external_system_frames.load(Ordering::Relaxed)
    }

    pub fn dropped_process_model_frames(&self) -> u64 {
        self.dropped_process_model_frames.load(Ordering::Relaxed)
    }

    pub fn command_read_failures(&self) -> u64 {
        self.command_read_failures.load(Ordering::Relaxed)
    }

    pub fn sim_time_read_failures(&self) -> u64 {
        self.sim_time_read_failures.load(Ordering::Relaxed)
    }

    pub fn data_write_failures(&self) -> u64 {
        self.data_write_failures.load(Ordering::Relaxed)
    }

    pub fn data_read_failures(&self) -> u64 {
        self.data_read_failures.load(Ordering::Relaxed)
    }

    pub fn add_dropped_external_system_frames(&self, count: u64) {
        self.dropped_external_system_frames.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_dropped_process_model_frames(&self, count: u64) {
        self.dropped_process_model_frames.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_command_read_failures(&self, count: u64) {
        self.command_read_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_sim_time_read_failures(&self, count: u64) {
        self.sim_time_read_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_data_write_failures(&self, count: u64) {
        self.data_write_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_data_read_failures(&self, count: u64) {
        self.data_read_failures.fetch_add(count, Ordering::Relaxed);
    }
}
