//! registry.rs
//! Lazily-created per-drone state, keyed by drone id.
//!
//! Each drone's battery, discrepancy window and summary accumulator form ONE
//! mutex-guarded unit: the processing worker and the aggregation loop take
//! the same lock for their whole read-then-mutate / read-then-clear
//! sequences, so the two loops can never interleave on a drone. Get-or-create
//! goes through the DashMap entry API, so first-reading races cannot
//! default-construct a drone twice. State lives for the process lifetime; no
//! eviction.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::anomaly::DiscrepancyWindow;
use crate::battery::Battery;
use crate::telemetry::Reading;

/// Per-drone mutable record: battery level, discrepancy window and pending
/// summary data.
#[derive(Debug, Default)]
pub struct DroneState {
    pub battery: Battery,
    pub window: DiscrepancyWindow,
    pub pending: Vec<Reading>,
}

impl DroneState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Default)]
pub struct DroneRegistry {
    drones: DashMap<String, Arc<Mutex<DroneState>>>,
}

impl DroneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a drone's guarded state, creating it on first contact.
    pub fn get_or_create(&self, drone_id: &str) -> Arc<Mutex<DroneState>> {
        self.drones
            .entry(drone_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(DroneState::new())))
            .clone()
    }

    /// Snapshot of the known drone ids, for the aggregation sweep.
    pub fn drone_ids(&self) -> Vec<String> {
        self.drones.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.drones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drones.is_empty()
    }
}
