//! discrepancy.rs
//! Trailing 2-second window of recent readings per drone, used to detect
//! cross-reading sensor disagreement (temperature/altitude spreads).

use std::collections::VecDeque;

use crate::anomaly::{Anomaly, AnomalyKind};
use crate::telemetry::Reading;

pub const WINDOW_SECS: f64 = 2.0;
pub const MIN_SAMPLES: usize = 4;
pub const TEMPERATURE_SPREAD_LIMIT: f64 = 5.0;
pub const ALTITUDE_SPREAD_LIMIT: f64 = 1.0;

/// Time-ordered (timestamp, reading) pairs pruned to the trailing window.
///
/// The prune reference is the maximum timestamp ever inserted, so an
/// out-of-order reading can never widen the window or resurrect pruned
/// entries.
#[derive(Debug, Default)]
pub struct DiscrepancyWindow {
    entries: VecDeque<(f64, Reading)>,
    latest: f64,
}

impl DiscrepancyWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert one reading and prune everything older than the trailing
    /// window relative to the latest inserted timestamp.
    pub fn insert(&mut self, ts: f64, reading: Reading) {
        self.latest = self.latest.max(ts);
        self.entries.push_back((ts, reading));
        let cutoff = self.latest - WINDOW_SECS;
        self.entries.retain(|(t, _)| *t >= cutoff);
    }

    /// Spread scan: with at least [`MIN_SAMPLES`] entries, flag when the
    /// max-min spread of temperature or altitude exceeds its limit.
    pub fn scan(&self) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();
        if self.entries.len() < MIN_SAMPLES {
            return anomalies;
        }

        if let Some(range) = self.field_spread(|r| r.temperature) {
            if range > TEMPERATURE_SPREAD_LIMIT {
                anomalies.push(Anomaly::spread(AnomalyKind::TemperatureDiscrepancy, range));
            }
        }
        if let Some(range) = self.field_spread(|r| r.altitude) {
            if range > ALTITUDE_SPREAD_LIMIT {
                anomalies.push(Anomaly::spread(AnomalyKind::AltitudeDiscrepancy, range));
            }
        }

        anomalies
    }

    fn field_spread(&self, field: impl Fn(&Reading) -> Option<f64>) -> Option<f64> {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut seen = false;
        for (_, reading) in &self.entries {
            if let Some(v) = field(reading) {
                min = min.min(v);
                max = max.max(v);
                seen = true;
            }
        }
        seen.then_some(max - min)
    }
}
