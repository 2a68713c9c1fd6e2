//! worker.rs
//! Single consumer of the ingestion queue. Serial execution guarantees at
//! most one in-flight mutation of any drone's transient state from the
//! ingestion path at a time; the per-drone lock additionally excludes the
//! aggregation loop.
//!
//! Per reading: time drain → admission gate → read drain → motor zeroing
//! below 10% → window + accumulator append → anomaly scan → log outcome.

use std::sync::Arc;

use crossbeam::channel::Receiver;
use log::{debug, info};

use crate::anomaly::{Anomaly, detect_threshold};
use crate::battery::CRITICAL_THRESHOLD;
use crate::hub::Hub;
use crate::logsink::{ANOMALY_STREAM, Level};
use crate::telemetry::Reading;

pub struct Worker {
    rx: Receiver<Reading>,
    hub: Arc<Hub>,
}

impl Worker {
    pub fn new(rx: Receiver<Reading>, hub: Arc<Hub>) -> Self {
        Self { rx, hub }
    }

    /// Drain the queue until every producer hangs up.
    pub fn run(&self) {
        info!("[Worker] started");
        while let Ok(reading) = self.rx.recv() {
            self.handle_reading(reading);
        }
        debug!("[Worker] queue closed; exiting");
    }

    /// Process one reading. Returns the detected anomalies, or `None` when
    /// the admission gate dropped the reading.
    pub fn handle_reading(&self, mut reading: Reading) -> Option<Vec<Anomaly>> {
        let ts = reading.epoch_timestamp();
        let drone_id = reading.resolve_drone_id();

        let state = self.hub.registry.get_or_create(&drone_id);
        let mut state = state.lock();

        state.battery.update_time_drain(ts);

        if !state.battery.should_enqueue() {
            // No drain is charged for a dropped reading.
            self.hub.sink.emit(
                &drone_id,
                Level::Warn,
                format!(
                    "Battery critical ({:.1}%), dropping reading",
                    state.battery.level()
                ),
            );
            return None;
        }

        let level_after_read = state.battery.drain_on_read();
        if level_after_read < CRITICAL_THRESHOLD {
            // Below critical the motors are reported as unpowered; length is
            // preserved so aggregation widths stay stable.
            if let Some(motors) = reading.motor_energies.as_mut() {
                motors.fill(0.0);
            }
        }

        state.window.insert(ts, reading.clone());
        let mut anomalies = detect_threshold(&reading);
        anomalies.extend(state.window.scan());
        state.pending.push(reading.clone());
        drop(state);

        if anomalies.is_empty() {
            self.hub.sink.emit(
                &drone_id,
                Level::Info,
                format!(
                    "Reading accepted from {} at {}",
                    reading.sensor_id,
                    reading.timestamp.as_deref().unwrap_or("-")
                ),
            );
        } else {
            let encoded =
                serde_json::to_string(&anomalies).unwrap_or_else(|_| "[]".into());
            self.hub.sink.emit(
                &drone_id,
                Level::Warn,
                format!("Anomalies detected: {encoded}"),
            );
            self.hub.sink.emit(
                ANOMALY_STREAM,
                Level::Warn,
                format!(
                    "{} @ {} -> {}",
                    reading.sensor_id,
                    reading.timestamp.as_deref().unwrap_or("-"),
                    encoded
                ),
            );
        }

        Some(anomalies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::AnomalyKind;
    use crate::config::Config;
    use crossbeam::channel::unbounded;

    fn test_hub() -> (Arc<Hub>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            log_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        (Arc::new(Hub::new(config).unwrap()), dir)
    }

    fn worker(hub: Arc<Hub>) -> Worker {
        let (_tx, rx) = unbounded::<Reading>();
        Worker::new(rx, hub)
    }

    fn reading(ts: f64, temperature: f64) -> Reading {
        Reading {
            sensor_id: "drone_1_env".into(),
            drone_id: None,
            timestamp: Some(
                chrono::DateTime::from_timestamp(ts as i64, 0)
                    .unwrap()
                    .format("%Y-%m-%dT%H:%M:%SZ")
                    .to_string(),
            ),
            temperature: Some(temperature),
            pressure: Some(1000.0),
            altitude: Some(100.0),
            humidity: None,
            motor_energies: Some(vec![10.0, 20.0, 30.0, 40.0]),
        }
    }

    #[test]
    fn accepted_reading_lands_in_window_and_accumulator() {
        let (hub, _dir) = test_hub();
        let w = worker(hub.clone());
        let anoms = w.handle_reading(reading(1000.0, 21.0)).unwrap();
        assert!(anoms.is_empty());

        let state = hub.registry.get_or_create("drone_1");
        let state = state.lock();
        assert_eq!(state.pending.len(), 1);
        assert_eq!(state.window.len(), 1);
        assert!((state.battery.level() - 99.95).abs() < 1e-9);
    }

    #[test]
    fn threshold_and_discrepancy_results_union() {
        let (hub, _dir) = test_hub();
        let w = worker(hub.clone());
        for (i, t) in [10.0, 10.0, 10.0].iter().enumerate() {
            w.handle_reading(reading(1000.0 + i as f64 * 0.2, *t)).unwrap();
        }
        // Fourth reading: out of range AND closes a >5 spread over the window.
        let anoms = w.handle_reading(reading(1000.8, 65.0)).unwrap();
        let kinds: Vec<_> = anoms.iter().map(|a| a.kind).collect();
        assert!(kinds.contains(&AnomalyKind::Temperature));
        assert!(kinds.contains(&AnomalyKind::TemperatureDiscrepancy));
    }

    #[test]
    fn critical_battery_drops_without_charging_drain() {
        let (hub, _dir) = test_hub();
        let w = worker(hub.clone());
        {
            let state = hub.registry.get_or_create("drone_1");
            let mut state = state.lock();
            state.battery.update_time_drain(0.0);
            state.battery.update_time_drain(905.0); // level 9.5
        }
        assert!(w.handle_reading(reading(905.0, 21.0)).is_none());

        let state = hub.registry.get_or_create("drone_1");
        let state = state.lock();
        assert!((state.battery.level() - 9.5).abs() < 1e-9);
        assert!(state.pending.is_empty());
        assert!(state.window.is_empty());
    }

    #[test]
    fn motors_zero_out_when_read_drain_crosses_critical() {
        let (hub, _dir) = test_hub();
        let w = worker(hub.clone());
        {
            let state = hub.registry.get_or_create("drone_1");
            let mut state = state.lock();
            state.battery.update_time_drain(0.0);
            state.battery.update_time_drain(900.0); // level exactly 10: still admitted
        }
        w.handle_reading(reading(900.0, 21.0)).unwrap();

        let state = hub.registry.get_or_create("drone_1");
        let state = state.lock();
        assert_eq!(
            state.pending[0].motor_energies,
            Some(vec![0.0, 0.0, 0.0, 0.0])
        );
    }
}
