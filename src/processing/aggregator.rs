//! aggregator.rs
//! Timer-driven flush loop: every period, each drone with pending readings is
//! averaged, battery-gated and dispatched to the central collector.
//! - the accumulator is snapshotted-and-cleared under the drone lock exactly
//!   once per cycle, whether or not a send happens or succeeds
//! - a dispatch failure is logged and swallowed; the batch is never retried

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use log::{debug, info};
use spin_sleep::{SpinSleeper, SpinStrategy};

use crate::battery::RETURN_THRESHOLD;
use crate::dispatch::SummarySink;
use crate::hub::Hub;
use crate::logsink::Level;
use crate::telemetry::{Reading, SummaryPayload, flush_timestamp};

pub struct Aggregator {
    hub: Arc<Hub>,
    client: Arc<dyn SummarySink>,
    interval: Duration,
    running: Arc<AtomicBool>,
}

impl Aggregator {
    pub fn new(
        hub: Arc<Hub>,
        client: Arc<dyn SummarySink>,
        interval: Duration,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            hub,
            client,
            interval,
            running,
        }
    }

    /// Periodic release against absolute deadlines, so flush cadence does not
    /// drift with flush cost.
    pub fn run(&self) {
        info!(
            "[Aggregator] started, interval={}ms",
            self.interval.as_millis()
        );
        let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
        let mut next_deadline = Instant::now() + self.interval;

        while self.running.load(Ordering::Acquire) {
            let now = Instant::now();
            if now < next_deadline {
                sleeper.sleep(next_deadline - now);
            }
            self.flush_all();
            next_deadline += self.interval;
        }

        debug!("[Aggregator] stopped");
    }

    /// One tick: sweep every known drone.
    pub fn flush_all(&self) {
        for drone_id in self.hub.registry.drone_ids() {
            self.flush_drone(&drone_id);
        }
    }

    fn flush_drone(&self, drone_id: &str) {
        let state = self.hub.registry.get_or_create(drone_id);
        let mut state = state.lock();
        if state.pending.is_empty() {
            return;
        }
        // Cleared here, once, unconditionally for this cycle.
        let batch = std::mem::take(&mut state.pending);

        let (triggered, level) = state.battery.check_return_to_base();
        if triggered {
            self.hub.sink.emit(
                drone_id,
                Level::Warn,
                format!("Return-to-base triggered at {level:.1}%"),
            );
        }

        if level < RETURN_THRESHOLD {
            self.hub.sink.emit(
                drone_id,
                Level::Warn,
                format!("Battery low ({level:.1}%), skipping summary"),
            );
            return;
        }

        let (avg_motors, width_mismatch) = motor_means(&batch);
        if width_mismatch {
            self.hub.sink.emit(
                drone_id,
                Level::Warn,
                "Mismatched motor_energies widths in batch; averaging per index".to_string(),
            );
        }
        let mean_power = if avg_motors.is_empty() {
            0.0
        } else {
            avg_motors.iter().sum::<f64>() / avg_motors.len() as f64
        };
        let new_level = state.battery.drain_on_send(mean_power);
        drop(state);

        let payload = SummaryPayload {
            drone_id: drone_id.to_string(),
            avg_temperature: mean_of(&batch, |r| r.temperature),
            avg_pressure: mean_of(&batch, |r| r.pressure),
            avg_altitude: mean_of(&batch, |r| r.altitude),
            avg_motor_energies: avg_motors,
            timestamp: flush_timestamp(),
        };

        match self.client.send(&payload) {
            Ok(()) => {
                let encoded =
                    serde_json::to_string(&payload).unwrap_or_else(|_| "{}".into());
                self.hub.sink.emit(
                    drone_id,
                    Level::Info,
                    format!("Summary sent to central: {encoded}; battery: {new_level:.1}%"),
                );
            }
            Err(e) => {
                // Fire-and-forget: this cycle's summary is lost, not retried.
                self.hub.sink.emit(
                    drone_id,
                    Level::Error,
                    format!("Error sending to central: {e}"),
                );
            }
        }
    }
}

/// Mean over the readings that carry the field; 0.0 when none do.
fn mean_of(batch: &[Reading], field: impl Fn(&Reading) -> Option<f64>) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for reading in batch {
        if let Some(v) = field(reading) {
            sum += v;
            count += 1;
        }
    }
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Per-index motor means. The expected width comes from the first reading in
/// the batch; each index averages over the readings that actually carry that
/// index. Returns whether any reading disagreed on width.
fn motor_means(batch: &[Reading]) -> (Vec<f64>, bool) {
    let width = batch
        .first()
        .and_then(|r| r.motor_energies.as_ref())
        .map_or(0, |m| m.len());
    let mut mismatch = false;
    let mut means = Vec::with_capacity(width);
    for i in 0..width {
        let mut sum = 0.0;
        let mut count = 0usize;
        for reading in batch {
            if let Some(motors) = &reading.motor_energies {
                if motors.len() != width {
                    mismatch = true;
                }
                if let Some(v) = motors.get(i) {
                    sum += v;
                    count += 1;
                }
            }
        }
        means.push(if count == 0 { 0.0 } else { sum / count as f64 });
    }
    (means, mismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::dispatch::DispatchError;
    use parking_lot::Mutex;

    /// Records every payload it is handed; optionally fails each send.
    struct RecordingSink {
        sent: Mutex<Vec<SummaryPayload>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    impl SummarySink for RecordingSink {
        fn send(&self, summary: &SummaryPayload) -> Result<(), DispatchError> {
            if self.fail {
                return Err(DispatchError::Transport(std::io::Error::other(
                    "collector unreachable",
                )));
            }
            self.sent.lock().push(summary.clone());
            Ok(())
        }
    }

    fn test_hub() -> (Arc<Hub>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            log_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        (Arc::new(Hub::new(config).unwrap()), dir)
    }

    fn aggregator(hub: Arc<Hub>, sink: Arc<RecordingSink>) -> Aggregator {
        Aggregator::new(
            hub,
            sink,
            Duration::from_secs(2),
            Arc::new(AtomicBool::new(true)),
        )
    }

    fn reading(temperature: f64, motors: Vec<f64>) -> Reading {
        Reading {
            sensor_id: "drone_1_env".into(),
            drone_id: None,
            timestamp: None,
            temperature: Some(temperature),
            pressure: Some(1000.0),
            altitude: Some(100.0),
            humidity: None,
            motor_energies: Some(motors),
        }
    }

    fn seed(hub: &Hub, readings: Vec<Reading>) {
        let state = hub.registry.get_or_create("drone_1");
        state.lock().pending = readings;
    }

    #[test]
    fn averages_match_the_batch() {
        let (hub, _dir) = test_hub();
        let sink = RecordingSink::new(false);
        let agg = aggregator(hub.clone(), sink.clone());
        seed(
            &hub,
            vec![
                reading(10.0, vec![10.0, 20.0]),
                reading(20.0, vec![30.0, 40.0]),
                reading(30.0, vec![20.0, 0.0]),
            ],
        );

        agg.flush_all();

        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].drone_id, "drone_1");
        assert_eq!(sent[0].avg_temperature, 20.0);
        assert_eq!(sent[0].avg_motor_energies, vec![20.0, 20.0]);
    }

    #[test]
    fn empty_accumulator_sends_nothing() {
        let (hub, _dir) = test_hub();
        let sink = RecordingSink::new(false);
        let agg = aggregator(hub.clone(), sink.clone());
        hub.registry.get_or_create("drone_1");

        agg.flush_all();
        assert!(sink.sent.lock().is_empty());
    }

    #[test]
    fn send_drain_is_charged_per_flush() {
        let (hub, _dir) = test_hub();
        let sink = RecordingSink::new(false);
        let agg = aggregator(hub.clone(), sink.clone());
        seed(&hub, vec![reading(20.0, vec![50.0, 50.0])]);

        agg.flush_all();

        let state = hub.registry.get_or_create("drone_1");
        let level = state.lock().battery.level();
        assert!((level - (100.0 - 0.2 - 0.05)).abs() < 1e-9);
    }

    #[test]
    fn low_battery_skips_the_send_but_clears_the_batch() {
        let (hub, _dir) = test_hub();
        let sink = RecordingSink::new(false);
        let agg = aggregator(hub.clone(), sink.clone());
        {
            let state = hub.registry.get_or_create("drone_1");
            let mut state = state.lock();
            state.battery.update_time_drain(0.0);
            state.battery.update_time_drain(850.0); // level 15
            state.pending = vec![reading(20.0, vec![10.0])];
        }

        agg.flush_all();

        assert!(sink.sent.lock().is_empty());
        let state = hub.registry.get_or_create("drone_1");
        let state = state.lock();
        assert!(state.pending.is_empty());
        // Skipped cycle charges no send drain either.
        assert_eq!(state.battery.level(), 15.0);
    }

    #[test]
    fn return_to_base_fires_once_across_ticks() {
        let (hub, _dir) = test_hub();
        let sink = RecordingSink::new(false);
        let agg = aggregator(hub.clone(), sink.clone());
        {
            let state = hub.registry.get_or_create("drone_1");
            let mut state = state.lock();
            state.battery.update_time_drain(0.0);
            state.battery.update_time_drain(850.0);
        }
        for _ in 0..3 {
            seed(&hub, vec![reading(20.0, vec![10.0])]);
            agg.flush_all();
        }

        let state = hub.registry.get_or_create("drone_1");
        let mut state = state.lock();
        // Latch already consumed by the first tick.
        let (fired, _) = state.battery.check_return_to_base();
        assert!(!fired);
    }

    #[test]
    fn dispatch_failure_still_clears_the_accumulator() {
        let (hub, _dir) = test_hub();
        let failing = RecordingSink::new(true);
        let agg = aggregator(hub.clone(), failing);
        seed(&hub, vec![reading(10.0, vec![10.0])]);

        agg.flush_all();

        {
            let state = hub.registry.get_or_create("drone_1");
            assert!(state.lock().pending.is_empty());
        }

        // Next cycle reflects only newly accumulated readings.
        let sink = RecordingSink::new(false);
        let agg = aggregator(hub.clone(), sink.clone());
        seed(&hub, vec![reading(42.0, vec![10.0])]);
        agg.flush_all();
        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].avg_temperature, 42.0);
    }

    #[test]
    fn mismatched_motor_widths_average_per_index() {
        let (hub, _dir) = test_hub();
        let sink = RecordingSink::new(false);
        let agg = aggregator(hub.clone(), sink.clone());
        seed(
            &hub,
            vec![
                reading(10.0, vec![10.0, 20.0]),
                reading(10.0, vec![30.0]),
            ],
        );

        agg.flush_all();

        let sent = sink.sent.lock();
        // Index 0 averages both readings, index 1 only its single carrier.
        assert_eq!(sent[0].avg_motor_energies, vec![20.0, 20.0]);
    }

    #[test]
    fn fields_absent_from_every_reading_report_zero() {
        let (hub, _dir) = test_hub();
        let sink = RecordingSink::new(false);
        let agg = aggregator(hub.clone(), sink.clone());
        let mut r = reading(10.0, vec![]);
        r.pressure = None;
        r.altitude = None;
        r.motor_energies = None;
        seed(&hub, vec![r]);

        agg.flush_all();

        let sent = sink.sent.lock();
        assert_eq!(sent[0].avg_pressure, 0.0);
        assert_eq!(sent[0].avg_altitude, 0.0);
        assert!(sent[0].avg_motor_energies.is_empty());
    }
}
