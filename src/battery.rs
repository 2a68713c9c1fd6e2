//! battery.rs
//! Simulated per-drone battery: pure decay/drain state transitions, no I/O.
//! - time drain while telemetry flows, flat drain per accepted read, larger
//!   drain per summary send
//! - admission gate below 10%, one-shot return-to-base latch below 20%
//!
//! Callers serialize access through the registry's per-drone mutex; every
//! gating read happens inside the same critical section as the writes.

pub const FULL_CHARGE: f64 = 100.0;
pub const DRAIN_PER_SEC: f64 = 0.1;
pub const DRAIN_PER_READ: f64 = 0.05;
pub const DRAIN_PER_SEND: f64 = 0.2;
pub const DRAIN_MOTOR_FACTOR: f64 = 0.001;
pub const RETURN_THRESHOLD: f64 = 20.0;
pub const CRITICAL_THRESHOLD: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryState {
    /// Level >= 20%: normal operation.
    Active,
    /// Level < 20%: return-to-base fired (or about to), summaries withheld.
    Returning,
    /// Level < 10%: new readings refused.
    Critical,
    /// Level == 0%.
    Depleted,
}

#[derive(Debug, Clone)]
pub struct Battery {
    level: f64,
    last_timestamp: Option<f64>,
    returned_to_base: bool,
}

impl Default for Battery {
    fn default() -> Self {
        Self {
            level: FULL_CHARGE,
            last_timestamp: None,
            returned_to_base: false,
        }
    }
}

impl Battery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn state(&self) -> BatteryState {
        if self.level <= 0.0 {
            BatteryState::Depleted
        } else if self.level < CRITICAL_THRESHOLD {
            BatteryState::Critical
        } else if self.level < RETURN_THRESHOLD {
            BatteryState::Returning
        } else {
            BatteryState::Active
        }
    }

    /// Drain `elapsed * 0.1` percent since the last recorded timestamp.
    ///
    /// Out-of-order readings charge zero drain: the delta is clamped to >= 0
    /// and the stored timestamp never moves backwards, so a late reading can
    /// neither recharge the battery nor double-charge the next one.
    pub fn update_time_drain(&mut self, now_ts: f64) {
        let last = self.last_timestamp.unwrap_or(now_ts);
        let elapsed = (now_ts - last).max(0.0);
        self.level = (self.level - elapsed * DRAIN_PER_SEC).max(0.0);
        self.last_timestamp = Some(last.max(now_ts));
    }

    /// Flat drain per accepted reading; returns the resulting level.
    pub fn drain_on_read(&mut self) -> f64 {
        self.level = (self.level - DRAIN_PER_READ).max(0.0);
        self.level
    }

    /// Drain charged at flush time, scaled by mean motor power; returns the
    /// resulting level.
    pub fn drain_on_send(&mut self, avg_motor_power: f64) -> f64 {
        let drain = DRAIN_PER_SEND + avg_motor_power * DRAIN_MOTOR_FACTOR;
        self.level = (self.level - drain).max(0.0);
        self.level
    }

    /// Admission gate: false below 10%. A caller observing false must drop
    /// the reading without charging any drain for it.
    pub fn should_enqueue(&self) -> bool {
        self.level >= CRITICAL_THRESHOLD
    }

    /// One-shot return-to-base latch: fires the first time the level is seen
    /// below 20%, then never again.
    pub fn check_return_to_base(&mut self) -> (bool, f64) {
        if self.level < RETURN_THRESHOLD && !self.returned_to_base {
            self.returned_to_base = true;
            return (true, self.level);
        }
        (false, self.level)
    }
}
