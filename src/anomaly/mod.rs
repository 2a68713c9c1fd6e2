//! Anomaly detection over accepted readings.
//! Two independent checks, results unioned: stateless range thresholds and a
//! per-drone sliding-window discrepancy scan (see [`discrepancy`]).
//! Anomalies are observational: they are logged, never block processing.

pub mod discrepancy;

pub use discrepancy::DiscrepancyWindow;

use std::fmt;

use serde::{Serialize, Serializer};

use crate::telemetry::Reading;

pub const TEMPERATURE_RANGE: (f64, f64) = (-10.0, 60.0);
pub const PRESSURE_RANGE: (f64, f64) = (300.0, 1100.0);
pub const ALTITUDE_RANGE: (f64, f64) = (0.0, 500.0);
pub const MOTOR_RANGE: (f64, f64) = (0.0, 100.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyKind {
    Temperature,
    Pressure,
    Altitude,
    Motor(usize),
    TemperatureDiscrepancy,
    AltitudeDiscrepancy,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyKind::Temperature => write!(f, "temperature"),
            AnomalyKind::Pressure => write!(f, "pressure"),
            AnomalyKind::Altitude => write!(f, "altitude"),
            AnomalyKind::Motor(idx) => write!(f, "motor_{}", idx),
            AnomalyKind::TemperatureDiscrepancy => write!(f, "temperature_discrepancy"),
            AnomalyKind::AltitudeDiscrepancy => write!(f, "altitude_discrepancy"),
        }
    }
}

impl Serialize for AnomalyKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Either the offending value (threshold checks) or the computed spread
/// (discrepancy checks).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Magnitude {
    Value { value: f64 },
    Range { range: f64 },
}

/// Serializes as `{"type":"temperature","value":65.0}` or
/// `{"type":"temperature_discrepancy","range":6.0}`, matching the anomaly
/// log stream format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    #[serde(flatten)]
    pub magnitude: Magnitude,
}

impl Anomaly {
    pub fn out_of_range(kind: AnomalyKind, value: f64) -> Self {
        Self {
            kind,
            magnitude: Magnitude::Value { value },
        }
    }

    pub fn spread(kind: AnomalyKind, range: f64) -> Self {
        Self {
            kind,
            magnitude: Magnitude::Range { range },
        }
    }
}

fn outside(value: f64, (lo, hi): (f64, f64)) -> bool {
    value < lo || value > hi
}

/// Stateless range check. Each out-of-range field yields one anomaly;
/// absent fields never flag.
pub fn detect_threshold(reading: &Reading) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    if let Some(t) = reading.temperature {
        if outside(t, TEMPERATURE_RANGE) {
            anomalies.push(Anomaly::out_of_range(AnomalyKind::Temperature, t));
        }
    }
    if let Some(p) = reading.pressure {
        if outside(p, PRESSURE_RANGE) {
            anomalies.push(Anomaly::out_of_range(AnomalyKind::Pressure, p));
        }
    }
    if let Some(alt) = reading.altitude {
        if outside(alt, ALTITUDE_RANGE) {
            anomalies.push(Anomaly::out_of_range(AnomalyKind::Altitude, alt));
        }
    }
    if let Some(motors) = &reading.motor_energies {
        for (idx, &m) in motors.iter().enumerate() {
            if outside(m, MOTOR_RANGE) {
                anomalies.push(Anomaly::out_of_range(AnomalyKind::Motor(idx), m));
            }
        }
    }

    anomalies
}
