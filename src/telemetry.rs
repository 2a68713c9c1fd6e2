//! telemetry.rs
//! Wire-format types for sensor readings and drone summaries.
//! - newline-delimited UTF-8 JSON, one document per line
//! - drone id derived from the sensor id when the sender omits it
//! - timestamps parsed as ISO-8601, falling back to ingest time

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One timestamped telemetry sample from a sensor.
/// Every field except `sensor_id` is optional on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(default)]
    pub sensor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drone_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motor_energies: Option<Vec<f64>>,
}

/// Periodic per-drone aggregate sent to the central collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryPayload {
    pub drone_id: String,
    pub avg_temperature: f64,
    pub avg_pressure: f64,
    pub avg_altitude: f64,
    pub avg_motor_energies: Vec<f64>,
    pub timestamp: String,
}

/// Why a line was rejected at the decode boundary.
/// `Json` means the line was not a JSON document at all; `MissingId` means it
/// was structurally valid but carries neither `sensor_id` nor `drone_id`.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("reading carries neither sensor_id nor drone_id")]
    MissingId,
}

/// Decode one framed line into a [`Reading`].
pub fn decode_line(line: &str) -> Result<Reading, DecodeError> {
    let reading: Reading = serde_json::from_str(line)?;
    if reading.sensor_id.is_empty() && reading.drone_id.is_none() {
        return Err(DecodeError::MissingId);
    }
    Ok(reading)
}

impl Reading {
    /// Drone this reading belongs to: the explicit `drone_id`, or the first
    /// two underscore-separated segments of `sensor_id` ("drone_1_temp" →
    /// "drone_1").
    pub fn resolve_drone_id(&self) -> String {
        match &self.drone_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => self
                .sensor_id
                .split('_')
                .take(2)
                .collect::<Vec<_>>()
                .join("_"),
        }
    }

    /// Timestamp as epoch seconds; unparsable or absent falls back to now.
    pub fn epoch_timestamp(&self) -> f64 {
        self.timestamp
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(now_epoch)
    }
}

/// Parse an ISO-8601 timestamp into fractional epoch seconds.
pub fn parse_timestamp(ts: &str) -> Option<f64> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.timestamp_millis() as f64 / 1000.0)
}

pub fn now_epoch() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// UTC timestamp in the summary wire format, stamped at flush time.
pub fn flush_timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
