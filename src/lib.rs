//! # Drone Telemetry Hub
//! Ingests periodic sensor readings over TCP, gates each reading through a
//! simulated per-drone battery, detects anomalies in real time, and flushes
//! per-drone summaries to a central collector on a fixed period.
//!
//! ## Pipeline
//! Sensor → Ingestion Server → queue → Processing Worker →
//! {Battery, Anomaly Detector, Buffer} → (2s timer) Aggregation Loop →
//! Dispatch Client → Central Collector.
//!
//! ## Concurrency
//! - One thread per accepted ingestion connection.
//! - One worker thread draining the shared unbounded queue serially.
//! - One periodic aggregation thread (spin-sleeper cadence).
//! - Per-drone state (battery + window + accumulator) is a single mutex-guarded
//!   unit; the worker and the aggregator take the same lock for their whole
//!   read-then-mutate / read-then-clear sequences.

pub mod anomaly;
pub mod battery;
pub mod config;
pub mod dispatch;
pub mod hub;
pub mod ingest;
pub mod logsink;
pub mod processing;
pub mod registry;
pub mod telemetry;
