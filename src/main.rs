//! # Drone Telemetry Hub Entry Point
//! Wires the ingestion server, processing worker and aggregation loop around
//! one shared [`Hub`] context and runs until the process is killed.
//!
//! ## Threads
//! - **Ingestion:** accept loop on the main thread, one handler thread per
//!   sensor connection, decoded readings into an unbounded queue.
//! - **Worker:** single consumer of the queue; battery gating, anomaly
//!   detection, per-drone buffering.
//! - **Aggregator:** 2-second cadence; averages, battery checks, summary
//!   dispatch to the central collector.
//! - **Log sink writer:** background thread draining the lock-free log queue.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use crossbeam::channel::unbounded;
use drone_hub::{
    config::Config,
    dispatch::CentralClient,
    hub::Hub,
    ingest::IngestServer,
    processing::{Aggregator, Worker},
    telemetry::Reading,
};
use log::{error, info};

fn main() {
    env_logger::init();
    info!("=== DRONE TELEMETRY HUB START ===");

    let config = Config::from_env();
    let hub = match Hub::new(config) {
        Ok(hub) => Arc::new(hub),
        Err(e) => {
            error!("Failed to start log sink: {}", e);
            return;
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let (tx_readings, rx_readings) = unbounded::<Reading>();

    let worker_handle = {
        let hub_w = hub.clone();
        thread::spawn(move || Worker::new(rx_readings, hub_w).run())
    };

    let aggregator_handle = {
        let hub_a = hub.clone();
        let running_a = running.clone();
        thread::spawn(move || {
            let client = Arc::new(CentralClient::new(hub_a.config.central_addr.clone()));
            let interval = hub_a.config.batch_interval;
            Aggregator::new(hub_a, client, interval, running_a).run();
        })
    };

    let server = match IngestServer::bind(&hub.config.listen_addr, tx_readings, hub.clone()) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to bind {}: {}", hub.config.listen_addr, e);
            return;
        }
    };
    info!(
        "[Main] Sensors -> {} | Summaries -> {}",
        hub.config.listen_addr, hub.config.central_addr
    );

    // Runs until the listener fails; connection handlers and the worker keep
    // their own lifecycles.
    server.run(running.clone());

    info!("[Main] Accept loop ended, shutting down...");
    running.store(false, Ordering::Relaxed);

    // Drop the server (and with it the last queue producer) so the worker's
    // blocking recv returns Err and the thread can join.
    drop(server);

    let _ = worker_handle.join();
    let _ = aggregator_handle.join();
    hub.sink.stop();

    info!("=== DRONE TELEMETRY HUB FINISHED ===");
}
