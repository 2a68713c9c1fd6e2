//! hub.rs
//! The shared context built once at startup and handed to the ingestion
//! server, the processing worker and the aggregation loop. Replaces the
//! process-wide globals of a naive layout: everything mutable lives behind
//! the registry's per-drone locks or the log sink's queue.

use std::io;

use crate::config::Config;
use crate::logsink::LogSink;
use crate::registry::DroneRegistry;

pub struct Hub {
    pub config: Config,
    pub registry: DroneRegistry,
    pub sink: LogSink,
}

impl Hub {
    pub fn new(config: Config) -> io::Result<Self> {
        let sink = LogSink::start(&config.log_dir)?;
        Ok(Self {
            config,
            registry: DroneRegistry::new(),
            sink,
        })
    }
}
