//! config.rs
//! Compiled defaults, each overridable from the environment. No config files.

use std::{env, path::PathBuf, time::Duration};

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5000";
pub const DEFAULT_CENTRAL_ADDR: &str = "127.0.0.1:4000";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_BATCH_INTERVAL_SECS: u64 = 2;

#[derive(Debug, Clone)]
pub struct Config {
    /// Ingestion listen address (`HUB_LISTEN_ADDR`).
    pub listen_addr: String,
    /// Central collector address for summary dispatch (`HUB_CENTRAL_ADDR`).
    pub central_addr: String,
    /// Root directory for the log sink streams (`HUB_LOG_DIR`).
    pub log_dir: PathBuf,
    /// Aggregation flush period (`HUB_BATCH_INTERVAL_SECS`).
    pub batch_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.into(),
            central_addr: DEFAULT_CENTRAL_ADDR.into(),
            log_dir: DEFAULT_LOG_DIR.into(),
            batch_interval: Duration::from_secs(DEFAULT_BATCH_INTERVAL_SECS),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut cfg = Config::default();
        if let Ok(v) = env::var("HUB_LISTEN_ADDR") {
            cfg.listen_addr = v;
        }
        if let Ok(v) = env::var("HUB_CENTRAL_ADDR") {
            cfg.central_addr = v;
        }
        if let Ok(v) = env::var("HUB_LOG_DIR") {
            cfg.log_dir = v.into();
        }
        if let Ok(v) = env::var("HUB_BATCH_INTERVAL_SECS") {
            let secs = v.trim().parse::<u64>().unwrap_or(DEFAULT_BATCH_INTERVAL_SECS);
            cfg.batch_interval = Duration::from_secs(secs);
        }
        cfg
    }
}
