//! logsink.rs
//! Append-only operational log streams: one per drone, one shared stream for
//! anomalies, one per server process.
//!
//! Producers (connection handlers, worker, aggregator) push entries onto a
//! bounded lock-free queue and never block; a background writer thread drains
//! the queue in batches, lazily opens one buffered appender per entity, and
//! flushes after a batch quota. Queue-full events drop the entry and bump a
//! counter. WARN/ERROR entries are mirrored to the process logger.

use std::{
    collections::HashMap,
    fmt,
    fs::{File, OpenOptions, create_dir_all},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use chrono::Utc;
use crossbeam_queue::ArrayQueue;
use log::{debug, error, warn};
use parking_lot::Mutex;

const QUEUE_CAPACITY: usize = 8192; // bounded: producers drop, never block
const WRITER_POLL_MS: u64 = 5;
const DRAIN_BATCH: usize = 256;
const FLUSH_BATCHES: usize = 8;

/// Shared stream name for anomaly entries.
pub const ANOMALY_STREAM: &str = "anomalies";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => write!(f, "INFO"),
            Level::Warn => write!(f, "WARN"),
            Level::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug)]
struct LogEntry {
    entity: String,
    level: Level,
    message: String,
    ts: chrono::DateTime<Utc>,
}

pub struct LogSink {
    queue: Arc<ArrayQueue<LogEntry>>,
    dropped: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    writer_handle: Mutex<Option<JoinHandle<()>>>,
}

impl LogSink {
    /// Create the log directory and start the background writer.
    pub fn start(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        create_dir_all(&dir)?;

        let queue = Arc::new(ArrayQueue::new(QUEUE_CAPACITY));
        let dropped = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let queue = queue.clone();
            let dropped = dropped.clone();
            let running = running.clone();
            thread::spawn(move || writer_loop(dir, queue, dropped, running))
        };

        Ok(Self {
            queue,
            dropped,
            running,
            writer_handle: Mutex::new(Some(handle)),
        })
    }

    /// Record one entry on the entity's stream. Non-blocking: if the queue is
    /// full the entry is dropped and counted.
    pub fn emit(&self, entity: &str, level: Level, message: impl Into<String>) {
        let message = message.into();
        match level {
            Level::Warn => warn!("[{}] {}", entity, message),
            Level::Error => error!("[{}] {}", entity, message),
            Level::Info => {}
        }
        let entry = LogEntry {
            entity: entity.to_string(),
            level,
            message,
            ts: Utc::now(),
        };
        if self.queue.push(entry).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Entries lost to a full queue so far.
    pub fn dropped_entries(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop the writer: final-drain the queue, flush every stream, join.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.writer_handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Stream layout: `anomalies` and `*_server` entities get their own files,
/// everything else is a drone stream.
fn stream_path(dir: &Path, entity: &str) -> PathBuf {
    if entity == ANOMALY_STREAM {
        dir.join("anomalies.log")
    } else if entity.ends_with("_server") {
        dir.join("server").join(format!("{entity}.log"))
    } else {
        dir.join("drones").join(format!("{entity}.log"))
    }
}

fn writer_loop(
    dir: PathBuf,
    queue: Arc<ArrayQueue<LogEntry>>,
    dropped: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
) {
    let mut streams: HashMap<String, BufWriter<File>> = HashMap::new();
    let mut flush_counter = 0usize;

    while running.load(Ordering::SeqCst) {
        let mut any = false;
        for _ in 0..DRAIN_BATCH {
            match queue.pop() {
                Some(entry) => {
                    any = true;
                    write_entry(&dir, &mut streams, &entry);
                }
                None => break,
            }
        }
        if any {
            flush_counter += 1;
            if flush_counter >= FLUSH_BATCHES {
                for stream in streams.values_mut() {
                    stream.flush().ok();
                }
                flush_counter = 0;
            }
        } else {
            thread::sleep(Duration::from_millis(WRITER_POLL_MS));
        }
    }

    // Final drain before exit.
    while let Some(entry) = queue.pop() {
        write_entry(&dir, &mut streams, &entry);
    }
    for stream in streams.values_mut() {
        stream.flush().ok();
    }
    debug!(
        "[LogSink::writer] exiting. dropped_entries={}",
        dropped.load(Ordering::Relaxed)
    );
}

fn write_entry(dir: &Path, streams: &mut HashMap<String, BufWriter<File>>, entry: &LogEntry) {
    if !streams.contains_key(&entry.entity) {
        let path = stream_path(dir, &entry.entity);
        if let Some(parent) = path.parent() {
            if let Err(e) = create_dir_all(parent) {
                error!("[LogSink] cannot create {:?}: {}", parent, e);
                return;
            }
        }
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                streams.insert(entry.entity.clone(), BufWriter::new(file));
            }
            Err(e) => {
                error!("[LogSink] cannot open {:?}: {}", path, e);
                return;
            }
        }
    }
    if let Some(stream) = streams.get_mut(&entry.entity) {
        let line = format!(
            "{} [{}] {}\n",
            entry.ts.format("%Y-%m-%d %H:%M:%S%.3f"),
            entry.level,
            entry.message
        );
        stream.write_all(line.as_bytes()).ok();
    }
}
