//! Sensor node simulator: emits one randomized reading every 2 seconds to the
//! ingestion server, reconnecting with exponential backoff when the hub is
//! away. Values are uniform over the nominal ranges, so threshold anomalies
//! only appear at the boundaries; the hub's discrepancy window does the
//! interesting work.
//!
//! Usage: `sensor_sim [--host 127.0.0.1] [--port 5000] [--sensor-id drone_1_env]`

use std::{
    io::Write,
    net::{TcpStream, ToSocketAddrs},
    thread,
    time::Duration,
};

use chrono::Utc;
use drone_hub::telemetry::Reading;
use log::{info, warn};
use rand::random_range;
use spin_sleep::{SpinSleeper, SpinStrategy};

const SEND_INTERVAL: Duration = Duration::from_secs(2);
const INITIAL_BACKOFF_SECS: u64 = 1;
const MAX_BACKOFF_SECS: u64 = 16;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const MOTOR_COUNT: usize = 4;

fn generate_reading(sensor_id: &str) -> Reading {
    Reading {
        sensor_id: sensor_id.to_string(),
        drone_id: None,
        timestamp: Some(Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        temperature: Some(random_range(-10.0..60.0)),
        pressure: Some(random_range(300.0..1100.0)),
        altitude: Some(random_range(0.0..500.0)),
        humidity: Some(random_range(10.0..90.0)),
        motor_energies: Some((0..MOTOR_COUNT).map(|_| random_range(0.0..100.0)).collect()),
    }
}

fn connect(host: &str, port: u16) -> std::io::Result<TcpStream> {
    let addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no address"))?;
    TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
}

fn main() {
    env_logger::init();

    let mut host = "127.0.0.1".to_string();
    let mut port = 5000u16;
    let mut sensor_id = "drone_1_env".to_string();

    let mut args = std::env::args().skip(1);
    while let Some(flag) = args.next() {
        match flag.as_str() {
            "--host" => host = args.next().unwrap_or(host),
            "--port" => {
                port = args
                    .next()
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(port)
            }
            "--sensor-id" => sensor_id = args.next().unwrap_or(sensor_id),
            other => {
                eprintln!("Unrecognized option '{}', ignoring", other);
            }
        }
    }

    info!("Sensor {} started. Target = {}:{}", sensor_id, host, port);

    let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
    let mut backoff = INITIAL_BACKOFF_SECS;
    let mut sock: Option<TcpStream> = None;

    loop {
        if sock.is_none() {
            match connect(&host, port) {
                Ok(stream) => {
                    info!("Connected to hub at {}:{}", host, port);
                    backoff = INITIAL_BACKOFF_SECS;
                    sock = Some(stream);
                }
                Err(e) => {
                    warn!("Couldn't connect ({}), retrying in {}s", e, backoff);
                    thread::sleep(Duration::from_secs(backoff));
                    backoff = (backoff * 2).min(MAX_BACKOFF_SECS);
                    continue;
                }
            }
        }
        let Some(stream) = sock.as_mut() else {
            continue;
        };

        let reading = generate_reading(&sensor_id);
        let mut line = match serde_json::to_string(&reading) {
            Ok(line) => line,
            Err(e) => {
                warn!("Encode failed: {}", e);
                continue;
            }
        };
        line.push('\n');

        if let Err(e) = stream.write_all(line.as_bytes()) {
            warn!("Connection lost ({}), reconnecting", e);
            sock = None;
            continue;
        }
        info!("Sent data: {}", line.trim_end());

        sleeper.sleep(SEND_INTERVAL);
    }
}
