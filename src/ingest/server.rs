//! server.rs
//! TCP ingestion server: accepts sensor connections, frames newline-delimited
//! JSON, and pushes decoded readings onto the shared unbounded queue.
//! - one handler thread per connection; a stalled sender only occupies its own
//!   thread
//! - a malformed line is discarded and logged, the connection stays open
//! - EOF or a transport error closes the connection; reconnection is the
//!   sender's responsibility

use std::{
    io::Read,
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use crossbeam::channel::Sender;
use log::{error, info};
use socket2::{Domain, SockAddr, Socket, Type};

use crate::hub::Hub;
use crate::ingest::framing::LineBuffer;
use crate::logsink::Level;
use crate::telemetry::{Reading, decode_line};

/// Log sink stream carrying connection-level events.
pub const SERVER_STREAM: &str = "main_server";

const READ_CHUNK: usize = 1024;

pub struct IngestServer {
    listener: TcpListener,
    tx: Sender<Reading>,
    hub: Arc<Hub>,
}

impl IngestServer {
    /// Bind the listen socket with SO_REUSEADDR (and SO_REUSEPORT on unix).
    pub fn bind(addr: &str, tx: Sender<Reading>, hub: Arc<Hub>) -> std::io::Result<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::STREAM, None)?;
        socket.set_reuse_address(true).ok();
        #[cfg(unix)]
        {
            socket.set_reuse_port(true).ok();
        }
        socket.bind(&SockAddr::from(addr))?;
        socket.listen(128)?;

        Ok(Self {
            listener: socket.into(),
            tx,
            hub,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop: one spawned handler thread per connection. Runs until the
    /// running flag clears or the listener fails.
    pub fn run(&self, running: Arc<AtomicBool>) {
        info!(
            "[IngestServer] listening on {}",
            self.local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "?".into())
        );

        for stream in self.listener.incoming() {
            if !running.load(Ordering::Relaxed) {
                break;
            }
            match stream {
                Ok(stream) => {
                    let tx = self.tx.clone();
                    let hub = self.hub.clone();
                    thread::spawn(move || handle_client(stream, tx, hub));
                }
                Err(e) => {
                    error!("[IngestServer] accept error: {}", e);
                }
            }
        }

        info!("[IngestServer] exiting accept loop");
    }
}

fn handle_client(mut stream: TcpStream, tx: Sender<Reading>, hub: Arc<Hub>) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".into());
    hub.sink.emit(
        SERVER_STREAM,
        Level::Info,
        format!("Connection established from {peer}"),
    );

    let mut framing = LineBuffer::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                framing.extend(&chunk[..n]);
                while let Some(line) = framing.next_line() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match decode_line(&line) {
                        Ok(reading) => {
                            hub.sink.emit(
                                SERVER_STREAM,
                                Level::Info,
                                format!("Enqueued reading from {}", reading.sensor_id),
                            );
                            if tx.send(reading).is_err() {
                                // Worker side is gone; nothing left to feed.
                                return;
                            }
                        }
                        Err(e) => {
                            hub.sink.emit(
                                SERVER_STREAM,
                                Level::Warn,
                                format!("Decode error: {e} | line: {line}"),
                            );
                        }
                    }
                }
            }
            Err(e) => {
                hub.sink.emit(
                    SERVER_STREAM,
                    Level::Warn,
                    format!("Connection lost from {peer}: {e}"),
                );
                break;
            }
        }
    }

    hub.sink.emit(
        SERVER_STREAM,
        Level::Info,
        format!("Connection closed from {peer}"),
    );
}
