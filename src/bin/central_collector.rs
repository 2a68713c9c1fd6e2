//! Central collector: terminal sink for the summary wire protocol. Accepts
//! connections from the hub's dispatch client, frames newline-delimited JSON,
//! and logs every summary it receives. Sends no acknowledgments; malformed
//! lines warn and the connection continues.
//!
//! Listens on `HUB_CENTRAL_ADDR` (default 127.0.0.1:4000); streams land under
//! `HUB_LOG_DIR`.

use std::{io::Read, net::TcpStream, sync::Arc, thread};

use drone_hub::{
    config::Config,
    ingest::LineBuffer,
    logsink::{Level, LogSink},
    telemetry::SummaryPayload,
};
use log::{error, info};
use socket2::{Domain, SockAddr, Socket, Type};

const COLLECTOR_STREAM: &str = "central_server";

fn main() {
    env_logger::init();

    let config = Config::from_env();
    let sink = match LogSink::start(&config.log_dir) {
        Ok(sink) => Arc::new(sink),
        Err(e) => {
            error!("Failed to start log sink: {}", e);
            return;
        }
    };

    let addr: std::net::SocketAddr = match config.central_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Bad central address {}: {}", config.central_addr, e);
            return;
        }
    };
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };
    let listener: std::net::TcpListener = match Socket::new(domain, Type::STREAM, None)
        .and_then(|socket| {
            socket.set_reuse_address(true).ok();
            socket.bind(&SockAddr::from(addr))?;
            socket.listen(128)?;
            Ok(socket.into())
        }) {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", config.central_addr, e);
            return;
        }
    };

    info!("Central collector listening on {}", config.central_addr);
    sink.emit(
        COLLECTOR_STREAM,
        Level::Info,
        format!("Central collector listening on {}", config.central_addr),
    );

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let sink = sink.clone();
                thread::spawn(move || handle_connection(stream, sink));
            }
            Err(e) => error!("Accept error: {}", e),
        }
    }
}

fn handle_connection(mut stream: TcpStream, sink: Arc<LogSink>) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".into());
    sink.emit(
        COLLECTOR_STREAM,
        Level::Info,
        format!("Connection from {peer}"),
    );

    let mut framing = LineBuffer::new();
    let mut chunk = [0u8; 1024];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                framing.extend(&chunk[..n]);
                while let Some(line) = framing.next_line() {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<SummaryPayload>(&line) {
                        Ok(summary) => {
                            let encoded = serde_json::to_string(&summary)
                                .unwrap_or_else(|_| "{}".into());
                            info!("Received summary: {}", encoded);
                            sink.emit(
                                COLLECTOR_STREAM,
                                Level::Info,
                                format!("Received summary: {encoded}"),
                            );
                        }
                        Err(e) => {
                            sink.emit(
                                COLLECTOR_STREAM,
                                Level::Warn,
                                format!("Invalid JSON from {peer}: {e} | line: {line}"),
                            );
                        }
                    }
                }
            }
            Err(_) => break,
        }
    }

    sink.emit(
        COLLECTOR_STREAM,
        Level::Info,
        format!("Connection closed from {peer}"),
    );
}
