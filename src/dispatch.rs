//! dispatch.rs
//! Fire-and-forget summary dispatch: one fresh TCP connection per summary,
//! exactly one newline-terminated JSON document, close. No retry, no
//! batching. Failures propagate to the aggregation loop, which logs and
//! swallows them.

use std::{io::Write, net::TcpStream};

use thiserror::Error;

use crate::telemetry::SummaryPayload;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("summary encode failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("transport failed: {0}")]
    Transport(#[from] std::io::Error),
}

/// Seam between the aggregation loop and the wire, so the flush path can be
/// exercised against an in-memory sink.
pub trait SummarySink: Send + Sync {
    fn send(&self, summary: &SummaryPayload) -> Result<(), DispatchError>;
}

pub struct CentralClient {
    addr: String,
}

impl CentralClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl SummarySink for CentralClient {
    fn send(&self, summary: &SummaryPayload) -> Result<(), DispatchError> {
        let mut line = serde_json::to_string(summary)?;
        line.push('\n');
        let mut stream = TcpStream::connect(&self.addr)?;
        stream.write_all(line.as_bytes())?;
        Ok(())
        // Connection closes on drop; the collector needs no acknowledgment.
    }
}
