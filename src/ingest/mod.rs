//! Ingestion side: TCP listener, per-connection handlers, line framing.

pub mod framing;
pub mod server;

pub use framing::LineBuffer;
pub use server::IngestServer;
