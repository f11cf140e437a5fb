//! Error taxonomy for the control engine and the telemetry path.
//!
//! - **StoreError:** index access past the end of the time series.
//! - **ControlError:** run lifecycle refusals (empty store, double start).
//! - **IngestError:** transport failures; these end the ingestion thread only.
//! - **DecodeError:** a single bad frame; logged and skipped by the caller.

use std::io;

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlError {
    /// Run start attempted against an empty store.
    #[error("no samples loaded, nothing to run")]
    NoData,

    #[error("clock is already running")]
    AlreadyRunning,

    #[error("failed to spawn clock worker: {0}")]
    Worker(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("connection refused by {addr}")]
    ConnectionRefused { addr: String },

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("ingestion worker panicked")]
    WorkerPanicked,

    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("payload is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("payload is not a telemetry record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLong { len: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("export io failed: {0}")]
    Io(#[from] io::Error),
}
