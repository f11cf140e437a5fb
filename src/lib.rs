//! # Pendulum PID Control Engine
//!
//! Discrete PID loop over a shared, append-only time series, fed both by a
//! local periodic clock and by an external telemetry stream over TCP.
//!
//! ## Key Architecture
//! - **control:** `TimeSeriesStore` (mutex-guarded rows), `PidEngine` (one
//!   step per tick), `SimulationClock` (worker thread firing every `dt`).
//! - **telemetry:** newline-delimited JSON codec, `TelemetryIngestClient`
//!   (background reader appending to the store), `TelemetryServer`
//!   (single-peer synthetic source).
//! - **utils:** run summary and CSV export.
//!
//! ## Concurrency
//! - Store access is serialised by one lock held for a single call.
//! - The clock processes rows in cursor order; ingestion only appends, so it
//!   never reorders rows the clock has already processed.
//! - Both background threads stop cooperatively (flag or stop channel, then join).

pub mod config;
pub mod control;
pub mod error;
pub mod telemetry;
pub mod utils;

pub use control::{
    clock::{ClockEvent, ClockState, ControlLoop, SimulationClock},
    engine::{ControllerState, PidEngine, StepOutput, TickResult},
    gains::{Axis, AxisConfig, AxisControl, EffectiveGains, GainRange, PidConfig},
    sample::Sample,
    store::TimeSeriesStore,
};
pub use error::{ControlError, DecodeError, IngestError, StoreError};
pub use telemetry::{
    endpoint::Endpoint,
    ingest::{ConnectionState, IngestEvent, IngestHandle, IngestStats, TelemetryIngestClient},
    server::{SyntheticSource, TelemetryServer},
};
