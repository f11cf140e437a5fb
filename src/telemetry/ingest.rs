//! ingest.rs
//! Background client that streams telemetry records into the shared store.
//!
//! - Single connection attempt per `run`/`spawn`; a refusal is reported, not retried.
//! - Reads carry a timeout so the cancel flag is checked between reads.
//! - Bytes go through `FrameDecoder`; each complete line is decoded on its own,
//!   and a bad line is logged and dropped without ending the connection.
//! - Decoded samples are appended to the store (one lock per append). Per-row
//!   progress is polled: `TimeSeriesStore::version()` and `IngestHandle::stats()`.
//! - The event channel carries lifecycle only, at most two events per run
//!   (`Connected`, then `Closed` or `Failed`), so a channel holding two events
//!   never drops one.

use std::{
    io::{self, ErrorKind, Read},
    net::{Shutdown, TcpStream, ToSocketAddrs},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam::channel::Sender;
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use crate::control::store::TimeSeriesStore;
use crate::error::{DecodeError, IngestError};
use crate::telemetry::{
    codec::{FrameDecoder, decode_record},
    endpoint::Endpoint,
};

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(200);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const READ_CHUNK: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Streaming,
    Closed,
    Errored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestEvent {
    Connected { peer: String },
    Closed,
    Failed(String),
}

/// Frame counters; readable live through the handle and returned on exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub frames: u64,
    pub appended: u64,
    pub decode_errors: u64,
}

pub struct TelemetryIngestClient {
    endpoint: Endpoint,
    store: TimeSeriesStore,
    events: Option<Sender<IngestEvent>>,
    read_timeout: Duration,
    state: Arc<Mutex<ConnectionState>>,
    stats: Arc<Mutex<IngestStats>>,
}

impl TelemetryIngestClient {
    pub fn new(endpoint: Endpoint, store: TimeSeriesStore) -> Self {
        Self {
            endpoint,
            store,
            events: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
            state: Arc::new(Mutex::new(ConnectionState::Idle)),
            stats: Arc::new(Mutex::new(IngestStats::default())),
        }
    }

    pub fn with_events(mut self, events: Sender<IngestEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.read_timeout = timeout;
        }
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    pub fn stats(&self) -> IngestStats {
        *self.stats.lock()
    }

    /// Moves the client onto its own thread.
    pub fn spawn(self) -> Result<IngestHandle, IngestError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let state = self.state.clone();
        let stats = self.stats.clone();
        let flag = cancel.clone();

        let worker = thread::Builder::new()
            .name("telemetry_ingest".into())
            .spawn(move || self.run(&flag))?;

        Ok(IngestHandle {
            cancel,
            state,
            stats,
            worker: Some(worker),
        })
    }

    /// Blocking ingestion loop. Returns when the peer closes, the connection
    /// fails, or `cancel` is observed between reads.
    pub fn run(&self, cancel: &AtomicBool) -> Result<IngestStats, IngestError> {
        self.set_state(ConnectionState::Connecting);
        *self.stats.lock() = IngestStats::default();
        let mut stream = match self.connect() {
            Ok(stream) => stream,
            Err(e) => {
                error!("[Ingest] {}", e);
                self.set_state(ConnectionState::Errored);
                self.emit(IngestEvent::Failed(e.to_string()));
                return Err(e);
            }
        };

        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| self.endpoint.to_string());
        if let Err(e) = stream.set_read_timeout(Some(self.read_timeout)) {
            warn!("[Ingest] cannot set read timeout: {}", e);
        }

        info!("[Ingest] connected to {}", peer);
        self.set_state(ConnectionState::Streaming);
        self.emit(IngestEvent::Connected { peer });

        let mut decoder = FrameDecoder::new();
        let mut buf = [0u8; READ_CHUNK];

        while !cancel.load(Ordering::Acquire) {
            match stream.read(&mut buf) {
                Ok(0) => {
                    if let Some(frame) = decoder.finish() {
                        self.handle_frame(frame);
                    }
                    let stats = self.stats();
                    info!("[Ingest] peer closed the stream ({} rows appended)", stats.appended);
                    self.set_state(ConnectionState::Closed);
                    self.emit(IngestEvent::Closed);
                    return Ok(stats);
                }
                Ok(n) => {
                    for frame in decoder.push(&buf[..n]) {
                        self.handle_frame(frame);
                    }
                }
                Err(e) if is_retryable(&e) => continue,
                Err(e) => {
                    let err = if is_disconnect(&e) {
                        IngestError::ConnectionClosed
                    } else {
                        IngestError::Io(e)
                    };
                    error!("[Ingest] {}", err);
                    self.set_state(ConnectionState::Errored);
                    self.emit(IngestEvent::Failed(err.to_string()));
                    return Err(err);
                }
            }
        }

        let stats = self.stats();
        info!("[Ingest] cancelled ({} rows appended)", stats.appended);
        let _ = stream.shutdown(Shutdown::Both);
        self.set_state(ConnectionState::Closed);
        self.emit(IngestEvent::Closed);
        Ok(stats)
    }

    fn connect(&self) -> Result<TcpStream, IngestError> {
        info!("[Ingest] connecting to {}", self.endpoint);
        let addrs = (self.endpoint.host.as_str(), self.endpoint.port).to_socket_addrs()?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }

        Err(match last_err {
            Some(e) if e.kind() == ErrorKind::ConnectionRefused => IngestError::ConnectionRefused {
                addr: self.endpoint.to_string(),
            },
            Some(e) => IngestError::Io(e),
            None => IngestError::Io(io::Error::new(
                ErrorKind::AddrNotAvailable,
                format!("{} did not resolve", self.endpoint),
            )),
        })
    }

    fn handle_frame(&self, frame: Result<Vec<u8>, DecodeError>) {
        let mut stats = self.stats.lock();
        stats.frames += 1;
        match frame.and_then(|bytes| decode_record(&bytes)) {
            Ok(sample) => {
                let index = self.store.append(sample);
                stats.appended += 1;
                debug!("[Ingest] row {} t={:.2}", index, sample.time);
            }
            Err(e) => {
                stats.decode_errors += 1;
                warn!("[Ingest] discarding frame: {}", e);
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.lock() = state;
    }

    fn emit(&self, event: IngestEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.try_send(event);
        }
    }
}

fn is_retryable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
    )
}

/// Owner-side handle of a running ingestion thread.
pub struct IngestHandle {
    cancel: Arc<AtomicBool>,
    state: Arc<Mutex<ConnectionState>>,
    stats: Arc<Mutex<IngestStats>>,
    worker: Option<JoinHandle<Result<IngestStats, IngestError>>>,
}

impl IngestHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Counters so far; the loop updates them frame by frame.
    pub fn stats(&self) -> IngestStats {
        *self.stats.lock()
    }

    pub fn is_finished(&self) -> bool {
        self.worker.as_ref().is_none_or(|w| w.is_finished())
    }

    /// Signals the loop and waits for it to exit. Worst-case latency is one
    /// read timeout.
    pub fn stop(mut self) -> Result<IngestStats, IngestError> {
        self.cancel.store(true, Ordering::Release);
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| IngestError::WorkerPanicked)?,
            None => Ok(IngestStats::default()),
        }
    }
}

impl Drop for IngestHandle {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
