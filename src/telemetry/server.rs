//! server.rs
//! Single-peer synthetic telemetry source.
//!
//! Binds with `socket2` (SO_REUSEADDR so a restarted server can rebind while
//! the old socket sits in TIME_WAIT), accepts exactly one client and then
//! releases one record per interval on a fixed schedule.
//!
//! The record's `Time` field advances 0.1 per step regardless of the real
//! emission interval; the two are unrelated.

use std::{
    io::{self, ErrorKind, Write},
    net::{SocketAddr, TcpListener, ToSocketAddrs},
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use spin_sleep::{SpinSleeper, SpinStrategy};

use crate::control::sample::Sample;
use crate::telemetry::{codec::encode_frame, endpoint::Endpoint};

pub const EMIT_INTERVAL: Duration = Duration::from_secs(1);

const TIME_STEP: f64 = 0.1;
const SETPOINT: f64 = 50.0;
const MEASURED_DROP_PER_STEP: f64 = 0.5;
const SOURCE_P: f64 = 0.1;
const SOURCE_I: f64 = 0.05;
const SOURCE_D: f64 = 0.01;

/// Deterministic ramp away from a constant setpoint.
#[derive(Debug, Clone, Default)]
pub struct SyntheticSource {
    step: u64,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_at(step: u64) -> Sample {
        let s = step as f64;
        Sample {
            time: s * TIME_STEP,
            setpoint: SETPOINT,
            measured: SETPOINT - s * MEASURED_DROP_PER_STEP,
            error: Some(s * MEASURED_DROP_PER_STEP),
            p: SOURCE_P,
            i: SOURCE_I,
            d: SOURCE_D,
        }
    }
}

impl Iterator for SyntheticSource {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        let sample = Self::record_at(self.step);
        self.step += 1;
        Some(sample)
    }
}

pub struct TelemetryServer {
    listener: TcpListener,
}

impl TelemetryServer {
    pub fn bind(endpoint: &Endpoint) -> io::Result<Self> {
        let addr = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| {
                io::Error::new(ErrorKind::InvalidInput, format!("{} did not resolve", endpoint))
            })?;

        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&SockAddr::from(addr))?;
        // One client only.
        socket.listen(1)?;

        let listener: TcpListener = socket.into();
        info!("[Server] listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts one client and streams to it until it disconnects or `limit`
    /// records have been sent. Returns the number of records written.
    pub fn serve_one(self, interval: Duration, limit: Option<u64>) -> io::Result<u64> {
        let (mut conn, peer) = self.listener.accept()?;
        info!("[Server] client connected from {}", peer);
        if let Err(e) = conn.set_nodelay(true) {
            warn!("[Server] cannot disable Nagle: {}", e);
        }

        let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
        let mut next_release = Instant::now();
        let mut sent: u64 = 0;

        for sample in SyntheticSource::new() {
            if limit.is_some_and(|max| sent >= max) {
                break;
            }

            let now = Instant::now();
            if now < next_release {
                sleeper.sleep(next_release - now);
            }

            let frame = encode_frame(&sample).map_err(io::Error::other)?;
            match conn.write_all(&frame) {
                Ok(()) => {
                    sent += 1;
                    debug!("[Server] sent t={:.1} measured={:.1}", sample.time, sample.measured);
                }
                Err(e) if is_peer_gone(&e) => {
                    info!("[Server] client {} disconnected after {} records", peer, sent);
                    return Ok(sent);
                }
                Err(e) => return Err(e),
            }

            next_release += interval;
        }

        info!("[Server] stream finished after {} records", sent);
        Ok(sent)
    }
}

fn is_peer_gone(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::BrokenPipe | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted
    )
}
