//! clock.rs
//! Periodic scheduler that drives the PID engine while a run is active.
//!
//! - `ControlLoop` is the timer-free part: frozen config, engine state, `dt`.
//!   Hosts with their own timer (UI loop, tests) call `fire()` directly.
//! - `SimulationClock` owns a worker thread that fires the loop once per `dt`
//!   using a crossbeam `tick` channel, so `pause()` stops further ticks at once
//!   instead of waiting out a sleep.
//! - Lifecycle events go out on an unbounded channel. Only operator actions and
//!   run completion produce one, so nothing is dropped when the observer drains
//!   late. Per-tick progress is polled through `controller_state()` or
//!   `TimeSeriesStore::version()`.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam::channel::{Receiver, Sender, bounded, select, tick, unbounded};
use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::control::{
    engine::{ControllerState, PidEngine, TickResult},
    gains::PidConfig,
    store::TimeSeriesStore,
};
use crate::error::ControlError;

pub const DEFAULT_DT_SECS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    Started,
    /// Stopped by the operator; state kept for resume.
    Paused,
    /// Stopped because the engine ran out of rows.
    RunComplete,
    Reset,
}

/// One run's worth of controller state, without any notion of time.
#[derive(Debug)]
pub struct ControlLoop {
    engine: PidEngine,
    config: Option<PidConfig>,
    dt: f64,
}

impl ControlLoop {
    pub fn new(dt: f64) -> Self {
        Self {
            engine: PidEngine::new(),
            config: None,
            dt,
        }
    }

    /// Freezes `config` for the run and clears the error memory.
    pub fn arm(&mut self, config: PidConfig) {
        self.config = Some(config);
        self.engine.rearm();
    }

    /// Without an armed config there is nothing to run.
    pub fn fire(&mut self, store: &TimeSeriesStore) -> TickResult {
        match self.config {
            Some(config) => self.engine.tick(store, &config, self.dt),
            None => TickResult::Done,
        }
    }

    pub fn reset(&mut self) {
        self.engine.reset();
        self.config = None;
    }

    pub fn config(&self) -> Option<PidConfig> {
        self.config
    }

    pub fn state(&self) -> ControllerState {
        self.engine.state()
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }
}

pub struct SimulationClock {
    store: TimeSeriesStore,
    control: Arc<Mutex<ControlLoop>>,
    running: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
    events: Sender<ClockEvent>,
    period: Duration,
}

impl SimulationClock {
    /// Returns the clock and the receiving end of its event stream.
    pub fn new(store: TimeSeriesStore, dt_secs: f64) -> (Self, Receiver<ClockEvent>) {
        let (events, rx) = unbounded();
        // The engine sees the configured dt as-is; only the timer needs a
        // usable positive period.
        let period = match Duration::try_from_secs_f64(dt_secs) {
            Ok(p) if !p.is_zero() => p,
            _ => {
                warn!(
                    "[Clock] dt {} is not a usable timer period, ticking every {} s",
                    dt_secs, DEFAULT_DT_SECS
                );
                Duration::from_secs_f64(DEFAULT_DT_SECS)
            }
        };

        let clock = Self {
            store,
            control: Arc::new(Mutex::new(ControlLoop::new(dt_secs))),
            running: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            worker: None,
            events,
            period,
        };
        (clock, rx)
    }

    pub fn state(&self) -> ClockState {
        if self.running.load(Ordering::Acquire) {
            ClockState::Running
        } else {
            ClockState::Stopped
        }
    }

    pub fn controller_state(&self) -> ControllerState {
        self.control.lock().state()
    }

    pub fn config(&self) -> Option<PidConfig> {
        self.control.lock().config()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn start(&mut self, config: PidConfig) -> Result<(), ControlError> {
        if self.state() == ClockState::Running {
            return Err(ControlError::AlreadyRunning);
        }
        if self.store.is_empty() {
            warn!("[Clock] start refused: store is empty");
            return Err(ControlError::NoData);
        }

        // A run that completed on its own leaves a finished worker behind.
        self.join_worker();

        self.control.lock().arm(config);
        self.running.store(true, Ordering::Release);

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let store = self.store.clone();
        let control = self.control.clone();
        let running = self.running.clone();
        let events = self.events.clone();
        let period = self.period;

        let handle = thread::Builder::new()
            .name("sim_clock".into())
            .spawn(move || run_worker(store, control, running, events, stop_rx, period))
            .map_err(|e| {
                self.running.store(false, Ordering::Release);
                ControlError::Worker(e.to_string())
            })?;

        self.stop_tx = Some(stop_tx);
        self.worker = Some(handle);
        info!(
            "[Clock] run started at cursor {} (period {:?})",
            self.controller_state().cursor,
            self.period
        );
        Ok(())
    }

    /// Stops firing; cursor and config survive for a later `start`.
    pub fn pause(&mut self) {
        let was_running = self.running.swap(false, Ordering::AcqRel);
        self.join_worker();
        if was_running {
            info!("[Clock] paused at cursor {}", self.controller_state().cursor);
            let _ = self.events.send(ClockEvent::Paused);
        }
    }

    /// Stops firing and discards everything from the run, including the rows.
    pub fn reset(&mut self) {
        self.running.store(false, Ordering::Release);
        self.join_worker();
        self.control.lock().reset();
        self.store.clear();
        info!("[Clock] reset");
        let _ = self.events.send(ClockEvent::Reset);
    }

    fn join_worker(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.try_send(());
        }
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("[Clock] worker panicked");
            }
        }
    }
}

impl Drop for SimulationClock {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.join_worker();
    }
}

fn run_worker(
    store: TimeSeriesStore,
    control: Arc<Mutex<ControlLoop>>,
    running: Arc<AtomicBool>,
    events: Sender<ClockEvent>,
    stop_rx: Receiver<()>,
    period: Duration,
) {
    let _ = events.send(ClockEvent::Started);
    let ticker = tick(period);

    while running.load(Ordering::Acquire) {
        select! {
            recv(stop_rx) -> _ => break,
            recv(ticker) -> _ => {
                if !running.load(Ordering::Acquire) {
                    break;
                }
                let result = control.lock().fire(&store);
                if result == TickResult::Done {
                    running.store(false, Ordering::Release);
                    info!("[Clock] run complete");
                    let _ = events.send(ClockEvent::RunComplete);
                    break;
                }
            }
        }
    }

    debug!("[Clock] worker exiting");
}
