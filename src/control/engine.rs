//! engine.rs
//! Discrete PID step over the shared time series.
//!
//! One `tick` processes the row at the cursor:
//! - error from setpoint and measured value
//! - integral accumulates every tick; the enable gate only zeroes its gain
//! - derivative degrades to 0.0 for `dt <= 0`
//! - the simulated process integrates the controller output (`measured += out * dt`)
//!
//! The engine has no timer. `clock.rs` decides when to call it.

use log::debug;

use crate::control::{
    gains::{EffectiveGains, PidConfig},
    sample::Sample,
    store::TimeSeriesStore,
};

/// Controller memory carried between ticks of a run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControllerState {
    pub previous_error: f64,
    pub integral_error: f64,
    /// Index of the next row to process.
    pub cursor: usize,
}

impl ControllerState {
    /// Clears the error memory but keeps the cursor (run restart after pause).
    pub fn rearm(&mut self) {
        self.previous_error = 0.0;
        self.integral_error = 0.0;
    }
}

/// Everything computed for one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutput {
    pub error: f64,
    pub integral_error: f64,
    pub derivative_error: f64,
    pub output: f64,
    pub measured: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickResult {
    Advanced { index: usize, step: StepOutput },
    /// Cursor is past the last row; nothing was touched.
    Done,
}

/// Pure controller arithmetic. Updates the error memory, not the cursor.
pub fn compute_step(
    gains: &EffectiveGains,
    state: &mut ControllerState,
    setpoint: f64,
    measured: f64,
    dt: f64,
) -> StepOutput {
    let error = setpoint - measured;

    state.integral_error += error * dt;
    let derivative_error = if dt > 0.0 {
        (error - state.previous_error) / dt
    } else {
        0.0
    };

    let output =
        gains.kp * error + gains.ki * state.integral_error + gains.kd * derivative_error;

    // No saturation: drift of the simulated process is left visible.
    let measured = measured + output * dt;

    state.previous_error = error;

    StepOutput {
        error,
        integral_error: state.integral_error,
        derivative_error,
        output,
        measured,
    }
}

/// Owns the controller state for the lifetime of a session.
#[derive(Debug, Default)]
pub struct PidEngine {
    state: ControllerState,
}

impl PidEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn rearm(&mut self) {
        self.state.rearm();
    }

    pub fn reset(&mut self) {
        self.state = ControllerState::default();
    }

    /// Advances one row. Reads and writes the store through two separate
    /// lock acquisitions; only appends can happen concurrently, so the row at
    /// the cursor cannot change in between.
    pub fn tick(&mut self, store: &TimeSeriesStore, config: &PidConfig, dt: f64) -> TickResult {
        let index = self.state.cursor;
        if index >= store.len() {
            return TickResult::Done;
        }

        let Ok(row) = store.get(index) else {
            // Store was cleared under us.
            return TickResult::Done;
        };

        let gains = config.effective_gains();
        let mut next = self.state;
        let step = compute_step(&gains, &mut next, row.setpoint, row.measured, dt);

        let updated = Sample {
            measured: step.measured,
            error: Some(step.error),
            ..row
        }
        .with_gains(gains);

        if store.set(index, updated).is_err() {
            return TickResult::Done;
        }

        next.cursor = index + 1;
        self.state = next;

        debug!(
            "[Engine] row={} err={:.4} out={:.4} measured={:.4}",
            index, step.error, step.output, step.measured
        );

        TickResult::Advanced { index, step }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::gains::AxisConfig;

    fn p_only(gain: f64) -> PidConfig {
        PidConfig::new(
            AxisConfig::enabled(gain),
            AxisConfig::disabled(),
            AxisConfig::disabled(),
        )
    }

    #[test]
    fn proportional_step_moves_measured_toward_setpoint() {
        let store = TimeSeriesStore::with_samples([Sample::new(0.0, 50.0, 40.0)]);
        let mut engine = PidEngine::new();

        let TickResult::Advanced { index, step } = engine.tick(&store, &p_only(1.0), 0.1) else {
            panic!("expected a processed row");
        };

        assert_eq!(index, 0);
        assert_eq!(step.error, 10.0);
        assert_eq!(step.output, 10.0);
        assert!((step.measured - 41.0).abs() < 1e-12);
        assert_eq!(engine.state().cursor, 1);

        let row = store.get(0).unwrap();
        assert_eq!(row.error, Some(10.0));
        assert!((row.measured - 41.0).abs() < 1e-12);
        assert_eq!((row.p, row.i, row.d), (1.0, 0.0, 0.0));

        assert_eq!(engine.tick(&store, &p_only(1.0), 0.1), TickResult::Done);
    }

    #[test]
    fn integral_accumulates_even_when_gated_off() {
        let gains = EffectiveGains::default();
        let mut state = ControllerState::default();
        for _ in 0..4 {
            compute_step(&gains, &mut state, 1.0, 0.0, 0.5);
        }
        assert!((state.integral_error - 2.0).abs() < 1e-12);
    }

    #[test]
    fn non_positive_dt_zeroes_derivative() {
        let gains = EffectiveGains { kp: 0.0, ki: 0.0, kd: 3.0 };
        let mut state = ControllerState {
            previous_error: -7.0,
            ..Default::default()
        };

        for dt in [0.0, -0.1] {
            let step = compute_step(&gains, &mut state, 10.0, 0.0, dt);
            assert_eq!(step.derivative_error, 0.0);
            assert_eq!(step.output, 0.0);
        }
    }

    #[test]
    fn done_leaves_store_untouched() {
        let store = TimeSeriesStore::new();
        let mut engine = PidEngine::new();
        let before = store.version();

        assert_eq!(engine.tick(&store, &p_only(1.0), 0.1), TickResult::Done);
        assert_eq!(store.version(), before);
        assert_eq!(engine.state(), ControllerState::default());
    }

    #[test]
    fn rearm_keeps_cursor() {
        let store = TimeSeriesStore::with_samples([
            Sample::new(0.0, 1.0, 0.0),
            Sample::new(0.1, 1.0, 0.0),
        ]);
        let mut engine = PidEngine::new();
        engine.tick(&store, &p_only(2.0), 0.1);
        engine.rearm();

        let state = engine.state();
        assert_eq!(state.cursor, 1);
        assert_eq!(state.integral_error, 0.0);
        assert_eq!(state.previous_error, 0.0);

        engine.reset();
        assert_eq!(engine.state().cursor, 0);
    }
}
