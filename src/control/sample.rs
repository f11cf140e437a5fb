//! sample.rs
//! One row of the pendulum time series.

use serde::Serialize;

use crate::control::gains::EffectiveGains;

/// Time-series row shared by the local control loop and the telemetry feed.
///
/// `error` stays `None` until the engine processes the row, unless the
/// telemetry record already carried one. `p`, `i`, `d` are the gains attached
/// to the row, not values computed from it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Sample {
    pub time: f64,
    pub setpoint: f64,
    pub measured: f64,
    pub error: Option<f64>,
    pub p: f64,
    pub i: f64,
    pub d: f64,
}

impl Sample {
    pub fn new(time: f64, setpoint: f64, measured: f64) -> Self {
        Self {
            time,
            setpoint,
            measured,
            ..Self::default()
        }
    }

    pub fn with_gains(mut self, gains: EffectiveGains) -> Self {
        self.p = gains.kp;
        self.i = gains.ki;
        self.d = gains.kd;
        self
    }

    pub fn with_error(mut self, error: f64) -> Self {
        self.error = Some(error);
        self
    }

    /// Set by the engine, or carried in on the wire.
    #[inline]
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}
