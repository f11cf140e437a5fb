// Control side: local PID loop over the shared time series.
// Holds the data store, the gain configuration, the discrete engine
// and the periodic clock that drives it.

pub mod sample;
pub mod store;
pub mod gains;
pub mod engine;
pub mod clock;
