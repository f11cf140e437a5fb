// Utilities: run metrics and CSV export of the time series.
pub mod metrics;
pub mod export;
