//! Run metrics computed from a store snapshot.
//!
//! - **Stats:** min/max/mean over any column.
//! - **RunSummary:** tracking quality of the rows before the engine cursor
//!   (mean/max absolute error, integral of absolute error, final measured value).

use serde::Serialize;

use crate::control::sample::Sample;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

/// Computes min, max, mean; `None` for an empty input.
pub fn calculate_stats<I: IntoIterator<Item = f64>>(data: I) -> Option<Stats> {
    let mut count = 0usize;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;

    for v in data {
        count += 1;
        min = min.min(v);
        max = max.max(v);
        sum += v;
    }

    if count == 0 {
        return None;
    }
    Some(Stats {
        min,
        max,
        mean: sum / count as f64,
        count,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RunSummary {
    pub rows: usize,
    pub processed: usize,
    pub mean_abs_error: f64,
    pub max_abs_error: f64,
    /// Integral of absolute error, Σ|e|·dt over processed rows.
    pub iae: f64,
    pub final_measured: Option<f64>,
}

impl RunSummary {
    /// Summarises the rows before `cursor`, the ones the engine has written.
    /// Rows past it count towards `rows` only, even if they arrived with an
    /// error value on the wire.
    pub fn from_samples(samples: &[Sample], cursor: usize, dt: f64) -> Self {
        let done = &samples[..cursor.min(samples.len())];
        let stats = calculate_stats(done.iter().filter_map(|s| s.error).map(f64::abs));
        let step = if dt > 0.0 { dt } else { 0.0 };

        let (mean_abs_error, max_abs_error, iae) = match stats {
            Some(s) => (s.mean, s.max, s.mean * s.count as f64 * step),
            None => (0.0, 0.0, 0.0),
        };

        Self {
            rows: samples.len(),
            processed: done.len(),
            mean_abs_error,
            max_abs_error,
            iae,
            final_measured: done.last().map(|s| s.measured),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_of_empty_input_is_none() {
        assert!(calculate_stats(std::iter::empty()).is_none());
    }

    #[test]
    fn stats_cover_min_max_mean() {
        let s = calculate_stats([2.0, -1.0, 5.0]).unwrap();
        assert_eq!((s.min, s.max, s.count), (-1.0, 5.0, 3));
        assert!((s.mean - 2.0).abs() < 1e-12);
    }

    #[test]
    fn summary_stops_at_the_engine_cursor() {
        let samples = [
            Sample::new(0.0, 50.0, 41.0).with_error(10.0),
            Sample::new(0.1, 50.0, 48.0).with_error(-2.0),
            Sample::new(0.2, 50.0, 30.0),
        ];
        let summary = RunSummary::from_samples(&samples, 2, 0.1);

        assert_eq!(summary.rows, 3);
        assert_eq!(summary.processed, 2);
        assert!((summary.mean_abs_error - 6.0).abs() < 1e-12);
        assert_eq!(summary.max_abs_error, 10.0);
        assert!((summary.iae - 1.2).abs() < 1e-12);
        assert_eq!(summary.final_measured, Some(48.0));
    }

    #[test]
    fn ingested_error_column_is_not_counted_as_processed() {
        // Second row came off the wire with its own error value.
        let samples = [
            Sample::new(0.0, 50.0, 41.0).with_error(10.0),
            Sample::new(0.1, 50.0, 49.5).with_error(0.5),
        ];
        let summary = RunSummary::from_samples(&samples, 1, 0.1);

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.max_abs_error, 10.0);
        assert_eq!(summary.final_measured, Some(41.0));
    }

    #[test]
    fn summary_of_fresh_rows_is_empty() {
        let summary = RunSummary::from_samples(&[Sample::new(0.0, 1.0, 0.0)], 0, 0.1);
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.final_measured, None);
        assert_eq!(summary.iae, 0.0);
    }

    #[test]
    fn cursor_past_the_end_is_clamped() {
        let samples = [Sample::new(0.0, 1.0, 0.5).with_error(0.5)];
        let summary = RunSummary::from_samples(&samples, 10, 0.1);
        assert_eq!(summary.processed, 1);
    }
}
