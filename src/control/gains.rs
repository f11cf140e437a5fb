//! gains.rs
//! PID gain configuration: the per-run frozen snapshot and the operator-side
//! range mapping it is built from.
//!
//! - `GainRange` turns min/max text plus a 0..=100 slider position into a gain.
//! - `AxisControl` is the live, editable state of one axis.
//! - `PidConfig` is captured from the three controls when a run starts and is
//!   never re-read during the run.

use serde::Serialize;

pub const DEFAULT_MIN: f64 = 0.0;
pub const DEFAULT_MAX: f64 = 1.0;
pub const SLIDER_MAX: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    P,
    I,
    D,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::P, Axis::I, Axis::D];

    pub fn name(&self) -> &'static str {
        match self {
            Axis::P => "P",
            Axis::I => "I",
            Axis::D => "D",
        }
    }

    pub fn parse(text: &str) -> Option<Axis> {
        match text.trim().to_ascii_uppercase().as_str() {
            "P" => Some(Axis::P),
            "I" => Some(Axis::I),
            "D" => Some(Axis::D),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AxisConfig {
    pub enabled: bool,
    pub gain: f64,
}

impl AxisConfig {
    pub fn enabled(gain: f64) -> Self {
        Self { enabled: true, gain }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    /// Gain actually applied by the engine: zero when the axis is off.
    #[inline]
    pub fn effective(&self) -> f64 {
        if self.enabled { self.gain } else { 0.0 }
    }
}

/// Gains after the enable gate, as written into each processed row.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EffectiveGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

/// Immutable controller configuration for one run.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PidConfig {
    pub p: AxisConfig,
    pub i: AxisConfig,
    pub d: AxisConfig,
}

impl PidConfig {
    pub fn new(p: AxisConfig, i: AxisConfig, d: AxisConfig) -> Self {
        Self { p, i, d }
    }

    /// Freezes the current operator controls into a run snapshot.
    pub fn snapshot(p: &AxisControl, i: &AxisControl, d: &AxisControl) -> Self {
        Self {
            p: p.to_config(),
            i: i.to_config(),
            d: d.to_config(),
        }
    }

    pub fn axis(&self, axis: Axis) -> AxisConfig {
        match axis {
            Axis::P => self.p,
            Axis::I => self.i,
            Axis::D => self.d,
        }
    }

    pub fn effective_gains(&self) -> EffectiveGains {
        EffectiveGains {
            kp: self.p.effective(),
            ki: self.i.effective(),
            kd: self.d.effective(),
        }
    }
}

/// Min/max bounds of a gain slider. Always ordered `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainRange {
    min: f64,
    max: f64,
}

impl Default for GainRange {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN,
            max: DEFAULT_MAX,
        }
    }
}

impl GainRange {
    /// Builds a range, swapping the bounds when they arrive inverted.
    pub fn new(min: f64, max: f64) -> Self {
        if min > max {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    /// Parses operator text. Blank or unparsable bounds fall back to
    /// `DEFAULT_MIN` / `DEFAULT_MAX` before the swap check.
    pub fn from_text(min_text: &str, max_text: &str) -> Self {
        Self::new(
            parse_bound(min_text, DEFAULT_MIN),
            parse_bound(max_text, DEFAULT_MAX),
        )
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Slider position (clamped to 0..=100) to gain value.
    pub fn value_at(&self, position: u8) -> f64 {
        if self.min == self.max {
            return self.min;
        }
        let fraction = f64::from(position.min(SLIDER_MAX)) / f64::from(SLIDER_MAX);
        self.min + fraction * (self.max - self.min)
    }

    /// Gain value back to the nearest slider position at or below it.
    /// A degenerate range is binary: 0 up to `min`, 100 above it.
    pub fn position_for(&self, value: f64) -> u8 {
        if self.min == self.max {
            return if value <= self.min { 0 } else { SLIDER_MAX };
        }
        if value <= self.min {
            0
        } else if value >= self.max {
            SLIDER_MAX
        } else {
            let fraction = (value - self.min) / (self.max - self.min);
            (fraction * f64::from(SLIDER_MAX)) as u8
        }
    }
}

fn parse_bound(text: &str, fallback: f64) -> f64 {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(fallback)
}

/// Live state of one axis on the configuration surface.
///
/// The value is kept separately from the slider position so a typed value is
/// not quantised to the slider grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisControl {
    pub enabled: bool,
    range: GainRange,
    value: f64,
}

impl Default for AxisControl {
    fn default() -> Self {
        Self::new(true, GainRange::default(), 0)
    }
}

impl AxisControl {
    pub fn new(enabled: bool, range: GainRange, position: u8) -> Self {
        Self {
            enabled,
            range,
            value: range.value_at(position),
        }
    }

    pub fn range(&self) -> GainRange {
        self.range
    }

    /// Displayed value: zero while the axis is disabled.
    pub fn value(&self) -> f64 {
        if self.enabled { self.value } else { 0.0 }
    }

    pub fn position(&self) -> u8 {
        self.range.position_for(self.value)
    }

    pub fn set_position(&mut self, position: u8) {
        self.value = self.range.value_at(position);
    }

    /// Typed value path; ignored while disabled or when not a finite number.
    pub fn set_value_text(&mut self, text: &str) -> bool {
        if !self.enabled {
            return false;
        }
        match text.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => {
                self.value = v;
                true
            }
            _ => false,
        }
    }

    /// Changing bounds re-evaluates the value from the current slider position.
    pub fn set_range(&mut self, range: GainRange) {
        let position = self.position();
        self.range = range;
        self.value = range.value_at(position);
    }

    pub fn to_config(&self) -> AxisConfig {
        AxisConfig {
            enabled: self.enabled,
            gain: self.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverted_bounds_are_swapped() {
        let range = GainRange::new(5.0, 2.0);
        assert_eq!((range.min(), range.max()), (2.0, 5.0));
        assert_eq!(range.value_at(0), 2.0);
        assert_eq!(range.value_at(100), 5.0);
        assert_eq!(GainRange::from_text("5", "2"), range);
    }

    #[test]
    fn unparsable_bounds_take_defaults() {
        let range = GainRange::from_text("abc", "");
        assert_eq!((range.min(), range.max()), (DEFAULT_MIN, DEFAULT_MAX));

        // "NaN" parses as a float but is not a usable bound.
        let range = GainRange::from_text("NaN", "4");
        assert_eq!((range.min(), range.max()), (0.0, 4.0));
    }

    #[test]
    fn degenerate_range_is_binary_and_finite() {
        let range = GainRange::new(3.0, 3.0);
        for position in [0, 1, 50, 99, 100, 255] {
            let value = range.value_at(position);
            assert!(!value.is_nan());
            assert_eq!(value, 3.0);
        }
        assert_eq!(range.position_for(2.0), 0);
        assert_eq!(range.position_for(3.0), 0);
        assert_eq!(range.position_for(3.5), 100);
    }

    #[test]
    fn slider_maps_linearly_and_clamps() {
        let range = GainRange::new(0.0, 2.0);
        assert!((range.value_at(25) - 0.5).abs() < 1e-12);
        assert_eq!(range.value_at(200), 2.0);
        assert_eq!(range.position_for(-1.0), 0);
        assert_eq!(range.position_for(1.0), 50);
        assert_eq!(range.position_for(9.0), 100);
    }

    #[test]
    fn disabled_axis_contributes_zero_gain() {
        let p = AxisControl::new(true, GainRange::new(0.0, 2.0), 50);
        let mut i = AxisControl::new(true, GainRange::new(0.0, 1.0), 100);
        i.enabled = false;
        let d = AxisControl::new(true, GainRange::default(), 0);

        let config = PidConfig::snapshot(&p, &i, &d);
        let gains = config.effective_gains();

        assert_eq!(gains.kp, 1.0);
        assert_eq!(gains.ki, 0.0);
        assert_eq!(config.axis(Axis::I).gain, 1.0);
        assert_eq!(i.value(), 0.0);
    }

    #[test]
    fn range_change_keeps_slider_position() {
        let mut control = AxisControl::new(true, GainRange::new(0.0, 1.0), 40);
        control.set_range(GainRange::new(0.0, 10.0));
        assert!((control.value() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn typed_value_is_rejected_while_disabled() {
        let mut control = AxisControl::default();
        assert!(control.set_value_text("0.75"));
        assert_eq!(control.value(), 0.75);

        control.enabled = false;
        assert!(!control.set_value_text("0.25"));
        assert!(!AxisControl::default().set_value_text("fast"));
    }

    #[test]
    fn axis_names_parse_back() {
        for axis in Axis::ALL {
            assert_eq!(Axis::parse(axis.name()), Some(axis));
        }
        assert_eq!(Axis::parse(" i "), Some(Axis::I));
        assert_eq!(Axis::parse("x"), None);
    }
}
