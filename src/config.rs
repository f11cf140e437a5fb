//! Session configuration loaded from TOML.
//!
//! Every field has a default, so a missing file or a partial file is fine.
//! Gain bounds are kept as text and go through `GainRange::from_text`, the same
//! swap-or-default path as operator input.
//!
//! ```toml
//! [clock]
//! dt_secs = 0.1
//!
//! [telemetry]
//! host = "127.0.0.1"
//! port = 5000
//! emit_interval_ms = 1000
//!
//! [gains.p]
//! enabled = true
//! min = "0"
//! max = "2"
//! position = 50
//! ```

use std::{fs, io::ErrorKind, path::Path, time::Duration};

use log::{info, warn};
use serde::Deserialize;

use crate::control::{
    clock::DEFAULT_DT_SECS,
    gains::{AxisControl, GainRange, PidConfig},
};
use crate::error::ConfigError;
use crate::telemetry::{
    endpoint::{DEFAULT_HOST, DEFAULT_PORT, Endpoint},
    ingest::DEFAULT_READ_TIMEOUT,
    server::EMIT_INTERVAL,
};

pub const CONFIG_ENV: &str = "PENDULUM_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "pendulum.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub clock: ClockSettings,
    pub telemetry: TelemetrySettings,
    pub gains: GainSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    pub dt_secs: f64,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            dt_secs: DEFAULT_DT_SECS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    pub host: String,
    pub port: u16,
    pub emit_interval_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            emit_interval_ms: EMIT_INTERVAL.as_millis() as u64,
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
        }
    }
}

impl TelemetrySettings {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::from_operator(&self.host, &self.port.to_string())
    }

    pub fn emit_interval(&self) -> Duration {
        Duration::from_millis(self.emit_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AxisSettings {
    pub enabled: bool,
    pub min: String,
    pub max: String,
    pub position: u8,
}

impl AxisSettings {
    fn at(position: u8) -> Self {
        Self {
            enabled: true,
            min: "0".into(),
            max: "1".into(),
            position,
        }
    }

    pub fn to_control(&self) -> AxisControl {
        AxisControl::new(
            self.enabled,
            GainRange::from_text(&self.min, &self.max),
            self.position,
        )
    }
}

impl Default for AxisSettings {
    fn default() -> Self {
        Self::at(0)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GainSettings {
    pub p: AxisSettings,
    pub i: AxisSettings,
    pub d: AxisSettings,
}

impl Default for GainSettings {
    fn default() -> Self {
        // Proportional-only out of the box.
        Self {
            p: AxisSettings::at(100),
            i: AxisSettings::at(0),
            d: AxisSettings::at(0),
        }
    }
}

impl GainSettings {
    pub fn controls(&self) -> [AxisControl; 3] {
        [self.p.to_control(), self.i.to_control(), self.d.to_control()]
    }

    pub fn snapshot(&self) -> PidConfig {
        let [p, i, d] = self.controls();
        PidConfig::snapshot(&p, &i, &d)
    }
}

pub fn try_load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig, ConfigError> {
    let text = fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}

/// Loads `path`, falling back to defaults when it is missing or malformed.
pub fn load_config<P: AsRef<Path>>(path: P) -> AppConfig {
    let path = path.as_ref();
    match try_load_config(path) {
        Ok(config) => {
            info!("[Config] loaded {:?}", path);
            config
        }
        Err(ConfigError::Io(e)) if e.kind() == ErrorKind::NotFound => {
            info!("[Config] {:?} not found, using defaults", path);
            AppConfig::default()
        }
        Err(e) => {
            warn!("[Config] {:?}: {}; using defaults", path, e);
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_gives_defaults() {
        let config = load_config("/definitely/not/here.toml");
        assert_eq!(config.clock.dt_secs, 0.1);
        assert_eq!(config.telemetry.endpoint(), Endpoint::default());
        assert_eq!(config.gains.snapshot().effective_gains().kp, 1.0);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[clock]\ndt_secs = 0.05\n\n[gains.i]\nmin = \"2\"\nmax = \"0\"\nposition = 50"
        )
        .unwrap();

        let config = try_load_config(file.path()).unwrap();
        assert_eq!(config.clock.dt_secs, 0.05);
        assert_eq!(config.telemetry.port, DEFAULT_PORT);

        let range = config.gains.i.to_control().range();
        assert_eq!((range.min(), range.max()), (0.0, 2.0));
        assert_eq!(config.gains.snapshot().i.gain, 1.0);
    }

    #[test]
    fn malformed_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[clock\ndt_secs = ").unwrap();

        assert!(matches!(try_load_config(file.path()), Err(ConfigError::Parse(_))));
        assert_eq!(load_config(file.path()).telemetry.host, DEFAULT_HOST);
    }
}
