//! endpoint.rs
//! Host/port pair for the telemetry socket, with the operator fallback rules.

use std::fmt;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parses free-form operator input. A blank host and a blank, zero or
    /// unparsable port fall back to the defaults independently.
    pub fn from_operator(host_text: &str, port_text: &str) -> Self {
        let host = match host_text.trim() {
            "" => DEFAULT_HOST.to_string(),
            h => h.to_string(),
        };
        let port = port_text
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .unwrap_or(DEFAULT_PORT);
        Self { host, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_uses_defaults() {
        assert_eq!(Endpoint::from_operator("  ", ""), Endpoint::default());
    }

    #[test]
    fn bad_port_falls_back_but_host_is_kept() {
        let ep = Endpoint::from_operator("10.0.0.7", "99999");
        assert_eq!(ep, Endpoint::new("10.0.0.7", DEFAULT_PORT));
        assert_eq!(Endpoint::from_operator("h", "port").port, DEFAULT_PORT);
        assert_eq!(Endpoint::from_operator("h", "0").port, DEFAULT_PORT);
        assert_eq!(Endpoint::from_operator("h", " 6001 ").port, 6001);
    }

    #[test]
    fn display_brackets_ipv6() {
        assert_eq!(Endpoint::new("::1", 5000).to_string(), "[::1]:5000");
        assert_eq!(Endpoint::default().to_string(), "127.0.0.1:5000");
    }
}
