//! Synthetic telemetry server.
//!
//! Usage: `telemetry_server [HOST] [PORT]`.
//! Arguments override `[telemetry]` from `$PENDULUM_CONFIG` (or `pendulum.toml`),
//! which itself defaults to 127.0.0.1:5000 and one record per second.
//! Accepts one client and streams until the client leaves.

use std::{env, process};

use log::{error, info};

use pendulum_pid::{
    config::{CONFIG_ENV, DEFAULT_CONFIG_PATH, load_config},
    telemetry::{endpoint::Endpoint, server::TelemetryServer},
};

fn main() {
    env_logger::init();

    let config_path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let settings = load_config(&config_path).telemetry;

    let args: Vec<String> = env::args().skip(1).collect();
    let endpoint = match (args.first(), args.get(1)) {
        (None, None) => settings.endpoint(),
        (host, port) => {
            let host = host.map(String::as_str).unwrap_or(&settings.host);
            let port = port.cloned().unwrap_or_else(|| settings.port.to_string());
            Endpoint::from_operator(host, &port)
        }
    };

    let server = match TelemetryServer::bind(&endpoint) {
        Ok(server) => server,
        Err(e) => {
            error!("[Server] cannot bind {}: {}", endpoint, e);
            process::exit(1);
        }
    };
    println!("Telemetry server listening on {}", endpoint);

    match server.serve_one(settings.emit_interval(), None) {
        Ok(sent) => info!("[Server] done, {} records sent", sent),
        Err(e) => error!("[Server] stream failed: {}", e),
    }
}
