//! # Pendulum PID Console
//!
//! Drives a PID run over the shared time series and, optionally, ingests a
//! live telemetry feed into the same store.
//!
//! ## Menu
//! - Seed demo rows, start / pause / reset the run.
//! - Connect / disconnect the telemetry socket (host and port prompted).
//! - Edit a gain axis (enable, min, max, slider position).
//! - Print the table or the run summary, export both to CSV.
//!
//! Gains are frozen when a run starts; edits apply to the next start.
//! Config file: `$PENDULUM_CONFIG` or `pendulum.toml`, defaults when absent.

use std::{
    env,
    io::{BufRead, Write, stdin, stdout},
};

use crossbeam::channel::{Receiver, unbounded};
use log::{error, info, warn};

use pendulum_pid::{
    Axis, AxisControl, ClockEvent, Endpoint, GainRange, IngestEvent, IngestHandle, IngestStats, PidConfig,
    Sample, SimulationClock, TelemetryIngestClient, TimeSeriesStore,
    config::{AppConfig, CONFIG_ENV, DEFAULT_CONFIG_PATH, load_config},
    utils::{
        export::{export_csv, export_summary},
        metrics::RunSummary,
    },
};

const DEMO_ROWS: usize = 100;
const DEMO_SETPOINT: f64 = 50.0;
const DEMO_START: f64 = 40.0;
const EXPORT_DIR: &str = "data/export";

struct Session {
    config: AppConfig,
    store: TimeSeriesStore,
    clock: SimulationClock,
    clock_events: Receiver<ClockEvent>,
    controls: [AxisControl; 3],
    ingest: Option<IngestHandle>,
    ingest_events: Option<Receiver<IngestEvent>>,
    /// Ingestion counters as last reported to the operator.
    reported: IngestStats,
}

impl Session {
    fn new(config: AppConfig) -> Self {
        let store = TimeSeriesStore::new();
        let (clock, clock_events) = SimulationClock::new(store.clone(), config.clock.dt_secs);
        let controls = config.gains.controls();
        Self {
            config,
            store,
            clock,
            clock_events,
            controls,
            ingest: None,
            ingest_events: None,
            reported: IngestStats::default(),
        }
    }

    fn control_mut(&mut self, axis: Axis) -> &mut AxisControl {
        match axis {
            Axis::P => &mut self.controls[0],
            Axis::I => &mut self.controls[1],
            Axis::D => &mut self.controls[2],
        }
    }

    fn snapshot(&self) -> PidConfig {
        let [p, i, d] = &self.controls;
        PidConfig::snapshot(p, i, d)
    }

    /// Synthetic pendulum offset with a little noise around the start value.
    fn seed_demo(&self) {
        let dt = self.config.clock.dt_secs;
        let rows = (0..DEMO_ROWS).map(|k| {
            let noise = rand::random_range(-0.5..0.5);
            Sample::new(k as f64 * dt, DEMO_SETPOINT, DEMO_START + noise)
        });
        self.store.extend(rows);
        println!("Seeded {} rows ({} total).", DEMO_ROWS, self.store.len());
    }

    fn start(&mut self) {
        let config = self.snapshot();
        match self.clock.start(config) {
            Ok(()) => println!(
                "Run started: Kp={:.3} Ki={:.3} Kd={:.3}",
                config.effective_gains().kp,
                config.effective_gains().ki,
                config.effective_gains().kd
            ),
            Err(e) => println!("Cannot start: {}", e),
        }
    }

    fn connect(&mut self) {
        if self.ingest.as_ref().is_some_and(|h| !h.is_finished()) {
            println!("Telemetry already connected; disconnect first.");
            return;
        }
        let default = self.config.telemetry.endpoint();
        let host = ask(&format!("IP [{}]: ", default.host));
        let port = ask(&format!("Port [{}]: ", default.port));
        let endpoint = Endpoint::from_operator(
            if host.is_empty() { &default.host } else { &host },
            &port,
        );

        let (tx, rx) = unbounded();
        let client = TelemetryIngestClient::new(endpoint.clone(), self.store.clone())
            .with_events(tx)
            .with_read_timeout(self.config.telemetry.read_timeout());

        match client.spawn() {
            Ok(handle) => {
                info!("[Main] ingestion started for {}", endpoint);
                self.ingest = Some(handle);
                self.ingest_events = Some(rx);
                self.reported = IngestStats::default();
            }
            Err(e) => error!("[Main] cannot start ingestion: {}", e),
        }
    }

    fn disconnect(&mut self) {
        match self.ingest.take() {
            Some(handle) => match handle.stop() {
                Ok(stats) => println!(
                    "Disconnected: {} frames, {} rows appended, {} decode errors.",
                    stats.frames, stats.appended, stats.decode_errors
                ),
                Err(e) => println!("Ingestion ended with error: {}", e),
            },
            None => println!("Telemetry is not connected."),
        }
    }

    fn edit_gain(&mut self) {
        let Some(axis) = Axis::parse(&ask("Axis [P/I/D]: ")) else {
            println!("Unknown axis.");
            return;
        };
        let control = self.control_mut(axis);

        let enabled = ask(&format!("Enabled [{}] (y/n): ", control.enabled));
        match enabled.to_ascii_lowercase().as_str() {
            "y" | "yes" => control.enabled = true,
            "n" | "no" => control.enabled = false,
            _ => {}
        }

        let min = ask(&format!("Min [{}]: ", control.range().min()));
        let max = ask(&format!("Max [{}]: ", control.range().max()));
        if !min.is_empty() || !max.is_empty() {
            control.set_range(GainRange::from_text(&min, &max));
        }

        let position = ask(&format!("Slider 0-100 [{}]: ", control.position()));
        if let Ok(position) = position.parse::<u8>() {
            control.set_position(position);
        }

        let value = ask("Exact value (blank to keep): ");
        if !value.is_empty() && !control.set_value_text(&value) {
            println!("Ignored value '{}'.", value);
        }

        println!(
            "{} = {:.4} (range {}..{}, slider {}){}",
            axis.name(),
            control.value(),
            control.range().min(),
            control.range().max(),
            control.position(),
            if control.enabled { "" } else { " [disabled]" }
        );
    }

    fn print_table(&self) {
        let rows = self.store.snapshot();
        println!("{:>5} {:>8} {:>9} {:>10} {:>9} {:>6} {:>6} {:>6}",
            "#", "Time", "Setpoint", "Measured", "Error", "P", "I", "D");
        for (k, s) in rows.iter().enumerate() {
            let error = s.error.map(|e| format!("{:.2}", e)).unwrap_or_else(|| "-".into());
            println!(
                "{:>5} {:>8.2} {:>9.2} {:>10.2} {:>9} {:>6.2} {:>6.2} {:>6.2}",
                k, s.time, s.setpoint, s.measured, error, s.p, s.i, s.d
            );
        }
        println!("cursor={} rows={}", self.clock.controller_state().cursor, rows.len());
    }

    fn summary(&self) -> RunSummary {
        RunSummary::from_samples(
            &self.store.snapshot(),
            self.clock.controller_state().cursor,
            self.config.clock.dt_secs,
        )
    }

    fn export(&self) {
        let rows = self.store.snapshot();
        let samples_path = format!("{}/samples.csv", EXPORT_DIR);
        let summary_path = format!("{}/summary.csv", EXPORT_DIR);

        if let Err(e) = export_csv(&rows, &samples_path) {
            error!("[Main] sample export failed: {}", e);
            return;
        }
        match export_summary(&self.summary(), &summary_path) {
            Ok(()) => println!("Exported to {} and {}", samples_path, summary_path),
            Err(e) => error!("[Main] summary export failed: {}", e),
        }
    }

    /// Reports whatever the background threads announced since the last prompt.
    fn drain_events(&mut self) {
        for event in self.clock_events.try_iter() {
            match event {
                ClockEvent::RunComplete => println!(
                    "Run complete at row {}.",
                    self.clock.controller_state().cursor
                ),
                other => info!("[Main] clock: {:?}", other),
            }
        }

        if let Some(handle) = &self.ingest {
            let stats = handle.stats();
            if stats.appended > self.reported.appended {
                println!(
                    "{} telemetry rows received ({} total).",
                    stats.appended - self.reported.appended,
                    self.store.len()
                );
            }
            if stats.decode_errors > self.reported.decode_errors {
                warn!(
                    "[Main] {} malformed records discarded",
                    stats.decode_errors - self.reported.decode_errors
                );
            }
            self.reported = stats;
        }

        if let Some(rx) = &self.ingest_events {
            for event in rx.try_iter() {
                match event {
                    IngestEvent::Connected { peer } => println!("Telemetry connected to {}.", peer),
                    IngestEvent::Closed => println!("Telemetry connection closed."),
                    IngestEvent::Failed(reason) => println!("Telemetry error: {}", reason),
                }
            }
        }
    }

    fn shutdown(&mut self) {
        self.clock.pause();
        if let Some(handle) = self.ingest.take() {
            let _ = handle.stop();
        }
    }
}

fn main() {
    env_logger::init();
    info!("=== PENDULUM PID START ===");

    let config_path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut session = Session::new(load_config(&config_path));

    loop {
        session.drain_events();
        let Some(choice) = prompt_menu(&session) else {
            // stdin closed
            session.shutdown();
            info!("=== PENDULUM PID FINISHED (input closed) ===");
            return;
        };
        match choice.as_str() {
            "1" => session.seed_demo(),
            "2" | "" => session.start(),
            "3" => session.clock.pause(),
            "4" => {
                session.clock.reset();
                println!("Run reset; store cleared.");
            }
            "5" => session.connect(),
            "6" => session.disconnect(),
            "7" => session.edit_gain(),
            "8" => session.print_table(),
            "9" => {
                let s = session.summary();
                println!(
                    "rows={} processed={} mean|e|={:.4} max|e|={:.4} IAE={:.4} final={}",
                    s.rows,
                    s.processed,
                    s.mean_abs_error,
                    s.max_abs_error,
                    s.iae,
                    s.final_measured.map(|v| format!("{:.4}", v)).unwrap_or_else(|| "-".into())
                );
            }
            "e" => session.export(),
            "q" => {
                session.shutdown();
                println!("Session closed.");
                info!("=== PENDULUM PID FINISHED ===");
                return;
            }
            other => println!("No such option '{}'.", other),
        }
    }
}

const MENU_WIDTH: usize = 45;

fn prompt_menu(session: &Session) -> Option<String> {
    let status = format!(
        "  PENDULUM PID   state={:?} rows={}",
        session.clock.state(),
        session.store.len()
    );
    println!("\n┌{}┐", "─".repeat(MENU_WIDTH));
    println!("│{:<width$}│", status, width = MENU_WIDTH);
    println!("├{}┤", "─".repeat(MENU_WIDTH));
    for item in [
        "1) Seed demo rows",
        "2) Start run",
        "3) Pause run",
        "4) Reset",
        "5) Connect telemetry",
        "6) Disconnect telemetry",
        "7) Edit gain",
        "8) Show table",
        "9) Show summary",
        "e) Export CSV",
        "q) Quit",
    ] {
        println!("│  {:<width$}│", item, width = MENU_WIDTH - 2);
    }
    println!("└{}┘", "─".repeat(MENU_WIDTH));
    prompt("Select (default: 2): ")
}

/// `None` once stdin is closed or unreadable.
fn prompt(label: &str) -> Option<String> {
    print!("{}", label);
    let _ = stdout().flush();
    read_trimmed(&mut stdin().lock())
}

/// Sub-prompts treat a closed stdin as "keep the current value"; the menu
/// loop sees the EOF on its next read and exits.
fn ask(label: &str) -> String {
    prompt(label).unwrap_or_default()
}

fn read_trimmed<R: BufRead>(input: &mut R) -> Option<String> {
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line.trim().to_string()),
        Err(e) => {
            warn!("[Main] cannot read input: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn closed_input_reads_as_none() {
        let mut input = Cursor::new(Vec::<u8>::new());
        assert_eq!(read_trimmed(&mut input), None);
    }

    #[test]
    fn blank_line_is_the_default_choice_not_eof() {
        let mut input = Cursor::new(b"\n 7 \n".to_vec());
        assert_eq!(read_trimmed(&mut input), Some(String::new()));
        assert_eq!(read_trimmed(&mut input), Some("7".to_string()));
        assert_eq!(read_trimmed(&mut input), None);
    }
}
