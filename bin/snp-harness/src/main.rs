//! ---
//! snp_section: "04-entrypoint"
//! snp_subsection: "binary"
//! snp_type: "source"
//! snp_scope: "code"
//! snp_description: "Binary entrypoint for the sensor network protocol harness."
//! snp_version: "v0.0.0-prealpha"
//! snp_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use snp_common::config::{AppConfig, DecodeMode, LoadedAppConfig, RequestCycle, SensorBurstMode};
use snp_common::logging::{init_tracing, LogFormat};
use snp_harness::{HarnessRuntime, Role};
use tokio::signal;
use tracing::{debug, info, warn};

const DEFAULT_CONFIG: &str = "configs/harness.toml";

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Sensor network protocol test harness",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, help = "Override the stdout log format")]
    log_format: Option<CliLogFormat>,

    #[arg(long, value_name = "LEVEL", help = "Default log level when SNP_LOG is unset")]
    log_level: Option<String>,

    /// Stop after this many seconds instead of waiting for ctrl-c
    #[arg(long, value_name = "SECS")]
    run_for_secs: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliLogFormat {
    Pretty,
    Json,
}

impl From<CliLogFormat> for LogFormat {
    fn from(value: CliLogFormat) -> Self {
        match value {
            CliLogFormat::Pretty => LogFormat::Pretty,
            CliLogFormat::Json => LogFormat::StructuredJson,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Send one burst of sensor packets")]
    EmitSensors(SensorArgs),
    #[command(about = "Send periodic data requests and log the replies")]
    Request(RequestArgs),
    #[command(about = "Run the device-side station on both ports")]
    Station(StationArgs),
    #[command(about = "Run the station and both emitters together")]
    All,
}

#[derive(Debug, Default, Args)]
struct SensorArgs {
    #[arg(long, value_name = "ADDR")]
    destination: Option<SocketAddr>,
    #[arg(long)]
    sensor_id: Option<u8>,
    /// Packets per burst
    #[arg(long)]
    count: Option<u32>,
    /// Draw sensor ids, types and values at random
    #[arg(long)]
    randomized: bool,
    #[arg(long, requires = "randomized")]
    seed: Option<u64>,
}

#[derive(Debug, Default, Args)]
struct RequestArgs {
    #[arg(long, value_name = "ADDR")]
    bind: Option<SocketAddr>,
    #[arg(long, value_name = "ADDR")]
    destination: Option<SocketAddr>,
    #[arg(long)]
    sensor_id: Option<u8>,
    #[arg(long, value_name = "MS")]
    period_ms: Option<u64>,
    /// Keep cycling through the query types
    #[arg(long)]
    repeat: bool,
    /// Log replies with full type dispatch
    #[arg(long)]
    typed: bool,
}

#[derive(Debug, Default, Args)]
struct StationArgs {
    #[arg(long, value_name = "ADDR")]
    sensor_listen: Option<SocketAddr>,
    #[arg(long, value_name = "ADDR")]
    request_listen: Option<SocketAddr>,
    /// Append every reading to this CSV file
    #[arg(long, value_name = "FILE")]
    csv_log: Option<PathBuf>,
}

impl SensorArgs {
    fn apply(&self, config: &mut AppConfig) {
        let sensor = &mut config.sensor_emitter;
        if let Some(destination) = self.destination {
            sensor.destination = destination;
        }
        if let Some(sensor_id) = self.sensor_id {
            sensor.sensor_id = sensor_id;
        }
        if let Some(count) = self.count {
            sensor.burst_len = count;
        }
        if self.randomized {
            sensor.mode = SensorBurstMode::Randomized;
        }
        if let Some(seed) = self.seed {
            sensor.seed = seed;
        }
    }
}

impl RequestArgs {
    fn apply(&self, config: &mut AppConfig) {
        let request = &mut config.request_emitter;
        if let Some(bind) = self.bind {
            request.bind = bind;
        }
        if let Some(destination) = self.destination {
            request.destination = destination;
        }
        if let Some(sensor_id) = self.sensor_id {
            request.sensor_id = sensor_id;
        }
        if let Some(period_ms) = self.period_ms {
            request.period = Duration::from_millis(period_ms);
        }
        if self.repeat {
            request.cycle = RequestCycle::Repeat;
        }
        if self.typed {
            request.decode = DecodeMode::Typed;
        }
    }
}

impl StationArgs {
    fn apply(&self, config: &mut AppConfig) {
        let station = &mut config.station;
        if let Some(addr) = self.sensor_listen {
            station.sensor_listen = addr;
        }
        if let Some(addr) = self.request_listen {
            station.request_listen = addr;
        }
        if let Some(path) = &self.csv_log {
            station.csv_log = Some(path.clone());
        }
    }
}

impl Cli {
    fn config_candidates(&self) -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(path) = &self.config {
            candidates.push(path.clone());
        }
        candidates.push(PathBuf::from(DEFAULT_CONFIG));
        candidates
    }

    /// Fold command line overrides into `config` and pick the roles to run.
    fn resolve(&self, config: &mut AppConfig) -> Result<Vec<Role>> {
        if let Some(format) = self.log_format {
            config.logging.format = format.into();
        }
        if let Some(level) = &self.log_level {
            config.logging.default_level = level.clone();
        }
        let roles = match &self.command {
            Some(Commands::EmitSensors(args)) => {
                args.apply(config);
                vec![Role::SensorEmitter]
            }
            Some(Commands::Request(args)) => {
                args.apply(config);
                vec![Role::RequestEmitter]
            }
            Some(Commands::Station(args)) => {
                args.apply(config);
                vec![Role::Station]
            }
            Some(Commands::All) | None => {
                vec![Role::Station, Role::SensorEmitter, Role::RequestEmitter]
            }
        };
        config.validate().context("invalid configuration after overrides")?;
        Ok(roles)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let LoadedAppConfig {
        mut config,
        source,
        from_env,
        skipped,
    } = AppConfig::load_with_source(&cli.config_candidates())?;
    let roles = cli.resolve(&mut config)?;
    init_tracing("snp-harness", &config.logging)?;

    for candidate in &skipped {
        debug!(candidate = %candidate.display(), "configuration candidate not found");
    }
    match &source {
        Some(path) => info!(config_path = %path.display(), from_env, "configuration loaded"),
        None => info!("no configuration file found; using built-in defaults"),
    }
    info!(roles = ?roles, "starting harness");

    let run_for = cli.run_for_secs.map(Duration::from_secs);
    let runtime = HarnessRuntime::new(config);
    let report = runtime.run(&roles, shutdown_signal(run_for)).await?;
    if let Some(state) = report.request_state {
        info!(state = ?state, "request emitter finished");
    }
    Ok(())
}

async fn shutdown_signal(run_for: Option<Duration>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "unable to listen for ctrl-c; running until killed");
            std::future::pending::<()>().await;
        }
    };
    match run_for {
        Some(limit) => {
            tokio::select! {
                _ = ctrl_c => info!("ctrl-c received; shutting down"),
                _ = tokio::time::sleep(limit) => info!(secs = limit.as_secs(), "run time elapsed; shutting down"),
            }
        }
        None => {
            ctrl_c.await;
            info!("ctrl-c received; shutting down");
        }
    }
}
