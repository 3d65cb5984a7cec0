//! ---
//! snp_section: "02-shared-runtime"
//! snp_subsection: "module"
//! snp_type: "source"
//! snp_scope: "code"
//! snp_description: "Shared primitives and utilities for the harness runtime."
//! snp_version: "v0.0.0-prealpha"
//! snp_owner: "tbd"
//! ---
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};

use crate::logging::LogFormat;

/// Counter bursts carry `FIELD_INT32` values `0..burst_len`.
pub const MAX_BURST_LEN: u32 = i32::MAX as u32;

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

fn any_interface(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
}

fn default_sensor_emitter_bind() -> SocketAddr {
    loopback(0)
}

fn default_sensor_destination() -> SocketAddr {
    loopback(12345)
}

fn default_request_bind() -> SocketAddr {
    loopback(32453)
}

fn default_request_destination() -> SocketAddr {
    loopback(12346)
}

fn default_station_sensor_listen() -> SocketAddr {
    any_interface(12345)
}

fn default_station_request_listen() -> SocketAddr {
    any_interface(12346)
}

fn default_sensor_id() -> u8 {
    1
}

fn default_burst_len() -> u32 {
    10
}

fn default_seed() -> u64 {
    0x5EED_5E45
}

fn default_request_period() -> Duration {
    Duration::from_secs(1)
}

fn default_history_len() -> usize {
    10
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_level() -> String {
    "debug".to_owned()
}

/// Primary configuration object for the harness runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sensor_emitter: SensorEmitterConfig,
    #[serde(default)]
    pub request_emitter: RequestEmitterConfig,
    #[serde(default)]
    pub station: StationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
///
/// Loading runs before tracing is initialised, so the loader records what it
/// did here instead of logging it.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    /// `None` when no file was found and built-in defaults apply.
    pub source: Option<PathBuf>,
    /// The source came from `SNP_CONFIG` rather than the candidate list.
    pub from_env: bool,
    /// Candidates tried before `source`, none of which existed.
    pub skipped: Vec<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "SNP_CONFIG";

    /// Load configuration together with the effective source path.
    ///
    /// An explicit `SNP_CONFIG` path must exist. Missing candidates are
    /// skipped, and when none exist the built-in defaults are returned.
    /// The result is not validated; callers apply their overrides first.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path),
                    from_env: true,
                    skipped: Vec::new(),
                });
            }
        }

        let mut skipped = Vec::new();
        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path.to_path_buf()),
                    from_env: false,
                    skipped,
                });
            }
            skipped.push(path.to_path_buf());
        }

        Ok(LoadedAppConfig {
            config: AppConfig::default(),
            source: None,
            from_env: false,
            skipped,
        })
    }

    /// Parse the TOML file at `path` without validating it.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        if self.sensor_emitter.burst_len == 0 {
            return Err(anyhow!("sensor_emitter.burst_len must be greater than zero"));
        }
        if self.sensor_emitter.burst_len > MAX_BURST_LEN {
            return Err(anyhow!("sensor_emitter.burst_len must not exceed {MAX_BURST_LEN}"));
        }
        if self.request_emitter.period.is_zero() {
            return Err(anyhow!("request_emitter.period_ms must be greater than zero"));
        }
        if self.station.history_len == 0 {
            return Err(anyhow!("station.history_len must be greater than zero"));
        }
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// How the sensor emitter fills its burst.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SensorBurstMode {
    /// `FIELD_INT32` readings counting up from zero.
    #[default]
    Counter,
    /// Random sensor ids, types and values drawn from a seeded generator.
    Randomized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEmitterConfig {
    #[serde(default = "default_sensor_emitter_bind")]
    pub bind: SocketAddr,
    #[serde(default = "default_sensor_destination")]
    pub destination: SocketAddr,
    #[serde(default = "default_sensor_id")]
    pub sensor_id: u8,
    #[serde(default = "default_burst_len")]
    pub burst_len: u32,
    #[serde(default)]
    pub mode: SensorBurstMode,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for SensorEmitterConfig {
    fn default() -> Self {
        Self {
            bind: default_sensor_emitter_bind(),
            destination: default_sensor_destination(),
            sensor_id: default_sensor_id(),
            burst_len: default_burst_len(),
            mode: SensorBurstMode::default(),
            seed: default_seed(),
        }
    }
}

/// Whether the request type sequence runs once or repeats.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestCycle {
    /// Send each query type once, then stop the schedule.
    #[default]
    Once,
    /// Wrap around to the first query type forever.
    Repeat,
}

/// How inbound sensor packets are interpreted for logging.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecodeMode {
    /// `FIELD_DOUBLE` reads as f64, every other code as u64.
    #[default]
    Legacy,
    /// Full dispatch on the value type.
    Typed,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEmitterConfig {
    #[serde(default = "default_request_bind")]
    pub bind: SocketAddr,
    #[serde(default = "default_request_destination")]
    pub destination: SocketAddr,
    #[serde(default = "default_sensor_id")]
    pub sensor_id: u8,
    #[serde(rename = "period_ms", default = "default_request_period")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub period: Duration,
    #[serde(default)]
    pub cycle: RequestCycle,
    #[serde(default)]
    pub decode: DecodeMode,
}

impl Default for RequestEmitterConfig {
    fn default() -> Self {
        Self {
            bind: default_request_bind(),
            destination: default_request_destination(),
            sensor_id: default_sensor_id(),
            period: default_request_period(),
            cycle: RequestCycle::default(),
            decode: DecodeMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationConfig {
    #[serde(default = "default_station_sensor_listen")]
    pub sensor_listen: SocketAddr,
    #[serde(default = "default_station_request_listen")]
    pub request_listen: SocketAddr,
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    #[serde(default)]
    pub csv_log: Option<PathBuf>,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            sensor_listen: default_station_sensor_listen(),
            request_listen: default_station_request_listen(),
            history_len: default_history_len(),
            csv_log: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Directory for rolling JSON log files; stdout only when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub file_prefix: Option<String>,
    #[serde(default = "default_log_level")]
    pub default_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            directory: None,
            file_prefix: None,
            default_level: default_log_level(),
        }
    }
}
