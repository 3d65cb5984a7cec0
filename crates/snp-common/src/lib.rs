//! ---
//! snp_section: "02-shared-runtime"
//! snp_subsection: "module"
//! snp_type: "source"
//! snp_scope: "code"
//! snp_description: "Shared primitives and utilities for the harness runtime."
//! snp_version: "v0.0.0-prealpha"
//! snp_owner: "tbd"
//! ---
//! Shared primitives for the sensor protocol harness workspace.
//! This crate exposes configuration loading and tracing bootstrap consumed
//! by the harness library and its binary.

pub mod config;
pub mod logging;

pub use config::{
    AppConfig, DecodeMode, LoadedAppConfig, LoggingConfig, RequestCycle, RequestEmitterConfig,
    SensorBurstMode, SensorEmitterConfig, StationConfig,
};
pub use logging::{init_tracing, LogFormat};
