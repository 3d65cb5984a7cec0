//! ---
//! snp_section: "03-harness"
//! snp_subsection: "module"
//! snp_type: "source"
//! snp_scope: "code"
//! snp_description: "UDP emitters, station peer and endpoint loop."
//! snp_version: "v0.0.0-prealpha"
//! snp_owner: "tbd"
//! ---
//! UDP harness for exercising a sensor network protocol peer.
//!
//! Each socket is an [`Endpoint`] driving one [`DatagramHandler`]. Handlers
//! only see the synchronous [`Transport`] surface, so every callback runs to
//! completion on the single-threaded loop.
#![warn(missing_docs)]

pub mod endpoint;
pub mod request_emitter;
pub mod runtime;
pub mod sensor_emitter;
pub mod station;
pub mod transport;

/// Shared result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors surfaced by endpoints and handlers.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Socket level failure, including a send that would block.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wire bytes could not be interpreted.
    #[error("wire error: {0}")]
    Wire(#[from] snp_wire::WireError),
    /// Station CSV log could not be written.
    #[error("csv log error: {0}")]
    Csv(#[from] csv::Error),
    /// The transport refused to carry the datagram.
    #[error("transport {0} unavailable")]
    TransportUnavailable(&'static str),
}

pub use endpoint::{DatagramHandler, Endpoint, EndpointStats, EndpointStatsSnapshot};
pub use request_emitter::{EmitterState, QuerySequence, Reading, RequestEmitter, StopReason};
pub use runtime::{EndpointReport, HarnessRuntime, Role, RunReport};
pub use sensor_emitter::SensorEmitter;
pub use station::{SensorHistory, SensorStation, SharedStation, StationRequestPort, StationSensorPort};
pub use transport::{InMemoryTransport, SentDatagram, Transport, UdpTransport};
