//! ---
//! snp_section: "01-wire-format"
//! snp_subsection: "module"
//! snp_type: "source"
//! snp_scope: "code"
//! snp_description: "Sensor packet layouts and value codec."
//! snp_version: "v0.0.0-prealpha"
//! snp_owner: "tbd"
//! ---
//! Wire structures shared by the sensor network protocol harnesses.
//!
//! Every record is packed, little-endian and fixed size. Decoding never
//! fails on length: short buffers zero-fill, long buffers are truncated.
#![warn(missing_docs)]

pub mod packet;
pub mod query;
pub mod value;
pub mod value_type;

/// Shared result type for wire operations.
pub type Result<T> = std::result::Result<T, WireError>;

/// Errors raised when interpreting wire bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The `type` byte does not name a known value type.
    #[error("unknown value type code 0x{0:02x}")]
    UnknownValueType(u8),
    /// The request `type` byte does not name a known query.
    #[error("unknown query type code {0}")]
    UnknownQueryType(u8),
    /// Strict decoding received a datagram of the wrong size.
    #[error("expected {expected} bytes, received {actual}")]
    Length {
        /// Size of the fixed record.
        expected: usize,
        /// Size of the datagram that was offered.
        actual: usize,
    },
}

pub use packet::{RequestPacket, SensorPacket, REQUEST_PACKET_LEN, SENSOR_PACKET_LEN, VALUE_LEN};
pub use query::QueryType;
pub use value::Value;
pub use value_type::ValueType;
