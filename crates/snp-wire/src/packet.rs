//! ---
//! snp_section: "01-wire-format"
//! snp_subsection: "module"
//! snp_type: "source"
//! snp_scope: "code"
//! snp_description: "Sensor packet layouts and value codec."
//! snp_version: "v0.0.0-prealpha"
//! snp_owner: "tbd"
//! ---
//! Packed sensor and request records.
//!
//! | Struct | Fields (offset:size) |
//! |---|---|
//! | [`SensorPacket`] | sensor_id(0:1), type(1:1), value(2:8) |
//! | [`RequestPacket`] | sensor_id(0:1), type(1:1) |
use std::fmt;

use crate::{QueryType, Result, Value, ValueType, WireError};

/// Size of the value storage, the width of the largest variant.
pub const VALUE_LEN: usize = 8;
/// Encoded size of a [`SensorPacket`].
pub const SENSOR_PACKET_LEN: usize = 2 + VALUE_LEN;
/// Encoded size of a [`RequestPacket`].
pub const REQUEST_PACKET_LEN: usize = 2;

/// Sensor reading as it travels device to client.
///
/// The `value_type` byte is kept raw so that packets carrying codes outside
/// [`ValueType`] still decode; interpreting the storage goes through
/// [`SensorPacket::value`] or [`SensorPacket::read_as`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SensorPacket {
    /// Sensor the reading belongs to.
    pub sensor_id: u8,
    /// Raw [`ValueType`] code.
    pub value_type: u8,
    storage: [u8; VALUE_LEN],
}

impl SensorPacket {
    /// Build a packet whose `type` byte always matches the supplied value.
    pub fn new(sensor_id: u8, value: Value) -> Self {
        Self {
            sensor_id,
            value_type: value.value_type().code(),
            storage: value.to_storage(),
        }
    }

    /// Build a packet from an arbitrary tag and storage, e.g. when echoing a
    /// previously received reading.
    pub fn from_raw(sensor_id: u8, value_type: u8, storage: [u8; VALUE_LEN]) -> Self {
        Self {
            sensor_id,
            value_type,
            storage,
        }
    }

    /// Typed discriminant, failing on codes outside the protocol table.
    pub fn value_type(&self) -> Result<ValueType> {
        ValueType::try_from(self.value_type)
    }

    /// Checked dispatch over every value type.
    pub fn value(&self) -> Result<Value> {
        let value_type = self.value_type()?;
        Ok(Value::from_storage(value_type, &self.storage))
    }

    /// Read the storage as `expected`.
    ///
    /// The caller asserts that `expected` matches the packet tag; debug builds
    /// panic on a mismatch.
    pub fn read_as(&self, expected: ValueType) -> Value {
        debug_assert_eq!(
            self.value_type,
            expected.code(),
            "read {} from packet tagged 0x{:02x}",
            expected,
            self.value_type
        );
        Value::from_storage(expected, &self.storage)
    }

    /// Untyped value bytes.
    pub fn raw_value(&self) -> &[u8; VALUE_LEN] {
        &self.storage
    }

    /// Storage reinterpreted as a little-endian `u64`, regardless of the tag.
    pub fn raw_u64(&self) -> u64 {
        u64::from_le_bytes(self.storage)
    }

    /// Storage reinterpreted as a little-endian `f64`, regardless of the tag.
    pub fn raw_f64(&self) -> f64 {
        f64::from_le_bytes(self.storage)
    }

    /// Lay out `sensor_id`, `type`, then the value storage.
    pub fn encode(&self) -> [u8; SENSOR_PACKET_LEN] {
        let mut buf = [0u8; SENSOR_PACKET_LEN];
        buf[0] = self.sensor_id;
        buf[1] = self.value_type;
        buf[2..].copy_from_slice(&self.storage);
        buf
    }

    /// Fill a zeroed record with the first `min(len, 10)` bytes.
    ///
    /// Short input leaves trailing fields zero and long input is truncated;
    /// neither is an error at this layer.
    pub fn decode(bytes: &[u8]) -> Self {
        let mut buf = [0u8; SENSOR_PACKET_LEN];
        let fit = bytes.len().min(SENSOR_PACKET_LEN);
        buf[..fit].copy_from_slice(&bytes[..fit]);
        Self::from_array(buf)
    }

    /// Decode only datagrams of exactly [`SENSOR_PACKET_LEN`] bytes.
    pub fn decode_exact(bytes: &[u8]) -> Result<Self> {
        let buf: [u8; SENSOR_PACKET_LEN] =
            bytes.try_into().map_err(|_| WireError::Length {
                expected: SENSOR_PACKET_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self::from_array(buf))
    }

    fn from_array(buf: [u8; SENSOR_PACKET_LEN]) -> Self {
        let mut storage = [0u8; VALUE_LEN];
        storage.copy_from_slice(&buf[2..]);
        Self {
            sensor_id: buf[0],
            value_type: buf[1],
            storage,
        }
    }
}

impl fmt::Display for SensorPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Ok(value) => write!(
                f,
                "<SensorPacket: sensor_id: {}, type: {}, value: {}>",
                self.sensor_id,
                value.value_type(),
                value
            ),
            Err(_) => write!(
                f,
                "<SensorPacket: sensor_id: {}, type: 0x{:02x}, value: {:02x?}>",
                self.sensor_id, self.value_type, self.storage
            ),
        }
    }
}

/// Request for a reading, client to device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RequestPacket {
    /// Sensor being queried.
    pub sensor_id: u8,
    /// Raw request `type` code, normally a [`QueryType`].
    pub request_type: u8,
}

impl RequestPacket {
    /// Build a request with an arbitrary `type` code.
    pub fn new(sensor_id: u8, request_type: u8) -> Self {
        Self {
            sensor_id,
            request_type,
        }
    }

    /// Build a request for a known query.
    pub fn for_query(sensor_id: u8, query: QueryType) -> Self {
        Self::new(sensor_id, query.code())
    }

    /// Typed query, failing on unknown codes.
    pub fn query_type(&self) -> Result<QueryType> {
        QueryType::try_from(self.request_type)
    }

    /// Lay out `sensor_id`, `type`.
    pub fn encode(&self) -> [u8; REQUEST_PACKET_LEN] {
        [self.sensor_id, self.request_type]
    }

    /// Same partial-fill semantics as [`SensorPacket::decode`].
    pub fn decode(bytes: &[u8]) -> Self {
        Self {
            sensor_id: bytes.first().copied().unwrap_or_default(),
            request_type: bytes.get(1).copied().unwrap_or_default(),
        }
    }

    /// Decode only datagrams of exactly [`REQUEST_PACKET_LEN`] bytes.
    pub fn decode_exact(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [sensor_id, request_type] => Ok(Self::new(*sensor_id, *request_type)),
            _ => Err(WireError::Length {
                expected: REQUEST_PACKET_LEN,
                actual: bytes.len(),
            }),
        }
    }
}

impl fmt::Display for RequestPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<RequestPacket: sensor_id: {}, type: {}>",
            self.sensor_id, self.request_type
        )
    }
}
