//! ---
//! snp_section: "01-wire-format"
//! snp_subsection: "module"
//! snp_type: "source"
//! snp_scope: "code"
//! snp_description: "Sensor packet layouts and value codec."
//! snp_version: "v0.0.0-prealpha"
//! snp_owner: "tbd"
//! ---
use std::fmt;

use crate::packet::VALUE_LEN;
use crate::ValueType;

/// Typed reading carried in the 8-byte value storage of a sensor packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// No payload.
    None,
    /// Signed 8-bit reading.
    Int8(i8),
    /// Signed 16-bit reading.
    Int16(i16),
    /// Signed 32-bit reading.
    Int32(i32),
    /// Signed 64-bit reading.
    Int64(i64),
    /// Unsigned 8-bit reading.
    UInt8(u8),
    /// Unsigned 16-bit reading.
    UInt16(u16),
    /// Unsigned 32-bit reading.
    UInt32(u32),
    /// Unsigned 64-bit reading.
    UInt64(u64),
    /// Single precision reading.
    Float(f32),
    /// Double precision reading.
    Double(f64),
    /// Eight raw character bytes.
    CharArray([u8; VALUE_LEN]),
    /// One character byte.
    Char(u8),
    /// Boolean flag.
    Bool(bool),
    /// Emergency sentinel.
    Emcy,
}

impl Value {
    /// Discriminant matching this variant.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::None => ValueType::None,
            Value::Int8(_) => ValueType::Int8,
            Value::Int16(_) => ValueType::Int16,
            Value::Int32(_) => ValueType::Int32,
            Value::Int64(_) => ValueType::Int64,
            Value::UInt8(_) => ValueType::UInt8,
            Value::UInt16(_) => ValueType::UInt16,
            Value::UInt32(_) => ValueType::UInt32,
            Value::UInt64(_) => ValueType::UInt64,
            Value::Float(_) => ValueType::Float,
            Value::Double(_) => ValueType::Double,
            Value::CharArray(_) => ValueType::CharArray,
            Value::Char(_) => ValueType::Char,
            Value::Bool(_) => ValueType::Bool,
            Value::Emcy => ValueType::Emcy,
        }
    }

    /// Lay the variant out little-endian at offset 0, zero-padding the rest.
    ///
    /// Only the first [`ValueType::width`] bytes are written.
    pub fn to_storage(&self) -> [u8; VALUE_LEN] {
        let mut storage = [0u8; VALUE_LEN];
        let member = &mut storage[..self.value_type().width()];
        match *self {
            Value::None | Value::Emcy => {}
            Value::Int8(v) => member.copy_from_slice(&v.to_le_bytes()),
            Value::Int16(v) => member.copy_from_slice(&v.to_le_bytes()),
            Value::Int32(v) => member.copy_from_slice(&v.to_le_bytes()),
            Value::Int64(v) => member.copy_from_slice(&v.to_le_bytes()),
            Value::UInt8(v) | Value::Char(v) => member.copy_from_slice(&[v]),
            Value::UInt16(v) => member.copy_from_slice(&v.to_le_bytes()),
            Value::UInt32(v) => member.copy_from_slice(&v.to_le_bytes()),
            Value::UInt64(v) => member.copy_from_slice(&v.to_le_bytes()),
            Value::Float(v) => member.copy_from_slice(&v.to_le_bytes()),
            Value::Double(v) => member.copy_from_slice(&v.to_le_bytes()),
            Value::CharArray(bytes) => member.copy_from_slice(&bytes),
            Value::Bool(v) => member.copy_from_slice(&[u8::from(v)]),
        }
        storage
    }

    /// Read the member named by `value_type` out of raw storage.
    ///
    /// Bytes beyond the member's width are ignored.
    pub fn from_storage(value_type: ValueType, storage: &[u8; VALUE_LEN]) -> Self {
        let s = storage;
        match value_type {
            ValueType::None => Value::None,
            ValueType::Int8 => Value::Int8(i8::from_le_bytes([s[0]])),
            ValueType::Int16 => Value::Int16(i16::from_le_bytes([s[0], s[1]])),
            ValueType::Int32 => Value::Int32(i32::from_le_bytes([s[0], s[1], s[2], s[3]])),
            ValueType::Int64 => Value::Int64(i64::from_le_bytes(*s)),
            ValueType::UInt8 => Value::UInt8(s[0]),
            ValueType::UInt16 => Value::UInt16(u16::from_le_bytes([s[0], s[1]])),
            ValueType::UInt32 => Value::UInt32(u32::from_le_bytes([s[0], s[1], s[2], s[3]])),
            ValueType::UInt64 => Value::UInt64(u64::from_le_bytes(*s)),
            ValueType::Float => Value::Float(f32::from_le_bytes([s[0], s[1], s[2], s[3]])),
            ValueType::Double => Value::Double(f64::from_le_bytes(*s)),
            ValueType::CharArray => Value::CharArray(*s),
            ValueType::Char => Value::Char(s[0]),
            ValueType::Bool => Value::Bool(s[0] != 0),
            ValueType::Emcy => Value::Emcy,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("none"),
            Value::Int8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::UInt8(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::CharArray(bytes) => {
                let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
                write!(f, "{:?}", String::from_utf8_lossy(&bytes[..end]))
            }
            Value::Char(c) => write!(f, "{:?}", char::from(*c)),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Emcy => f.write_str("emcy"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int32_layout_is_little_endian_and_zero_padded() {
        assert_eq!(Value::Int32(7).to_storage(), [7, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(
            Value::Int32(-2).to_storage(),
            [0xFE, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0]
        );
    }

    #[test]
    fn every_variant_survives_storage() {
        let samples = [
            Value::None,
            Value::Int8(-128),
            Value::Int16(-300),
            Value::Int32(i32::MIN),
            Value::Int64(-9_000_000_000),
            Value::UInt8(255),
            Value::UInt16(65_000),
            Value::UInt32(4_000_000_000),
            Value::UInt64(u64::MAX),
            Value::Float(1.5),
            Value::Double(-1.1),
            Value::CharArray(*b"abcdefgh"),
            Value::Char(b'x'),
            Value::Bool(true),
            Value::Emcy,
        ];
        for sample in samples {
            let storage = sample.to_storage();
            assert_eq!(Value::from_storage(sample.value_type(), &storage), sample);
        }
    }

    #[test]
    fn narrow_reads_ignore_trailing_bytes() {
        let storage = [0x01, 0x02, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
        assert_eq!(
            Value::from_storage(ValueType::Int16, &storage),
            Value::Int16(0x0201)
        );
        assert_eq!(Value::from_storage(ValueType::Bool, &storage), Value::Bool(true));
    }

    #[test]
    fn storage_is_zero_past_member_width() {
        let samples = [
            Value::Int8(-1),
            Value::Int16(-1),
            Value::Int32(-1),
            Value::UInt8(u8::MAX),
            Value::UInt16(u16::MAX),
            Value::UInt32(u32::MAX),
            Value::Float(f32::from_bits(u32::MAX)),
            Value::Char(0xFF),
            Value::Bool(true),
            Value::Emcy,
        ];
        for sample in samples {
            let width = sample.value_type().width();
            let storage = sample.to_storage();
            assert!(
                storage[width..].iter().all(|b| *b == 0),
                "{:?} wrote past {width} bytes",
                sample
            );
            assert!(width == 0 || storage[width - 1] != 0, "{sample:?} member truncated");
        }
    }

    #[test]
    fn display_renders_char_payloads() {
        assert_eq!(Value::Char(b'a').to_string(), "'a'");
        assert_eq!(Value::CharArray(*b"temp\0\0\0\0").to_string(), "\"temp\"");
        assert_eq!(Value::Double(2.5).to_string(), "2.5");
    }
}
