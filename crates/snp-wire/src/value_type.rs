//! ---
//! snp_section: "01-wire-format"
//! snp_subsection: "module"
//! snp_type: "source"
//! snp_scope: "code"
//! snp_description: "Sensor packet layouts and value codec."
//! snp_version: "v0.0.0-prealpha"
//! snp_owner: "tbd"
//! ---
use strum::{Display, EnumCount, EnumIter, FromRepr, IntoStaticStr};

use crate::WireError;

/// Discriminant naming the active member of a packet value.
///
/// The numeric codes are protocol constants shared with the device firmware.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumCount,
    EnumIter,
    FromRepr,
    IntoStaticStr,
)]
#[repr(u8)]
pub enum ValueType {
    /// No value attached.
    #[strum(serialize = "NONE")]
    None = 0x00,
    /// Signed 8-bit integer.
    #[strum(serialize = "FIELD_INT8")]
    Int8 = 0x01,
    /// Signed 16-bit integer.
    #[strum(serialize = "FIELD_INT16")]
    Int16 = 0x02,
    /// Signed 32-bit integer.
    #[strum(serialize = "FIELD_INT32")]
    Int32 = 0x03,
    /// Signed 64-bit integer.
    #[strum(serialize = "FIELD_INT64")]
    Int64 = 0x04,
    /// Unsigned 8-bit integer.
    #[strum(serialize = "FIELD_UINT8")]
    UInt8 = 0x05,
    /// Unsigned 16-bit integer.
    #[strum(serialize = "FIELD_UINT16")]
    UInt16 = 0x06,
    /// Unsigned 32-bit integer.
    #[strum(serialize = "FIELD_UINT32")]
    UInt32 = 0x07,
    /// Unsigned 64-bit integer.
    #[strum(serialize = "FIELD_UINT64")]
    UInt64 = 0x08,
    /// IEEE-754 single precision.
    #[strum(serialize = "FIELD_FLOAT")]
    Float = 0x09,
    /// IEEE-754 double precision.
    #[strum(serialize = "FIELD_DOUBLE")]
    Double = 0x0A,
    /// Eight raw character bytes.
    #[strum(serialize = "FIELD_CHARARRAY")]
    CharArray = 0x0B,
    /// Single character byte.
    #[strum(serialize = "FIELD_CHAR")]
    Char = 0x0C,
    /// Boolean stored in one byte.
    #[strum(serialize = "FIELD_BOOL")]
    Bool = 0x0D,
    /// Emergency sentinel, reported when a sensor has no readings.
    #[strum(serialize = "FIELD_EMCY")]
    Emcy = 0x0E,
}

impl ValueType {
    /// Wire code carried in the packet `type` byte.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Number of payload bytes the variant occupies inside the 8-byte storage.
    pub const fn width(self) -> usize {
        match self {
            ValueType::None | ValueType::Emcy => 0,
            ValueType::Int8
            | ValueType::UInt8
            | ValueType::Char
            | ValueType::Bool => 1,
            ValueType::Int16 | ValueType::UInt16 => 2,
            ValueType::Int32 | ValueType::UInt32 | ValueType::Float => 4,
            ValueType::Int64
            | ValueType::UInt64
            | ValueType::Double
            | ValueType::CharArray => 8,
        }
    }

    /// Wire name as used by the firmware headers.
    pub fn name(self) -> &'static str {
        self.into()
    }
}

impl TryFrom<u8> for ValueType {
    type Error = WireError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        ValueType::from_repr(code).ok_or(WireError::UnknownValueType(code))
    }
}

impl From<ValueType> for u8 {
    fn from(value: ValueType) -> Self {
        value.code()
    }
}
