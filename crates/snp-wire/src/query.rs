//! ---
//! snp_section: "01-wire-format"
//! snp_subsection: "module"
//! snp_type: "source"
//! snp_scope: "code"
//! snp_description: "Sensor packet layouts and value codec."
//! snp_version: "v0.0.0-prealpha"
//! snp_owner: "tbd"
//! ---
use strum::{Display, EnumCount, EnumIter, FromRepr};

use crate::WireError;

/// Reading requested by a [`RequestPacket`](crate::RequestPacket).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumCount, EnumIter, FromRepr)]
#[repr(u8)]
pub enum QueryType {
    /// Most recent raw reading.
    #[strum(serialize = "LAST_VALUE")]
    LastValue = 0,
    /// Mean over the retained recent readings.
    #[strum(serialize = "MEAN_LAST_10")]
    MeanLast10 = 1,
    /// Running mean over every reading seen.
    #[strum(serialize = "MEAN_ALL")]
    MeanAll = 2,
}

impl QueryType {
    /// Wire code carried in the request `type` byte.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for QueryType {
    type Error = WireError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        QueryType::from_repr(code).ok_or(WireError::UnknownQueryType(code))
    }
}
