//! DNS response codes.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// DNS response code (RFC 1035 Section 4.1.1, RFC 2136).
///
/// Only the 4-bit header RCODEs are represented; extended RCODEs require
/// EDNS, which this crate does not implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ResponseCode {
    /// No error condition.
    NoError = 0,

    /// The server was unable to interpret the query.
    FormErr = 1,

    /// The server failed to process the query.
    ServFail = 2,

    /// The queried name does not exist.
    NXDomain = 3,

    /// The server does not support the requested kind of query.
    NotImp = 4,

    /// The server refuses to answer for policy reasons.
    Refused = 5,

    /// Name exists when it should not (RFC 2136).
    YXDomain = 6,

    /// RRset exists when it should not (RFC 2136).
    YXRRSet = 7,

    /// RRset that should exist does not (RFC 2136).
    NXRRSet = 8,

    /// Server is not authoritative for the zone (RFC 2136).
    NotAuth = 9,

    /// Name not contained in zone (RFC 2136).
    NotZone = 10,
}

impl ResponseCode {
    /// Returns the numeric value of the response code.
    #[inline]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Creates a response code from its numeric value.
    #[inline]
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Returns true for NOERROR.
    #[inline]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::NoError)
    }

    /// Returns true for NXDOMAIN.
    #[inline]
    pub const fn is_nxdomain(self) -> bool {
        matches!(self, Self::NXDomain)
    }

    /// Returns true for SERVFAIL.
    #[inline]
    pub const fn is_server_error(self) -> bool {
        matches!(self, Self::ServFail)
    }

    /// Returns the human-readable mnemonic.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NoError => "NOERROR",
            Self::FormErr => "FORMERR",
            Self::ServFail => "SERVFAIL",
            Self::NXDomain => "NXDOMAIN",
            Self::NotImp => "NOTIMP",
            Self::Refused => "REFUSED",
            Self::YXDomain => "YXDOMAIN",
            Self::YXRRSet => "YXRRSET",
            Self::NXRRSet => "NXRRSET",
            Self::NotAuth => "NOTAUTH",
            Self::NotZone => "NOTZONE",
        }
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
