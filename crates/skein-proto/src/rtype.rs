//! DNS record types.

use std::fmt;

/// DNS record type (RFC 1035 Section 3.2.2 and friends).
///
/// Only the types the resolver handles structurally get variants; everything
/// else is carried as `Unknown` and round-trips opaquely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 host address.
    A,
    /// Authoritative name server.
    Ns,
    /// Canonical name alias.
    Cname,
    /// Start of a zone of authority.
    Soa,
    /// Domain name pointer.
    Ptr,
    /// Mail exchange.
    Mx,
    /// Text strings.
    Txt,
    /// IPv6 host address (RFC 3596).
    Aaaa,
    /// Service location (RFC 2782).
    Srv,
    /// EDNS OPT pseudo-record (RFC 6891); recognized only to be skipped.
    Opt,
    /// Wildcard match (QTYPE only).
    Any,
    /// Any other type value.
    Unknown(u16),
}

impl RecordType {
    /// Creates a record type from its numeric value.
    #[inline]
    pub const fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::A,
            2 => Self::Ns,
            5 => Self::Cname,
            6 => Self::Soa,
            12 => Self::Ptr,
            15 => Self::Mx,
            16 => Self::Txt,
            28 => Self::Aaaa,
            33 => Self::Srv,
            41 => Self::Opt,
            255 => Self::Any,
            other => Self::Unknown(other),
        }
    }

    /// Returns the numeric value of the type.
    #[inline]
    pub const fn to_u16(self) -> u16 {
        match self {
            Self::A => 1,
            Self::Ns => 2,
            Self::Cname => 5,
            Self::Soa => 6,
            Self::Ptr => 12,
            Self::Mx => 15,
            Self::Txt => 16,
            Self::Aaaa => 28,
            Self::Srv => 33,
            Self::Opt => 41,
            Self::Any => 255,
            Self::Unknown(value) => value,
        }
    }

    /// Returns true for address types (A / AAAA).
    #[inline]
    pub const fn is_address(self) -> bool {
        matches!(self, Self::A | Self::Aaaa)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::Ns => f.write_str("NS"),
            Self::Cname => f.write_str("CNAME"),
            Self::Soa => f.write_str("SOA"),
            Self::Ptr => f.write_str("PTR"),
            Self::Mx => f.write_str("MX"),
            Self::Txt => f.write_str("TXT"),
            Self::Aaaa => f.write_str("AAAA"),
            Self::Srv => f.write_str("SRV"),
            Self::Opt => f.write_str("OPT"),
            Self::Any => f.write_str("ANY"),
            Self::Unknown(value) => write!(f, "TYPE{}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_roundtrip() {
        assert_eq!(RecordType::from_u16(1), RecordType::A);
        assert_eq!(RecordType::from_u16(28), RecordType::Aaaa);
        assert_eq!(RecordType::from_u16(99), RecordType::Unknown(99));
        assert_eq!(RecordType::Unknown(99).to_u16(), 99);
    }

    #[test]
    fn test_type_display() {
        assert_eq!(RecordType::Cname.to_string(), "CNAME");
        assert_eq!(RecordType::Unknown(99).to_string(), "TYPE99");
    }
}
