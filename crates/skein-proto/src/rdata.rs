//! DNS record data (RDATA).
//!
//! Only the record types the resolver inspects structurally are decoded
//! (addresses, delegation and alias names, SOA, TXT); everything else is
//! preserved as opaque bytes. Name-bearing RDATA is parsed with the full
//! message in hand so compression pointers resolve, and re-serialized
//! uncompressed.

use crate::error::{Error, Result};
use crate::name::Name;
use crate::rtype::RecordType;
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Start-of-authority record data (RFC 1035 Section 3.3.13).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Soa {
    /// Primary name server for the zone.
    pub mname: Name,
    /// Mailbox of the person responsible for the zone.
    pub rname: Name,
    /// Zone serial number.
    pub serial: u32,
    /// Refresh interval in seconds.
    pub refresh: u32,
    /// Retry interval in seconds.
    pub retry: u32,
    /// Expiry limit in seconds.
    pub expire: u32,
    /// Minimum TTL / negative caching TTL.
    pub minimum: u32,
}

impl Soa {
    /// Returns the minimum TTL field.
    #[inline]
    pub const fn minimum(&self) -> u32 {
        self.minimum
    }
}

/// Parsed record data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RData {
    /// IPv4 address.
    A(Ipv4Addr),
    /// IPv6 address.
    Aaaa(Ipv6Addr),
    /// Authoritative name server.
    Ns(Name),
    /// Canonical name alias.
    Cname(Name),
    /// Domain name pointer.
    Ptr(Name),
    /// Mail exchange.
    Mx {
        /// Preference value; lower is preferred.
        preference: u16,
        /// The mail exchange host.
        exchange: Name,
    },
    /// Service location (RFC 2782).
    Srv {
        /// Priority; lower is tried first.
        priority: u16,
        /// Weight among same-priority targets.
        weight: u16,
        /// Service port.
        port: u16,
        /// Target host.
        target: Name,
    },
    /// Start of authority.
    Soa(Soa),
    /// Text strings (each up to 255 bytes).
    Txt(Vec<Bytes>),
    /// Any record type this crate does not decode.
    Unknown {
        /// The numeric record type.
        rtype: u16,
        /// The raw RDATA bytes.
        data: Bytes,
    },
}

impl RData {
    /// Parses RDATA of the given type out of a message.
    ///
    /// `offset` is where the RDATA starts within `message`; `rdlength` is the
    /// on-wire RDATA length from the record header.
    pub fn parse(
        rtype: RecordType,
        message: &[u8],
        offset: usize,
        rdlength: usize,
    ) -> Result<Self> {
        let end = offset + rdlength;
        let data = message
            .get(offset..end)
            .ok_or(Error::unexpected_eof(end))?;

        match rtype {
            RecordType::A => {
                if rdlength != 4 {
                    return Err(Error::RDataLengthMismatch {
                        rtype: "A".to_string(),
                        expected: 4,
                        actual: rdlength,
                    });
                }
                let octets: [u8; 4] = data.try_into().unwrap();
                Ok(Self::A(Ipv4Addr::from(octets)))
            }
            RecordType::Aaaa => {
                if rdlength != 16 {
                    return Err(Error::RDataLengthMismatch {
                        rtype: "AAAA".to_string(),
                        expected: 16,
                        actual: rdlength,
                    });
                }
                let octets: [u8; 16] = data.try_into().unwrap();
                Ok(Self::Aaaa(Ipv6Addr::from(octets)))
            }
            RecordType::Ns => {
                let (name, _) = Name::parse(message, offset)?;
                Ok(Self::Ns(name))
            }
            RecordType::Cname => {
                let (name, _) = Name::parse(message, offset)?;
                Ok(Self::Cname(name))
            }
            RecordType::Ptr => {
                let (name, _) = Name::parse(message, offset)?;
                Ok(Self::Ptr(name))
            }
            RecordType::Mx => {
                if rdlength < 3 {
                    return Err(Error::RDataLengthMismatch {
                        rtype: "MX".to_string(),
                        expected: 3,
                        actual: rdlength,
                    });
                }
                let preference = u16::from_be_bytes([message[offset], message[offset + 1]]);
                let (exchange, _) = Name::parse(message, offset + 2)?;
                Ok(Self::Mx {
                    preference,
                    exchange,
                })
            }
            RecordType::Srv => {
                if rdlength < 7 {
                    return Err(Error::RDataLengthMismatch {
                        rtype: "SRV".to_string(),
                        expected: 7,
                        actual: rdlength,
                    });
                }
                let word = |i: usize| u16::from_be_bytes([message[offset + i], message[offset + i + 1]]);
                let (target, _) = Name::parse(message, offset + 6)?;
                Ok(Self::Srv {
                    priority: word(0),
                    weight: word(2),
                    port: word(4),
                    target,
                })
            }
            RecordType::Soa => {
                let (mname, mname_len) = Name::parse(message, offset)?;
                let (rname, rname_len) = Name::parse(message, offset + mname_len)?;
                let fixed = offset + mname_len + rname_len;
                if fixed + 20 > message.len() {
                    return Err(Error::unexpected_eof(fixed + 20));
                }
                let word = |i: usize| {
                    u32::from_be_bytes([
                        message[fixed + i],
                        message[fixed + i + 1],
                        message[fixed + i + 2],
                        message[fixed + i + 3],
                    ])
                };
                Ok(Self::Soa(Soa {
                    mname,
                    rname,
                    serial: word(0),
                    refresh: word(4),
                    retry: word(8),
                    expire: word(12),
                    minimum: word(16),
                }))
            }
            RecordType::Txt => {
                let mut strings = Vec::new();
                let mut pos = 0;
                while pos < data.len() {
                    let len = data[pos] as usize;
                    let start = pos + 1;
                    let slice = data
                        .get(start..start + len)
                        .ok_or(Error::unexpected_eof(offset + start + len))?;
                    strings.push(Bytes::copy_from_slice(slice));
                    pos = start + len;
                }
                Ok(Self::Txt(strings))
            }
            other => Ok(Self::Unknown {
                rtype: other.to_u16(),
                data: Bytes::copy_from_slice(data),
            }),
        }
    }

    /// Returns the record type of this data.
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::A(_) => RecordType::A,
            Self::Aaaa(_) => RecordType::Aaaa,
            Self::Ns(_) => RecordType::Ns,
            Self::Cname(_) => RecordType::Cname,
            Self::Ptr(_) => RecordType::Ptr,
            Self::Mx { .. } => RecordType::Mx,
            Self::Srv { .. } => RecordType::Srv,
            Self::Soa(_) => RecordType::Soa,
            Self::Txt(_) => RecordType::Txt,
            Self::Unknown { rtype, .. } => RecordType::from_u16(*rtype),
        }
    }

    /// Returns the wire length of this RDATA (uncompressed).
    pub fn wire_len(&self) -> usize {
        match self {
            Self::A(_) => 4,
            Self::Aaaa(_) => 16,
            Self::Ns(name) | Self::Cname(name) | Self::Ptr(name) => name.wire_len(),
            Self::Mx { exchange, .. } => 2 + exchange.wire_len(),
            Self::Srv { target, .. } => 6 + target.wire_len(),
            Self::Soa(soa) => soa.mname.wire_len() + soa.rname.wire_len() + 20,
            Self::Txt(strings) => strings.iter().map(|s| 1 + s.len()).sum(),
            Self::Unknown { data, .. } => data.len(),
        }
    }

    /// Writes the RDATA in wire format (uncompressed names).
    pub fn write_to(&self, buf: &mut BytesMut) {
        match self {
            Self::A(addr) => buf.extend_from_slice(&addr.octets()),
            Self::Aaaa(addr) => buf.extend_from_slice(&addr.octets()),
            Self::Ns(name) | Self::Cname(name) | Self::Ptr(name) => name.write_wire(buf),
            Self::Mx {
                preference,
                exchange,
            } => {
                buf.extend_from_slice(&preference.to_be_bytes());
                exchange.write_wire(buf);
            }
            Self::Srv {
                priority,
                weight,
                port,
                target,
            } => {
                buf.extend_from_slice(&priority.to_be_bytes());
                buf.extend_from_slice(&weight.to_be_bytes());
                buf.extend_from_slice(&port.to_be_bytes());
                target.write_wire(buf);
            }
            Self::Soa(soa) => {
                soa.mname.write_wire(buf);
                soa.rname.write_wire(buf);
                buf.extend_from_slice(&soa.serial.to_be_bytes());
                buf.extend_from_slice(&soa.refresh.to_be_bytes());
                buf.extend_from_slice(&soa.retry.to_be_bytes());
                buf.extend_from_slice(&soa.expire.to_be_bytes());
                buf.extend_from_slice(&soa.minimum.to_be_bytes());
            }
            Self::Txt(strings) => {
                for s in strings {
                    buf.extend_from_slice(&[s.len() as u8]);
                    buf.extend_from_slice(s);
                }
            }
            Self::Unknown { data, .. } => buf.extend_from_slice(data),
        }
    }

    /// Returns the IPv4 address for A records.
    #[inline]
    pub fn as_a(&self) -> Option<Ipv4Addr> {
        match self {
            Self::A(addr) => Some(*addr),
            _ => None,
        }
    }

    /// Returns the IPv6 address for AAAA records.
    #[inline]
    pub fn as_aaaa(&self) -> Option<Ipv6Addr> {
        match self {
            Self::Aaaa(addr) => Some(*addr),
            _ => None,
        }
    }

    /// Returns the target name for CNAME records.
    #[inline]
    pub fn as_cname(&self) -> Option<&Name> {
        match self {
            Self::Cname(name) => Some(name),
            _ => None,
        }
    }

    /// Returns the nameserver name for NS records.
    #[inline]
    pub fn as_ns(&self) -> Option<&Name> {
        match self {
            Self::Ns(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A(addr) => write!(f, "{}", addr),
            Self::Aaaa(addr) => write!(f, "{}", addr),
            Self::Ns(name) | Self::Cname(name) | Self::Ptr(name) => write!(f, "{}", name),
            Self::Mx {
                preference,
                exchange,
            } => write!(f, "{} {}", preference, exchange),
            Self::Srv {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{} {} {} {}", priority, weight, port, target),
            Self::Soa(soa) => write!(
                f,
                "{} {} {} {} {} {} {}",
                soa.mname, soa.rname, soa.serial, soa.refresh, soa.retry, soa.expire, soa.minimum
            ),
            Self::Txt(strings) => {
                for (i, s) in strings.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "\"{}\"", String::from_utf8_lossy(s))?;
                }
                Ok(())
            }
            Self::Unknown { data, .. } => write!(f, "\\# {}", data.len()),
        }
    }
}
