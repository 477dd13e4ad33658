//! DNS resource records.

use crate::class::RecordClass;
use crate::error::{Error, Result};
use crate::name::Name;
use crate::rdata::RData;
use crate::rtype::RecordType;
use bytes::BytesMut;
use std::fmt;

/// A DNS resource record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRecord {
    name: Name,
    rtype: RecordType,
    rclass: RecordClass,
    ttl: u32,
    rdata: RData,
}

impl ResourceRecord {
    /// Creates a new resource record.
    pub fn new(name: Name, rtype: RecordType, rclass: RecordClass, ttl: u32, rdata: RData) -> Self {
        Self {
            name,
            rtype,
            rclass,
            ttl,
            rdata,
        }
    }

    /// Creates an A record in class IN.
    pub fn a(name: Name, ttl: u32, addr: std::net::Ipv4Addr) -> Self {
        Self::new(name, RecordType::A, RecordClass::In, ttl, RData::A(addr))
    }

    /// Creates an AAAA record in class IN.
    pub fn aaaa(name: Name, ttl: u32, addr: std::net::Ipv6Addr) -> Self {
        Self::new(
            name,
            RecordType::Aaaa,
            RecordClass::In,
            ttl,
            RData::Aaaa(addr),
        )
    }

    /// Creates a CNAME record in class IN.
    pub fn cname(name: Name, ttl: u32, target: Name) -> Self {
        Self::new(
            name,
            RecordType::Cname,
            RecordClass::In,
            ttl,
            RData::Cname(target),
        )
    }

    /// Creates an NS record in class IN.
    pub fn ns(name: Name, ttl: u32, nameserver: Name) -> Self {
        Self::new(
            name,
            RecordType::Ns,
            RecordClass::In,
            ttl,
            RData::Ns(nameserver),
        )
    }

    /// Returns the owner name.
    #[inline]
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns the record type.
    #[inline]
    pub fn rtype(&self) -> RecordType {
        self.rtype
    }

    /// Returns the record class.
    #[inline]
    pub fn rclass(&self) -> RecordClass {
        self.rclass
    }

    /// Returns the TTL in seconds.
    #[inline]
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Returns the record data.
    #[inline]
    pub fn rdata(&self) -> &RData {
        &self.rdata
    }

    /// Returns a copy of this record with a different TTL.
    #[must_use]
    pub fn with_ttl(&self, ttl: u32) -> Self {
        let mut copy = self.clone();
        copy.ttl = ttl;
        copy
    }

    /// Parses a record out of a message at the given offset.
    ///
    /// Returns the record and the number of bytes consumed.
    pub fn parse(message: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (name, name_len) = Name::parse(message, offset)?;

        let fixed = offset + name_len;
        if fixed + 10 > message.len() {
            return Err(Error::buffer_too_short(fixed + 10, message.len()));
        }

        let rtype = RecordType::from_u16(u16::from_be_bytes([message[fixed], message[fixed + 1]]));
        let rclass =
            RecordClass::from_u16(u16::from_be_bytes([message[fixed + 2], message[fixed + 3]]));
        let ttl = u32::from_be_bytes([
            message[fixed + 4],
            message[fixed + 5],
            message[fixed + 6],
            message[fixed + 7],
        ]);
        let rdlength = u16::from_be_bytes([message[fixed + 8], message[fixed + 9]]) as usize;

        let rdata = RData::parse(rtype, message, fixed + 10, rdlength)?;

        Ok((
            Self {
                name,
                rtype,
                rclass,
                ttl,
                rdata,
            },
            name_len + 10 + rdlength,
        ))
    }

    /// Returns the wire format length (uncompressed).
    pub fn wire_len(&self) -> usize {
        self.name.wire_len() + 10 + self.rdata.wire_len()
    }

    /// Writes the record to wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.name.write_wire(buf);
        buf.extend_from_slice(&self.rtype.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.rclass.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.ttl.to_be_bytes());
        buf.extend_from_slice(&(self.rdata.wire_len() as u16).to_be_bytes());
        self.rdata.write_to(buf);
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.name, self.ttl, self.rclass, self.rtype, self.rdata
        )
    }
}

/// Sequential parser for a run of records within a message.
#[derive(Debug)]
pub struct RecordParser<'a> {
    message: &'a [u8],
    offset: usize,
    remaining: u16,
}

impl<'a> RecordParser<'a> {
    /// Creates a parser for `count` records starting at `offset`.
    #[inline]
    pub const fn new(message: &'a [u8], offset: usize, count: u16) -> Self {
        Self {
            message,
            offset,
            remaining: count,
        }
    }

    /// Returns the current offset within the message.
    #[inline]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Parses the next record, or `None` when the run is exhausted.
    pub fn next(&mut self) -> Result<Option<ResourceRecord>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let (record, consumed) = ResourceRecord::parse(self.message, self.offset)?;
        self.offset += consumed;
        self.remaining -= 1;

        Ok(Some(record))
    }
}
