//! DNS question section.

use crate::class::RecordClass;
use crate::error::{Error, Result};
use crate::name::Name;
use crate::rtype::RecordType;
use bytes::BytesMut;
use std::fmt;

/// A DNS question: what is being asked of the DNS.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Question {
    /// The domain name being queried.
    pub qname: Name,
    /// The record type being requested.
    pub qtype: RecordType,
    /// The class of the query.
    pub qclass: RecordClass,
}

impl Question {
    /// Creates a new question.
    #[inline]
    pub fn new(qname: Name, qtype: RecordType, qclass: RecordClass) -> Self {
        Self {
            qname,
            qtype,
            qclass,
        }
    }

    /// Creates an A-record question in class IN.
    #[inline]
    pub fn a(name: Name) -> Self {
        Self::new(name, RecordType::A, RecordClass::In)
    }

    /// Creates an AAAA-record question in class IN.
    #[inline]
    pub fn aaaa(name: Name) -> Self {
        Self::new(name, RecordType::Aaaa, RecordClass::In)
    }

    /// Returns true if this question matches another.
    ///
    /// The name comparison is case-insensitive; type and class are exact.
    pub fn matches(&self, other: &Question) -> bool {
        self.qname == other.qname && self.qtype == other.qtype && self.qclass == other.qclass
    }

    /// Parses a question out of a message at the given offset.
    ///
    /// Returns the question and the number of bytes consumed.
    pub fn parse(message: &[u8], offset: usize) -> Result<(Self, usize)> {
        let (qname, name_len) = Name::parse(message, offset)?;

        let fixed = offset + name_len;
        if fixed + 4 > message.len() {
            return Err(Error::buffer_too_short(fixed + 4, message.len()));
        }

        let qtype = RecordType::from_u16(u16::from_be_bytes([message[fixed], message[fixed + 1]]));
        let qclass =
            RecordClass::from_u16(u16::from_be_bytes([message[fixed + 2], message[fixed + 3]]));

        Ok((
            Self {
                qname,
                qtype,
                qclass,
            },
            name_len + 4,
        ))
    }

    /// Returns the wire format length of this question.
    #[inline]
    pub fn wire_len(&self) -> usize {
        self.qname.wire_len() + 4
    }

    /// Writes the question to wire format.
    pub fn write_to(&self, buf: &mut BytesMut) {
        self.qname.write_wire(buf);
        buf.extend_from_slice(&self.qtype.to_u16().to_be_bytes());
        buf.extend_from_slice(&self.qclass.to_u16().to_be_bytes());
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.qname, self.qclass, self.qtype)
    }
}
