//! DNS messages.
//!
//! A message is a header, a question section, and three record sections.
//! OPT pseudo-records in the additional section of incoming messages are
//! discarded during parsing; this resolver does not speak EDNS.

use crate::error::{Error, Result};
use crate::header::{Header, HEADER_SIZE};
use crate::name::Name;
use crate::opcode::OpCode;
use crate::question::Question;
use crate::rcode::ResponseCode;
use crate::record::{RecordParser, ResourceRecord};
use crate::rtype::RecordType;
use bytes::{Bytes, BytesMut};
use std::fmt;

/// A complete DNS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    header: Header,
    questions: Vec<Question>,
    answers: Vec<ResourceRecord>,
    authority: Vec<ResourceRecord>,
    additional: Vec<ResourceRecord>,
}

impl Message {
    /// Creates an empty message with the given header.
    pub fn new(header: Header) -> Self {
        Self {
            header,
            questions: Vec::new(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Creates a query message with a fresh random ID.
    pub fn query(question: Question) -> Self {
        let mut message = Self::new(Header::query());
        message.questions.push(question);
        message.header.qd_count = 1;
        message
    }

    /// Creates the skeleton of a response to the given question.
    ///
    /// Opcode QUERY, QR set, RCODE NOERROR, the question echoed. This is the
    /// initial state of an answer being accumulated by the resolver.
    pub fn response_for(question: &Question) -> Self {
        let mut header = Header::new(0);
        header.opcode = OpCode::Query;
        header.set_response(true);
        header.qd_count = 1;

        let mut message = Self::new(header);
        message.questions.push(question.clone());
        message
    }

    /// Creates a response message mirroring a query's ID, opcode and RD flag.
    pub fn response_from(query: &Message) -> Self {
        let mut message = Self::new(Header::response_from(&query.header));
        message.questions = query.questions.clone();
        message.header.qd_count = message.questions.len() as u16;
        message
    }

    // =========================================================================
    // Header accessors
    // =========================================================================

    /// Returns the header.
    #[inline]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Returns a mutable reference to the header.
    #[inline]
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// Returns the message ID.
    #[inline]
    pub fn id(&self) -> u16 {
        self.header.id
    }

    /// Sets the message ID.
    #[inline]
    pub fn set_id(&mut self, id: u16) {
        self.header.id = id;
    }

    /// Returns the opcode.
    #[inline]
    pub fn opcode(&self) -> OpCode {
        self.header.opcode
    }

    /// Returns the response code.
    #[inline]
    pub fn rcode(&self) -> ResponseCode {
        self.header.rcode
    }

    /// Sets the response code.
    #[inline]
    pub fn set_rcode(&mut self, rcode: ResponseCode) {
        self.header.rcode = rcode;
    }

    /// Returns true if this is a response.
    #[inline]
    pub fn is_response(&self) -> bool {
        self.header.is_response()
    }

    /// Returns true if the TC flag is set.
    #[inline]
    pub fn is_truncated(&self) -> bool {
        self.header.is_truncated()
    }

    // =========================================================================
    // Section accessors
    // =========================================================================

    /// Returns the question section.
    #[inline]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Returns the first question, if any.
    #[inline]
    pub fn question(&self) -> Option<&Question> {
        self.questions.first()
    }

    /// Returns the answer section.
    #[inline]
    pub fn answers(&self) -> &[ResourceRecord] {
        &self.answers
    }

    /// Returns the authority section.
    #[inline]
    pub fn authority(&self) -> &[ResourceRecord] {
        &self.authority
    }

    /// Returns the additional section.
    #[inline]
    pub fn additional(&self) -> &[ResourceRecord] {
        &self.additional
    }

    // =========================================================================
    // Section mutators
    // =========================================================================

    /// Adds a question.
    pub fn add_question(&mut self, question: Question) {
        self.questions.push(question);
        self.header.qd_count = self.questions.len() as u16;
    }

    /// Adds an answer record.
    pub fn add_answer(&mut self, record: ResourceRecord) {
        self.answers.push(record);
        self.header.an_count = self.answers.len() as u16;
    }

    /// Adds multiple answer records.
    pub fn add_answers(&mut self, records: impl IntoIterator<Item = ResourceRecord>) {
        self.answers.extend(records);
        self.header.an_count = self.answers.len() as u16;
    }

    /// Adds an authority record.
    pub fn add_authority(&mut self, record: ResourceRecord) {
        self.authority.push(record);
        self.header.ns_count = self.authority.len() as u16;
    }

    /// Adds multiple authority records.
    pub fn add_authority_records(&mut self, records: impl IntoIterator<Item = ResourceRecord>) {
        self.authority.extend(records);
        self.header.ns_count = self.authority.len() as u16;
    }

    /// Adds an additional record.
    pub fn add_additional(&mut self, record: ResourceRecord) {
        self.additional.push(record);
        self.header.ar_count = self.additional.len() as u16;
    }

    /// Adds multiple additional records.
    pub fn add_additional_records(&mut self, records: impl IntoIterator<Item = ResourceRecord>) {
        self.additional.extend(records);
        self.header.ar_count = self.additional.len() as u16;
    }

    /// Clears the answer section.
    pub fn clear_answers(&mut self) {
        self.answers.clear();
        self.header.an_count = 0;
    }

    /// Clears the authority section.
    pub fn clear_authority(&mut self) {
        self.authority.clear();
        self.header.ns_count = 0;
    }

    /// Clears the additional section.
    pub fn clear_additional(&mut self) {
        self.additional.clear();
        self.header.ar_count = 0;
    }

    /// Turns this message into an error response: all record sections are
    /// cleared, the RCODE is set, the echoed question is preserved.
    pub fn make_error(&mut self, rcode: ResponseCode) {
        self.clear_answers();
        self.clear_authority();
        self.clear_additional();
        self.set_rcode(rcode);
    }

    // =========================================================================
    // Response helpers
    // =========================================================================

    /// Returns true for NOERROR with at least one answer.
    pub fn is_success(&self) -> bool {
        self.rcode().is_success() && !self.answers.is_empty()
    }

    /// Returns true for NXDOMAIN.
    pub fn is_nxdomain(&self) -> bool {
        self.rcode().is_nxdomain()
    }

    /// Returns true for SERVFAIL.
    pub fn is_servfail(&self) -> bool {
        self.rcode().is_server_error()
    }

    /// Returns true if this looks like a referral: no answers, at least one
    /// NS record in authority.
    pub fn is_referral(&self) -> bool {
        self.answers.is_empty()
            && self
                .authority
                .iter()
                .any(|r| r.rtype() == RecordType::Ns)
    }

    /// Returns the owner name of the first NS record in the authority
    /// section, in wire order.
    pub fn first_ns_owner(&self) -> Option<&Name> {
        self.authority
            .iter()
            .find(|r| r.rtype() == RecordType::Ns)
            .map(|r| r.name())
    }

    // =========================================================================
    // Wire format
    // =========================================================================

    /// Parses a message from wire format.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::buffer_too_short(HEADER_SIZE, data.len()));
        }

        let header = Header::parse(data)?;
        let mut offset = HEADER_SIZE;

        let mut questions = Vec::with_capacity(header.qd_count as usize);
        for _ in 0..header.qd_count {
            let (question, consumed) = Question::parse(data, offset)?;
            questions.push(question);
            offset += consumed;
        }

        let mut answers = Vec::with_capacity(header.an_count as usize);
        let mut parser = RecordParser::new(data, offset, header.an_count);
        while let Some(record) = parser.next()? {
            answers.push(record);
        }
        offset = parser.offset();

        let mut authority = Vec::with_capacity(header.ns_count as usize);
        let mut parser = RecordParser::new(data, offset, header.ns_count);
        while let Some(record) = parser.next()? {
            authority.push(record);
        }
        offset = parser.offset();

        let mut additional = Vec::new();
        let mut parser = RecordParser::new(data, offset, header.ar_count);
        while let Some(record) = parser.next()? {
            // No EDNS: OPT pseudo-records are dropped on the floor.
            if record.rtype() != RecordType::Opt {
                additional.push(record);
            }
        }

        let mut header = header;
        header.an_count = answers.len() as u16;
        header.ns_count = authority.len() as u16;
        header.ar_count = additional.len() as u16;

        Ok(Self {
            header,
            questions,
            answers,
            authority,
            additional,
        })
    }

    /// Returns the wire format length (uncompressed).
    pub fn wire_len(&self) -> usize {
        HEADER_SIZE
            + self.questions.iter().map(Question::wire_len).sum::<usize>()
            + self.answers.iter().map(ResourceRecord::wire_len).sum::<usize>()
            + self.authority.iter().map(ResourceRecord::wire_len).sum::<usize>()
            + self.additional.iter().map(ResourceRecord::wire_len).sum::<usize>()
    }

    /// Writes the message to a buffer, recomputing section counts.
    pub fn write_to(&self, buf: &mut BytesMut) {
        let mut header = self.header.clone();
        header.qd_count = self.questions.len() as u16;
        header.an_count = self.answers.len() as u16;
        header.ns_count = self.authority.len() as u16;
        header.ar_count = self.additional.len() as u16;
        header.write_to(buf);

        for q in &self.questions {
            q.write_to(buf);
        }
        for r in &self.answers {
            r.write_to(buf);
        }
        for r in &self.authority {
            r.write_to(buf);
        }
        for r in &self.additional {
            r.write_to(buf);
        }
    }

    /// Serializes the message to wire format bytes.
    pub fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Shrinks the message to fit `max_size` bytes, setting TC if records
    /// were dropped. Additional goes first, then authority, then answers.
    pub fn truncate_to(&mut self, max_size: usize) {
        let mut dropped = false;
        while self.wire_len() > max_size {
            if self.additional.pop().is_some()
                || self.authority.pop().is_some()
                || self.answers.pop().is_some()
            {
                dropped = true;
                continue;
            }
            break;
        }

        if dropped {
            self.header.set_truncated(true);
        }

        self.header.an_count = self.answers.len() as u16;
        self.header.ns_count = self.authority.len() as u16;
        self.header.ar_count = self.additional.len() as u16;
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new(Header::default())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, ";; ->>HEADER<<- {}", self.header)?;

        writeln!(f, ";; QUESTION SECTION:")?;
        for q in &self.questions {
            writeln!(f, ";{}", q)?;
        }

        if !self.answers.is_empty() {
            writeln!(f, ";; ANSWER SECTION:")?;
            for r in &self.answers {
                writeln!(f, "{}", r)?;
            }
        }

        if !self.authority.is_empty() {
            writeln!(f, ";; AUTHORITY SECTION:")?;
            for r in &self.authority {
                writeln!(f, "{}", r)?;
            }
        }

        if !self.additional.is_empty() {
            writeln!(f, ";; ADDITIONAL SECTION:")?;
            for r in &self.additional {
                writeln!(f, "{}", r)?;
            }
        }

        Ok(())
    }
}
