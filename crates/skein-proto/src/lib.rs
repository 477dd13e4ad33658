//! # Skein DNS Protocol Library
//!
//! DNS protocol types and wire format handling per RFC 1035, scoped to what
//! an iterative resolver needs: domain names with compression-aware parsing,
//! questions, resource records for the record types resolution actually
//! touches, and whole messages. EDNS is deliberately not implemented; OPT
//! pseudo-records in incoming messages are ignored.
//!
//! ## Example
//!
//! ```rust,ignore
//! use skein_proto::{Message, Name, Question, RecordType, RecordClass};
//! use std::str::FromStr;
//!
//! let question = Question::new(Name::from_str("example.com.")?, RecordType::A, RecordClass::In);
//! let query = Message::query(question);
//! let wire = query.to_wire();
//! let parsed = Message::parse(&wire)?;
//! ```

#![warn(missing_docs)]

pub mod class;
pub mod error;
pub mod header;
pub mod message;
pub mod name;
pub mod opcode;
pub mod question;
pub mod rcode;
pub mod rdata;
pub mod record;
pub mod rtype;

pub use class::RecordClass;
pub use error::{Error, Result};
pub use header::Header;
pub use message::Message;
pub use name::Name;
pub use opcode::OpCode;
pub use question::Question;
pub use rcode::ResponseCode;
pub use rdata::{RData, Soa};
pub use record::ResourceRecord;
pub use rtype::RecordType;

/// Maximum length of a DNS label (RFC 1035).
pub const MAX_LABEL_LENGTH: usize = 63;

/// Maximum wire length of a domain name (RFC 1035).
pub const MAX_NAME_LENGTH: usize = 255;

/// Maximum size of a UDP DNS message without EDNS (RFC 1035).
pub const MAX_UDP_MESSAGE_SIZE: usize = 512;

/// The DNS port.
pub const DNS_PORT: u16 = 53;
