//! DNS domain names.
//!
//! Names are stored in uncompressed wire format (length-prefixed labels,
//! terminated by the root label). Comparison and hashing are case-insensitive
//! per RFC 1035. Parsing from a message follows compression pointers; stored
//! names never contain them.

use crate::error::{Error, Result};
use crate::{MAX_LABEL_LENGTH, MAX_NAME_LENGTH};
use bytes::BytesMut;
use compact_str::CompactString;
use smallvec::SmallVec;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Maximum compression pointer jumps tolerated while parsing one name.
const MAX_COMPRESSION_JUMPS: usize = 32;

/// A DNS domain name.
///
/// ```rust
/// use skein_proto::Name;
/// use std::str::FromStr;
///
/// let name = Name::from_str("www.example.com.").unwrap();
/// assert_eq!(name.label_count(), 4); // www, example, com, root
/// assert_eq!(Name::from_str("WWW.EXAMPLE.COM.").unwrap(), name);
/// ```
#[derive(Clone)]
pub struct Name {
    /// Uncompressed wire form, including the terminating zero label.
    wire: SmallVec<[u8; 64]>,
    /// Number of labels, counting the root.
    label_count: u8,
}

impl Name {
    /// Creates the root domain name.
    #[inline]
    pub fn root() -> Self {
        Self {
            wire: SmallVec::from_slice(&[0]),
            label_count: 1,
        }
    }

    /// Creates a name from uncompressed wire format bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let label_count = Self::validate_wire(slice)?;
        Ok(Self {
            wire: SmallVec::from_slice(slice),
            label_count,
        })
    }

    /// Parses a (possibly compressed) name out of a full DNS message.
    ///
    /// Returns the name and the number of bytes consumed at `offset` in the
    /// original message (compression targets do not count toward it).
    pub fn parse(message: &[u8], offset: usize) -> Result<(Self, usize)> {
        let mut wire = SmallVec::<[u8; 64]>::new();
        let mut label_count = 0u8;
        let mut pos = offset;
        let mut consumed = None;
        let mut jumps = 0usize;

        loop {
            let len = *message.get(pos).ok_or(Error::unexpected_eof(pos))? as usize;

            if len & 0xC0 == 0xC0 {
                // Compression pointer: two bytes, must point backwards.
                let low = *message.get(pos + 1).ok_or(Error::unexpected_eof(pos + 1))? as usize;
                let target = ((len & 0x3F) << 8) | low;
                if target >= pos {
                    return Err(Error::InvalidCompressionPointer {
                        offset: pos,
                        target,
                    });
                }
                if consumed.is_none() {
                    consumed = Some(pos + 2 - offset);
                }
                jumps += 1;
                if jumps > MAX_COMPRESSION_JUMPS {
                    return Err(Error::TooManyCompressionJumps {
                        max_jumps: MAX_COMPRESSION_JUMPS,
                    });
                }
                pos = target;
                continue;
            }

            if len > MAX_LABEL_LENGTH {
                return Err(Error::LabelTooLong { length: len });
            }

            if pos + 1 + len > message.len() {
                return Err(Error::unexpected_eof(pos + 1 + len));
            }

            wire.extend_from_slice(&message[pos..pos + 1 + len]);
            if wire.len() > MAX_NAME_LENGTH {
                return Err(Error::NameTooLong { length: wire.len() });
            }
            label_count = label_count
                .checked_add(1)
                .ok_or(Error::NameTooLong { length: wire.len() })?;
            pos += 1 + len;

            if len == 0 {
                break;
            }
        }

        let consumed = consumed.unwrap_or(pos - offset);
        Ok((Self { wire, label_count }, consumed))
    }

    /// Validates uncompressed wire format and counts labels.
    fn validate_wire(bytes: &[u8]) -> Result<u8> {
        if bytes.is_empty() {
            return Err(Error::unexpected_eof(0));
        }

        let mut pos = 0;
        let mut labels = 0u8;

        loop {
            let len = *bytes.get(pos).ok_or(Error::unexpected_eof(pos))? as usize;

            if len & 0xC0 == 0xC0 {
                return Err(Error::invalid_data(pos, "compression pointer in stored name"));
            }
            if len > MAX_LABEL_LENGTH {
                return Err(Error::LabelTooLong { length: len });
            }

            pos += 1 + len;
            if pos > bytes.len() {
                return Err(Error::unexpected_eof(pos));
            }
            if pos > MAX_NAME_LENGTH {
                return Err(Error::NameTooLong { length: pos });
            }
            labels = labels
                .checked_add(1)
                .ok_or(Error::NameTooLong { length: pos })?;

            if len == 0 {
                if pos != bytes.len() {
                    return Err(Error::invalid_data(pos, "trailing bytes after root label"));
                }
                return Ok(labels);
            }
        }
    }

    /// Returns the uncompressed wire form.
    #[inline]
    pub fn as_wire(&self) -> &[u8] {
        &self.wire
    }

    /// Returns the wire length including the terminating zero.
    #[inline]
    pub fn wire_len(&self) -> usize {
        self.wire.len()
    }

    /// Returns the number of labels, counting the root.
    #[inline]
    pub const fn label_count(&self) -> usize {
        self.label_count as usize
    }

    /// Returns true for the root domain.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.wire.len() == 1
    }

    /// Returns an iterator over the labels, leftmost first, root last.
    #[inline]
    pub fn labels(&self) -> LabelIter<'_> {
        LabelIter {
            wire: &self.wire,
            pos: 0,
            done: false,
        }
    }

    /// Returns the parent domain (strips the leftmost label).
    ///
    /// Returns `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let first = self.wire[0] as usize;
        Self::from_slice(&self.wire[1 + first..]).ok()
    }

    /// Returns true if `self` equals `other` or sits below it in the tree.
    pub fn is_subdomain_of(&self, other: &Name) -> bool {
        if self.label_count() < other.label_count() {
            return false;
        }

        let self_labels: SmallVec<[&[u8]; 8]> = self.labels().collect();
        let other_labels: SmallVec<[&[u8]; 8]> = other.labels().collect();

        for (i, other_label) in other_labels.iter().rev().enumerate() {
            let own = self_labels[self_labels.len() - 1 - i];
            if !own.eq_ignore_ascii_case(other_label) {
                return false;
            }
        }
        true
    }

    /// Returns a lowercased copy of the name.
    #[must_use]
    pub fn lowercased(&self) -> Self {
        let mut copy = self.clone();
        for byte in copy.wire.iter_mut() {
            byte.make_ascii_lowercase();
        }
        copy
    }

    /// Writes the wire form into a buffer.
    #[inline]
    pub fn write_wire(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.wire);
    }

    /// Returns the dotted string form, always with a trailing dot.
    pub fn to_dotted(&self) -> CompactString {
        let mut out = CompactString::new("");
        for label in self.labels() {
            if label.is_empty() {
                break;
            }
            for &byte in label {
                if byte.is_ascii_graphic() && byte != b'.' {
                    out.push(byte as char);
                } else {
                    out.push_str(&format!("\\{:03}", byte));
                }
            }
            out.push('.');
        }
        if out.is_empty() {
            out.push('.');
        }
        out
    }
}

impl FromStr for Name {
    type Err = Error;

    /// Parses the standard dotted form; a missing trailing dot is implied.
    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() || s == "." {
            return Ok(Self::root());
        }

        let s = s.strip_suffix('.').unwrap_or(s);
        let mut wire = SmallVec::<[u8; 64]>::new();
        let mut label_count = 0u8;

        for part in s.split('.') {
            if part.is_empty() {
                return Err(Error::invalid_data(0, "empty label"));
            }
            if part.len() > MAX_LABEL_LENGTH {
                return Err(Error::LabelTooLong { length: part.len() });
            }
            for (i, c) in part.chars().enumerate() {
                if !c.is_ascii_alphanumeric() && c != '-' && c != '_' && c != '*' {
                    return Err(Error::InvalidLabelChar {
                        character: c,
                        position: i,
                    });
                }
            }
            wire.push(part.len() as u8);
            wire.extend_from_slice(part.as_bytes());
            label_count += 1;
        }

        wire.push(0);
        label_count += 1;

        if wire.len() > MAX_NAME_LENGTH {
            return Err(Error::NameTooLong { length: wire.len() });
        }

        Ok(Self { wire, label_count })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_dotted())
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name(\"{}\")", self)
    }
}

impl PartialEq for Name {
    /// Case-insensitive comparison per DNS semantics.
    fn eq(&self, other: &Self) -> bool {
        self.wire.len() == other.wire.len()
            && self
                .wire
                .iter()
                .zip(other.wire.iter())
                .all(|(a, b)| a.eq_ignore_ascii_case(b))
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.wire.iter() {
            byte.to_ascii_lowercase().hash(state);
        }
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::root()
    }
}

/// Iterator over the labels of a name as raw byte slices.
pub struct LabelIter<'a> {
    wire: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> Iterator for LabelIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let len = *self.wire.get(self.pos)? as usize;
        let start = self.pos + 1;
        if len == 0 {
            self.done = true;
            return Some(&[]);
        }
        self.pos = start + len;
        self.wire.get(start..start + len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_name() {
        let root = Name::root();
        assert!(root.is_root());
        assert_eq!(root.label_count(), 1);
        assert_eq!(root.to_string(), ".");
        assert_eq!(root.wire_len(), 1);
    }

    #[test]
    fn test_name_parsing() {
        let name = Name::from_str("www.example.com.").unwrap();
        assert!(!name.is_root());
        assert_eq!(name.label_count(), 4);
        assert_eq!(name.to_string(), "www.example.com.");

        let name2 = Name::from_str("www.example.com").unwrap();
        assert_eq!(name, name2);
    }

    #[test]
    fn test_case_insensitive_comparison() {
        let lower = Name::from_str("www.example.com").unwrap();
        let upper = Name::from_str("WWW.EXAMPLE.COM").unwrap();
        assert_eq!(lower, upper);

        use std::collections::hash_map::DefaultHasher;
        let mut h1 = DefaultHasher::new();
        let mut h2 = DefaultHasher::new();
        lower.hash(&mut h1);
        upper.hash(&mut h2);
        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn test_parent() {
        let name = Name::from_str("www.example.com").unwrap();
        let parent = name.parent().unwrap();
        assert_eq!(parent.to_string(), "example.com.");
        let grandparent = parent.parent().unwrap();
        assert_eq!(grandparent.to_string(), "com.");
        let root = grandparent.parent().unwrap();
        assert!(root.is_root());
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_subdomain_check() {
        let name = Name::from_str("www.example.com").unwrap();
        let parent = Name::from_str("example.com").unwrap();
        let other = Name::from_str("other.com").unwrap();

        assert!(name.is_subdomain_of(&parent));
        assert!(name.is_subdomain_of(&name));
        assert!(name.is_subdomain_of(&Name::root()));
        assert!(!parent.is_subdomain_of(&name));
        assert!(!name.is_subdomain_of(&other));
    }

    #[test]
    fn test_wire_roundtrip() {
        let name = Name::from_str("a.bc.def").unwrap();
        let mut buf = BytesMut::new();
        name.write_wire(&mut buf);
        let (parsed, consumed) = Name::parse(&buf, 0).unwrap();
        assert_eq!(consumed, name.wire_len());
        assert_eq!(parsed, name);
    }

    #[test]
    fn test_compression_pointer() {
        // "example.com." at offset 0, then a pointer to it at offset 13.
        let mut message = Vec::new();
        message.extend_from_slice(b"\x07example\x03com\x00");
        message.extend_from_slice(&[0xC0, 0x00]);

        let (parsed, consumed) = Name::parse(&message, 13).unwrap();
        assert_eq!(consumed, 2);
        assert_eq!(parsed.to_string(), "example.com.");
    }

    #[test]
    fn test_forward_pointer_rejected() {
        let message = [0xC0u8, 0x02, 0x00];
        assert!(matches!(
            Name::parse(&message, 0),
            Err(Error::InvalidCompressionPointer { .. })
        ));
    }

    #[test]
    fn test_label_too_long() {
        let long_label = "a".repeat(64);
        assert!(matches!(
            Name::from_str(&long_label),
            Err(Error::LabelTooLong { .. })
        ));
    }

    #[test]
    fn test_labels_iterator() {
        let name = Name::from_str("www.example.com").unwrap();
        let labels: Vec<&[u8]> = name.labels().collect();
        assert_eq!(labels, vec![&b"www"[..], &b"example"[..], &b"com"[..], &b""[..]]);
    }
}
