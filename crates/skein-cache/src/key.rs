//! Cache key.

use skein_proto::{Name, Question, RecordClass, RecordType};
use std::hash::{Hash, Hasher};

/// Cache key: (owner name, record type, record class).
///
/// The name is lowercased on construction so lookups are case-insensitive.
#[derive(Debug, Clone, Eq)]
pub struct CacheKey {
    name: Name,
    rtype: RecordType,
    rclass: RecordClass,
}

impl CacheKey {
    /// Creates a new cache key.
    pub fn new(name: &Name, rtype: RecordType, rclass: RecordClass) -> Self {
        Self {
            name: name.lowercased(),
            rtype,
            rclass,
        }
    }

    /// Creates a cache key from a question.
    pub fn from_question(question: &Question) -> Self {
        Self::new(&question.qname, question.qtype, question.qclass)
    }

    /// Returns the owner name.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Returns the record type.
    pub fn rtype(&self) -> RecordType {
        self.rtype
    }

    /// Returns the record class.
    pub fn rclass(&self) -> RecordClass {
        self.rclass
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.rtype == other.rtype && self.rclass == other.rclass
    }
}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.rtype.to_u16().hash(state);
        self.rclass.to_u16().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_cache_key_case_insensitive() {
        let key1 = CacheKey::new(
            &Name::from_str("example.com").unwrap(),
            RecordType::A,
            RecordClass::In,
        );
        let key2 = CacheKey::new(
            &Name::from_str("EXAMPLE.COM").unwrap(),
            RecordType::A,
            RecordClass::In,
        );
        assert_eq!(key1, key2);

        use std::collections::hash_map::DefaultHasher;
        let mut h1 = DefaultHasher::new();
        let mut h2 = DefaultHasher::new();
        key1.hash(&mut h1);
        key2.hash(&mut h2);
        assert_eq!(h1.finish(), h2.finish());
    }

    #[test]
    fn test_cache_key_distinguishes_type() {
        let name = Name::from_str("example.com").unwrap();
        let a = CacheKey::new(&name, RecordType::A, RecordClass::In);
        let aaaa = CacheKey::new(&name, RecordType::Aaaa, RecordClass::In);
        assert_ne!(a, aaaa);
    }
}
