//! Response classification.
//!
//! A pure function that decides what a received message *is* relative to the
//! question that was asked: an answer, a CNAME indirection, a referral, a
//! negative response, or one of a fixed set of error conditions. The caller
//! acts on the category; nothing here mutates resolver state beyond the
//! CNAME chain counter and target it is handed.

use skein_proto::{Message, Name, OpCode, Question, RecordClass, RecordType, ResponseCode};

/// Upper bound on CNAME indirections followed for one query.
pub const MAX_CNAME_CHAIN: usize = 16;

/// What a response means for the question it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// A direct answer to the question.
    Answer,
    /// An answer reached through a CNAME chain completed within the message.
    AnswerCname,
    /// A CNAME chain that leaves the message; the target must be chased.
    Cname,
    /// The name does not exist.
    NxDomain,
    /// The name exists but has no data of the requested type.
    NxRrset,
    /// A delegation to nameservers for a subzone.
    Referral,

    /// No records in any section.
    Empty,
    /// Answer records outside the CNAME chain being followed.
    ExtraData,
    /// Answer records in a class other than the question's.
    InvNameClass,
    /// A record at the chain head of the wrong, non-CNAME type.
    InvType,
    /// The echoed question does not match the one asked.
    MismatchedQuestion,
    /// The answer section mixes classes.
    MultiClass,
    /// The message does not carry exactly one question.
    NotOneQuestion,
    /// A CNAME question answered with more than the CNAME RRset.
    NotSingle,
    /// The message is not a response.
    NotResponse,
    /// The opcode is not QUERY.
    OpCode,
    /// An RCODE other than NOERROR or NXDOMAIN.
    Rcode,
    /// The response was truncated.
    Truncated,
}

impl Category {
    /// Returns true for the error categories, which all terminate a query
    /// with SERVFAIL.
    pub fn is_error(self) -> bool {
        !matches!(
            self,
            Self::Answer
                | Self::AnswerCname
                | Self::Cname
                | Self::NxDomain
                | Self::NxRrset
                | Self::Referral
        )
    }
}

/// Classifies `incoming` against `question`.
///
/// `cname_count` is incremented once per CNAME hop encountered while walking
/// the answer section. When the chain leaves the message, `cname_target` is
/// set to the next name to chase and [`Category::Cname`] is returned. With
/// `follow_cnames` false, the first CNAME encountered terminates the walk
/// the same way.
pub fn classify(
    question: &Question,
    incoming: &Message,
    cname_target: &mut Name,
    cname_count: &mut usize,
    follow_cnames: bool,
) -> Category {
    if !incoming.is_response() {
        return Category::NotResponse;
    }
    if incoming.opcode() != OpCode::Query {
        return Category::OpCode;
    }
    if incoming.questions().len() != 1 {
        return Category::NotOneQuestion;
    }
    if !incoming.questions()[0].matches(question) {
        return Category::MismatchedQuestion;
    }
    if incoming.is_truncated() {
        return Category::Truncated;
    }

    match incoming.rcode() {
        ResponseCode::NXDomain => return Category::NxDomain,
        ResponseCode::NoError => {}
        _ => return Category::Rcode,
    }

    let answers = incoming.answers();

    if answers.is_empty() {
        if incoming.authority().is_empty() && incoming.additional().is_empty() {
            return Category::Empty;
        }
        if incoming.is_referral() {
            return Category::Referral;
        }
        return Category::NxRrset;
    }

    // Class checks over the answer section.
    if question.qclass != RecordClass::Any {
        let mut mismatched = false;
        let mut mixed = false;
        let first_class = answers[0].rclass();
        for record in answers {
            if record.rclass() != first_class {
                mixed = true;
            }
            if record.rclass() != question.qclass {
                mismatched = true;
            }
        }
        if mixed {
            return Category::MultiClass;
        }
        if mismatched {
            return Category::InvNameClass;
        }
    }

    walk_answer_chain(question, incoming, cname_target, cname_count, follow_cnames)
}

/// Walks the answer section from the question name along CNAME indirections.
fn walk_answer_chain(
    question: &Question,
    incoming: &Message,
    cname_target: &mut Name,
    cname_count: &mut usize,
    follow_cnames: bool,
) -> Category {
    let answers = incoming.answers();
    let mut current = question.qname.clone();
    let mut chain: Vec<Name> = Vec::new();
    let mut chained = false;

    loop {
        let at_head: Vec<_> = answers.iter().filter(|r| *r.name() == current).collect();

        if at_head.is_empty() {
            // Answers exist, but none at the head of the chain.
            return Category::ExtraData;
        }

        let terminal = question.qtype == RecordType::Any
            || at_head.iter().any(|r| r.rtype() == question.qtype);

        if terminal {
            chain.push(current);

            // Every answer must belong to the chain that was walked.
            if answers
                .iter()
                .any(|r| !chain.iter().any(|owner| owner == r.name()))
            {
                return Category::ExtraData;
            }

            // A CNAME question is answered by the CNAME RRset alone.
            if question.qtype == RecordType::Cname
                && answers.iter().any(|r| r.rtype() != RecordType::Cname)
            {
                return Category::NotSingle;
            }

            return if chained {
                Category::AnswerCname
            } else {
                Category::Answer
            };
        }

        let Some(target) = at_head.iter().find_map(|r| r.rdata().as_cname()) else {
            // Something at the chain head, but neither the asked type nor a
            // CNAME to follow.
            return Category::InvType;
        };

        *cname_count += 1;

        if !follow_cnames {
            *cname_target = target.clone();
            return Category::Cname;
        }

        chain.push(current.clone());

        // A loop within one message: hand the target back and let the chain
        // counter bound the overall walk.
        if chain.iter().any(|owner| owner == target) {
            *cname_target = target.clone();
            return Category::Cname;
        }

        if !answers.iter().any(|r| r.name() == target) {
            // The chain leaves this message.
            *cname_target = target.clone();
            return Category::Cname;
        }

        chained = true;
        current = target.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skein_proto::ResourceRecord;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    fn question(name: &str) -> Question {
        Question::a(Name::from_str(name).unwrap())
    }

    fn classify_simple(question: &Question, incoming: &Message) -> (Category, Name, usize) {
        let mut target = question.qname.clone();
        let mut count = 0;
        let category = classify(question, incoming, &mut target, &mut count, true);
        (category, target, count)
    }

    fn base_response(question: &Question) -> Message {
        Message::response_for(question)
    }

    #[test]
    fn test_not_a_response() {
        let q = question("x.test");
        let query = Message::query(q.clone());
        let (category, _, _) = classify_simple(&q, &query);
        assert_eq!(category, Category::NotResponse);
        assert!(category.is_error());
    }

    #[test]
    fn test_question_mismatch() {
        let q = question("x.test");
        let other = question("y.test");
        let incoming = base_response(&other);
        let (category, _, _) = classify_simple(&q, &incoming);
        assert_eq!(category, Category::MismatchedQuestion);
    }

    #[test]
    fn test_no_question() {
        let q = question("x.test");
        let mut incoming = base_response(&q);
        // Rebuild with no question at all.
        incoming = {
            let mut header = incoming.header().clone();
            header.qd_count = 0;
            let mut m = Message::new(header);
            m.header_mut().set_response(true);
            m
        };
        let (category, _, _) = classify_simple(&q, &incoming);
        assert_eq!(category, Category::NotOneQuestion);
    }

    #[test]
    fn test_truncated() {
        let q = question("x.test");
        let mut incoming = base_response(&q);
        incoming.header_mut().set_truncated(true);
        let (category, _, _) = classify_simple(&q, &incoming);
        assert_eq!(category, Category::Truncated);
    }

    #[test]
    fn test_nxdomain() {
        let q = question("gone.test");
        let mut incoming = base_response(&q);
        incoming.set_rcode(ResponseCode::NXDomain);
        let (category, _, _) = classify_simple(&q, &incoming);
        assert_eq!(category, Category::NxDomain);
        assert!(!category.is_error());
    }

    #[test]
    fn test_refused_is_rcode_error() {
        let q = question("x.test");
        let mut incoming = base_response(&q);
        incoming.set_rcode(ResponseCode::Refused);
        let (category, _, _) = classify_simple(&q, &incoming);
        assert_eq!(category, Category::Rcode);
    }

    #[test]
    fn test_empty_message() {
        let q = question("x.test");
        let incoming = base_response(&q);
        let (category, _, _) = classify_simple(&q, &incoming);
        assert_eq!(category, Category::Empty);
    }

    #[test]
    fn test_plain_answer() {
        let q = question("x.test");
        let mut incoming = base_response(&q);
        incoming.add_answer(ResourceRecord::a(
            q.qname.clone(),
            300,
            Ipv4Addr::new(1, 2, 3, 4),
        ));
        let (category, _, count) = classify_simple(&q, &incoming);
        assert_eq!(category, Category::Answer);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_answer_through_cname_in_message() {
        let q = question("alias.test");
        let real = Name::from_str("real.test").unwrap();
        let mut incoming = base_response(&q);
        incoming.add_answer(ResourceRecord::cname(q.qname.clone(), 300, real.clone()));
        incoming.add_answer(ResourceRecord::a(real, 300, Ipv4Addr::new(10, 0, 0, 2)));

        let (category, _, count) = classify_simple(&q, &incoming);
        assert_eq!(category, Category::AnswerCname);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_dangling_cname_sets_target() {
        let q = question("alias.test");
        let real = Name::from_str("real.test").unwrap();
        let mut incoming = base_response(&q);
        incoming.add_answer(ResourceRecord::cname(q.qname.clone(), 300, real.clone()));

        let (category, target, count) = classify_simple(&q, &incoming);
        assert_eq!(category, Category::Cname);
        assert_eq!(target, real);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_cname_loop_in_message_terminates() {
        let q = question("a.test");
        let b = Name::from_str("b.test").unwrap();
        let mut incoming = base_response(&q);
        incoming.add_answer(ResourceRecord::cname(q.qname.clone(), 300, b.clone()));
        incoming.add_answer(ResourceRecord::cname(b, 300, q.qname.clone()));

        let (category, target, count) = classify_simple(&q, &incoming);
        assert_eq!(category, Category::Cname);
        assert_eq!(target, q.qname);
        assert!(count >= 1);
    }

    #[test]
    fn test_referral() {
        let q = question("www.sub.test");
        let mut incoming = base_response(&q);
        incoming.add_authority(ResourceRecord::ns(
            Name::from_str("sub.test").unwrap(),
            3600,
            Name::from_str("ns1.sub.test").unwrap(),
        ));

        let (category, _, _) = classify_simple(&q, &incoming);
        assert_eq!(category, Category::Referral);
    }

    #[test]
    fn test_nodata_is_nxrrset() {
        let q = question("x.test");
        let mut incoming = base_response(&q);
        // SOA in authority, no NS delegation: a NODATA response.
        incoming.add_authority(ResourceRecord::new(
            Name::from_str("test").unwrap(),
            RecordType::Soa,
            RecordClass::In,
            900,
            skein_proto::RData::Soa(skein_proto::Soa {
                mname: Name::from_str("ns.test").unwrap(),
                rname: Name::from_str("host.test").unwrap(),
                serial: 1,
                refresh: 3600,
                retry: 600,
                expire: 86400,
                minimum: 900,
            }),
        ));

        let (category, _, _) = classify_simple(&q, &incoming);
        assert_eq!(category, Category::NxRrset);
    }

    #[test]
    fn test_unrelated_answer_is_extra_data() {
        let q = question("x.test");
        let mut incoming = base_response(&q);
        incoming.add_answer(ResourceRecord::a(
            Name::from_str("unrelated.test").unwrap(),
            300,
            Ipv4Addr::new(9, 9, 9, 9),
        ));

        let (category, _, _) = classify_simple(&q, &incoming);
        assert_eq!(category, Category::ExtraData);
    }

    #[test]
    fn test_wrong_type_at_head_is_inv_type() {
        let q = question("x.test");
        let mut incoming = base_response(&q);
        incoming.add_answer(ResourceRecord::ns(
            q.qname.clone(),
            300,
            Name::from_str("ns.x.test").unwrap(),
        ));

        let (category, _, _) = classify_simple(&q, &incoming);
        assert_eq!(category, Category::InvType);
    }

    #[test]
    fn test_wrong_class_is_inv_name_class() {
        let q = question("x.test");
        let mut incoming = base_response(&q);
        incoming.add_answer(ResourceRecord::new(
            q.qname.clone(),
            RecordType::A,
            RecordClass::Ch,
            300,
            skein_proto::RData::A(Ipv4Addr::new(1, 1, 1, 1)),
        ));

        let (category, _, _) = classify_simple(&q, &incoming);
        assert_eq!(category, Category::InvNameClass);
    }

    #[test]
    fn test_mixed_classes_is_multi_class() {
        let q = question("x.test");
        let mut incoming = base_response(&q);
        incoming.add_answer(ResourceRecord::a(
            q.qname.clone(),
            300,
            Ipv4Addr::new(1, 1, 1, 1),
        ));
        incoming.add_answer(ResourceRecord::new(
            q.qname.clone(),
            RecordType::A,
            RecordClass::Ch,
            300,
            skein_proto::RData::A(Ipv4Addr::new(2, 2, 2, 2)),
        ));

        let (category, _, _) = classify_simple(&q, &incoming);
        assert_eq!(category, Category::MultiClass);
    }

    #[test]
    fn test_cname_question_answered_directly() {
        let q = Question::new(
            Name::from_str("alias.test").unwrap(),
            RecordType::Cname,
            RecordClass::In,
        );
        let mut incoming = base_response(&q);
        incoming.add_answer(ResourceRecord::cname(
            q.qname.clone(),
            300,
            Name::from_str("real.test").unwrap(),
        ));

        let (category, _, count) = classify_simple(&q, &incoming);
        assert_eq!(category, Category::Answer);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_chain_counter_accumulates_across_calls() {
        let q = question("hop0.test");
        let mut count = 5; // pretend five hops already happened
        let mut target = q.qname.clone();

        let next = Name::from_str("hop1.test").unwrap();
        let mut incoming = base_response(&q);
        incoming.add_answer(ResourceRecord::cname(q.qname.clone(), 300, next));

        let category = classify(&q, &incoming, &mut target, &mut count, true);
        assert_eq!(category, Category::Cname);
        assert_eq!(count, 6);
    }
}
