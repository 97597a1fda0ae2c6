//! Local, authoritative resolution: matching a query's questions
//! against the record set and assembling the reply.

use crate::protocol::types::{Message, RecordType};
use crate::zones::Zone;

/// Build an authoritative reply to `query` from the record set, or
/// `None` if no record matches any question name - in which case the
/// caller forwards the query upstream instead.
///
/// Matching is by name alone: every record whose name equals a
/// question name is attached, whatever the question's type and class
/// say.  A records go in the answer section, NS records in the
/// authority section, and everything else in the additional section.
pub fn build_reply(query: &Message, zone: &Zone) -> Option<Message> {
    if query.questions.is_empty() {
        return None;
    }

    let mut matched = Vec::new();
    for question in &query.questions {
        let mut index = None;
        while let Some(found) = zone.find_next_match(&question.name, index) {
            matched.push(zone.records()[found].clone());
            index = Some(found);
        }
    }

    if matched.is_empty() {
        return None;
    }

    let mut reply = query.make_response();
    for rr in matched {
        match rr.rtype {
            RecordType::A => reply.answers.push(rr),
            RecordType::NS => reply.authority.push(rr),
            _ => reply.additional.push(rr),
        }
    }

    Some(reply)
}

#[cfg(test)]
mod tests {
    use crate::protocol::types::*;

    use super::*;

    fn question(name: &str, qtype: QueryType) -> Question {
        Question {
            name: DomainName::from_dotted_string(name).unwrap(),
            qtype,
            qclass: QueryClass::Record(RecordClass::IN),
        }
    }

    fn query(questions: Vec<Question>) -> Message {
        Message {
            header: Header {
                id: 0x00aa,
                is_response: false,
                opcode: Opcode::Standard,
                is_authoritative: false,
                is_truncated: false,
                recursion_desired: true,
                recursion_available: false,
                rcode: Rcode::NoError,
                qdcount: questions.len() as u16,
                ancount: 0,
                nscount: 0,
                arcount: 0,
            },
            questions,
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    fn record(name: &str, rtype: RecordType, rdata: Vec<u8>) -> ResourceRecord {
        ResourceRecord {
            name: DomainName::from_dotted_string(name).unwrap(),
            rtype,
            rclass: RecordClass::IN,
            ttl: 3600,
            rdata,
        }
    }

    fn example_zone() -> Zone {
        let mut zone = Zone::new();
        zone.insert(record(
            "www.example.com.",
            RecordType::A,
            vec![93, 184, 216, 34],
        ));
        zone.insert(record(
            "example.com.",
            RecordType::NS,
            DomainName::from_dotted_string("ns1.example.com.")
                .unwrap()
                .octets,
        ));
        zone.insert(record(
            "alias.example.com.",
            RecordType::CNAME,
            DomainName::from_dotted_string("www.example.com.")
                .unwrap()
                .octets,
        ));
        zone
    }

    #[test]
    fn local_resolution() {
        let query = query(vec![question(
            "www.example.com.",
            QueryType::Record(RecordType::A),
        )]);
        let reply = build_reply(&query, &example_zone()).unwrap();

        assert!(reply.header.is_response);
        assert!(reply.header.is_authoritative);
        assert_eq!(query.header.id, reply.header.id);
        assert_eq!(1, reply.header.qdcount);
        assert_eq!(query.questions, reply.questions);
        assert_eq!(1, reply.answers.len());
        assert_eq!(vec![93, 184, 216, 34], reply.answers[0].rdata);
        assert!(reply.authority.is_empty());
        assert!(reply.additional.is_empty());
    }

    #[test]
    fn no_match_means_forward() {
        let query = query(vec![question(
            "unknown.test.",
            QueryType::Record(RecordType::A),
        )]);

        assert_eq!(None, build_reply(&query, &example_zone()));
    }

    #[test]
    fn no_questions_means_forward() {
        assert_eq!(None, build_reply(&query(Vec::new()), &example_zone()));
    }

    #[test]
    fn empty_zone_means_forward() {
        let query = query(vec![question(
            "www.example.com.",
            QueryType::Record(RecordType::A),
        )]);

        assert_eq!(None, build_reply(&query, &Zone::new()));
    }

    #[test]
    fn matching_ignores_question_type() {
        // a TXT question still picks up the A record: matching is by
        // name only
        let query = query(vec![question(
            "www.example.com.",
            QueryType::Record(RecordType::TXT),
        )]);
        let reply = build_reply(&query, &example_zone()).unwrap();

        assert_eq!(1, reply.answers.len());
        assert_eq!(RecordType::A, reply.answers[0].rtype);
    }

    #[test]
    fn records_are_classified_by_type() {
        let query = query(vec![
            question("example.com.", QueryType::Record(RecordType::NS)),
            question("alias.example.com.", QueryType::Record(RecordType::A)),
        ]);
        let reply = build_reply(&query, &example_zone()).unwrap();

        assert!(reply.answers.is_empty());
        assert_eq!(1, reply.authority.len());
        assert_eq!(RecordType::NS, reply.authority[0].rtype);
        assert_eq!(1, reply.additional.len());
        assert_eq!(RecordType::CNAME, reply.additional[0].rtype);
    }

    #[test]
    fn all_matches_for_a_name_are_attached() {
        let mut zone = example_zone();
        zone.insert(record(
            "www.example.com.",
            RecordType::A,
            vec![93, 184, 216, 35],
        ));

        let query = query(vec![question(
            "www.example.com.",
            QueryType::Record(RecordType::A),
        )]);
        let reply = build_reply(&query, &zone).unwrap();

        assert_eq!(2, reply.answers.len());
        assert_eq!(vec![93, 184, 216, 34], reply.answers[0].rdata);
        assert_eq!(vec![93, 184, 216, 35], reply.answers[1].rdata);
    }
}
