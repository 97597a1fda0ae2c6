//! Reading zone files.
//!
//! The recognised syntax is a small line-oriented subset of RFC 1035
//! master files: `$ORIGIN` and `$TTL` directives, and `A`, `NS`, and
//! `CNAME` records of the form `<name> IN <type> <argument>`, one per
//! line, whitespace-separated.  There are no comments, quoting, or
//! parenthesised continuations; lines that do not match are skipped.

use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;
use tokio::fs::read_to_string;

use crate::protocol::types::{
    DomainName, ProtocolError, RecordClass, RecordType, ResourceRecord,
};
use crate::zones::Zone;

/// The TTL for records seen before any `$TTL` directive.
const DEFAULT_TTL: u32 = 60;

impl Zone {
    /// Read a zone file.  An unreadable file is the caller's problem;
    /// lines that do not parse are skipped.
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let data = read_to_string(path).await?;
        Ok(Self::deserialise(&data))
    }

    /// Parse zone data.  Never fails: anything outside the recognised
    /// subset is logged and skipped, and the records which did parse
    /// are returned in file order.
    pub fn deserialise(data: &str) -> Self {
        let mut zone = Zone::new();

        // names with no origin of their own hang off the root, so a
        // bare `www` before any $ORIGIN still becomes the FQDN `www.`
        let mut origin = DomainName::root_domain();
        let mut default_ttl = DEFAULT_TTL;

        for line in data.lines() {
            let tokens = line.split_whitespace().collect::<Vec<_>>();
            match tokens.as_slice() {
                [] => (),
                ["$ORIGIN", name] => {
                    match DomainName::from_relative_dotted_string(&origin, name) {
                        Ok(name) => origin = name,
                        Err(error) => {
                            tracing::debug!(?line, ?error, "skipping $ORIGIN with invalid name");
                        }
                    }
                }
                ["$TTL", duration] => match parse_ttl(duration) {
                    Some(ttl) => default_ttl = ttl,
                    None => tracing::debug!(?line, "skipping $TTL with invalid duration"),
                },
                [name, "IN", "A", address] => match Ipv4Addr::from_str(address) {
                    Ok(address) => {
                        insert_record(
                            &mut zone,
                            &origin,
                            name,
                            RecordType::A,
                            default_ttl,
                            address.octets().to_vec(),
                            line,
                        );
                    }
                    Err(_) => {
                        tracing::debug!(?line, "skipping A record with invalid address");
                    }
                },
                [name, "IN", "NS", target] => match complete_name(&origin, target) {
                    Ok(target) => {
                        insert_record(
                            &mut zone,
                            &origin,
                            name,
                            RecordType::NS,
                            default_ttl,
                            target.octets,
                            line,
                        );
                    }
                    Err(error) => {
                        tracing::debug!(?line, ?error, "skipping NS record with invalid target");
                    }
                },
                [name, "IN", "CNAME", target] => match complete_name(&origin, target) {
                    Ok(target) => {
                        insert_record(
                            &mut zone,
                            &origin,
                            name,
                            RecordType::CNAME,
                            default_ttl,
                            target.octets,
                            line,
                        );
                    }
                    Err(error) => {
                        tracing::debug!(?line, ?error, "skipping CNAME record with invalid target");
                    }
                },
                _ => tracing::debug!(?line, "skipping unrecognised line"),
            }
        }

        zone
    }
}

/// `@` means the origin itself; anything else is completed against
/// it if not already fully qualified.
fn complete_name(origin: &DomainName, token: &str) -> Result<DomainName, ProtocolError> {
    if token == "@" {
        Ok(origin.clone())
    } else {
        DomainName::from_relative_dotted_string(origin, token)
    }
}

/// Complete the owner name against the origin and add the record.
fn insert_record(
    zone: &mut Zone,
    origin: &DomainName,
    name: &str,
    rtype: RecordType,
    ttl: u32,
    rdata: Vec<u8>,
    line: &str,
) {
    match complete_name(origin, name) {
        Ok(name) => zone.insert(ResourceRecord {
            name,
            rtype,
            rclass: RecordClass::IN,
            ttl,
            rdata,
        }),
        Err(error) => tracing::debug!(?line, ?error, "skipping record with invalid name"),
    }
}

/// Parse a TTL: a decimal number with an optional unit suffix.  An
/// unrecognised suffix means seconds; anything after the first
/// non-digit character is ignored.
fn parse_ttl(token: &str) -> Option<u32> {
    let digits_end = token
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(token.len());
    let number = u32::from_str(&token[..digits_end]).ok()?;

    let multiplier = match token[digits_end..].chars().next() {
        Some('m') => 60,
        Some('h' | 'H') => 60 * 60,
        Some('d' | 'D') => 60 * 60 * 24,
        Some('w' | 'W') => 60 * 60 * 24 * 7,
        Some('M') => 60 * 60 * 24 * 30,
        _ => 1,
    };

    number.checked_mul(multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_zone() {
        let zone_data = "$ORIGIN example.com.\n\
                         $TTL 1h\n\
                         www IN A 93.184.216.34\n";
        let zone = Zone::deserialise(zone_data);

        assert_eq!(1, zone.len());
        let rr = &zone.records()[0];
        assert_eq!("www.example.com.", rr.name.to_dotted_string());
        assert_eq!(RecordType::A, rr.rtype);
        assert_eq!(RecordClass::IN, rr.rclass);
        assert_eq!(3600, rr.ttl);
        assert_eq!(vec![93, 184, 216, 34], rr.rdata);
    }

    #[test]
    fn parse_zone_at_name_is_origin() {
        let zone_data = "$ORIGIN example.com.\n\
                         @ IN A 10.0.0.1\n";
        let zone = Zone::deserialise(zone_data);

        assert_eq!(1, zone.len());
        assert_eq!(
            "example.com.",
            zone.records()[0].name.to_dotted_string()
        );
    }

    #[test]
    fn parse_zone_absolute_name_ignores_origin() {
        let zone_data = "$ORIGIN example.com.\n\
                         mail.example.net. IN A 10.0.0.2\n";
        let zone = Zone::deserialise(zone_data);

        assert_eq!(1, zone.len());
        assert_eq!(
            "mail.example.net.",
            zone.records()[0].name.to_dotted_string()
        );
    }

    #[test]
    fn parse_zone_no_origin_anchors_to_root() {
        let zone = Zone::deserialise("www IN A 10.0.0.3\n");

        assert_eq!(1, zone.len());
        assert_eq!("www.", zone.records()[0].name.to_dotted_string());
    }

    #[test]
    fn parse_zone_default_ttl_is_sixty_seconds() {
        let zone = Zone::deserialise("www. IN A 10.0.0.4\n");

        assert_eq!(60, zone.records()[0].ttl);
    }

    #[test]
    fn parse_zone_ns_rdata_is_wire_labels() {
        let zone_data = "$ORIGIN example.com.\n\
                         @ IN NS ns1\n";
        let zone = Zone::deserialise(zone_data);

        assert_eq!(1, zone.len());
        let rr = &zone.records()[0];
        assert_eq!(RecordType::NS, rr.rtype);
        assert_eq!(
            DomainName::from_dotted_string("ns1.example.com.")
                .unwrap()
                .octets,
            rr.rdata
        );
    }

    #[test]
    fn parse_zone_at_target_is_origin() {
        let zone_data = "$ORIGIN example.com.\n\
                         ns1 IN NS @\n";
        let zone = Zone::deserialise(zone_data);

        assert_eq!(1, zone.len());
        assert_eq!(
            DomainName::from_dotted_string("example.com.").unwrap().octets,
            zone.records()[0].rdata
        );
    }

    #[test]
    fn parse_zone_cname_rdata_is_wire_labels() {
        let zone_data = "$ORIGIN example.com.\n\
                         alias IN CNAME www\n";
        let zone = Zone::deserialise(zone_data);

        assert_eq!(1, zone.len());
        let rr = &zone.records()[0];
        assert_eq!("alias.example.com.", rr.name.to_dotted_string());
        assert_eq!(RecordType::CNAME, rr.rtype);
        assert_eq!(
            DomainName::from_dotted_string("www.example.com.")
                .unwrap()
                .octets,
            rr.rdata
        );
    }

    #[test]
    fn parse_zone_skips_invalid_dotted_quad() {
        let zone_data = "bad IN A 999.1.2.3\n\
                         worse IN A not-an-address\n\
                         good. IN A 10.0.0.5\n";
        let zone = Zone::deserialise(zone_data);

        assert_eq!(1, zone.len());
        assert_eq!("good.", zone.records()[0].name.to_dotted_string());
    }

    #[test]
    fn parse_zone_skips_unrecognised_lines() {
        let zone_data = "; no comment support\n\
                         $INCLUDE other.zone\n\
                         mail. IN MX 10 mx.example.com.\n\
                         just some words\n\
                         \n\
                         ok. IN A 10.0.0.6\n";
        let zone = Zone::deserialise(zone_data);

        assert_eq!(1, zone.len());
        assert_eq!("ok.", zone.records()[0].name.to_dotted_string());
    }

    #[test]
    fn parse_zone_preserves_insertion_order() {
        let zone_data = "b. IN A 10.0.0.2\n\
                         a. IN A 10.0.0.1\n\
                         b. IN A 10.0.0.3\n";
        let zone = Zone::deserialise(zone_data);

        let names = zone
            .records()
            .iter()
            .map(|rr| rr.name.to_dotted_string())
            .collect::<Vec<_>>();
        assert_eq!(vec!["b.", "a.", "b."], names);
        assert_eq!(vec![10, 0, 0, 2], zone.records()[0].rdata);
        assert_eq!(vec![10, 0, 0, 3], zone.records()[2].rdata);
    }

    #[test]
    fn parse_ttl_suffixes() {
        assert_eq!(Some(300), parse_ttl("300"));
        assert_eq!(Some(120), parse_ttl("2m"));
        assert_eq!(Some(3600), parse_ttl("1h"));
        assert_eq!(Some(7200), parse_ttl("2H"));
        assert_eq!(Some(86400), parse_ttl("1d"));
        assert_eq!(Some(172_800), parse_ttl("2D"));
        assert_eq!(Some(604_800), parse_ttl("1w"));
        assert_eq!(Some(1_209_600), parse_ttl("2W"));
        assert_eq!(Some(2_592_000), parse_ttl("1M"));
    }

    #[test]
    fn parse_ttl_unknown_suffix_is_seconds() {
        assert_eq!(Some(5), parse_ttl("5x"));
        assert_eq!(Some(10), parse_ttl("10sec"));
    }

    #[test]
    fn parse_ttl_rejects_non_numbers() {
        assert_eq!(None, parse_ttl("h"));
        assert_eq!(None, parse_ttl(""));
    }
}
