//! Rendering a signed zone as a zone file.

use std::fmt::Write;

use chrono::NaiveDate;
use domain::base::iana::Class;
use domain::base::Record;

use super::{Rrset, Zone, DEFAULT_TTL};
use crate::error::Result;
use crate::target::Domain;

const REFRESH: u32 = 604800;
const RETRY: u32 = 86400;
const EXPIRE: u32 = 2419200;
const MINIMUM: u32 = 604800;

/// The SOA serial for a zone generated on `date`: `YYYYMMDD01`.
pub fn serial_for(date: NaiveDate) -> u32 {
    date.format("%Y%m%d01")
        .to_string()
        .parse()
        .unwrap_or_default()
}

/// Render `zone` as a zone file for `domain`.
///
/// The file starts with a header holding the SOA and NS records, the glue
/// address of the name server and some comments. The records of the zone
/// follow, each RRset with its RRSIG. Every RRset must be signed.
pub fn render(zone: &Zone, domain: &Domain, serial: u32) -> Result<String> {
    let mut body = String::new();
    for rrset in zone.rrsets() {
        render_rrset(&mut body, rrset)?;
    }

    let mut out = header(domain, serial);
    out.push_str(&normalize(&body));
    let len = out.trim_end().len();
    out.truncate(len);
    out.push('\n');
    Ok(out)
}

fn header(domain: &Domain, serial: u32) -> String {
    let fqdn = domain.fqdn();
    let ns = domain.nameserver();
    let upper = domain.name().to_ascii_uppercase();
    let host = domain.host();
    let (ttl, refresh, retry, expire, minimum) = (DEFAULT_TTL, REFRESH, RETRY, EXPIRE, MINIMUM);
    format!(
        ";
; ZONE data file for {upper}
;

$ORIGIN {fqdn}
$TTL {ttl}

@ IN SOA {ns} admin.nic.{fqdn} (
        {serial:>10}   ; SERIAL ; date + increment
        {refresh:>10}   ; REFRESH
        {retry:>10}   ; RETRY
        {expire:>10}   ; EXPIRE
        {minimum:>10} ) ; MINIMUM

;
; Nameserver Info
;

@ IN NS {ns}
; @ IN AAAA <your nameserver IPv6 address>
{ns} IN A {host}

;
; Domain/Website Info
;

; {fqdn} IN AAAA <your webserver IPv6 address>

;
; DANE/DNSSEC
;

"
    )
}

fn render_rrset(out: &mut String, rrset: &Rrset) -> Result<()> {
    for record in rrset.to_records() {
        writeln!(out, "{record}\n")?;
    }

    let Some(signature) = rrset.signature() else {
        crate::bail!(
            "the {} RRset at {} is not signed",
            rrset.rtype(),
            rrset.owner()
        );
    };
    let rrsig = Record::new(
        rrset.owner().clone(),
        Class::IN,
        rrset.ttl(),
        signature.rrsig.clone(),
    );
    writeln!(out, "{rrsig}\n")?;
    Ok(())
}

/// Collapse runs of spaces into one and runs of blank lines into one.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0;
    let mut space = false;
    for ch in text.chars() {
        match ch {
            '\n' => {
                newlines += 1;
                space = false;
                if newlines <= 2 {
                    out.push(ch);
                }
            }
            ' ' => {
                newlines = 0;
                if !space {
                    out.push(ch);
                }
                space = true;
            }
            _ => {
                newlines = 0;
                space = false;
                out.push(ch);
            }
        }
    }
    out
}

#[cfg(test)]
mod test {
    use std::net::Ipv4Addr;

    use chrono::NaiveDate;
    use domain::rdata::dnssec::Timestamp;
    use regex::Regex;

    use super::{normalize, render, serial_for};
    use crate::cert;
    use crate::keys::{KeyPair, Role};
    use crate::target::Domain;
    use crate::zone::assemble::assemble;
    use crate::zone::sign::sign;
    use crate::zone::Zone;

    const NOW: u32 = 1_760_788_800;
    const SERIAL: u32 = 2025101801;

    fn signed() -> (Domain, KeyPair, KeyPair, Zone) {
        let domain = Domain::new("example.test.", Ipv4Addr::new(203, 0, 113, 5)).unwrap();
        let issued = cert::issue(&domain, NOW).unwrap();
        let ksk = KeyPair::generate(Role::Ksk, domain.apex()).unwrap();
        let zsk = KeyPair::generate(Role::Zsk, domain.apex()).unwrap();
        let zone = assemble(&domain, issued.certificate(), ksk.dnskey(), zsk.dnskey()).unwrap();
        let zone = sign(
            zone,
            &ksk,
            &zsk,
            Timestamp::from(NOW),
            Timestamp::from(NOW + 365 * 86400),
        )
        .unwrap();
        (domain, ksk, zsk, zone)
    }

    fn count_lines(text: &str, line: &str) -> usize {
        text.lines().filter(|l| *l == line).count()
    }

    #[test]
    fn apex_address_appears_once() {
        let (domain, _, _, zone) = signed();
        let text = render(&zone, &domain, SERIAL).unwrap();

        assert_eq!(count_lines(&text, "example.test. 21600 IN A 203.0.113.5"), 1);
        assert_eq!(
            count_lines(&text, "*.example.test. 21600 IN A 203.0.113.5"),
            1
        );
        assert_eq!(count_lines(&text, "ns.example.test. IN A 203.0.113.5"), 1);
        assert_eq!(count_lines(&text, "@ IN NS ns.example.test."), 1);
        assert!(!text.contains("@ IN A "));
    }

    #[test]
    fn header_layout() {
        let (domain, _, _, zone) = signed();
        let text = render(&zone, &domain, SERIAL).unwrap();

        assert!(text.starts_with(";\n; ZONE data file for EXAMPLE.TEST\n;\n\n$ORIGIN example.test.\n"));
        assert!(text.contains("$TTL 21600\n"));
        assert!(text.contains("@ IN SOA ns.example.test. admin.nic.example.test. (\n"));
        assert!(text.contains("        2025101801   ; SERIAL"));
        assert!(text.contains("            604800 ) ; MINIMUM\n"));
    }

    #[test]
    fn every_rrset_is_followed_by_its_rrsig() {
        let (domain, ksk, zsk, zone) = signed();
        let text = render(&zone, &domain, SERIAL).unwrap();

        let rrsig = Regex::new(
            r"^(\S+) 21600 IN RRSIG (\S+) (?:8|RSASHA256) (\d) 21600 (\d{10}|\d{14}) (\d{10}|\d{14}) (\d+) example\.test\. [A-Za-z0-9+/]+=*$",
        )
        .unwrap();
        let sigs: Vec<_> = text
            .lines()
            .filter_map(|line| rrsig.captures(line))
            .map(|c| {
                (
                    c[1].to_string(),
                    c[2].to_string(),
                    c[3].parse::<u8>().unwrap(),
                    c[6].parse::<u16>().unwrap(),
                )
            })
            .collect();

        assert_eq!(sigs.len(), 5);
        for (owner, covered, labels, tag) in &sigs {
            let expected = if covered == "DNSKEY" { &ksk } else { &zsk };
            assert_eq!(*tag, expected.tag(), "{owner} {covered}");
            let expected_labels = match owner.as_str() {
                "_443._tcp.example.test." => 4,
                _ => 2,
            };
            assert_eq!(*labels, expected_labels, "{owner} {covered}");
        }
        assert!(sigs.contains(&(
            "*.example.test.".to_string(),
            "TLSA".to_string(),
            2,
            zsk.tag()
        )));

        let tlsa = Regex::new(r"^\*\.example\.test\. 21600 IN TLSA 3 1 1 [0-9A-F]{64}$").unwrap();
        assert_eq!(text.lines().filter(|l| tlsa.is_match(l)).count(), 1);
        let dnskey = Regex::new(r"^example\.test\. 21600 IN DNSKEY (256|257) 3 (?:8|RSASHA256) \S+$").unwrap();
        let flags: Vec<_> = text
            .lines()
            .filter_map(|line| dnskey.captures(line))
            .map(|c| c[1].to_string())
            .collect();
        assert_eq!(flags, ["256", "257"]);
    }

    #[test]
    fn output_is_normalized_and_stable() {
        let (domain, _, _, zone) = signed();
        let first = render(&zone, &domain, SERIAL).unwrap();
        let second = render(&zone, &domain, SERIAL).unwrap();
        assert_eq!(first, second);

        assert!(first.ends_with('\n'));
        assert!(!first.ends_with("\n\n"));
        assert!(!first.contains("\n\n\n"));
        let body = first.split("; DANE/DNSSEC\n;\n").nth(1).unwrap();
        assert!(!body.contains("  "));
    }

    #[test]
    fn unsigned_zones_are_refused() {
        let domain = Domain::new("example.test", Ipv4Addr::new(203, 0, 113, 5)).unwrap();
        let issued = cert::issue(&domain, NOW).unwrap();
        let ksk = KeyPair::generate(Role::Ksk, domain.apex()).unwrap();
        let zsk = KeyPair::generate(Role::Zsk, domain.apex()).unwrap();
        let zone = assemble(&domain, issued.certificate(), ksk.dnskey(), zsk.dnskey()).unwrap();
        assert!(render(&zone, &domain, SERIAL).is_err());
    }

    #[test]
    fn normalization_rules() {
        assert_eq!(normalize("a  b   c\n\n\n\nd\n"), "a b c\n\nd\n");
        assert_eq!(normalize("a \n \n\nb"), "a \n \n\nb");
    }

    #[test]
    fn serial_from_date() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();
        assert_eq!(serial_for(date), 2026010901);
    }
}
