//! Signing the zone.
//!
//! The KSK signs the DNSKEY RRset at the apex and nothing else. The ZSK
//! signs every other RRset, wildcard owners included. Each RRset ends up
//! with exactly one RRSIG.

use domain::base::iana::Rtype;
use domain::dnssec::sign::records::Rrset;
use domain::dnssec::sign::signatures::rrsigs::sign_rrset;
use domain::rdata::dnssec::Timestamp;
use tracing::debug;

use super::{Signature, Zone};
use crate::error::{Context, Result};
use crate::keys::{KeyPair, Role};
use crate::layout::Layout;
use crate::summary::OutputConf;

/// How long signatures stay valid after their inception.
pub const SIGNATURE_VALIDITY: u32 = 365 * 24 * 60 * 60;

/// Sign every RRset of `zone`.
///
/// Fails if the zone has no DNSKEY RRset at its apex or if a key does not
/// belong to the zone or does not have the expected role.
pub fn sign(
    mut zone: Zone,
    ksk: &KeyPair,
    zsk: &KeyPair,
    inception: Timestamp,
    expiration: Timestamp,
) -> Result<Zone> {
    let apex = zone.apex().clone();
    for (key, role) in [(ksk, Role::Ksk), (zsk, Role::Zsk)] {
        crate::ensure!(
            key.role() == role,
            "expected a {} but got a {}",
            role,
            key.role()
        );
        crate::ensure!(
            *key.owner() == apex,
            "the {} belongs to {}, not {}",
            role,
            key.owner(),
            apex
        );
    }
    if zone.rrset(&apex, Rtype::DNSKEY).is_none() {
        crate::bail!("no DNSKEY RRset at the apex of {}", apex);
    }

    for rrset in zone.rrsets_mut() {
        let key = if rrset.rtype() == Rtype::DNSKEY && *rrset.owner() == apex {
            ksk
        } else {
            zsk
        };
        let records = rrset.to_records();
        let records = Rrset::new(&records)
            .map_err(|err| format!("unable to create RRset: {err}"))?;
        let rrsig = sign_rrset(key.signing_key(), &records, inception, expiration)
            .map_err(|err| {
                format!(
                    "error signing {} {} with the {}: {err}",
                    rrset.owner(),
                    rrset.rtype(),
                    key.role()
                )
            })?
            .into_data();
        debug!(
            "Signed {} {} with {} {}",
            rrset.owner(),
            rrset.rtype(),
            key.role(),
            key.tag()
        );
        rrset.set_signature(Signature {
            role: key.role(),
            rrsig,
        });
    }
    Ok(zone)
}

/// Sign `zone` with the keys named in `output.conf`.
///
/// Signatures are valid from `now` for [`SIGNATURE_VALIDITY`] seconds.
pub fn sign_from_disk(zone: Zone, layout: &Layout, conf: &OutputConf, now: u32) -> Result<Zone> {
    let ksk = load_key(layout, Role::Ksk, &conf.kskkey, &conf.kskpriv)?;
    let zsk = load_key(layout, Role::Zsk, &conf.zskkey, &conf.zskpriv)?;
    let inception = Timestamp::from(now);
    let expiration = Timestamp::from(now.wrapping_add(SIGNATURE_VALIDITY));
    sign(zone, &ksk, &zsk, inception, expiration)
}

fn load_key(layout: &Layout, role: Role, key: &str, private: &str) -> Result<KeyPair> {
    let dir = layout.key_dir(role);
    KeyPair::load(role, &dir.join(key), &dir.join(private))
        .with_context(|| format!("loading the {role}"))
}

#[cfg(test)]
mod test {
    use std::net::Ipv4Addr;

    use domain::base::iana::Rtype;
    use domain::base::Name;
    use domain::dnssec::validator::base::RrsigExt;
    use domain::rdata::dnssec::Timestamp;
    use domain::rdata::A;

    use super::sign;
    use crate::cert;
    use crate::keys::{KeyPair, Role};
    use crate::target::Domain;
    use crate::zone::assemble::assemble;
    use crate::zone::{record, Rrset, Zone, ZoneData};

    const NOW: u32 = 1_760_788_800;

    struct Fixture {
        domain: Domain,
        ksk: KeyPair,
        zsk: KeyPair,
        zone: Zone,
    }

    fn fixture() -> Fixture {
        let domain = Domain::new("example.test", Ipv4Addr::new(203, 0, 113, 5)).unwrap();
        let issued = cert::issue(&domain, NOW).unwrap();
        let ksk = KeyPair::generate(Role::Ksk, domain.apex()).unwrap();
        let zsk = KeyPair::generate(Role::Zsk, domain.apex()).unwrap();
        let zone = assemble(&domain, issued.certificate(), ksk.dnskey(), zsk.dnskey()).unwrap();
        Fixture {
            domain,
            ksk,
            zsk,
            zone,
        }
    }

    fn times() -> (Timestamp, Timestamp) {
        (Timestamp::from(NOW), Timestamp::from(NOW + 86400))
    }

    /// Check an RRSIG against the DNSKEY it names, using only the DNSKEY.
    fn verify(rrset: &Rrset, zone: &Zone) -> bool {
        let rrsig = &rrset.signature().unwrap().rrsig;
        let dnskeys = zone.rrset(zone.apex(), Rtype::DNSKEY).unwrap();
        let dnskey = dnskeys
            .records()
            .iter()
            .find_map(|data| match data {
                ZoneData::Dnskey(key) if key.key_tag() == rrsig.key_tag() => Some(key),
                _ => None,
            })
            .unwrap();

        let mut records = rrset.to_records();
        let mut data = Vec::new();
        rrsig.signed_data(&mut data, records.as_mut_slice()).unwrap();
        rrsig.verify_signed_data(dnskey, &data).is_ok()
    }

    #[test]
    fn every_rrset_gets_one_signature_from_the_right_key() {
        let Fixture {
            domain,
            ksk,
            zsk,
            zone,
        } = fixture();
        let (inception, expiration) = times();
        let signed = sign(zone, &ksk, &zsk, inception, expiration).unwrap();

        assert_eq!(signed.rrsets().count(), 5);
        for rrset in signed.rrsets() {
            let signature = rrset.signature().unwrap();
            let expected = match rrset.rtype() {
                Rtype::DNSKEY => &ksk,
                _ => &zsk,
            };
            assert_eq!(signature.role, expected.role());
            assert_eq!(signature.rrsig.key_tag(), expected.tag());
            assert_eq!(signature.rrsig.type_covered(), rrset.rtype());
            assert_eq!(signature.rrsig.signer_name(), domain.apex());
            assert_eq!(signature.rrsig.original_ttl(), rrset.ttl());
            assert_eq!(signature.rrsig.inception(), inception);
            assert_eq!(signature.rrsig.expiration(), expiration);
            assert!(verify(rrset, &signed), "{} {}", rrset.owner(), rrset.rtype());
        }
    }

    #[test]
    fn altered_records_no_longer_verify() {
        let Fixture {
            domain,
            ksk,
            zsk,
            zone,
        } = fixture();
        let (inception, expiration) = times();
        let signed = sign(zone, &ksk, &zsk, inception, expiration).unwrap();

        let rrset = signed.rrset(domain.apex(), Rtype::A).unwrap();
        let rrsig = &rrset.signature().unwrap().rrsig;
        let mut records = vec![record(
            domain.apex().clone(),
            A::new(Ipv4Addr::new(198, 51, 100, 1)),
        )];
        let mut data = Vec::new();
        rrsig.signed_data(&mut data, records.as_mut_slice()).unwrap();
        assert!(rrsig.verify_signed_data(zsk.dnskey(), &data).is_err());

        let mut records = rrset.to_records();
        let mut data = Vec::new();
        rrsig.signed_data(&mut data, records.as_mut_slice()).unwrap();
        assert!(rrsig.verify_signed_data(ksk.dnskey(), &data).is_err());
        assert!(rrsig.verify_signed_data(zsk.dnskey(), &data).is_ok());
    }

    #[test]
    fn labels_skip_the_wildcard() {
        let Fixture {
            domain,
            ksk,
            zsk,
            zone,
        } = fixture();
        let (inception, expiration) = times();
        let signed = sign(zone, &ksk, &zsk, inception, expiration).unwrap();

        let labels = |owner: &Name<Vec<u8>>, rtype| {
            signed
                .rrset(owner, rtype)
                .unwrap()
                .signature()
                .unwrap()
                .rrsig
                .labels()
        };
        let wildcard = domain.wildcard().unwrap();
        assert_eq!(labels(domain.apex(), Rtype::A), 2);
        assert_eq!(labels(&wildcard, Rtype::A), 2);
        assert_eq!(labels(&wildcard, Rtype::TLSA), 2);
        assert_eq!(labels(&domain.tlsa_owner().unwrap(), Rtype::TLSA), 4);
    }

    #[test]
    fn record_order_does_not_change_the_signature() {
        let Fixture {
            domain, ksk, zsk, ..
        } = fixture();
        let (inception, expiration) = times();

        let build = |order: [u8; 2]| {
            let mut zone = Zone::new(domain.apex().clone());
            for last in order {
                let a = A::new(Ipv4Addr::new(203, 0, 113, last));
                zone.insert(record(domain.apex().clone(), a)).unwrap();
            }
            zone.insert(record(domain.apex().clone(), ksk.dnskey().clone()))
                .unwrap();
            sign(zone, &ksk, &zsk, inception, expiration).unwrap()
        };
        let forward = build([5, 6]);
        let backward = build([6, 5]);
        let signature = |zone: &Zone| {
            zone.rrset(domain.apex(), Rtype::A)
                .unwrap()
                .signature()
                .unwrap()
                .rrsig
                .signature()
                .clone()
        };
        assert_eq!(signature(&forward), signature(&backward));
    }

    #[test]
    fn missing_dnskey_or_swapped_keys_fail() {
        let Fixture {
            domain, ksk, zsk, ..
        } = fixture();
        let (inception, expiration) = times();

        let mut zone = Zone::new(domain.apex().clone());
        zone.insert(record(
            domain.apex().clone(),
            A::new(Ipv4Addr::new(203, 0, 113, 5)),
        ))
        .unwrap();
        let err = sign(zone.clone(), &ksk, &zsk, inception, expiration).unwrap_err();
        assert!(err.to_string().contains("no DNSKEY RRset"));

        zone.insert(record(domain.apex().clone(), zsk.dnskey().clone()))
            .unwrap();
        assert!(sign(zone, &zsk, &ksk, inception, expiration).is_err());
    }
}
