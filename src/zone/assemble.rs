//! Building the unsigned zone.

use der::{DecodePem, Encode};
use domain::rdata::{Dnskey, A};
use x509_cert::Certificate;

use super::{record, Tlsa, Zone};
use crate::error::Result;
use crate::keys::{self, Role};
use crate::layout::Layout;
use crate::summary::OutputConf;
use crate::target::Domain;
use crate::util;

/// Build the unsigned zone for `domain`.
///
/// The zone holds the apex and wildcard A records, a TLSA record for
/// HTTPS derived from `certificate` together with its wildcard copy, and
/// the DNSKEY records of both keys at the apex.
pub fn assemble(
    domain: &Domain,
    certificate: &Certificate,
    ksk: &Dnskey<Vec<u8>>,
    zsk: &Dnskey<Vec<u8>>,
) -> Result<Zone> {
    let apex = domain.apex().clone();
    let wildcard = domain.wildcard()?;
    let mut zone = Zone::new(apex.clone());

    let host = A::new(domain.host());
    zone.insert(record(apex.clone(), host.clone()))?;
    zone.insert(record(wildcard.clone(), host))?;

    // The wildcard TLSA is a copy of the apex one under another owner, so
    // both always carry the same association data.
    let tlsa = record(domain.tlsa_owner()?, tlsa_for_certificate(certificate)?);
    let tlsa_wildcard = record(wildcard, tlsa.data().clone());
    zone.insert(tlsa)?;
    zone.insert(tlsa_wildcard)?;

    crate::ensure!(
        zsk.is_zone_key() && !zsk.is_secure_entry_point(),
        "the zone-signing key has flags {}",
        zsk.flags()
    );
    crate::ensure!(
        ksk.is_zone_key() && ksk.is_secure_entry_point(),
        "the key-signing key has flags {}",
        ksk.flags()
    );
    zone.insert(record(apex.clone(), zsk.clone()))?;
    zone.insert(record(apex, ksk.clone()))?;

    Ok(zone)
}

/// Build the unsigned zone from the files a previous stage left on disk.
///
/// The certificate is read from its PEM file and the DNSKEY records from
/// the `.key` files named in `output.conf`.
pub fn assemble_from_disk(domain: &Domain, layout: &Layout, conf: &OutputConf) -> Result<Zone> {
    let path = layout.tls_certificate();
    let pem = util::read_file(&path)?;
    let certificate = Certificate::from_pem(pem.as_bytes())
        .map_err(|err| format!("cannot decode certificate '{}': {err}", path.display()))?;

    let ksk = read_dnskey(domain, layout, Role::Ksk, &conf.kskkey)?;
    let zsk = read_dnskey(domain, layout, Role::Zsk, &conf.zskkey)?;
    assemble(domain, &certificate, &ksk, &zsk)
}

fn read_dnskey(
    domain: &Domain,
    layout: &Layout,
    role: Role,
    file: &str,
) -> Result<Dnskey<Vec<u8>>> {
    let path = layout.key_dir(role).join(file);
    let (owner, dnskey) = keys::read_public_key(&path)?;
    crate::ensure!(
        owner == *domain.apex(),
        "'{}' is a key for {}, not {}",
        path.display(),
        owner,
        domain
    );
    Ok(dnskey)
}

/// A DANE-EE TLSA record matching the SHA-256 digest of the certificate's
/// SubjectPublicKeyInfo.
pub fn tlsa_for_certificate(certificate: &Certificate) -> Result<Tlsa> {
    let spki = certificate.tbs_certificate.subject_public_key_info.to_der()?;
    Tlsa::new(
        Tlsa::USAGE_DANE_EE,
        Tlsa::SELECTOR_SPKI,
        Tlsa::MATCHING_SHA256,
        openssl::sha::sha256(&spki).to_vec(),
    )
}
