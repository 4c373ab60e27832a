//! The self-signed TLS certificate of a domain.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Days, Months, Utc};
use der::asn1::{BitString, Ia5String, Null, OctetString, UtcTime};
use der::oid::{AssociatedOid, ObjectIdentifier};
use der::pem::LineEnding;
use der::{Any, Encode, EncodePem};
use openssl::hash::MessageDigest;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::sign::Signer;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{BasicConstraints, KeyUsage, KeyUsages, SubjectAltName};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::time::{Time, Validity};
use x509_cert::{Certificate, TbsCertificate, Version};

use crate::error::Result;
use crate::keys::RSA_BITS;
use crate::layout::Layout;
use crate::target::Domain;
use crate::util;

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");

//------------ IssuedCertificate ---------------------------------------------

/// A signed certificate together with its private key.
pub struct IssuedCertificate {
    certificate: Certificate,
    pem: String,
    key_pem: Vec<u8>,
}

impl IssuedCertificate {
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// The certificate as a `CERTIFICATE` PEM block.
    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Write `tls/<name>.crt` and `tls/<name>.key`.
    pub fn persist(&self, layout: &Layout) -> Result<()> {
        util::write_file(layout.tls_certificate(), &self.pem)?;
        util::write_file(layout.tls_key(), &self.key_pem)
    }
}

//------------ Issuing -------------------------------------------------------

/// Issue a self-signed certificate for `domain`.
///
/// Validity starts one day before `now` so that clients with a slightly
/// late clock, or in a time zone behind UTC, already accept it, and ends
/// three calendar months later. The serial number is that start date as
/// `YYYYMMDD00`. The certificate is signed with a fresh RSA key that is
/// used for nothing else.
pub fn issue(domain: &Domain, now: u32) -> Result<IssuedCertificate> {
    let now = DateTime::<Utc>::from_timestamp(now.into(), 0)
        .ok_or("current time is out of range")?;
    let not_before = now
        .checked_sub_days(Days::new(1))
        .ok_or("cannot compute the validity start")?;
    let not_after = not_before
        .checked_add_months(Months::new(3))
        .ok_or("cannot compute the validity end")?;

    let rsa = Rsa::generate(RSA_BITS)?;
    let signature_algorithm = AlgorithmIdentifierOwned {
        oid: SHA256_WITH_RSA,
        parameters: Some(Any::from(Null)),
    };
    let subject_public_key_info = SubjectPublicKeyInfoOwned {
        algorithm: AlgorithmIdentifierOwned {
            oid: RSA_ENCRYPTION,
            parameters: Some(Any::from(Null)),
        },
        subject_public_key: BitString::from_bytes(&rsa.public_key_to_der_pkcs1()?)?,
    };
    let name = Name::from_str(&format!("CN={}", domain.name()))?;

    let tbs_certificate = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(&serial(not_before))?,
        signature: signature_algorithm.clone(),
        issuer: name.clone(),
        validity: Validity {
            not_before: utc_time(not_before)?,
            not_after: utc_time(not_after)?,
        },
        subject: name,
        subject_public_key_info,
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(extensions(domain)?),
    };

    let pkey = PKey::from_rsa(rsa)?;
    let mut signer = Signer::new(MessageDigest::sha256(), &pkey)?;
    signer.update(&tbs_certificate.to_der()?)?;
    let signature = signer.sign_to_vec()?;

    let certificate = Certificate {
        tbs_certificate,
        signature_algorithm,
        signature: BitString::from_bytes(&signature)?,
    };
    let pem = certificate.to_pem(LineEnding::LF)?;
    let key_pem = pkey.rsa()?.private_key_to_pem()?;

    Ok(IssuedCertificate {
        certificate,
        pem,
        key_pem,
    })
}

/// SubjectAltName, BasicConstraints and KeyUsage, none of them critical.
fn extensions(domain: &Domain) -> Result<Vec<Extension>> {
    let alt_names = SubjectAltName(vec![
        GeneralName::DnsName(Ia5String::new(domain.name())?),
        GeneralName::DnsName(Ia5String::new(&format!("*.{}", domain.name()))?),
        GeneralName::IpAddress(OctetString::new(domain.host().octets().to_vec())?),
    ]);
    let constraints = BasicConstraints {
        ca: false,
        path_len_constraint: Some(0),
    };
    let usage = KeyUsage(
        KeyUsages::DigitalSignature
            | KeyUsages::NonRepudiation
            | KeyUsages::KeyEncipherment
            | KeyUsages::DataEncipherment,
    );

    Ok(vec![
        extension(SubjectAltName::OID, alt_names.to_der()?)?,
        extension(BasicConstraints::OID, constraints.to_der()?)?,
        extension(KeyUsage::OID, usage.to_der()?)?,
    ])
}

fn extension(oid: ObjectIdentifier, value: Vec<u8>) -> Result<Extension> {
    Ok(Extension {
        extn_id: oid,
        critical: false,
        extn_value: OctetString::new(value)?,
    })
}

/// The date as `YYYYMMDD00`, in minimal big-endian form.
fn serial(date: DateTime<Utc>) -> Vec<u8> {
    let value: u64 = date.format("%Y%m%d00").to_string().parse().unwrap_or_default();
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
    let mut serial = bytes[start..].to_vec();
    if serial[0] & 0x80 != 0 {
        serial.insert(0, 0);
    }
    serial
}

fn utc_time(time: DateTime<Utc>) -> Result<Time> {
    let secs = u64::try_from(time.timestamp()).map_err(|_| "time before the UNIX epoch")?;
    let time = der::DateTime::from_unix_duration(Duration::from_secs(secs))?;
    Ok(Time::UtcTime(UtcTime::from_date_time(time)?))
}
