//! Record data carried by a provisioned zone.

use std::cmp::Ordering;
use std::fmt;

use domain::base::cmp::CanonicalOrd;
use domain::base::iana::Rtype;
use domain::base::rdata::{ComposeRecordData, RecordData};
use domain::base::wire::{Compose, Composer};
use domain::rdata::{Dnskey, A};
use domain::utils::base16;

use crate::error::Error;

//------------ ZoneData ------------------------------------------------------

/// The record types a provisioned zone contains.
#[derive(Clone, Debug, PartialEq)]
pub enum ZoneData {
    A(A),
    Tlsa(Tlsa),
    Dnskey(Dnskey<Vec<u8>>),
}

impl RecordData for ZoneData {
    fn rtype(&self) -> Rtype {
        match self {
            ZoneData::A(data) => data.rtype(),
            ZoneData::Tlsa(data) => data.rtype(),
            ZoneData::Dnskey(data) => data.rtype(),
        }
    }
}

impl ComposeRecordData for ZoneData {
    fn rdlen(&self, compress: bool) -> Option<u16> {
        match self {
            ZoneData::A(data) => data.rdlen(compress),
            ZoneData::Tlsa(data) => data.rdlen(compress),
            ZoneData::Dnskey(data) => data.rdlen(compress),
        }
    }

    fn compose_rdata<Target: Composer + ?Sized>(
        &self,
        target: &mut Target,
    ) -> Result<(), Target::AppendError> {
        match self {
            ZoneData::A(data) => data.compose_rdata(target),
            ZoneData::Tlsa(data) => data.compose_rdata(target),
            ZoneData::Dnskey(data) => data.compose_rdata(target),
        }
    }

    fn compose_canonical_rdata<Target: Composer + ?Sized>(
        &self,
        target: &mut Target,
    ) -> Result<(), Target::AppendError> {
        match self {
            ZoneData::A(data) => data.compose_canonical_rdata(target),
            ZoneData::Tlsa(data) => data.compose_canonical_rdata(target),
            ZoneData::Dnskey(data) => data.compose_canonical_rdata(target),
        }
    }
}

//--- CanonicalOrd

impl CanonicalOrd for ZoneData {
    fn canonical_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ZoneData::A(left), ZoneData::A(right)) => left.canonical_cmp(right),
            (ZoneData::Tlsa(left), ZoneData::Tlsa(right)) => left.canonical_cmp(right),
            (ZoneData::Dnskey(left), ZoneData::Dnskey(right)) => left.canonical_cmp(right),
            _ => self.rtype().to_int().cmp(&other.rtype().to_int()),
        }
    }
}

//--- Conversions

impl From<A> for ZoneData {
    fn from(data: A) -> Self {
        ZoneData::A(data)
    }
}

impl From<Tlsa> for ZoneData {
    fn from(data: Tlsa) -> Self {
        ZoneData::Tlsa(data)
    }
}

impl From<Dnskey<Vec<u8>>> for ZoneData {
    fn from(data: Dnskey<Vec<u8>>) -> Self {
        ZoneData::Dnskey(data)
    }
}

//--- Display

impl fmt::Display for ZoneData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneData::A(data) => data.fmt(f),
            ZoneData::Tlsa(data) => data.fmt(f),
            ZoneData::Dnskey(data) => data.fmt(f),
        }
    }
}

//------------ Tlsa ----------------------------------------------------------

/// TLSA record data, binding a TLS certificate to a name (RFC 6698).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tlsa {
    usage: u8,
    selector: u8,
    matching_type: u8,
    data: Vec<u8>,
}

impl Tlsa {
    /// DANE-EE: the record matches the end entity certificate itself.
    pub const USAGE_DANE_EE: u8 = 3;

    /// The SubjectPublicKeyInfo rather than the full certificate.
    pub const SELECTOR_SPKI: u8 = 1;

    /// The SHA-256 digest of the selected content.
    pub const MATCHING_SHA256: u8 = 1;

    pub fn new(
        usage: u8,
        selector: u8,
        matching_type: u8,
        data: Vec<u8>,
    ) -> Result<Self, Error> {
        if u16::try_from(data.len() + 3).is_err() {
            return Err("TLSA association data too long".into());
        }
        Ok(Tlsa {
            usage,
            selector,
            matching_type,
            data,
        })
    }

    pub fn usage(&self) -> u8 {
        self.usage
    }

    pub fn selector(&self) -> u8 {
        self.selector
    }

    pub fn matching_type(&self) -> u8 {
        self.matching_type
    }

    /// The certificate association data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl RecordData for Tlsa {
    fn rtype(&self) -> Rtype {
        Rtype::TLSA
    }
}

impl ComposeRecordData for Tlsa {
    fn rdlen(&self, _compress: bool) -> Option<u16> {
        u16::try_from(self.data.len() + 3).ok()
    }

    fn compose_rdata<Target: Composer + ?Sized>(
        &self,
        target: &mut Target,
    ) -> Result<(), Target::AppendError> {
        self.usage.compose(target)?;
        self.selector.compose(target)?;
        self.matching_type.compose(target)?;
        target.append_slice(&self.data)
    }

    fn compose_canonical_rdata<Target: Composer + ?Sized>(
        &self,
        target: &mut Target,
    ) -> Result<(), Target::AppendError> {
        self.compose_rdata(target)
    }
}

impl CanonicalOrd for Tlsa {
    fn canonical_cmp(&self, other: &Self) -> Ordering {
        // The RDATA has no names, so this is its wire format order.
        (self.usage, self.selector, self.matching_type, &self.data).cmp(&(
            other.usage,
            other.selector,
            other.matching_type,
            &other.data,
        ))
    }
}

impl fmt::Display for Tlsa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} ", self.usage, self.selector, self.matching_type)?;
        base16::display(&self.data, f)
    }
}
