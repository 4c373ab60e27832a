//! The zone of a provisioned domain.
//!
//! A [`Zone`] keeps its owner names in insertion order and, per owner, its
//! RRsets in insertion order, so rendering is reproducible. Each RRset has
//! room for exactly one signature.

pub mod assemble;
pub mod data;
pub mod render;
pub mod sign;

use domain::base::iana::{Class, Rtype};
use domain::base::rdata::RecordData;
use domain::base::{Name, Record, Ttl};
use domain::rdata::Rrsig;

use crate::error::Result;
use crate::keys::Role;

pub use self::data::{Tlsa, ZoneData};

/// TTL of every record in the zone.
pub const DEFAULT_TTL: u32 = 21600;

/// A record as stored in a [`Zone`].
pub type ZoneRecord = Record<Name<Vec<u8>>, ZoneData>;

/// Build an IN record with the zone-wide TTL.
pub fn record(owner: Name<Vec<u8>>, data: impl Into<ZoneData>) -> ZoneRecord {
    Record::new(owner, Class::IN, Ttl::from_secs(DEFAULT_TTL), data.into())
}

//------------ Zone ----------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Zone {
    apex: Name<Vec<u8>>,
    nodes: Vec<Node>,
}

impl Zone {
    pub fn new(apex: Name<Vec<u8>>) -> Self {
        Zone {
            apex,
            nodes: Vec::new(),
        }
    }

    pub fn apex(&self) -> &Name<Vec<u8>> {
        &self.apex
    }

    /// Add a record to the RRset for its owner and type.
    ///
    /// Adding a record that is already present does nothing. Changing an
    /// RRset drops any signature it carried.
    pub fn insert(&mut self, record: ZoneRecord) -> Result<()> {
        crate::ensure!(
            record.class() == Class::IN,
            "unsupported class {} for {}",
            record.class(),
            record.owner()
        );
        let owner = record.owner().clone();
        let ttl = record.ttl();
        let data = record.data().clone();
        let rtype = data.rtype();
        let index = match self.nodes.iter().position(|node| node.owner == owner) {
            Some(index) => index,
            None => {
                self.nodes.push(Node {
                    owner: owner.clone(),
                    rrsets: Vec::new(),
                });
                self.nodes.len() - 1
            }
        };
        let node = &mut self.nodes[index];

        match node.rrsets.iter_mut().find(|rrset| rrset.rtype == rtype) {
            Some(rrset) => {
                crate::ensure!(
                    rrset.ttl == ttl,
                    "TTL {} differs from {} for the {} RRset at {}",
                    ttl.as_secs(),
                    rrset.ttl.as_secs(),
                    rtype,
                    owner
                );
                if !rrset.records.contains(&data) {
                    rrset.records.push(data);
                    rrset.signature = None;
                }
            }
            None => node.rrsets.push(Rrset {
                owner,
                rtype,
                ttl,
                records: vec![data],
                signature: None,
            }),
        }
        Ok(())
    }

    /// Look up the RRset of the given type at the given owner.
    pub fn rrset(&self, owner: &Name<Vec<u8>>, rtype: Rtype) -> Option<&Rrset> {
        self.nodes
            .iter()
            .find(|node| node.owner == *owner)?
            .rrsets
            .iter()
            .find(|rrset| rrset.rtype == rtype)
    }

    /// The owner names with their RRsets, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// All RRsets in insertion order.
    pub fn rrsets(&self) -> impl Iterator<Item = &Rrset> {
        self.nodes.iter().flat_map(|node| node.rrsets.iter())
    }

    pub fn rrsets_mut(&mut self) -> impl Iterator<Item = &mut Rrset> {
        self.nodes.iter_mut().flat_map(|node| node.rrsets.iter_mut())
    }
}

//------------ Node ----------------------------------------------------------

/// All RRsets sharing an owner name.
#[derive(Clone, Debug)]
pub struct Node {
    owner: Name<Vec<u8>>,
    rrsets: Vec<Rrset>,
}

impl Node {
    pub fn owner(&self) -> &Name<Vec<u8>> {
        &self.owner
    }

    pub fn rrsets(&self) -> &[Rrset] {
        &self.rrsets
    }
}

//------------ Rrset ---------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Rrset {
    owner: Name<Vec<u8>>,
    rtype: Rtype,
    ttl: Ttl,
    records: Vec<ZoneData>,
    signature: Option<Signature>,
}

impl Rrset {
    pub fn owner(&self) -> &Name<Vec<u8>> {
        &self.owner
    }

    pub fn rtype(&self) -> Rtype {
        self.rtype
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn records(&self) -> &[ZoneData] {
        &self.records
    }

    /// The RRset as individual records, in insertion order.
    pub fn to_records(&self) -> Vec<ZoneRecord> {
        self.records
            .iter()
            .map(|data| Record::new(self.owner.clone(), Class::IN, self.ttl, data.clone()))
            .collect()
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn set_signature(&mut self, signature: Signature) {
        self.signature = Some(signature);
    }
}

//------------ Signature -----------------------------------------------------

/// The RRSIG covering an RRset, together with the role of the key that made it.
#[derive(Clone, Debug)]
pub struct Signature {
    pub role: Role,
    pub rrsig: Rrsig<Vec<u8>, Name<Vec<u8>>>,
}
