//! The domain being provisioned.

use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use domain::base::Name;

use crate::error::Result;

//------------ Domain --------------------------------------------------------

/// A domain name together with the IPv4 address of its host.
///
/// The name is kept in two forms: the bare lower-case label sequence used
/// for directory and file names (`example.test`) and the absolute DNS name
/// used for records (`example.test.`).
#[derive(Clone, Debug)]
pub struct Domain {
    name: String,
    apex: Name<Vec<u8>>,
    host: Ipv4Addr,
}

impl Domain {
    /// Normalize a user supplied name and pair it with a host.
    ///
    /// Surrounding whitespace and any trailing dots are removed and the name
    /// is lower-cased. An empty result is rejected.
    pub fn new(name: &str, host: Ipv4Addr) -> Result<Self> {
        let name = name.trim().trim_end_matches('.').to_ascii_lowercase();
        if name.is_empty() {
            return Err("domain name is empty".into());
        }
        if name.contains('/') || name.contains('\\') {
            return Err(format!("'{name}' is not a valid domain name").into());
        }
        let apex = parse_name(&format!("{name}."))?;
        Ok(Domain { name, apex, host })
    }

    /// The name without a trailing dot.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name with exactly one trailing dot.
    pub fn fqdn(&self) -> String {
        format!("{}.", self.name)
    }

    pub fn apex(&self) -> &Name<Vec<u8>> {
        &self.apex
    }

    pub fn host(&self) -> Ipv4Addr {
        self.host
    }

    /// The wildcard name covering every subdomain, `*.<name>.`.
    pub fn wildcard(&self) -> Result<Name<Vec<u8>>> {
        parse_name(&format!("*.{}.", self.name))
    }

    /// The owner of the TLSA record for HTTPS, `_443._tcp.<name>.`.
    pub fn tlsa_owner(&self) -> Result<Name<Vec<u8>>> {
        parse_name(&format!("_443._tcp.{}.", self.name))
    }

    /// The name of the in-zone name server, `ns.<name>.`.
    pub fn nameserver(&self) -> String {
        format!("ns.{}.", self.name)
    }

    /// The directory holding everything generated for this domain.
    pub fn output_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.name)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

pub fn parse_name(s: &str) -> Result<Name<Vec<u8>>> {
    Name::from_str(s).map_err(|err| format!("invalid domain name '{s}': {err}").into())
}
