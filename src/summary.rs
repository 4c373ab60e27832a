//! The summary files next to the keys: `output.conf`, `records.conf` and
//! `README.md`.

use std::net::Ipv4Addr;
use std::path::Path;

use handlebars::Handlebars;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Context, Result};
use crate::keys::{KeyFiles, KeyPair};
use crate::layout::Layout;
use crate::target::Domain;
use crate::util;
use crate::zone::DEFAULT_TTL;

/// The README template used when none is given on the command line.
const README_TEMPLATE: &str = include_str!("readme.md.hbs");

//------------ OutputConf ----------------------------------------------------

/// The contents of `output.conf`.
///
/// Later stages find the key files through the names stored here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConf {
    /// The domain with a trailing dot.
    pub domain: String,
    pub host: Ipv4Addr,
    pub kskkey: String,
    pub kskpriv: String,
    pub zskkey: String,
    pub zskpriv: String,
}

impl OutputConf {
    pub fn new(domain: &Domain, ksk: KeyFiles, zsk: KeyFiles) -> Self {
        OutputConf {
            domain: domain.fqdn(),
            host: domain.host(),
            kskkey: ksk.key,
            kskpriv: ksk.private,
            zskkey: zsk.key,
            zskpriv: zsk.private,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        util::write_file(path, serde_yaml::to_string(self)?)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = util::read_file(path)?;
        serde_yaml::from_str::<Self>(&text)
            .map_err(|err| format!("invalid '{}': {err}", path.display()).into())
    }

    /// Read the file for `domain` and check that it describes that domain.
    pub fn read_for(layout: &Layout, domain: &Domain) -> Result<Self> {
        let conf = Self::read(&layout.output_conf())?;
        crate::ensure!(
            conf.domain == domain.fqdn(),
            "'{}' describes {}, not {}",
            layout.output_conf().display(),
            conf.domain,
            domain.fqdn()
        );
        Ok(conf)
    }
}

//------------ records.conf --------------------------------------------------

/// The records to hand to the parent zone and the registrar.
///
/// The text is also logged line by line.
pub fn records(domain: &Domain, ksk: &KeyPair) -> Result<String> {
    let ds = ksk.ds()?;
    let digest: String = ds.digest().iter().map(|b| format!("{b:02x}")).collect();
    let ds_data = format!(
        "{} {} {} {}",
        ds.key_tag(),
        ds.algorithm().to_int(),
        ds.digest_type().to_int(),
        digest
    );
    let ns = domain.nameserver();

    let text = format!(
        "DS record for root zone:\n\
         {} {} IN DS {}\n\
         \n\
         Bob Wallet records:\n\
         DS:    {}\n\
         GLUE4: {} {}\n\
         NS:    {}\n",
        domain.fqdn(),
        DEFAULT_TTL,
        ds_data,
        ds_data,
        ns,
        domain.host(),
        ns,
    );
    for line in text.lines().filter(|line| !line.is_empty()) {
        info!("{line}");
    }
    Ok(text)
}

//------------ README.md -----------------------------------------------------

#[derive(Serialize)]
struct ReadmeData<'a> {
    domain: &'a str,
    ksk_filename: &'a str,
    zsk_filename: &'a str,
}

/// Render the README for `domain` from the key file names in `conf`.
///
/// Uses the template at `template` if given, the built-in one otherwise.
pub fn readme(domain: &Domain, conf: &OutputConf, template: Option<&Path>) -> Result<String> {
    let source = match template {
        Some(path) => util::read_file(path).context("reading the README template")?,
        None => README_TEMPLATE.to_string(),
    };
    let data = ReadmeData {
        domain: domain.name(),
        ksk_filename: key_stem(&conf.kskkey),
        zsk_filename: key_stem(&conf.zskkey),
    };

    let mut handlebars = Handlebars::new();
    handlebars.register_escape_fn(handlebars::no_escape);
    Ok(handlebars.render_template(&source, &data)?)
}

fn key_stem(file: &str) -> &str {
    file.strip_suffix(".key").unwrap_or(file)
}
