//! Provisioning domains.
//!
//! A domain goes through the stages certificate, keys, zone file and README,
//! each one reading what the previous ones left on disk. Whatever the
//! outcome, the output directory of the domain is backed up afterwards.
//! Batches process one domain after the other; a failing domain does not
//! stop the batch.

use std::net::Ipv4Addr;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use tokio::runtime::{Handle, Runtime};
use tracing::{error, info};

use crate::archive::{self, PendingBackup};
use crate::cert;
use crate::env::Env;
use crate::error::{program_name, Context, Result};
use crate::keys::{KeyPair, Role};
use crate::layout::Layout;
use crate::summary::{self, OutputConf};
use crate::target::Domain;
use crate::util;
use crate::zone::assemble::assemble_from_disk;
use crate::zone::render::{render, serial_for};
use crate::zone::sign::sign_from_disk;

//------------ Options -------------------------------------------------------

/// Everything a run needs to know besides the domain names.
#[derive(Clone, Debug)]
pub struct Options {
    pub host: Ipv4Addr,
    pub verbose: bool,
    pub output_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub template: Option<PathBuf>,
}

/// One entry of the batch catalogue.
#[derive(Clone, Debug, Deserialize)]
pub struct CatalogueEntry {
    /// The domain name.
    pub ascii: String,
}

//------------ Entry points --------------------------------------------------

/// Provision a single domain.
///
/// Fails if any stage or the backup failed. The details have been logged
/// by then.
pub fn single(env: &impl Env, options: &Options, name: &str) -> Result<()> {
    let runtime = Runtime::new()?;
    let outcome = process(env, runtime.handle(), options, name);
    let backed_up = wait_for_backups(&runtime, outcome.backup.into_iter().collect());
    if !(outcome.provisioned && backed_up) {
        crate::bail!("provisioning {} failed", name.trim());
    }
    Ok(())
}

/// Provision every domain listed in `catalogue`.
///
/// Only an unreadable catalogue fails the batch. Failures of single domains
/// are logged and the batch moves on to the next one.
pub fn batch(env: &impl Env, options: &Options, catalogue: &Path) -> Result<()> {
    let entries = read_catalogue(catalogue)?;
    let runtime = Runtime::new()?;
    let total = entries.len();

    let mut pending = Vec::with_capacity(total);
    for (index, entry) in entries.iter().enumerate() {
        let outcome = process(env, runtime.handle(), options, &entry.ascii);
        pending.extend(outcome.backup);

        let count = index + 1;
        if count < total {
            info!("{count}/{total} processed");
        } else {
            info!("{count}/{total} processed…complete");
        }
    }
    wait_for_backups(&runtime, pending);

    if !options.verbose {
        let mut out = env.stdout();
        writeln!(out, "[{}] Processing complete", program_name(env));
    }
    Ok(())
}

pub fn read_catalogue(path: &Path) -> Result<Vec<CatalogueEntry>> {
    let text = util::read_file(path)?;
    serde_json::from_str(&text)
        .map_err(|err| format!("invalid catalogue '{}': {err}", path.display()).into())
}

//------------ Per domain ----------------------------------------------------

struct Outcome {
    provisioned: bool,
    backup: Option<PendingBackup>,
}

/// Run all stages for one domain, then start its backup.
fn process(env: &impl Env, runtime: &Handle, options: &Options, name: &str) -> Outcome {
    let now = env.seconds_since_epoch();
    let domain = match Domain::new(name, options.host) {
        Ok(domain) => domain,
        Err(err) => {
            let name = name.trim().trim_end_matches('.');
            error!("[{name}] {}", err.chain());
            let backup = output_dir_for(options, name)
                .and_then(|dir| backup(runtime, &dir, options, name, now));
            return Outcome {
                provisioned: false,
                backup,
            };
        }
    };
    let layout = Layout::new(&options.output_dir, &domain);

    let provisioned = match provision(&domain, &layout, options, now) {
        Ok(()) => true,
        Err(err) => {
            error!("[{domain}] {}", err.chain());
            false
        }
    };

    Outcome {
        provisioned,
        backup: backup(runtime, layout.dir(), options, domain.name(), now),
    }
}

/// Start the backup of `source`, logging a failure to start.
fn backup(
    runtime: &Handle,
    source: &Path,
    options: &Options,
    name: &str,
    now: u32,
) -> Option<PendingBackup> {
    match archive::start(runtime, source, &options.backup_dir, name, local_time(now)) {
        Ok(pending) => Some(pending),
        Err(err) => {
            error!("[{name}] {}", err.chain());
            None
        }
    }
}

/// Where the output of a name that is not a valid domain would be.
///
/// Names that would lead outside the output directory have none.
fn output_dir_for(options: &Options, name: &str) -> Option<PathBuf> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) => Some(options.output_dir.join(part)),
        _ => None,
    }
}

fn provision(domain: &Domain, layout: &Layout, options: &Options, now: u32) -> Result<()> {
    info!("[{domain}] Generating TLS key and self-signed certificate");
    cert::issue(domain, now)
        .and_then(|issued| issued.persist(layout))
        .context("generating the certificate")?;

    info!("[{domain}] Generating DNSSEC keys");
    generate_keys(domain, layout).context("generating DNSSEC keys")?;

    info!("[{domain}] Writing new zone file");
    generate_zone_file(domain, layout, now).context("writing the zone file")?;

    info!("[{domain}] Writing README");
    generate_readme(domain, layout, options.template.as_deref()).context("writing the README")
}

fn generate_keys(domain: &Domain, layout: &Layout) -> Result<()> {
    let ksk = KeyPair::generate(Role::Ksk, domain.apex())?;
    let zsk = KeyPair::generate(Role::Zsk, domain.apex())?;
    let ksk_files = ksk.persist(&layout.key_dir(Role::Ksk))?;
    let zsk_files = zsk.persist(&layout.key_dir(Role::Zsk))?;

    OutputConf::new(domain, ksk_files, zsk_files).write(&layout.output_conf())?;
    util::write_file(layout.records_conf(), summary::records(domain, &ksk)?)
}

fn generate_zone_file(domain: &Domain, layout: &Layout, now: u32) -> Result<()> {
    let conf = OutputConf::read_for(layout, domain)?;
    let zone = assemble_from_disk(domain, layout, &conf)?;
    let zone = sign_from_disk(zone, layout, &conf, now)?;
    let serial = serial_for(local_time(now).date_naive());
    util::write_file(layout.zone_file(), render(&zone, domain, serial)?)
}

fn generate_readme(domain: &Domain, layout: &Layout, template: Option<&Path>) -> Result<()> {
    let conf = OutputConf::read_for(layout, domain)?;
    util::write_file(layout.readme(), summary::readme(domain, &conf, template)?)
}

/// Wait for all backups, logging failures. Returns whether all succeeded.
fn wait_for_backups(runtime: &Runtime, pending: Vec<PendingBackup>) -> bool {
    runtime.block_on(async {
        let mut all_ok = true;
        for backup in pending {
            let domain = backup.domain().to_string();
            if let Err(err) = backup.wait().await {
                error!("[{domain}] {}", err.chain());
                all_ok = false;
            }
        }
        all_ok
    })
}

fn local_time(now: u32) -> DateTime<Local> {
    DateTime::<Utc>::from_timestamp(now.into(), 0)
        .unwrap_or_default()
        .with_timezone(&Local)
}
