use std::net::Ipv4Addr;
use std::path::PathBuf;

use tracing::error;

use crate::env::Env;
use crate::error::Result;
use crate::log;
use crate::pipeline::{self, Options};

/// Provision a self-signed TLS certificate and a DNSSEC-signed zone
///
/// For each domain the following is written below the output directory:
/// the certificate and its key in `tls/`, the key-signing and zone-signing
/// keys in `ksk/` and `zsk/`, `output.conf`, `records.conf`, the signed
/// zone file `db.<domain>` and a `README.md`. Afterwards the output of the
/// domain is archived into the backup directory.
#[derive(Clone, Debug, clap::Parser)]
#[command(version, verbatim_doc_comment, disable_help_flag = true)]
pub struct Args {
    /// IPv4 address of the host serving the domain
    #[arg(short = 'h', long, value_name = "ADDRESS")]
    pub host: Option<Ipv4Addr>,

    /// The domain to provision
    #[arg(short = 'n', long, value_name = "DOMAIN")]
    pub name: Option<String>,

    /// Provision every domain listed in the catalogue
    #[arg(short = 'm', long)]
    pub many: bool,

    /// Log progress
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// JSON catalogue for --many: a list of objects with an "ascii" field
    #[arg(
        short = 'c',
        long,
        value_name = "FILE",
        default_value = "catalogue.json"
    )]
    pub catalogue: PathBuf,

    /// Directory receiving one subdirectory per domain
    #[arg(long, value_name = "DIR", default_value = "output")]
    pub output_dir: PathBuf,

    /// Directory receiving the backup archives
    #[arg(long, value_name = "DIR", default_value = "backup")]
    pub backup_dir: PathBuf,

    /// Handlebars template for README.md instead of the built-in one
    #[arg(long, value_name = "FILE")]
    pub template: Option<PathBuf>,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

impl Args {
    pub fn execute(self, env: impl Env) -> Result<()> {
        log::with_logging(&env, self.verbose, || self.dispatch(&env))
    }

    fn dispatch(self, env: &impl Env) -> Result<()> {
        let name = self.name.as_deref().filter(|_| !self.many);
        if self.host.is_none() {
            error!("Must provide host");
        }
        if !self.many && name.is_none() {
            error!("Must provide name");
        }
        let Some(host) = self.host else {
            crate::bail!("missing required options");
        };

        let options = Options {
            host,
            verbose: self.verbose,
            output_dir: env.in_cwd(&self.output_dir).into_owned(),
            backup_dir: env.in_cwd(&self.backup_dir).into_owned(),
            template: self
                .template
                .as_ref()
                .map(|path| env.in_cwd(path).into_owned()),
        };

        match name {
            Some(name) => pipeline::single(env, &options, name),
            None if self.many => pipeline::batch(env, &options, &env.in_cwd(&self.catalogue)),
            None => crate::bail!("missing required options"),
        }
    }
}
