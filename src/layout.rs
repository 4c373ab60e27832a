//! Where the files of a provisioned domain live.

use std::path::{Path, PathBuf};

use crate::keys::Role;
use crate::target::Domain;

/// The output tree of one domain, `<root>/<name>/`.
#[derive(Clone, Debug)]
pub struct Layout {
    dir: PathBuf,
    name: String,
}

impl Layout {
    pub fn new(root: &Path, domain: &Domain) -> Self {
        Layout {
            dir: domain.output_dir(root),
            name: domain.name().to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tls_certificate(&self) -> PathBuf {
        self.dir.join("tls").join(format!("{}.crt", self.name))
    }

    pub fn tls_key(&self) -> PathBuf {
        self.dir.join("tls").join(format!("{}.key", self.name))
    }

    /// `ksk/` or `zsk/`.
    pub fn key_dir(&self, role: Role) -> PathBuf {
        self.dir.join(role.dir_name())
    }

    pub fn output_conf(&self) -> PathBuf {
        self.dir.join("output.conf")
    }

    pub fn records_conf(&self) -> PathBuf {
        self.dir.join("records.conf")
    }

    /// The rendered zone, `db.<name>`.
    pub fn zone_file(&self) -> PathBuf {
        self.dir.join(format!("db.{}", self.name))
    }

    pub fn readme(&self) -> PathBuf {
        self.dir.join("README.md")
    }
}
