//! DNSSEC key pairs and their on-disk form.
//!
//! Keys are stored the way BIND and ldns store them: a `.key` file holding
//! the DNSKEY record in zone file format and a `.private` file in the
//! `Private-key-format: v1.3` layout. Both are named `K<owner>+<alg>+<tag>`
//! so that any later stage can find them again from the key tag alone.

use std::fmt;
use std::fs::File;
use std::path::Path;

use domain::base::iana::{Class, DigestAlgorithm, SecurityAlgorithm};
use domain::base::{Name, Record, ToName, Ttl};
use domain::crypto::sign::{generate, GenerateParams, KeyPair as BackendKey, SecretKeyBytes};
use domain::dnssec::sign::keys::SigningKey;
use domain::dnssec::validator::base::DnskeyExt;
use domain::rdata::{Dnskey, Ds};
use domain::zonefile::inplace::{Entry, ScannedRecordData, Zonefile};

use crate::error::{Context, Result};
use crate::util;
use crate::zone::DEFAULT_TTL;

/// The only algorithm keys are generated for.
pub const ALGORITHM: SecurityAlgorithm = SecurityAlgorithm::RSASHA256;

/// Modulus size of every generated RSA key.
pub const RSA_BITS: u32 = 2048;

//------------ Role ----------------------------------------------------------

/// What a key is used for within the zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Signs the apex DNSKEY RRset only.
    Ksk,

    /// Signs everything else.
    Zsk,
}

impl Role {
    /// The DNSKEY flags: Zone Key, plus Secure Entry Point for a KSK.
    pub fn flags(self) -> u16 {
        match self {
            Role::Ksk => 257,
            Role::Zsk => 256,
        }
    }

    /// The subdirectory of the domain output holding keys of this role.
    pub fn dir_name(self) -> &'static str {
        match self {
            Role::Ksk => "ksk",
            Role::Zsk => "zsk",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Role::Ksk => "key-signing",
            Role::Zsk => "zone-signing",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Ksk => "KSK",
            Role::Zsk => "ZSK",
        })
    }
}

//------------ KeyPair -------------------------------------------------------

/// An RSA/SHA-256 key pair bound to a zone apex.
pub struct KeyPair {
    role: Role,
    secret: SecretKeyBytes,
    dnskey: Dnskey<Vec<u8>>,
    key: SigningKey<Vec<u8>, BackendKey>,
}

/// The file names a key pair was persisted under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyFiles {
    pub key: String,
    pub private: String,
}

impl KeyPair {
    /// Generate a fresh key pair for the zone at `owner`.
    pub fn generate(role: Role, owner: &Name<Vec<u8>>) -> Result<Self> {
        let params = GenerateParams::RsaSha256 { bits: RSA_BITS };
        let (secret, dnskey) = generate(params, role.flags())
            .map_err(|err| format!("failed to generate a {role}: {err}"))?;
        Self::new(role, owner.clone(), secret, dnskey)
    }

    /// Bind the secret key to its DNSKEY.
    ///
    /// Fails if the two do not belong together.
    fn new(
        role: Role,
        owner: Name<Vec<u8>>,
        secret: SecretKeyBytes,
        dnskey: Dnskey<Vec<u8>>,
    ) -> Result<Self> {
        let backend = BackendKey::from_bytes(&secret, &dnskey)
            .map_err(|err| format!("the {role} cannot be used for signing: {err}"))?;
        let key = SigningKey::new(owner, dnskey.flags(), backend);
        Ok(KeyPair {
            role,
            secret,
            dnskey,
            key,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn owner(&self) -> &Name<Vec<u8>> {
        self.key.owner()
    }

    pub fn dnskey(&self) -> &Dnskey<Vec<u8>> {
        &self.dnskey
    }

    /// The key in the form the zone signer takes it.
    pub fn signing_key(&self) -> &SigningKey<Vec<u8>, BackendKey> {
        &self.key
    }

    pub fn tag(&self) -> u16 {
        self.dnskey.key_tag()
    }

    /// The common part of the `.key` and `.private` file names.
    pub fn file_stem(&self) -> String {
        file_stem(self.owner(), self.tag())
    }

    /// The SHA-256 delegation signer record for this key.
    pub fn ds(&self) -> Result<Ds<Vec<u8>>> {
        let digest = self
            .dnskey
            .digest(self.owner(), DigestAlgorithm::SHA256)
            .map_err(|err| format!("error computing the DS of the {}: {err}", self.role))?;
        Ok(Ds::new(
            self.tag(),
            self.dnskey.algorithm(),
            DigestAlgorithm::SHA256,
            digest.as_ref().to_vec(),
        )?)
    }

    /// Write the `.key` and `.private` files into `dir`.
    pub fn persist(&self, dir: &Path) -> Result<KeyFiles> {
        let stem = self.file_stem();
        let files = KeyFiles {
            key: format!("{stem}.key"),
            private: format!("{stem}.private"),
        };

        let public = format!(
            "; This is a {} key, keyid {}, for {}\n{}\n",
            self.role.describe(),
            self.tag(),
            self.owner().fmt_with_dot(),
            self.dnskey_record(),
        );
        let private = self.secret.display_as_bind().to_string();

        util::write_file(dir.join(&files.private), private)?;
        util::write_file(dir.join(&files.key), public)?;
        Ok(files)
    }

    /// Read a key pair back from its `.key` and `.private` files.
    ///
    /// The private key must belong to the public key, and the DNSKEY flags
    /// must match `role`.
    pub fn load(role: Role, key_path: &Path, private_path: &Path) -> Result<Self> {
        let (owner, dnskey) = read_public_key(key_path)?;
        crate::ensure!(
            dnskey.flags() == role.flags(),
            "'{}' holds flags {}, expected {} for a {}",
            key_path.display(),
            dnskey.flags(),
            role.flags(),
            role
        );

        let text = util::read_file(private_path)?;
        let secret = SecretKeyBytes::parse_from_bind(&text).map_err(|err| {
            format!(
                "error while parsing private key file '{}': {err}",
                private_path.display()
            )
        })?;
        Self::new(role, owner, secret, dnskey).with_context(|| {
            format!(
                "matching '{}' against '{}'",
                private_path.display(),
                key_path.display()
            )
        })
    }

    /// The DNSKEY record as it appears in the zone.
    pub fn dnskey_record(&self) -> Record<Name<Vec<u8>>, Dnskey<Vec<u8>>> {
        Record::new(
            self.owner().clone(),
            Class::IN,
            Ttl::from_secs(DEFAULT_TTL),
            self.dnskey.clone(),
        )
    }
}

/// `K<owner>+<alg>+<tag>`, the BIND naming scheme for key files.
pub fn file_stem(owner: &Name<Vec<u8>>, tag: u16) -> String {
    format!(
        "K{}+{:03}+{:05}",
        owner.fmt_with_dot(),
        ALGORITHM.to_int(),
        tag
    )
}

/// Read the single DNSKEY record from a `.key` file.
pub fn read_public_key(path: &Path) -> Result<(Name<Vec<u8>>, Dnskey<Vec<u8>>)> {
    let mut file = File::open(path)
        .map_err(|err| format!("cannot open public key file '{}': {err}", path.display()))?;
    let zonefile = Zonefile::load(&mut file)
        .map_err(|err| format!("cannot read public key file '{}': {err}", path.display()))?;

    for entry in zonefile {
        let entry = entry.map_err(|err| {
            format!(
                "error while reading public key from file '{}': {err}",
                path.display()
            )
        })?;

        let Entry::Record(record) = entry else {
            continue;
        };
        let ScannedRecordData::Dnskey(dnskey) = record.data() else {
            continue;
        };

        let dnskey = Dnskey::new(
            dnskey.flags(),
            dnskey.protocol(),
            dnskey.algorithm(),
            dnskey.public_key().to_vec(),
        )?;
        return Ok((record.owner().to_vec(), dnskey));
    }

    Err(format!("no DNSKEY record in '{}'", path.display()).into())
}
