//! Backing up the output of a domain.
//!
//! Archives are written in the background. [`start`] checks the source,
//! reserves the archive file and hands the rest to a blocking task; the
//! returned [`PendingBackup`] resolves once the archive is on disk.

use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Context, Result};
use crate::util;

//------------ PendingBackup -------------------------------------------------

/// An archive that is still being written.
pub struct PendingBackup {
    domain: String,
    handle: JoinHandle<Result<PathBuf>>,
}

impl PendingBackup {
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Wait for the archive to be complete and return its path.
    pub async fn wait(self) -> Result<PathBuf> {
        self.handle
            .await?
            .with_context(|| format!("backing up {}", self.domain))
    }
}

//------------ Starting a backup ---------------------------------------------

/// Start archiving `source`, the output directory of `domain`, into
/// `backup_dir`.
///
/// The archive holds the contents of `source` without an enclosing folder.
/// Fails right away, without creating anything, if `source` is not a
/// directory.
pub fn start(
    runtime: &Handle,
    source: &Path,
    backup_dir: &Path,
    domain: &str,
    now: DateTime<Local>,
) -> Result<PendingBackup> {
    if !source.is_dir() {
        crate::bail!("folder does not exist: {}", source.display());
    }
    util::create_dir_all(backup_dir)?;

    let version = next_version(backup_dir, domain, &now)?;
    let path = backup_dir.join(format!(
        "{domain}_backup_{version}_{}.zip",
        now.format("%H%M%S")
    ));
    let file = File::create_new(&path)
        .map_err(|err| format!("cannot create '{}': {err}", path.display()))?;
    debug!("Writing {}", path.display());

    let dispatch = tracing::dispatcher::get_default(|dispatch| dispatch.clone());
    let source = source.to_path_buf();
    let name = domain.to_string();
    let handle = runtime.spawn_blocking(move || {
        tracing::dispatcher::with_default(&dispatch, || {
            match write_archive(file, &source) {
                Ok(()) => {
                    info!("Export finished: {name}/");
                    Ok(path)
                }
                Err(err) => {
                    let _ = fs::remove_file(&path);
                    Err(err)
                }
            }
        })
    });

    Ok(PendingBackup {
        domain: domain.to_string(),
        handle,
    })
}

/// The version part of the next archive name for `domain`.
///
/// That is the local date as `YYYY.MM.DD`, followed by `.N` if archives
/// for that date already exist, with `N` one above the highest present.
fn next_version(backup_dir: &Path, domain: &str, now: &DateTime<Local>) -> Result<String> {
    let date = now.format("%Y.%m.%d").to_string();
    let prefix = format!("{domain}_backup_{date}");

    let mut highest: Option<u32> = None;
    let entries = fs::read_dir(backup_dir)
        .map_err(|err| format!("cannot read '{}': {err}", backup_dir.display()))?;
    for entry in entries {
        let name = entry?.file_name();
        let Some(rest) = name.to_str().and_then(|name| name.strip_prefix(&prefix)) else {
            continue;
        };
        let increment = if rest.starts_with('_') {
            Some(0)
        } else {
            rest.strip_prefix('.')
                .and_then(|rest| rest.split_once('_'))
                .and_then(|(n, _)| n.parse::<u32>().ok())
        };
        if let Some(n) = increment {
            highest = Some(highest.map_or(n, |h| h.max(n)));
        }
    }

    Ok(match highest {
        None => date,
        Some(n) => format!("{date}.{}", n + 1),
    })
}

fn write_archive(file: File, source: &Path) -> Result<()> {
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));
    add_dir(&mut zip, source, "", options)?;
    zip.finish()?.flush()?;
    Ok(())
}

fn add_dir<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    dir: &Path,
    prefix: &str,
    options: SimpleFileOptions,
) -> Result<()> {
    let mut entries = fs::read_dir(dir)
        .map_err(|err| format!("cannot read '{}': {err}", dir.display()))?
        .collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = format!("{prefix}{}", entry.file_name().to_string_lossy());
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            let name = format!("{name}/");
            zip.add_directory(name.clone(), options)?;
            add_dir(zip, &path, &name, options)?;
        } else {
            zip.start_file(name, options)?;
            let mut file = File::open(&path)
                .map_err(|err| format!("cannot open '{}': {err}", path.display()))?;
            io::copy(&mut file, zip)?;
        }
    }
    Ok(())
}
