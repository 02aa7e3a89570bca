/// Pre-mutation backups.
///
/// Small files are copied to a timestamped sidecar next to the original;
/// directory trees are archived into a zip. A store is never mutated
/// before its backup has completed (or been explicitly skipped because
/// the store does not exist).
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::error::ResetError;
use crate::paths::{StoreDescriptor, StoreKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    FileCopy,
    Archive,
}

/// Where a store's prior contents were put before mutation.
#[derive(Debug, Clone, Serialize)]
pub struct BackupRecord {
    pub original_path: PathBuf,
    pub backup_path: PathBuf,
    pub kind: BackupKind,
    /// Entries of a workspace tree that could not be read while
    /// archiving. A partial archive is acceptable and is reported, not
    /// hidden.
    pub failed_entries: Vec<PathBuf>,
}

/// Back up the store described by `desc`.
///
/// Returns `Ok(None)` when the store does not exist (nothing to back up)
/// and for the OS registry, whose prior values are retained in memory by
/// the registry updater itself — no on-disk format is defined for them.
pub fn backup(desc: &StoreDescriptor) -> Result<Option<BackupRecord>, ResetError> {
    if !desc.exists_before_op {
        debug!(kind = %desc.kind, "store absent, skipping backup");
        return Ok(None);
    }

    match desc.kind {
        StoreKind::ConfigJson | StoreKind::EmbeddedDb | StoreKind::FlatIdFile => {
            copy_file_backup(&desc.path).map(Some)
        }
        StoreKind::WorkspaceCache => archive_dir_backup(&desc.path).map(Some),
        StoreKind::OsRegistry => Ok(None),
    }
}

/// Byte-for-byte copy to `<path>.bak.<unix-seconds>`.
fn copy_file_backup(path: &Path) -> Result<BackupRecord, ResetError> {
    let backup_path = sidecar_path(path, Utc::now().timestamp());
    fs::copy(path, &backup_path).map_err(|e| ResetError::BackupFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    debug!(from = %path.display(), to = %backup_path.display(), "file backup created");
    Ok(BackupRecord {
        original_path: path.to_path_buf(),
        backup_path,
        kind: BackupKind::FileCopy,
        failed_entries: Vec::new(),
    })
}

fn sidecar_path(path: &Path, ts: i64) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".bak.{}", ts));
    PathBuf::from(name)
}

/// Recursively archive a directory into `<dir>_backup_<unix-seconds>.zip`.
///
/// Unreadable entries (locked, permission denied) are recorded as failed
/// compressions but do not abort the backup.
fn archive_dir_backup(root: &Path) -> Result<BackupRecord, ResetError> {
    let mut zip_name = root.as_os_str().to_os_string();
    zip_name.push(format!("_backup_{}.zip", Utc::now().timestamp()));
    let zip_path = PathBuf::from(zip_name);

    let file = File::create(&zip_path).map_err(|e| ResetError::BackupFailed {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    let mut failed_entries = Vec::new();

    for entry in WalkDir::new(root).into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(%err, "skipping unreadable path during archive walk");
                if let Some(p) = err.path() {
                    failed_entries.push(p.to_path_buf());
                }
                continue;
            }
        };
        let path = entry.path();
        if path == root {
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .map_err(|e| ResetError::BackupFailed {
                path: root.to_path_buf(),
                reason: e.to_string(),
            })?
            .to_string_lossy()
            .replace('\\', "/");

        let result = if entry.file_type().is_dir() {
            zip.add_directory(rel, options).map_err(io::Error::other)
        } else {
            match File::open(path) {
                Ok(mut src) => zip
                    .start_file(rel, options)
                    .map_err(io::Error::other)
                    .and_then(|_| io::copy(&mut src, &mut zip).map(|_| ())),
                Err(e) => Err(e),
            }
        };
        if let Err(err) = result {
            warn!(path = %path.display(), %err, "failed to archive entry");
            failed_entries.push(path.to_path_buf());
        }
    }

    zip.finish().map_err(|e| ResetError::BackupFailed {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;

    if !failed_entries.is_empty() {
        warn!(
            root = %root.display(),
            failed = failed_entries.len(),
            "workspace archive is partial"
        );
    }
    Ok(BackupRecord {
        original_path: root.to_path_buf(),
        backup_path: zip_path,
        kind: BackupKind::Archive,
        failed_entries,
    })
}

/// A backup sidecar discovered next to a store.
#[derive(Debug, Clone, Serialize)]
pub struct BackupListing {
    pub path: PathBuf,
    pub created_at: i64,
    pub kind: BackupKind,
}

/// List backup sidecars for the store at `path`.
///
/// Both historical file-backup suffix forms (`.bak.<ts>` and
/// `.backup.<ts>`) are recognized, as well as `_backup_<ts>.zip` archives
/// for directories.
pub fn list_backups(path: &Path) -> Vec<BackupListing> {
    let Some(parent) = path.parent() else {
        return Vec::new();
    };
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
        return Vec::new();
    };
    let Ok(entries) = fs::read_dir(parent) else {
        return Vec::new();
    };

    let mut found = Vec::new();
    for entry in entries.flatten() {
        let candidate = entry.file_name().to_string_lossy().to_string();
        if let Some(listing) = classify_sidecar(&name, &candidate) {
            found.push(BackupListing {
                path: entry.path(),
                created_at: listing.0,
                kind: listing.1,
            });
        }
    }
    found.sort_by_key(|l| l.created_at);
    found
}

fn classify_sidecar(store_name: &str, candidate: &str) -> Option<(i64, BackupKind)> {
    let rest = candidate.strip_prefix(store_name)?;
    if let Some(ts) = rest.strip_prefix(".bak.").or_else(|| rest.strip_prefix(".backup.")) {
        return ts.parse::<i64>().ok().map(|t| (t, BackupKind::FileCopy));
    }
    if let Some(ts) = rest.strip_prefix("_backup_").and_then(|r| r.strip_suffix(".zip")) {
        return ts.parse::<i64>().ok().map(|t| (t, BackupKind::Archive));
    }
    None
}
