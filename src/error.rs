/// Error kinds for store reset operations.
///
/// Every per-store failure is converted into one of these at the updater
/// boundary so callers can tell "already clean" apart from "failed".
use std::path::PathBuf;

use crate::context::OsKind;
use crate::paths::StoreKind;

#[derive(Debug, thiserror::Error)]
pub enum ResetError {
    /// The target store does not exist. Often non-fatal: the orchestrator
    /// reports this as "nothing to reset".
    #[error("store not found: {}", .0.display())]
    StoreNotFound(PathBuf),

    /// Backup creation failed. The mutation of that store is skipped
    /// entirely; we never mutate a store we could not back up.
    #[error("backup failed for {}: {reason}", path.display())]
    BackupFailed { path: PathBuf, reason: String },

    /// The current process lacks the rights to write the store. Triggers
    /// the elevation flow when the context allows it.
    #[error("permission denied: {}", .0.display())]
    PermissionDenied(PathBuf),

    /// The user declined the OS elevation prompt. Terminal and
    /// user-actionable; never retried automatically.
    #[error("elevation declined: {0}")]
    ElevationDeclined(String),

    /// No elevation mechanism is available on this host.
    #[error("elevation unavailable: {0}")]
    ElevationUnavailable(String),

    /// Temp-file or rename failure unrelated to permissions (e.g. disk
    /// full). Fatal for that store.
    #[error("atomic write failed for {}: {source}", path.display())]
    AtomicWriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Some entries of a workspace tree could not be archived. Non-fatal;
    /// the partial archive is kept and the failures are reported.
    #[error("{failed} entr(ies) under {} could not be archived", root.display())]
    PartialArchiveFailure { root: PathBuf, failed: usize },

    /// The store kind has no defined layout on this OS. Skipped, not fatal
    /// to the overall run.
    #[error("no {kind} layout defined for {os}")]
    UnsupportedPlatform { kind: StoreKind, os: OsKind },

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ResetError {
    /// Map an I/O error for `path` onto the reset error that should drive
    /// the orchestration: permission problems go down the elevation path,
    /// everything else is an ordinary write failure.
    pub fn from_write_error(path: &std::path::Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            ResetError::PermissionDenied(path.to_path_buf())
        } else {
            ResetError::AtomicWriteFailed {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}
