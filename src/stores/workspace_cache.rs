/// Workspace cache purger.
///
/// The workspace cache is a directory tree of per-project state cleared
/// alongside the identity stores. Its backup (a zip archive) has already
/// completed before this updater runs; the purge deletes every file and
/// then every directory under the cache root, deepest first, and leaves
/// the root itself in place.
use std::fs;
use std::path::Path;

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::context::ResetContext;
use crate::error::ResetError;
use crate::identity::IdentitySet;
use crate::paths::{StoreDescriptor, StoreKind};
use crate::stores::{StoreUpdater, UpdateOutcome};

pub struct WorkspaceCachePurger;

impl StoreUpdater for WorkspaceCachePurger {
    fn kind(&self) -> StoreKind {
        StoreKind::WorkspaceCache
    }

    fn update(
        &self,
        _ctx: &ResetContext,
        desc: &StoreDescriptor,
        _identity: &IdentitySet,
    ) -> Result<UpdateOutcome, ResetError> {
        if !desc.exists_before_op {
            return Err(ResetError::StoreNotFound(desc.path.clone()));
        }

        // contents_first yields children before their parents, so files
        // go first and directories are removed deepest-first. A failed
        // entry is recorded and the walk continues; one stuck file must
        // not keep the rest of the cache alive.
        let mut warnings = Vec::new();
        for entry in WalkDir::new(&desc.path).contents_first(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warnings.push(format!("unreadable entry: {}", err));
                    continue;
                }
            };
            let path = entry.path();
            if path == desc.path {
                continue;
            }
            if let Err(err) = remove_entry(path, entry.file_type().is_dir()) {
                warn!(path = %path.display(), %err, "failed to delete cache entry");
                warnings.push(format!("{}: {}", path.display(), err));
            }
        }

        info!(
            path = %desc.path.display(),
            failed = warnings.len(),
            "workspace cache purged"
        );
        Ok(UpdateOutcome { warnings })
    }
}

/// Delete one entry, clearing a read-only attribute first if necessary.
fn remove_entry(path: &Path, is_dir: bool) -> std::io::Result<()> {
    let remove = |p: &Path| {
        if is_dir {
            fs::remove_dir(p)
        } else {
            fs::remove_file(p)
        }
    };
    match remove(path) {
        Ok(()) => Ok(()),
        Err(first) => {
            if clear_readonly(path) {
                remove(path)
            } else {
                Err(first)
            }
        }
    }
}

fn clear_readonly(path: &Path) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    let mut perms = meta.permissions();
    if !perms.readonly() {
        return false;
    }
    #[allow(clippy::permissions_set_readonly_false)]
    perms.set_readonly(false);
    fs::set_permissions(path, perms).is_ok()
}
