/// Flat identifier file updater.
///
/// The device id becomes the entire file content.
use std::fs;

use tracing::info;

use crate::atomic::atomic_write;
use crate::context::ResetContext;
use crate::error::ResetError;
use crate::identity::IdentitySet;
use crate::paths::{StoreDescriptor, StoreKind};
use crate::stores::{StoreUpdater, UpdateOutcome};

pub struct FlatIdUpdater;

impl StoreUpdater for FlatIdUpdater {
    fn kind(&self) -> StoreKind {
        StoreKind::FlatIdFile
    }

    fn update(
        &self,
        ctx: &ResetContext,
        desc: &StoreDescriptor,
        identity: &IdentitySet,
    ) -> Result<UpdateOutcome, ResetError> {
        if !desc.exists_before_op {
            if !ctx.allow_create {
                return Err(ResetError::StoreNotFound(desc.path.clone()));
            }
            if let Some(parent) = desc.path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| ResetError::from_write_error(&desc.path, e))?;
            }
        }
        atomic_write(&desc.path, identity.device_id.as_bytes())?;
        info!(path = %desc.path.display(), "flat id file rewritten");
        Ok(UpdateOutcome::clean())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ElevationPolicy, OsKind, PlatformDirs};
    use std::path::Path;
    use tempfile::TempDir;

    fn test_ctx(home: &Path, allow_create: bool) -> ResetContext {
        ResetContext {
            product: "Cursor".to_string(),
            os: OsKind::Linux,
            dirs: PlatformDirs {
                home: home.to_path_buf(),
                appdata: None,
            },
            allow_create,
            elevation: ElevationPolicy::Never,
            replay_args: Vec::new(),
        }
    }

    #[test]
    fn test_file_content_is_exactly_the_device_id() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("machineId");
        fs::write(&target, "old-id").unwrap();

        let identity = IdentitySet::generate();
        let desc = StoreDescriptor {
            kind: StoreKind::FlatIdFile,
            path: target.clone(),
            exists_before_op: true,
        };
        FlatIdUpdater
            .update(&test_ctx(tmp.path(), false), &desc, &identity)
            .unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), identity.device_id);
    }

    #[test]
    fn test_missing_file_requires_creation_policy() {
        let tmp = TempDir::new().unwrap();
        let desc = StoreDescriptor {
            kind: StoreKind::FlatIdFile,
            path: tmp.path().join("machineId"),
            exists_before_op: false,
        };
        let err = FlatIdUpdater
            .update(&test_ctx(tmp.path(), false), &desc, &IdentitySet::generate())
            .unwrap_err();
        assert!(matches!(err, ResetError::StoreNotFound(_)));

        FlatIdUpdater
            .update(&test_ctx(tmp.path(), true), &desc, &IdentitySet::generate())
            .unwrap();
        assert!(desc.path.exists());
    }
}
