/// OS registry / property-list updater.
///
/// Windows: rewrites `HKLM\SOFTWARE\Microsoft\Cryptography!MachineGuid`
/// and `HKLM\SOFTWARE\Microsoft\SQMClient!MachineId` (created if absent).
/// macOS: rewrites the `UUID` key of the root-owned platform UUID plist.
/// Linux never reaches this updater; path resolution reports
/// `UnsupportedPlatform` first.
///
/// The prior values are read and retained in memory for the duration of
/// the call — no on-disk backup format is defined for registry values,
/// so restoration is best-effort and only possible while the process is
/// alive.
use crate::context::ResetContext;
use crate::error::ResetError;
use crate::identity::IdentitySet;
use crate::paths::{StoreDescriptor, StoreKind};
use crate::stores::{StoreUpdater, UpdateOutcome};

pub struct OsRegistryUpdater;

impl StoreUpdater for OsRegistryUpdater {
    fn kind(&self) -> StoreKind {
        StoreKind::OsRegistry
    }

    fn update(
        &self,
        ctx: &ResetContext,
        desc: &StoreDescriptor,
        identity: &IdentitySet,
    ) -> Result<UpdateOutcome, ResetError> {
        update_impl(ctx, desc, identity)
    }
}

#[cfg(windows)]
fn update_impl(
    ctx: &ResetContext,
    desc: &StoreDescriptor,
    identity: &IdentitySet,
) -> Result<UpdateOutcome, ResetError> {
    use crate::paths::{WIN_CRYPTOGRAPHY_KEY, WIN_SQMCLIENT_KEY};
    use tracing::{debug, info};
    use winreg::enums::{HKEY_LOCAL_MACHINE, KEY_READ, KEY_WRITE};
    use winreg::RegKey;

    let _ = ctx;
    let map_err = |e: std::io::Error| ResetError::from_write_error(&desc.path, e);
    let hklm = RegKey::predef(HKEY_LOCAL_MACHINE);

    let crypto = hklm
        .open_subkey_with_flags(WIN_CRYPTOGRAPHY_KEY, KEY_READ | KEY_WRITE)
        .map_err(map_err)?;
    // Prior value retained in memory for the duration of the call.
    let previous_guid: Option<String> = crypto.get_value("MachineGuid").ok();
    debug!(?previous_guid, "replacing MachineGuid");
    crypto
        .set_value("MachineGuid", &identity.device_id)
        .map_err(map_err)?;

    // SQMClient may be absent; create it.
    let (sqm, _) = hklm
        .create_subkey(WIN_SQMCLIENT_KEY)
        .map_err(map_err)?;
    let previous_sqm: Option<String> = sqm.get_value("MachineId").ok();
    debug!(?previous_sqm, "replacing SQM MachineId");
    sqm.set_value("MachineId", &identity.sqm_id).map_err(map_err)?;

    info!("registry identity values rewritten");
    Ok(UpdateOutcome::clean())
}

#[cfg(target_os = "macos")]
fn update_impl(
    ctx: &ResetContext,
    desc: &StoreDescriptor,
    identity: &IdentitySet,
) -> Result<UpdateOutcome, ResetError> {
    use std::process::Command;
    use tracing::{debug, info};

    let _ = ctx;
    if !desc.exists_before_op {
        return Err(ResetError::StoreNotFound(desc.path.clone()));
    }

    // Prior value retained in memory for the duration of the call.
    let previous = Command::new("plutil")
        .args(["-extract", "UUID", "raw"])
        .arg(&desc.path)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string());
    debug!(?previous, "replacing platform UUID plist value");

    let status = Command::new("plutil")
        .args(["-replace", "UUID", "-string", &identity.device_id])
        .arg(&desc.path)
        .status()
        .map_err(|e| ResetError::from_write_error(&desc.path, e))?;
    if !status.success() {
        // plutil cannot tell us why; the plist is root-owned, so a failed
        // edit from an unprivileged process is a permission problem.
        return Err(ResetError::PermissionDenied(desc.path.clone()));
    }

    info!("platform UUID plist rewritten");
    Ok(UpdateOutcome::clean())
}

#[cfg(not(any(windows, target_os = "macos")))]
fn update_impl(
    ctx: &ResetContext,
    desc: &StoreDescriptor,
    _identity: &IdentitySet,
) -> Result<UpdateOutcome, ResetError> {
    Err(ResetError::UnsupportedPlatform {
        kind: desc.kind,
        os: ctx.os,
    })
}
