/// JSON configuration store updater.
///
/// The store is a single flat JSON object (UTF-8, no schema versioning)
/// with arbitrary existing keys. Only the five identity keys are
/// overwritten; everything else is preserved as-is.
use std::fs;

use serde_json::{Map, Value};
use tracing::info;

use crate::atomic::atomic_write;
use crate::context::ResetContext;
use crate::error::ResetError;
use crate::identity::IdentitySet;
use crate::paths::{StoreDescriptor, StoreKind};
use crate::stores::{StoreUpdater, UpdateOutcome};

pub const KEY_DEV_DEVICE_ID: &str = "telemetry.devDeviceId";
pub const KEY_MACHINE_ID: &str = "telemetry.machineId";
pub const KEY_MAC_MACHINE_ID: &str = "telemetry.macMachineId";
pub const KEY_SQM_ID: &str = "telemetry.sqmId";
pub const KEY_SERVICE_MACHINE_ID: &str = "storage.serviceMachineId";

/// The five JSON keys rewritten on every reset, paired with their values
/// from `identity`.
pub fn identity_entries(identity: &IdentitySet) -> [(&'static str, &str); 5] {
    [
        (KEY_DEV_DEVICE_ID, &identity.device_id),
        (KEY_MACHINE_ID, &identity.machine_id),
        (KEY_MAC_MACHINE_ID, &identity.mac_machine_id),
        (KEY_SQM_ID, &identity.sqm_id),
        (KEY_SERVICE_MACHINE_ID, &identity.service_machine_id),
    ]
}

pub struct ConfigJsonUpdater;

impl StoreUpdater for ConfigJsonUpdater {
    fn kind(&self) -> StoreKind {
        StoreKind::ConfigJson
    }

    fn update(
        &self,
        ctx: &ResetContext,
        desc: &StoreDescriptor,
        identity: &IdentitySet,
    ) -> Result<UpdateOutcome, ResetError> {
        let mut map = if desc.exists_before_op {
            let raw = fs::read_to_string(&desc.path)
                .map_err(|e| ResetError::from_write_error(&desc.path, e))?;
            match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(map)) => map,
                // A corrupt or non-object config gets replaced; the backup
                // taken before this call preserves the old bytes.
                _ => Map::new(),
            }
        } else if ctx.allow_create {
            if let Some(parent) = desc.path.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| ResetError::from_write_error(&desc.path, e))?;
            }
            Map::new()
        } else {
            return Err(ResetError::StoreNotFound(desc.path.clone()));
        };

        for (key, value) in identity_entries(identity) {
            map.insert(key.to_string(), Value::String(value.to_string()));
        }

        let serialized = serde_json::to_string_pretty(&Value::Object(map))
            .expect("a string map always serializes");
        atomic_write(&desc.path, serialized.as_bytes())?;
        info!(path = %desc.path.display(), "config JSON identity keys rewritten");
        Ok(UpdateOutcome::clean())
    }
}
