/// Identity record generation.
///
/// Every reset mints a complete, internally consistent set of identifiers
/// from the OS CSPRNG. Nothing is ever reused from a previous set.
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Serialize;
use uuid::Uuid;

/// The regenerated identity record.
///
/// Held in memory only for the duration of one orchestration run; it is
/// fully absorbed into the target stores and never persisted on its own.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentitySet {
    /// UUID v4, lower-case, canonical dashed form.
    pub device_id: String,
    /// 64 hex characters (32 random bytes).
    pub machine_id: String,
    /// 128 hex characters (64 random bytes), independent of `machine_id`.
    pub mac_machine_id: String,
    /// UUID v4, upper-case, wrapped in braces.
    pub sqm_id: String,
    /// Always equal to `device_id`; consumers rely on this equality.
    pub service_machine_id: String,
}

impl IdentitySet {
    /// Generate a fresh identity set. Infallible: the only input is the
    /// OS random source.
    pub fn generate() -> Self {
        let device_id = Uuid::new_v4().to_string();
        let sqm_id = format!("{{{}}}", Uuid::new_v4().to_string().to_uppercase());

        let mut machine_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut machine_bytes);
        let mut mac_machine_bytes = [0u8; 64];
        OsRng.fill_bytes(&mut mac_machine_bytes);

        Self {
            service_machine_id: device_id.clone(),
            device_id,
            machine_id: hex::encode(machine_bytes),
            mac_machine_id: hex::encode(mac_machine_bytes),
            sqm_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_hex(s: &str) -> bool {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    }

    #[test]
    fn test_device_id_is_canonical_lowercase_uuid() {
        let id = IdentitySet::generate();
        let parsed = Uuid::parse_str(&id.device_id).unwrap();
        assert_eq!(parsed.to_string(), id.device_id);
        assert_eq!(id.device_id, id.device_id.to_lowercase());
        assert_eq!(id.device_id.len(), 36);
    }

    #[test]
    fn test_machine_ids_are_hex_of_expected_length() {
        let id = IdentitySet::generate();
        assert_eq!(id.machine_id.len(), 64);
        assert!(is_hex(&id.machine_id));
        assert_eq!(id.mac_machine_id.len(), 128);
        assert!(is_hex(&id.mac_machine_id));
    }

    #[test]
    fn test_sqm_id_is_braced_uppercase_uuid() {
        let id = IdentitySet::generate();
        assert!(id.sqm_id.starts_with('{') && id.sqm_id.ends_with('}'));
        let inner = &id.sqm_id[1..id.sqm_id.len() - 1];
        assert_eq!(inner, inner.to_uppercase());
        Uuid::parse_str(inner).unwrap();
    }

    #[test]
    fn test_service_machine_id_equals_device_id() {
        let id = IdentitySet::generate();
        assert_eq!(id.service_machine_id, id.device_id);
    }

    #[test]
    fn test_consecutive_generations_never_repeat() {
        let a = IdentitySet::generate();
        let b = IdentitySet::generate();
        assert_ne!(a.device_id, b.device_id);
        assert_ne!(a.machine_id, b.machine_id);
        assert_ne!(a.mac_machine_id, b.mac_machine_id);
        assert_ne!(a.sqm_id, b.sqm_id);
    }

    #[test]
    fn test_mac_machine_id_not_derived_from_machine_id() {
        let id = IdentitySet::generate();
        assert!(!id.mac_machine_id.contains(&id.machine_id));
    }
}
