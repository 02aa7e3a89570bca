/// Embedded SQL store updater.
///
/// The store is a SQLite database with a key/value table
/// `ItemTable(key TEXT PRIMARY KEY, value TEXT)`. The identity rows use
/// the same five keys as the JSON config store.
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::info;

use crate::context::ResetContext;
use crate::error::ResetError;
use crate::identity::IdentitySet;
use crate::paths::{StoreDescriptor, StoreKind};
use crate::stores::config_json::identity_entries;
use crate::stores::{StoreUpdater, UpdateOutcome};

pub struct EmbeddedDbUpdater;

impl StoreUpdater for EmbeddedDbUpdater {
    fn kind(&self) -> StoreKind {
        StoreKind::EmbeddedDb
    }

    fn update(
        &self,
        _ctx: &ResetContext,
        desc: &StoreDescriptor,
        identity: &IdentitySet,
    ) -> Result<UpdateOutcome, ResetError> {
        if !desc.exists_before_op {
            return Err(ResetError::StoreNotFound(desc.path.clone()));
        }

        let conn = open(&desc.path)?;
        for (key, value) in identity_entries(identity) {
            conn.execute(
                "INSERT INTO ItemTable (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
        }
        info!(path = %desc.path.display(), "identity rows upserted");
        Ok(UpdateOutcome::clean())
    }
}

fn open(path: &Path) -> Result<Connection, ResetError> {
    let conn = Connection::open(path)?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ItemTable (
            key TEXT NOT NULL PRIMARY KEY,
            value TEXT
        )",
        [],
    )?;
    Ok(conn)
}

/// Delete every row whose key or value contains `marker`.
///
/// Destructive variant used for clearing third-party extension state.
/// Returns the number of deleted rows; the count is also logged.
pub fn purge_marker(path: &Path, marker: &str) -> Result<usize, ResetError> {
    if !path.exists() {
        return Err(ResetError::StoreNotFound(path.to_path_buf()));
    }
    let conn = open(path)?;
    let deleted = conn.execute(
        "DELETE FROM ItemTable
         WHERE key LIKE '%' || ?1 || '%' OR value LIKE '%' || ?1 || '%'",
        params![marker],
    )?;
    info!(path = %path.display(), marker, deleted, "marker rows purged");
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ElevationPolicy, OsKind, PlatformDirs};
    use rusqlite::OptionalExtension;
    use tempfile::TempDir;

    fn test_ctx(home: &Path) -> ResetContext {
        ResetContext {
            product: "Cursor".to_string(),
            os: OsKind::Linux,
            dirs: PlatformDirs {
                home: home.to_path_buf(),
                appdata: None,
            },
            allow_create: false,
            elevation: ElevationPolicy::Never,
            replay_args: Vec::new(),
        }
    }

    fn seed_db(path: &Path, rows: &[(&str, &str)]) {
        let conn = open(path).unwrap();
        for (k, v) in rows {
            conn.execute(
                "INSERT OR REPLACE INTO ItemTable (key, value) VALUES (?1, ?2)",
                params![k, v],
            )
            .unwrap();
        }
    }

    fn get(path: &Path, key: &str) -> Option<String> {
        let conn = Connection::open(path).unwrap();
        conn.query_row(
            "SELECT value FROM ItemTable WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .unwrap()
    }

    #[test]
    fn test_upserts_identity_rows() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("state.vscdb");
        seed_db(&db, &[("telemetry.machineId", "old"), ("unrelated", "kept")]);

        let identity = IdentitySet::generate();
        let desc = StoreDescriptor {
            kind: StoreKind::EmbeddedDb,
            path: db.clone(),
            exists_before_op: true,
        };
        EmbeddedDbUpdater
            .update(&test_ctx(tmp.path()), &desc, &identity)
            .unwrap();

        assert_eq!(get(&db, "telemetry.machineId").unwrap(), identity.machine_id);
        assert_eq!(get(&db, "telemetry.devDeviceId").unwrap(), identity.device_id);
        assert_eq!(
            get(&db, "storage.serviceMachineId").unwrap(),
            identity.device_id
        );
        assert_eq!(get(&db, "unrelated").unwrap(), "kept");
    }

    #[test]
    fn test_missing_db_is_store_not_found() {
        let tmp = TempDir::new().unwrap();
        let desc = StoreDescriptor {
            kind: StoreKind::EmbeddedDb,
            path: tmp.path().join("state.vscdb"),
            exists_before_op: false,
        };
        let err = EmbeddedDbUpdater
            .update(&test_ctx(tmp.path()), &desc, &IdentitySet::generate())
            .unwrap_err();
        assert!(matches!(err, ResetError::StoreNotFound(_)));
    }

    #[test]
    fn test_purge_marker_deletes_matching_rows() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("state.vscdb");
        seed_db(
            &db,
            &[
                ("augment.sessions", "blob"),
                ("theme", "augment-dark"),
                ("workbench.theme", "plain"),
            ],
        );

        let deleted = purge_marker(&db, "augment").unwrap();
        assert_eq!(deleted, 2);
        assert!(get(&db, "augment.sessions").is_none());
        assert!(get(&db, "theme").is_none());
        assert_eq!(get(&db, "workbench.theme").unwrap(), "plain");
    }

    #[test]
    fn test_purge_marker_on_missing_db() {
        let tmp = TempDir::new().unwrap();
        let err = purge_marker(&tmp.path().join("state.vscdb"), "x").unwrap_err();
        assert!(matches!(err, ResetError::StoreNotFound(_)));
    }
}
