/// Reset orchestration.
///
/// The orchestrator is the only component that knows the shape of a full
/// run: generate a fresh identity, then for each requested store resolve
/// → backup → update, aggregating per-store outcomes into a single
/// report. Each per-store step is independent; a failure in one store
/// never halts the remaining stores — the user benefits from as many
/// stores reset as possible. Nothing persists in memory after a run.
use tracing::{info, warn};

use crate::backup;
use crate::context::{ElevationPolicy, ResetContext};
use crate::elevate::{ElevationError, Elevator};
use crate::error::ResetError;
use crate::identity::IdentitySet;
use crate::paths::{self, StoreKind};
use crate::report::{OperationResult, ResetReport};
use crate::stores;

pub struct ResetOrchestrator<'a> {
    elevator: &'a dyn Elevator,
    updaters: fn(StoreKind) -> Box<dyn stores::StoreUpdater>,
}

impl<'a> ResetOrchestrator<'a> {
    pub fn new(elevator: &'a dyn Elevator) -> Self {
        Self {
            elevator,
            updaters: stores::updater_for,
        }
    }

    /// Swap the updater registry so failure modes can be driven without
    /// touching real stores.
    #[cfg(test)]
    fn with_updaters(
        elevator: &'a dyn Elevator,
        updaters: fn(StoreKind) -> Box<dyn stores::StoreUpdater>,
    ) -> Self {
        Self { elevator, updaters }
    }

    /// Reset every store kind for the product in `ctx`.
    pub fn reset_all(&self, ctx: &ResetContext) -> ResetReport {
        self.run(ctx, &StoreKind::ALL)
    }

    /// Reset a single store kind.
    pub fn reset_one(&self, ctx: &ResetContext, kind: StoreKind) -> ResetReport {
        self.run(ctx, &[kind])
    }

    fn run(&self, ctx: &ResetContext, kinds: &[StoreKind]) -> ResetReport {
        let identity = IdentitySet::generate();
        info!(product = %ctx.product, device_id = %identity.device_id, "starting reset");

        let results = kinds
            .iter()
            .map(|&kind| self.reset_store(ctx, kind, &identity))
            .collect();
        let report = ResetReport::new(identity, results);
        info!(overall_success = report.overall_success, "reset finished");
        report
    }

    fn reset_store(&self, ctx: &ResetContext, kind: StoreKind, identity: &IdentitySet) -> OperationResult {
        let desc = match paths::resolve(ctx, kind) {
            Ok(desc) => desc,
            Err(err @ ResetError::UnsupportedPlatform { .. }) => {
                // No layout on this OS: skipped, not fatal to the run.
                info!(%kind, "store skipped: {}", err);
                return OperationResult::success(kind, None, vec![err.to_string()]);
            }
            Err(err) => return OperationResult::failure(kind, err.to_string(), None),
        };

        // Backup always completes (or is explicitly skipped for an absent
        // store) before the update begins. A store we could not back up is
        // never mutated.
        let backup = match backup::backup(&desc) {
            Ok(backup) => backup,
            Err(err) => {
                warn!(%kind, %err, "backup failed, store left untouched");
                return OperationResult::failure(kind, err.to_string(), None);
            }
        };
        let mut warnings: Vec<String> = Vec::new();
        if let Some(record) = &backup {
            if !record.failed_entries.is_empty() {
                // Best-effort backup, then purge: the partial archive is
                // reported, and the mutation proceeds.
                warnings.push(
                    ResetError::PartialArchiveFailure {
                        root: record.original_path.clone(),
                        failed: record.failed_entries.len(),
                    }
                    .to_string(),
                );
            }
        }

        let updater = (self.updaters)(kind);
        match updater.update(ctx, &desc, identity) {
            Ok(outcome) => {
                warnings.extend(outcome.warnings);
                OperationResult::success(kind, backup, warnings)
            }
            Err(ResetError::StoreNotFound(path)) => {
                // Nothing to reset: reported as success with no backup.
                info!(%kind, path = %path.display(), "store absent, nothing to reset");
                OperationResult::success(kind, backup, warnings)
            }
            Err(ResetError::PermissionDenied(path)) => {
                let error = self.escalate(ctx, &path.display().to_string());
                OperationResult::failure(kind, error.to_string(), backup)
            }
            Err(err) => OperationResult::failure(kind, err.to_string(), backup),
        }
    }

    /// Handle a permission failure according to the context's elevation
    /// policy. Comes back only when the process was not replaced.
    fn escalate(&self, ctx: &ResetContext, denied_path: &str) -> ResetError {
        if ctx.elevation == ElevationPolicy::Never {
            return ResetError::PermissionDenied(denied_path.into());
        }
        if self.elevator.is_elevated() {
            // Already elevated and still denied: elevation cannot help.
            return ResetError::PermissionDenied(denied_path.into());
        }
        match self.elevator.request(&ctx.effective_replay_args()) {
            Err(ElevationError::Declined(reason)) => ResetError::ElevationDeclined(reason),
            Err(ElevationError::Unavailable(reason)) => ResetError::ElevationUnavailable(reason),
            // The process would have been replaced.
            Ok(never) => match never {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{OsKind, PlatformDirs};
    use crate::elevate::ElevationError;
    use std::convert::Infallible;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct FakeElevator {
        elevated: bool,
        outcome: fn() -> ElevationError,
    }

    impl Elevator for FakeElevator {
        fn is_elevated(&self) -> bool {
            self.elevated
        }

        fn request(&self, _args: &[String]) -> Result<Infallible, ElevationError> {
            Err((self.outcome)())
        }
    }

    fn declining() -> FakeElevator {
        FakeElevator {
            elevated: false,
            outcome: || ElevationError::Declined("user said no".to_string()),
        }
    }

    fn linux_ctx(home: &Path) -> ResetContext {
        ResetContext {
            product: "Cursor".to_string(),
            os: OsKind::Linux,
            dirs: PlatformDirs {
                home: home.to_path_buf(),
                appdata: None,
            },
            allow_create: false,
            elevation: ElevationPolicy::Prompt,
            replay_args: vec!["reset".to_string()],
        }
    }

    fn seed_config(home: &Path) -> std::path::PathBuf {
        let storage = home
            .join(".config")
            .join("Cursor")
            .join("User")
            .join("globalStorage");
        fs::create_dir_all(&storage).unwrap();
        let path = storage.join("storage.json");
        fs::write(&path, r#"{"workbench.theme":"dark"}"#).unwrap();
        path
    }

    #[test]
    fn test_missing_db_succeeds_without_backup_while_present_config_is_backed_up() {
        let tmp = TempDir::new().unwrap();
        seed_config(tmp.path());
        let ctx = linux_ctx(tmp.path());
        let elevator = declining();
        let orchestrator = ResetOrchestrator::new(&elevator);

        let report = orchestrator.reset_all(&ctx);

        let db = report
            .results
            .iter()
            .find(|r| r.kind == StoreKind::EmbeddedDb)
            .unwrap();
        assert!(db.success);
        assert!(db.backup.is_none());

        let config = report
            .results
            .iter()
            .find(|r| r.kind == StoreKind::ConfigJson)
            .unwrap();
        assert!(config.success);
        assert!(config.backup.is_some());
    }

    #[test]
    fn test_registry_is_skipped_on_linux_without_failing_the_run() {
        let tmp = TempDir::new().unwrap();
        seed_config(tmp.path());
        let ctx = linux_ctx(tmp.path());
        let elevator = declining();
        let orchestrator = ResetOrchestrator::new(&elevator);

        let report = orchestrator.reset_all(&ctx);

        let registry = report
            .results
            .iter()
            .find(|r| r.kind == StoreKind::OsRegistry)
            .unwrap();
        assert!(registry.success);
        assert!(!registry.warnings.is_empty());
        assert!(report.overall_success);
    }

    #[test]
    fn test_reset_one_touches_only_the_requested_store() {
        let tmp = TempDir::new().unwrap();
        let config_path = seed_config(tmp.path());
        let ctx = linux_ctx(tmp.path());
        let elevator = declining();
        let orchestrator = ResetOrchestrator::new(&elevator);

        let report = orchestrator.reset_one(&ctx, StoreKind::ConfigJson);
        assert_eq!(report.results.len(), 1);
        assert!(report.overall_success);
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&config_path).unwrap()).unwrap();
        assert_eq!(
            value["telemetry.devDeviceId"],
            serde_json::Value::String(report.identity.device_id.clone())
        );
    }

    /// Updater double: the config store always hits a permission wall,
    /// every other kind keeps its real updater.
    struct DeniedConfigUpdater;

    impl stores::StoreUpdater for DeniedConfigUpdater {
        fn kind(&self) -> StoreKind {
            StoreKind::ConfigJson
        }

        fn update(
            &self,
            _ctx: &ResetContext,
            desc: &crate::paths::StoreDescriptor,
            _identity: &IdentitySet,
        ) -> Result<stores::UpdateOutcome, ResetError> {
            Err(ResetError::PermissionDenied(desc.path.clone()))
        }
    }

    fn denied_config_registry(kind: StoreKind) -> Box<dyn stores::StoreUpdater> {
        match kind {
            StoreKind::ConfigJson => Box::new(DeniedConfigUpdater),
            other => stores::updater_for(other),
        }
    }

    #[test]
    fn test_declined_elevation_fails_only_the_denied_store() {
        let tmp = TempDir::new().unwrap();
        seed_config(tmp.path());
        let ctx = linux_ctx(tmp.path());
        let elevator = declining();
        let orchestrator = ResetOrchestrator::with_updaters(&elevator, denied_config_registry);

        let report = orchestrator.reset_all(&ctx);

        assert!(!report.overall_success);
        assert_eq!(report.failures().count(), 1);

        let config = report
            .results
            .iter()
            .find(|r| r.kind == StoreKind::ConfigJson)
            .unwrap();
        assert!(!config.success);
        assert!(config.error.as_deref().unwrap().contains("declined"));
        // The backup completed before the write was denied.
        assert!(config.backup.is_some());

        // Every other store still reports independently.
        for result in report.results.iter().filter(|r| r.kind != StoreKind::ConfigJson) {
            assert!(result.success, "{} should not be affected", result.kind);
        }
    }

    #[test]
    fn test_declined_elevation_is_terminal_for_that_store() {
        let tmp = TempDir::new().unwrap();
        let ctx = linux_ctx(tmp.path());
        let elevator = declining();
        let orchestrator = ResetOrchestrator::new(&elevator);

        let err = orchestrator.escalate(&ctx, "/etc/denied");
        assert!(matches!(err, ResetError::ElevationDeclined(_)));
    }

    #[test]
    fn test_elevation_policy_never_reports_permission_denied() {
        let tmp = TempDir::new().unwrap();
        let mut ctx = linux_ctx(tmp.path());
        ctx.elevation = ElevationPolicy::Never;
        let elevator = declining();
        let orchestrator = ResetOrchestrator::new(&elevator);

        let err = orchestrator.escalate(&ctx, "/etc/denied");
        assert!(matches!(err, ResetError::PermissionDenied(_)));
    }

    #[test]
    fn test_already_elevated_does_not_prompt_again() {
        let tmp = TempDir::new().unwrap();
        let ctx = linux_ctx(tmp.path());
        let elevator = FakeElevator {
            elevated: true,
            outcome: || panic!("must not prompt when already elevated"),
        };
        let orchestrator = ResetOrchestrator::new(&elevator);

        let err = orchestrator.escalate(&ctx, "/etc/denied");
        assert!(matches!(err, ResetError::PermissionDenied(_)));
    }

    #[test]
    fn test_identity_is_fresh_per_run() {
        let tmp = TempDir::new().unwrap();
        seed_config(tmp.path());
        let ctx = linux_ctx(tmp.path());
        let elevator = declining();
        let orchestrator = ResetOrchestrator::new(&elevator);

        let first = orchestrator.reset_all(&ctx);
        let second = orchestrator.reset_all(&ctx);
        assert_ne!(first.identity.device_id, second.identity.device_id);
    }
}
