/// Structured result of a reset run.
use serde::Serialize;

use crate::backup::BackupRecord;
use crate::identity::IdentitySet;
use crate::paths::StoreKind;

/// Outcome of one store's reset.
#[derive(Debug, Serialize)]
pub struct OperationResult {
    pub kind: StoreKind,
    pub success: bool,
    /// Empty on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-fatal conditions (partial archive entries, skipped platform,
    /// per-entry purge failures).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<BackupRecord>,
}

impl OperationResult {
    pub fn success(kind: StoreKind, backup: Option<BackupRecord>, warnings: Vec<String>) -> Self {
        Self {
            kind,
            success: true,
            error: None,
            warnings,
            backup,
        }
    }

    pub fn failure(kind: StoreKind, error: String, backup: Option<BackupRecord>) -> Self {
        Self {
            kind,
            success: false,
            error: Some(error),
            warnings: Vec::new(),
            backup,
        }
    }
}

/// Aggregated report for one orchestration run.
///
/// `overall_success` is true only if every attempted store succeeded.
/// Partial success is representable and surfaced to the caller; it is
/// never collapsed into a plain success or failure.
#[derive(Debug, Serialize)]
pub struct ResetReport {
    pub identity: IdentitySet,
    pub results: Vec<OperationResult>,
    pub overall_success: bool,
}

impl ResetReport {
    pub fn new(identity: IdentitySet, results: Vec<OperationResult>) -> Self {
        let overall_success = results.iter().all(|r| r.success);
        Self {
            identity,
            results,
            overall_success,
        }
    }

    /// The results that failed, for caller-side display.
    pub fn failures(&self) -> impl Iterator<Item = &OperationResult> {
        self.results.iter().filter(|r| !r.success)
    }
}
