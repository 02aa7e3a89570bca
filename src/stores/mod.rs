/// Per-store update strategies.
///
/// One updater per store kind, selected through a static registry keyed
/// on `StoreKind`. Updaters are single-purpose and stateless; everything
/// they need arrives through the context and the resolved descriptor.
use crate::context::ResetContext;
use crate::error::ResetError;
use crate::identity::IdentitySet;
use crate::paths::{StoreDescriptor, StoreKind};

pub mod config_json;
pub mod embedded_db;
pub mod flat_id;
pub mod os_registry;
pub mod workspace_cache;

/// Result of a successful store update.
#[derive(Debug, Default)]
pub struct UpdateOutcome {
    /// Non-fatal conditions worth surfacing in the report (partial
    /// archive entries, per-entry purge failures).
    pub warnings: Vec<String>,
}

impl UpdateOutcome {
    pub fn clean() -> Self {
        Self::default()
    }
}

/// Strategy interface implemented by each store updater.
pub trait StoreUpdater {
    fn kind(&self) -> StoreKind;

    /// Write the identity into the store (or purge it, for the workspace
    /// cache). The backup for this store has already completed or been
    /// explicitly skipped before this is called.
    fn update(
        &self,
        ctx: &ResetContext,
        desc: &StoreDescriptor,
        identity: &IdentitySet,
    ) -> Result<UpdateOutcome, ResetError>;
}

/// Static registry: the updater for a store kind.
pub fn updater_for(kind: StoreKind) -> Box<dyn StoreUpdater> {
    match kind {
        StoreKind::ConfigJson => Box::new(config_json::ConfigJsonUpdater),
        StoreKind::EmbeddedDb => Box::new(embedded_db::EmbeddedDbUpdater),
        StoreKind::FlatIdFile => Box::new(flat_id::FlatIdUpdater),
        StoreKind::WorkspaceCache => Box::new(workspace_cache::WorkspaceCachePurger),
        StoreKind::OsRegistry => Box::new(os_registry::OsRegistryUpdater),
    }
}
