/// Store path resolution.
///
/// Given a product name and an OS, resolves the absolute location of each
/// backing store. Pure path computation except for the single stat call
/// that fills `exists_before_op`. Each OS has a fixed layout; nothing is
/// guessed.
use std::path::PathBuf;

use crate::context::{OsKind, ResetContext};
use crate::error::ResetError;

/// Windows registry key holding the machine GUID, written by the registry
/// updater. Stored as the descriptor "path" for the OsRegistry kind.
pub const WIN_CRYPTOGRAPHY_KEY: &str = r"SOFTWARE\Microsoft\Cryptography";
pub const WIN_SQMCLIENT_KEY: &str = r"SOFTWARE\Microsoft\SQMClient";

/// Root-owned plist holding the platform UUID on macOS.
pub const MACOS_PLATFORM_UUID_PLIST: &str =
    "/var/root/Library/Preferences/SystemConfiguration/com.apple.platform.uuid.plist";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    ConfigJson,
    EmbeddedDb,
    FlatIdFile,
    WorkspaceCache,
    OsRegistry,
}

impl StoreKind {
    pub const ALL: [StoreKind; 5] = [
        StoreKind::ConfigJson,
        StoreKind::EmbeddedDb,
        StoreKind::FlatIdFile,
        StoreKind::WorkspaceCache,
        StoreKind::OsRegistry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::ConfigJson => "config-json",
            StoreKind::EmbeddedDb => "embedded-db",
            StoreKind::FlatIdFile => "flat-id-file",
            StoreKind::WorkspaceCache => "workspace-cache",
            StoreKind::OsRegistry => "os-registry",
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "config-json" => Ok(StoreKind::ConfigJson),
            "embedded-db" => Ok(StoreKind::EmbeddedDb),
            "flat-id-file" => Ok(StoreKind::FlatIdFile),
            "workspace-cache" => Ok(StoreKind::WorkspaceCache),
            "os-registry" => Ok(StoreKind::OsRegistry),
            other => Err(format!(
                "unknown store kind '{}' (expected one of: config-json, embedded-db, \
                 flat-id-file, workspace-cache, os-registry)",
                other
            )),
        }
    }
}

/// Platform-resolved description of one backing store.
///
/// Constructed fresh per operation; never cached across runs, because
/// installation paths can change between runs.
#[derive(Debug, Clone)]
pub struct StoreDescriptor {
    pub kind: StoreKind,
    /// Absolute filesystem path, or the registry key path for OsRegistry.
    pub path: PathBuf,
    pub exists_before_op: bool,
}

/// Resolve the store of `kind` for the product and OS in `ctx`.
///
/// Fails with `UnsupportedPlatform` when the OS has no layout for the
/// kind (Linux has no OS registry; other kinds still resolve).
pub fn resolve(ctx: &ResetContext, kind: StoreKind) -> Result<StoreDescriptor, ResetError> {
    let path = match kind {
        StoreKind::ConfigJson => user_data_root(ctx)?
            .join("User")
            .join("globalStorage")
            .join("storage.json"),
        StoreKind::EmbeddedDb => user_data_root(ctx)?
            .join("User")
            .join("globalStorage")
            .join("state.vscdb"),
        StoreKind::FlatIdFile => user_data_root(ctx)?.join("machineId"),
        StoreKind::WorkspaceCache => user_data_root(ctx)?
            .join("User")
            .join("workspaceStorage"),
        StoreKind::OsRegistry => match ctx.os {
            OsKind::Windows => PathBuf::from(WIN_CRYPTOGRAPHY_KEY),
            OsKind::MacOs => PathBuf::from(MACOS_PLATFORM_UUID_PLIST),
            OsKind::Linux => {
                return Err(ResetError::UnsupportedPlatform { kind, os: ctx.os });
            }
        },
    };

    // Registry keys on Windows are not filesystem paths; the Cryptography
    // key is present on every installation.
    let exists_before_op = match (kind, ctx.os) {
        (StoreKind::OsRegistry, OsKind::Windows) => true,
        _ => path.exists(),
    };

    Ok(StoreDescriptor {
        kind,
        path,
        exists_before_op,
    })
}

/// The product's user data root, e.g. `%APPDATA%/Cursor` on Windows,
/// `~/Library/Application Support/Cursor` on macOS, `~/.config/Cursor`
/// on Linux.
fn user_data_root(ctx: &ResetContext) -> Result<PathBuf, ResetError> {
    let root = match ctx.os {
        OsKind::Windows => ctx
            .dirs
            .appdata
            .clone()
            .ok_or_else(|| ResetError::StoreNotFound(PathBuf::from("%APPDATA%")))?,
        OsKind::MacOs => ctx.dirs.home.join("Library").join("Application Support"),
        OsKind::Linux => ctx.dirs.home.join(".config"),
    };
    Ok(root.join(&ctx.product))
}
