/// Per-invocation reset context.
///
/// Everything a component needs — target product, resolved OS, base
/// directories, policies — travels in this struct. It is constructed once
/// per invocation and passed explicitly; there is no process-wide state.
use anyhow::{Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum OsKind {
    Windows,
    MacOs,
    Linux,
}

impl OsKind {
    /// The OS this process is running on.
    pub fn current() -> Self {
        if cfg!(windows) {
            OsKind::Windows
        } else if cfg!(target_os = "macos") {
            OsKind::MacOs
        } else {
            OsKind::Linux
        }
    }
}

impl std::fmt::Display for OsKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OsKind::Windows => "windows",
            OsKind::MacOs => "macos",
            OsKind::Linux => "linux",
        };
        write!(f, "{}", name)
    }
}

/// What to do when a store write hits a permission wall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevationPolicy {
    /// Ask the OS for elevation (UAC / osascript / sudo) and re-run.
    Prompt,
    /// Report the permission failure without prompting.
    Never,
}

/// Base directories used by path resolution.
///
/// Captured once per invocation so tests can point resolution at a
/// temporary tree instead of the real user profile.
#[derive(Debug, Clone)]
pub struct PlatformDirs {
    /// The user's home directory.
    pub home: PathBuf,
    /// `%APPDATA%` on Windows; `None` elsewhere.
    pub appdata: Option<PathBuf>,
}

impl PlatformDirs {
    /// Resolve base directories from the environment for `os`.
    pub fn from_env(os: OsKind) -> Result<Self> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let appdata = match os {
            OsKind::Windows => Some(
                std::env::var_os("APPDATA")
                    .map(PathBuf::from)
                    .or_else(dirs::config_dir)
                    .context("could not determine %APPDATA% directory")?,
            ),
            _ => None,
        };
        Ok(Self { home, appdata })
    }
}

/// Context for one reset invocation.
#[derive(Debug, Clone)]
pub struct ResetContext {
    /// Logical store name: the product's data directory name
    /// (e.g. "Cursor", "VSCodium", "Code").
    pub product: String,
    pub os: OsKind,
    pub dirs: PlatformDirs,
    /// Create stores that do not exist yet instead of reporting
    /// `StoreNotFound` (applies to the JSON config and flat-id file).
    pub allow_create: bool,
    pub elevation: ElevationPolicy,
    /// Argument vector to replay in an elevated process. Empty means
    /// "use the current process arguments".
    pub replay_args: Vec<String>,
}

impl ResetContext {
    /// Build a context for the current host OS and environment.
    pub fn for_current_host(product: &str) -> Result<Self> {
        let os = OsKind::current();
        Ok(Self {
            product: product.to_owned(),
            os,
            dirs: PlatformDirs::from_env(os)?,
            allow_create: false,
            elevation: ElevationPolicy::Prompt,
            replay_args: Vec::new(),
        })
    }

    /// The arguments an elevated replacement process should run with.
    pub fn effective_replay_args(&self) -> Vec<String> {
        if self.replay_args.is_empty() {
            std::env::args().skip(1).collect()
        } else {
            self.replay_args.clone()
        }
    }
}
