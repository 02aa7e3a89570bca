/// Privilege elevation.
///
/// When a store write needs rights the process does not hold, the whole
/// operation is re-launched in an elevated process and the current one
/// terminates. Only a declined or unavailable elevation ever returns
/// control to the caller.
use std::convert::Infallible;
use std::process::Command;

use tracing::info;

/// Why control came back instead of the process being replaced.
#[derive(Debug, thiserror::Error)]
pub enum ElevationError {
    /// The user dismissed or rejected the OS consent prompt.
    #[error("the elevation prompt was declined: {0}")]
    Declined(String),
    /// No elevation mechanism exists on this host.
    #[error("elevation is unavailable: {0}")]
    Unavailable(String),
}

/// Elevation seam. The orchestrator talks to this trait so tests can
/// exercise the declined/unavailable paths without spawning processes.
pub trait Elevator {
    fn is_elevated(&self) -> bool;

    /// Re-launch the current executable with `args` in an elevated
    /// process.
    ///
    /// On success this call DOES NOT RETURN: the replacement process runs
    /// the full operation and the current process exits with its status.
    /// Only `Declined` and `Unavailable` come back to the caller, and the
    /// caller must not retry automatically.
    fn request(&self, args: &[String]) -> Result<Infallible, ElevationError>;
}

/// The real OS-backed elevator.
pub struct OsElevator;

impl Elevator for OsElevator {
    fn is_elevated(&self) -> bool {
        is_elevated()
    }

    fn request(&self, args: &[String]) -> Result<Infallible, ElevationError> {
        request_elevation(args)
    }
}

/// Whether the current process already holds administrative rights.
pub fn is_elevated() -> bool {
    #[cfg(unix)]
    {
        // Root can write every store this tool touches.
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(windows)]
    {
        use winreg::enums::{HKEY_LOCAL_MACHINE, KEY_READ, KEY_WRITE};
        use winreg::RegKey;
        // Writable access to an HKLM key is only granted to elevated
        // processes.
        RegKey::predef(HKEY_LOCAL_MACHINE)
            .open_subkey_with_flags(r"SOFTWARE\Microsoft", KEY_READ | KEY_WRITE)
            .is_ok()
    }
}

/// Re-launch the current executable elevated. See [`Elevator::request`]
/// for the control-flow contract: `Ok` is unreachable by construction.
pub fn request_elevation(args: &[String]) -> Result<Infallible, ElevationError> {
    let exe = std::env::current_exe()
        .map_err(|e| ElevationError::Unavailable(format!("cannot locate current executable: {}", e)))?;

    #[cfg(target_os = "linux")]
    {
        // Validate credentials first so a declined prompt is
        // distinguishable from a failed re-run.
        let auth = Command::new("sudo")
            .arg("-v")
            .status()
            .map_err(|e| ElevationError::Unavailable(format!("sudo not runnable: {}", e)))?;
        if !auth.success() {
            return Err(ElevationError::Declined(
                "sudo authentication failed or was cancelled".to_string(),
            ));
        }
        info!("re-executing under sudo");
        let status = Command::new("sudo")
            .args(sudo_replay_args(&exe, args))
            .status()
            .map_err(|e| ElevationError::Unavailable(format!("sudo re-exec failed: {}", e)))?;
        std::process::exit(status.code().unwrap_or(1));
    }

    #[cfg(target_os = "macos")]
    {
        let replay = std::iter::once(exe.display().to_string())
            .chain(args.iter().cloned())
            .map(|a| shell_quote(&a))
            .collect::<Vec<_>>()
            .join(" ");
        let script = format!(
            "do shell script \"{}\" with administrator privileges",
            replay.replace('\\', "\\\\").replace('"', "\\\"")
        );
        info!("requesting administrator privileges via osascript");
        let status = Command::new("osascript")
            .arg("-e")
            .arg(&script)
            .status()
            .map_err(|e| ElevationError::Unavailable(format!("osascript not runnable: {}", e)))?;
        if !status.success() {
            // osascript exits non-zero when the user cancels the prompt.
            return Err(ElevationError::Declined(
                "administrator prompt was cancelled".to_string(),
            ));
        }
        std::process::exit(0);
    }

    #[cfg(windows)]
    {
        let arg_list = args
            .iter()
            .map(|a| format!("'{}'", a.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(",");
        let ps = if args.is_empty() {
            format!(
                "Start-Process -FilePath '{}' -Verb RunAs -Wait",
                exe.display()
            )
        } else {
            format!(
                "Start-Process -FilePath '{}' -ArgumentList {} -Verb RunAs -Wait",
                exe.display(),
                arg_list
            )
        };
        info!("requesting elevation via UAC");
        let status = Command::new("powershell")
            .args(["-NoProfile", "-Command", &ps])
            .status()
            .map_err(|e| ElevationError::Unavailable(format!("powershell not runnable: {}", e)))?;
        if !status.success() {
            // Start-Process fails when the UAC prompt is dismissed.
            return Err(ElevationError::Declined(
                "the UAC prompt was dismissed".to_string(),
            ));
        }
        std::process::exit(0);
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", windows)))]
    {
        let _ = args;
        Err(ElevationError::Unavailable(
            "no elevation mechanism on this platform".to_string(),
        ))
    }
}

/// sudo resets the environment, which would point `HOME` at root's home
/// and make the elevated child resolve root's store tree instead of the
/// invoking user's. `--preserve-env=HOME` keeps the child on the same
/// tree.
#[cfg(target_os = "linux")]
fn sudo_replay_args(exe: &std::path::Path, args: &[String]) -> Vec<std::ffi::OsString> {
    let mut argv: Vec<std::ffi::OsString> =
        vec!["--preserve-env=HOME".into(), exe.as_os_str().to_os_string()];
    argv.extend(args.iter().map(std::ffi::OsString::from));
    argv
}

#[cfg(target_os = "macos")]
fn shell_quote(arg: &str) -> String {
    if arg.chars().all(|c| c.is_ascii_alphanumeric() || "-_./=".contains(c)) {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}
