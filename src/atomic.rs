/// Atomic file replacement.
///
/// New content goes to a temp file in the same directory as the target
/// (same filesystem, so the rename is atomic), then a rename replaces the
/// target. On any failure the temp file is removed before returning; no
/// temp files are left behind on any exit path.
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::ResetError;

/// Write `content` to `path` atomically.
///
/// The target either ends up containing exactly `content` or keeps its
/// original bytes; a truncated or mixed state is never observable.
/// Permission failures come back as `ResetError::PermissionDenied` so the
/// caller can run its elevation policy.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), ResetError> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).ok_or_else(|| {
        ResetError::AtomicWriteFailed {
            path: path.to_path_buf(),
            source: std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "target path has no parent directory",
            ),
        }
    })?;

    let mut tmp =
        NamedTempFile::new_in(parent).map_err(|e| ResetError::from_write_error(path, e))?;
    tmp.write_all(content)
        .map_err(|e| ResetError::from_write_error(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| ResetError::from_write_error(path, e))?;

    // persist() hands the temp file back on failure; dropping it removes
    // the file from disk.
    match tmp.persist(path) {
        Ok(_) => Ok(()),
        Err(e) => Err(ResetError::from_write_error(path, e.error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_writes_new_content() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("storage.json");
        atomic_write(&target, b"{\"a\":1}").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn test_replaces_existing_content() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("machineId");
        fs::write(&target, "old").unwrap();
        atomic_write(&target, b"new").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn test_missing_parent_fails_without_touching_target() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("nope").join("storage.json");
        let err = atomic_write(&target, b"data").unwrap_err();
        assert!(matches!(err, ResetError::AtomicWriteFailed { .. }));
        assert!(!target.exists());
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("file.txt");
        atomic_write(&target, b"content").unwrap();
        let entries: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("file.txt")]);
    }

    #[test]
    fn test_failure_preserves_original_bytes() {
        let tmp = TempDir::new().unwrap();
        // A directory at the target path makes the rename fail while the
        // parent stays writable.
        let target = tmp.path().join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("inner"), "keep").unwrap();

        let err = atomic_write(&target, b"data").unwrap_err();
        assert!(matches!(
            err,
            ResetError::AtomicWriteFailed { .. } | ResetError::PermissionDenied(_)
        ));
        assert_eq!(
            fs::read_to_string(target.join("inner")).unwrap(),
            "keep"
        );
    }
}
