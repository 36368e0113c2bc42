//! File-backed key-value store
//!
//! Each key maps to `<dir>/<key>.json`. Writes go to a temporary sibling and
//! are renamed over the target so a reader never sees a half-written record.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::KeyValueStore;
use crate::error::{Result, TimerError};

#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Store rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(TimerError::Persistence(format!("invalid key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(None),
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(&e, &format!("Failed to read {}", path.display()))),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir)
            .map_err(|e| io_error(&e, "Failed to create data directory"))?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)
            .map_err(|e| io_error(&e, &format!("Failed to write {}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .map_err(|e| io_error(&e, &format!("Failed to replace {}", path.display())))?;
        Ok(())
    }
}

/// Categories of disk errors for user-friendly messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiskErrorKind {
    DiskFull,
    PermissionDenied,
    Other,
}

fn categorize_io_error(e: &std::io::Error) -> DiskErrorKind {
    match e.kind() {
        ErrorKind::WriteZero => DiskErrorKind::DiskFull,
        ErrorKind::PermissionDenied => DiskErrorKind::PermissionDenied,
        _ => {
            #[cfg(unix)]
            {
                // ENOSPC, EDQUOT (Linux), EDQUOT (macOS)
                if let Some(28 | 122 | 69) = e.raw_os_error() {
                    return DiskErrorKind::DiskFull;
                }
            }
            DiskErrorKind::Other
        }
    }
}

fn io_error(e: &std::io::Error, context: &str) -> TimerError {
    let message = match categorize_io_error(e) {
        DiskErrorKind::DiskFull => format!("{}: disk full", context),
        DiskErrorKind::PermissionDenied => format!("{}: permission denied", context),
        DiskErrorKind::Other => format!("{}: {}", context, e),
    };
    TimerError::Persistence(message)
}
