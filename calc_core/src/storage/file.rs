//! JSON-file storage with atomic saves and an advisory lock file.
//!
//! A save writes `<file>.tmp`, syncs it, and renames it over the store so an
//! interrupted write never leaves a truncated document behind. While writing,
//! `<file>.lock` holds an OS-level exclusive lock plus [`LockInfo`] naming the
//! owner, so a second writer fails with [`CalcError::FileLocked`].

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::errors::{CalcError, CalcResult};

use super::Storage;

/// Hours after which a lock left by a vanished writer is ignored.
const STALE_LOCK_HOURS: i64 = 24;

/// Metadata written into the lock file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockInfo {
    pub user_id: String,
    pub machine: String,
    pub pid: u32,
    pub locked_at: DateTime<Utc>,
}

impl LockInfo {
    pub fn new(user_id: impl Into<String>) -> Self {
        LockInfo {
            user_id: user_id.into(),
            machine: hostname().unwrap_or_else(|| "unknown".to_string()),
            pid: std::process::id(),
            locked_at: Utc::now(),
        }
    }

    fn is_stale(&self) -> bool {
        if hostname().as_deref() == Some(self.machine.as_str()) && !process_alive(self.pid) {
            return true;
        }
        (Utc::now() - self.locked_at).num_hours() > STALE_LOCK_HOURS
    }
}

fn hostname() -> Option<String> {
    #[cfg(windows)]
    {
        std::env::var("COMPUTERNAME").ok()
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOSTNAME").ok().or_else(|| std::env::var("HOST").ok())
    }
}

fn process_alive(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        Path::new(&format!("/proc/{}", pid)).exists()
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = pid;
        true
    }
}

/// Exclusive lock on a store file, released on drop.
#[derive(Debug)]
pub struct FileLock {
    lock_path: PathBuf,
    _handle: File,
    pub info: LockInfo,
}

impl FileLock {
    /// Take the lock for `path`, failing if a live owner holds it.
    pub fn acquire(path: &Path, user_id: impl Into<String>) -> CalcResult<Self> {
        let lock_path = lock_path_for(path);

        if let Some(existing) = Self::check(path) {
            return Err(CalcError::file_locked(
                path.display().to_string(),
                format!("{} ({})", existing.user_id, existing.machine),
                existing.locked_at.to_rfc3339(),
            ));
        }

        let mut handle = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| CalcError::file_error("create lock", lock_path.display().to_string(), e.to_string()))?;

        handle
            .try_lock_exclusive()
            .map_err(|_| CalcError::file_locked(path.display().to_string(), "another process", "unknown"))?;

        let info = LockInfo::new(user_id);
        let json = serde_json::to_string_pretty(&info)?;
        handle
            .write_all(json.as_bytes())
            .and_then(|_| handle.sync_all())
            .map_err(|e| CalcError::file_error("write lock", lock_path.display().to_string(), e.to_string()))?;

        Ok(FileLock {
            lock_path,
            _handle: handle,
            info,
        })
    }

    /// Current live owner of the lock for `path`, if any.
    pub fn check(path: &Path) -> Option<LockInfo> {
        let info = read_lock_info(&lock_path_for(path)).ok()?;
        (!info.is_stale()).then_some(info)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}

fn read_lock_info(lock_path: &Path) -> CalcResult<LockInfo> {
    let mut contents = String::new();
    File::open(lock_path)
        .and_then(|mut f| f.read_to_string(&mut contents))
        .map_err(|e| CalcError::file_error("read lock", lock_path.display().to_string(), e.to_string()))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Document store backed by one JSON file.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    user_id: String,
}

impl FileStorage {
    /// Store at `path`; `user_id` is recorded in the lock file while saving.
    pub fn new(path: impl Into<PathBuf>, user_id: impl Into<String>) -> Self {
        FileStorage {
            path: path.into(),
            user_id: user_id.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Storage for FileStorage {
    fn read_raw(&self) -> CalcResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CalcError::file_error("read", self.path.display().to_string(), e.to_string())),
        }
    }

    fn write_raw(&self, json: &str) -> CalcResult<()> {
        let _lock = FileLock::acquire(&self.path, self.user_id.as_str())?;
        let tmp_path = tmp_path_for(&self.path);

        let mut tmp = File::create(&tmp_path)
            .map_err(|e| CalcError::file_error("create temp file", tmp_path.display().to_string(), e.to_string()))?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.sync_all())
            .map_err(|e| CalcError::file_error("write temp file", tmp_path.display().to_string(), e.to_string()))?;

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            CalcError::file_error("rename to final", self.path.display().to_string(), e.to_string())
        })?;

        tracing::debug!(path = %self.path.display(), bytes = json.len(), "document saved");
        Ok(())
    }

    fn remove_raw(&self) -> CalcResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CalcError::file_error("remove", self.path.display().to_string(), e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn store_in(dir: &tempfile::TempDir) -> FileStorage {
        FileStorage::new(dir.path().join("hopeful-finance.json"), "tester")
    }

    #[test]
    fn test_sidecar_paths() {
        let path = Path::new("/data/hopeful-finance.json");
        assert_eq!(lock_path_for(path), Path::new("/data/hopeful-finance.json.lock"));
        assert_eq!(tmp_path_for(path), Path::new("/data/hopeful-finance.json.tmp"));
    }

    #[test]
    fn test_missing_file_loads_sample() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.read_raw().unwrap(), None);
        assert_eq!(store.load(), Document::sample());
    }

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let mut doc = Document::sample();
        doc.basic.project_name = "二号店".to_string();
        doc.revenue.boarding.rooms = 18.0;
        store.save(&doc).unwrap();

        assert!(store.path().exists());
        assert!(!tmp_path_for(store.path()).exists());
        assert!(!lock_path_for(store.path()).exists());

        let loaded = store.load();
        assert_eq!(loaded.basic.project_name, "二号店");
        assert_eq!(loaded.revenue.boarding.rooms, 18.0);

        assert_eq!(store.clear().unwrap(), Document::sample());
        assert!(!store.path().exists());
        store.clear().unwrap();
    }

    #[test]
    fn test_lock_blocks_second_writer() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let lock = FileLock::acquire(store.path(), "someone-else").unwrap();
        assert_eq!(lock.info.user_id, "someone-else");
        assert!(FileLock::check(store.path()).is_some());

        let err = store.save(&Document::sample()).unwrap_err();
        assert_eq!(err.error_code(), "FILE_LOCKED");
        assert!(err.is_recoverable());

        drop(lock);
        assert!(FileLock::check(store.path()).is_none());
        store.save(&Document::sample()).unwrap();
    }

    #[test]
    fn test_stale_lock_is_ignored() {
        let info = LockInfo {
            locked_at: Utc::now() - chrono::Duration::hours(48),
            ..LockInfo::new("ghost")
        };
        assert!(info.is_stale());
        assert!(!LockInfo::new("me").is_stale());
    }
}
