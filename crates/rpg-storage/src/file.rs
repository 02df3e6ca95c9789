//! File-backed [`DocumentStore`].
//!
//! One JSON document per path. Writers serialise through an exclusive lock
//! file (`<path>.lock`, created with `create_new`), compare revisions inside
//! the lock, and replace the document by writing a sibling temporary file,
//! syncing it, and renaming it over the target. Readers never take the lock:
//! a rename is atomic, so they see either the old or the new document.
//!
//! A lock older than [`StoreConfig::stale_lock_after`] is taken to belong to
//! a crashed writer and is replaced, one breaker at a time.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use rpg_core::RpgDocument;
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::traits::DocumentStore;

/// Lock age after which the lock is assumed to belong to a crashed writer.
pub const DEFAULT_STALE_LOCK_AFTER: Duration = Duration::from_secs(60);

/// Environment override for the stale-lock threshold, in seconds. `0`
/// disables stale-lock breaking.
pub const STALE_LOCK_ENV: &str = "RPG_LOCK_STALE_SECS";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Where the document lives and how lock contention is handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub path: PathBuf,
    /// `None` never breaks a lock.
    pub stale_lock_after: Option<Duration>,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stale_lock_after: Some(DEFAULT_STALE_LOCK_AFTER),
        }
    }

    /// Like [`StoreConfig::new`], honouring [`STALE_LOCK_ENV`].
    pub fn from_env(path: impl Into<PathBuf>) -> Self {
        let mut config = Self::new(path);
        if let Ok(raw) = std::env::var(STALE_LOCK_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(0) => config.stale_lock_after = None,
                Ok(secs) => config.stale_lock_after = Some(Duration::from_secs(secs)),
                Err(_) => warn!(value = %raw, "ignoring unparsable {STALE_LOCK_ENV}"),
            }
        }
        config
    }

    pub fn with_stale_lock_after(mut self, after: Option<Duration>) -> Self {
        self.stale_lock_after = after;
        self
    }

    /// `<path>.lock`.
    pub fn lock_path(&self) -> PathBuf {
        with_suffix(&self.path, ".lock")
    }

    /// `<path>.lock.break`, held while a stale lock is replaced.
    pub fn breaker_path(&self) -> PathBuf {
        with_suffix(&self.lock_path(), ".break")
    }
}

// ---------------------------------------------------------------------------
// Lock file
// ---------------------------------------------------------------------------

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Held lock. The file carries a random token and is removed on drop only if
/// it still carries it.
#[derive(Debug)]
struct LockGuard {
    path: PathBuf,
    token: String,
}

impl LockGuard {
    fn try_create(path: &Path) -> io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let token = uuid::Uuid::new_v4().to_string();
        // pid is for humans inspecting a leftover lock.
        if let Err(e) = write!(file, "pid={}\ntoken={token}\n", std::process::id()) {
            let _ = fs::remove_file(path);
            return Err(e);
        }
        Ok(Self {
            path: path.to_path_buf(),
            token,
        })
    }

    fn still_ours(&self) -> bool {
        fs::read_to_string(&self.path).is_ok_and(|text| {
            text.lines()
                .any(|line| line.strip_prefix("token=") == Some(self.token.as_str()))
        })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.still_ours() {
            warn!(lock = %self.path.display(), "lock file was replaced while held; leaving it");
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(lock = %self.path.display(), "lock released"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(lock = %self.path.display(), error = %e, "failed to remove lock file"),
        }
    }
}

fn lock_is_stale(path: &Path, after: Duration) -> bool {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age >= after)
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// A [`DocumentStore`] over a single JSON file.
#[derive(Debug, Clone)]
pub struct FileStore {
    config: StoreConfig,
}

impl FileStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    /// Store at `path` with the default stale-lock threshold.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(StoreConfig::new(path))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn lock(&self) -> Result<LockGuard, StorageError> {
        let lock_path = self.config.lock_path();
        match LockGuard::try_create(&lock_path) {
            Ok(guard) => {
                debug!(lock = %lock_path.display(), "lock acquired");
                return Ok(guard);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        let stale_after = self
            .config
            .stale_lock_after
            .filter(|after| lock_is_stale(&lock_path, *after));
        match stale_after {
            Some(after) => self.break_stale_lock(&lock_path, after),
            None => {
                warn!(lock = %lock_path.display(), "document is locked");
                Err(self.locked())
            }
        }
    }

    /// Replaces a stale lock with a fresh one of ours.
    ///
    /// Breakers serialise on [`StoreConfig::breaker_path`] and re-check the
    /// lock's age while holding it, so a lock another breaker has already
    /// replaced is fresh again and left alone.
    fn break_stale_lock(&self, lock_path: &Path, after: Duration) -> Result<LockGuard, StorageError> {
        let breaker_path = self.config.breaker_path();
        let _breaker = match LockGuard::try_create(&breaker_path) {
            Ok(guard) => guard,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                // Left behind by a writer that died mid-break.
                if lock_is_stale(&breaker_path, after) {
                    warn!(breaker = %breaker_path.display(), "removing abandoned lock breaker");
                    remove_if_present(&breaker_path)?;
                }
                return Err(self.locked());
            }
            Err(e) => return Err(e.into()),
        };

        if lock_is_stale(lock_path, after) {
            warn!(lock = %lock_path.display(), ?after, "breaking stale lock");
            remove_if_present(lock_path)?;
        }
        match LockGuard::try_create(lock_path) {
            Ok(guard) => {
                debug!(lock = %lock_path.display(), "lock acquired");
                Ok(guard)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                warn!(lock = %lock_path.display(), "document is locked");
                Err(self.locked())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn locked(&self) -> StorageError {
        StorageError::Locked {
            path: self.config.lock_path().display().to_string(),
        }
    }

    fn read(&self) -> Result<Option<RpgDocument>, StorageError> {
        let text = match fs::read_to_string(&self.config.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }
}

impl DocumentStore for FileStore {
    fn load(&self) -> Result<Option<RpgDocument>, StorageError> {
        self.read()
    }

    fn commit(&self, doc: &RpgDocument, expected_rev: u64) -> Result<u64, StorageError> {
        let _guard = self.lock()?;

        let actual = self.read()?.map_or(0, |d| d.rev);
        if actual != expected_rev {
            warn!(expected = expected_rev, actual, "stale revision, commit refused");
            return Err(StorageError::StaleRev {
                expected: expected_rev,
                actual,
            });
        }

        let mut next = doc.clone();
        next.rev = expected_rev + 1;
        let text = serde_json::to_string_pretty(&next)?;
        write_atomic(&self.config.path, text.as_bytes())?;
        info!(path = %self.config.path.display(), rev = next.rev, "document committed");
        Ok(next.rev)
    }

    fn location(&self) -> String {
        self.config.path.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// Atomic replacement
// ---------------------------------------------------------------------------

/// Writes `bytes` to `path` via a synced temporary sibling and a rename.
///
/// A crash at any point leaves either the previous file or the complete new
/// one. The temporary file is removed if anything before the rename fails.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "rpg".to_string());
    let tmp = dir.join(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    let staged = (|| -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        sync_dir(&dir)?;
        fs::rename(&tmp, path)
    })();
    if let Err(e) = staged {
        if let Err(cleanup) = fs::remove_file(&tmp) {
            if cleanup.kind() != io::ErrorKind::NotFound {
                warn!(tmp = %tmp.display(), error = %cleanup, "failed to remove temporary file");
            }
        }
        return Err(e.into());
    }

    sync_dir(&dir)?;
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_path_appends_suffix() {
        let config = StoreConfig::new("/tmp/plans/rpg.json");
        assert_eq!(config.lock_path(), PathBuf::from("/tmp/plans/rpg.json.lock"));
    }

    #[test]
    fn guard_leaves_a_replaced_lock_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rpg.json.lock");
        let guard = LockGuard::try_create(&path).unwrap();
        assert!(guard.still_ours());
        fs::write(&path, "pid=1\ntoken=someone-else\n").unwrap();
        drop(guard);
        assert!(path.exists());
    }

    #[test]
    fn guard_removes_its_own_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rpg.json.lock");
        drop(LockGuard::try_create(&path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn failed_rename_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // Renaming a file over a non-empty directory fails.
        let target = dir.path().join("occupied");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), b"x").unwrap();
        assert!(write_atomic(&target, b"data").is_err());
        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["occupied"]);
    }
}
