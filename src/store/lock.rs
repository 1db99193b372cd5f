//! Single-writer lock next to the dataset file.
//!
//! The lock is a sibling file `<dataset>.lock` created with `create_new`, so
//! exactly one writer can hold it. It records who took it and is removed when
//! the guard drops, on success and error paths alike. A lock left behind by a
//! crashed process is reclaimed once it is older than the configured age;
//! replacing it requires a second exclusive file, `<dataset>.lock.reclaim`,
//! so two writers can never both delete and recreate the lock.

use crate::error::BtbError;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Held while the dataset is being rewritten.
#[derive(Debug)]
pub struct WriteLock {
    path: PathBuf,
}

impl WriteLock {
    /// Take the lock for `target`, or fail with [`BtbError::WriteConflict`].
    pub fn acquire(target: &Path, stale_after: Duration) -> Result<Self, BtbError> {
        let path = lock_path(target);
        match create(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if !is_stale(&path, stale_after) {
                    return Err(conflict(target, &path));
                }
                reclaim_stale(target, &path, stale_after)?;
            }
            Err(e) => return Err(BtbError::io(&path, e)),
        }
        debug!("Acquired {}", path.display());
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        } else {
            debug!("Released {}", self.path.display());
        }
    }
}

/// `<target>.lock`, next to the target.
pub fn lock_path(target: &Path) -> PathBuf {
    with_suffix(target, ".lock")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Exclusive right to replace a stale lock, held as `<lock>.reclaim`.
struct ReclaimGuard {
    path: PathBuf,
}

impl Drop for ReclaimGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}

/// Replace a stale lock with our own.
///
/// Only the holder of the reclaim guard may delete the old lock, and it
/// checks the lock again once it holds the guard: a competing writer may have
/// reclaimed it already, leaving a fresh lock that must not be removed.
fn reclaim_stale(target: &Path, lock: &Path, stale_after: Duration) -> Result<(), BtbError> {
    let guard_path = with_suffix(lock, ".reclaim");
    match create(&guard_path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(conflict(target, &guard_path));
        }
        Err(e) => return Err(BtbError::io(&guard_path, e)),
    }
    let _guard = ReclaimGuard { path: guard_path };

    if lock.exists() {
        if !is_stale(lock, stale_after) {
            return Err(conflict(target, lock));
        }
        warn!("Reclaiming stale lock {} ({})", lock.display(), holder(lock));
        match fs::remove_file(lock) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(BtbError::io(lock, e)),
        }
    }
    create(lock).map_err(|e| match e.kind() {
        io::ErrorKind::AlreadyExists => conflict(target, lock),
        _ => BtbError::io(lock, e),
    })
}

fn create(path: &Path) -> io::Result<()> {
    let mut f = OpenOptions::new().write(true).create_new(true).open(path)?;
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    writeln!(f, "pid {} since {}", std::process::id(), since_epoch)?;
    Ok(())
}

fn is_stale(path: &Path, stale_after: Duration) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .is_some_and(|age| age >= stale_after)
}

fn holder(path: &Path) -> String {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown holder".to_string())
}

fn conflict(target: &Path, lock: &Path) -> BtbError {
    BtbError::WriteConflict {
        path: target.to_path_buf(),
        lock_path: lock.to_path_buf(),
        holder: holder(lock),
    }
}
