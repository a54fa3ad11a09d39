//! Lock file implementation.
//!
//! The file is never rewritten in place. New records are written to a unique
//! sibling file and then linked (create) or renamed (refresh) onto the lock
//! path, so readers only ever see a complete record. Stale or corrupted files
//! are taken over by renaming them to a unique tombstone; only the instance
//! whose rename moved the exact bytes it judged stale proceeds.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::LockConfig;
use super::error::LockError;

/// Content of the lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Process id of the owner.
    pub pid: u32,
    /// When the owner acquired (or last refreshed) the lock.
    pub timestamp: DateTime<Utc>,
    /// Host the owner runs on.
    pub hostname: String,
    /// Token of the lock handle that wrote the record.
    #[serde(default)]
    pub owner: String,
}

impl LockRecord {
    /// Record for the current process, written by handle `owner`.
    pub fn for_owner(owner: &str) -> Self {
        Self {
            pid: std::process::id(),
            timestamp: Utc::now(),
            hostname: current_hostname(),
            owner: owner.to_string(),
        }
    }

    /// Whether the record is older than `threshold` at `now`.
    ///
    /// Records stamped in the future (clock skew) are never stale.
    pub fn is_stale_at(&self, now: DateTime<Utc>, threshold: std::time::Duration) -> bool {
        match (now - self.timestamp).to_std() {
            Ok(age) => age > threshold,
            Err(_) => false,
        }
    }
}

/// What was found at the lock path. Raw bytes are kept for takeover checks.
enum Existing {
    Missing,
    Corrupted { reason: String, raw: Vec<u8> },
    Record { record: LockRecord, raw: Vec<u8> },
}

/// Single-instance lock backed by a JSON file.
///
/// Each handle carries its own owner token; `refresh` and `release` only act
/// on a file whose record carries that token. The lock is released on
/// `release()` or, as a last resort, on drop.
pub struct ProcessLock {
    path: PathBuf,
    config: LockConfig,
    owner: String,
    held: bool,
}

impl ProcessLock {
    /// Creates a lock handle for `path`. Nothing is touched until `try_acquire`.
    pub fn new(path: impl Into<PathBuf>, config: LockConfig) -> Self {
        Self {
            path: path.into(),
            config,
            owner: Uuid::new_v4().to_string(),
            held: false,
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Token written into records of this handle.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Whether this handle currently owns the lock.
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Attempts to take the lock.
    ///
    /// Returns `Ok(false)` when another live instance owns a fresh lock or
    /// wins a concurrent takeover; that is normal flow control. Stale and
    /// corrupted lock files are replaced.
    pub fn try_acquire(&mut self) -> Result<bool, LockError> {
        if self.held {
            match self.refresh() {
                Ok(()) => return Ok(true),
                Err(LockError::Lost { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        match self.read_existing()? {
            Existing::Missing => {}
            Existing::Corrupted { reason, raw } => {
                warn!(
                    path = %self.path.display(),
                    reason = %reason,
                    "Lock file is corrupted, replacing it"
                );
                if !self.take_over(&raw)? {
                    info!("Corrupted lock was replaced by another instance first");
                    return Ok(false);
                }
            }
            Existing::Record { record, raw } => {
                if !record.is_stale_at(Utc::now(), self.config.stale_after()) {
                    info!(
                        pid = record.pid,
                        hostname = %record.hostname,
                        locked_at = %record.timestamp,
                        "Another instance holds the lock"
                    );
                    return Ok(false);
                }
                warn!(
                    pid = record.pid,
                    hostname = %record.hostname,
                    locked_at = %record.timestamp,
                    "Lock is stale, taking over"
                );
                if !self.take_over(&raw)? {
                    info!("Stale lock was taken over by another instance first");
                    return Ok(false);
                }
                if self.config.terminate_stale_holder {
                    terminate_holder(&record);
                }
            }
        }

        let record = self.record();
        if !self.create_record(&record)? {
            info!("Lock was taken concurrently by another instance");
            return Ok(false);
        }

        self.held = true;
        debug!(pid = record.pid, path = %self.path.display(), "Lock acquired");
        Ok(true)
    }

    /// Rewrites the timestamp of a lock this handle owns.
    ///
    /// Fails with [`LockError::Lost`] when the file no longer carries this
    /// handle's token; the handle then stops considering itself the owner.
    pub fn refresh(&mut self) -> Result<(), LockError> {
        if !self.held {
            return Ok(());
        }
        self.ensure_owned()?;

        let temp = self.write_sibling("refresh", &self.record())?;
        fs::rename(&temp, &self.path).map_err(|e| {
            remove_quietly(&temp);
            LockError::io(&self.path, e)
        })
    }

    /// Deletes the lock file if this handle still owns it.
    ///
    /// A file that now belongs to another instance is left in place.
    pub fn release(&mut self) -> Result<(), LockError> {
        if !self.held {
            return Ok(());
        }
        let owned = self.ensure_owned();
        self.held = false;
        match owned {
            Ok(()) => {}
            Err(LockError::Lost { .. }) => return Ok(()),
            Err(e) => return Err(e),
        }

        remove_if_present(&self.path)?;
        info!(path = %self.path.display(), "Lock released");
        Ok(())
    }

    fn record(&self) -> LockRecord {
        LockRecord::for_owner(&self.owner)
    }

    fn ensure_owned(&mut self) -> Result<(), LockError> {
        let holder = match self.read_existing()? {
            Existing::Record { record, .. } if record.owner == self.owner => return Ok(()),
            Existing::Record { record, .. } => {
                format!("pid {} on {}", record.pid, record.hostname)
            }
            Existing::Corrupted { .. } => "an unreadable record".to_string(),
            Existing::Missing => "nobody".to_string(),
        };
        self.held = false;
        warn!(
            path = %self.path.display(),
            holder = %holder,
            "Lock is no longer owned by this instance"
        );
        Err(LockError::Lost {
            path: self.path.clone(),
            holder,
        })
    }

    fn read_existing(&self) -> Result<Existing, LockError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Existing::Missing),
            Err(e) => return Err(LockError::io(&self.path, e)),
        };

        Ok(match serde_json::from_slice::<LockRecord>(&raw) {
            Ok(record) => Existing::Record { record, raw },
            Err(e) => Existing::Corrupted {
                reason: e.to_string(),
                raw,
            },
        })
    }

    /// Moves the file judged stale out of the way.
    ///
    /// Returns false when the file at the lock path changed since it was read
    /// as `seen`; the moved record is then put back.
    fn take_over(&self, seen: &[u8]) -> Result<bool, LockError> {
        let tombstone = self.sibling("stale");
        match fs::rename(&self.path, &tombstone) {
            Ok(()) => {}
            // Already moved by someone else; creation decides the winner.
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(LockError::io(&self.path, e)),
        }

        let moved = fs::read(&tombstone).map_err(|e| LockError::io(&tombstone, e))?;
        if moved == seen {
            remove_quietly(&tombstone);
            return Ok(true);
        }

        match fs::hard_link(&tombstone, &self.path) {
            Ok(()) => debug!("Restored a lock record written during takeover"),
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "Could not restore a lock record written during takeover"
            ),
        }
        remove_quietly(&tombstone);
        Ok(false)
    }

    /// Publishes `record` at the lock path unless a file is already there.
    fn create_record(&self, record: &LockRecord) -> Result<bool, LockError> {
        let temp = self.write_sibling("new", record)?;
        let linked = fs::hard_link(&temp, &self.path);
        remove_quietly(&temp);

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => {
                debug!(error = %e, "Hard links unavailable, creating lock file directly");
                self.create_direct(record)
            }
        }
    }

    fn create_direct(&self, record: &LockRecord) -> Result<bool, LockError> {
        let json = serde_json::to_vec_pretty(record)?;
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(LockError::io(&self.path, e)),
        };
        file.write_all(&json)
            .map_err(|e| LockError::io(&self.path, e))?;
        Ok(true)
    }

    /// Writes `record` to a fresh sibling file and returns its path.
    fn write_sibling(&self, tag: &str, record: &LockRecord) -> Result<PathBuf, LockError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| LockError::io(parent, e))?;
            }
        }
        let temp = self.sibling(tag);
        let json = serde_json::to_vec_pretty(record)?;
        fs::write(&temp, json).map_err(|e| LockError::io(&temp, e))?;
        Ok(temp)
    }

    /// Unique path next to the lock file.
    fn sibling(&self, tag: &str) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "lock".to_string());
        self.path
            .with_file_name(format!("{}.{}-{}", name, tag, Uuid::new_v4().simple()))
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        if self.held {
            if let Err(e) = self.release() {
                warn!("Failed to release lock on drop: {}", e);
            }
        }
    }
}

fn remove_if_present(path: &Path) -> Result<(), LockError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(LockError::io(path, e)),
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = remove_if_present(path) {
        warn!(error = %e, "Failed to remove temporary lock file");
    }
}

/// Best-effort termination of the process recorded in a stale lock.
///
/// Only processes on this host other than ourselves are signalled. Failure is
/// logged, never returned.
fn terminate_holder(record: &LockRecord) {
    if record.pid == std::process::id() {
        return;
    }
    if record.hostname != current_hostname() {
        warn!(
            pid = record.pid,
            hostname = %record.hostname,
            "Stale lock holder runs on another host, not terminating it"
        );
        return;
    }
    kill_pid(record.pid);
}

#[cfg(unix)]
fn kill_pid(pid: u32) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        warn!(pid, "Recorded pid is out of range, not terminating it");
        return;
    };

    match signal::kill(Pid::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => info!(pid, "Sent SIGKILL to stale lock holder"),
        Err(nix::errno::Errno::ESRCH) => debug!(pid, "Stale lock holder already gone"),
        Err(e) => warn!(pid, error = %e, "Failed to terminate stale lock holder"),
    }
}

#[cfg(not(unix))]
fn kill_pid(pid: u32) {
    warn!(pid, "Terminating stale lock holders is not supported on this platform");
}

/// Hostname of this machine, or "unknown".
pub fn current_hostname() -> String {
    #[cfg(unix)]
    {
        if let Ok(name) = nix::unistd::gethostname() {
            if let Some(name) = name.to_str() {
                return name.to_string();
            }
        }
    }
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
