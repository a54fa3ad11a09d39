//! Cross-process mutual exclusion for the delivery pipeline.
//!
//! A single JSON lock file inside the shared output directory records the
//! owning process (pid, timestamp, hostname) and the owning handle's token.
//! Only one live instance may hold it. A record older than the staleness
//! threshold is treated as abandoned: the file is replaced and the recorded
//! process is terminated (best effort). A record that cannot be parsed is
//! treated as corrupted and replaced. The owner keeps its record fresh with
//! `refresh`, which fails once another instance has taken the file over.

mod config;
mod error;
mod file_lock;

pub use config::LockConfig;
pub use error::LockError;
pub use file_lock::{current_hostname, LockRecord, ProcessLock};
