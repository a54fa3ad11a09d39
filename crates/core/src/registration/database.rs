//! Database handle that hands out one connection per logical query.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use super::config::DatabaseConfig;
use super::error::RegistrationError;

/// Shared database handle.
///
/// The handle does not keep a connection open; `connect` opens a fresh one
/// each time. `close` is terminal: later `connect` calls fail.
#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    busy_timeout: Duration,
    closed: AtomicBool,
}

impl Database {
    /// Creates a handle for an existing database. Nothing is opened yet.
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            path: config.path.clone(),
            busy_timeout: config.busy_timeout(),
            closed: AtomicBool::new(false),
        }
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens a fresh read-write connection. The database must already exist.
    pub fn connect(&self) -> Result<Connection, RegistrationError> {
        if self.is_closed() {
            return Err(RegistrationError::Closed);
        }
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(self.busy_timeout)?;
        Ok(conn)
    }

    /// Checks that the database opens and exposes the registration tables.
    pub fn verify(&self) -> Result<(), RegistrationError> {
        let conn = self.connect()?;
        for table in ["registrations", "registration_items", "mega_profiles", "patients"] {
            conn.prepare(&format!("SELECT 1 FROM {} LIMIT 1", table))
                .map_err(|e| {
                    RegistrationError::Database(format!("table {} unavailable: {}", table, e))
                })?;
        }
        debug!(path = %self.path.display(), "Database verified");
        Ok(())
    }

    /// Closes the handle. Returns false if it was already closed.
    pub fn close(&self) -> bool {
        let was_open = !self.closed.swap(true, Ordering::SeqCst);
        if was_open {
            info!(path = %self.path.display(), "Database handle closed");
        }
        was_open
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
