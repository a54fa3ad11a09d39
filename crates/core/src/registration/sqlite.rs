//! SQLite-backed registration source and state transitioner.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rusqlite::{params, InterruptHandle};
use tracing::debug;

use super::database::Database;
use super::error::{PersistenceError, RegistrationError};
use super::traits::{RegistrationSource, StateTransitioner};
use super::types::{ItemType, ProcessingFlag, RegistrationKey};

/// SQLite-backed registration source.
pub struct SqliteRegistrationSource {
    database: Arc<Database>,
}

impl SqliteRegistrationSource {
    /// Creates a source over a shared database handle.
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    fn codes(&self, key: &str, item_type: ItemType) -> Result<Vec<String>, RegistrationError> {
        let conn = self.database.connect()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT code FROM registration_items WHERE reg_key = ?1 AND item_type = ?2 ORDER BY code",
        )?;
        let codes = stmt
            .query_map(params![key, item_type.as_str()], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(codes)
    }
}

impl RegistrationSource for SqliteRegistrationSource {
    fn list_eligible(&self) -> Result<Vec<RegistrationKey>, RegistrationError> {
        let conn = self.database.connect()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT reg_key FROM registrations WHERE whatsapp_status = ?1 ORDER BY reg_key",
        )?;
        let keys = stmt
            .query_map(params![ProcessingFlag::Queued.as_i64()], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    fn group_codes(&self, key: &str) -> Result<Vec<String>, RegistrationError> {
        self.codes(key, ItemType::Group)
    }

    fn mega_codes(&self, key: &str) -> Result<Vec<String>, RegistrationError> {
        self.codes(key, ItemType::Mega)
    }

    fn resolve_mega_template(&self, code: &str) -> Result<Option<String>, RegistrationError> {
        let conn = self.database.connect()?;
        let result = conn.query_row(
            "SELECT template_name FROM mega_profiles WHERE mega_code = ?1",
            params![code],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(name) if name.trim().is_empty() => Ok(None),
            Ok(name) => Ok(Some(name.trim().to_string())),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn contact_phone(&self, key: &str) -> Result<Option<String>, RegistrationError> {
        let conn = self.database.connect()?;
        let result = conn.query_row(
            "SELECT phone FROM patients WHERE reg_key = ?1",
            params![key],
            |row| row.get::<_, Option<String>>(0),
        );
        match result {
            Ok(phone) => Ok(phone.filter(|p| !p.trim().is_empty())),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn close(&self) {
        self.database.close();
    }
}

/// SQLite-backed state transitioner.
///
/// Each update runs on its own freshly opened connection on the blocking pool.
pub struct SqliteStateTransitioner {
    database: Arc<Database>,
}

impl SqliteStateTransitioner {
    /// Creates a transitioner over a shared database handle.
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    fn update(
        database: &Database,
        key: &str,
        cancel: &UpdateCancel,
    ) -> Result<u64, PersistenceError> {
        let conn = database.connect()?;
        cancel.attach(conn.get_interrupt_handle());
        if cancel.is_cancelled() {
            return Err(PersistenceError::Cancelled);
        }
        let changed = conn
            .execute(
                "UPDATE registrations SET whatsapp_status = ?1 WHERE reg_key = ?2 AND whatsapp_status <> ?1",
                params![ProcessingFlag::Processed.as_i64(), key],
            )
            .map_err(|e| PersistenceError::Database(e.to_string()))?;
        Ok(changed as u64)
    }
}

#[async_trait]
impl StateTransitioner for SqliteStateTransitioner {
    async fn mark_processed(&self, key: &str) -> Result<u64, PersistenceError> {
        let database = Arc::clone(&self.database);
        let key_owned = key.to_string();
        let cancel = Arc::new(UpdateCancel::default());
        let mut guard = CancelOnDrop::new(Arc::clone(&cancel));

        let changed =
            tokio::task::spawn_blocking(move || Self::update(&database, &key_owned, &cancel))
                .await
                .map_err(|e| PersistenceError::Database(format!("update task failed: {}", e)))??;
        guard.disarm();

        debug!(reg_key = key, rows = changed, "Processing flag updated");
        Ok(changed)
    }
}

/// Cancellation shared between an awaiting caller and the blocking update.
#[derive(Default)]
struct UpdateCancel {
    cancelled: AtomicBool,
    interrupt: Mutex<Option<InterruptHandle>>,
}

impl UpdateCancel {
    fn attach(&self, handle: InterruptHandle) {
        *self.interrupt.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Stops an update that has not started and interrupts a running one.
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(handle) = self
            .interrupt
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            handle.interrupt();
        }
    }
}

/// Cancels the update if the `mark_processed` future is dropped early,
/// for example by a caller's timeout.
struct CancelOnDrop {
    cancel: Arc<UpdateCancel>,
    armed: bool,
}

impl CancelOnDrop {
    fn new(cancel: Arc<UpdateCancel>) -> Self {
        Self {
            cancel,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            debug!("Flag update abandoned, cancelling it");
            self.cancel.cancel();
        }
    }
}
