//! Trait definitions for the registration module.

use std::sync::Arc;

use async_trait::async_trait;

use super::error::{PersistenceError, RegistrationError};
use super::types::RegistrationKey;

/// Read-only query surface over eligible registrations.
///
/// Lists are returned in ascending order. Empty results are valid.
pub trait RegistrationSource: Send + Sync {
    /// Keys of registrations queued for delivery.
    fn list_eligible(&self) -> Result<Vec<RegistrationKey>, RegistrationError>;

    /// Group codes attached to a registration.
    fn group_codes(&self, key: &str) -> Result<Vec<String>, RegistrationError>;

    /// Mega codes attached to a registration.
    fn mega_codes(&self, key: &str) -> Result<Vec<String>, RegistrationError>;

    /// Template name for a mega code, if a profile exists.
    fn resolve_mega_template(&self, code: &str) -> Result<Option<String>, RegistrationError>;

    /// Raw contact phone of the registration's patient.
    fn contact_phone(&self, key: &str) -> Result<Option<String>, RegistrationError>;

    /// Releases database resources. Called once on shutdown.
    fn close(&self) {}
}

/// Final, idempotent write that completes a registration.
#[async_trait]
pub trait StateTransitioner: Send + Sync {
    /// Flips the registration to processed.
    ///
    /// Returns the number of rows changed; zero for an already processed key.
    async fn mark_processed(&self, key: &str) -> Result<u64, PersistenceError>;
}

/// Runs a source query on the blocking thread pool.
pub async fn query_source<T, F>(
    source: &Arc<dyn RegistrationSource>,
    query: F,
) -> Result<T, RegistrationError>
where
    T: Send + 'static,
    F: FnOnce(&dyn RegistrationSource) -> Result<T, RegistrationError> + Send + 'static,
{
    let source = Arc::clone(source);
    tokio::task::spawn_blocking(move || query(source.as_ref()))
        .await
        .map_err(|e| RegistrationError::Database(format!("query task failed: {}", e)))?
}
