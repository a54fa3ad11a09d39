//! Mock state transitioner for testing.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::registration::{PersistenceError, StateTransitioner};

use super::journal::CallJournal;
use super::mock_source::MockRegistrationSource;

/// Mock implementation of the StateTransitioner trait.
///
/// When linked to a [`MockRegistrationSource`], marking a key also removes
/// it from the source's eligible set.
#[derive(Debug, Clone, Default)]
pub struct MockStateTransitioner {
    calls: Arc<RwLock<Vec<String>>>,
    processed: Arc<RwLock<BTreeSet<String>>>,
    fail: Arc<RwLock<bool>>,
    delay: Arc<RwLock<Option<Duration>>>,
    source: Option<MockRegistrationSource>,
    journal: CallJournal,
}

impl MockStateTransitioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(mut self, journal: CallJournal) -> Self {
        self.journal = journal;
        self
    }

    /// Links the transitioner to a source whose eligibility it updates.
    pub fn linked_to(mut self, source: MockRegistrationSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Makes every update fail with a database error.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    /// Delays every update, to exercise the caller's timeout.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().await = delay;
    }

    /// Keys passed to `mark_processed`, in call order.
    pub async fn recorded_calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }

    pub async fn is_processed(&self, key: &str) -> bool {
        self.processed.read().await.contains(key)
    }
}

#[async_trait]
impl StateTransitioner for MockStateTransitioner {
    async fn mark_processed(&self, key: &str) -> Result<u64, PersistenceError> {
        self.journal.record(format!("mark:{}", key));
        self.calls.write().await.push(key.to_string());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if *self.fail.read().await {
            return Err(PersistenceError::Database("mock update failure".to_string()));
        }

        if let Some(source) = &self.source {
            source.mark_processed(key);
        }

        let newly = self.processed.write().await.insert(key.to_string());
        Ok(u64::from(newly))
    }
}
