//! Mock delivery client for testing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::delivery::{DeliveryClient, DeliveryError, DeliveryStep, MessageId};

use super::journal::CallJournal;

/// A recorded delivery for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedDelivery {
    pub phone: String,
    pub artifact: PathBuf,
    pub success: bool,
}

/// Mock implementation of the DeliveryClient trait.
#[derive(Debug, Clone, Default)]
pub struct MockDeliveryClient {
    deliveries: Arc<RwLock<Vec<RecordedDelivery>>>,
    failing_step: Arc<RwLock<Option<DeliveryStep>>>,
    journal: CallJournal,
}

impl MockDeliveryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(mut self, journal: CallJournal) -> Self {
        self.journal = journal;
        self
    }

    /// Makes every delivery fail at `step`; `None` restores success.
    pub async fn set_failing_step(&self, step: Option<DeliveryStep>) {
        *self.failing_step.write().await = step;
    }

    pub async fn recorded_deliveries(&self) -> Vec<RecordedDelivery> {
        self.deliveries.read().await.clone()
    }

    pub async fn delivery_count(&self) -> usize {
        self.deliveries.read().await.len()
    }
}

#[async_trait]
impl DeliveryClient for MockDeliveryClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn deliver(&self, phone_e164: &str, artifact: &Path) -> Result<MessageId, DeliveryError> {
        self.journal.record(format!("deliver:{}", phone_e164));
        let failing_step = *self.failing_step.read().await;

        let mut deliveries = self.deliveries.write().await;
        deliveries.push(RecordedDelivery {
            phone: phone_e164.to_string(),
            artifact: artifact.to_path_buf(),
            success: failing_step.is_none(),
        });

        match failing_step {
            Some(step) => Err(DeliveryError::new(step, "mock delivery failure")),
            None => Ok(MessageId(format!("mock-msg-{}", deliveries.len()))),
        }
    }
}
