//! Trait definitions for the delivery module.

use std::path::Path;

use async_trait::async_trait;

use super::error::DeliveryError;
use super::types::MessageId;

/// Sends a report artifact to a patient.
#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Returns the name of this client implementation.
    fn name(&self) -> &str;

    /// Uploads `artifact` and sends it to `phone_e164`.
    async fn deliver(&self, phone_e164: &str, artifact: &Path) -> Result<MessageId, DeliveryError>;
}
