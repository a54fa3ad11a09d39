//! Error types for the delivery module.

use std::fmt;
use thiserror::Error;

/// The remote call a delivery attempt failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStep {
    /// Requesting the presigned upload slot.
    RequestUpload,
    /// Uploading the artifact bytes.
    Upload,
    /// Sending the templated message.
    SendMessage,
}

impl DeliveryStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestUpload => "request_upload",
            Self::Upload => "upload",
            Self::SendMessage => "send_message",
        }
    }
}

impl fmt::Display for DeliveryStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed delivery attempt.
#[derive(Debug, Clone, Error)]
#[error("delivery failed at {step}: {message}")]
pub struct DeliveryError {
    pub step: DeliveryStep,
    pub message: String,
}

impl DeliveryError {
    pub fn new(step: DeliveryStep, message: impl fmt::Display) -> Self {
        Self {
            step,
            message: message.to_string(),
        }
    }
}
