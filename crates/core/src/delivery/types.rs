//! Delivery types and wire formats.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier assigned to a sent message by the messaging API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Upload slot returned by the presigned-upload call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUpload {
    /// Where the multipart form is posted.
    pub upload_url: String,
    /// Public media reference used in the message.
    pub media_url: String,
    /// Form fields that must accompany the file.
    #[serde(default)]
    pub upload_form_data: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PresignedUploadRequest<'a> {
    pub content_type: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SentMessage {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
}
