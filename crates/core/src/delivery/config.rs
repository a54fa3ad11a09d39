//! Configuration for the delivery client.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Messaging API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Whether reports are delivered at all.
    #[serde(default)]
    pub enabled: bool,

    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub workspace_id: String,

    #[serde(default)]
    pub channel_id: String,

    /// Access key sent as `Authorization: AccessKey <key>`.
    #[serde(default)]
    pub access_key: String,

    /// Message template project.
    #[serde(default)]
    pub project_id: String,

    #[serde(default)]
    pub template_version: String,

    /// Template locale.
    #[serde(default = "default_locale")]
    pub locale: String,

    /// Template parameter that receives the media URL.
    #[serde(default = "default_media_parameter")]
    pub media_parameter: String,

    /// Content type declared for uploaded artifacts.
    #[serde(default = "default_content_type")]
    pub content_type: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Country calling code applied to national phone numbers.
    #[serde(default = "default_country_code")]
    pub default_country_code: String,
}

fn default_base_url() -> String {
    "https://api.bird.com".to_string()
}

fn default_locale() -> String {
    "ar".to_string()
}

fn default_media_parameter() -> String {
    "url".to_string()
}

fn default_content_type() -> String {
    "application/pdf".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_country_code() -> String {
    "20".to_string()
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_base_url(),
            workspace_id: String::new(),
            channel_id: String::new(),
            access_key: String::new(),
            project_id: String::new(),
            template_version: String::new(),
            locale: default_locale(),
            media_parameter: default_media_parameter(),
            content_type: default_content_type(),
            timeout_secs: default_timeout(),
            default_country_code: default_country_code(),
        }
    }
}

impl DeliveryConfig {
    /// Creates an enabled configuration for the given workspace and channel.
    pub fn new(
        base_url: impl Into<String>,
        workspace_id: impl Into<String>,
        channel_id: impl Into<String>,
        access_key: impl Into<String>,
    ) -> Self {
        Self {
            enabled: true,
            base_url: base_url.into(),
            workspace_id: workspace_id.into(),
            channel_id: channel_id.into(),
            access_key: access_key.into(),
            ..Default::default()
        }
    }

    /// Sets the message template.
    pub fn with_template(
        mut self,
        project_id: impl Into<String>,
        template_version: impl Into<String>,
    ) -> Self {
        self.project_id = project_id.into();
        self.template_version = template_version.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
