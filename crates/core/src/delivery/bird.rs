//! Bird messaging API client.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::json;
use tracing::{debug, info};

use super::config::DeliveryConfig;
use super::error::{DeliveryError, DeliveryStep};
use super::traits::DeliveryClient;
use super::types::{MessageId, PresignedUpload, PresignedUploadRequest, SentMessage};

/// Delivery client for the Bird channels API.
pub struct BirdDeliveryClient {
    client: Client,
    config: DeliveryConfig,
    base_url: String,
}

impl BirdDeliveryClient {
    /// Creates a new client. Every request carries the configured timeout.
    pub fn new(config: DeliveryConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    fn channel_url(&self, endpoint: &str) -> String {
        format!(
            "{}/workspaces/{}/channels/{}/{}",
            self.base_url,
            urlencoding::encode(&self.config.workspace_id),
            urlencoding::encode(&self.config.channel_id),
            endpoint
        )
    }

    fn auth_header(&self) -> String {
        format!("AccessKey {}", self.config.access_key)
    }

    /// Step 1: obtain an upload slot for the configured content type.
    pub async fn request_upload(&self) -> Result<PresignedUpload, DeliveryError> {
        let step = DeliveryStep::RequestUpload;
        let response = self
            .client
            .post(self.channel_url("presigned-upload"))
            .header(AUTHORIZATION, self.auth_header())
            .json(&PresignedUploadRequest {
                content_type: &self.config.content_type,
            })
            .send()
            .await
            .map_err(|e| DeliveryError::new(step, e))?;

        let response = ensure_success(step, response).await?;
        response
            .json::<PresignedUpload>()
            .await
            .map_err(|e| DeliveryError::new(step, format!("invalid upload slot response: {}", e)))
    }

    /// Step 2: post the artifact to the upload slot.
    pub async fn upload(&self, slot: &PresignedUpload, artifact: &Path) -> Result<(), DeliveryError> {
        let step = DeliveryStep::Upload;
        let bytes = tokio::fs::read(artifact).await.map_err(|e| {
            DeliveryError::new(step, format!("failed to read {}: {}", artifact.display(), e))
        })?;
        let file_name = artifact
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("report.pdf")
            .to_string();

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(&self.config.content_type)
            .map_err(|e| DeliveryError::new(step, e))?;

        let mut form = Form::new();
        for (key, value) in &slot.upload_form_data {
            form = form.text(key.clone(), value.clone());
        }
        // The file field must follow the slot fields
        form = form.part("file", part);

        let response = self
            .client
            .post(&slot.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DeliveryError::new(step, e))?;
        ensure_success(step, response).await?;
        Ok(())
    }

    /// Step 3: send the templated message referencing the uploaded media.
    pub async fn send_message(
        &self,
        phone_e164: &str,
        media_url: &str,
    ) -> Result<MessageId, DeliveryError> {
        let step = DeliveryStep::SendMessage;
        let body = json!({
            "receiver": {
                "contacts": [
                    { "identifierKey": "phonenumber", "identifierValue": phone_e164 }
                ]
            },
            "template": {
                "projectId": self.config.project_id,
                "version": self.config.template_version,
                "locale": self.config.locale,
                "parameters": [
                    { "type": "string", "key": self.config.media_parameter, "value": media_url }
                ]
            }
        });

        let response = self
            .client
            .post(self.channel_url("messages"))
            .header(AUTHORIZATION, self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::new(step, e))?;

        let response = ensure_success(step, response).await?;
        let sent: SentMessage = response
            .json()
            .await
            .map_err(|e| DeliveryError::new(step, format!("invalid message response: {}", e)))?;

        debug!(message_id = %sent.id, status = ?sent.status, "Message accepted");
        Ok(MessageId(sent.id))
    }
}

/// Turns a non-2xx response into an error carrying the status and body.
async fn ensure_success(step: DeliveryStep, response: Response) -> Result<Response, DeliveryError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DeliveryError::new(
        step,
        format!("HTTP {}: {}", status.as_u16(), body.trim()),
    ))
}

#[async_trait]
impl DeliveryClient for BirdDeliveryClient {
    fn name(&self) -> &str {
        "bird"
    }

    async fn deliver(&self, phone_e164: &str, artifact: &Path) -> Result<MessageId, DeliveryError> {
        let slot = self.request_upload().await?;
        self.upload(&slot, artifact).await?;
        let message_id = self.send_message(phone_e164, &slot.media_url).await?;

        info!(
            phone = %phone_e164,
            message_id = %message_id,
            artifact = %artifact.display(),
            "Report delivered"
        );
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> BirdDeliveryClient {
        let config = DeliveryConfig::new(server.uri(), "ws-1", "ch 1", "secret-key")
            .with_template("proj-9", "v3");
        BirdDeliveryClient::new(config).unwrap()
    }

    fn artifact(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("R1_20240101_120000.pdf");
        std::fs::write(&path, b"%PDF-1.4 merged").unwrap();
        path
    }

    async fn mount_upload_slot(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/workspaces/ws-1/channels/ch%201/presigned-upload"))
            .and(header("Authorization", "AccessKey secret-key"))
            .and(body_partial_json(json!({ "contentType": "application/pdf" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "uploadUrl": format!("{}/upload-bucket", server.uri()),
                "mediaUrl": "https://media.example/R1.pdf",
                "uploadFormData": { "key": "uploads/R1.pdf", "policy": "abc" }
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_deliver_runs_three_steps() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mount_upload_slot(&server).await;

        Mock::given(method("POST"))
            .and(path("/upload-bucket"))
            .and(body_string_contains("name=\"policy\""))
            .and(body_string_contains("name=\"file\""))
            .and(body_string_contains("%PDF-1.4 merged"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/workspaces/ws-1/channels/ch%201/messages"))
            .and(header("Authorization", "AccessKey secret-key"))
            .and(body_partial_json(json!({
                "receiver": { "contacts": [
                    { "identifierKey": "phonenumber", "identifierValue": "+201012345678" }
                ]},
                "template": {
                    "projectId": "proj-9",
                    "version": "v3",
                    "locale": "ar",
                    "parameters": [
                        { "type": "string", "key": "url", "value": "https://media.example/R1.pdf" }
                    ]
                }
            })))
            .respond_with(
                ResponseTemplate::new(202).set_body_json(json!({ "id": "msg-42", "status": "accepted" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let id = client
            .deliver("+201012345678", &artifact(&dir))
            .await
            .unwrap();
        assert_eq!(id, MessageId("msg-42".to_string()));
    }

    #[tokio::test]
    async fn test_upload_failure_skips_send() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mount_upload_slot(&server).await;

        Mock::given(method("POST"))
            .and(path("/upload-bucket"))
            .respond_with(ResponseTemplate::new(403).set_body_string("policy expired"))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/workspaces/ws-1/channels/ch%201/messages"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "id": "never" })))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .deliver("+201012345678", &artifact(&dir))
            .await
            .unwrap_err();
        assert_eq!(err.step, DeliveryStep::Upload);
        assert!(err.message.contains("403"));
        assert!(err.message.contains("policy expired"));
    }

    #[tokio::test]
    async fn test_upload_slot_failure() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(path("/workspaces/ws-1/channels/ch%201/presigned-upload"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .deliver("+201012345678", &artifact(&dir))
            .await
            .unwrap_err();
        assert_eq!(err.step, DeliveryStep::RequestUpload);
        assert!(err.to_string().contains("request_upload"));
    }

    #[tokio::test]
    async fn test_send_failure() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mount_upload_slot(&server).await;

        Mock::given(method("POST"))
            .and(path("/upload-bucket"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/workspaces/ws-1/channels/ch%201/messages"))
            .respond_with(ResponseTemplate::new(422).set_body_string("invalid receiver"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .deliver("+201012345678", &artifact(&dir))
            .await
            .unwrap_err();
        assert_eq!(err.step, DeliveryStep::SendMessage);
    }

    #[tokio::test]
    async fn test_missing_artifact_fails_at_upload() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mount_upload_slot(&server).await;

        let client = client_for(&server);
        let err = client
            .deliver("+201012345678", &dir.path().join("missing.pdf"))
            .await
            .unwrap_err();
        assert_eq!(err.step, DeliveryStep::Upload);
    }
}
