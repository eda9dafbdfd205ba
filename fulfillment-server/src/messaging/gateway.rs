//! Signed SMS/MMS gateway client

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use sha2::Sha256;
use shared::util::{now_millis, now_secs};
use thiserror::Error;

use super::image::{mms_filename, prepare_mms_image};
use super::{Notifier, normalize_phone, sanitize_message};
use crate::core::config::SmsConfig;

type HmacSha256 = Hmac<Sha256>;

/// Messaging gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Messaging gateway is not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Image preparation failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid recipient phone number")]
    InvalidPhone,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
enum MessageType {
    Lms,
    Mms,
}

#[derive(Debug, Serialize)]
struct Recipient<'a> {
    to: &'a str,
}

#[derive(Debug, Serialize)]
struct Attachment {
    name: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    #[serde(rename = "type")]
    kind: MessageType,
    from: &'a str,
    content: String,
    messages: Vec<Recipient<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    files: Vec<Attachment>,
}

/// `base64(HMAC-SHA256(secret, "{method} {uri}\n{timestamp}\n{access_key}"))`
pub fn sign_request(
    method: &str,
    uri: &str,
    timestamp: &str,
    access_key: &str,
    secret_key: &str,
) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes()).ok()?;
    mac.update(format!("{method} {uri}\n{timestamp}\n{access_key}").as_bytes());
    Some(BASE64.encode(mac.finalize().into_bytes()))
}

/// Notifier backed by the messaging gateway
pub struct SmsGateway {
    client: Client,
    config: SmsConfig,
}

impl SmsGateway {
    pub fn new(config: SmsConfig, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, config })
    }

    fn uri(&self) -> String {
        format!("/sms/v2/services/{}/messages", self.config.service_id)
    }

    async fn send(&self, request: SendRequest<'_>) -> Result<(), GatewayError> {
        if !self.config.is_configured() {
            return Err(GatewayError::NotConfigured);
        }

        let uri = self.uri();
        let timestamp = now_millis().to_string();
        let signature = sign_request(
            "POST",
            &uri,
            &timestamp,
            &self.config.access_key,
            &self.config.secret_key,
        )
        .ok_or(GatewayError::NotConfigured)?;

        let response = self
            .client
            .post(format!("{}{}", self.config.api_url.trim_end_matches('/'), uri))
            .header("x-ncp-apigw-timestamp", &timestamp)
            .header("x-ncp-iam-access-key", &self.config.access_key)
            .header("x-ncp-apigw-signature-v2", signature)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn try_send_text(&self, phone: &str, message: &str) -> Result<(), GatewayError> {
        let to = normalize_phone(phone);
        if to.is_empty() {
            return Err(GatewayError::InvalidPhone);
        }
        self.send(SendRequest {
            kind: MessageType::Lms,
            from: &self.config.sender,
            content: sanitize_message(message),
            messages: vec![Recipient { to: &to }],
            files: Vec::new(),
        })
        .await
    }

    async fn try_send_image(
        &self,
        phone: &str,
        message: &str,
        image: &[u8],
    ) -> Result<(), GatewayError> {
        let to = normalize_phone(phone);
        if to.is_empty() {
            return Err(GatewayError::InvalidPhone);
        }
        let jpeg = prepare_mms_image(image)?;
        self.send(SendRequest {
            kind: MessageType::Mms,
            from: &self.config.sender,
            content: sanitize_message(message),
            messages: vec![Recipient { to: &to }],
            files: vec![Attachment {
                name: mms_filename(now_secs()),
                body: BASE64.encode(&jpeg),
            }],
        })
        .await
    }
}

#[async_trait]
impl Notifier for SmsGateway {
    async fn send_text(&self, phone: &str, message: &str) -> bool {
        match self.try_send_text(phone, message).await {
            Ok(()) => {
                tracing::info!(phone = %normalize_phone(phone), "Text message sent");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Text message failed");
                false
            }
        }
    }

    async fn send_image(&self, phone: &str, message: &str, image: &[u8]) -> bool {
        match self.try_send_image(phone, message, image).await {
            Ok(()) => {
                tracing::info!(phone = %normalize_phone(phone), "Image message sent");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Image message failed");
                false
            }
        }
    }
}
