// ============================================================================
// Loyalty Infrastructure - WhatsApp Cloud API Messenger
// File: crates/loyalty-infrastructure/src/transport/whatsapp.rs
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use loyalty_core::ports::{PhoneMessenger, TransportError};
use loyalty_shared::config::WhatsAppSettings;
use loyalty_shared::utils::mask_phone;

/// Sends plain-text WhatsApp messages through the Graph API.
pub struct WhatsAppMessenger {
    client: Client,
    endpoint: String,
    access_token: String,
}

#[derive(Serialize)]
struct TextMessage<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: String,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

#[derive(Serialize)]
struct TextBody<'a> {
    preview_url: bool,
    body: &'a str,
}

impl WhatsAppMessenger {
    pub fn new(settings: &WhatsAppSettings, request_timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        let endpoint = format!(
            "{}/{}/messages",
            settings.api_url.trim_end_matches('/'),
            settings.phone_number_id
        );
        Ok(Self { client, endpoint, access_token: settings.access_token.clone() })
    }
}

#[async_trait]
impl PhoneMessenger for WhatsAppMessenger {
    async fn send_phone_message(&self, phone: &str, text: &str) -> Result<(), TransportError> {
        // The API wants the international number without '+' or separators.
        let to: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
        let payload = TextMessage {
            messaging_product: "whatsapp",
            recipient_type: "individual",
            to,
            kind: "text",
            text: TextBody { preview_url: false, body: text },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!("WhatsApp message accepted for {}", mask_phone(phone));
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!("WhatsApp API returned {} for {}: {}", status, mask_phone(phone), body);
        match status {
            StatusCode::TOO_MANY_REQUESTS => Err(TransportError::Unavailable(format!("rate limited: {}", status))),
            s if s.is_client_error() => Err(TransportError::Rejected(format!("status {}: {}", s, body))),
            s => Err(TransportError::Unavailable(format!("status {}", s))),
        }
    }
}
