//! WhatsApp Cloud API Client
//!
//! Sends outbound text messages through the Graph API.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::PesquisaError;

#[derive(Clone)]
pub struct WhatsAppClient {
    api_url: String,
    phone_number_id: String,
    access_token: String,
    http_client: Client,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

impl WhatsAppClient {
    pub fn new(api_url: String, phone_number_id: String, access_token: String) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            phone_number_id,
            access_token,
            http_client: Client::new(),
        }
    }

    /// `None` unless both the phone number id and the access token are configured.
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        match (&config.whatsapp_phone_number_id, &config.whatsapp_access_token) {
            (Some(phone_number_id), Some(access_token)) => Some(Self::new(
                config.whatsapp_api_url.clone(),
                phone_number_id.clone(),
                access_token.clone(),
            )),
            _ => None,
        }
    }

    /// Sends a text message and returns the WhatsApp message id.
    pub async fn send_text(&self, telefone: &str, texto: &str) -> Result<String, PesquisaError> {
        let telefone = normalizar_telefone(telefone)?;
        let url = format!("{}/{}/messages", self.api_url, self.phone_number_id);
        debug!("Sending WhatsApp message to {}", telefone);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&json!({
                "messaging_product": "whatsapp",
                "to": telefone,
                "type": "text",
                "text": { "body": texto }
            }))
            .send()
            .await
            .map_err(|e| PesquisaError::UpstreamError(format!("WhatsApp request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("WhatsApp API returned {}: {}", status, body);
            return Err(PesquisaError::UpstreamError(format!(
                "WhatsApp API returned {}",
                status
            )));
        }

        let parsed: SendResponse = response
            .json()
            .await
            .map_err(|e| PesquisaError::UpstreamError(format!("Invalid WhatsApp response: {}", e)))?;

        let id = parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| PesquisaError::UpstreamError("WhatsApp response without message id".to_string()))?;

        info!("WhatsApp message {} sent to {}", id, telefone);
        Ok(id)
    }
}

/// Keeps only digits; a valid number has 10 to 15 of them (E.164 without the plus sign).
pub fn normalizar_telefone(raw: &str) -> Result<String, PesquisaError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if !(10..=15).contains(&digits.len()) {
        return Err(PesquisaError::ValidationError(format!(
            "Telefone inválido: '{}'",
            raw
        )));
    }
    Ok(digits)
}
