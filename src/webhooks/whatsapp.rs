//! WhatsApp Cloud API webhook
//!
//! Answers the subscription handshake, checks the payload signature, records
//! contacts and inbound messages, applies opt-in/opt-out keywords and forwards
//! the untouched delivery to a downstream consumer when one is configured.

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::Json,
};
use chrono::{DateTime, TimeZone, Utc};
use ring::hmac;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::error::ApiError;
use crate::api::extract::Consulta;
use crate::api::AppState;
use crate::database::Database;
use crate::error::PesquisaError;
use crate::whatsapp::normalizar_telefone;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

const FORWARD_TIMEOUT: Duration = Duration::from_secs(10);

const OBJETO_WHATSAPP: &str = "whatsapp_business_account";

const PALAVRAS_OPT_OUT: &[&str] = &["SAIR", "PARAR"];
const PALAVRAS_OPT_IN: &[&str] = &["ENTRAR", "VOLTAR"];

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct Contact {
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub id: String,
    pub from: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type", default)]
    pub tipo: Option<String>,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub button: Option<ButtonBody>,
    #[serde(default)]
    pub interactive: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct ButtonBody {
    pub text: String,
}

impl Message {
    /// Text shown to operators: the message body, a button/list reply title, or the message type.
    pub fn conteudo(&self) -> String {
        if let Some(text) = &self.text {
            return text.body.clone();
        }
        if let Some(button) = &self.button {
            return button.text.clone();
        }
        if let Some(title) = self.interactive.as_ref().and_then(|i| {
            i.pointer("/button_reply/title")
                .or_else(|| i.pointer("/list_reply/title"))
                .and_then(Value::as_str)
        }) {
            return title.to_string();
        }
        format!("[{}]", self.tipo.as_deref().unwrap_or("desconhecido"))
    }

    pub fn recebida_em(&self) -> DateTime<Utc> {
        self.timestamp
            .as_deref()
            .and_then(|t| t.parse::<i64>().ok())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comando {
    OptIn,
    OptOut,
}

pub fn detectar_comando(texto: &str) -> Option<Comando> {
    let palavra = texto.trim().to_uppercase();
    if PALAVRAS_OPT_OUT.contains(&palavra.as_str()) {
        Some(Comando::OptOut)
    } else if PALAVRAS_OPT_IN.contains(&palavra.as_str()) {
        Some(Comando::OptIn)
    } else {
        None
    }
}

/// Checks `sha256=<hex>` against the HMAC-SHA256 of `body`; the comparison is constant time.
pub fn verificar_assinatura(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(hex_digest) = header.trim().strip_prefix("sha256=") else {
        return false;
    };
    let Ok(esperado) = hex::decode(hex_digest) else {
        return false;
    };
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    hmac::verify(&key, body, &esperado).is_ok()
}

pub fn assinar(secret: &str, body: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    format!("sha256={}", hex::encode(hmac::sign(&key, body).as_ref()))
}

#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct ResumoWebhook {
    pub contatos: usize,
    pub mensagens_novas: usize,
    pub mensagens_duplicadas: usize,
    pub ignoradas: usize,
    pub opt_in: usize,
    pub opt_out: usize,
    pub encaminhado: bool,
}

/// Stores everything in the payload; messages already seen are counted but not reapplied.
pub async fn processar(database: &Database, payload: &WebhookPayload) -> Result<ResumoWebhook, PesquisaError> {
    let mut resumo = ResumoWebhook::default();
    if let Some(objeto) = payload.object.as_deref().filter(|o| *o != OBJETO_WHATSAPP) {
        warn!("Ignoring webhook for object {}", objeto);
        return Ok(resumo);
    }

    for change in payload.entry.iter().flat_map(|e| &e.changes) {
        if change.field.as_deref().is_some_and(|f| f != "messages") {
            debug!("Skipping webhook change for field {:?}", change.field);
            continue;
        }
        let value = &change.value;

        let nomes: HashMap<&str, Option<&str>> = value
            .contacts
            .iter()
            .map(|c| {
                let nome = c.profile.as_ref().and_then(|p| p.name.as_deref());
                (c.wa_id.as_str(), nome)
            })
            .collect();

        for contact in &value.contacts {
            let Ok(telefone) = normalizar_telefone(&contact.wa_id) else {
                warn!("Ignoring contact with invalid number {}", contact.wa_id);
                continue;
            };
            let nome = nomes.get(contact.wa_id.as_str()).copied().flatten();
            database.upsert_contato(&telefone, nome).await?;
            resumo.contatos += 1;
        }

        for message in &value.messages {
            let Ok(telefone) = normalizar_telefone(&message.from) else {
                warn!("Ignoring message {} from invalid number {}", message.id, message.from);
                resumo.ignoradas += 1;
                continue;
            };
            let nome = nomes.get(message.from.as_str()).copied().flatten();
            let contato = database.upsert_contato(&telefone, nome).await?;

            let conteudo = message.conteudo();
            let comando = detectar_comando(&conteudo);
            let nova = database
                .registrar_mensagem_entrada(
                    contato.id,
                    &message.id,
                    &conteudo,
                    message.recebida_em(),
                    comando.map(|c| c == Comando::OptIn),
                )
                .await?;
            if !nova {
                debug!("Duplicate delivery of message {}", message.id);
                resumo.mensagens_duplicadas += 1;
                continue;
            }
            resumo.mensagens_novas += 1;

            match comando {
                Some(Comando::OptIn) => {
                    resumo.opt_in += 1;
                    info!("Contato {} opted in", contato.id);
                }
                Some(Comando::OptOut) => {
                    resumo.opt_out += 1;
                    info!("Contato {} opted out", contato.id);
                }
                None => {}
            }
        }
    }

    Ok(resumo)
}

async fn encaminhar(state: &AppState, url: &str, body: Bytes, assinatura: Option<&str>) -> bool {
    let mut request = state
        .http
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .timeout(FORWARD_TIMEOUT)
        .body(body);
    if let Some(assinatura) = assinatura {
        request = request.header(SIGNATURE_HEADER, assinatura);
    }

    match request.send().await {
        Ok(response) if response.status().is_success() => {
            debug!("Webhook forwarded to {}", url);
            true
        }
        Ok(response) => {
            warn!("Webhook forward to {} returned {}", url, response.status());
            false
        }
        Err(e) => {
            warn!("Webhook forward to {} failed: {}", url, e);
            false
        }
    }
}

pub async fn verify_subscription(
    State(state): State<AppState>,
    Consulta(params): Consulta<HashMap<String, String>>,
) -> Result<String, StatusCode> {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token");
    let challenge = params.get("hub.challenge");

    match (&state.config.whatsapp_verify_token, mode, token, challenge) {
        (Some(esperado), Some("subscribe"), Some(token), Some(challenge)) if token == esperado => {
            info!("WhatsApp webhook subscription verified");
            Ok(challenge.clone())
        }
        _ => {
            warn!("Rejected WhatsApp webhook verification");
            Err(StatusCode::FORBIDDEN)
        }
    }
}

pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ResumoWebhook>, ApiError> {
    let assinatura = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    if let Some(secret) = &state.config.whatsapp_app_secret {
        let valida = assinatura.is_some_and(|a| verificar_assinatura(secret, &body, a));
        if !valida {
            warn!("Rejected WhatsApp webhook with invalid signature");
            return Err(ApiError::Unauthorized);
        }
    }

    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| PesquisaError::WebhookError(format!("Payload inválido: {}", e)))?;
    info!(
        "Received WhatsApp webhook ({} entries)",
        payload.entry.len()
    );

    let mut resumo = processar(&state.database, &payload).await?;

    if let Some(url) = &state.config.whatsapp_forward_url {
        resumo.encaminhado = encaminhar(&state, url, body.clone(), assinatura).await;
    }

    Ok(Json(resumo))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_signature_round_trip() {
        let body = br#"{"object":"whatsapp_business_account"}"#;
        let header = assinar("segredo", body);
        assert!(verificar_assinatura("segredo", body, &header));
        assert!(!verificar_assinatura("outro", body, &header));
        assert!(!verificar_assinatura("segredo", b"{}", &header));
        assert!(!verificar_assinatura("segredo", body, "sha256=zz"));
        assert!(!verificar_assinatura("segredo", body, "md5=abc"));
    }

    #[test]
    fn test_detectar_comando() {
        assert_eq!(detectar_comando(" sair "), Some(Comando::OptOut));
        assert_eq!(detectar_comando("PARAR"), Some(Comando::OptOut));
        assert_eq!(detectar_comando("Voltar"), Some(Comando::OptIn));
        assert_eq!(detectar_comando("quero sair"), None);
    }

    #[test]
    fn test_message_content_fallbacks() {
        let msg: Message = serde_json::from_value(json!({
            "id": "wamid.1", "from": "5561999990000", "timestamp": "1700000000",
            "type": "interactive",
            "interactive": { "type": "button_reply", "button_reply": { "id": "b1", "title": "Sim" } }
        }))
        .unwrap();
        assert_eq!(msg.conteudo(), "Sim");
        assert_eq!(msg.recebida_em().timestamp(), 1_700_000_000);

        let msg: Message = serde_json::from_value(json!({
            "id": "wamid.2", "from": "5561999990000", "type": "image"
        }))
        .unwrap();
        assert_eq!(msg.conteudo(), "[image]");
    }
}
