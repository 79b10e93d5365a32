use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Deserializer};
use serde_json::json;
use validator::Validate;

use super::error::ApiError;
use super::extract::{Caminho, Consulta, JsonBody};
use super::AppState;
use crate::auth::AuthUser;
use crate::database::models::{ContatoWhatsApp, DirecaoMensagem, MensagemWhatsApp, PapelUsuario};

const LIMITE_MENSAGENS_PADRAO: i64 = 50;
const LIMITE_MENSAGENS_MAX: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListarContatosQuery {
    #[serde(default)]
    pub apenas_opt_in: bool,
}

/// Distinguishes an absent field from an explicit `null`.
fn presente<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
pub struct AtualizarContatoRequest {
    /// `null` unlinks the voter.
    #[serde(default, deserialize_with = "presente")]
    pub eleitor_id: Option<Option<i64>>,
    pub opt_in: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ListarMensagensQuery {
    pub limite: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EnviarMensagemRequest {
    #[validate(length(min = 1, max = 4096))]
    pub texto: String,
}

pub async fn listar_contatos(
    State(state): State<AppState>,
    _auth: AuthUser,
    Consulta(q): Consulta<ListarContatosQuery>,
) -> Result<Json<Vec<ContatoWhatsApp>>, ApiError> {
    Ok(Json(state.database.list_contatos(q.apenas_opt_in).await?))
}

pub async fn atualizar_contato(
    State(state): State<AppState>,
    auth: AuthUser,
    Caminho(id): Caminho<i64>,
    JsonBody(req): JsonBody<AtualizarContatoRequest>,
) -> Result<Json<ContatoWhatsApp>, ApiError> {
    auth.require(PapelUsuario::Pesquisador)?;
    state.database.get_contato(id).await?;

    if let Some(eleitor_id) = req.eleitor_id {
        state.database.vincular_eleitor(id, eleitor_id).await?;
    }
    if let Some(opt_in) = req.opt_in {
        state.database.set_opt_in(id, opt_in).await?;
    }
    let contato = state.database.get_contato(id).await?;

    state
        .auditar(
            "contato_atualizado",
            Some(auth.id()),
            json!({
                "contato_id": id,
                "eleitor_id": contato.eleitor_id,
                "opt_in": contato.opt_in
            }),
        )
        .await;
    Ok(Json(contato))
}

pub async fn listar_mensagens(
    State(state): State<AppState>,
    _auth: AuthUser,
    Caminho(id): Caminho<i64>,
    Consulta(q): Consulta<ListarMensagensQuery>,
) -> Result<Json<Vec<MensagemWhatsApp>>, ApiError> {
    let limite = q
        .limite
        .unwrap_or(LIMITE_MENSAGENS_PADRAO)
        .clamp(1, LIMITE_MENSAGENS_MAX);
    state.database.get_contato(id).await?;
    Ok(Json(state.database.list_mensagens(id, limite).await?))
}

/// Sends a text through the Cloud API and stores it as an outbound message.
pub async fn enviar_mensagem(
    State(state): State<AppState>,
    auth: AuthUser,
    Caminho(id): Caminho<i64>,
    JsonBody(req): JsonBody<EnviarMensagemRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    auth.require(PapelUsuario::Pesquisador)?;
    req.validate()?;

    let contato = state.database.get_contato(id).await?;
    if !contato.opt_in {
        return Err(ApiError::Conflict(format!(
            "Contato {} não autorizou o recebimento de mensagens",
            id
        )));
    }
    let client = state.whatsapp.as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable("Envio de WhatsApp não configurado".to_string())
    })?;

    let wa_message_id = client.send_text(&contato.telefone, &req.texto).await?;
    state
        .database
        .registrar_mensagem(
            id,
            DirecaoMensagem::Saida,
            Some(&wa_message_id),
            &req.texto,
            Utc::now(),
        )
        .await?;

    state
        .auditar(
            "mensagem_enviada",
            Some(auth.id()),
            json!({ "contato_id": id, "wa_message_id": wa_message_id }),
        )
        .await;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "contato_id": id, "wa_message_id": wa_message_id })),
    ))
}
