use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::error::ApiError;
use super::extract::{Caminho, JsonBody};
use super::AppState;
use crate::auth::{password, AuthUser};
use crate::database::models::{AtualizacaoUsuario, PapelUsuario, Usuario};

#[derive(Debug, Deserialize, Validate)]
pub struct NovoUsuarioRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub nome: String,
    #[validate(length(min = 8, max = 128))]
    pub senha: String,
    #[serde(default = "papel_padrao")]
    pub papel: PapelUsuario,
}

fn papel_padrao() -> PapelUsuario {
    PapelUsuario::Visualizador
}

#[derive(Debug, Deserialize, Validate)]
pub struct AtualizarUsuarioRequest {
    #[validate(length(min = 1, max = 200))]
    pub nome: Option<String>,
    pub papel: Option<PapelUsuario>,
    pub ativo: Option<bool>,
    #[validate(length(min = 8, max = 128))]
    pub senha: Option<String>,
}

pub async fn listar(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Usuario>>, ApiError> {
    auth.require(PapelUsuario::Admin)?;
    Ok(Json(state.database.list_usuarios().await?))
}

pub async fn criar(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(req): JsonBody<NovoUsuarioRequest>,
) -> Result<(StatusCode, Json<Usuario>), ApiError> {
    auth.require(PapelUsuario::Admin)?;
    req.validate()?;

    let senha_hash = password::hash_password(&req.senha)?;
    let usuario = state
        .database
        .create_usuario(&req.email, &req.nome, &senha_hash, req.papel)
        .await?;

    state
        .auditar(
            "usuario_criado",
            Some(auth.id()),
            json!({ "usuario_id": usuario.id, "papel": usuario.papel }),
        )
        .await;
    Ok((StatusCode::CREATED, Json(usuario)))
}

/// Admins see anyone; other users only themselves.
pub async fn obter(
    State(state): State<AppState>,
    auth: AuthUser,
    Caminho(id): Caminho<i64>,
) -> Result<Json<Usuario>, ApiError> {
    if auth.id() != id {
        auth.require(PapelUsuario::Admin)?;
    }
    Ok(Json(state.database.get_usuario(id).await?))
}

/// Refuses changes that would leave the system without an active admin.
async fn proteger_ultimo_admin(
    state: &AppState,
    alvo: &Usuario,
    perde_admin: bool,
) -> Result<(), ApiError> {
    if alvo.ativo
        && alvo.papel == PapelUsuario::Admin
        && perde_admin
        && state.database.count_admins_ativos().await? <= 1
    {
        return Err(ApiError::Conflict(
            "Não é possível remover o último administrador ativo".to_string(),
        ));
    }
    Ok(())
}

pub async fn atualizar(
    State(state): State<AppState>,
    auth: AuthUser,
    Caminho(id): Caminho<i64>,
    JsonBody(req): JsonBody<AtualizarUsuarioRequest>,
) -> Result<Json<Usuario>, ApiError> {
    auth.require(PapelUsuario::Admin)?;
    req.validate()?;

    let alvo = state.database.get_usuario(id).await?;
    let perde_admin = req.ativo == Some(false)
        || req.papel.map_or(false, |p| p != PapelUsuario::Admin);
    proteger_ultimo_admin(&state, &alvo, perde_admin).await?;

    let senha_hash = req.senha.as_deref().map(password::hash_password).transpose()?;

    let update = AtualizacaoUsuario {
        nome: req.nome,
        papel: req.papel,
        ativo: req.ativo,
    };
    let usuario = state.database.update_usuario(id, &update, senha_hash.as_deref()).await?;

    state
        .auditar(
            "usuario_atualizado",
            Some(auth.id()),
            json!({
                "usuario_id": id,
                "papel": usuario.papel,
                "ativo": usuario.ativo,
                "senha_alterada": req.senha.is_some()
            }),
        )
        .await;
    Ok(Json(usuario))
}

pub async fn desativar(
    State(state): State<AppState>,
    auth: AuthUser,
    Caminho(id): Caminho<i64>,
) -> Result<StatusCode, ApiError> {
    auth.require(PapelUsuario::Admin)?;

    let alvo = state.database.get_usuario(id).await?;
    proteger_ultimo_admin(&state, &alvo, true).await?;
    state.database.deactivate_usuario(id).await?;

    state
        .auditar("usuario_desativado", Some(auth.id()), json!({ "usuario_id": id }))
        .await;
    Ok(StatusCode::NO_CONTENT)
}
