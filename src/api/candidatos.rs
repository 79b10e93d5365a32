use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::error::ApiError;
use super::extract::{Caminho, Consulta, JsonBody};
use super::AppState;
use crate::auth::AuthUser;
use crate::database::models::{Candidato, NovoCandidato, PapelUsuario};

#[derive(Debug, Deserialize)]
pub struct ListarCandidatosQuery {
    pub cargo: Option<String>,
}

pub async fn listar(
    State(state): State<AppState>,
    _auth: AuthUser,
    Consulta(q): Consulta<ListarCandidatosQuery>,
) -> Result<Json<Vec<Candidato>>, ApiError> {
    Ok(Json(state.database.list_candidatos(q.cargo.as_deref()).await?))
}

pub async fn criar(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(novo): JsonBody<NovoCandidato>,
) -> Result<(StatusCode, Json<Candidato>), ApiError> {
    auth.require(PapelUsuario::Pesquisador)?;
    let candidato = state.database.create_candidato(&novo).await?;

    state
        .auditar(
            "candidato_criado",
            Some(auth.id()),
            json!({ "candidato_id": candidato.id, "numero": candidato.numero }),
        )
        .await;
    Ok((StatusCode::CREATED, Json(candidato)))
}

pub async fn obter(
    State(state): State<AppState>,
    _auth: AuthUser,
    Caminho(id): Caminho<i64>,
) -> Result<Json<Candidato>, ApiError> {
    Ok(Json(state.database.get_candidato(id).await?))
}

pub async fn remover(
    State(state): State<AppState>,
    auth: AuthUser,
    Caminho(id): Caminho<i64>,
) -> Result<StatusCode, ApiError> {
    auth.require(PapelUsuario::Admin)?;
    state.database.delete_candidato(id).await?;

    state
        .auditar("candidato_removido", Some(auth.id()), json!({ "candidato_id": id }))
        .await;
    Ok(StatusCode::NO_CONTENT)
}
