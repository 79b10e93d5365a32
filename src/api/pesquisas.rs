use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::error::ApiError;
use super::extract::{Caminho, Consulta, JsonBody};
use super::AppState;
use crate::auth::AuthUser;
use crate::database::models::{
    AtualizacaoPesquisa, NovaEntrevista, NovaPergunta, NovaPesquisa, PapelUsuario,
    PerguntaPesquisa, Pesquisa, Resposta, StatusPesquisa,
};
use crate::pesquisa::resultados::ResultadoPesquisa;

#[derive(Debug, Deserialize)]
pub struct ListarPesquisasQuery {
    pub status: Option<StatusPesquisa>,
}

#[derive(Debug, Serialize)]
pub struct PesquisaDetalhe {
    #[serde(flatten)]
    pub pesquisa: Pesquisa,
    pub perguntas: Vec<PerguntaPesquisa>,
}

#[derive(Debug, Deserialize)]
pub struct AlterarStatusRequest {
    pub status: StatusPesquisa,
}

#[derive(Debug, Deserialize)]
pub struct ListarRespostasQuery {
    pub eleitor_id: Option<i64>,
}

pub async fn listar(
    State(state): State<AppState>,
    _auth: AuthUser,
    Consulta(q): Consulta<ListarPesquisasQuery>,
) -> Result<Json<Vec<Pesquisa>>, ApiError> {
    Ok(Json(state.database.list_pesquisas(q.status).await?))
}

pub async fn criar(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(nova): JsonBody<NovaPesquisa>,
) -> Result<(StatusCode, Json<Pesquisa>), ApiError> {
    auth.require(PapelUsuario::Pesquisador)?;
    let pesquisa = state.database.create_pesquisa(&nova, Some(auth.id())).await?;

    state
        .auditar("pesquisa_criada", Some(auth.id()), json!({ "pesquisa_id": pesquisa.id }))
        .await;
    Ok((StatusCode::CREATED, Json(pesquisa)))
}

pub async fn obter(
    State(state): State<AppState>,
    _auth: AuthUser,
    Caminho(id): Caminho<i64>,
) -> Result<Json<PesquisaDetalhe>, ApiError> {
    let pesquisa = state.database.get_pesquisa(id).await?;
    let perguntas = state.database.list_perguntas(id).await?;
    Ok(Json(PesquisaDetalhe { pesquisa, perguntas }))
}

pub async fn atualizar(
    State(state): State<AppState>,
    auth: AuthUser,
    Caminho(id): Caminho<i64>,
    JsonBody(update): JsonBody<AtualizacaoPesquisa>,
) -> Result<Json<Pesquisa>, ApiError> {
    auth.require(PapelUsuario::Pesquisador)?;
    let pesquisa = state.database.update_pesquisa(id, &update).await?;

    state
        .auditar("pesquisa_atualizada", Some(auth.id()), json!({ "pesquisa_id": id }))
        .await;
    Ok(Json(pesquisa))
}

pub async fn remover(
    State(state): State<AppState>,
    auth: AuthUser,
    Caminho(id): Caminho<i64>,
) -> Result<StatusCode, ApiError> {
    auth.require(PapelUsuario::Pesquisador)?;
    state.database.delete_pesquisa(id).await?;

    state
        .auditar("pesquisa_removida", Some(auth.id()), json!({ "pesquisa_id": id }))
        .await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn adicionar_pergunta(
    State(state): State<AppState>,
    auth: AuthUser,
    Caminho(id): Caminho<i64>,
    JsonBody(nova): JsonBody<NovaPergunta>,
) -> Result<(StatusCode, Json<PerguntaPesquisa>), ApiError> {
    auth.require(PapelUsuario::Pesquisador)?;
    let pergunta = state.database.add_pergunta(id, &nova).await?;

    state
        .auditar(
            "pergunta_adicionada",
            Some(auth.id()),
            json!({ "pesquisa_id": id, "pergunta_id": pergunta.id }),
        )
        .await;
    Ok((StatusCode::CREATED, Json(pergunta)))
}

pub async fn remover_pergunta(
    State(state): State<AppState>,
    auth: AuthUser,
    Caminho((id, pergunta_id)): Caminho<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    auth.require(PapelUsuario::Pesquisador)?;
    state.database.delete_pergunta(id, pergunta_id).await?;

    state
        .auditar(
            "pergunta_removida",
            Some(auth.id()),
            json!({ "pesquisa_id": id, "pergunta_id": pergunta_id }),
        )
        .await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn alterar_status(
    State(state): State<AppState>,
    auth: AuthUser,
    Caminho(id): Caminho<i64>,
    JsonBody(req): JsonBody<AlterarStatusRequest>,
) -> Result<Json<Pesquisa>, ApiError> {
    auth.require(PapelUsuario::Pesquisador)?;
    let pesquisa = state.database.set_status_pesquisa(id, req.status).await?;

    state
        .auditar(
            "pesquisa_status",
            Some(auth.id()),
            json!({ "pesquisa_id": id, "status": pesquisa.status }),
        )
        .await;
    Ok(Json(pesquisa))
}

pub async fn registrar_respostas(
    State(state): State<AppState>,
    auth: AuthUser,
    Caminho(id): Caminho<i64>,
    JsonBody(entrevista): JsonBody<NovaEntrevista>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    auth.require(PapelUsuario::Pesquisador)?;
    let registradas = state.database.registrar_entrevista(id, &entrevista).await?;

    state
        .auditar(
            "entrevista_registrada",
            Some(auth.id()),
            json!({ "pesquisa_id": id, "eleitor_id": entrevista.eleitor_id, "respostas": registradas }),
        )
        .await;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "pesquisa_id": id,
            "eleitor_id": entrevista.eleitor_id,
            "registradas": registradas
        })),
    ))
}

pub async fn listar_respostas(
    State(state): State<AppState>,
    _auth: AuthUser,
    Caminho(id): Caminho<i64>,
    Consulta(q): Consulta<ListarRespostasQuery>,
) -> Result<Json<Vec<Resposta>>, ApiError> {
    state.database.get_pesquisa(id).await?;
    Ok(Json(state.database.list_respostas(id, q.eleitor_id).await?))
}

pub async fn resultados(
    State(state): State<AppState>,
    _auth: AuthUser,
    Caminho(id): Caminho<i64>,
) -> Result<Json<ResultadoPesquisa>, ApiError> {
    Ok(Json(state.database.resultados_pesquisa(id).await?))
}
