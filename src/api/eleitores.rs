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
use crate::banco::{BancoEleitores, Registro};
use crate::database::models::{
    ContagemCategoria, Eleitor, FiltroEleitores, Genero, NovoEleitor, OrientacaoPolitica,
    Paginacao, PapelUsuario,
};

#[derive(Debug, Deserialize)]
pub struct ListarEleitoresQuery {
    pub genero: Option<Genero>,
    pub regiao_administrativa: Option<String>,
    pub orientacao_politica: Option<OrientacaoPolitica>,
    pub idade_min: Option<i64>,
    pub idade_max: Option<i64>,
    pub busca: Option<String>,
    pub pagina: Option<i64>,
    pub por_pagina: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PaginaEleitores {
    pub itens: Vec<Eleitor>,
    pub total: i64,
    pub pagina: i64,
    pub por_pagina: i64,
}

#[derive(Debug, Deserialize)]
pub struct EstatisticasQuery {
    pub atributo: String,
}

#[derive(Debug, Serialize)]
pub struct Estatisticas {
    pub atributo: String,
    pub total: i64,
    pub categorias: Vec<ContagemCategoria>,
}

pub async fn listar(
    State(state): State<AppState>,
    _auth: AuthUser,
    Consulta(q): Consulta<ListarEleitoresQuery>,
) -> Result<Json<PaginaEleitores>, ApiError> {
    let paginacao = Paginacao::new(q.pagina, q.por_pagina)?;
    let filtro = FiltroEleitores {
        genero: q.genero,
        regiao_administrativa: q.regiao_administrativa,
        orientacao_politica: q.orientacao_politica,
        idade_min: q.idade_min,
        idade_max: q.idade_max,
        busca: q.busca,
    };

    let itens = state.database.list_eleitores(&filtro, paginacao).await?;
    let total = state.database.count_eleitores(&filtro).await?;

    Ok(Json(PaginaEleitores {
        itens,
        total,
        pagina: paginacao.pagina,
        por_pagina: paginacao.por_pagina,
    }))
}

pub async fn criar(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(novo): JsonBody<NovoEleitor>,
) -> Result<(StatusCode, Json<Eleitor>), ApiError> {
    auth.require(PapelUsuario::Pesquisador)?;
    let eleitor = state.database.create_eleitor(&novo).await?;

    state
        .auditar("eleitor_criado", Some(auth.id()), json!({ "eleitor_id": eleitor.id }))
        .await;
    Ok((StatusCode::CREATED, Json(eleitor)))
}

pub async fn obter(
    State(state): State<AppState>,
    _auth: AuthUser,
    Caminho(id): Caminho<i64>,
) -> Result<Json<Eleitor>, ApiError> {
    Ok(Json(state.database.get_eleitor(id).await?))
}

pub async fn atualizar(
    State(state): State<AppState>,
    auth: AuthUser,
    Caminho(id): Caminho<i64>,
    JsonBody(dados): JsonBody<NovoEleitor>,
) -> Result<Json<Eleitor>, ApiError> {
    auth.require(PapelUsuario::Pesquisador)?;
    let eleitor = state.database.update_eleitor(id, &dados).await?;

    state
        .auditar("eleitor_atualizado", Some(auth.id()), json!({ "eleitor_id": id }))
        .await;
    Ok(Json(eleitor))
}

pub async fn remover(
    State(state): State<AppState>,
    auth: AuthUser,
    Caminho(id): Caminho<i64>,
) -> Result<StatusCode, ApiError> {
    auth.require(PapelUsuario::Admin)?;
    state.database.delete_eleitor(id).await?;

    state
        .auditar("eleitor_removido", Some(auth.id()), json!({ "eleitor_id": id }))
        .await;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn estatisticas(
    State(state): State<AppState>,
    _auth: AuthUser,
    Consulta(q): Consulta<EstatisticasQuery>,
) -> Result<Json<Estatisticas>, ApiError> {
    let categorias = state.database.distribuicao_eleitores(&q.atributo).await?;
    let total = categorias.iter().map(|c| c.total).sum();

    Ok(Json(Estatisticas {
        atributo: q.atributo,
        total,
        categorias,
    }))
}

/// Accepts voter-bank records as-is; fields without a column are kept in `atributos`.
pub async fn importar(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(registros): JsonBody<Vec<Registro>>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    auth.require(PapelUsuario::Pesquisador)?;

    let banco = BancoEleitores::from_registros(registros);
    let lote = banco.para_eleitores().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let importados = state.database.import_eleitores(&lote).await?;

    state
        .auditar(
            "eleitores_importados",
            Some(auth.id()),
            json!({ "importados": importados, "hash": banco.content_hash() }),
        )
        .await;
    Ok((StatusCode::CREATED, Json(json!({ "importados": importados }))))
}
