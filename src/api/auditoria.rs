use axum::{extract::State, Json};
use serde::Deserialize;

use super::error::ApiError;
use super::extract::Consulta;
use super::AppState;
use crate::auth::AuthUser;
use crate::database::models::{EventoAuditoria, PapelUsuario};

#[derive(Debug, Deserialize)]
pub struct AuditoriaQuery {
    pub limite: Option<i64>,
}

pub async fn listar(
    State(state): State<AppState>,
    auth: AuthUser,
    Consulta(q): Consulta<AuditoriaQuery>,
) -> Result<Json<Vec<EventoAuditoria>>, ApiError> {
    auth.require(PapelUsuario::Admin)?;
    let limite = q.limite.unwrap_or(100).clamp(1, 1000);
    Ok(Json(state.database.list_eventos(limite).await?))
}
