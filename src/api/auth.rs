use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use validator::Validate;

use super::error::ApiError;
use super::extract::JsonBody;
use super::AppState;
use crate::auth::jwt::TokenEmitido;
use crate::auth::{password, AuthUser};
use crate::database::models::Usuario;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub senha: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub token: TokenEmitido,
    pub usuario: Usuario,
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    req.validate()?;

    let usuario = state.database.get_usuario_by_email(&req.email).await?;
    // Same answer for unknown e-mail, inactive account and wrong password.
    let usuario = match usuario {
        Some(u) if u.ativo && password::verify_password(&req.senha, &u.senha_hash) => u,
        _ => {
            warn!("Failed login attempt for {}", req.email);
            return Err(ApiError::Unauthorized);
        }
    };

    let token = state.tokens.issue(&usuario)?;
    state
        .auditar("login", Some(usuario.id), json!({ "email": usuario.email }))
        .await;
    info!("Usuario {} logged in", usuario.id);

    Ok(Json(LoginResponse { token, usuario }))
}

pub async fn me(AuthUser(usuario): AuthUser) -> Json<Usuario> {
    Json(usuario)
}
