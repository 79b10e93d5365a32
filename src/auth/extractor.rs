use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::debug;

use crate::api::{error::ApiError, AppState};
use crate::database::models::{PapelUsuario, Usuario};

/// Authenticated caller, resolved from `Authorization: Bearer <jwt>`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Usuario);

impl AuthUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }

    pub fn require(&self, minimo: PapelUsuario) -> Result<(), ApiError> {
        if self.0.papel.satisfaz(minimo) {
            Ok(())
        } else {
            debug!(
                "Usuario {} ({}) lacks role {}",
                self.0.id, self.0.papel, minimo
            );
            Err(ApiError::Forbidden)
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() {
        Some(token.trim())
    } else {
        None
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;
        let claims = state.tokens.verify(token).map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            ApiError::Unauthorized
        })?;

        let id: i64 = claims.sub.parse().map_err(|_| ApiError::Unauthorized)?;
        // Deactivated or deleted users lose access even with an unexpired token.
        let usuario = state
            .database
            .get_usuario(id)
            .await
            .map_err(|_| ApiError::Unauthorized)?;
        if !usuario.ativo {
            return Err(ApiError::Unauthorized);
        }

        Ok(AuthUser(usuario))
    }
}
