use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::database::models::{PapelUsuario, Usuario};
use crate::error::PesquisaError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Usuario id.
    pub sub: String,
    pub email: String,
    pub papel: PapelUsuario,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenEmitido {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct TokenManager {
    keys: Arc<Keys>,
    expiration: Duration,
}

impl TokenManager {
    pub fn new(secret: &str, expiration_minutes: i64) -> Self {
        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
            }),
            expiration: Duration::try_minutes(expiration_minutes).unwrap_or_default(),
        }
    }

    pub fn issue(&self, usuario: &Usuario) -> Result<TokenEmitido, PesquisaError> {
        let now = Utc::now();
        let claims = Claims {
            sub: usuario.id.to_string(),
            email: usuario.email.clone(),
            papel: usuario.papel,
            iat: now.timestamp(),
            exp: (now + self.expiration).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)
            .map_err(|e| PesquisaError::AuthError(format!("Failed to sign token: {}", e)))?;

        debug!("Issued token {} for usuario {}", claims.jti, usuario.id);
        Ok(TokenEmitido {
            access_token: token,
            token_type: "bearer",
            expires_in: self.expiration.num_seconds(),
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, PesquisaError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<Claims>(token, &self.keys.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| PesquisaError::AuthError(format!("Invalid token: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usuario() -> Usuario {
        Usuario {
            id: 7,
            email: "ana@example.com".to_string(),
            nome: "Ana".to_string(),
            senha_hash: String::new(),
            papel: PapelUsuario::Pesquisador,
            ativo: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_issue_and_verify() {
        let manager = TokenManager::new("test-secret-with-enough-bytes", 30);
        let emitido = manager.issue(&usuario()).unwrap();
        assert_eq!(emitido.token_type, "bearer");
        assert_eq!(emitido.expires_in, 1800);

        let claims = manager.verify(&emitido.access_token).unwrap();
        assert_eq!(claims.sub, "7");
        assert_eq!(claims.papel, PapelUsuario::Pesquisador);
    }

    #[test]
    fn test_rejects_other_secret() {
        let emitido = TokenManager::new("first-secret-with-bytes", 30)
            .issue(&usuario())
            .unwrap();
        let other = TokenManager::new("second-secret-with-bytes", 30);
        assert!(other.verify(&emitido.access_token).is_err());
    }

    #[test]
    fn test_rejects_expired() {
        let manager = TokenManager::new("test-secret-with-enough-bytes", -120);
        let emitido = manager.issue(&usuario()).unwrap();
        assert!(manager.verify(&emitido.access_token).is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        let manager = TokenManager::new("test-secret-with-enough-bytes", 30);
        assert!(manager.verify("not.a.token").is_err());
    }
}
