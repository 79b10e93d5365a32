use thiserror::Error;

impl From<serde_json::Error> for PesquisaError {
    fn from(err: serde_json::Error) -> Self {
        Self::BancoError(format!("JSON serialization error: {}", err))
    }
}

impl From<sqlx::Error> for PesquisaError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("Registro não encontrado".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::Conflict(format!("Registro duplicado: {}", db_err.message()))
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                Self::ValidationError(format!("Referência inválida: {}", db_err.message()))
            }
            other => Self::DatabaseError(format!("Database error: {}", other)),
        }
    }
}

impl From<std::io::Error> for PesquisaError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum PesquisaError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Webhook processing error: {0}")]
    WebhookError(String),

    #[error("Upstream service error: {0}")]
    UpstreamError(String),

    #[error("Voter bank error: {0}")]
    BancoError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl PesquisaError {
    pub fn not_found(entity: &str, id: i64) -> Self {
        Self::NotFound(format!("{} {} não encontrado(a)", entity, id))
    }

    pub fn invalid_enum(field: &str, value: &str, allowed: &[&str]) -> Self {
        Self::ValidationError(format!(
            "Valor inválido para {}: '{}'. Valores aceitos: {}",
            field,
            value,
            allowed.join(", ")
        ))
    }

    pub fn invalid_transition(from: &str, to: &str) -> Self {
        Self::Conflict(format!(
            "Transição de status inválida: {} -> {}",
            from, to
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PesquisaError::not_found("Pesquisa", 7);
        assert_eq!(err.to_string(), "Not found: Pesquisa 7 não encontrado(a)");

        let err = PesquisaError::invalid_enum("genero", "x", &["masculino", "feminino"]);
        assert!(err.to_string().contains("masculino, feminino"));
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: PesquisaError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, PesquisaError::NotFound(_)));
    }
}
