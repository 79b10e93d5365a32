pub mod loader;

use serde::{Deserialize, Serialize};

use crate::error::PesquisaError;

const DEV_JWT_SECRET: &str = "dev-secret-change-me-please";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub jwt_expiration_minutes: i64,
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default)]
    pub whatsapp_verify_token: Option<String>,
    #[serde(default)]
    pub whatsapp_app_secret: Option<String>,
    #[serde(default)]
    pub whatsapp_forward_url: Option<String>,
    pub whatsapp_api_url: String,
    #[serde(default)]
    pub whatsapp_access_token: Option<String>,
    #[serde(default)]
    pub whatsapp_phone_number_id: Option<String>,
}

impl AppConfig {
    /// Defaults, then `pesquisa.toml` if present, then environment variables.
    pub fn load() -> Result<Self, PesquisaError> {
        let settings = ::config::Config::builder()
            .set_default("database_url", "sqlite://pesquisa.db?mode=rwc")
            .and_then(|b| b.set_default("server_host", "0.0.0.0"))
            .and_then(|b| b.set_default("server_port", 8000_i64))
            .and_then(|b| b.set_default("jwt_secret", DEV_JWT_SECRET))
            .and_then(|b| b.set_default("jwt_expiration_minutes", 1440_i64))
            .and_then(|b| b.set_default("whatsapp_api_url", "https://graph.facebook.com/v19.0"))
            .map_err(|e| PesquisaError::ConfigError(e.to_string()))?
            .add_source(::config::File::with_name("pesquisa").required(false))
            .add_source(::config::Environment::default())
            .build()
            .map_err(|e| PesquisaError::ConfigError(format!("Failed to build configuration: {}", e)))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| PesquisaError::ConfigError(format!("Invalid configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PesquisaError> {
        if self.jwt_secret.len() < 16 {
            return Err(PesquisaError::ConfigError(
                "JWT_SECRET must be at least 16 bytes long".to_string(),
            ));
        }
        if self.server_port == 0 {
            return Err(PesquisaError::ConfigError(
                "SERVER_PORT cannot be 0".to_string(),
            ));
        }
        if self.jwt_expiration_minutes <= 0 {
            return Err(PesquisaError::ConfigError(
                "JWT_EXPIRATION_MINUTES must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }

    /// Configuration for tests and local tooling: in-memory database, no WhatsApp.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            server_host: "127.0.0.1".to_string(),
            server_port: 8000,
            jwt_secret: "test-secret-with-enough-bytes".to_string(),
            jwt_expiration_minutes: 60,
            admin_email: None,
            admin_password: None,
            whatsapp_verify_token: None,
            whatsapp_app_secret: None,
            whatsapp_forward_url: None,
            whatsapp_api_url: "https://graph.facebook.com/v19.0".to_string(),
            whatsapp_access_token: None,
            whatsapp_phone_number_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = AppConfig::for_tests();
        config.jwt_secret = "curto".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_test_config() {
        let config = AppConfig::for_tests();
        assert!(config.validate().is_ok());
        assert!(!config.uses_dev_secret());
    }
}
