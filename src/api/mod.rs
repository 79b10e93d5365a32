pub mod auditoria;
pub mod auth;
pub mod candidatos;
pub mod eleitores;
pub mod error;
pub mod extract;
pub mod health;
pub mod pesquisas;
pub mod usuarios;
pub mod whatsapp;

use axum::{
    http::{header, Method},
    routing::{delete, get, patch, post},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::auth::TokenManager;
use crate::config::AppConfig;
use crate::database::Database;
use crate::webhooks;
use crate::whatsapp::WhatsAppClient;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub database: Database,
    pub tokens: TokenManager,
    pub whatsapp: Option<WhatsAppClient>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: AppConfig, database: Database) -> Self {
        let tokens = TokenManager::new(&config.jwt_secret, config.jwt_expiration_minutes);
        let whatsapp = WhatsAppClient::from_config(&config);
        Self {
            config: Arc::new(config),
            database,
            tokens,
            whatsapp,
            http: reqwest::Client::new(),
        }
    }

    /// Records an audit event; a failure is logged and never fails the request.
    pub async fn auditar(&self, tipo: &str, usuario_id: Option<i64>, detalhes: Value) {
        if let Err(e) = self.database.log_evento(tipo, usuario_id, &detalhes).await {
            warn!("Failed to record audit event {}: {}", tipo, e);
        }
    }
}

fn v1() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/usuarios", get(usuarios::listar).post(usuarios::criar))
        .route(
            "/usuarios/:id",
            get(usuarios::obter)
                .patch(usuarios::atualizar)
                .delete(usuarios::desativar),
        )
        .route("/eleitores", get(eleitores::listar).post(eleitores::criar))
        .route("/eleitores/estatisticas", get(eleitores::estatisticas))
        .route("/eleitores/importar", post(eleitores::importar))
        .route(
            "/eleitores/:id",
            get(eleitores::obter)
                .put(eleitores::atualizar)
                .delete(eleitores::remover),
        )
        .route("/candidatos", get(candidatos::listar).post(candidatos::criar))
        .route(
            "/candidatos/:id",
            get(candidatos::obter).delete(candidatos::remover),
        )
        .route("/pesquisas", get(pesquisas::listar).post(pesquisas::criar))
        .route(
            "/pesquisas/:id",
            get(pesquisas::obter)
                .patch(pesquisas::atualizar)
                .delete(pesquisas::remover),
        )
        .route("/pesquisas/:id/perguntas", post(pesquisas::adicionar_pergunta))
        .route(
            "/pesquisas/:id/perguntas/:pergunta_id",
            delete(pesquisas::remover_pergunta),
        )
        .route("/pesquisas/:id/status", post(pesquisas::alterar_status))
        .route(
            "/pesquisas/:id/respostas",
            get(pesquisas::listar_respostas).post(pesquisas::registrar_respostas),
        )
        .route("/pesquisas/:id/resultados", get(pesquisas::resultados))
        .route("/whatsapp/contatos", get(whatsapp::listar_contatos))
        .route("/whatsapp/contatos/:id", patch(whatsapp::atualizar_contato))
        .route(
            "/whatsapp/contatos/:id/mensagens",
            get(whatsapp::listar_mensagens).post(whatsapp::enviar_mensagem),
        )
        .route("/auditoria", get(auditoria::listar))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .nest("/api/v1", v1())
        .route("/health", get(health::health_check))
        .route("/status", get(health::status_endpoint))
        .route(
            "/webhooks/whatsapp",
            get(webhooks::whatsapp::verify_subscription).post(webhooks::whatsapp::handle_webhook),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .into_inner(),
        )
        .with_state(state)
}
