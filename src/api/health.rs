use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use super::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "pesquisa-eleitoral",
        "timestamp": chrono::Utc::now()
    }))
}

pub async fn status_endpoint(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    let mut status = json!({
        "status": "healthy",
        "service": "pesquisa-eleitoral",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now(),
        "features": {
            "whatsapp_envio": state.whatsapp.is_some(),
            "whatsapp_encaminhamento": config.whatsapp_forward_url.is_some(),
            "whatsapp_assinatura": config.whatsapp_app_secret.is_some(),
            "whatsapp_verificacao": config.whatsapp_verify_token.is_some()
        }
    });

    if let Err(e) = state.database.ping().await {
        tracing::error!("Database ping failed: {}", e);
        status["status"] = json!("degraded");
        status["database"] = json!({ "status": "error" });
    } else {
        status["database"] = json!({ "status": "healthy" });
    }

    Json(status)
}
