#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use pesquisa_eleitoral::api::{self, AppState};
use pesquisa_eleitoral::auth::password;
use pesquisa_eleitoral::config::AppConfig;
use pesquisa_eleitoral::database::models::{Genero, NovoEleitor, OrientacaoPolitica, PapelUsuario, Usuario};
use pesquisa_eleitoral::database::Database;
use serde_json::Value;
use tower::ServiceExt;

pub const SENHA_TESTE: &str = "senha-segura-123";

/// Setup an in-memory SQLite database for testing
pub async fn setup_test_db() -> Database {
    Database::new_in_memory().await.expect("Failed to create test database")
}

pub async fn setup_state(config: AppConfig) -> AppState {
    AppState::new(config, setup_test_db().await)
}

pub async fn create_test_user(db: &Database, email: &str, papel: PapelUsuario) -> Usuario {
    let hash = password::hash_password(SENHA_TESTE).unwrap();
    db.create_usuario(email, "Usuário de Teste", &hash, papel)
        .await
        .expect("Failed to create test user")
}

/// Creates a user with the given role and returns a bearer token for it.
pub async fn token_for(state: &AppState, email: &str, papel: PapelUsuario) -> String {
    let usuario = create_test_user(&state.database, email, papel).await;
    state.tokens.issue(&usuario).unwrap().access_token
}

pub fn novo_eleitor(nome: &str, idade: i64, genero: Genero, orientacao: OrientacaoPolitica) -> NovoEleitor {
    NovoEleitor {
        nome: nome.to_string(),
        idade,
        genero,
        cor_raca: Some("parda".to_string()),
        regiao_administrativa: Some("Ceilândia".to_string()),
        escolaridade: Some("medio_completo".to_string()),
        faixa_renda: Some("1_a_2_sm".to_string()),
        ocupacao: None,
        religiao: Some("catolica".to_string()),
        orientacao_politica: orientacao,
        interesse_politico: Some("medio".to_string()),
        estado_civil: None,
        atributos: Default::default(),
    }
}

pub fn app(state: &AppState) -> Router {
    api::router(state.clone())
}

/// Sends one request through the router and returns the status and parsed JSON body (`Null` when empty).
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };
    (status, json)
}
