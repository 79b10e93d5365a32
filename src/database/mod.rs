pub mod candidatos;
pub mod eleitores;
pub mod models;
pub mod pesquisas;
pub mod respostas;
pub mod schema;
pub mod usuarios;
pub mod whatsapp;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::PesquisaError;
use models::EventoAuditoria;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, PesquisaError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Database { pool })
    }

    /// Single-connection in-memory database with migrations applied.
    pub async fn new_in_memory() -> Result<Self, PesquisaError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // Every connection to :memory: is a separate database, so the pool must never recycle.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let database = Database { pool };
        database.run_migrations().await?;
        Ok(database)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), PesquisaError> {
        for (name, sql) in schema::MIGRATIONS {
            debug!("Applying migration {}", name);
            sqlx::raw_sql(*sql).execute(&self.pool).await?;
        }
        info!("Applied {} migration(s)", schema::MIGRATIONS.len());
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), PesquisaError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn log_evento(
        &self,
        tipo: &str,
        usuario_id: Option<i64>,
        detalhes: &serde_json::Value,
    ) -> Result<(), PesquisaError> {
        inserir_evento(&self.pool, tipo, usuario_id, detalhes).await
    }

    pub async fn list_eventos(&self, limit: i64) -> Result<Vec<EventoAuditoria>, PesquisaError> {
        let eventos = sqlx::query_as::<_, EventoAuditoria>(
            r#"
            SELECT id, tipo, usuario_id, detalhes, created_at
            FROM eventos_auditoria
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(eventos)
    }
}

/// Audit insert usable inside a caller's transaction.
pub(crate) async fn inserir_evento<'e, E>(
    executor: E,
    tipo: &str,
    usuario_id: Option<i64>,
    detalhes: &serde_json::Value,
) -> Result<(), PesquisaError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO eventos_auditoria (tipo, usuario_id, detalhes, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(tipo)
    .bind(usuario_id)
    .bind(sqlx::types::Json(detalhes))
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(())
}
