use chrono::Utc;
use tracing::info;

use super::models::{AtualizacaoUsuario, PapelUsuario, Usuario};
use super::Database;
use crate::error::PesquisaError;

const COLUNAS: &str = "id, email, nome, senha_hash, papel, ativo, created_at, updated_at";

impl Database {
    pub async fn create_usuario(
        &self,
        email: &str,
        nome: &str,
        senha_hash: &str,
        papel: PapelUsuario,
    ) -> Result<Usuario, PesquisaError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO usuarios (email, nome, senha_hash, papel, ativo, created_at, updated_at)
            VALUES (?, ?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(email.trim().to_lowercase())
        .bind(nome)
        .bind(senha_hash)
        .bind(papel)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        let id = result.last_insert_rowid();
        info!("Created usuario {} ({})", email, papel);
        self.get_usuario(id).await
    }

    pub async fn get_usuario(&self, id: i64) -> Result<Usuario, PesquisaError> {
        sqlx::query_as::<_, Usuario>(&format!("SELECT {} FROM usuarios WHERE id = ?", COLUNAS))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| PesquisaError::not_found("Usuário", id))
    }

    pub async fn get_usuario_by_email(&self, email: &str) -> Result<Option<Usuario>, PesquisaError> {
        let usuario = sqlx::query_as::<_, Usuario>(&format!(
            "SELECT {} FROM usuarios WHERE email = ?",
            COLUNAS
        ))
        .bind(email.trim().to_lowercase())
        .fetch_optional(self.pool())
        .await?;

        Ok(usuario)
    }

    pub async fn list_usuarios(&self) -> Result<Vec<Usuario>, PesquisaError> {
        let usuarios = sqlx::query_as::<_, Usuario>(&format!(
            "SELECT {} FROM usuarios ORDER BY id",
            COLUNAS
        ))
        .fetch_all(self.pool())
        .await?;

        Ok(usuarios)
    }

    /// Profile fields and an optional new password hash land in one statement.
    pub async fn update_usuario(
        &self,
        id: i64,
        update: &AtualizacaoUsuario,
        senha_hash: Option<&str>,
    ) -> Result<Usuario, PesquisaError> {
        let result = sqlx::query(
            r#"
            UPDATE usuarios SET
                nome = COALESCE(?, nome),
                papel = COALESCE(?, papel),
                ativo = COALESCE(?, ativo),
                senha_hash = COALESCE(?, senha_hash),
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(update.nome.as_deref())
        .bind(update.papel)
        .bind(update.ativo)
        .bind(senha_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(PesquisaError::not_found("Usuário", id));
        }
        self.get_usuario(id).await
    }

    /// Users are never removed, since polls and audit events reference them.
    pub async fn deactivate_usuario(&self, id: i64) -> Result<(), PesquisaError> {
        let result = sqlx::query("UPDATE usuarios SET ativo = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(PesquisaError::not_found("Usuário", id));
        }
        info!("Deactivated usuario {}", id);
        Ok(())
    }

    pub async fn count_admins_ativos(&self) -> Result<i64, PesquisaError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM usuarios WHERE papel = 'admin' AND ativo = 1",
        )
        .fetch_one(self.pool())
        .await?;

        Ok(total)
    }

    /// Creates the bootstrap admin when no active admin exists. Returns whether one was created.
    pub async fn ensure_admin(&self, email: &str, senha_hash: &str) -> Result<bool, PesquisaError> {
        if self.count_admins_ativos().await? > 0 {
            return Ok(false);
        }
        if self.get_usuario_by_email(email).await?.is_some() {
            return Err(PesquisaError::Conflict(format!(
                "Usuário {} já existe mas não é administrador ativo",
                email
            )));
        }
        self.create_usuario(email, "Administrador", senha_hash, PapelUsuario::Admin)
            .await?;
        Ok(true)
    }
}
