use chrono::Utc;
use validator::Validate;

use super::models::{Candidato, NovoCandidato};
use super::Database;
use crate::error::PesquisaError;

impl Database {
    pub async fn create_candidato(&self, novo: &NovoCandidato) -> Result<Candidato, PesquisaError> {
        novo.validate()
            .map_err(|e| PesquisaError::ValidationError(e.to_string()))?;

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO candidatos (nome, partido, numero, cargo, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&novo.nome)
        .bind(novo.partido.trim().to_uppercase())
        .bind(novo.numero)
        .bind(&novo.cargo)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_candidato(result.last_insert_rowid()).await
    }

    pub async fn get_candidato(&self, id: i64) -> Result<Candidato, PesquisaError> {
        sqlx::query_as::<_, Candidato>(
            "SELECT id, nome, partido, numero, cargo, created_at, updated_at FROM candidatos WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| PesquisaError::not_found("Candidato", id))
    }

    pub async fn list_candidatos(&self, cargo: Option<&str>) -> Result<Vec<Candidato>, PesquisaError> {
        let candidatos = sqlx::query_as::<_, Candidato>(
            r#"
            SELECT id, nome, partido, numero, cargo, created_at, updated_at
            FROM candidatos
            WHERE (? IS NULL OR cargo = ?)
            ORDER BY cargo, numero
            "#,
        )
        .bind(cargo)
        .bind(cargo)
        .fetch_all(self.pool())
        .await?;

        Ok(candidatos)
    }

    pub async fn delete_candidato(&self, id: i64) -> Result<(), PesquisaError> {
        let result = sqlx::query("DELETE FROM candidatos WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(PesquisaError::not_found("Candidato", id));
        }
        Ok(())
    }
}
