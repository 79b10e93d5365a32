use chrono::Utc;
use tracing::info;

use super::models::{NovaEntrevista, Resposta};
use super::Database;
use crate::error::PesquisaError;
use crate::pesquisa::{resultados, validacao};

impl Database {
    /// Stores every answer of one interviewee atomically.
    pub async fn registrar_entrevista(
        &self,
        pesquisa_id: i64,
        entrevista: &NovaEntrevista,
    ) -> Result<usize, PesquisaError> {
        let pesquisa = self.get_pesquisa(pesquisa_id).await?;
        if !pesquisa.status.aceita_respostas() {
            return Err(PesquisaError::Conflict(format!(
                "Pesquisa {} não está recebendo respostas (status: {})",
                pesquisa_id, pesquisa.status
            )));
        }

        // Existence check gives a 404 instead of a foreign key error.
        self.get_eleitor(entrevista.eleitor_id).await?;

        let perguntas = self.list_perguntas(pesquisa_id).await?;
        let aceitas = validacao::validar_entrevista(&perguntas, &entrevista.respostas)?;

        let ja_respondeu: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM respostas WHERE pesquisa_id = ? AND eleitor_id = ?",
        )
        .bind(pesquisa_id)
        .bind(entrevista.eleitor_id)
        .fetch_one(self.pool())
        .await?;
        if ja_respondeu > 0 {
            return Err(PesquisaError::Conflict(format!(
                "Eleitor {} já foi entrevistado na pesquisa {}",
                entrevista.eleitor_id, pesquisa_id
            )));
        }

        let now = Utc::now();
        let mut tx = self.pool().begin().await?;
        for resposta in &aceitas {
            sqlx::query(
                r#"
                INSERT INTO respostas (pesquisa_id, pergunta_id, eleitor_id, valor, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(pesquisa_id)
            .bind(resposta.pergunta_id)
            .bind(entrevista.eleitor_id)
            .bind(sqlx::types::Json(&resposta.valor))
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        info!(
            "Registered {} answer(s) from eleitor {} in pesquisa {}",
            aceitas.len(),
            entrevista.eleitor_id,
            pesquisa_id
        );
        Ok(aceitas.len())
    }

    pub async fn list_respostas(
        &self,
        pesquisa_id: i64,
        eleitor_id: Option<i64>,
    ) -> Result<Vec<Resposta>, PesquisaError> {
        let respostas = sqlx::query_as::<_, Resposta>(
            r#"
            SELECT id, pesquisa_id, pergunta_id, eleitor_id, valor, created_at
            FROM respostas
            WHERE pesquisa_id = ? AND (? IS NULL OR eleitor_id = ?)
            ORDER BY eleitor_id, pergunta_id
            "#,
        )
        .bind(pesquisa_id)
        .bind(eleitor_id)
        .bind(eleitor_id)
        .fetch_all(self.pool())
        .await?;

        Ok(respostas)
    }

    pub async fn resultados_pesquisa(
        &self,
        pesquisa_id: i64,
    ) -> Result<resultados::ResultadoPesquisa, PesquisaError> {
        let pesquisa = self.get_pesquisa(pesquisa_id).await?;
        let perguntas = self.list_perguntas(pesquisa_id).await?;
        let respostas = self.list_respostas(pesquisa_id, None).await?;
        Ok(resultados::agregar(&pesquisa, &perguntas, &respostas))
    }
}
