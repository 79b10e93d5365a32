use chrono::Utc;
use tracing::info;
use validator::Validate;

use super::models::{
    AtualizacaoPesquisa, NovaPergunta, NovaPesquisa, Pesquisa, PerguntaPesquisa, StatusPesquisa,
};
use super::Database;
use crate::error::PesquisaError;
use crate::pesquisa::validacao;

const COLUNAS: &str =
    "id, titulo, descricao, status, criado_por, iniciada_em, encerrada_em, created_at, updated_at";

const COLUNAS_PERGUNTA: &str =
    "id, pesquisa_id, ordem, texto, tipo, opcoes, obrigatoria, created_at, updated_at";

impl Database {
    pub async fn create_pesquisa(
        &self,
        nova: &NovaPesquisa,
        criado_por: Option<i64>,
    ) -> Result<Pesquisa, PesquisaError> {
        nova.validate()
            .map_err(|e| PesquisaError::ValidationError(e.to_string()))?;

        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO pesquisas (titulo, descricao, status, criado_por, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&nova.titulo)
        .bind(&nova.descricao)
        .bind(StatusPesquisa::Rascunho)
        .bind(criado_por)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        let id = result.last_insert_rowid();
        info!("Created pesquisa {} ({})", id, nova.titulo);
        self.get_pesquisa(id).await
    }

    pub async fn get_pesquisa(&self, id: i64) -> Result<Pesquisa, PesquisaError> {
        sqlx::query_as::<_, Pesquisa>(&format!("SELECT {} FROM pesquisas WHERE id = ?", COLUNAS))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| PesquisaError::not_found("Pesquisa", id))
    }

    pub async fn list_pesquisas(
        &self,
        status: Option<StatusPesquisa>,
    ) -> Result<Vec<Pesquisa>, PesquisaError> {
        let pesquisas = sqlx::query_as::<_, Pesquisa>(&format!(
            "SELECT {} FROM pesquisas WHERE (? IS NULL OR status = ?) ORDER BY id DESC",
            COLUNAS
        ))
        .bind(status)
        .bind(status)
        .fetch_all(self.pool())
        .await?;

        Ok(pesquisas)
    }

    pub async fn update_pesquisa(
        &self,
        id: i64,
        update: &AtualizacaoPesquisa,
    ) -> Result<Pesquisa, PesquisaError> {
        update
            .validate()
            .map_err(|e| PesquisaError::ValidationError(e.to_string()))?;

        let atual = self.get_pesquisa(id).await?;
        if atual.status == StatusPesquisa::Encerrada {
            return Err(PesquisaError::Conflict(format!(
                "Pesquisa {} encerrada não pode ser alterada",
                id
            )));
        }

        sqlx::query("UPDATE pesquisas SET titulo = ?, descricao = ?, updated_at = ? WHERE id = ?")
            .bind(update.titulo.as_deref().unwrap_or(&atual.titulo))
            .bind(update.descricao.as_deref().or(atual.descricao.as_deref()))
            .bind(Utc::now())
            .bind(id)
            .execute(self.pool())
            .await?;

        self.get_pesquisa(id).await
    }

    /// Only drafts can be removed; polls with fieldwork keep their answers.
    pub async fn delete_pesquisa(&self, id: i64) -> Result<(), PesquisaError> {
        let atual = self.get_pesquisa(id).await?;
        if atual.status != StatusPesquisa::Rascunho {
            return Err(PesquisaError::Conflict(format!(
                "Apenas pesquisas em rascunho podem ser removidas (status atual: {})",
                atual.status
            )));
        }

        sqlx::query("DELETE FROM pesquisas WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn set_status_pesquisa(
        &self,
        id: i64,
        destino: StatusPesquisa,
    ) -> Result<Pesquisa, PesquisaError> {
        let atual = self.get_pesquisa(id).await?;
        if !atual.status.can_transition_to(destino) {
            return Err(PesquisaError::invalid_transition(
                atual.status.as_str(),
                destino.as_str(),
            ));
        }

        if destino == StatusPesquisa::Ativa && self.list_perguntas(id).await?.is_empty() {
            return Err(PesquisaError::ValidationError(format!(
                "Pesquisa {} não tem perguntas",
                id
            )));
        }

        let now = Utc::now();
        let iniciada_em = match (destino, atual.iniciada_em) {
            (StatusPesquisa::Ativa, None) => Some(now),
            (_, existente) => existente,
        };
        let encerrada_em = if destino == StatusPesquisa::Encerrada {
            Some(now)
        } else {
            atual.encerrada_em
        };

        // The status guard in WHERE makes concurrent transitions from the same state fail cleanly.
        let result = sqlx::query(
            r#"
            UPDATE pesquisas SET status = ?, iniciada_em = ?, encerrada_em = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(destino)
        .bind(iniciada_em)
        .bind(encerrada_em)
        .bind(now)
        .bind(id)
        .bind(atual.status)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(PesquisaError::invalid_transition(
                atual.status.as_str(),
                destino.as_str(),
            ));
        }

        info!("Pesquisa {} status {} -> {}", id, atual.status, destino);
        self.get_pesquisa(id).await
    }

    pub async fn add_pergunta(
        &self,
        pesquisa_id: i64,
        nova: &NovaPergunta,
    ) -> Result<PerguntaPesquisa, PesquisaError> {
        nova.validate()
            .map_err(|e| PesquisaError::ValidationError(e.to_string()))?;
        validacao::validar_pergunta(nova)?;

        let pesquisa = self.get_pesquisa(pesquisa_id).await?;
        if !pesquisa.status.editavel() {
            return Err(PesquisaError::Conflict(format!(
                "Perguntas só podem ser alteradas em rascunho (status atual: {})",
                pesquisa.status
            )));
        }

        let ordem = match nova.ordem {
            Some(ordem) => ordem,
            None => {
                let max: Option<i64> = sqlx::query_scalar(
                    "SELECT MAX(ordem) FROM perguntas_pesquisa WHERE pesquisa_id = ?",
                )
                .bind(pesquisa_id)
                .fetch_one(self.pool())
                .await?;
                max.unwrap_or(0) + 1
            }
        };

        let opcoes: Vec<String> = nova.opcoes.iter().map(|o| o.trim().to_string()).collect();
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO perguntas_pesquisa
            (pesquisa_id, ordem, texto, tipo, opcoes, obrigatoria, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(pesquisa_id)
        .bind(ordem)
        .bind(&nova.texto)
        .bind(nova.tipo)
        .bind(sqlx::types::Json(&opcoes))
        .bind(nova.obrigatoria)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_pergunta(result.last_insert_rowid()).await
    }

    pub async fn get_pergunta(&self, id: i64) -> Result<PerguntaPesquisa, PesquisaError> {
        sqlx::query_as::<_, PerguntaPesquisa>(&format!(
            "SELECT {} FROM perguntas_pesquisa WHERE id = ?",
            COLUNAS_PERGUNTA
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| PesquisaError::not_found("Pergunta", id))
    }

    pub async fn list_perguntas(&self, pesquisa_id: i64) -> Result<Vec<PerguntaPesquisa>, PesquisaError> {
        let perguntas = sqlx::query_as::<_, PerguntaPesquisa>(&format!(
            "SELECT {} FROM perguntas_pesquisa WHERE pesquisa_id = ? ORDER BY ordem, id",
            COLUNAS_PERGUNTA
        ))
        .bind(pesquisa_id)
        .fetch_all(self.pool())
        .await?;

        Ok(perguntas)
    }

    pub async fn delete_pergunta(&self, pesquisa_id: i64, pergunta_id: i64) -> Result<(), PesquisaError> {
        let pesquisa = self.get_pesquisa(pesquisa_id).await?;
        if !pesquisa.status.editavel() {
            return Err(PesquisaError::Conflict(format!(
                "Perguntas só podem ser alteradas em rascunho (status atual: {})",
                pesquisa.status
            )));
        }

        let result = sqlx::query("DELETE FROM perguntas_pesquisa WHERE id = ? AND pesquisa_id = ?")
            .bind(pergunta_id)
            .bind(pesquisa_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(PesquisaError::not_found("Pergunta", pergunta_id));
        }
        Ok(())
    }
}
