use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::SqliteConnection;

use super::models::{ContatoWhatsApp, DirecaoMensagem, MensagemWhatsApp};
use super::{inserir_evento, Database};
use crate::error::PesquisaError;

const COLUNAS: &str =
    "id, telefone, nome, eleitor_id, opt_in, ultima_mensagem_em, created_at, updated_at";

impl Database {
    /// Creates the contact or refreshes its display name; the phone number is the identity.
    pub async fn upsert_contato(
        &self,
        telefone: &str,
        nome: Option<&str>,
    ) -> Result<ContatoWhatsApp, PesquisaError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO contatos_whatsapp (telefone, nome, opt_in, created_at, updated_at)
            VALUES (?, ?, 1, ?, ?)
            ON CONFLICT (telefone) DO UPDATE SET
                nome = COALESCE(excluded.nome, contatos_whatsapp.nome),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(telefone)
        .bind(nome)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        let contato = sqlx::query_as::<_, ContatoWhatsApp>(&format!(
            "SELECT {} FROM contatos_whatsapp WHERE telefone = ?",
            COLUNAS
        ))
        .bind(telefone)
        .fetch_one(self.pool())
        .await?;

        Ok(contato)
    }

    pub async fn get_contato(&self, id: i64) -> Result<ContatoWhatsApp, PesquisaError> {
        sqlx::query_as::<_, ContatoWhatsApp>(&format!(
            "SELECT {} FROM contatos_whatsapp WHERE id = ?",
            COLUNAS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .ok_or_else(|| PesquisaError::not_found("Contato", id))
    }

    pub async fn list_contatos(&self, apenas_opt_in: bool) -> Result<Vec<ContatoWhatsApp>, PesquisaError> {
        let contatos = sqlx::query_as::<_, ContatoWhatsApp>(&format!(
            "SELECT {} FROM contatos_whatsapp WHERE (? = 0 OR opt_in = 1) \
             ORDER BY ultima_mensagem_em DESC, id",
            COLUNAS
        ))
        .bind(apenas_opt_in)
        .fetch_all(self.pool())
        .await?;

        Ok(contatos)
    }

    pub async fn vincular_eleitor(
        &self,
        contato_id: i64,
        eleitor_id: Option<i64>,
    ) -> Result<ContatoWhatsApp, PesquisaError> {
        if let Some(eleitor_id) = eleitor_id {
            self.get_eleitor(eleitor_id).await?;
        }

        let result = sqlx::query("UPDATE contatos_whatsapp SET eleitor_id = ?, updated_at = ? WHERE id = ?")
            .bind(eleitor_id)
            .bind(Utc::now())
            .bind(contato_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(PesquisaError::not_found("Contato", contato_id));
        }
        self.get_contato(contato_id).await
    }

    pub async fn set_opt_in(&self, contato_id: i64, opt_in: bool) -> Result<(), PesquisaError> {
        let result = sqlx::query("UPDATE contatos_whatsapp SET opt_in = ?, updated_at = ? WHERE id = ?")
            .bind(opt_in)
            .bind(Utc::now())
            .bind(contato_id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(PesquisaError::not_found("Contato", contato_id));
        }
        Ok(())
    }

    /// Returns `false` when a message with the same WhatsApp id was already stored.
    pub async fn registrar_mensagem(
        &self,
        contato_id: i64,
        direcao: DirecaoMensagem,
        wa_message_id: Option<&str>,
        conteudo: &str,
        recebida_em: DateTime<Utc>,
    ) -> Result<bool, PesquisaError> {
        let mut tx = self.pool().begin().await?;
        let inserida =
            inserir_mensagem(&mut tx, contato_id, direcao, wa_message_id, conteudo, recebida_em).await?;
        tx.commit().await?;
        Ok(inserida)
    }

    /// Stores an inbound message and, when it is new and carries an opt-in keyword,
    /// applies `opt_in` and records the audit event in the same transaction.
    ///
    /// Nothing is committed on error, so a redelivery of the same message applies the keyword again.
    pub async fn registrar_mensagem_entrada(
        &self,
        contato_id: i64,
        wa_message_id: &str,
        conteudo: &str,
        recebida_em: DateTime<Utc>,
        opt_in: Option<bool>,
    ) -> Result<bool, PesquisaError> {
        let mut tx = self.pool().begin().await?;
        let inserida = inserir_mensagem(
            &mut tx,
            contato_id,
            DirecaoMensagem::Entrada,
            Some(wa_message_id),
            conteudo,
            recebida_em,
        )
        .await?;

        if let (true, Some(opt_in)) = (inserida, opt_in) {
            sqlx::query("UPDATE contatos_whatsapp SET opt_in = ?, updated_at = ? WHERE id = ?")
                .bind(opt_in)
                .bind(Utc::now())
                .bind(contato_id)
                .execute(&mut *tx)
                .await?;

            let tipo = if opt_in { "whatsapp_opt_in" } else { "whatsapp_opt_out" };
            inserir_evento(
                &mut *tx,
                tipo,
                None,
                &json!({ "contato_id": contato_id, "wa_message_id": wa_message_id }),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(inserida)
    }

    pub async fn list_mensagens(
        &self,
        contato_id: i64,
        limit: i64,
    ) -> Result<Vec<MensagemWhatsApp>, PesquisaError> {
        let mensagens = sqlx::query_as::<_, MensagemWhatsApp>(
            r#"
            SELECT id, contato_id, direcao, wa_message_id, conteudo, created_at
            FROM mensagens_whatsapp
            WHERE contato_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(contato_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(mensagens)
    }
}

async fn inserir_mensagem(
    conn: &mut SqliteConnection,
    contato_id: i64,
    direcao: DirecaoMensagem,
    wa_message_id: Option<&str>,
    conteudo: &str,
    recebida_em: DateTime<Utc>,
) -> Result<bool, PesquisaError> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO mensagens_whatsapp (contato_id, direcao, wa_message_id, conteudo, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(contato_id)
    .bind(direcao)
    .bind(wa_message_id)
    .bind(conteudo)
    .bind(recebida_em)
    .execute(&mut *conn)
    .await?;

    let inserida = result.rows_affected() > 0;
    if inserida {
        sqlx::query(
            r#"
            UPDATE contatos_whatsapp
            SET ultima_mensagem_em = MAX(COALESCE(ultima_mensagem_em, ?), ?), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(recebida_em)
        .bind(recebida_em)
        .bind(Utc::now())
        .bind(contato_id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(inserida)
}
