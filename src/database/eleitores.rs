use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite};
use tracing::info;
use validator::Validate;

use super::models::{ContagemCategoria, Eleitor, FiltroEleitores, NovoEleitor, Paginacao};
use super::Database;
use crate::error::PesquisaError;
use crate::pesquisa::resultados::percentual;

const COLUNAS: &str = "id, nome, idade, genero, cor_raca, regiao_administrativa, escolaridade, \
     faixa_renda, ocupacao, religiao, orientacao_politica, interesse_politico, estado_civil, \
     atributos, created_at, updated_at";

/// Columns that can be grouped by in distribution queries.
pub const ATRIBUTOS_AGRUPAVEIS: &[&str] = &[
    "genero",
    "cor_raca",
    "regiao_administrativa",
    "escolaridade",
    "faixa_renda",
    "ocupacao",
    "religiao",
    "orientacao_politica",
    "interesse_politico",
    "estado_civil",
    "faixa_etaria",
];

const FAIXA_ETARIA_SQL: &str = "CASE \
     WHEN idade < 25 THEN '16-24' \
     WHEN idade < 35 THEN '25-34' \
     WHEN idade < 45 THEN '35-44' \
     WHEN idade < 60 THEN '45-59' \
     ELSE '60+' END";

async fn insert_eleitor<'e, E>(executor: E, novo: &NovoEleitor) -> Result<i64, PesquisaError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO eleitores (
            nome, idade, genero, cor_raca, regiao_administrativa, escolaridade, faixa_renda,
            ocupacao, religiao, orientacao_politica, interesse_politico, estado_civil,
            atributos, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&novo.nome)
    .bind(novo.idade)
    .bind(novo.genero)
    .bind(&novo.cor_raca)
    .bind(&novo.regiao_administrativa)
    .bind(&novo.escolaridade)
    .bind(&novo.faixa_renda)
    .bind(&novo.ocupacao)
    .bind(&novo.religiao)
    .bind(novo.orientacao_politica)
    .bind(&novo.interesse_politico)
    .bind(&novo.estado_civil)
    .bind(sqlx::types::Json(&novo.atributos))
    .bind(now)
    .bind(now)
    .execute(executor)
    .await?;

    Ok(result.last_insert_rowid())
}

fn push_filtro(qb: &mut QueryBuilder<'_, Sqlite>, filtro: &FiltroEleitores) {
    qb.push(" WHERE 1 = 1");
    if let Some(genero) = filtro.genero {
        qb.push(" AND genero = ").push_bind(genero);
    }
    if let Some(regiao) = &filtro.regiao_administrativa {
        qb.push(" AND regiao_administrativa = ").push_bind(regiao.clone());
    }
    if let Some(orientacao) = filtro.orientacao_politica {
        qb.push(" AND orientacao_politica = ").push_bind(orientacao);
    }
    if let Some(min) = filtro.idade_min {
        qb.push(" AND idade >= ").push_bind(min);
    }
    if let Some(max) = filtro.idade_max {
        qb.push(" AND idade <= ").push_bind(max);
    }
    if let Some(busca) = filtro.busca.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        qb.push(" AND LOWER(nome) LIKE ")
            .push_bind(format!("%{}%", busca.to_lowercase()));
    }
}

impl Database {
    pub async fn create_eleitor(&self, novo: &NovoEleitor) -> Result<Eleitor, PesquisaError> {
        novo.validate()
            .map_err(|e| PesquisaError::ValidationError(e.to_string()))?;
        let id = insert_eleitor(self.pool(), novo).await?;
        self.get_eleitor(id).await
    }

    pub async fn get_eleitor(&self, id: i64) -> Result<Eleitor, PesquisaError> {
        sqlx::query_as::<_, Eleitor>(&format!("SELECT {} FROM eleitores WHERE id = ?", COLUNAS))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| PesquisaError::not_found("Eleitor", id))
    }

    pub async fn list_eleitores(
        &self,
        filtro: &FiltroEleitores,
        paginacao: Paginacao,
    ) -> Result<Vec<Eleitor>, PesquisaError> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM eleitores", COLUNAS));
        push_filtro(&mut qb, filtro);
        qb.push(" ORDER BY id LIMIT ")
            .push_bind(paginacao.por_pagina)
            .push(" OFFSET ")
            .push_bind(paginacao.offset());

        let eleitores = qb.build_query_as::<Eleitor>().fetch_all(self.pool()).await?;
        Ok(eleitores)
    }

    pub async fn count_eleitores(&self, filtro: &FiltroEleitores) -> Result<i64, PesquisaError> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM eleitores");
        push_filtro(&mut qb, filtro);
        let total: i64 = qb.build_query_scalar().fetch_one(self.pool()).await?;
        Ok(total)
    }

    pub async fn update_eleitor(&self, id: i64, dados: &NovoEleitor) -> Result<Eleitor, PesquisaError> {
        dados.validate()
            .map_err(|e| PesquisaError::ValidationError(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE eleitores SET
                nome = ?, idade = ?, genero = ?, cor_raca = ?, regiao_administrativa = ?,
                escolaridade = ?, faixa_renda = ?, ocupacao = ?, religiao = ?,
                orientacao_politica = ?, interesse_politico = ?, estado_civil = ?,
                atributos = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&dados.nome)
        .bind(dados.idade)
        .bind(dados.genero)
        .bind(&dados.cor_raca)
        .bind(&dados.regiao_administrativa)
        .bind(&dados.escolaridade)
        .bind(&dados.faixa_renda)
        .bind(&dados.ocupacao)
        .bind(&dados.religiao)
        .bind(dados.orientacao_politica)
        .bind(&dados.interesse_politico)
        .bind(&dados.estado_civil)
        .bind(sqlx::types::Json(&dados.atributos))
        .bind(Utc::now())
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(PesquisaError::not_found("Eleitor", id));
        }
        self.get_eleitor(id).await
    }

    pub async fn delete_eleitor(&self, id: i64) -> Result<(), PesquisaError> {
        let result = sqlx::query("DELETE FROM eleitores WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(PesquisaError::not_found("Eleitor", id));
        }
        Ok(())
    }

    /// Inserts the whole batch in one transaction; nothing is written if any record is invalid.
    pub async fn import_eleitores(&self, lote: &[NovoEleitor]) -> Result<usize, PesquisaError> {
        for (index, novo) in lote.iter().enumerate() {
            novo.validate().map_err(|e| {
                PesquisaError::ValidationError(format!("Registro {}: {}", index, e))
            })?;
        }

        let mut tx = self.pool().begin().await?;
        for novo in lote {
            insert_eleitor(&mut *tx, novo).await?;
        }
        tx.commit().await?;

        info!("Imported {} eleitores", lote.len());
        Ok(lote.len())
    }

    pub async fn distribuicao_eleitores(
        &self,
        atributo: &str,
    ) -> Result<Vec<ContagemCategoria>, PesquisaError> {
        if !ATRIBUTOS_AGRUPAVEIS.contains(&atributo) {
            return Err(PesquisaError::invalid_enum(
                "atributo",
                atributo,
                ATRIBUTOS_AGRUPAVEIS,
            ));
        }

        let coluna = if atributo == "faixa_etaria" {
            FAIXA_ETARIA_SQL.to_string()
        } else {
            format!("COALESCE({}, '(ausente)')", atributo)
        };

        // `atributo` is whitelisted above, so formatting it into the statement is safe.
        let linhas: Vec<(String, i64)> = sqlx::query_as(&format!(
            "SELECT {} AS categoria, COUNT(*) AS total FROM eleitores \
             GROUP BY categoria ORDER BY total DESC, categoria",
            coluna
        ))
        .fetch_all(self.pool())
        .await?;

        let soma: i64 = linhas.iter().map(|(_, total)| total).sum();
        Ok(linhas
            .into_iter()
            .map(|(categoria, total)| ContagemCategoria {
                categoria,
                total,
                percentual: percentual(total, soma),
            })
            .collect())
    }
}
